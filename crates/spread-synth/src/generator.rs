//! Batch frame generation
//!
//! Generation runs in two passes. Planning walks the configured settings and
//! draws every random choice from one seeded generator, which yields a list
//! of [`FrameJob`]s. Rendering turns each job into a picture and its
//! annotation file. Jobs are independent, so rendering may run in parallel.

use crate::collision::{CollisionBounds, CollisionPacket, channel_offsets, plan_collision};
use crate::config::{MoldSpec, SynthConfig};
use crate::frame::Frame;
use crate::mold::MoldLibrary;
use crate::packet::planned_length;
use crate::Result;
use anyhow::{Context, anyhow, bail};
use rand::Rng;
use serde::Serialize;
use spread_core::ClassTables;
use std::path::{Path, PathBuf};

/// One packet of a planned frame
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PacketRecipe {
    pub mold: String,
    /// SNR reduction (dB)
    pub attenuation: f64,
    /// Target length, `None` keeps the mold length
    pub length: Option<usize>,
    pub left: usize,
    pub top: usize,
}

/// A planned frame
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrameJob {
    pub background: String,
    pub image_path: PathBuf,
    pub packets: Vec<PacketRecipe>,
}

/// Frames planned for one generation setting
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SettingReport {
    pub setting: String,
    pub first_index: usize,
    pub frames: usize,
}

/// Summary of one generation run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GenerationReport {
    pub scene: String,
    pub output_dir: PathBuf,
    pub planned: usize,
    pub rendered: usize,
    pub failed: usize,
    /// Collision draws that found no visible placement
    pub unplaced: usize,
    pub settings: Vec<SettingReport>,
}

impl GenerationReport {
    fn new(scene: String, output_dir: &Path) -> Self {
        Self {
            scene,
            output_dir: output_dir.to_path_buf(),
            ..Self::default()
        }
    }

    fn record(&mut self, setting: String, first_index: usize, end: usize) {
        tracing::debug!("{}: {} frames", setting, end - first_index);
        self.planned = end;
        self.settings.push(SettingReport {
            setting,
            first_index,
            frames: end - first_index,
        });
    }

    /// Write the report as pretty JSON
    pub fn export_json(&self, output_path: &Path) -> Result<()> {
        let json =
            serde_json::to_string_pretty(self).context("Failed to serialize generation report")?;

        std::fs::write(output_path, json)
            .with_context(|| format!("Failed to write JSON to: {:?}", output_path))?;

        Ok(())
    }
}

/// Renders planned frames
pub struct FrameRenderer<'a> {
    config: &'a SynthConfig,
    library: &'a MoldLibrary,
}

impl<'a> FrameRenderer<'a> {
    pub fn new(config: &'a SynthConfig, library: &'a MoldLibrary) -> Self {
        Self { config, library }
    }

    /// Compose one frame from its recipe without saving it
    pub fn compose(&self, job: &FrameJob) -> Result<Frame> {
        let background = self
            .library
            .background(&job.background)
            .ok_or_else(|| anyhow!("Unknown background: {}", job.background))?;
        let mut frame = Frame::new(&job.image_path, background).with_noise_floor(self.config.noise_floor);

        for recipe in &job.packets {
            let mut packet = self.library.packet(&recipe.mold)?;
            if let Some(length) = recipe.length {
                packet.adjust_length(length, self.config.cushion);
            }
            packet.adjust_snr(recipe.attenuation, 0.0);
            frame
                .place(packet, recipe.left, recipe.top)
                .with_context(|| format!("Failed to place {} in {:?}", recipe.mold, job.image_path))?;
        }

        Ok(frame)
    }

    /// Compose and save one frame
    pub fn render(&self, job: &FrameJob) -> Result<()> {
        self.compose(job)?.save(&self.config.render)
    }

    /// Render every job, returning the number of saved and failed frames.
    ///
    /// A failing frame is logged and skipped.
    pub fn render_all(&self, jobs: &[FrameJob]) -> (usize, usize) {
        #[cfg(feature = "parallel")]
        let results: Vec<Result<()>> = {
            use rayon::prelude::*;
            jobs.par_iter().map(|job| self.render(job)).collect()
        };

        #[cfg(not(feature = "parallel"))]
        let results: Vec<Result<()>> = jobs.iter().map(|job| self.render(job)).collect();

        let mut failed = 0;
        for error in results.into_iter().filter_map(|r| r.err()) {
            tracing::warn!("Skipping frame: {:#}", error);
            failed += 1;
        }
        (jobs.len() - failed, failed)
    }
}

/// Plans and renders single-emission and collision scenes
pub struct Generator<R: Rng> {
    config: SynthConfig,
    tables: ClassTables,
    library: MoldLibrary,
    rng: R,
}

impl<R: Rng> Generator<R> {
    pub fn new(config: SynthConfig, tables: ClassTables, library: MoldLibrary, rng: R) -> Self {
        Self {
            config,
            tables,
            library,
            rng,
        }
    }

    pub fn config(&self) -> &SynthConfig {
        &self.config
    }

    pub fn library(&self) -> &MoldLibrary {
        &self.library
    }

    /// Plan, render and report one scene into `save_path`.
    ///
    /// One class yields single-emission frames, two classes yield collision
    /// frames of the first class against the second.
    pub fn generate(&mut self, categories: &[i32], save_path: &Path) -> Result<GenerationReport> {
        let (jobs, mut report) = match categories {
            [category] => self.plan_single(*category, save_path)?,
            [first, second] => self.plan_collisions(*first, *second, save_path)?,
            _ => bail!("Expected one or two classes, got {}", categories.len()),
        };
        tracing::info!("Planned {} frames for {}", jobs.len(), report.scene);

        std::fs::create_dir_all(save_path)
            .with_context(|| format!("Failed to create output directory: {:?}", save_path))?;

        let (rendered, failed) = FrameRenderer::new(&self.config, &self.library).render_all(&jobs);
        report.rendered = rendered;
        report.failed = failed;

        let report_path = save_path.join(format!("report_{}.json", report.scene));
        report.export_json(&report_path)?;
        tracing::info!(
            "Rendered {} frames ({} failed) into {:?}",
            rendered,
            failed,
            save_path
        );
        Ok(report)
    }

    /// Plan every single-emission frame of one class.
    ///
    /// Each mold is placed on every channel of its class grid and stepped
    /// down the frame with random time skips, for every background, allowed
    /// SNR and target length. Full-length packets are repeated
    /// `full_length_ratio` times.
    pub fn plan_single(
        &mut self,
        category: i32,
        save_path: &Path,
    ) -> Result<(Vec<FrameJob>, GenerationReport)> {
        let name = self.tables.name(category);
        let augment = *self
            .tables
            .augment
            .get(&category)
            .ok_or_else(|| anyhow!("Class {} has no channel grid", name))?;
        let specs = self.specs_of(category)?;
        let backgrounds = self.background_names()?;
        let config = &self.config;

        let mut report = GenerationReport::new(name.clone(), save_path);
        let mut jobs = Vec::new();

        for spec in &specs {
            let (mold_length, mold_width) = mold_dim(&self.library, &spec.name)?;
            let lefts = channel_offsets(&augment, mold_width, config.limit_index, augment.skip);

            for background in &backgrounds {
                for (snr_index, &snr) in config.snr_range.iter().enumerate() {
                    if !spec.allows_snr(snr_index) {
                        continue;
                    }

                    let first_index = jobs.len();
                    for (target, repeats) in single_lengths(spec, config) {
                        let length = planned_length(
                            mold_length,
                            target.unwrap_or(mold_length),
                            config.cushion,
                            spec.var_length,
                        );

                        for _ in 0..repeats {
                            for &left in &lefts {
                                let tops = time_offsets(
                                    &mut self.rng,
                                    length,
                                    config.nlines,
                                    config.time_skip_range,
                                    spec.var_length,
                                );
                                for top in tops {
                                    let image_path =
                                        save_path.join(format!("{}_{}.jpg", name, jobs.len()));
                                    jobs.push(FrameJob {
                                        background: background.clone(),
                                        image_path,
                                        packets: vec![PacketRecipe {
                                            mold: spec.name.clone(),
                                            attenuation: snr,
                                            length: target,
                                            left,
                                            top,
                                        }],
                                    });
                                }
                            }
                        }
                    }
                    report.record(
                        format!("{} on {} at snr {}", spec.name, background, snr),
                        first_index,
                        jobs.len(),
                    );
                }
            }
        }

        Ok((jobs, report))
    }

    /// Plan `num_coll_iter` random collision frames per setting.
    ///
    /// A setting is a background, a mold and SNR of the first class and a
    /// mold and SNR of the second class. Settings pairing the lowest and the
    /// highest SNR are left out, since the weaker packet would not show.
    pub fn plan_collisions(
        &mut self,
        first: i32,
        second: i32,
        save_path: &Path,
    ) -> Result<(Vec<FrameJob>, GenerationReport)> {
        let (name1, name2) = (self.tables.name(first), self.tables.name(second));
        let specs1 = self.specs_of(first)?;
        let specs2 = self.specs_of(second)?;
        let backgrounds = self.background_names()?;
        let config = &self.config;

        let (shortest, longest) = config.collision_length_range;
        let longest = longest.min(config.nlines);
        if shortest > longest {
            bail!(
                "Empty collision length range {:?} for {} lines",
                config.collision_length_range,
                config.nlines
            );
        }
        let bounds = CollisionBounds {
            frame_height: config.nlines,
            limit_index: config.limit_index,
            error: config.collision_error,
            max_attempts: config.max_placement_attempts,
        };
        let snr_count = config.snr_range.len();

        let mut report = GenerationReport::new(format!("collision_{}_{}", name1, name2), save_path);
        let mut jobs = Vec::new();

        for background in &backgrounds {
            for spec1 in &specs1 {
                let (length1, width1) = mold_dim(&self.library, &spec1.name)?;
                for (index1, &snr1) in config.snr_range.iter().enumerate() {
                    if !spec1.allows_snr(index1) {
                        continue;
                    }
                    for spec2 in &specs2 {
                        let (length2, width2) = mold_dim(&self.library, &spec2.name)?;
                        for (index2, &snr2) in config.snr_range.iter().enumerate() {
                            if !spec2.allows_snr(index2) || opposite_ends(index1, index2, snr_count) {
                                continue;
                            }

                            let first_index = jobs.len();
                            for _ in 0..config.num_coll_iter {
                                let target1 = spec1
                                    .var_length
                                    .then(|| self.rng.gen_range(shortest..=longest));
                                let target2 = spec2
                                    .var_length
                                    .then(|| self.rng.gen_range(shortest..=longest));

                                let packet1 = CollisionPacket {
                                    class: first,
                                    length: planned_length(
                                        length1,
                                        target1.unwrap_or(length1),
                                        config.cushion,
                                        spec1.var_length,
                                    ),
                                    width: width1,
                                    attenuation: snr1,
                                    always_visible: spec1.always_visible,
                                };
                                let packet2 = CollisionPacket {
                                    class: second,
                                    length: planned_length(
                                        length2,
                                        target2.unwrap_or(length2),
                                        config.cushion,
                                        spec2.var_length,
                                    ),
                                    width: width2,
                                    attenuation: snr2,
                                    always_visible: spec2.always_visible,
                                };

                                let plan = plan_collision(
                                    &packet1,
                                    &packet2,
                                    &self.tables,
                                    &bounds,
                                    &mut self.rng,
                                );
                                let Some((place1, place2)) = plan else {
                                    report.unplaced += 1;
                                    continue;
                                };

                                let image_path = save_path.join(format!(
                                    "collision_{}_{}_{}.jpg",
                                    name1,
                                    name2,
                                    jobs.len()
                                ));
                                jobs.push(FrameJob {
                                    background: background.clone(),
                                    image_path,
                                    packets: vec![
                                        PacketRecipe {
                                            mold: spec1.name.clone(),
                                            attenuation: snr1,
                                            length: target1,
                                            left: place1.left,
                                            top: place1.top,
                                        },
                                        PacketRecipe {
                                            mold: spec2.name.clone(),
                                            attenuation: snr2,
                                            length: target2,
                                            left: place2.left,
                                            top: place2.top,
                                        },
                                    ],
                                });
                            }
                            report.record(
                                format!(
                                    "{} at snr {} with {} at snr {} on {}",
                                    spec1.name, snr1, spec2.name, snr2, background
                                ),
                                first_index,
                                jobs.len(),
                            );
                        }
                    }
                }
            }
        }

        if report.unplaced > 0 {
            tracing::warn!("{} collision draws found no placement", report.unplaced);
        }
        Ok((jobs, report))
    }

    fn specs_of(&self, category: i32) -> Result<Vec<MoldSpec>> {
        let specs: Vec<MoldSpec> = self.library.molds_of(category).cloned().collect();
        if specs.is_empty() {
            bail!("No molds loaded for class {}", self.tables.name(category));
        }
        Ok(specs)
    }

    fn background_names(&self) -> Result<Vec<String>> {
        let names: Vec<String> = self.library.background_names().map(String::from).collect();
        if names.is_empty() {
            bail!("No backgrounds loaded");
        }
        Ok(names)
    }
}

fn mold_dim(library: &MoldLibrary, name: &str) -> Result<(usize, usize)> {
    library
        .mold(name)
        .map(|(_, data)| data.dim())
        .ok_or_else(|| anyhow!("Unknown mold: {}", name))
}

/// Target lengths of a mold with their repetition counts
fn single_lengths(spec: &MoldSpec, config: &SynthConfig) -> Vec<(Option<usize>, usize)> {
    if !spec.var_length {
        return vec![(None, 1)];
    }

    let (shortest, longest) = config.length_range;
    let longest = longest.min(config.nlines);
    (shortest..=longest)
        .step_by(config.length_step.max(1))
        .map(|length| {
            let repeats = if length == longest {
                config.full_length_ratio
            } else {
                1
            };
            (Some(length), repeats)
        })
        .collect()
}

/// Top offsets stepping down a frame of `nlines` rows by random skips.
///
/// Fixed-length packets never touch the last row.
fn time_offsets<R: Rng + ?Sized>(
    rng: &mut R,
    length: usize,
    nlines: usize,
    skip_range: (usize, usize),
    reach_end: bool,
) -> Vec<usize> {
    let fits = |top: usize| {
        if reach_end {
            top + length <= nlines
        } else {
            top + length < nlines
        }
    };
    let (low, high) = (skip_range.0.max(1), skip_range.1);

    let mut tops = Vec::new();
    let mut top = 0;
    while fits(top) {
        tops.push(top);
        top += rng.gen_range(low..high.max(low + 1));
    }
    tops
}

/// Whether two SNR indices sit at opposite ends of a range of at least three
fn opposite_ends(index1: usize, index2: usize, count: usize) -> bool {
    count >= 3 && index1.abs_diff(index2) == count - 1
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn small_config() -> SynthConfig {
        SynthConfig {
            nfft: 64,
            nlines: 64,
            limit_index: 60,
            snr_range: vec![-10.0, 0.0, 10.0],
            length_range: (20, 60),
            length_step: 20,
            full_length_ratio: 2,
            num_coll_iter: 3,
            collision_length_range: (20, 40),
            time_skip_range: (10, 20),
            cushion: 5,
            backgrounds: Vec::new(),
            molds: Vec::new(),
            ..SynthConfig::default()
        }
    }

    fn small_library() -> MoldLibrary {
        let mut library = MoldLibrary::new();
        library.add_background("noise", Array2::from_elem((64, 64), -10.0));
        library.add_mold(
            MoldSpec::new("zigbee", 2, "zigbee.npy", true),
            Array2::from_elem((30, 4), 20.0),
        );
        library.add_mold(
            MoldSpec::new("wifi_1", 0, "wifi_1.npy", true),
            Array2::from_elem((30, 20), 25.0),
        );
        library
    }

    fn small_tables() -> ClassTables {
        let mut tables = ClassTables::default();
        tables.augment.insert(
            0,
            spread_core::AugmentChannel { start: 0, space: 10, skip: 2 },
        );
        tables.augment.insert(
            2,
            spread_core::AugmentChannel { start: 2, space: 5, skip: 4 },
        );
        tables
    }

    fn generator(seed: u64) -> Generator<StdRng> {
        Generator::new(
            small_config(),
            small_tables(),
            small_library(),
            StdRng::seed_from_u64(seed),
        )
    }

    #[test]
    fn test_single_lengths() {
        let config = small_config();
        let spec = MoldSpec::new("zigbee", 2, "zigbee.npy", true);
        assert_eq!(
            single_lengths(&spec, &config),
            vec![(Some(20), 1), (Some(40), 1), (Some(60), 2)]
        );

        let fixed = MoldSpec::new("wifi_2", 0, "wifi_2.npy", false);
        assert_eq!(single_lengths(&fixed, &config), vec![(None, 1)]);
    }

    #[test]
    fn test_time_offsets_fit() {
        let mut rng = StdRng::seed_from_u64(1);
        let tops = time_offsets(&mut rng, 30, 100, (10, 30), true);
        assert_eq!(tops[0], 0);
        assert!(tops.windows(2).all(|w| (10..30).contains(&(w[1] - w[0]))));
        assert!(tops.iter().all(|&t| t + 30 <= 100));

        assert_eq!(time_offsets(&mut rng, 100, 100, (10, 30), true), vec![0]);
        assert!(time_offsets(&mut rng, 100, 100, (10, 30), false).is_empty());
    }

    #[test]
    fn test_opposite_ends() {
        assert!(opposite_ends(0, 2, 3));
        assert!(opposite_ends(2, 0, 3));
        assert!(!opposite_ends(0, 1, 3));
        assert!(!opposite_ends(0, 1, 2));
    }

    #[test]
    fn test_plan_single_grid() -> Result<()> {
        let mut generator = generator(5);
        let (jobs, report) = generator.plan_single(2, Path::new("out"))?;

        // 3 SNRs, and per SNR the lengths 20, 40 and twice 60
        assert_eq!(report.settings.len(), 3);
        assert_eq!(report.planned, jobs.len());
        assert!(!jobs.is_empty());

        for (index, job) in jobs.iter().enumerate() {
            assert_eq!(job.image_path, Path::new("out").join(format!("zigbee_{}.jpg", index)));
            let recipe = &job.packets[0];
            assert_eq!((recipe.left - 2) % 20, 0);
            assert!(recipe.left + 4 < 60);
            assert!(recipe.top + recipe.length.unwrap_or(30) <= 64);
        }
        Ok(())
    }

    #[test]
    fn test_planning_is_reproducible() -> Result<()> {
        let (a, _) = generator(9).plan_collisions(0, 2, Path::new("out"))?;
        let (b, _) = generator(9).plan_collisions(0, 2, Path::new("out"))?;
        assert_eq!(a, b);
        Ok(())
    }

    #[test]
    fn test_plan_collisions_skips_opposite_snrs() -> Result<()> {
        let mut generator = generator(3);
        let (jobs, report) = generator.plan_collisions(0, 2, Path::new("out"))?;

        // 9 SNR pairs minus (-10, 10) and (10, -10)
        assert_eq!(report.settings.len(), 7);
        assert_eq!(jobs.len() + report.unplaced, 7 * 3);
        for job in &jobs {
            assert_eq!(job.packets.len(), 2);
            assert!((job.packets[0].attenuation - job.packets[1].attenuation).abs() < 20.0);
        }
        Ok(())
    }

    #[test]
    fn test_compose_places_every_packet() -> Result<()> {
        let mut generator = generator(4);
        let (jobs, _) = generator.plan_collisions(0, 2, Path::new("out"))?;
        let renderer = FrameRenderer::new(generator.config(), generator.library());

        for job in jobs.iter().take(5) {
            let frame = renderer.compose(job)?;
            assert_eq!(frame.annotations.len(), 2);
            assert_eq!(frame.packets[0].category, 0);
            assert_eq!(frame.packets[1].category, 2);
        }
        Ok(())
    }

    #[test]
    fn test_unknown_class_is_an_error() {
        assert!(generator(1).plan_single(4, Path::new("out")).is_err());
        assert!(generator(1).generate(&[0, 2, 4], Path::new("out")).is_err());
    }

    #[test]
    fn test_generate_writes_frames_and_report() -> Result<()> {
        let dir = std::env::temp_dir().join(format!("spread-synth-gen-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        let mut generator = generator(2);
        let report = generator.generate(&[2], &dir)?;

        assert_eq!(report.failed, 0);
        assert_eq!(report.rendered, report.planned);
        assert!(dir.join("zigbee_0.jpg").exists());
        assert!(dir.join("zigbee_0.txt").exists());
        assert!(dir.join("report_zigbee.json").exists());

        let labels = std::fs::read_to_string(dir.join("zigbee_0.txt"))?;
        assert_eq!(labels.lines().count(), 1);
        assert!(labels.starts_with("2 "));

        std::fs::remove_dir_all(&dir)?;
        Ok(())
    }
}
