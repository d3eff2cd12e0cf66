//! Subcommand drivers

use crate::{CompressArgs, MergeArgs, SynthArgs};
use anyhow::{Context, Result};
use rand::SeedableRng;
use rand::rngs::StdRng;
use spread_core::io::{list_annotation_files, picture_prefix, read_annotations, write_annotations};
use spread_core::{AnnotationSet, ClassTables, Compressor, MergeThresholds};
use spread_synth::{Generator, MoldLibrary, SynthConfig};
use std::path::{Path, PathBuf};

fn load_tables(path: Option<&Path>) -> Result<ClassTables> {
    match path {
        Some(path) => ClassTables::from_json_file(path),
        None => Ok(ClassTables::default()),
    }
}

pub fn run_synth(args: &SynthArgs) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => SynthConfig::from_json_file(path)?,
        None => SynthConfig::default(),
    };
    if let Some(root) = &args.mold_root {
        config = config.with_mold_root(root);
    }
    let tables = load_tables(args.tables.as_deref())?;

    let library = MoldLibrary::load(&config, &args.categories)?;
    let mut generator = Generator::new(config, tables, library, StdRng::seed_from_u64(args.seed));
    let report = generator.generate(&args.categories, &args.save_path)?;

    println!(
        "{}: {} frames rendered, {} failed, {} unplaced collisions",
        report.scene, report.rendered, report.failed, report.unplaced
    );
    Ok(())
}

pub fn run_compress(args: &CompressArgs) -> Result<()> {
    let tables = load_tables(args.tables.as_deref())?;
    let compressor = Compressor {
        factor: args.factor,
        image_size: args.image_size,
        merge: !args.no_merge,
    };

    let written = compress_directory(
        &args.input,
        &args.output,
        args.prefix.as_deref(),
        &compressor,
        &tables.merge,
    )?;
    println!("Wrote {} compressed annotation files to {:?}", written.len(), args.output);
    Ok(())
}

pub fn run_merge(args: &MergeArgs) -> Result<()> {
    let tables = load_tables(args.tables.as_deref())?;
    let merged = read_annotations(&args.file)?.merge(&tables.merge);

    if args.in_place {
        write_annotations(&args.file, &merged)?;
        tracing::info!("Merged {:?} into {} boxes", args.file, merged.len());
    } else {
        print!("{}", merged.to_lines());
    }
    Ok(())
}

/// Compress every complete window of the annotation files in `input`.
///
/// Files are taken in picture id order. Window `n` is written to
/// `<prefix>_<n>.txt` under `output`.
pub fn compress_directory(
    input: &Path,
    output: &Path,
    prefix: Option<&str>,
    compressor: &Compressor,
    thresholds: &MergeThresholds,
) -> Result<Vec<PathBuf>> {
    compressor.validate()?;

    let files = list_annotation_files(input)?;
    let prefix = match prefix {
        Some(prefix) => prefix.to_string(),
        None => files
            .first()
            .and_then(|path| path.file_name())
            .map(|name| picture_prefix(&name.to_string_lossy()).to_string())
            .unwrap_or_else(|| "compressed".to_string()),
    };
    tracing::info!("Compressing {} annotation files from {:?}", files.len(), input);

    let pictures = files
        .iter()
        .map(read_annotations)
        .collect::<Result<Vec<AnnotationSet>>>()?;

    std::fs::create_dir_all(output)
        .with_context(|| format!("Failed to create output directory: {:?}", output))?;

    let mut written = Vec::new();
    let windows = compressor.compress_sequence(&pictures, thresholds)?;
    for (index, window) in windows.iter().enumerate() {
        let path = output.join(format!("{}_{}.txt", prefix, index));
        write_annotations(&path, window)?;
        written.push(path);
    }

    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use spread_core::Annotation;

    #[test]
    fn test_compress_directory() -> Result<()> {
        let root = std::env::temp_dir().join(format!("spread-compress-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&root);
        let input = root.join("labels");
        std::fs::create_dir_all(&input)?;

        // 5 pictures with a factor of 2 give 2 windows, the last picture is left out
        for id in 0..5 {
            let set = AnnotationSet::from_vec(vec![Annotation::new(2, 0.5, 0.5, 0.1, 0.5)]);
            write_annotations(input.join(format!("capture_{}.txt", id)), &set)?;
        }

        let compressor = Compressor {
            factor: 2,
            image_size: 512,
            merge: false,
        };
        let output = root.join("compressed");
        let written =
            compress_directory(&input, &output, None, &compressor, &MergeThresholds::default())?;

        assert_eq!(written, vec![output.join("capture_0.txt"), output.join("capture_1.txt")]);
        let window = read_annotations(&written[0])?;
        assert_eq!(window.len(), 2);
        assert!(window.iter().all(|a| (a.height - 0.25).abs() < 1e-6));

        std::fs::remove_dir_all(&root)?;
        Ok(())
    }

    #[test]
    fn test_compress_directory_rejects_zero_factor() {
        let compressor = Compressor {
            factor: 0,
            ..Compressor::default()
        };
        let missing = Path::new("no-such-labels");
        assert!(
            compress_directory(missing, missing, None, &compressor, &MergeThresholds::default())
                .is_err()
        );
        assert!(!missing.exists());
    }
}
