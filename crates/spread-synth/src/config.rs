//! Synthesis configuration

use crate::collision::DEFAULT_COLLISION_ERROR;
use crate::frame::DEFAULT_NOISE_FLOOR;
use crate::packet::DEFAULT_CUSHION;
use crate::render::RenderSettings;
use crate::Result;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// A stored packet template
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoldSpec {
    pub name: String,
    pub category: i32,
    pub path: PathBuf,
    /// Whether packets cut from this mold may change length
    pub var_length: bool,
    /// Indices into the SNR range this mold is generated with (all if `None`)
    #[serde(default)]
    pub allowed_snr: Option<Vec<usize>>,
    /// Never hidden in collision scenes, even under a stronger packet
    #[serde(default)]
    pub always_visible: bool,
}

impl MoldSpec {
    pub fn new(name: &str, category: i32, path: &str, var_length: bool) -> Self {
        Self {
            name: name.to_string(),
            category,
            path: path.into(),
            var_length,
            allowed_snr: None,
            always_visible: false,
        }
    }

    /// Whether the SNR at `index` of the SNR range applies to this mold
    pub fn allows_snr(&self, index: usize) -> bool {
        self.allowed_snr
            .as_ref()
            .is_none_or(|allowed| allowed.contains(&index))
    }
}

/// A stored background canvas
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackgroundSpec {
    pub name: String,
    pub path: PathBuf,
}

/// Main synthesis configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthConfig {
    /// Canvas size (FFT bins x time lines)
    pub nfft: usize,
    pub nlines: usize,
    /// Noise floor (dB) used when blending packet power
    pub noise_floor: f64,
    pub render: RenderSettings,
    /// Highest usable frequency bin
    pub limit_index: usize,
    /// SNR reductions (dB) applied to packets
    pub snr_range: Vec<f64>,
    /// Packets lengths generated for variable-length molds, inclusive
    pub length_range: (usize, usize),
    pub length_step: usize,
    /// Repetitions of full-length packets per placement grid
    pub full_length_ratio: usize,
    /// Random scenes per collision setting
    pub num_coll_iter: usize,
    /// Random packet lengths in collision scenes, inclusive
    pub collision_length_range: (usize, usize),
    /// Random vertical step between single-emission samples, end exclusive
    pub time_skip_range: (usize, usize),
    pub cushion: usize,
    pub collision_error: usize,
    pub max_placement_attempts: usize,
    pub backgrounds: Vec<BackgroundSpec>,
    pub molds: Vec<MoldSpec>,
}

impl Default for SynthConfig {
    fn default() -> Self {
        let mut bt_1 = MoldSpec::new("bt_1", 1, "augmentation_data/molds/bt_1.npy", true);
        bt_1.allowed_snr = Some(vec![1, 2]);
        let mut bt_2 = MoldSpec::new("bt_2", 1, "augmentation_data/molds/bt_2.npy", true);
        bt_2.allowed_snr = Some(vec![1]);
        bt_2.always_visible = true;

        Self {
            nfft: 512,
            nlines: 512,
            noise_floor: DEFAULT_NOISE_FLOOR,
            render: RenderSettings::default(),
            limit_index: 476,
            snr_range: vec![-10.0, 0.0, 10.0],
            length_range: (62, 512),
            length_step: 15,
            full_length_ratio: 10,
            num_coll_iter: 500,
            collision_length_range: (100, 512),
            time_skip_range: (10, 30),
            cushion: DEFAULT_CUSHION,
            collision_error: DEFAULT_COLLISION_ERROR,
            max_placement_attempts: 1000,
            backgrounds: vec![BackgroundSpec {
                name: "background".to_string(),
                path: "augmentation_data/molds/background.npy".into(),
            }],
            molds: vec![
                MoldSpec::new("wifi_1", 0, "augmentation_data/molds/wifi_1.npy", true),
                MoldSpec::new("wifi_2", 0, "augmentation_data/molds/wifi_2.npy", false),
                bt_1,
                bt_2,
                MoldSpec::new("zigbee", 2, "augmentation_data/molds/zigbee.npy", true),
                MoldSpec::new("lightbridge", 3, "augmentation_data/molds/lightbridge.npy", true),
                MoldSpec::new("wmic", 4, "augmentation_data/molds/wmic.npy", true),
            ],
        }
    }
}

impl SynthConfig {
    /// Load a configuration from JSON; missing fields keep their defaults
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read synthesis config: {:?}", path.as_ref()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse synthesis config: {:?}", path.as_ref()))
    }

    /// Molds of one emission class
    pub fn molds_of(&self, category: i32) -> impl Iterator<Item = &MoldSpec> {
        self.molds.iter().filter(move |m| m.category == category)
    }

    /// Relocate relative mold and background paths under `root`
    pub fn with_mold_root<P: AsRef<Path>>(mut self, root: P) -> Self {
        let root = root.as_ref();
        for mold in &mut self.molds {
            mold.path = root.join(&mold.path);
        }
        for background in &mut self.backgrounds {
            background.path = root.join(&background.path);
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: SynthConfig =
            serde_json::from_str(r#"{ "noise_floor": -50.0, "snr_range": [0.0, 5.0] }"#).unwrap();
        assert_eq!(config.noise_floor, -50.0);
        assert_eq!(config.snr_range, vec![0.0, 5.0]);
        assert_eq!(config.nlines, 512);
        assert_eq!(config.render.max_snr, 50.0);
        assert_eq!(config.molds.len(), 7);
    }

    #[test]
    fn test_snr_filters() {
        let config = SynthConfig::default();
        let bluetooth: Vec<_> = config.molds_of(1).collect();
        assert_eq!(bluetooth.len(), 2);
        assert!(!bluetooth[0].allows_snr(0));
        assert!(bluetooth[0].allows_snr(2));
        assert!(bluetooth[1].allows_snr(1));
        assert!(!bluetooth[1].allows_snr(2));
        assert!(config.molds[0].allows_snr(0));
    }
}
