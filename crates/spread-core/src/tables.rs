//! Class-indexed configuration tables
//!
//! Merge thresholds, RF channel geometry and augmentation channel grids for
//! every emission class. The defaults carry the values of the reference
//! 2.4 GHz recordings (100 MHz span starting at 2390 MHz, 512 FFT bins).

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Per-class thresholds used when merging annotations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeThresholds {
    /// Fractional tolerance (of the mean width) for two edges to count as equal
    pub side: BTreeMap<i32, f64>,
    /// Maximum normalized vertical gap between two mergeable regions
    pub time: BTreeMap<i32, f64>,
}

impl MergeThresholds {
    /// `(side, time)` thresholds of a class, if both are configured
    pub fn get(&self, label: i32) -> Option<(f64, f64)> {
        Some((*self.side.get(&label)?, *self.time.get(&label)?))
    }

    /// Same thresholds for every listed class
    pub fn uniform(labels: impl IntoIterator<Item = i32>, side: f64, time: f64) -> Self {
        let labels: Vec<i32> = labels.into_iter().collect();
        Self {
            side: labels.iter().map(|&l| (l, side)).collect(),
            time: labels.iter().map(|&l| (l, time)).collect(),
        }
    }
}

impl Default for MergeThresholds {
    fn default() -> Self {
        Self {
            side: BTreeMap::from([(0, 0.1), (1, 0.3), (2, 0.5), (3, 0.5), (4, 0.5)]),
            time: BTreeMap::from([
                (0, 2.0 / 512.0),
                (1, 1.0 / 512.0),
                (2, 1.0 / 512.0),
                (3, 2.0 / 512.0),
                (4, 2.0 / 512.0),
            ]),
        }
    }
}

/// RF channel plan of a class: channel index to center frequency (MHz)
///
/// An empty `centers` map means the class has no fixed channels (frequency
/// hopping or free tuning) and is ignored by collision checks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelGeometry {
    pub centers: BTreeMap<u32, f64>,
    pub bandwidth: f64,
}

impl ChannelGeometry {
    /// Evenly spaced channels `first..=last` starting at `first_center`
    pub fn spaced(first: u32, last: u32, first_center: f64, spacing: f64, bandwidth: f64) -> Self {
        let centers = (first..=last)
            .map(|ch| (ch, first_center + f64::from(ch - first) * spacing))
            .collect();
        Self { centers, bandwidth }
    }

    pub fn undefined(bandwidth: f64) -> Self {
        Self {
            centers: BTreeMap::new(),
            bandwidth,
        }
    }

    pub fn is_defined(&self) -> bool {
        !self.centers.is_empty()
    }

    /// Occupied `(low, high)` frequency range of a channel
    pub fn range(&self, channel: u32) -> Option<(f64, f64)> {
        let center = *self.centers.get(&channel)?;
        Some((center - self.bandwidth / 2.0, center + self.bandwidth / 2.0))
    }
}

/// Horizontal placement grid of a class in the synthetic canvas (FFT bins)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AugmentChannel {
    /// First usable left offset
    pub start: usize,
    /// Channel spacing
    pub space: usize,
    /// Channels skipped between single-emission samples
    pub skip: usize,
}

/// All class tables
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassTables {
    pub names: BTreeMap<i32, String>,
    pub merge: MergeThresholds,
    pub channels: BTreeMap<i32, ChannelGeometry>,
    pub augment: BTreeMap<i32, AugmentChannel>,
}

impl Default for ClassTables {
    fn default() -> Self {
        let names = ["wifi", "bluetooth", "zigbee", "lightbridge", "wmic"]
            .iter()
            .enumerate()
            .map(|(i, name)| (i as i32, name.to_string()))
            .collect();

        let channels = BTreeMap::from([
            (0, ChannelGeometry::spaced(0, 12, 2412.0, 5.0, 22.0)),
            (1, ChannelGeometry::undefined(1.0)),
            (2, ChannelGeometry::spaced(11, 26, 2405.0, 5.0, 2.0)),
            (3, ChannelGeometry::spaced(13, 19, 2406.0, 10.0, 10.0)),
            (4, ChannelGeometry::undefined(2.0)),
        ]);

        let augment = BTreeMap::from([
            (0, AugmentChannel { start: 56, space: 25, skip: 2 }),
            (1, AugmentChannel { start: 56, space: 10, skip: 5 }),
            (2, AugmentChannel { start: 71, space: 25, skip: 2 }),
            (3, AugmentChannel { start: 61, space: 51, skip: 1 }),
            (4, AugmentChannel { start: 56, space: 25, skip: 2 }),
        ]);

        Self {
            names,
            merge: MergeThresholds::default(),
            channels,
            augment,
        }
    }
}

impl ClassTables {
    /// Load tables from a JSON file
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read class tables: {:?}", path.as_ref()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse class tables: {:?}", path.as_ref()))
    }

    /// Class name, or the numeric label when unnamed
    pub fn name(&self, label: i32) -> String {
        self.names
            .get(&label)
            .cloned()
            .unwrap_or_else(|| label.to_string())
    }

    pub fn class_of(&self, name: &str) -> Option<i32> {
        self.names
            .iter()
            .find(|(_, n)| n.as_str() == name)
            .map(|(&label, _)| label)
    }
}
