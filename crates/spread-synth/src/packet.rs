//! Emission packets
//!
//! A packet is the power patch of one transmission (rows = time, columns =
//! frequency bins, values in dB) cut from a recording. Packets are adjusted
//! in SNR and length before being placed into a frame.

use ndarray::{Array2, Axis};

/// Default number of rows kept intact at each end when extending a packet
pub const DEFAULT_CUSHION: usize = 20;

/// Outcome of [`Packet::adjust_length`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LengthChange {
    Truncated,
    Extended,
    Unchanged,
}

/// One emission power patch
#[derive(Debug, Clone)]
pub struct Packet {
    pub data: Array2<f64>,
    pub category: i32,
    /// Whether the length may be adjusted
    pub var_length: bool,
}

impl Packet {
    /// New packet holding a copy of a mold
    pub fn new(mold: &Array2<f64>, category: i32, var_length: bool) -> Self {
        Self {
            data: mold.clone(),
            category,
            var_length,
        }
    }

    /// Number of rows (time)
    pub fn length(&self) -> usize {
        self.data.nrows()
    }

    /// Number of columns (frequency bins)
    pub fn width(&self) -> usize {
        self.data.ncols()
    }

    /// Attenuate every cell above `limit_threshold` by `attenuation` dB.
    ///
    /// Cells at or below the threshold (the noise floor) are left alone.
    pub fn adjust_snr(&mut self, attenuation: f64, limit_threshold: f64) {
        self.data
            .mapv_inplace(|v| if v > limit_threshold { v - attenuation } else { v });
    }

    /// Retarget the packet to `target_length` rows.
    ///
    /// Shrinking keeps the head and tail halves. Growing keeps the first
    /// `length - cushion` rows and then replicates interior rows until the
    /// target is reached.
    pub fn adjust_length(&mut self, target_length: usize, cushion: usize) -> LengthChange {
        let length = self.length();
        let change = length_change(length, target_length, cushion, self.var_length);

        match change {
            LengthChange::Truncated => {
                let rows = truncated_rows(length, target_length);
                self.data = self.data.select(Axis(0), &rows);
            }
            LengthChange::Extended => {
                let rows = extended_rows(length, target_length, cushion);
                self.data = self.data.select(Axis(0), &rows);
            }
            LengthChange::Unchanged if !self.var_length => {
                tracing::debug!("Packet of class {} has a fixed length", self.category);
            }
            LengthChange::Unchanged => {
                tracing::warn!(
                    "Packet of {} rows is too short to extend with a cushion of {}",
                    length,
                    cushion
                );
            }
        }

        change
    }
}

fn length_change(length: usize, target: usize, cushion: usize, var_length: bool) -> LengthChange {
    if !var_length {
        LengthChange::Unchanged
    } else if target <= length {
        LengthChange::Truncated
    } else if length < cushion || length <= 2 * cushion {
        // the replicated middle chunk would be empty
        LengthChange::Unchanged
    } else {
        LengthChange::Extended
    }
}

/// Row count a packet of `length` rows ends up with after
/// [`Packet::adjust_length`] to `target`
pub fn planned_length(length: usize, target: usize, cushion: usize, var_length: bool) -> usize {
    match length_change(length, target, cushion, var_length) {
        LengthChange::Unchanged => length,
        _ => target,
    }
}

/// Row indices keeping `target / 2` head rows and the remaining tail rows
fn truncated_rows(length: usize, target: usize) -> Vec<usize> {
    let head = target / 2;
    (0..head).chain(length - (target - head)..length).collect()
}

/// Row indices of an extended packet. Requires `length > 2 * cushion`.
fn extended_rows(length: usize, target: usize, cushion: usize) -> Vec<usize> {
    let body = length - cushion;
    let mut rows: Vec<usize> = (0..body).collect();

    while rows.len() < target {
        let gap = target - rows.len();
        if gap < body {
            rows.extend(length - gap..length);
        } else {
            rows.extend(cushion..body);
        }
    }

    rows
}
