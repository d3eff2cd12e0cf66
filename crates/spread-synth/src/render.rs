//! Power array to picture conversion

use image::{Rgb, RgbImage};
use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Clip range mapped onto the 8-bit gray scale
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RenderSettings {
    pub min_snr: f64,
    pub max_snr: f64,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            min_snr: -10.0,
            max_snr: 50.0,
        }
    }
}

impl RenderSettings {
    /// Gray level of a dB value, clipped into the configured range
    pub fn gray_level(&self, value: f64) -> u8 {
        let clipped = value.clamp(self.min_snr, self.max_snr);
        ((clipped - self.min_snr) / (self.max_snr - self.min_snr) * 255.0) as u8
    }
}

/// Render a power array as a 3-channel gray picture.
///
/// Rows are flipped so the first time line ends up at the bottom.
pub fn render_power(data: &Array2<f64>, settings: &RenderSettings) -> RgbImage {
    let (rows, cols) = data.dim();
    RgbImage::from_fn(cols as u32, rows as u32, |x, y| {
        let level = settings.gray_level(data[[rows - 1 - y as usize, x as usize]]);
        Rgb([level, level, level])
    })
}
