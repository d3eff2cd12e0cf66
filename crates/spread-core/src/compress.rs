//! Temporal compression of annotations
//!
//! Compressed pictures are built by stacking `factor` consecutive pictures
//! vertically and squeezing the stack back to one picture height. The first
//! picture of a window ends up at the bottom of the compressed picture.

use crate::annotation::{Annotation, AnnotationSet};
use crate::error::CompressError;
use crate::tables::MergeThresholds;
use serde::{Deserialize, Serialize};

/// Compression window settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Compressor {
    /// Number of pictures stacked into one compressed picture
    pub factor: usize,
    /// Picture height in pixels
    pub image_size: usize,
    /// Merge the compressed annotations of a window
    pub merge: bool,
}

impl Default for Compressor {
    fn default() -> Self {
        Self {
            factor: 12,
            image_size: 512,
            merge: true,
        }
    }
}

impl Compressor {
    pub fn new(factor: usize) -> Self {
        Self {
            factor,
            ..Default::default()
        }
    }

    /// Check that the factor and the picture height are positive
    pub fn validate(&self) -> Result<(), CompressError> {
        if self.factor == 0 {
            return Err(CompressError::ZeroFactor);
        }
        if self.image_size == 0 {
            return Err(CompressError::ZeroImageSize);
        }
        Ok(())
    }

    /// Compress one annotation of the picture at `pic_index` within its window.
    ///
    /// Boxes thinner than one pixel after compression come back empty, and
    /// so does every box when the settings are invalid.
    pub fn compress(&self, annotation: &Annotation, pic_index: usize) -> Annotation {
        if annotation.is_empty() || self.validate().is_err() {
            return Annotation::empty();
        }

        let factor = self.factor as f64;
        let height = annotation.height / factor;
        if height < 1.0 / self.image_size as f64 {
            return Annotation::empty();
        }

        let y_c = (annotation.y_c + factor - pic_index as f64 - 1.0) / factor;
        Annotation::new(annotation.label, annotation.x_c, y_c, annotation.width, height)
    }

    /// Compress a full window of per-picture annotations into one set
    pub fn compress_window(
        &self,
        window: &[AnnotationSet],
        thresholds: &MergeThresholds,
    ) -> Result<AnnotationSet, CompressError> {
        self.validate()?;

        let compressed: AnnotationSet = window
            .iter()
            .enumerate()
            .flat_map(|(pic_index, pictures)| {
                pictures.iter().map(move |a| self.compress(a, pic_index))
            })
            .collect();

        Ok(if self.merge {
            compressed.merge(thresholds)
        } else {
            compressed.without_empty()
        })
    }

    /// Compress a whole picture sequence, one set per complete window.
    ///
    /// A trailing window with fewer than `factor` pictures is not compressed.
    pub fn compress_sequence(
        &self,
        pictures: &[AnnotationSet],
        thresholds: &MergeThresholds,
    ) -> Result<Vec<AnnotationSet>, CompressError> {
        self.validate()?;

        let windows = pictures.chunks_exact(self.factor);
        let remainder = windows.remainder().len();
        if remainder > 0 {
            tracing::debug!(
                "Skipping {} trailing pictures that do not fill a window of {}",
                remainder,
                self.factor
            );
        }

        windows
            .map(|window| self.compress_window(window, thresholds))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_sub_pixel_box_dropped() {
        let compressor = Compressor::new(12);
        let thin = Annotation::new(0, 0.5, 0.5, 0.1, 0.001);
        assert!(compressor.compress(&thin, 0).is_empty());
        assert!(compressor.compress(&Annotation::empty(), 3).is_empty());
    }

    #[test]
    fn test_shrink_and_placement() {
        let compressor = Compressor::new(4);
        let a = Annotation::new(1, 0.3, 0.5, 0.1, 0.4);

        let first = compressor.compress(&a, 0);
        assert_abs_diff_eq!(first.height, 0.1, epsilon = 1e-12);
        assert_abs_diff_eq!(first.y_c, 3.5 / 4.0, epsilon = 1e-12);
        assert_eq!(first.x_c, a.x_c);
        assert_eq!(first.width, a.width);

        let last = compressor.compress(&a, 3);
        assert_abs_diff_eq!(last.y_c, 0.5 / 4.0, epsilon = 1e-12);
    }

    #[test]
    fn test_window_merges_continuations() {
        // a transmission spanning the border between two pictures
        let compressor = Compressor::new(2);
        let thresholds = MergeThresholds::uniform([0], 0.1, 2.0 / 512.0);
        let window = vec![
            AnnotationSet::from_vec(vec![Annotation::from_borders(0, 0.2, 0.3, 0.5, 0.0).unwrap()]),
            AnnotationSet::from_vec(vec![Annotation::from_borders(0, 0.2, 0.3, 1.0, 0.5).unwrap()]),
        ];

        let merged = compressor.compress_window(&window, &thresholds).unwrap();
        assert_eq!(merged.len(), 1);
        let m = merged.as_slice()[0];
        assert_abs_diff_eq!(m.up(), 0.25, epsilon = 1e-9);
        assert_abs_diff_eq!(m.down(), 0.75, epsilon = 1e-9);
    }

    #[test]
    fn test_sequence_skips_partial_window() {
        let compressor = Compressor {
            merge: false,
            ..Compressor::new(3)
        };
        let picture = AnnotationSet::from_vec(vec![Annotation::new(2, 0.5, 0.5, 0.1, 0.3)]);
        let pictures = vec![picture; 7];

        let windows = compressor
            .compress_sequence(&pictures, &MergeThresholds::default())
            .unwrap();
        assert_eq!(windows.len(), 2);
        assert!(windows.iter().all(|w| w.len() == 3));
    }

    #[test]
    fn test_zero_settings_rejected() {
        let thresholds = MergeThresholds::default();
        let picture = AnnotationSet::from_vec(vec![Annotation::new(0, 0.5, 0.5, 0.1, 0.3)]);

        let no_factor = Compressor::new(0);
        assert_eq!(
            no_factor.compress_sequence(&[picture.clone()], &thresholds),
            Err(CompressError::ZeroFactor)
        );
        assert_eq!(
            no_factor.compress_window(&[picture.clone()], &thresholds),
            Err(CompressError::ZeroFactor)
        );
        assert!(no_factor.compress(&picture.as_slice()[0], 0).is_empty());

        let no_height = Compressor {
            image_size: 0,
            ..Compressor::new(2)
        };
        assert_eq!(
            no_height.compress_sequence(&[], &thresholds),
            Err(CompressError::ZeroImageSize)
        );
    }
}
