//! Synthetic frame composition
//!
//! A frame starts as a copy of a background mold. Packets are blended in the
//! linear power domain, so overlapping emissions add up the way RF power
//! does, and every placement yields the annotation of the placed packet.

use crate::packet::Packet;
use crate::render::{RenderSettings, render_power};
use crate::Result;
use anyhow::Context;
use ndarray::{Array2, s};
use spread_core::annotation::normalize;
use spread_core::io::write_annotations;
use spread_core::{Annotation, AnnotationSet};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Noise floor (dB) used for power blending unless configured otherwise
pub const DEFAULT_NOISE_FLOOR: f64 = -45.0;

/// Placement failures
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    #[error(
        "packet of {length}x{width} at (left {left}, top {top}) exceeds the {height}x{frame_width} frame"
    )]
    OutOfBounds {
        left: usize,
        top: usize,
        length: usize,
        width: usize,
        height: usize,
        frame_width: usize,
    },
}

/// Sum of two dB values in the linear power domain
pub fn combine_db(a: f64, b: f64, noise_floor: f64) -> f64 {
    let pa = 10f64.powf((a + noise_floor) / 10.0);
    let pb = 10f64.powf((b + noise_floor) / 10.0);
    10.0 * (pa + pb).log10() - noise_floor
}

/// One synthetic spectrogram under construction
#[derive(Debug, Clone)]
pub struct Frame {
    pub data: Array2<f64>,
    pub packets: Vec<Packet>,
    pub annotations: AnnotationSet,
    pub noise_floor: f64,
    image_path: PathBuf,
}

impl Frame {
    /// New frame over a copy of `background`, saved later to `image_path`
    pub fn new<P: AsRef<Path>>(image_path: P, background: &Array2<f64>) -> Self {
        Self {
            data: background.clone(),
            packets: Vec::new(),
            annotations: AnnotationSet::new(),
            noise_floor: DEFAULT_NOISE_FLOOR,
            image_path: image_path.as_ref().to_path_buf(),
        }
    }

    pub fn with_noise_floor(mut self, noise_floor: f64) -> Self {
        self.noise_floor = noise_floor;
        self
    }

    pub fn width(&self) -> usize {
        self.data.ncols()
    }

    pub fn height(&self) -> usize {
        self.data.nrows()
    }

    pub fn image_path(&self) -> &Path {
        &self.image_path
    }

    /// Sidecar annotation file: the image path with a `.txt` extension
    pub fn annotation_path(&self) -> PathBuf {
        self.image_path.with_extension("txt")
    }

    /// Place a packet with the frame noise floor
    pub fn place(
        &mut self,
        packet: Packet,
        left: usize,
        top: usize,
    ) -> std::result::Result<Annotation, FrameError> {
        self.place_with_noise(packet, left, top, self.noise_floor)
    }

    /// Blend `packet` into the frame with its top-left corner at `(left, top)`.
    ///
    /// Returns the annotation of the placed packet. The vertical axis of the
    /// annotation is mirrored since rendered pictures are flipped.
    pub fn place_with_noise(
        &mut self,
        packet: Packet,
        left: usize,
        top: usize,
        noise_floor: f64,
    ) -> std::result::Result<Annotation, FrameError> {
        let (length, width) = (packet.length(), packet.width());
        let (height, frame_width) = (self.height(), self.width());

        if left + width > frame_width || top + length > height {
            return Err(FrameError::OutOfBounds {
                left,
                top,
                length,
                width,
                height,
                frame_width,
            });
        }

        self.data
            .slice_mut(s![top..top + length, left..left + width])
            .zip_mut_with(&packet.data, |f, &p| *f = combine_db(*f, p, noise_floor));

        let frame_width = frame_width as f64;
        let height = height as f64;
        let x_c = left as f64 + width as f64 / 2.0;
        let y_c = height - top as f64 - length as f64 / 2.0;

        let annotation = Annotation::new(
            packet.category,
            normalize(x_c, frame_width),
            normalize(y_c, height),
            normalize(width as f64, frame_width),
            normalize(length as f64, height),
        );

        self.annotations.push(annotation);
        self.packets.push(packet);
        Ok(annotation)
    }

    /// Render the frame and write the image and its annotation file
    pub fn save(&self, settings: &RenderSettings) -> Result<()> {
        let image = render_power(&self.data, settings);
        image
            .save(&self.image_path)
            .with_context(|| format!("Failed to save frame image: {:?}", self.image_path))?;
        write_annotations(self.annotation_path(), &self.annotations)
    }
}
