//! Normalized bounding boxes and annotation line formatting
//!
//! Core abstraction for emission regions in a spectrogram picture. Every
//! coordinate is relative to the picture size, so a pixel position of 322 in a
//! 512 wide picture is stored as 0.628906.

use crate::error::AnnotationError;
use crate::merge::merge_annotations;
use crate::tables::MergeThresholds;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Label carried by the empty annotation
pub const EMPTY_LABEL: i32 = -1;

/// Normalize a pixel coordinate by the picture size, rounded to 6 decimals
pub fn normalize(value: f64, size: f64) -> f64 {
    (value / size * 1e6).round() / 1e6
}

/// Absolute (pixel) value of a normalized coordinate, truncated
pub fn denormalize(value: f64, size: f64) -> i64 {
    (value * size) as i64
}

/// Axis selector for [`Annotation::scale`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Axis {
    Width,
    Height,
    Both,
}

/// One labeled emission region, normalized to [0, 1]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    pub label: i32,
    pub x_c: f64,
    pub y_c: f64,
    pub width: f64,
    pub height: f64,
}

fn clamp_unit(value: f64) -> f64 {
    value.clamp(0.0, 1.0)
}

impl Annotation {
    /// Create a new annotation, clamping every coordinate into [0, 1]
    pub fn new(label: i32, x_c: f64, y_c: f64, width: f64, height: f64) -> Self {
        Self {
            label,
            x_c: clamp_unit(x_c),
            y_c: clamp_unit(y_c),
            width: clamp_unit(width),
            height: clamp_unit(height),
        }
    }

    /// The empty/invalid annotation
    pub fn empty() -> Self {
        Self::new(EMPTY_LABEL, 0.0, 0.0, 0.0, 0.0)
    }

    /// Create from normalized borders of the region.
    ///
    /// Returns `None` when the resulting center or size exceeds 1.0, which
    /// only happens for malformed borders.
    pub fn from_borders(label: i32, left: f64, right: f64, bottom: f64, up: f64) -> Option<Self> {
        let width = right - left;
        let height = bottom - up;
        let x_c = left + width / 2.0;
        let y_c = up + height / 2.0;

        if [x_c, y_c, width, height].iter().any(|&v| v > 1.0) {
            return None;
        }
        Some(Self::new(label, x_c, y_c, width, height))
    }

    pub fn is_empty(&self) -> bool {
        self.label < 0
    }

    pub fn left(&self) -> f64 {
        self.x_c - self.width / 2.0
    }

    pub fn right(&self) -> f64 {
        self.x_c + self.width / 2.0
    }

    pub fn up(&self) -> f64 {
        self.y_c - self.height / 2.0
    }

    pub fn down(&self) -> f64 {
        self.y_c + self.height / 2.0
    }

    /// Smallest annotation covering both regions, keeping this label
    pub fn union(&self, other: &Annotation) -> Self {
        let up = self.up().min(other.up());
        let down = self.down().max(other.down());
        let left = self.left().min(other.left());
        let right = self.right().max(other.right());
        let width = right - left;
        let height = down - up;

        Self::new(
            self.label,
            left + width / 2.0,
            up + height / 2.0,
            width,
            height,
        )
    }

    /// Move the region to a new `(x_c, y_c)` center
    pub fn shift_center(&mut self, center: (f64, f64)) {
        self.x_c = clamp_unit(center.0);
        self.y_c = clamp_unit(center.1);
    }

    /// Scale the region size along one or both axes
    pub fn scale(&mut self, factor: f64, axis: Axis) {
        if matches!(axis, Axis::Width | Axis::Both) {
            self.width = clamp_unit(self.width * factor);
        }
        if matches!(axis, Axis::Height | Axis::Both) {
            self.height = clamp_unit(self.height * factor);
        }
    }
}

impl fmt::Display for Annotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {:.6} {:.6} {:.6} {:.6}",
            self.label, self.x_c, self.y_c, self.width, self.height
        )
    }
}

fn parse_field<T: FromStr>(field: &'static str, value: &str) -> Result<T, AnnotationError> {
    value.parse().map_err(|_| AnnotationError::Parse {
        field,
        value: value.to_string(),
    })
}

impl FromStr for Annotation {
    type Err = AnnotationError;

    /// Parse a `<label x_c y_c width height>` line
    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() != 5 {
            return Err(AnnotationError::FieldCount {
                line: line.to_string(),
                found: fields.len(),
            });
        }

        Ok(Self::new(
            parse_field("label", fields[0])?,
            parse_field("x_c", fields[1])?,
            parse_field("y_c", fields[2])?,
            parse_field("width", fields[3])?,
            parse_field("height", fields[4])?,
        ))
    }
}

/// Annotations of one picture with batch operations
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnnotationSet {
    annotations: Vec<Annotation>,
}

impl AnnotationSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_vec(annotations: Vec<Annotation>) -> Self {
        Self { annotations }
    }

    pub fn push(&mut self, annotation: Annotation) {
        self.annotations.push(annotation);
    }

    pub fn extend(&mut self, other: AnnotationSet) {
        self.annotations.extend(other.annotations);
    }

    pub fn as_slice(&self) -> &[Annotation] {
        &self.annotations
    }

    pub fn len(&self) -> usize {
        self.annotations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.annotations.is_empty()
    }

    /// Drop empty/invalid annotations
    pub fn without_empty(mut self) -> Self {
        self.annotations.retain(|a| !a.is_empty());
        self
    }

    /// Merge adjacent same-class regions
    pub fn merge(self, thresholds: &MergeThresholds) -> Self {
        Self::from_vec(merge_annotations(self.annotations, thresholds))
    }

    /// Number of annotations per class label
    pub fn class_counts(&self) -> BTreeMap<i32, usize> {
        let mut counts = BTreeMap::new();
        for annotation in self.annotations.iter().filter(|a| !a.is_empty()) {
            *counts.entry(annotation.label).or_insert(0) += 1;
        }
        counts
    }

    /// Newline separated annotation lines, empty annotations skipped
    pub fn to_lines(&self) -> String {
        self.annotations
            .iter()
            .filter(|a| !a.is_empty())
            .map(|a| a.to_string())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Parse newline separated annotation lines, ignoring blank lines
    pub fn parse_lines(text: &str) -> Result<Self, AnnotationError> {
        text.lines()
            .filter(|line| !line.trim().is_empty())
            .map(str::parse)
            .collect()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Annotation> {
        self.annotations.iter()
    }
}

impl IntoIterator for AnnotationSet {
    type Item = Annotation;
    type IntoIter = std::vec::IntoIter<Annotation>;

    fn into_iter(self) -> Self::IntoIter {
        self.annotations.into_iter()
    }
}

impl FromIterator<Annotation> for AnnotationSet {
    fn from_iter<T: IntoIterator<Item = Annotation>>(iter: T) -> Self {
        Self::from_vec(iter.into_iter().collect())
    }
}
