//! SPREAD core library
//!
//! Geometry of normalized emission annotations, merging of adjacent boxes and
//! temporal compression of annotation sequences.

pub mod annotation;
pub mod compress;
pub mod error;
pub mod io;
pub mod merge;
pub mod tables;

pub use annotation::{Annotation, AnnotationSet, Axis, EMPTY_LABEL};
pub use compress::Compressor;
pub use error::{AnnotationError, CompressError};
pub use merge::merge_annotations;
pub use tables::{AugmentChannel, ChannelGeometry, ClassTables, MergeThresholds};
