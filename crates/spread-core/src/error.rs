//! Error types for annotation parsing and compression

use thiserror::Error;

/// Failure to read a single annotation line
#[derive(Debug, Error, PartialEq)]
pub enum AnnotationError {
    #[error("expected 5 fields (label x_c y_c width height), found {found} in '{line}'")]
    FieldCount { line: String, found: usize },

    #[error("invalid {field} value '{value}'")]
    Parse { field: &'static str, value: String },
}

/// Unusable compression settings
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CompressError {
    #[error("compression factor must be positive")]
    ZeroFactor,

    #[error("picture height must be positive")]
    ZeroImageSize,
}
