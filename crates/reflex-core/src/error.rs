use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReflexError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Out of bounds: {0}")]
    Bounds(String),

    #[error("Shape mismatch: expected {expected} values, got {actual}")]
    Shape { expected: usize, actual: usize },

    #[error("Data format error: {0}")]
    DataFormat(String),

    #[error("Fit did not converge: {0}")]
    FitConvergence(String),

    #[error("Image format error: {0}")]
    ImageError(#[from] image::ImageError),

    #[error("Invalid scan manifest: {0}")]
    Manifest(#[from] toml::de::Error),

    #[error("Empty scan sequence")]
    EmptySequence,

    #[error("Profile has not been concatenated")]
    NotConcatenated,
}

pub type Result<T> = std::result::Result<T, ReflexError>;
