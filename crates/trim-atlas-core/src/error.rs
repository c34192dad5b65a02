use thiserror::Error;

/// Axis of a trim edge pair, used when reporting snapping failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Horizontal,
    Vertical,
}

impl std::fmt::Display for Axis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Axis::Horizontal => f.write_str("horizontal"),
            Axis::Vertical => f.write_str("vertical"),
        }
    }
}

#[derive(Debug, Error)]
pub enum AtlasError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("Invalid dimensions: {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },
    #[error("Nothing to pack")]
    Empty,
    #[error(
        "Cannot fit {sources} decals within {resolution}x{resolution} (gave up after {attempts} attempts)"
    )]
    PackingInfeasible {
        sources: usize,
        resolution: u32,
        attempts: u32,
    },
    #[error("Snapping collapsed the {axis} extent of the trim and no adjacent snap line exists")]
    DegenerateSnapResult { axis: Axis },
    #[error("Unknown trim: {0}")]
    UnknownTrim(String),
    #[error("Atlas has not been packed yet")]
    NotPacked,
}

pub type Result<T> = std::result::Result<T, AtlasError>;
