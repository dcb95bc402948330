//! Error types for the declaration generator

use thiserror::Error;

/// Result type alias for generator operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while rendering or exporting a declaration
#[derive(Error, Debug)]
pub enum Error {
    /// The rasterizer failed or produced an empty, corrupt or blank bitmap
    #[error("Rasterization failed: {0}")]
    RasterizationFailure(String),

    /// Embedding the bitmap into the page or saving the file failed
    #[error("Document assembly failed: {0}")]
    AssemblyFailure(String),

    /// The surface is not in a state that can be captured
    #[error("Layout error: {0}")]
    LayoutError(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    /// Filesystem error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl From<lopdf::Error> for Error {
    fn from(err: lopdf::Error) -> Self {
        Error::AssemblyFailure(err.to_string())
    }
}

impl From<image::ImageError> for Error {
    fn from(err: image::ImageError) -> Self {
        Error::RasterizationFailure(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::ConfigError(err.to_string())
    }
}
