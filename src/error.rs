//! Error types for the currency announcer

use thiserror::Error;

/// Result type alias for announcer operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur outside the speech fallback chain
///
/// Speech backends never return this type to callers; their failures are
/// classified as [`crate::speech::BackendError`] and absorbed by the chain.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Upload is not one of the accepted image formats
    #[error("unsupported image: {0}")]
    UnsupportedImage(String),

    /// Hosted inference call failed
    #[error("inference error: {0}")]
    Inference(String),

    /// Media artifact error (annotated image missing or unwritable)
    #[error("media error: {0}")]
    Media(String),

    /// Audio error
    #[error("audio error: {0}")]
    Audio(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}
