use thiserror::Error;

/// Every fatal condition a capture session can hit.
///
/// Transient screenshot failures never show up here; sources report them as
/// `Ok(None)` and the capture loop retries.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("Malformed frame: {0}")]
    MalformedFrame(String),
    #[error("Frame too large: {0}")]
    FrameTooLarge(String),
    #[error("Dimension mismatch: {0}")]
    DimensionMismatch(String),
    #[error("Encoding error: {0}")]
    EncodingError(String),
    #[error("Container error: {0}")]
    ContainerError(String),
    #[error("IO error: {0}")]
    IoError(String),
    #[error("Screenshot source error: {0}")]
    SourceError(String),
    #[error("Remux error: {0}")]
    RemuxError(String),
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("No frames were captured before the session was stopped")]
    NoFramesCaptured,
}

impl From<std::io::Error> for CaptureError {
    fn from(error: std::io::Error) -> Self {
        CaptureError::IoError(error.to_string())
    }
}
