use thiserror::Error;

/// Error types for the sketch generation crate
#[derive(Error, Debug)]
pub enum SketchError {
    /// The diffusion pipeline could not be loaded
    #[error("Model load error: {0}")]
    ModelLoad(String),

    /// The diffusion backend answered, but not with an image
    #[error("Backend error: {0}")]
    Backend(String),

    /// Transport failure talking to the diffusion backend
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The backend payload could not be decoded into an image
    #[error("Decode error: {0}")]
    Decode(String),

    /// Error from the image codec while encoding or decoding
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// Error writing the sketch to disk
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A blocking post-processing task panicked or was cancelled
    #[error("Runtime error: {0}")]
    Runtime(String),
}

impl From<base64::DecodeError> for SketchError {
    fn from(error: base64::DecodeError) -> Self {
        SketchError::Decode(format!("Invalid base64 image payload: {}", error))
    }
}

impl From<tokio::task::JoinError> for SketchError {
    fn from(error: tokio::task::JoinError) -> Self {
        SketchError::Runtime(error.to_string())
    }
}

/// Type alias for Result with SketchError
pub type Result<T> = std::result::Result<T, SketchError>;
