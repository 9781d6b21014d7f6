use thiserror::Error;

/// Errors raised while serving a prediction.
///
/// None of these are meant for the caller: the router logs them and answers
/// with an opaque internal error.
#[derive(Debug, Error)]
pub enum ServeError {
    /// Object storage was unreachable or refused the request
    #[error("Object storage error: {0}")]
    Storage(String),

    /// Local scratch storage failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The image could not be decoded
    #[error("Could not decode image: {0}")]
    Image(#[from] image::ImageError),

    /// TensorFlow failed to load the model or run the session
    #[error("TensorFlow error: {0}")]
    Tensorflow(String),

    /// Model artifacts are missing or malformed
    #[error("Invalid model artifact: {0}")]
    Artifact(String),

    /// Model output could not be mapped to a class name
    #[error("Could not decode label: {0}")]
    Label(String),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl From<tensorflow::Status> for ServeError {
    fn from(status: tensorflow::Status) -> Self {
        ServeError::Tensorflow(status.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ServeError>;
