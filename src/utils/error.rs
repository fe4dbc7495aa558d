//! Error Handling Module
//!
//! Defines the error type shared by the dataset, model, training and
//! inference layers. Uses thiserror for ergonomic error definitions.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for deepscan operations
#[derive(Error, Debug)]
pub enum DeepscanError {
    /// An image file could not be opened or decoded
    #[error("Failed to load image at '{0}': {1}")]
    ImageLoad(PathBuf, String),

    /// Raw bytes could not be decoded as an image
    #[error("Failed to decode image: {0}")]
    ImageDecode(String),

    /// Dataset layout or content problem
    #[error("Dataset error: {0}")]
    Dataset(String),

    /// Model construction, save or load failure
    #[error("Model error: {0}")]
    Model(String),

    /// Failure inside the fit loop
    #[error("Training error: {0}")]
    Training(String),

    /// Failure during a forward pass
    #[error("Inference error: {0}")]
    Inference(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Path not found
    #[error("Path not found: {0}")]
    PathNotFound(PathBuf),
}

impl From<image::ImageError> for DeepscanError {
    fn from(err: image::ImageError) -> Self {
        DeepscanError::ImageDecode(err.to_string())
    }
}

impl From<serde_json::Error> for DeepscanError {
    fn from(err: serde_json::Error) -> Self {
        DeepscanError::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for DeepscanError {
    fn from(err: toml::de::Error) -> Self {
        DeepscanError::Config(err.to_string())
    }
}

/// Convenience Result type for deepscan operations
pub type Result<T> = std::result::Result<T, DeepscanError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DeepscanError::Dataset("missing split".to_string());
        assert_eq!(format!("{}", err), "Dataset error: missing split");
    }

    #[test]
    fn test_image_load_error() {
        let path = PathBuf::from("/data/fake/0001.png");
        let err = DeepscanError::ImageLoad(path, "file not found".to_string());
        assert!(format!("{}", err).contains("0001.png"));
    }

    #[test]
    fn test_image_error_conversion() {
        let decode = image::load_from_memory(b"definitely not an image");
        let err: DeepscanError = decode.unwrap_err().into();
        assert!(matches!(err, DeepscanError::ImageDecode(_)));
        assert!(!err.to_string().is_empty());
    }
}
