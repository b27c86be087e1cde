use std::path::PathBuf;
use thiserror::Error;

/// Structured error types for training and serving the signature classifier.
///
/// Each variant captures the context of its error domain (dataset directories,
/// image decoding, model artifacts, validation) so callers can react to the
/// failure kind without parsing strings.
#[derive(Error, Debug)]
pub enum SignatureError {
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Dataset directory not found: {path:?}")]
    DatasetDirectoryMissing { path: PathBuf },

    #[error("Dataset directory contains no readable images: {path:?}")]
    EmptyDataset { path: PathBuf },

    #[error("Model artifact not found: {path:?}")]
    ModelNotFound { path: PathBuf },

    #[error("Filesystem error: {operation} failed for {path:?}")]
    FileSystem {
        path: PathBuf,
        operation: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Image processing error: {operation} failed (file: {path})")]
    ImageProcessing {
        path: String,
        operation: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Model error: {operation} failed")]
    Model {
        operation: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Validation error: {field} {reason}")]
    Validation { field: String, reason: String },
}

pub type Result<T> = std::result::Result<T, SignatureError>;

/// Recoverable outcome of a single inference call.
///
/// A malformed upload never escalates past the inference boundary; it is
/// reported as this value and the caller shows a user-facing message.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessingError {
    #[error("could not process image")]
    CouldNotProcessImage,
}

impl SignatureError {
    pub(crate) fn validation(field: &str, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn model(
        operation: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::Model {
            operation: operation.into(),
            source: source.into(),
        }
    }
}

/// Convert anyhow errors to configuration errors.
impl From<anyhow::Error> for SignatureError {
    fn from(err: anyhow::Error) -> Self {
        SignatureError::Configuration {
            message: err.to_string(),
        }
    }
}

/// Convert I/O errors to filesystem errors.
///
/// Code that knows the path and operation should construct
/// `SignatureError::FileSystem` directly; this is only the fallback.
impl From<std::io::Error> for SignatureError {
    fn from(err: std::io::Error) -> Self {
        Self::FileSystem {
            path: PathBuf::from("unknown"),
            operation: "unknown".to_string(),
            source: err,
        }
    }
}

/// Convert image crate errors to image processing errors.
impl From<image::ImageError> for SignatureError {
    fn from(err: image::ImageError) -> Self {
        Self::ImageProcessing {
            path: "unknown".to_string(),
            operation: "image processing".to_string(),
            source: Box::new(err),
        }
    }
}

/// Serialization failures only happen while reading or writing model artifacts,
/// so they are reported as model errors.
impl From<serde_json::Error> for SignatureError {
    fn from(err: serde_json::Error) -> Self {
        Self::Model {
            operation: "artifact serialization".to_string(),
            source: Box::new(err),
        }
    }
}

/// Convert ndarray shape errors to model errors.
impl From<ndarray::ShapeError> for SignatureError {
    fn from(err: ndarray::ShapeError) -> Self {
        Self::Model {
            operation: "feature matrix shape conversion".to_string(),
            source: Box::new(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = SignatureError::DatasetDirectoryMissing {
            path: PathBuf::from("data/genuine"),
        };
        assert_eq!(
            err.to_string(),
            "Dataset directory not found: \"data/genuine\""
        );

        let err = SignatureError::validation("folds", "must be at least 2");
        assert_eq!(err.to_string(), "Validation error: folds must be at least 2");

        assert_eq!(
            ProcessingError::CouldNotProcessImage.to_string(),
            "could not process image"
        );
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: SignatureError = io.into();
        assert!(matches!(err, SignatureError::FileSystem { .. }));
    }
}
