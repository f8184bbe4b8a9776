//! Error types for the document model.

use thiserror::Error;

/// Result type for model operations.
pub type ModelResult<T> = Result<T, ModelError>;

/// Errors that can occur while building model values.
#[derive(Debug, Error)]
pub enum ModelError {
    /// A field map entry was rejected.
    #[error("invalid field map: {0}")]
    InvalidFieldMap(String),
}
