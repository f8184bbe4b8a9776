//! Error types for the merge engine.

use docmerge_types::{DocumentId, RevisionId};
use thiserror::Error;

/// Result type for merge operations.
pub type MergeResult<T> = Result<T, MergeError>;

/// Errors that can occur in merge operations.
#[derive(Debug, Error)]
pub enum MergeError {
    /// The document moved past the revision the batch was prepared against.
    #[error("revision conflict on {document_id}: required revision {required} is no longer current")]
    RevisionConflict {
        document_id: DocumentId,
        required: RevisionId,
        current: Option<RevisionId>,
    },

    /// Document not found.
    #[error("document not found: {0}")]
    DocumentNotFound(String),

    /// File not found.
    #[error("file not found: {0}")]
    FileNotFound(String),

    /// Folder not found.
    #[error("folder not found: {0}")]
    FolderNotFound(String),

    /// The acting user may not perform the operation.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// The document already has an open edit handle.
    #[error("document already open for edit: {0}")]
    DocumentBusy(String),

    /// A field map was rejected.
    #[error("invalid field map: {0}")]
    InvalidFieldMap(String),

    /// Network error.
    #[error("network error: {0}")]
    Network(String),

    /// Remote API returned an error the engine does not interpret.
    #[error("api error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Local storage error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl MergeError {
    /// Whether the caller can recover by re-reading state and retrying.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::RevisionConflict { .. })
    }
}

impl From<docmerge_model::ModelError> for MergeError {
    fn from(err: docmerge_model::ModelError) -> Self {
        match err {
            docmerge_model::ModelError::InvalidFieldMap(msg) => Self::InvalidFieldMap(msg),
        }
    }
}
