//! Core identifier types for docmerge.
//!
//! This crate defines the opaque handles shared by the model and engine:
//! - [`DocumentId`] for template and merge output files
//! - [`FolderId`] for destination containers
//! - [`RevisionId`] for the optimistic-concurrency token of a document

mod ids;

pub use ids::{DocumentId, FolderId, RevisionId};

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in type operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{0} id must not be empty")]
    EmptyId(&'static str),
}
