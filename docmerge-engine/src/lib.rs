//! Templated mail merge engine.
//!
//! Produces one document per data record, or one consolidated document,
//! from a template whose text contains field codes such as `{{name}}`.
//!
//! # Architecture
//!
//! The engine never owns document state. It talks to a store through the
//! [`FolderStore`], [`DocumentStore`] and [`EditableDocumentStore`] traits;
//! the store holds the authoritative content and its revision token.
//!
//! ## Components
//!
//! - **Folder Resolver**: picks a writable destination folder for a
//!   template, falling back to the root folder
//! - **Substituter**: applies a field map as one revision-guarded batch
//! - **Transplant Copier**: appends a substituted copy of the template body
//!   to another document, element by element
//! - **Merge Job**: runs the above once per record
//!
//! ## Merge Process
//!
//! 1. **Resolve**: choose the parent folder and create the merge folder
//! 2. **Copy**: copy the template (or create a cleared accumulator)
//! 3. **Substitute**: replace field codes, guarded by revision
//! 4. **Finalize**: persist, and record the outcome in the job report
//!
//! # Example
//!
//! ```
//! use docmerge_engine::{MailMerge, MemoryWorkspace, MergeConfig};
//!
//! let merge = MailMerge::new(MemoryWorkspace::new("alice@example.com"), MergeConfig::default());
//! assert_eq!(merge.config().folder_prefix, "[差し込み文書]");
//! ```

mod config;
mod error;
pub mod folder;
pub mod job;
mod merge;
pub mod store;
pub mod substitute;
pub mod transplant;

pub use config::{MergeConfig, DEFAULT_FOLDER_PREFIX};
pub use error::{MergeError, MergeResult};
pub use folder::{CreateFallback, FolderFallback, FolderResolution, FolderResolver, MergeFolder};
pub use job::{JobReport, JobState, MergeJob, MergeMode, MergeRecord, RecordOutcome, RecordState};
pub use merge::{FolderSummary, MailMerge, MergeDocument};
pub use substitute::{Substituter, Substitution};
pub use transplant::{
    create_cleared_merge_document, transplant_body, transplant_into, SkippedElement,
    TransplantReport,
};

// Stores
pub use store::{
    edit_document, DocumentStore, EditableDocument, EditableDocumentStore, FileInfo, Folder,
    FolderStore, GoogleWorkspace, GoogleWorkspaceConfig, MemoryWorkspace, PermissionGrade,
    ROOT_FOLDER_ID,
};
