//! Storage backends for merge jobs.
//!
//! Provides the folder and document store traits plus two backends: an
//! in-process workspace that can be snapshotted to disk, and Google Drive +
//! Docs over HTTP.

mod docs_content;
pub mod google;
pub mod memory;
pub mod storage;

pub use google::{GoogleWorkspace, GoogleWorkspaceConfig};
pub use memory::{MemoryWorkspace, ROOT_FOLDER_ID};
pub use storage::{
    edit_document, DocumentStore, EditableDocument, EditableDocumentStore, FileInfo, Folder,
    FolderStore, PermissionGrade,
};
