//! Store abstraction traits.
//!
//! Defines the black-box services a merge job talks to: a folder/file store
//! and a document store. Implementations own the authoritative state and its
//! revisioning; the engine only ever holds copies and opaque handles.

use crate::error::MergeResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use docmerge_model::{BatchUpdateRequest, BatchUpdateResponse, Body, Document};
use docmerge_types::{DocumentId, FolderId, RevisionId};
use serde::{Deserialize, Serialize};

/// Access grade of the acting user on a folder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionGrade {
    NoAccess,
    View,
    Comment,
    Edit,
    Owner,
    Organizer,
    FileOrganizer,
}

impl PermissionGrade {
    /// Whether this grade allows creating files in the folder.
    pub fn can_write(&self) -> bool {
        matches!(
            self,
            Self::Edit | Self::Owner | Self::Organizer | Self::FileOrganizer
        )
    }
}

/// A folder in the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Folder {
    pub id: FolderId,
    pub name: String,
    pub url: String,
}

/// Metadata about a file in the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileInfo {
    pub id: DocumentId,
    pub name: String,
    pub url: String,
    /// Immediate parent folders, in the store's enumeration order.
    pub parents: Vec<FolderId>,
    pub modified_at: Option<DateTime<Utc>>,
}

/// A document checked out for in-place editing.
///
/// Obtained from [`EditableDocumentStore::open_for_edit`] and released by
/// [`EditableDocumentStore::save_and_close`]; edits are invisible to other
/// readers until then.
#[derive(Debug)]
pub struct EditableDocument {
    id: DocumentId,
    title: String,
    base_revision: RevisionId,
    body: Body,
}

impl EditableDocument {
    pub(crate) fn new(id: DocumentId, title: String, base_revision: RevisionId, body: Body) -> Self {
        Self {
            id,
            title,
            base_revision,
            body,
        }
    }

    pub fn id(&self) -> &DocumentId {
        &self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    /// Revision the document had when it was opened.
    pub fn base_revision(&self) -> &RevisionId {
        &self.base_revision
    }

    pub fn body(&self) -> &Body {
        &self.body
    }

    pub fn body_mut(&mut self) -> &mut Body {
        &mut self.body
    }

    pub(crate) fn into_body(self) -> Body {
        self.body
    }
}

/// Folder and file lookups.
#[async_trait]
pub trait FolderStore: Send + Sync {
    /// Returns the name of the store provider.
    fn provider_name(&self) -> &'static str;

    /// Looks up a file's metadata.
    async fn get_file(&self, file_id: &DocumentId) -> MergeResult<FileInfo>;

    /// Looks up a folder.
    async fn get_folder(&self, folder_id: &FolderId) -> MergeResult<Folder>;

    /// Immediate parent folders of a file, in enumeration order.
    async fn list_parents(&self, file_id: &DocumentId) -> MergeResult<Vec<Folder>>;

    /// The acting user's access grade on a folder.
    async fn permission(&self, folder: &Folder) -> MergeResult<PermissionGrade>;

    /// Creates a folder under `parent`.
    async fn create_folder(&self, parent: &Folder, name: &str) -> MergeResult<Folder>;

    /// The acting user's root folder.
    async fn root_folder(&self) -> MergeResult<Folder>;
}

/// Document content, copies, and revision-guarded patches.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Reads a document with its live revision.
    async fn get_document(&self, document_id: &DocumentId) -> MergeResult<Document>;

    /// Copies a file into `destination` under a new name.
    async fn copy_file(
        &self,
        document_id: &DocumentId,
        name: &str,
        destination: &FolderId,
    ) -> MergeResult<FileInfo>;

    /// Applies a batch as one unit.
    ///
    /// If the batch carries a required revision that no longer matches the
    /// live revision, fails with `RevisionConflict` and changes nothing.
    async fn batch_update(
        &self,
        document_id: &DocumentId,
        request: &BatchUpdateRequest,
    ) -> MergeResult<BatchUpdateResponse>;
}

/// Stores that can hand out an editable document handle.
#[async_trait]
pub trait EditableDocumentStore: DocumentStore {
    /// Acquires an edit handle; a document can be open only once at a time.
    async fn open_for_edit(&self, document_id: &DocumentId) -> MergeResult<EditableDocument>;

    /// Persists the handle's body and releases it.
    async fn save_and_close(&self, document: EditableDocument) -> MergeResult<()>;
}

/// Opens `document_id`, runs `edit` on its body, and always saves and closes.
///
/// The edit closure cannot fail, so a successfully acquired handle is
/// released on every path.
pub async fn edit_document<S, F, T>(store: &S, document_id: &DocumentId, edit: F) -> MergeResult<T>
where
    S: EditableDocumentStore + ?Sized,
    F: FnOnce(&mut Body) -> T + Send,
    T: Send,
{
    let mut handle = store.open_for_edit(document_id).await?;
    let output = edit(handle.body_mut());
    store.save_and_close(handle).await?;
    Ok(output)
}
