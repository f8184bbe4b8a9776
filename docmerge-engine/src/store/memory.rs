//! In-process workspace store.
//!
//! Holds folders, files and documents in memory behind one lock, and can be
//! snapshotted to / restored from a JSON file so the CLI can run merge jobs
//! against a local workspace. Every mutation advances the document's
//! revision, and batch patches check the required revision under the same
//! write guard that applies them.

use super::storage::{
    DocumentStore, EditableDocument, EditableDocumentStore, FileInfo, Folder, FolderStore,
    PermissionGrade,
};
use crate::error::{MergeError, MergeResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use docmerge_model::{
    BatchUpdateRequest, BatchUpdateResponse, Body, Document, ReplaceAllTextResponse, Reply,
    Request, WriteControl,
};
use docmerge_types::{DocumentId, FolderId, RevisionId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Id of the root folder of every memory workspace.
pub const ROOT_FOLDER_ID: &str = "root";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct FolderRecord {
    name: String,
    parents: Vec<FolderId>,
    /// Access grade per user.
    permissions: BTreeMap<String, PermissionGrade>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct FileRecord {
    parents: Vec<FolderId>,
    modified_at: DateTime<Utc>,
    document: Document,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WorkspaceState {
    acting_user: String,
    folders: BTreeMap<FolderId, FolderRecord>,
    files: BTreeMap<DocumentId, FileRecord>,
    /// Documents with a live edit handle.
    #[serde(skip)]
    open: HashSet<DocumentId>,
    /// Parents under which folder creation is made to fail.
    #[serde(skip)]
    blocked_parents: HashSet<FolderId>,
}

impl WorkspaceState {
    fn new(acting_user: &str) -> Self {
        let mut permissions = BTreeMap::new();
        permissions.insert(acting_user.to_string(), PermissionGrade::Owner);
        let mut folders = BTreeMap::new();
        folders.insert(
            FolderId::from(ROOT_FOLDER_ID),
            FolderRecord {
                name: "My Drive".to_string(),
                parents: Vec::new(),
                permissions,
            },
        );
        Self {
            acting_user: acting_user.to_string(),
            folders,
            files: BTreeMap::new(),
            open: HashSet::new(),
            blocked_parents: HashSet::new(),
        }
    }

    fn grade(&self, folder_id: &FolderId) -> MergeResult<PermissionGrade> {
        let record = self
            .folders
            .get(folder_id)
            .ok_or_else(|| MergeError::FolderNotFound(folder_id.to_string()))?;
        Ok(record
            .permissions
            .get(&self.acting_user)
            .copied()
            .unwrap_or(PermissionGrade::NoAccess))
    }

    fn require_writable(&self, folder_id: &FolderId) -> MergeResult<()> {
        if self.grade(folder_id)?.can_write() {
            Ok(())
        } else {
            Err(MergeError::PermissionDenied(format!(
                "{} cannot write to folder {folder_id}",
                self.acting_user
            )))
        }
    }

    fn folder(&self, folder_id: &FolderId) -> MergeResult<Folder> {
        let record = self
            .folders
            .get(folder_id)
            .ok_or_else(|| MergeError::FolderNotFound(folder_id.to_string()))?;
        Ok(Folder {
            id: folder_id.clone(),
            name: record.name.clone(),
            url: folder_url(folder_id),
        })
    }

    fn file_info(&self, id: &DocumentId) -> MergeResult<FileInfo> {
        let record = self
            .files
            .get(id)
            .ok_or_else(|| MergeError::FileNotFound(id.to_string()))?;
        Ok(FileInfo {
            id: id.clone(),
            name: record.document.title.clone(),
            url: document_url(id),
            parents: record.parents.clone(),
            modified_at: Some(record.modified_at),
        })
    }

    fn document_mut(&mut self, id: &DocumentId) -> MergeResult<&mut FileRecord> {
        self.files
            .get_mut(id)
            .ok_or_else(|| MergeError::DocumentNotFound(id.to_string()))
    }
}

fn folder_url(id: &FolderId) -> String {
    format!("memory://folders/{id}")
}

fn document_url(id: &DocumentId) -> String {
    format!("memory://documents/{id}")
}

/// In-memory implementation of all store traits.
#[derive(Clone)]
pub struct MemoryWorkspace {
    state: Arc<RwLock<WorkspaceState>>,
}

impl MemoryWorkspace {
    /// Creates an empty workspace owned by `acting_user`, holding only the root folder.
    pub fn new(acting_user: &str) -> Self {
        Self {
            state: Arc::new(RwLock::new(WorkspaceState::new(acting_user))),
        }
    }

    /// Restores a workspace from a snapshot file.
    pub async fn load(path: &Path) -> MergeResult<Self> {
        let raw = fs::read(path)
            .await
            .map_err(|e| MergeError::Storage(format!("failed to read workspace {path:?}: {e}")))?;
        let state: WorkspaceState = serde_json::from_slice(&raw)?;
        if !state.folders.contains_key(&FolderId::from(ROOT_FOLDER_ID)) {
            return Err(MergeError::Storage(format!(
                "workspace {path:?} has no root folder"
            )));
        }
        info!(
            "Loaded workspace {:?} ({} folders, {} files)",
            path,
            state.folders.len(),
            state.files.len()
        );
        Ok(Self {
            state: Arc::new(RwLock::new(state)),
        })
    }

    /// Writes a snapshot of the workspace to `path`.
    pub async fn save(&self, path: &Path) -> MergeResult<()> {
        let json = {
            let state = self.state.read().await;
            serde_json::to_vec_pretty(&*state)?
        };
        fs::write(path, json)
            .await
            .map_err(|e| MergeError::Storage(format!("failed to write workspace {path:?}: {e}")))?;
        debug!("Saved workspace to {:?}", path);
        Ok(())
    }

    /// The user whose permissions apply to every operation.
    pub async fn acting_user(&self) -> String {
        self.state.read().await.acting_user.clone()
    }

    /// Adds a folder and grants the acting user `grade` on it.
    pub async fn add_folder(
        &self,
        name: &str,
        parent: Option<&FolderId>,
        grade: PermissionGrade,
    ) -> FolderId {
        let mut state = self.state.write().await;
        let id = FolderId::generate();
        let mut permissions = BTreeMap::new();
        permissions.insert(state.acting_user.clone(), grade);
        state.folders.insert(
            id.clone(),
            FolderRecord {
                name: name.to_string(),
                parents: parent.into_iter().cloned().collect(),
                permissions,
            },
        );
        id
    }

    /// Sets a user's grade on an existing folder.
    pub async fn set_permission(
        &self,
        folder_id: &FolderId,
        user: &str,
        grade: PermissionGrade,
    ) -> MergeResult<()> {
        let mut state = self.state.write().await;
        let record = state
            .folders
            .get_mut(folder_id)
            .ok_or_else(|| MergeError::FolderNotFound(folder_id.to_string()))?;
        record.permissions.insert(user.to_string(), grade);
        Ok(())
    }

    /// Adds a document with a fresh revision.
    pub async fn add_document(&self, title: &str, parents: &[FolderId], body: Body) -> DocumentId {
        self.add_document_at_revision(title, parents, body, RevisionId::generate())
            .await
    }

    /// Adds a document at a caller-chosen revision.
    pub async fn add_document_at_revision(
        &self,
        title: &str,
        parents: &[FolderId],
        body: Body,
        revision: RevisionId,
    ) -> DocumentId {
        let id = DocumentId::generate();
        let document = Document {
            document_id: id.clone(),
            title: title.to_string(),
            revision_id: revision,
            body,
        };
        self.state.write().await.files.insert(
            id.clone(),
            FileRecord {
                parents: parents.to_vec(),
                modified_at: Utc::now(),
                document,
            },
        );
        id
    }

    /// Snapshot of a document, if present.
    pub async fn document(&self, id: &DocumentId) -> Option<Document> {
        self.state
            .read()
            .await
            .files
            .get(id)
            .map(|f| f.document.clone())
    }

    /// Files whose parents include `folder_id`, ordered by id.
    pub async fn files_in(&self, folder_id: &FolderId) -> Vec<FileInfo> {
        let state = self.state.read().await;
        state
            .files
            .iter()
            .filter(|(_, f)| f.parents.contains(folder_id))
            .filter_map(|(id, _)| state.file_info(id).ok())
            .collect()
    }

    /// Sub-folders of `folder_id`.
    pub async fn folders_in(&self, folder_id: &FolderId) -> Vec<Folder> {
        let state = self.state.read().await;
        state
            .folders
            .iter()
            .filter(|(_, f)| f.parents.contains(folder_id))
            .filter_map(|(id, _)| state.folder(id).ok())
            .collect()
    }

    /// Makes every folder creation under `parent` fail from now on.
    pub async fn fail_folder_creation_in(&self, parent: &FolderId) {
        self.state
            .write()
            .await
            .blocked_parents
            .insert(parent.clone());
    }

    /// Applies an edit as another user would: mutates the body and advances
    /// the revision without any precondition.
    pub async fn edit_externally<F>(&self, id: &DocumentId, edit: F) -> MergeResult<RevisionId>
    where
        F: FnOnce(&mut Body),
    {
        let mut state = self.state.write().await;
        let record = state.document_mut(id)?;
        edit(&mut record.document.body);
        record.document.revision_id = RevisionId::generate();
        record.modified_at = Utc::now();
        Ok(record.document.revision_id.clone())
    }

    /// Whether a document currently has an open edit handle.
    pub async fn is_open(&self, id: &DocumentId) -> bool {
        self.state.read().await.open.contains(id)
    }
}

#[async_trait]
impl FolderStore for MemoryWorkspace {
    fn provider_name(&self) -> &'static str {
        "Memory"
    }

    async fn get_file(&self, file_id: &DocumentId) -> MergeResult<FileInfo> {
        self.state.read().await.file_info(file_id)
    }

    async fn get_folder(&self, folder_id: &FolderId) -> MergeResult<Folder> {
        self.state.read().await.folder(folder_id)
    }

    async fn list_parents(&self, file_id: &DocumentId) -> MergeResult<Vec<Folder>> {
        let state = self.state.read().await;
        let record = state
            .files
            .get(file_id)
            .ok_or_else(|| MergeError::FileNotFound(file_id.to_string()))?;
        record.parents.iter().map(|p| state.folder(p)).collect()
    }

    async fn permission(&self, folder: &Folder) -> MergeResult<PermissionGrade> {
        self.state.read().await.grade(&folder.id)
    }

    async fn create_folder(&self, parent: &Folder, name: &str) -> MergeResult<Folder> {
        let mut state = self.state.write().await;
        if state.blocked_parents.contains(&parent.id) {
            return Err(MergeError::Storage(format!(
                "folder creation under {} rejected",
                parent.id
            )));
        }
        state.require_writable(&parent.id)?;

        let id = FolderId::generate();
        let mut permissions = BTreeMap::new();
        permissions.insert(state.acting_user.clone(), PermissionGrade::Owner);
        state.folders.insert(
            id.clone(),
            FolderRecord {
                name: name.to_string(),
                parents: vec![parent.id.clone()],
                permissions,
            },
        );
        info!("Created folder {} ({}) under {}", name, id, parent.id);
        state.folder(&id)
    }

    async fn root_folder(&self) -> MergeResult<Folder> {
        self.state.read().await.folder(&FolderId::from(ROOT_FOLDER_ID))
    }
}

#[async_trait]
impl DocumentStore for MemoryWorkspace {
    async fn get_document(&self, document_id: &DocumentId) -> MergeResult<Document> {
        self.state
            .read()
            .await
            .files
            .get(document_id)
            .map(|f| f.document.clone())
            .ok_or_else(|| MergeError::DocumentNotFound(document_id.to_string()))
    }

    async fn copy_file(
        &self,
        document_id: &DocumentId,
        name: &str,
        destination: &FolderId,
    ) -> MergeResult<FileInfo> {
        let mut state = self.state.write().await;
        let source = state
            .files
            .get(document_id)
            .ok_or_else(|| MergeError::FileNotFound(document_id.to_string()))?
            .document
            .body
            .clone();
        state.require_writable(destination)?;

        let id = DocumentId::generate();
        state.files.insert(
            id.clone(),
            FileRecord {
                parents: vec![destination.clone()],
                modified_at: Utc::now(),
                document: Document {
                    document_id: id.clone(),
                    title: name.to_string(),
                    revision_id: RevisionId::generate(),
                    body: source,
                },
            },
        );
        debug!("Copied {} to {} as {:?}", document_id, id, name);
        state.file_info(&id)
    }

    async fn batch_update(
        &self,
        document_id: &DocumentId,
        request: &BatchUpdateRequest,
    ) -> MergeResult<BatchUpdateResponse> {
        let mut state = self.state.write().await;
        let record = state.document_mut(document_id)?;

        if let Some(required) = request.required_revision() {
            if *required != record.document.revision_id {
                warn!(
                    "Rejecting batch for {}: required revision {} but live revision is {}",
                    document_id, required, record.document.revision_id
                );
                return Err(MergeError::RevisionConflict {
                    document_id: document_id.clone(),
                    required: required.clone(),
                    current: Some(record.document.revision_id.clone()),
                });
            }
        }

        // Work on a copy so the live body is only replaced once every request succeeded.
        let mut body = record.document.body.clone();
        let replies = request
            .requests
            .iter()
            .map(|req| match req {
                Request::ReplaceAllText(r) => {
                    let changed = body.replace_text(
                        &r.contains_text.text,
                        &r.replace_text,
                        r.contains_text.match_case,
                    );
                    Reply {
                        replace_all_text: Some(ReplaceAllTextResponse {
                            occurrences_changed: u32::try_from(changed).unwrap_or(u32::MAX),
                        }),
                    }
                }
            })
            .collect();

        record.document.body = body;
        record.document.revision_id = RevisionId::generate();
        record.modified_at = Utc::now();

        Ok(BatchUpdateResponse {
            document_id: document_id.clone(),
            replies,
            write_control: Some(WriteControl {
                required_revision_id: Some(record.document.revision_id.clone()),
            }),
        })
    }
}

#[async_trait]
impl EditableDocumentStore for MemoryWorkspace {
    async fn open_for_edit(&self, document_id: &DocumentId) -> MergeResult<EditableDocument> {
        let mut state = self.state.write().await;
        if state.open.contains(document_id) {
            return Err(MergeError::DocumentBusy(document_id.to_string()));
        }
        let document = state
            .files
            .get(document_id)
            .map(|f| f.document.clone())
            .ok_or_else(|| MergeError::DocumentNotFound(document_id.to_string()))?;
        state.open.insert(document_id.clone());
        debug!("Opened {} for edit at revision {}", document_id, document.revision_id);

        Ok(EditableDocument::new(
            document.document_id,
            document.title,
            document.revision_id,
            document.body,
        ))
    }

    async fn save_and_close(&self, document: EditableDocument) -> MergeResult<()> {
        let mut state = self.state.write().await;
        let id = document.id().clone();
        if !state.open.remove(&id) {
            return Err(MergeError::Storage(format!(
                "document {id} is not open for edit"
            )));
        }
        let record = state.document_mut(&id)?;
        record.document.body = document.into_body();
        record.document.revision_id = RevisionId::generate();
        record.modified_at = Utc::now();
        debug!("Saved and closed {}", id);
        Ok(())
    }
}
