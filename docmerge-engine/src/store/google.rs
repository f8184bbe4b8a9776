//! Google Drive + Docs store implementation.
//!
//! Uses Drive API v3 for folders, access capabilities and copies, and Docs API v1
//! for document reads and `batchUpdate`. The bearer token is supplied by the
//! caller; obtaining it (OAuth) is outside this crate.
//!
//! The Docs REST API has no notion of an open edit handle, so this store
//! does not implement [`EditableDocumentStore`](super::EditableDocumentStore);
//! consolidated merges need a store that does.

use super::docs_content;
use super::storage::{DocumentStore, FileInfo, Folder, FolderStore, PermissionGrade};
use crate::error::{MergeError, MergeResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use docmerge_model::{BatchUpdateRequest, BatchUpdateResponse, Document};
use docmerge_types::{DocumentId, FolderId};
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";
const FILE_FIELDS: &str = "id,name,parents,webViewLink,modifiedTime";
const CAPABILITY_FIELDS: &str = "capabilities(canAddChildren,canComment)";

/// Google Workspace specific configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GoogleWorkspaceConfig {
    /// OAuth2 bearer token with Drive and Docs scopes.
    pub access_token: String,
    /// Base URL for the Drive API (e.g. `https://www.googleapis.com`).
    pub drive_base_url: String,
    /// Base URL for the Docs API (e.g. `https://docs.googleapis.com`).
    pub docs_base_url: String,
    /// Per-request timeout.
    pub timeout_secs: u64,
}

impl Default for GoogleWorkspaceConfig {
    fn default() -> Self {
        Self {
            access_token: String::new(),
            drive_base_url: "https://www.googleapis.com".to_string(),
            docs_base_url: "https://docs.googleapis.com".to_string(),
            timeout_secs: 60,
        }
    }
}

/// Drive API response structures.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DriveFile {
    id: String,
    name: String,
    #[serde(default)]
    parents: Vec<String>,
    web_view_link: Option<String>,
    modified_time: Option<String>,
}

/// Effective capabilities of the acting user on a file, group and
/// shared-drive membership included.
#[derive(Debug, Deserialize)]
struct DriveCapabilityFile {
    #[serde(default)]
    capabilities: DriveCapabilities,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DriveCapabilities {
    #[serde(default)]
    can_add_children: bool,
    #[serde(default)]
    can_comment: bool,
}

impl DriveCapabilities {
    fn grade(&self) -> PermissionGrade {
        if self.can_add_children {
            PermissionGrade::Edit
        } else if self.can_comment {
            PermissionGrade::Comment
        } else {
            PermissionGrade::View
        }
    }
}

/// Google API error envelope.
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: String,
}

/// Google Drive + Docs store.
pub struct GoogleWorkspace {
    config: GoogleWorkspaceConfig,
    client: Client,
    root: RwLock<Option<Folder>>,
}

impl GoogleWorkspace {
    /// Creates a new store instance.
    pub fn new(config: GoogleWorkspaceConfig) -> MergeResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| MergeError::Network(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            config,
            client,
            root: RwLock::new(None),
        })
    }

    fn drive_url(&self, path: &str) -> String {
        format!("{}/drive/v3/{}", self.config.drive_base_url, path)
    }

    fn docs_url(&self, document_id: &DocumentId) -> String {
        format!(
            "{}/v1/documents/{}",
            self.config.docs_base_url,
            urlencoding::encode(document_id.as_str())
        )
    }

    async fn fetch_drive_file(&self, id: &str) -> MergeResult<Response> {
        self.client
            .get(self.drive_url(&format!("files/{}", urlencoding::encode(id))))
            .bearer_auth(&self.config.access_token)
            .query(&[("fields", FILE_FIELDS), ("supportsAllDrives", "true")])
            .send()
            .await
            .map_err(|e| MergeError::Network(format!("file lookup failed: {e}")))
    }

    fn to_folder(file: DriveFile) -> Folder {
        let url = file
            .web_view_link
            .unwrap_or_else(|| format!("https://drive.google.com/drive/folders/{}", file.id));
        Folder {
            id: FolderId::from(file.id.as_str()),
            name: file.name,
            url,
        }
    }

    fn to_file_info(file: DriveFile) -> FileInfo {
        let modified_at = file
            .modified_time
            .as_deref()
            .and_then(|t| DateTime::parse_from_rfc3339(t).ok())
            .map(|dt| dt.with_timezone(&Utc));
        let url = file
            .web_view_link
            .unwrap_or_else(|| format!("https://docs.google.com/document/d/{}/edit", file.id));

        FileInfo {
            id: DocumentId::from(file.id.as_str()),
            name: file.name,
            url,
            parents: file
                .parents
                .iter()
                .map(|p| FolderId::from(p.as_str()))
                .collect(),
            modified_at,
        }
    }
}

/// Reads a Google API error body, falling back to the raw text.
async fn read_error(response: Response) -> (StatusCode, ErrorBody) {
    let status = response.status();
    let text = response.text().await.unwrap_or_default();
    let body = serde_json::from_str::<ErrorEnvelope>(&text)
        .map(|e| e.error)
        .unwrap_or(ErrorBody {
            message: text,
            status: String::new(),
        });
    (status, body)
}

/// Maps a non-success response to the error taxonomy.
async fn error_for(response: Response, what: &str, not_found: MergeError) -> MergeError {
    let (status, body) = read_error(response).await;
    match status {
        StatusCode::NOT_FOUND => not_found,
        StatusCode::FORBIDDEN => MergeError::PermissionDenied(format!("{what}: {}", body.message)),
        _ => MergeError::Api {
            status: status.as_u16(),
            message: format!("{what}: {}", body.message),
        },
    }
}

#[async_trait]
impl FolderStore for GoogleWorkspace {
    fn provider_name(&self) -> &'static str {
        "Google Drive"
    }

    async fn get_file(&self, file_id: &DocumentId) -> MergeResult<FileInfo> {
        let response = self.fetch_drive_file(file_id.as_str()).await?;
        if !response.status().is_success() {
            return Err(error_for(
                response,
                "file lookup failed",
                MergeError::FileNotFound(file_id.to_string()),
            )
            .await);
        }
        let file: DriveFile = response
            .json()
            .await
            .map_err(|e| MergeError::Network(format!("failed to parse file: {e}")))?;
        Ok(Self::to_file_info(file))
    }

    async fn get_folder(&self, folder_id: &FolderId) -> MergeResult<Folder> {
        let response = self.fetch_drive_file(folder_id.as_str()).await?;
        if !response.status().is_success() {
            return Err(error_for(
                response,
                "folder lookup failed",
                MergeError::FolderNotFound(folder_id.to_string()),
            )
            .await);
        }
        let file: DriveFile = response
            .json()
            .await
            .map_err(|e| MergeError::Network(format!("failed to parse folder: {e}")))?;
        Ok(Self::to_folder(file))
    }

    async fn list_parents(&self, file_id: &DocumentId) -> MergeResult<Vec<Folder>> {
        let file = self.get_file(file_id).await?;
        let mut parents = Vec::with_capacity(file.parents.len());
        for parent in &file.parents {
            parents.push(self.get_folder(parent).await?);
        }
        Ok(parents)
    }

    async fn permission(&self, folder: &Folder) -> MergeResult<PermissionGrade> {
        let response = self
            .client
            .get(self.drive_url(&format!(
                "files/{}",
                urlencoding::encode(folder.id.as_str())
            )))
            .bearer_auth(&self.config.access_token)
            .query(&[("fields", CAPABILITY_FIELDS), ("supportsAllDrives", "true")])
            .send()
            .await
            .map_err(|e| MergeError::Network(format!("permission lookup failed: {e}")))?;

        if !response.status().is_success() {
            return Err(error_for(
                response,
                "permission lookup failed",
                MergeError::FolderNotFound(folder.id.to_string()),
            )
            .await);
        }

        let file: DriveCapabilityFile = response
            .json()
            .await
            .map_err(|e| MergeError::Network(format!("failed to parse capabilities: {e}")))?;
        let grade = file.capabilities.grade();
        debug!("Access on folder {} ({}): {:?}", folder.name, folder.id, grade);
        Ok(grade)
    }

    async fn create_folder(&self, parent: &Folder, name: &str) -> MergeResult<Folder> {
        let metadata = serde_json::json!({
            "name": name,
            "mimeType": FOLDER_MIME_TYPE,
            "parents": [parent.id.as_str()]
        });

        let response = self
            .client
            .post(self.drive_url("files"))
            .bearer_auth(&self.config.access_token)
            .query(&[("fields", FILE_FIELDS), ("supportsAllDrives", "true")])
            .json(&metadata)
            .send()
            .await
            .map_err(|e| MergeError::Network(format!("folder creation failed: {e}")))?;

        if !response.status().is_success() {
            return Err(error_for(
                response,
                "folder creation failed",
                MergeError::FolderNotFound(parent.id.to_string()),
            )
            .await);
        }

        let created: DriveFile = response
            .json()
            .await
            .map_err(|e| MergeError::Network(format!("failed to parse created folder: {e}")))?;

        info!("Created folder: {} (id: {})", name, created.id);
        Ok(Self::to_folder(created))
    }

    async fn root_folder(&self) -> MergeResult<Folder> {
        if let Some(root) = self.root.read().await.as_ref() {
            return Ok(root.clone());
        }
        let root = self.get_folder(&FolderId::from("root")).await?;
        *self.root.write().await = Some(root.clone());
        Ok(root)
    }
}

#[async_trait]
impl DocumentStore for GoogleWorkspace {
    async fn get_document(&self, document_id: &DocumentId) -> MergeResult<Document> {
        let response = self
            .client
            .get(self.docs_url(document_id))
            .bearer_auth(&self.config.access_token)
            .send()
            .await
            .map_err(|e| MergeError::Network(format!("document fetch failed: {e}")))?;

        if !response.status().is_success() {
            return Err(error_for(
                response,
                "document fetch failed",
                MergeError::DocumentNotFound(document_id.to_string()),
            )
            .await);
        }

        let raw: serde_json::Value = response
            .json()
            .await
            .map_err(|e| MergeError::Network(format!("failed to parse document: {e}")))?;
        docs_content::document_from_json(&raw)
    }

    async fn copy_file(
        &self,
        document_id: &DocumentId,
        name: &str,
        destination: &FolderId,
    ) -> MergeResult<FileInfo> {
        let metadata = serde_json::json!({
            "name": name,
            "parents": [destination.as_str()]
        });

        let response = self
            .client
            .post(self.drive_url(&format!(
                "files/{}/copy",
                urlencoding::encode(document_id.as_str())
            )))
            .bearer_auth(&self.config.access_token)
            .query(&[("fields", FILE_FIELDS), ("supportsAllDrives", "true")])
            .json(&metadata)
            .send()
            .await
            .map_err(|e| MergeError::Network(format!("copy failed: {e}")))?;

        if !response.status().is_success() {
            return Err(error_for(
                response,
                "copy failed",
                MergeError::FileNotFound(document_id.to_string()),
            )
            .await);
        }

        let file: DriveFile = response
            .json()
            .await
            .map_err(|e| MergeError::Network(format!("failed to parse copy: {e}")))?;

        info!("Copied {} to {:?} (id: {})", document_id, name, file.id);
        Ok(Self::to_file_info(file))
    }

    async fn batch_update(
        &self,
        document_id: &DocumentId,
        request: &BatchUpdateRequest,
    ) -> MergeResult<BatchUpdateResponse> {
        debug!(
            "batchUpdate {} ({} requests)",
            document_id,
            request.requests.len()
        );

        let response = self
            .client
            .post(format!("{}:batchUpdate", self.docs_url(document_id)))
            .bearer_auth(&self.config.access_token)
            .json(request)
            .send()
            .await
            .map_err(|e| MergeError::Network(format!("batchUpdate failed: {e}")))?;

        if response.status().is_success() {
            return response
                .json()
                .await
                .map_err(|e| MergeError::Network(format!("failed to parse batchUpdate response: {e}")));
        }

        let (status, body) = read_error(response).await;
        if status == StatusCode::BAD_REQUEST && body.status == "FAILED_PRECONDITION" {
            if let Some(required) = request.required_revision() {
                warn!("batchUpdate on {} rejected: {}", document_id, body.message);
                return Err(MergeError::RevisionConflict {
                    document_id: document_id.clone(),
                    required: required.clone(),
                    current: None,
                });
            }
        }
        Err(match status {
            StatusCode::NOT_FOUND => MergeError::DocumentNotFound(document_id.to_string()),
            StatusCode::FORBIDDEN => MergeError::PermissionDenied(body.message),
            _ => MergeError::Api {
                status: status.as_u16(),
                message: body.message,
            },
        })
    }
}
