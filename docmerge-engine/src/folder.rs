//! Folder Resolver: picks the folder a merge job writes into.
//!
//! Resolution never fails because of a missing or unusable parent; it
//! degrades to the acting user's root folder and reports why.

use crate::config::MergeConfig;
use crate::error::MergeResult;
use crate::store::{FileInfo, Folder, FolderStore};
use docmerge_types::{DocumentId, FolderId};
use serde::Serialize;
use tracing::{debug, info, warn};

/// Why resolution fell back to the root folder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FolderFallback {
    /// The template has no parent folder.
    NoParents,
    /// Parents could not be listed.
    ParentLookupFailed,
    /// No candidate grants the acting user write access.
    NoWritableParent,
}

/// Result of resolving a template's destination folder.
#[derive(Debug, Clone, Serialize)]
pub struct FolderResolution {
    /// The template file.
    pub template: FileInfo,
    /// Selected folder.
    pub folder: Folder,
    /// Writable candidates in enumeration order; the first is selected.
    pub writable: Vec<Folder>,
    pub fallback: Option<FolderFallback>,
}

/// How merge folder creation degraded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CreateFallback {
    /// Creating under the selected folder failed; created under root.
    CreatedUnderRoot,
    /// Creating under root failed too; root itself is used.
    UsedRoot,
}

/// The folder a merge job writes its documents into.
#[derive(Debug, Clone, Serialize)]
pub struct MergeFolder {
    pub folder: Folder,
    pub resolution: FolderResolution,
    pub fallback: Option<CreateFallback>,
}

/// Resolves destination folders against a [`FolderStore`].
pub struct FolderResolver<'a, S: FolderStore + ?Sized> {
    store: &'a S,
    config: &'a MergeConfig,
}

impl<'a, S: FolderStore + ?Sized> FolderResolver<'a, S> {
    pub fn new(store: &'a S, config: &'a MergeConfig) -> Self {
        Self { store, config }
    }

    /// Picks the first writable parent of the template, or root.
    pub async fn resolve(&self, template_id: &DocumentId) -> MergeResult<FolderResolution> {
        self.resolve_with_parent(template_id, None).await
    }

    /// Like [`resolve`](Self::resolve), but an explicit `parent` replaces the
    /// template's parents as the only candidate.
    pub async fn resolve_with_parent(
        &self,
        template_id: &DocumentId,
        parent: Option<&FolderId>,
    ) -> MergeResult<FolderResolution> {
        let template = self.store.get_file(template_id).await?;

        let candidates = match parent {
            Some(parent_id) => self.store.get_folder(parent_id).await.map(|f| vec![f]),
            None => self.store.list_parents(template_id).await,
        };
        let candidates = match candidates {
            Ok(candidates) => candidates,
            Err(e) => {
                warn!("Failed to list parents of {}: {}", template_id, e);
                return self
                    .fall_back(template, FolderFallback::ParentLookupFailed)
                    .await;
            }
        };
        if candidates.is_empty() {
            debug!("Template {} has no parent folder", template_id);
            return self.fall_back(template, FolderFallback::NoParents).await;
        }

        let mut writable = Vec::new();
        for folder in candidates {
            match self.store.permission(&folder).await {
                Ok(grade) if grade.can_write() => writable.push(folder),
                Ok(grade) => {
                    info!(
                        "Skipping folder {} ({}): access is {:?}",
                        folder.name, folder.id, grade
                    );
                }
                Err(e) => {
                    warn!(
                        "Failed to read permission on folder {} ({}): {}",
                        folder.name, folder.id, e
                    );
                }
            }
        }

        let Some(first) = writable.first().cloned() else {
            return self
                .fall_back(template, FolderFallback::NoWritableParent)
                .await;
        };
        if writable.len() > 1 {
            info!(
                "Template {} has {} writable folders, using {} ({})",
                template_id,
                writable.len(),
                first.name,
                first.id
            );
        }

        Ok(FolderResolution {
            template,
            folder: first,
            writable,
            fallback: None,
        })
    }

    async fn fall_back(
        &self,
        template: FileInfo,
        reason: FolderFallback,
    ) -> MergeResult<FolderResolution> {
        let root = self.store.root_folder().await?;
        info!("Using root folder {} for {}: {:?}", root.id, template.id, reason);
        Ok(FolderResolution {
            template,
            folder: root,
            writable: Vec::new(),
            fallback: Some(reason),
        })
    }

    /// Creates `<prefix><template name>` under the resolved folder.
    ///
    /// Retries under root on failure, and uses root itself as a last resort.
    /// Only a failing root lookup is returned as an error.
    pub async fn create_merge_folder(
        &self,
        resolution: FolderResolution,
    ) -> MergeResult<MergeFolder> {
        let name = self.config.folder_name(&resolution.template.name);

        match self.store.create_folder(&resolution.folder, &name).await {
            Ok(folder) => {
                info!("Created merge folder {} ({})", folder.name, folder.id);
                return Ok(MergeFolder {
                    folder,
                    resolution,
                    fallback: None,
                });
            }
            Err(e) => warn!(
                "Failed to create {} in {}: {}",
                name, resolution.folder.id, e
            ),
        }

        let root = self.store.root_folder().await?;
        if root.id != resolution.folder.id {
            match self.store.create_folder(&root, &name).await {
                Ok(folder) => {
                    info!("Created merge folder {} ({}) under root", folder.name, folder.id);
                    return Ok(MergeFolder {
                        folder,
                        resolution,
                        fallback: Some(CreateFallback::CreatedUnderRoot),
                    });
                }
                Err(e) => warn!("Failed to create {} in root: {}", name, e),
            }
        }

        warn!("Writing merge documents directly into root folder {}", root.id);
        Ok(MergeFolder {
            folder: root,
            resolution,
            fallback: Some(CreateFallback::UsedRoot),
        })
    }

    /// Resolves and creates the merge folder in one step.
    pub async fn prepare(
        &self,
        template_id: &DocumentId,
        parent: Option<&FolderId>,
    ) -> MergeResult<MergeFolder> {
        let resolution = self.resolve_with_parent(template_id, parent).await?;
        self.create_merge_folder(resolution).await
    }
}
