//! `MailMerge`: the operations a client script calls, bound to one store.

use crate::config::MergeConfig;
use crate::error::MergeResult;
use crate::folder::FolderResolver;
use crate::job::MergeJob;
use crate::store::{DocumentStore, EditableDocumentStore, FolderStore};
use crate::substitute::{Substituter, Substitution};
use crate::transplant::{self, TransplantReport};
use docmerge_model::{Document, FieldMap};
use docmerge_types::{DocumentId, FolderId, RevisionId};
use serde::Serialize;

/// Identity of a merge folder as handed back to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FolderSummary {
    pub id: FolderId,
    pub name: String,
    pub url: String,
}

/// A freshly copied merge document.
#[derive(Debug, Clone, Serialize)]
pub struct MergeDocument {
    pub url: String,
    pub document: Document,
}

/// Mail merge operations over a store.
pub struct MailMerge<S> {
    store: S,
    config: MergeConfig,
}

impl<S> MailMerge<S> {
    pub fn new(store: S, config: MergeConfig) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &MergeConfig {
        &self.config
    }

    /// Starts a job for `template_id`.
    pub fn job(&self, template_id: DocumentId) -> MergeJob<'_, S> {
        MergeJob::new(&self.store, &self.config, template_id)
    }
}

impl<S: FolderStore> MailMerge<S> {
    /// Creates the merge folder for a template and returns it.
    pub async fn resolve_folder(&self, template_id: &DocumentId) -> MergeResult<FolderSummary> {
        self.resolve_folder_in(template_id, None).await
    }

    /// Like [`resolve_folder`](Self::resolve_folder) with an explicit parent.
    pub async fn resolve_folder_in(
        &self,
        template_id: &DocumentId,
        parent: Option<&FolderId>,
    ) -> MergeResult<FolderSummary> {
        let merge_folder = FolderResolver::new(&self.store, &self.config)
            .prepare(template_id, parent)
            .await?;
        let folder = merge_folder.folder;
        Ok(FolderSummary {
            id: folder.id,
            name: folder.name,
            url: folder.url,
        })
    }
}

impl<S: DocumentStore> MailMerge<S> {
    /// Copies the template into `folder_id` as `name` and returns the copy.
    pub async fn create_merge_document(
        &self,
        template_id: &DocumentId,
        folder_id: &FolderId,
        name: &str,
    ) -> MergeResult<MergeDocument> {
        let copy = self.store.copy_file(template_id, name, folder_id).await?;
        let document = self.store.get_document(&copy.id).await?;
        Ok(MergeDocument {
            url: copy.url,
            document,
        })
    }

    /// Applies `fields` to `document_id` if it is still at `revision`.
    pub async fn apply_substitution(
        &self,
        document_id: &DocumentId,
        revision: &RevisionId,
        fields: &FieldMap,
    ) -> MergeResult<Substitution> {
        Substituter::new(&self.store)
            .apply_with_retry(document_id, revision, fields, self.config.conflict_retries)
            .await
    }

    /// Reads a template with its current revision.
    pub async fn template_document(&self, template_id: &DocumentId) -> MergeResult<Document> {
        self.store.get_document(template_id).await
    }
}

impl<S: EditableDocumentStore> MailMerge<S> {
    /// Copies the template into `folder_id` and clears the copy's body.
    pub async fn create_cleared_merge_document(
        &self,
        template_id: &DocumentId,
        folder_id: &FolderId,
        name: &str,
    ) -> MergeResult<MergeDocument> {
        let copy =
            transplant::create_cleared_merge_document(&self.store, template_id, name, folder_id)
                .await?;
        let document = self.store.get_document(&copy.id).await?;
        Ok(MergeDocument {
            url: copy.url,
            document,
        })
    }

    /// Appends the template's body, with `fields` substituted, to `target_id`.
    pub async fn transplant_into(
        &self,
        template_id: &DocumentId,
        target_id: &DocumentId,
        fields: &FieldMap,
    ) -> MergeResult<TransplantReport> {
        transplant::transplant_into(&self.store, template_id, target_id, fields).await
    }
}
