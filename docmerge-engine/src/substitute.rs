//! Revision-Guarded Batch Substituter.
//!
//! Sends one field map as a single batch of replace-all requests, guarded
//! by the revision the caller last observed. The store either applies the
//! whole batch or, if the document moved on, rejects it with
//! [`MergeError::RevisionConflict`] and changes nothing.

use crate::error::{MergeError, MergeResult};
use crate::store::DocumentStore;
use docmerge_model::{BatchUpdateRequest, FieldMap};
use docmerge_types::{DocumentId, RevisionId};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Outcome of an accepted substitution batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Substitution {
    pub document_id: DocumentId,
    /// Revision after the batch was applied.
    pub revision: RevisionId,
    /// Occurrences replaced per field code.
    pub occurrences: BTreeMap<String, u32>,
    /// Submissions made, including the accepted one.
    pub attempts: u32,
}

impl Substitution {
    /// Total occurrences replaced across all field codes.
    pub fn total(&self) -> u64 {
        self.occurrences.values().map(|&n| u64::from(n)).sum()
    }
}

/// Applies field maps to documents of a [`DocumentStore`].
pub struct Substituter<'a, S: DocumentStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: DocumentStore + ?Sized> Substituter<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Submits `fields` against `revision` once.
    pub async fn apply(
        &self,
        document_id: &DocumentId,
        revision: &RevisionId,
        fields: &FieldMap,
    ) -> MergeResult<Substitution> {
        if fields.is_empty() {
            debug!("Empty field map for {}, nothing to submit", document_id);
            return Ok(Substitution {
                document_id: document_id.clone(),
                revision: revision.clone(),
                occurrences: BTreeMap::new(),
                attempts: 0,
            });
        }

        let ordered = fields.ordered();
        let request = BatchUpdateRequest::guarded(revision.clone(), fields.to_requests());
        let response = self.store.batch_update(document_id, &request).await?;

        let occurrences: BTreeMap<String, u32> = ordered
            .iter()
            .zip(&response.replies)
            .map(|((code, _), reply)| {
                let changed = reply
                    .replace_all_text
                    .as_ref()
                    .map(|r| r.occurrences_changed)
                    .unwrap_or(0);
                (code.to_string(), changed)
            })
            .collect();

        let revision = match response.new_revision_id() {
            Some(rev) => rev.clone(),
            None => self.store.get_document(document_id).await?.revision_id,
        };
        info!(
            "Substituted {} fields in {} ({} occurrences), now at revision {}",
            fields.len(),
            document_id,
            response.applied_count(),
            revision
        );

        Ok(Substitution {
            document_id: document_id.clone(),
            revision,
            occurrences,
            attempts: 1,
        })
    }

    /// Submits `fields`, re-reading the live revision and resubmitting after
    /// each conflict, at most `retries` times.
    pub async fn apply_with_retry(
        &self,
        document_id: &DocumentId,
        revision: &RevisionId,
        fields: &FieldMap,
        retries: u32,
    ) -> MergeResult<Substitution> {
        let mut revision = revision.clone();
        let mut attempt = 1;
        loop {
            match self.apply(document_id, &revision, fields).await {
                Ok(mut done) => {
                    if done.attempts > 0 {
                        done.attempts = attempt;
                    }
                    return Ok(done);
                }
                Err(err @ MergeError::RevisionConflict { .. }) if attempt <= retries => {
                    warn!(
                        "Attempt {} on {} failed ({}), re-reading revision",
                        attempt, document_id, err
                    );
                    revision = self.store.get_document(document_id).await?.revision_id;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
