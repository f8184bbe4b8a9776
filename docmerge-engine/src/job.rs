//! Merge Job orchestration.
//!
//! A job resolves the destination folder once, then produces output for each
//! record in turn. Every remote call is awaited before the next one starts.
//!
//! ## Modes
//!
//! - [`MergeMode::PerRecord`]: one copy of the template per record, filled in
//!   with a revision-guarded batch.
//! - [`MergeMode::Consolidated`]: one cleared copy of the template that every
//!   record's substituted body is appended to.
//!
//! A revision conflict on one record marks that record failed and the job
//! moves on; any other error aborts the job.

use crate::config::MergeConfig;
use crate::error::{MergeError, MergeResult};
use crate::folder::{FolderResolver, MergeFolder};
use crate::store::{edit_document, DocumentStore, EditableDocumentStore, FileInfo, FolderStore};
use crate::substitute::Substituter;
use crate::transplant::{create_cleared_merge_document, transplant_body};
use chrono::{DateTime, Utc};
use docmerge_model::{FieldMap, FieldOverlap};
use docmerge_types::{DocumentId, FolderId};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// How records become documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeMode {
    PerRecord,
    Consolidated,
}

/// Job lifecycle. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Idle,
    FolderResolved,
    Done,
}

/// Progress of a single record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordState {
    Pending,
    Copied,
    Substituted,
    Finalized,
    Failed,
}

/// One data record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeRecord {
    /// Output document name; derived from the template name when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub fields: FieldMap,
}

impl MergeRecord {
    pub fn new(fields: FieldMap) -> Self {
        Self { name: None, fields }
    }

    pub fn named(name: impl Into<String>, fields: FieldMap) -> Self {
        Self {
            name: Some(name.into()),
            fields,
        }
    }
}

/// What happened to one record.
#[derive(Debug, Clone, Serialize)]
pub struct RecordOutcome {
    pub index: usize,
    pub name: String,
    pub state: RecordState,
    /// States passed through, in order, ending with `state`.
    pub history: Vec<RecordState>,
    /// Document the record was written into.
    pub document: Option<DocumentId>,
    /// Field code occurrences replaced.
    pub replaced: u64,
    /// Elements left out because their type is not supported.
    pub skipped: usize,
    pub error: Option<String>,
}

impl RecordOutcome {
    fn new(index: usize, name: String) -> Self {
        Self {
            index,
            name,
            state: RecordState::Pending,
            history: vec![RecordState::Pending],
            document: None,
            replaced: 0,
            skipped: 0,
            error: None,
        }
    }

    fn enter(&mut self, next: RecordState) {
        self.history.push(next);
        self.state = next;
    }
}

/// Summary of a finished job.
#[derive(Debug, Clone, Serialize)]
pub struct JobReport {
    pub mode: MergeMode,
    pub template: DocumentId,
    pub folder: MergeFolder,
    /// The single output document of a consolidated job.
    pub accumulator: Option<FileInfo>,
    pub records: Vec<RecordOutcome>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl JobReport {
    /// Records that reached [`RecordState::Finalized`].
    pub fn finalized(&self) -> usize {
        self.records
            .iter()
            .filter(|r| r.state == RecordState::Finalized)
            .count()
    }

    /// Records that ended in [`RecordState::Failed`].
    pub fn failed(&self) -> usize {
        self.records
            .iter()
            .filter(|r| r.state == RecordState::Failed)
            .count()
    }
}

/// A merge of one template against a list of records.
pub struct MergeJob<'a, S: ?Sized> {
    store: &'a S,
    config: &'a MergeConfig,
    template_id: DocumentId,
    parent: Option<FolderId>,
    state: JobState,
}

impl<'a, S: ?Sized> MergeJob<'a, S> {
    pub fn new(store: &'a S, config: &'a MergeConfig, template_id: DocumentId) -> Self {
        Self {
            store,
            config,
            template_id,
            parent: None,
            state: JobState::Idle,
        }
    }

    /// Writes into a folder created under `parent` instead of the template's parent.
    pub fn with_parent(mut self, parent: FolderId) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    fn advance(&mut self, next: JobState) {
        debug_assert!(next > self.state);
        debug!("Job on {}: {:?} -> {:?}", self.template_id, self.state, next);
        self.state = next;
    }

    fn record_name(&self, template_name: &str, index: usize, record: &MergeRecord) -> String {
        record
            .name
            .clone()
            .unwrap_or_else(|| format!("{} ({})", template_name, index + 1))
    }
}

fn log_overlaps(index: usize, fields: &FieldMap) {
    for overlap in fields.overlaps() {
        match overlap {
            FieldOverlap::CodeContainsCode { outer, inner } => warn!(
                "Record {}: field code {:?} contains {:?}; the longer code is replaced first",
                index, outer, inner
            ),
            FieldOverlap::ValueContainsCode { code, other_code } => warn!(
                "Record {}: value of {:?} contains field code {:?}",
                index, code, other_code
            ),
        }
    }
}

impl<S> MergeJob<'_, S>
where
    S: FolderStore + ?Sized,
{
    async fn resolve_folder(&mut self) -> MergeResult<MergeFolder> {
        let resolver = FolderResolver::new(self.store, self.config);
        let folder = resolver
            .prepare(&self.template_id, self.parent.as_ref())
            .await?;
        self.advance(JobState::FolderResolved);
        Ok(folder)
    }
}

impl<S> MergeJob<'_, S>
where
    S: FolderStore + DocumentStore + ?Sized,
{
    /// Copies the template once per record and substitutes each copy.
    pub async fn run_per_record(mut self, records: &[MergeRecord]) -> MergeResult<JobReport> {
        let started_at = Utc::now();
        let folder = self.resolve_folder().await?;
        let template_name = folder.resolution.template.name.clone();
        let substituter = Substituter::new(self.store);

        let mut outcomes = Vec::with_capacity(records.len());
        for (index, record) in records.iter().enumerate() {
            log_overlaps(index, &record.fields);
            let mut outcome = RecordOutcome::new(index, self.record_name(&template_name, index, record));

            let copy = self
                .store
                .copy_file(&self.template_id, &outcome.name, &folder.folder.id)
                .await?;
            outcome.document = Some(copy.id.clone());
            outcome.enter(RecordState::Copied);

            let revision = self.store.get_document(&copy.id).await?.revision_id;
            match substituter
                .apply_with_retry(&copy.id, &revision, &record.fields, self.config.conflict_retries)
                .await
            {
                Ok(done) => {
                    outcome.enter(RecordState::Substituted);
                    outcome.replaced = done.total();
                    debug!(
                        "Record {} written to {} at revision {} after {} attempt(s)",
                        index, copy.id, done.revision, done.attempts
                    );
                    // Batch updates persist on acceptance; nothing left to save.
                    outcome.enter(RecordState::Finalized);
                }
                Err(err @ MergeError::RevisionConflict { .. }) => {
                    warn!("Record {} ({}) failed: {}", index, outcome.name, err);
                    outcome.enter(RecordState::Failed);
                    outcome.error = Some(err.to_string());
                }
                Err(err) => return Err(err),
            }
            outcomes.push(outcome);
        }

        self.advance(JobState::Done);
        let report = JobReport {
            mode: MergeMode::PerRecord,
            template: self.template_id.clone(),
            folder,
            accumulator: None,
            records: outcomes,
            started_at,
            finished_at: Utc::now(),
        };
        info!(
            "Merge of {} done: {} documents, {} failed",
            self.template_id,
            report.finalized(),
            report.failed()
        );
        Ok(report)
    }
}

impl<S> MergeJob<'_, S>
where
    S: FolderStore + EditableDocumentStore + ?Sized,
{
    /// Appends every record's substituted template body to one document
    /// named `name`.
    pub async fn run_consolidated(
        mut self,
        records: &[MergeRecord],
        name: Option<&str>,
    ) -> MergeResult<JobReport> {
        let started_at = Utc::now();
        let folder = self.resolve_folder().await?;
        let template = self.store.get_document(&self.template_id).await?;
        let name = name.map_or_else(|| template.title.clone(), str::to_string);

        let accumulator =
            create_cleared_merge_document(self.store, &self.template_id, &name, &folder.folder.id)
                .await?;

        let mut outcomes = Vec::with_capacity(records.len());
        for (index, record) in records.iter().enumerate() {
            log_overlaps(index, &record.fields);
            let mut outcome = RecordOutcome::new(index, self.record_name(&template.title, index, record));
            outcome.document = Some(accumulator.id.clone());

            let report = edit_document(self.store, &accumulator.id, |body| {
                transplant_body(&template.body, &record.fields, body)
            })
            .await?;
            // The substituted copy is appended and saved in one edit.
            outcome.enter(RecordState::Substituted);
            outcome.replaced = report.replaced as u64;
            outcome.skipped = report.skipped.len();
            outcome.enter(RecordState::Finalized);
            outcomes.push(outcome);
        }

        self.advance(JobState::Done);
        let report = JobReport {
            mode: MergeMode::Consolidated,
            template: self.template_id.clone(),
            folder,
            accumulator: Some(accumulator),
            records: outcomes,
            started_at,
            finished_at: Utc::now(),
        };
        info!(
            "Consolidated merge of {} into {} done: {} records",
            self.template_id,
            name,
            report.finalized()
        );
        Ok(report)
    }
}
