//! Config, records and job runners shared by the `docmerge` binary.

use anyhow::{bail, Context, Result};
use docmerge_engine::{
    DocumentStore, FolderStore, FolderSummary, GoogleWorkspaceConfig, JobReport, MailMerge,
    MemoryWorkspace, MergeConfig, MergeRecord,
};
use docmerge_types::{DocumentId, FolderId};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Environment variable holding the Google bearer token.
pub const ACCESS_TOKEN_ENV: &str = "DOCMERGE_ACCESS_TOKEN";

/// Contents of the optional `--config` file.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
#[serde(default)]
pub struct CliConfig {
    pub merge: MergeConfig,
    pub google: GoogleWorkspaceConfig,
}

impl CliConfig {
    /// Reads a config file, or returns defaults when `path` is `None`.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    /// Takes the access token from `token` when the file did not set one.
    pub fn with_access_token(mut self, token: Option<String>) -> Self {
        if self.google.access_token.is_empty() {
            if let Some(token) = token.filter(|t| !t.trim().is_empty()) {
                self.google.access_token = token;
            }
        }
        self
    }
}

/// Installs the stderr log subscriber. `RUST_LOG` overrides the level.
pub fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

/// Parses a records file: a JSON array of `{ "name"?, "fields": {code: value} }`.
pub fn parse_records(raw: &str) -> Result<Vec<MergeRecord>> {
    let records: Vec<MergeRecord> =
        serde_json::from_str(raw).context("Failed to parse records")?;
    if records.is_empty() {
        bail!("Records file contains no records");
    }
    Ok(records)
}

/// Reads and parses a records file.
pub fn load_records(path: &Path) -> Result<Vec<MergeRecord>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read records file {}", path.display()))?;
    parse_records(&raw).with_context(|| format!("Invalid records file {}", path.display()))
}

/// Creates the merge folder for `template` and reports it.
pub async fn resolve_folder<S: FolderStore>(
    merge: &MailMerge<S>,
    template: &DocumentId,
    parent: Option<&FolderId>,
) -> Result<FolderSummary> {
    let folder = merge
        .resolve_folder_in(template, parent)
        .await
        .with_context(|| format!("Failed to resolve folder for {template}"))?;
    info!("Merge folder: {} ({})", folder.name, folder.url);
    Ok(folder)
}

/// Runs a per-record merge.
pub async fn merge_per_record<S: FolderStore + DocumentStore>(
    merge: &MailMerge<S>,
    template: &DocumentId,
    parent: Option<&FolderId>,
    records: &[MergeRecord],
) -> Result<JobReport> {
    let mut job = merge.job(template.clone());
    if let Some(parent) = parent {
        job = job.with_parent(parent.clone());
    }
    job.run_per_record(records)
        .await
        .with_context(|| format!("Merge of {template} failed"))
}

/// Runs a consolidated merge into one document.
pub async fn merge_consolidated(
    merge: &MailMerge<MemoryWorkspace>,
    template: &DocumentId,
    parent: Option<&FolderId>,
    records: &[MergeRecord],
    name: Option<&str>,
) -> Result<JobReport> {
    let mut job = merge.job(template.clone());
    if let Some(parent) = parent {
        job = job.with_parent(parent.clone());
    }
    job.run_consolidated(records, name)
        .await
        .with_context(|| format!("Consolidated merge of {template} failed"))
}

/// Loads a workspace snapshot.
pub async fn open_workspace(path: &Path) -> Result<MemoryWorkspace> {
    MemoryWorkspace::load(path)
        .await
        .with_context(|| format!("Failed to load workspace {}", path.display()))
}

/// Writes a workspace snapshot back to `path`.
pub async fn save_workspace(workspace: &MemoryWorkspace, path: &Path) -> Result<()> {
    workspace
        .save(path)
        .await
        .with_context(|| format!("Failed to save workspace {}", path.display()))
}

/// One-line summary of a finished job.
pub fn summarize(report: &JobReport) -> String {
    let mut line = format!(
        "{} of {} records merged into {} ({})",
        report.finalized(),
        report.records.len(),
        report.folder.folder.name,
        report.folder.folder.url
    );
    if report.failed() > 0 {
        line.push_str(&format!(", {} failed", report.failed()));
    }
    line
}
