//! docmerge: templated mail merge from the command line.
//!
//! Copies a template document once per data record (or appends every record
//! to one consolidated document) and fills in field codes such as `{{name}}`.
//!
//! Usage:
//!   docmerge --workspace ws.json merge <TEMPLATE_ID> records.json
//!   docmerge --google --config docmerge.json resolve-folder <TEMPLATE_ID>
//!
//! The Google backend reads its bearer token from the config file or from
//! `DOCMERGE_ACCESS_TOKEN`.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use docmerge_cli::{
    init_logging, load_records, merge_consolidated, merge_per_record, open_workspace,
    resolve_folder, save_workspace, summarize, CliConfig, ACCESS_TOKEN_ENV,
};
use docmerge_engine::{GoogleWorkspace, MailMerge, MemoryWorkspace};
use docmerge_types::{DocumentId, FolderId};
use serde::Serialize;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "docmerge")]
#[command(about = "Templated mail merge over a local workspace or Google Docs")]
struct Args {
    /// Local workspace snapshot (JSON); saved back after the command
    #[arg(long, global = true, conflicts_with = "google")]
    workspace: Option<PathBuf>,

    /// Use Google Drive and Docs
    #[arg(long, global = true)]
    google: bool,

    /// Path to a JSON config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create the merge folder for a template and print it
    ResolveFolder {
        template: DocumentId,
        /// Create the merge folder under this folder instead of the template's
        #[arg(long)]
        parent: Option<FolderId>,
    },
    /// Create one document per record
    Merge {
        template: DocumentId,
        records: PathBuf,
        #[arg(long)]
        parent: Option<FolderId>,
    },
    /// Append every record to a single document (local workspace only)
    Consolidate {
        template: DocumentId,
        records: PathBuf,
        /// Name of the consolidated document; defaults to the template title
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        parent: Option<FolderId>,
    },
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{json}");
    Ok(())
}

async fn workspace_command(merge: &MailMerge<MemoryWorkspace>, command: Command) -> Result<()> {
    match command {
        Command::ResolveFolder { template, parent } => {
            let folder = resolve_folder(merge, &template, parent.as_ref()).await?;
            print_json(&folder)
        }
        Command::Merge {
            template,
            records,
            parent,
        } => {
            let records = load_records(&records)?;
            let report = merge_per_record(merge, &template, parent.as_ref(), &records).await?;
            info!("{}", summarize(&report));
            print_json(&report)
        }
        Command::Consolidate {
            template,
            records,
            name,
            parent,
        } => {
            let records = load_records(&records)?;
            let report = merge_consolidated(
                merge,
                &template,
                parent.as_ref(),
                &records,
                name.as_deref(),
            )
            .await?;
            info!("{}", summarize(&report));
            print_json(&report)
        }
    }
}

async fn run_workspace(path: PathBuf, config: CliConfig, command: Command) -> Result<()> {
    let workspace = open_workspace(&path).await?;
    let merge = MailMerge::new(workspace.clone(), config.merge);
    let result = workspace_command(&merge, command).await;
    // Whatever the job managed to write is kept, even on failure.
    save_workspace(&workspace, &path).await?;
    result
}

async fn run_google(config: CliConfig, command: Command) -> Result<()> {
    let token = std::env::var(ACCESS_TOKEN_ENV).ok();
    let config = config.with_access_token(token);
    if config.google.access_token.is_empty() {
        bail!("No access token: set {ACCESS_TOKEN_ENV} or google.access_token in the config file");
    }

    let store = GoogleWorkspace::new(config.google).context("Failed to create Google client")?;
    let merge = MailMerge::new(store, config.merge);

    match command {
        Command::ResolveFolder { template, parent } => {
            let folder = resolve_folder(&merge, &template, parent.as_ref()).await?;
            print_json(&folder)
        }
        Command::Merge {
            template,
            records,
            parent,
        } => {
            let records = load_records(&records)?;
            let report = merge_per_record(&merge, &template, parent.as_ref(), &records).await?;
            info!("{}", summarize(&report));
            print_json(&report)
        }
        Command::Consolidate { .. } => {
            bail!("consolidate needs --workspace: the Docs API cannot open documents for editing")
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let config = CliConfig::load(args.config.as_deref())?;
    match (args.workspace, args.google) {
        (Some(path), _) => run_workspace(path, config, args.command).await,
        (None, true) => run_google(config, args.command).await,
        (None, false) => bail!("Choose a backend with --workspace <FILE> or --google"),
    }
}
