//! CLI struct definitions for the dmct command-line interface.
//!
//! All clap-derived types live here. Dispatch logic lives in `lib.rs`.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[clap(
    name = "dmct",
    version = env!("CARGO_PKG_VERSION"),
    about = "Documentation metadata and compliance toolkit: keeps Markdown front-matter consistent and audits corpus health."
)]
pub(crate) struct Cli {
    #[clap(flatten)]
    pub global: GlobalArgs,
    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    Text,
    Json,
}

#[derive(clap::Args, Debug)]
pub(crate) struct GlobalArgs {
    /// Documentation root to operate on.
    #[clap(long, global = true, default_value = "docs")]
    pub root: PathBuf,
    /// Compute and report changes without writing any document.
    #[clap(long, global = true)]
    pub dry_run: bool,
    /// Rewrite documents without keeping a `<file>.bak` sidecar.
    #[clap(long, global = true)]
    pub no_backup: bool,
    /// Config file (defaults to `<root>/dmct.toml` when present).
    #[clap(long, global = true)]
    pub config: Option<PathBuf>,
    /// Directory for audit reports and history (default: `reports`).
    #[clap(long, global = true)]
    pub reports_dir: Option<PathBuf>,
    /// Log debug diagnostics to stderr.
    #[clap(long, short = 'v', global = true)]
    pub verbose: bool,
    /// Output format: 'text' or 'json'.
    #[clap(long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

#[derive(Subcommand, Debug)]
pub(crate) enum Command {
    /// Bring every document's ai_keywords to 12 tokens
    EnhanceKeywords,
    /// Rewrite last_updated on documents older than the threshold
    RefreshStale {
        /// Staleness threshold in days (default from config, else 30).
        #[clap(long)]
        threshold_days: Option<u32>,
    },
    /// Make evolutionary_phase match the phase directory a document lives in
    AlignPhases,
    /// Run a sampled compliance audit and write its reports
    Audit(AuditCli),
    /// Classify the ethical impact of a described change
    ClassifyChange {
        /// Description of the proposed change.
        description: String,
        /// Current ethical score of the document.
        #[clap(long, default_value_t = 90)]
        current_score: u32,
        /// Also write the assessment as Markdown to this path.
        #[clap(long)]
        output: Option<PathBuf>,
    },
    /// Render one change-history table row
    ChangeEntry(ChangeEntryCli),
    /// Check a document's change-history table for the enhanced columns
    ValidateHistory {
        /// Markdown file to inspect.
        file: PathBuf,
    },
    /// Check front-matter of every document and classify it
    Validate {
        /// Exit with status 3 when any document is not compliant.
        #[clap(long)]
        strict: bool,
    },
    /// Refresh stale documents, align phases, and write a campaign report
    RefreshCampaign,
}

#[derive(clap::Args, Debug)]
pub(crate) struct AuditCli {
    #[clap(subcommand)]
    pub kind: AuditKind,
}

#[derive(Subcommand, Debug)]
pub(crate) enum AuditKind {
    /// 10% sample
    Weekly(AuditRunArgs),
    /// 25% sample
    Monthly(AuditRunArgs),
    /// Caller-chosen sample rate
    Custom {
        /// Sample rate in (0, 1].
        #[clap(long)]
        rate: f64,
        #[clap(flatten)]
        run: AuditRunArgs,
    },
}

#[derive(clap::Args, Debug)]
pub(crate) struct AuditRunArgs {
    /// Markdown report path; the JSON record is written next to it.
    #[clap(long)]
    pub output: Option<PathBuf>,
    /// Sampling seed for reproducible audits.
    #[clap(long, env = "DMCT_SEED")]
    pub seed: Option<u64>,
}

#[derive(clap::Args, Debug)]
pub(crate) struct ChangeEntryCli {
    /// Semantic version of the change.
    #[clap(long, default_value = "1.0.0")]
    pub entry_version: String,
    /// Date column (default: today, CET).
    #[clap(long)]
    pub date: Option<String>,
    #[clap(long, default_value = "Documentation Team")]
    pub author: String,
    /// One of CONTENT_UPDATES, METADATA_CHANGES, COMPLIANCE_CORRECTIONS,
    /// TEMPLATE_STANDARDIZATION, VIOLATION_FIXES, APPROVAL_UPDATES,
    /// AUDIT_IMPROVEMENTS, DOC_TEMPLATE_CREATION.
    #[clap(long, default_value = "CONTENT_UPDATES")]
    pub category: String,
    /// NONE, LOW, MEDIUM, HIGH or NEW_DOCUMENT.
    #[clap(long, default_value = "MEDIUM")]
    pub impact: String,
    /// Score shown for NEW_DOCUMENT entries.
    #[clap(long)]
    pub new_score: Option<u32>,
    #[clap(long, default_value = "Technical Review Board")]
    pub reviewer: String,
    #[clap(long, default_value = "Compliance verified")]
    pub notes: String,
    #[clap(long, default_value = "Document updates applied")]
    pub description: String,
    /// Print the full table with heading and header rows.
    #[clap(long)]
    pub table: bool,
}
