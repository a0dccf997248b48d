//! dmct: documentation metadata and compliance toolkit.
//!
//! A batch tool over a Markdown corpus whose documents carry a YAML
//! front-matter block. It repairs metadata in place and audits corpus health.
//!
//! # Commands
//!
//! - `enhance-keywords`: bring `ai_keywords` to 12 tokens
//! - `refresh-stale`: restamp `last_updated` on stale documents
//! - `align-phases`: make `evolutionary_phase` match the phase directory
//! - `refresh-campaign`: refresh and align in one run, with a report
//! - `validate`: classify every document's front-matter
//! - `audit`: sampled, seeded compliance audit with history and trend
//! - `classify-change`, `change-entry`, `validate-history`: change-history helpers
//!
//! Every mutating command rewrites whole files through the codec, keeps a
//! `<file>.bak` sidecar unless `--no-backup` is given, and holds an advisory
//! lock on the corpus root for the duration of the run.
//!
//! # Crate Structure
//!
//! - [`core`]: codec, scanner, phase catalogue, durable writes, pass runner
//! - [`plugins`]: the operations behind each command

pub mod core;
pub mod plugins;

mod cli;

use crate::cli::{AuditKind, AuditRunArgs, ChangeEntryCli, Cli, Command, GlobalArgs, OutputFormat};
use crate::core::config::{self, DmctConfig};
use crate::core::error::DmctError;
use crate::core::interrupt;
use crate::core::output;
use crate::core::pass::{DocumentPass, PassRunner, RunSummary};
use crate::core::time;
use crate::plugins::{align, audit, campaign, change_history, freshness, keywords, validate};

use clap::Parser;
use colored::Colorize;
use serde::Serialize;
use std::ffi::OsString;
use std::fs;
use std::path::Path;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Exit status for `validate --strict` when a document is not compliant.
pub const EXIT_NOT_COMPLIANT: i32 = 3;

/// Entry point for the binary. Returns the process exit code.
pub fn run() -> Result<i32, DmctError> {
    run_with_args(std::env::args_os())
}

/// Run using the provided argument iterator.
pub fn run_with_args<I, T>(args: I) -> Result<i32, DmctError>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = Cli::try_parse_from(args).unwrap_or_else(|e| e.exit());
    init_tracing(cli.global.verbose);
    interrupt::install();

    match cli.command {
        Command::EnhanceKeywords => {
            let cfg = build_config(&cli.global)?;
            run_pass(&cfg, cli.global.format, &keywords::KeywordPass)
        }
        Command::RefreshStale { threshold_days } => {
            let mut cfg = build_config(&cli.global)?;
            if let Some(days) = threshold_days {
                cfg.stale_threshold_days = days;
            }
            let pass = freshness::FreshnessPass {
                threshold_days: cfg.stale_threshold_days,
            };
            run_pass(&cfg, cli.global.format, &pass)
        }
        Command::AlignPhases => {
            let cfg = build_config(&cli.global)?;
            run_pass(&cfg, cli.global.format, &align::AlignPass)
        }
        Command::RefreshCampaign => {
            let cfg = build_config(&cli.global)?;
            run_refresh_campaign(&cfg, cli.global.format)
        }
        Command::Validate { strict } => {
            let cfg = build_config(&cli.global)?;
            run_validate(&cfg, cli.global.format, strict)
        }
        Command::Audit(audit_cli) => {
            let cfg = build_config(&cli.global)?;
            let (audit_type, rate, run) = match audit_cli.kind {
                AuditKind::Weekly(run) => (audit::AuditType::Weekly, None, run),
                AuditKind::Monthly(run) => (audit::AuditType::Monthly, None, run),
                AuditKind::Custom { rate, run } => (audit::AuditType::Manual, Some(rate), run),
            };
            run_audit(&cfg, cli.global.format, audit_type, rate, run)
        }
        Command::ClassifyChange {
            description,
            current_score,
            output,
        } => {
            let assessment = change_history::classify(&description, current_score);
            if let Some(path) = &output {
                change_history::write_assessment(&assessment, path)?;
            }
            match cli.global.format {
                OutputFormat::Json => print_json(&assessment)?,
                OutputFormat::Text => print_assessment(&assessment, output.as_deref()),
            }
            Ok(0)
        }
        Command::ChangeEntry(entry_cli) => run_change_entry(entry_cli),
        Command::ValidateHistory { file } => {
            let text = fs::read_to_string(&file).map_err(|source| DmctError::UnreadableFile {
                path: file.clone(),
                source,
            })?;
            let report = change_history::validate_history(&text);
            match cli.global.format {
                OutputFormat::Json => print_json(&report)?,
                OutputFormat::Text => {
                    let glyph = if report.valid {
                        "✓".bright_green()
                    } else {
                        "✗".bright_red()
                    };
                    println!("{} {}: {:?} change history", glyph, file.display(), report.format);
                    for msg in &report.messages {
                        println!("  {} {}", "▸".bright_cyan(), msg);
                    }
                }
            }
            Ok(0)
        }
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        tracing_subscriber::EnvFilter::new("debug")
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"))
    };
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .without_time()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .try_init();
}

/// Defaults, then the config file, then flags. Relative report directories
/// are resolved against the working directory once, here.
fn build_config(global: &GlobalArgs) -> Result<DmctConfig, DmctError> {
    let file = config::load_config_file(&global.root, global.config.as_deref())?;
    let mut cfg = DmctConfig::new(&global.root).apply_file(file)?;
    cfg.dry_run = global.dry_run;
    if global.no_backup {
        cfg.backup = false;
    }
    if let Some(dir) = &global.reports_dir {
        cfg.reports_dir = dir.clone();
    }
    if cfg.reports_dir.is_relative() {
        cfg.reports_dir = std::env::current_dir()?.join(&cfg.reports_dir);
    }
    Ok(cfg)
}

fn print_json<T: Serialize>(value: &T) -> Result<(), DmctError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_dry_run_details(summary: &RunSummary) {
    for file in summary.updated() {
        println!(
            "  {} {}: {}",
            "▸".bright_cyan(),
            file.path.display(),
            file.detail.as_deref().unwrap_or("")
        );
    }
}

fn run_pass(cfg: &DmctConfig, format: OutputFormat, pass: &dyn DocumentPass) -> Result<i32, DmctError> {
    let summary = PassRunner::new(cfg, time::now_cet()).run(pass)?;
    match format {
        OutputFormat::Json => print_json(&summary)?,
        OutputFormat::Text => {
            output::print_run_summary(&summary);
            if summary.dry_run {
                print_dry_run_details(&summary);
            }
        }
    }
    Ok(interrupted_exit(&[&summary]))
}

fn interrupted_exit(summaries: &[&RunSummary]) -> i32 {
    if summaries.iter().any(|s| s.interrupted) {
        eprintln!("{} interrupted; remaining documents were not processed", "⚠".bright_yellow());
        interrupt::EXIT_INTERRUPTED
    } else {
        0
    }
}

fn run_refresh_campaign(cfg: &DmctConfig, format: OutputFormat) -> Result<i32, DmctError> {
    let result = campaign::run_campaign(cfg, time::now_cet())?;
    match format {
        OutputFormat::Json => print_json(&serde_json::json!({
            "refresh": result.refresh,
            "align": result.align,
            "report_path": result.report_path,
        }))?,
        OutputFormat::Text => {
            output::print_run_summary(&result.refresh);
            output::print_run_summary(&result.align);
            match &result.report_path {
                Some(path) => println!("  {} report: {}", "▸".bright_cyan(), path.display()),
                None => println!("\n{}", result.report),
            }
        }
    }
    Ok(interrupted_exit(&[&result.refresh, &result.align]))
}

fn run_validate(cfg: &DmctConfig, format: OutputFormat, strict: bool) -> Result<i32, DmctError> {
    let summary = validate::validate_corpus(cfg)?;
    match format {
        OutputFormat::Json => print_json(&summary)?,
        OutputFormat::Text => {
            let glyph = if summary.all_compliant() {
                "✓".bright_green()
            } else {
                "⚠".bright_yellow()
            };
            println!(
                "{} {}, non-compliant {}",
                glyph,
                output::summary_line(summary.total, "compliant", summary.compliant, summary.errors),
                summary.non_compliant
            );
            output::print_error_preview(&summary.problem_messages());
        }
    }
    if strict && !summary.all_compliant() {
        return Ok(EXIT_NOT_COMPLIANT);
    }
    Ok(0)
}

fn run_audit(
    cfg: &DmctConfig,
    format: OutputFormat,
    audit_type: audit::AuditType,
    rate: Option<f64>,
    run: AuditRunArgs,
) -> Result<i32, DmctError> {
    let seed = run.seed.unwrap_or_else(rand::random::<u64>);
    let opts = audit::AuditOptions::new(audit_type, rate, seed, time::now_cet())?;
    let (record, artifacts) = audit::run_audit(cfg, &opts, run.output.as_deref())?;

    match format {
        OutputFormat::Json => print_json(&serde_json::json!({
            "record": record,
            "artifacts": artifacts,
        }))?,
        OutputFormat::Text => {
            let d = &record.distribution;
            println!(
                "{} {} audit: sampled {} of {} documents (seed {})",
                "✓".bright_green(),
                record.audit_type,
                record.sample_size,
                record.total_documents,
                record.seed
            );
            println!(
                "  distribution: excellent {}, good {}, marginal {}, poor {}",
                d.excellent, d.good, d.marginal, d.poor
            );
            let mean = record
                .mean_score
                .map(|m| format!("{:.1}", m))
                .unwrap_or_else(|| "n/a".to_string());
            let trend = record
                .trend
                .label
                .map(|l| l.as_str().to_string())
                .or_else(|| record.trend.note.clone())
                .unwrap_or_default();
            println!("  mean score: {} | trend: {}", mean, trend);
            println!("  {} report: {}", "▸".bright_cyan(), artifacts.markdown_path.display());
            println!("  {} record: {}", "▸".bright_cyan(), artifacts.json_path.display());
            println!("  digest: sha256:{}", artifacts.digest);
            let errors: Vec<String> = record
                .results
                .iter()
                .filter_map(|r| r.error.as_ref().map(|e| format!("{}: {}", r.path, e)))
                .collect();
            output::print_error_preview(&errors);
        }
    }
    Ok(0)
}

fn print_assessment(assessment: &change_history::Assessment, written: Option<&Path>) {
    let (lo, hi) = assessment.delta_range;
    let (score_lo, score_hi) = assessment.predicted_score_range();
    let categories: Vec<&str> = assessment
        .recommended_categories
        .iter()
        .map(|c| c.as_str())
        .collect();
    println!("level: {}", assessment.level.as_str().bold());
    println!(
        "predicted delta: [{:+}, {:+}] (current {} -> {} to {})",
        lo, hi, assessment.current_score, score_lo, score_hi
    );
    println!("recommended categories: {}", categories.join(", "));
    if assessment.affected_components.is_empty() {
        println!("affected components: none detected");
    } else {
        println!("affected components: {}", assessment.affected_components.join(", "));
    }
    if let Some(path) = written {
        println!("  {} assessment: {}", "▸".bright_cyan(), path.display());
    }
}

fn run_change_entry(args: ChangeEntryCli) -> Result<i32, DmctError> {
    let category: change_history::ChangeCategory = args.category.parse()?;
    let impact: change_history::ImpactLevel = args.impact.parse()?;
    let date = args
        .date
        .unwrap_or_else(|| time::now_cet().format("%Y-%m-%d").to_string());
    let entry = change_history::ChangeEntry {
        version: args.entry_version,
        date,
        author: args.author,
        category,
        impact,
        new_score: args.new_score,
        reviewer: args.reviewer,
        notes: args.notes,
        description: args.description,
    };
    let row = change_history::render_row(&entry);
    if args.table {
        print!("{}", change_history::render_table(&[row]));
    } else {
        println!("{}", row);
    }
    Ok(0)
}
