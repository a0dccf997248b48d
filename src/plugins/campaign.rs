//! Refresh campaign: stale refresh followed by phase alignment in one locked
//! run, summarized in a Markdown report.

use crate::core::config::DmctConfig;
use crate::core::error::DmctError;
use crate::core::pass::{DocumentPass, FileStatus, PassRunner, RunSummary};
use crate::core::store;
use crate::core::time;
use crate::plugins::align::AlignPass;
use crate::plugins::freshness::FreshnessPass;
use chrono::{DateTime, FixedOffset};
use std::path::PathBuf;

pub const REPORT_FILE_NAME: &str = "documentation-refresh-campaign-report.md";

#[derive(Debug, Clone)]
pub struct CampaignResult {
    pub refresh: RunSummary,
    pub align: RunSummary,
    pub report: String,
    /// `None` on dry runs.
    pub report_path: Option<PathBuf>,
}

fn section(out: &mut String, title: &str, summary: &RunSummary, status: FileStatus) {
    out.push_str(&format!("## {}\n\n", title));
    let rows: Vec<String> = summary
        .files
        .iter()
        .filter(|f| f.status == status)
        .map(|f| {
            format!(
                "- `{}`: {}",
                f.path.display(),
                f.detail.as_deref().unwrap_or("")
            )
        })
        .collect();
    if rows.is_empty() {
        out.push_str("None\n");
    } else {
        out.push_str(&rows.join("\n"));
        out.push('\n');
    }
    out.push('\n');
}

pub fn render_report(refresh: &RunSummary, align: &RunSummary, now: &DateTime<FixedOffset>, dry_run: bool) -> String {
    let mut out = String::from("# Documentation Refresh Campaign Report\n\n");
    out.push_str(&format!("**Executed:** {}\n", time::format_canonical(now)));
    if dry_run {
        out.push_str("**Mode:** dry run (no documents written)\n");
    }
    if refresh.interrupted || align.interrupted {
        out.push_str("**Interrupted:** yes (remaining documents were not processed)\n");
    }
    out.push_str(&format!("**Documents Scanned:** {}\n", refresh.processed));
    out.push_str(&format!("**Stale Files Refreshed:** {}\n", refresh.changed));
    out.push_str(&format!("**Phase Alignments Fixed:** {}\n", align.changed));
    out.push_str(&format!("**Errors:** {}\n\n", refresh.errors + align.errors));

    section(&mut out, "Refreshed Documents", refresh, FileStatus::Updated);
    section(&mut out, "Phase Alignments", align, FileStatus::Updated);

    let mut errors = refresh.error_messages();
    for msg in align.error_messages() {
        if !errors.contains(&msg) {
            errors.push(msg);
        }
    }
    out.push_str("## Errors\n\n");
    if errors.is_empty() {
        out.push_str("None\n");
    }
    for e in errors {
        out.push_str(&format!("- {}\n", e));
    }
    out
}

pub fn run_campaign(config: &DmctConfig, now: DateTime<FixedOffset>) -> Result<CampaignResult, DmctError> {
    run_campaign_with(PassRunner::new(config, now), config, now)
}

fn run_campaign_with(
    runner: PassRunner<'_>,
    config: &DmctConfig,
    now: DateTime<FixedOffset>,
) -> Result<CampaignResult, DmctError> {
    let refresh_pass = FreshnessPass {
        threshold_days: config.stale_threshold_days,
    };
    let passes: [&dyn DocumentPass; 2] = [&refresh_pass, &AlignPass];
    let mut summaries = runner.run_all(&passes)?.into_iter();
    let (Some(refresh), Some(align)) = (summaries.next(), summaries.next()) else {
        return Err(DmctError::ArgumentError("campaign produced no summaries".to_string()));
    };

    let report = render_report(&refresh, &align, &now, config.dry_run);
    let report_path = if config.dry_run {
        None
    } else {
        let path = config.reports_dir.join(REPORT_FILE_NAME);
        store::write_atomic(&path, report.as_bytes())?;
        Some(path)
    };

    Ok(CampaignResult {
        refresh,
        align,
        report,
        report_path,
    })
}
