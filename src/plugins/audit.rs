//! Sampled compliance auditor.
//!
//! An audit draws a seeded uniform sample from the corpus, scores each sampled
//! document with fixed deductions, buckets the scores, derives a trend from
//! the persisted history, and renders Markdown and JSON reports.
//!
//! The corpus is never written. Outputs are the report pair and
//! `compliance_history.json`, capped to the configured number of records.

use crate::core::config::DmctConfig;
use crate::core::document::{self, Document};
use crate::core::error::DmctError;
use crate::core::scanner::{self, IgnoreRules};
use crate::core::store;
use crate::core::time;
use crate::plugins::keywords::{MIN_KEYWORDS, TARGET_KEYWORDS};
use chrono::{DateTime, FixedOffset};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

pub const WEEKLY_RATE: f64 = 0.10;
pub const MONTHLY_RATE: f64 = 0.25;

const SCORED_FIELDS: [&str; 3] = [
    document::KEY_KEYWORDS,
    document::KEY_BIOLOGICAL_SYSTEM,
    document::KEY_CONSCIOUSNESS_SCORE,
];
const MISSING_FIELD_PENALTY: i32 = 15;
const KEYWORD_COUNT_PENALTY: i32 = 25;
const SCORE_RANGE_PENALTY: i32 = 10;
const MISSING_SECTION_PENALTY: i32 = 5;
const UNKNOWN_PHASE_PENALTY: i32 = 10;

const TREND_WINDOW: usize = 4;
const TREND_THRESHOLD: f64 = 2.0;
const VIOLATION_RATE_LIMIT: f64 = 0.10;
const MEAN_TARGET: f64 = 85.0;
const MEAN_EXCELLENT: f64 = 95.0;
const PRIORITY_REVIEW_SCORE: u32 = 80;
const PRIORITY_REVIEW_LIMIT: usize = 3;
const REPORT_VIOLATION_LIMIT: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditType {
    Weekly,
    Monthly,
    Manual,
}

impl AuditType {
    pub fn fixed_rate(self) -> Option<f64> {
        match self {
            AuditType::Weekly => Some(WEEKLY_RATE),
            AuditType::Monthly => Some(MONTHLY_RATE),
            AuditType::Manual => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AuditType::Weekly => "weekly",
            AuditType::Monthly => "monthly",
            AuditType::Manual => "manual",
        }
    }
}

impl fmt::Display for AuditType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Bucket {
    Excellent,
    Good,
    Marginal,
    Poor,
}

impl Bucket {
    pub fn for_score(score: u32) -> Self {
        match score {
            91.. => Bucket::Excellent,
            75..=90 => Bucket::Good,
            50..=74 => Bucket::Marginal,
            _ => Bucket::Poor,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    Ok,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentResult {
    pub path: String,
    pub status: DocumentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bucket: Option<Bucket>,
    pub violations: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub word_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Distribution {
    pub excellent: usize,
    pub good: usize,
    pub marginal: usize,
    pub poor: usize,
}

impl Distribution {
    fn add(&mut self, bucket: Bucket) {
        match bucket {
            Bucket::Excellent => self.excellent += 1,
            Bucket::Good => self.good += 1,
            Bucket::Marginal => self.marginal += 1,
            Bucket::Poor => self.poor += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.excellent + self.good + self.marginal + self.poor
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendLabel {
    Improving,
    Stable,
    Declining,
}

impl TrendLabel {
    pub fn as_str(self) -> &'static str {
        match self {
            TrendLabel::Improving => "improving",
            TrendLabel::Stable => "stable",
            TrendLabel::Declining => "declining",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trend {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<TrendLabel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    /// Past audit means considered, oldest first.
    pub window: Vec<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub average_score_last_period: Option<f64>,
    pub data_points: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub timestamp: String,
    pub audit_type: AuditType,
    pub sample_rate: f64,
    pub seed: u64,
    pub total_documents: usize,
    pub sample_size: usize,
    pub results: Vec<DocumentResult>,
    pub distribution: Distribution,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mean_score: Option<f64>,
    pub violation_count: usize,
    pub error_count: usize,
    pub trend: Trend,
    pub recommendations: Vec<String>,
}

impl AuditRecord {
    pub fn sampled_paths(&self) -> Vec<&str> {
        self.results.iter().map(|r| r.path.as_str()).collect()
    }

    pub fn violations(&self) -> impl Iterator<Item = &DocumentResult> {
        self.results
            .iter()
            .filter(|r| r.status == DocumentStatus::Ok && !r.violations.is_empty())
    }
}

/// Validated audit parameters.
#[derive(Debug, Clone)]
pub struct AuditOptions {
    pub audit_type: AuditType,
    pub rate: f64,
    pub seed: u64,
    pub now: DateTime<FixedOffset>,
}

impl AuditOptions {
    /// Weekly and monthly audits fix the rate; manual audits need one in (0, 1].
    pub fn new(
        audit_type: AuditType,
        rate: Option<f64>,
        seed: u64,
        now: DateTime<FixedOffset>,
    ) -> Result<Self, DmctError> {
        let rate = match (audit_type.fixed_rate(), rate) {
            (Some(fixed), None) => fixed,
            (Some(_), Some(_)) => {
                return Err(DmctError::ArgumentError(format!(
                    "--rate is only accepted for custom audits, not {}",
                    audit_type
                )));
            }
            (None, Some(rate)) => rate,
            (None, None) => {
                return Err(DmctError::ArgumentError(
                    "custom audits require --rate".to_string(),
                ));
            }
        };
        if !(rate > 0.0 && rate <= 1.0) {
            return Err(DmctError::ArgumentError(format!(
                "sample rate must lie in (0, 1], got {}",
                rate
            )));
        }
        Ok(Self {
            audit_type,
            rate,
            seed,
            now,
        })
    }
}

/// `max(1, floor(n * rate))`, never more than `n`.
pub fn sample_size(total: usize, rate: f64) -> usize {
    if total == 0 {
        return 0;
    }
    let raw = ((total as f64) * rate + 1e-9).floor() as usize;
    raw.clamp(1, total)
}

/// Seeded uniform sample, returned in path order.
pub fn sample_paths(paths: &[PathBuf], rate: f64, seed: u64) -> Vec<PathBuf> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut sample: Vec<PathBuf> = paths
        .choose_multiple(&mut rng, sample_size(paths.len(), rate))
        .cloned()
        .collect();
    sample.sort();
    sample
}

/// Deterministic score for one document, with the violations behind it.
pub fn score_document(doc: &Document, required_sections: &[String]) -> (u32, Vec<String>) {
    let mut score: i32 = 100;
    let mut violations = Vec::new();

    for key in SCORED_FIELDS {
        if !doc.front_matter.contains_key(key) {
            score -= MISSING_FIELD_PENALTY;
            violations.push(format!("missing field: {}", key));
        }
    }

    let keyword_count = doc.keywords().len();
    if !(MIN_KEYWORDS..=TARGET_KEYWORDS).contains(&keyword_count) {
        score -= KEYWORD_COUNT_PENALTY;
        violations.push(format!(
            "keyword count {} outside {}-{}",
            keyword_count, MIN_KEYWORDS, TARGET_KEYWORDS
        ));
    }

    let meta = doc.metadata();
    if !meta.consciousness_score_value().is_some_and(document::score_in_range) {
        score -= SCORE_RANGE_PENALTY;
        violations.push(format!(
            "consciousness_score {} missing or outside (0, 3]",
            meta.consciousness_score.as_deref().unwrap_or("<none>")
        ));
    }

    for section in required_sections {
        if !doc.has_section(section) {
            score -= MISSING_SECTION_PENALTY;
            violations.push(format!("missing required section: {}", section));
        }
    }

    if let Some(Err(err)) = doc.declared_phase() {
        score -= UNKNOWN_PHASE_PENALTY;
        violations.push(err.to_string());
    }

    (score.clamp(0, 100) as u32, violations)
}

fn audit_path(root: &Path, path: &Path, required_sections: &[String]) -> DocumentResult {
    let display = path
        .strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/");
    match Document::load(path) {
        Ok(doc) => {
            let (score, violations) = score_document(&doc, required_sections);
            DocumentResult {
                path: display,
                status: DocumentStatus::Ok,
                score: Some(score),
                bucket: Some(Bucket::for_score(score)),
                violations,
                word_count: Some(doc.word_count()),
                line_count: Some(doc.line_count()),
                error: None,
            }
        }
        Err(err) => {
            tracing::warn!(path = %path.display(), error = %err, "audit could not read document");
            DocumentResult {
                path: display,
                status: DocumentStatus::Error,
                score: None,
                bucket: None,
                violations: Vec::new(),
                word_count: None,
                line_count: None,
                error: Some(err.to_string()),
            }
        }
    }
}

/// Mean score stored in a history entry. Older entries used `avg_score`.
fn history_mean(entry: &Value) -> Option<f64> {
    entry
        .get("mean_score")
        .or_else(|| entry.get("avg_score"))
        .and_then(Value::as_f64)
}

/// Trend over previously persisted audits only; the audit being run is not
/// part of its own trend. Needs at least two past means.
pub fn analyze_trend(history: &[Value]) -> Trend {
    let mut window: Vec<f64> = history.iter().filter_map(history_mean).collect();
    let data_points = window.len();
    if window.len() > TREND_WINDOW {
        window.drain(..window.len() - TREND_WINDOW);
    }

    if window.len() < 2 {
        return Trend {
            label: None,
            note: Some("insufficient data for trend analysis".to_string()),
            window,
            average_score_last_period: None,
            data_points,
        };
    }

    let first = window[0];
    let last = window[window.len() - 1];
    let label = if last > first + TREND_THRESHOLD {
        TrendLabel::Improving
    } else if last < first - TREND_THRESHOLD {
        TrendLabel::Declining
    } else {
        TrendLabel::Stable
    };
    let average = window.iter().sum::<f64>() / window.len() as f64;
    Trend {
        label: Some(label),
        note: None,
        window,
        average_score_last_period: Some(average),
        data_points,
    }
}

fn recommendations(results: &[DocumentResult], mean: Option<f64>) -> Vec<String> {
    let scored: Vec<&DocumentResult> = results
        .iter()
        .filter(|r| r.status == DocumentStatus::Ok)
        .collect();
    let mut recs = Vec::new();
    if scored.is_empty() {
        return recs;
    }

    let with_violations = scored.iter().filter(|r| !r.violations.is_empty()).count();
    if with_violations as f64 > scored.len() as f64 * VIOLATION_RATE_LIMIT {
        recs.push(format!(
            "High violation rate ({}/{}). Consider author training.",
            with_violations,
            scored.len()
        ));
    }

    if let Some(mean) = mean {
        if mean < MEAN_TARGET {
            recs.push(format!(
                "Average score ({:.0}) below target. Priority improvements needed.",
                mean
            ));
        } else if mean > MEAN_EXCELLENT {
            recs.push(
                "Excellent compliance maintained. Capture best practices for other authors."
                    .to_string(),
            );
        }
    }

    let mut low: Vec<(u32, &str)> = scored
        .iter()
        .filter_map(|r| r.score.map(|s| (s, r.path.as_str())))
        .filter(|(s, _)| *s < PRIORITY_REVIEW_SCORE)
        .collect();
    low.sort();
    if !low.is_empty() {
        let stems: Vec<String> = low
            .iter()
            .take(PRIORITY_REVIEW_LIMIT)
            .map(|(_, p)| {
                Path::new(p)
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_default()
            })
            .collect();
        recs.push(format!("Priority review needed for: {}", stems.join(", ")));
    }
    recs
}

/// Runs an audit over `config.root` against the given history.
pub fn audit(config: &DmctConfig, opts: &AuditOptions, history: &[Value]) -> Result<AuditRecord, DmctError> {
    let root = config.root.as_path();
    let rules = IgnoreRules::new(config.extra_ignore.iter().cloned());
    let (paths, scan_errors) = scanner::collect(root, &rules)?;
    for err in &scan_errors {
        tracing::warn!(error = %err, "audit scan error");
    }

    let sample = sample_paths(&paths, opts.rate, opts.seed);
    tracing::info!(
        audit_type = %opts.audit_type,
        total = paths.len(),
        sample = sample.len(),
        seed = opts.seed,
        "audit started"
    );

    let results: Vec<DocumentResult> = sample
        .par_iter()
        .map(|p| audit_path(root, p, &config.required_sections))
        .collect();

    let mut distribution = Distribution::default();
    let mut scores = Vec::new();
    for result in &results {
        if let (Some(score), Some(bucket)) = (result.score, result.bucket) {
            distribution.add(bucket);
            scores.push(f64::from(score));
        }
    }
    let mean_score = (!scores.is_empty()).then(|| scores.iter().sum::<f64>() / scores.len() as f64);
    let violation_count = results
        .iter()
        .filter(|r| r.status == DocumentStatus::Ok && !r.violations.is_empty())
        .count();
    let error_count = results.iter().filter(|r| r.status == DocumentStatus::Error).count();

    Ok(AuditRecord {
        timestamp: time::format_canonical(&opts.now),
        audit_type: opts.audit_type,
        sample_rate: opts.rate,
        seed: opts.seed,
        total_documents: paths.len(),
        sample_size: sample.len(),
        trend: analyze_trend(history),
        recommendations: recommendations(&results, mean_score),
        results,
        distribution,
        mean_score,
        violation_count,
        error_count,
    })
}

/// Reads the history array. A missing file is an empty history.
pub fn read_history(path: &Path) -> Result<Vec<Value>, DmctError> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let content = fs::read_to_string(path)
        .map_err(|e| DmctError::HistoryCorruption(format!("{}: {}", path.display(), e)))?;
    serde_json::from_str::<Vec<Value>>(&content)
        .map_err(|e| DmctError::HistoryCorruption(format!("{}: {}", path.display(), e)))
}

/// Like [`read_history`], but a corrupt file is logged and treated as empty.
pub fn load_history(path: &Path) -> Vec<Value> {
    read_history(path).unwrap_or_else(|err| {
        tracing::warn!(error = %err, "ignoring unreadable audit history");
        Vec::new()
    })
}

/// Appends `record`, keeps the newest `cap` entries, and rewrites the file
/// atomically. Returns the new history length.
pub fn persist(record: &AuditRecord, history_path: &Path, cap: usize) -> Result<usize, DmctError> {
    let mut history = load_history(history_path);
    history.push(serde_json::to_value(record)?);
    if history.len() > cap {
        history.drain(..history.len() - cap);
    }
    let body = serde_json::to_vec_pretty(&history)?;
    store::write_atomic(history_path, &body)?;
    Ok(history.len())
}

/// The part of a record fixed by seed, rate, and corpus content. Timestamp,
/// trend, and recommendations drift with history and are left out.
#[derive(Serialize)]
struct ReproducibleView<'a> {
    audit_type: AuditType,
    sample_rate: f64,
    seed: u64,
    total_documents: usize,
    sample_size: usize,
    results: &'a [DocumentResult],
}

/// SHA-256 over the reproducible part of the record, hex encoded. Two runs
/// with the same seed over the same corpus print the same digest.
pub fn record_digest(record: &AuditRecord) -> Result<String, DmctError> {
    let view = ReproducibleView {
        audit_type: record.audit_type,
        sample_rate: record.sample_rate,
        seed: record.seed,
        total_documents: record.total_documents,
        sample_size: record.sample_size,
        results: &record.results,
    };
    let bytes = serde_json::to_vec(&view)?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(format!("{:x}", hasher.finalize()))
}

fn title_case(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

pub fn render_markdown(record: &AuditRecord) -> String {
    let d = &record.distribution;
    let violations: Vec<&DocumentResult> = record.violations().collect();
    let mut out = String::new();

    out.push_str(&format!(
        "# {} Compliance Audit Report\n\n",
        title_case(record.audit_type.as_str())
    ));
    out.push_str(&format!("**Audit Timestamp:** {}\n", record.timestamp));
    out.push_str(&format!("**Sample Rate:** {:.0}%\n", record.sample_rate * 100.0));
    out.push_str(&format!("**Seed:** {}\n", record.seed));
    out.push_str(&format!(
        "**Documents Analyzed:** {} of {}\n\n",
        record.sample_size, record.total_documents
    ));

    out.push_str("## Compliance Overview\n\n");
    out.push_str("| Metric | Value |\n|--------|-------|\n");
    out.push_str(&format!("| Sample Size | {} |\n", record.sample_size));
    out.push_str(&format!(
        "| Mean Score | {} |\n",
        record
            .mean_score
            .map(|m| format!("{:.1}", m))
            .unwrap_or_else(|| "n/a".to_string())
    ));
    out.push_str(&format!("| Documents With Violations | {} |\n", record.violation_count));
    out.push_str(&format!("| Unreadable Documents | {} |\n\n", record.error_count));

    out.push_str("## Score Distribution\n\n");
    out.push_str(&format!("- **Excellent (91-100)**: {}\n", d.excellent));
    out.push_str(&format!("- **Good (75-90)**: {}\n", d.good));
    out.push_str(&format!("- **Marginal (50-74)**: {}\n", d.marginal));
    out.push_str(&format!("- **Poor (<50)**: {}\n\n", d.poor));

    out.push_str("## Trend Analysis\n\n");
    match (&record.trend.label, &record.trend.note) {
        (Some(label), _) => {
            let window: Vec<String> = record.trend.window.iter().map(|m| format!("{:.1}", m)).collect();
            out.push_str(&format!("- Trend: **{}**\n", label.as_str()));
            out.push_str(&format!("- Recent means: {}\n", window.join(" -> ")));
            out.push_str(&format!("- Data points: {}\n\n", record.trend.data_points));
        }
        (None, Some(note)) => out.push_str(&format!("{}\n\n", note)),
        (None, None) => out.push_str("No historical data available\n\n"),
    }

    out.push_str("## Compliance Violations\n\n");
    if violations.is_empty() {
        out.push_str("None\n");
    }
    for v in violations.iter().take(REPORT_VIOLATION_LIMIT) {
        out.push_str(&format!("- **{}**: {}\n", v.path, v.violations.join(", ")));
    }
    if violations.len() > REPORT_VIOLATION_LIMIT {
        out.push_str(&format!(
            "- ... (showing first {} of {}; see the JSON report)\n",
            REPORT_VIOLATION_LIMIT,
            violations.len()
        ));
    }

    let errors: Vec<&DocumentResult> = record
        .results
        .iter()
        .filter(|r| r.status == DocumentStatus::Error)
        .collect();
    if !errors.is_empty() {
        out.push_str("\n## Unreadable Documents\n\n");
        for e in errors {
            out.push_str(&format!(
                "- **{}**: {}\n",
                e.path,
                e.error.as_deref().unwrap_or("error")
            ));
        }
    }

    out.push_str("\n## Recommendations\n\n");
    if record.recommendations.is_empty() {
        out.push_str("None\n");
    }
    for rec in &record.recommendations {
        out.push_str(&format!("- {}\n", rec));
    }
    out
}

/// Files written by [`run_audit`].
#[derive(Debug, Clone, Serialize)]
pub struct AuditArtifacts {
    pub markdown_path: PathBuf,
    pub json_path: PathBuf,
    pub history_path: PathBuf,
    pub history_len: usize,
    pub digest: String,
}

pub fn default_report_path(reports_dir: &Path, record_type: AuditType, now: &DateTime<FixedOffset>) -> PathBuf {
    reports_dir.join(format!(
        "compliance_audit_{}_{}.md",
        record_type,
        time::file_stamp(now)
    ))
}

/// Audit, persist history, and write the Markdown and JSON reports.
pub fn run_audit(
    config: &DmctConfig,
    opts: &AuditOptions,
    output: Option<&Path>,
) -> Result<(AuditRecord, AuditArtifacts), DmctError> {
    let history_path = config.history_path();
    let history = load_history(&history_path);
    let record = audit(config, opts, &history)?;

    let markdown_path = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| default_report_path(&config.reports_dir, opts.audit_type, &opts.now));
    let json_path = markdown_path.with_extension("json");

    store::write_atomic(&markdown_path, render_markdown(&record).as_bytes())?;
    store::write_atomic(&json_path, &serde_json::to_vec_pretty(&record)?)?;
    let history_len = persist(&record, &history_path, config.history_cap)?;
    let digest = record_digest(&record)?;

    tracing::info!(
        report = %markdown_path.display(),
        history_len,
        digest = %digest,
        "audit finished"
    );
    Ok((
        record,
        AuditArtifacts {
            markdown_path,
            json_path,
            history_path,
            history_len,
            digest,
        },
    ))
}
