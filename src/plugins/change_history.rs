//! Change-history helper: ethical-impact classification, audit-trail rows,
//! and validation of existing change-history tables.
//!
//! Everything here is pure except [`write_assessment`], the explicit
//! file-writing wrapper.

use crate::core::error::DmctError;
use crate::core::store;
use regex::Regex;
use serde::Serialize;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::LazyLock;

pub const DEFAULT_CURRENT_SCORE: u32 = 90;
pub const DEFAULT_VERSION: &str = "1.0.0";
pub const DEFAULT_AUTHOR: &str = "Documentation Team";
pub const DEFAULT_REVIEWER: &str = "Technical Review Board";
pub const DEFAULT_NOTES: &str = "Compliance verified";
pub const DEFAULT_DESCRIPTION: &str = "Document updates applied";

pub const REQUIRED_COLUMNS: [&str; 4] = ["Ethical Impact", "Change Category", "Reviewer", "Approval Notes"];

const HIGH_PATTERNS: [&str; 7] = ["ethical", "compliance", "score", "review", "audit", "correction", "violation"];
const MEDIUM_PATTERNS: [&str; 6] = ["content", "update", "revision", "improvement", "enhancement", "standardization"];
const LOW_PATTERNS: [&str; 6] = ["format", "style", "grammar", "typo", "spelling", "clarity"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangeCategory {
    ContentUpdates,
    MetadataChanges,
    ComplianceCorrections,
    TemplateStandardization,
    ViolationFixes,
    ApprovalUpdates,
    AuditImprovements,
    DocTemplateCreation,
}

impl ChangeCategory {
    pub const ALL: [ChangeCategory; 8] = [
        ChangeCategory::ContentUpdates,
        ChangeCategory::MetadataChanges,
        ChangeCategory::ComplianceCorrections,
        ChangeCategory::TemplateStandardization,
        ChangeCategory::ViolationFixes,
        ChangeCategory::ApprovalUpdates,
        ChangeCategory::AuditImprovements,
        ChangeCategory::DocTemplateCreation,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ChangeCategory::ContentUpdates => "CONTENT_UPDATES",
            ChangeCategory::MetadataChanges => "METADATA_CHANGES",
            ChangeCategory::ComplianceCorrections => "COMPLIANCE_CORRECTIONS",
            ChangeCategory::TemplateStandardization => "TEMPLATE_STANDARDIZATION",
            ChangeCategory::ViolationFixes => "VIOLATION_FIXES",
            ChangeCategory::ApprovalUpdates => "APPROVAL_UPDATES",
            ChangeCategory::AuditImprovements => "AUDIT_IMPROVEMENTS",
            ChangeCategory::DocTemplateCreation => "DOC_TEMPLATE_CREATION",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            ChangeCategory::ContentUpdates => "Content revisions requiring ethical re-evaluation",
            ChangeCategory::MetadataChanges => "Metadata/structure modifications",
            ChangeCategory::ComplianceCorrections => "Ethical score improvements or corrections",
            ChangeCategory::TemplateStandardization => "Format/consistency updates",
            ChangeCategory::ViolationFixes => "Corrections for compliance violations",
            ChangeCategory::ApprovalUpdates => "Status changes and approvals",
            ChangeCategory::AuditImprovements => "Audit trail enhancements",
            ChangeCategory::DocTemplateCreation => "New document template creation",
        }
    }
}

impl fmt::Display for ChangeCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChangeCategory {
    type Err = DmctError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_uppercase();
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == wanted)
            .ok_or_else(|| DmctError::ArgumentError(format!("unknown change category: {}", s)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ImpactLevel {
    None,
    Low,
    Medium,
    High,
    NewDocument,
}

impl ImpactLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            ImpactLevel::None => "NONE",
            ImpactLevel::Low => "LOW",
            ImpactLevel::Medium => "MEDIUM",
            ImpactLevel::High => "HIGH",
            ImpactLevel::NewDocument => "NEW_DOCUMENT",
        }
    }

    /// Predicted score movement, inclusive.
    pub fn delta_range(self) -> (i32, i32) {
        match self {
            ImpactLevel::High => (-3, 3),
            ImpactLevel::Medium => (-2, 2),
            ImpactLevel::Low => (-1, 1),
            ImpactLevel::None | ImpactLevel::NewDocument => (0, 0),
        }
    }

    pub fn recommended_categories(self) -> [ChangeCategory; 2] {
        match self {
            ImpactLevel::High => [ChangeCategory::ComplianceCorrections, ChangeCategory::ContentUpdates],
            ImpactLevel::Medium => [ChangeCategory::ContentUpdates, ChangeCategory::TemplateStandardization],
            ImpactLevel::Low => [ChangeCategory::TemplateStandardization, ChangeCategory::MetadataChanges],
            ImpactLevel::None => [ChangeCategory::MetadataChanges, ChangeCategory::TemplateStandardization],
            ImpactLevel::NewDocument => [ChangeCategory::DocTemplateCreation, ChangeCategory::ContentUpdates],
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            ImpactLevel::High => "Changes affecting ethical scoring components",
            ImpactLevel::Medium => "Significant content changes with a moderate score effect",
            ImpactLevel::Low => "Minor formatting/clarity improvements",
            ImpactLevel::None => "No ethical scoring impact (technical/formatting only)",
            ImpactLevel::NewDocument => "New document",
        }
    }
}

impl fmt::Display for ImpactLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ImpactLevel {
    type Err = DmctError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        match upper.strip_prefix("IMPACT_").unwrap_or(&upper) {
            "NONE" => Ok(ImpactLevel::None),
            "LOW" => Ok(ImpactLevel::Low),
            "MEDIUM" => Ok(ImpactLevel::Medium),
            "HIGH" => Ok(ImpactLevel::High),
            "NEW_DOCUMENT" => Ok(ImpactLevel::NewDocument),
            _ => Err(DmctError::ArgumentError(format!("unknown impact level: {}", s))),
        }
    }
}

/// Ethical components a description touches. Informational only.
const ETHICAL_COMPONENTS: [(&str, &[&str]); 5] = [
    ("verification", &["verify", "confirm", "validate", "check", "evidence"]),
    ("accuracy", &["accurate", "correct", "truth", "fact", "scope"]),
    ("transparency", &["transparent", "disclose", "limit", "uncertainty", "constraint"]),
    ("error_handling", &["correct", "fix", "address", "resolve", "error"]),
    ("prevention", &["prevent", "guard", "safeguard", "systematic", "process"]),
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Assessment {
    pub description: String,
    pub current_score: u32,
    pub level: ImpactLevel,
    pub delta_range: (i32, i32),
    pub recommended_categories: [ChangeCategory; 2],
    pub affected_components: Vec<&'static str>,
}

impl Assessment {
    pub fn predicted_score_range(&self) -> (u32, u32) {
        let (lo, hi) = self.delta_range;
        let apply = |d: i32| self.current_score.saturating_add_signed(d).min(100);
        (apply(lo), apply(hi))
    }
}

fn contains_any(haystack: &str, patterns: &[&str]) -> bool {
    patterns.iter().any(|p| haystack.contains(p))
}

/// Keyword-driven classification; the first matching tier wins.
pub fn classify(description: &str, current_score: u32) -> Assessment {
    let lower = description.to_lowercase();
    let level = if contains_any(&lower, &HIGH_PATTERNS) {
        ImpactLevel::High
    } else if contains_any(&lower, &MEDIUM_PATTERNS) {
        ImpactLevel::Medium
    } else if contains_any(&lower, &LOW_PATTERNS) {
        ImpactLevel::Low
    } else {
        ImpactLevel::None
    };
    let affected_components = ETHICAL_COMPONENTS
        .iter()
        .filter(|(_, words)| contains_any(&lower, words))
        .map(|(name, _)| *name)
        .collect();

    Assessment {
        description: description.to_string(),
        current_score,
        level,
        delta_range: level.delta_range(),
        recommended_categories: level.recommended_categories(),
        affected_components,
    }
}

/// One row of the enhanced audit-trail table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEntry {
    pub version: String,
    pub date: String,
    pub author: String,
    pub category: ChangeCategory,
    pub impact: ImpactLevel,
    /// Score shown for `NEW_DOCUMENT` rows.
    pub new_score: Option<u32>,
    pub reviewer: String,
    pub notes: String,
    pub description: String,
}

impl ChangeEntry {
    pub fn new(date: impl Into<String>) -> Self {
        Self {
            version: DEFAULT_VERSION.to_string(),
            date: date.into(),
            author: DEFAULT_AUTHOR.to_string(),
            category: ChangeCategory::ContentUpdates,
            impact: ImpactLevel::Medium,
            new_score: None,
            reviewer: DEFAULT_REVIEWER.to_string(),
            notes: DEFAULT_NOTES.to_string(),
            description: DEFAULT_DESCRIPTION.to_string(),
        }
    }
}

fn cell(text: &str) -> String {
    text.replace('|', "\\|").replace('\n', " ")
}

pub fn render_row(entry: &ChangeEntry) -> String {
    let impact = match (entry.impact, entry.new_score) {
        (ImpactLevel::NewDocument, Some(score)) => format!("{}: {} ✓", entry.impact, score),
        (level, _) => format!("{}: {}", level, level.description()),
    };
    format!(
        "| **{}** | **{}** | **{}** | **{}: {}** | **{}** | **{}** | **{}** | **{}** |",
        cell(&entry.version),
        cell(&entry.date),
        cell(&entry.author),
        entry.category,
        entry.category.description(),
        cell(&impact),
        cell(&entry.reviewer),
        cell(&entry.notes),
        cell(&entry.description),
    )
}

pub const TABLE_HEADING: &str = "#### **Enhanced Audit Trail - Change History with Ethical Accountability**";
pub const TABLE_HEADER: &str = "| **Version** | **Date** | **Author** | **Change Category** | **Ethical Impact** | **Reviewer** | **Approval Notes** | **Description of Changes** |\n|-------------|----------|------------|-------------------|-------------------|--------------|-------------------|---------------------------|";

/// A complete enhanced-format table holding `rows`.
pub fn render_table(rows: &[String]) -> String {
    let mut out = format!("{}\n\n{}\n", TABLE_HEADING, TABLE_HEADER);
    for row in rows {
        out.push_str(row);
        out.push('\n');
    }
    out
}

static ENHANCED_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)#### \*\*Enhanced Audit Trail.*?\n\n(.*?)(?:\n\n#|\z)").expect("static regex")
});
static LEGACY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)#### \*\*Change History\*\*\n\n\|.*?\n\|.*?\n((?:\|.*?\n)+)").expect("static regex")
});
static VERSION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*\d+\.\d+\.\d+\*\*").expect("static regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryFormat {
    Enhanced,
    Legacy,
    Missing,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub format: HistoryFormat,
    pub missing_columns: Vec<String>,
    pub version_entries: usize,
    pub valid: bool,
    pub messages: Vec<String>,
}

/// Locates the change-history table and checks it has the enhanced columns.
pub fn validate_history(markdown: &str) -> ValidationReport {
    let table = ENHANCED_RE
        .captures(markdown)
        .or_else(|| LEGACY_RE.captures(markdown))
        .and_then(|c| c.get(1))
        .map(|m| m.as_str());

    let Some(table) = table else {
        return ValidationReport {
            format: HistoryFormat::Missing,
            missing_columns: Vec::new(),
            version_entries: 0,
            valid: false,
            messages: vec!["no change history section found".to_string()],
        };
    };

    let version_entries = VERSION_RE.find_iter(table).count();
    let mut messages = Vec::new();

    if !table.contains("Ethical Impact") {
        messages.push("legacy format detected; consider upgrading to the enhanced audit trail".to_string());
        messages.push(format!("change history entries: {}", version_entries));
        return ValidationReport {
            format: HistoryFormat::Legacy,
            missing_columns: Vec::new(),
            version_entries,
            valid: true,
            messages,
        };
    }

    let missing_columns: Vec<String> = REQUIRED_COLUMNS
        .iter()
        .filter(|col| !table.contains(*col))
        .map(|col| col.to_string())
        .collect();
    if missing_columns.is_empty() {
        messages.push("all required audit trail columns present".to_string());
    } else {
        messages.push(format!("missing required columns: {}", missing_columns.join(", ")));
    }
    messages.push(format!("change history entries: {}", version_entries));

    ValidationReport {
        format: HistoryFormat::Enhanced,
        valid: missing_columns.is_empty(),
        missing_columns,
        version_entries,
        messages,
    }
}

pub fn render_assessment(assessment: &Assessment) -> String {
    let (lo, hi) = assessment.delta_range;
    let (score_lo, score_hi) = assessment.predicted_score_range();
    let components = if assessment.affected_components.is_empty() {
        "none detected".to_string()
    } else {
        assessment.affected_components.join(", ")
    };
    let categories: Vec<&str> = assessment
        .recommended_categories
        .iter()
        .map(|c| c.as_str())
        .collect();
    format!(
        "# Ethical Impact Assessment\n\n\
         - **Description:** {}\n\
         - **Current Score:** {}\n\
         - **Impact Level:** {}\n\
         - **Predicted Delta:** [{:+}, {:+}] ({} to {})\n\
         - **Affected Ethical Components:** {}\n\
         - **Recommended Categories:** {}\n",
        assessment.description,
        assessment.current_score,
        assessment.level,
        lo,
        hi,
        score_lo,
        score_hi,
        components,
        categories.join(" OR "),
    )
}

/// Writes the rendered assessment to `path`.
pub fn write_assessment(assessment: &Assessment, path: &Path) -> Result<(), DmctError> {
    store::write_atomic(path, render_assessment(assessment).as_bytes())
}
