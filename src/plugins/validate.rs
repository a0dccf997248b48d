//! Front-matter validator: checks required fields and classifies documents.

use crate::core::config::DmctConfig;
use crate::core::document::{self, Document};
use crate::core::error::DmctError;
use crate::core::phase;
use crate::core::scanner::{self, IgnoreRules};
use crate::core::time;
use crate::plugins::keywords::{self, MIN_KEYWORDS, TARGET_KEYWORDS};
use rayon::prelude::*;
use serde::Serialize;
use std::path::{Path, PathBuf};

pub const REQUIRED_FIELDS: [&str; 6] = [
    document::KEY_TITLE,
    document::KEY_DOCUMENT_CATEGORY,
    document::KEY_DOCUMENT_TYPE,
    document::KEY_VERSION,
    document::KEY_LAST_UPDATED,
    document::KEY_KEYWORDS,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    Compliant,
    NonCompliant,
    Error,
}

#[derive(Debug, Clone, Serialize)]
pub struct DocumentCheck {
    pub path: PathBuf,
    pub classification: Classification,
    pub problems: Vec<String>,
}

/// Problems in one parsed document. `root` anchors phase resolution.
pub fn check_document(doc: &Document, root: &Path) -> Vec<String> {
    let mut problems = Vec::new();
    let fm = &doc.front_matter;

    for key in REQUIRED_FIELDS {
        if !fm.contains_key(key) {
            problems.push(format!("missing required field: {}", key));
        }
    }

    let kws = doc.keywords();
    if fm.contains_key(document::KEY_KEYWORDS) {
        if kws.len() < MIN_KEYWORDS {
            problems.push(format!("too few keywords: {} < {}", kws.len(), MIN_KEYWORDS));
        } else if kws.len() > TARGET_KEYWORDS {
            problems.push(format!("too many keywords: {} > {}", kws.len(), TARGET_KEYWORDS));
        }
    }
    for kw in kws.iter().filter(|k| !keywords::is_valid_token(k)) {
        problems.push(format!("invalid keyword token: {:?}", kw));
    }
    let mut seen = rustc_hash::FxHashSet::default();
    for kw in kws.iter().filter(|k| !seen.insert(k.as_str())) {
        problems.push(format!("duplicate keyword: {}", kw));
    }

    let resolved = phase::resolve_in_root(root, &doc.path);
    match doc.declared_phase() {
        Some(Err(err)) => problems.push(err.to_string()),
        Some(Ok(declared)) => {
            if let Some(resolved) = resolved.filter(|r| *r != declared) {
                problems.push(format!(
                    "declared phase {} disagrees with directory phase {}",
                    declared, resolved
                ));
            }
        }
        None => {}
    }

    if let Some(ts) = doc.last_updated()
        && !time::is_canonical(ts)
    {
        problems.push(format!("last_updated not canonical: {:?}", ts));
    }

    if let Some(raw) = fm.get_str(document::KEY_CONSCIOUSNESS_SCORE) {
        match raw.trim().parse::<f64>() {
            Ok(v) if document::score_in_range(v) => {}
            Ok(v) => problems.push(format!("consciousness_score {} outside (0, 3]", v)),
            Err(_) => problems.push(format!("consciousness_score not numeric: {:?}", raw)),
        }
    }

    problems
}

pub fn validate_document(path: &Path, root: &Path) -> DocumentCheck {
    match Document::load(path) {
        Ok(doc) => {
            let problems = check_document(&doc, root);
            let classification = if problems.is_empty() {
                Classification::Compliant
            } else {
                Classification::NonCompliant
            };
            DocumentCheck {
                path: path.to_path_buf(),
                classification,
                problems,
            }
        }
        Err(err) => DocumentCheck {
            path: path.to_path_buf(),
            classification: Classification::Error,
            problems: vec![err.to_string()],
        },
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ValidationSummary {
    pub total: usize,
    pub compliant: usize,
    pub non_compliant: usize,
    pub errors: usize,
    pub documents: Vec<DocumentCheck>,
}

impl ValidationSummary {
    pub fn all_compliant(&self) -> bool {
        self.compliant == self.total
    }

    /// `path: problem` lines for every document that is not compliant.
    pub fn problem_messages(&self) -> Vec<String> {
        self.documents
            .iter()
            .filter(|d| d.classification != Classification::Compliant)
            .map(|d| format!("{}: {}", d.path.display(), d.problems.join("; ")))
            .collect()
    }
}

pub fn validate_corpus(config: &DmctConfig) -> Result<ValidationSummary, DmctError> {
    let root = config.root.as_path();
    let rules = IgnoreRules::new(config.extra_ignore.iter().cloned());
    let (paths, scan_errors) = scanner::collect(root, &rules)?;

    let mut documents: Vec<DocumentCheck> = paths
        .par_iter()
        .map(|p| validate_document(p, root))
        .collect();
    documents.extend(scan_errors.into_iter().map(|err| DocumentCheck {
        path: match &err {
            DmctError::UnreadableFile { path, .. } => path.clone(),
            _ => root.to_path_buf(),
        },
        classification: Classification::Error,
        problems: vec![err.to_string()],
    }));

    let count = |c: Classification| documents.iter().filter(|d| d.classification == c).count();
    let summary = ValidationSummary {
        total: documents.len(),
        compliant: count(Classification::Compliant),
        non_compliant: count(Classification::NonCompliant),
        errors: count(Classification::Error),
        documents,
    };
    tracing::info!(
        total = summary.total,
        compliant = summary.compliant,
        non_compliant = summary.non_compliant,
        errors = summary.errors,
        "validation finished"
    );
    Ok(summary)
}
