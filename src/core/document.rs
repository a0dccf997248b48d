//! Managed documents and their typed metadata view.

use crate::core::error::DmctError;
use crate::core::frontmatter::{self, FieldValue, FrontMatter};
use crate::core::phase::CorePhase;
use crate::core::time;
use chrono::{DateTime, FixedOffset};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

pub const KEY_TITLE: &str = "title";
pub const KEY_KEYWORDS: &str = "ai_keywords";
pub const KEY_PHASE: &str = "evolutionary_phase";
pub const KEY_BIOLOGICAL_SYSTEM: &str = "biological_system";
pub const KEY_LAST_UPDATED: &str = "last_updated";
pub const KEY_CONSCIOUSNESS_SCORE: &str = "consciousness_score";
pub const KEY_DOCUMENT_TYPE: &str = "document_type";
pub const KEY_DOCUMENT_CATEGORY: &str = "document_category";
pub const KEY_VALIDATION_STATUS: &str = "validation_status";
pub const KEY_VERSION: &str = "version";
pub const KEY_SEMANTIC_TAGS: &str = "semantic_tags";
pub const KEY_CROSS_REFERENCES: &str = "cross_references";

const SCHEMA_KEYS: [&str; 12] = [
    KEY_TITLE,
    KEY_KEYWORDS,
    KEY_PHASE,
    KEY_BIOLOGICAL_SYSTEM,
    KEY_LAST_UPDATED,
    KEY_CONSCIOUSNESS_SCORE,
    KEY_DOCUMENT_TYPE,
    KEY_DOCUMENT_CATEGORY,
    KEY_VALIDATION_STATUS,
    KEY_VERSION,
    KEY_SEMANTIC_TAGS,
    KEY_CROSS_REFERENCES,
];

pub const SCORE_MIN_EXCLUSIVE: f64 = 0.0;
pub const SCORE_MAX: f64 = 3.0;

pub fn score_in_range(value: f64) -> bool {
    value > SCORE_MIN_EXCLUSIVE && value <= SCORE_MAX
}

/// Schema view of a front-matter mapping. Keys outside the schema are carried
/// in `extra_fields` in source order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Metadata {
    pub title: Option<String>,
    pub keywords: Vec<String>,
    pub phase: Option<String>,
    pub biological_system: Option<String>,
    pub last_updated: Option<String>,
    pub consciousness_score: Option<String>,
    pub document_type: Option<String>,
    pub document_category: Option<String>,
    pub validation_status: Option<String>,
    pub version: Option<String>,
    pub semantic_tags: Vec<String>,
    pub cross_references: Vec<String>,
    pub extra_fields: Vec<(String, FieldValue)>,
}

impl Metadata {
    pub fn from_front_matter(fm: &FrontMatter) -> Self {
        let scalar = |key: &str| fm.get_str(key).map(str::to_string);
        let items = |key: &str| fm.get(key).map(FieldValue::items).unwrap_or_default();
        let mut extra_fields: Vec<(String, FieldValue)> = Vec::new();
        for field in fm.fields() {
            if SCHEMA_KEYS.contains(&field.key.as_str()) {
                continue;
            }
            match extra_fields.iter_mut().find(|(k, _)| *k == field.key) {
                Some(slot) => slot.1 = field.value.clone(),
                None => extra_fields.push((field.key.clone(), field.value.clone())),
            }
        }
        Self {
            title: scalar(KEY_TITLE),
            keywords: items(KEY_KEYWORDS),
            phase: scalar(KEY_PHASE),
            biological_system: scalar(KEY_BIOLOGICAL_SYSTEM),
            last_updated: scalar(KEY_LAST_UPDATED),
            consciousness_score: scalar(KEY_CONSCIOUSNESS_SCORE),
            document_type: scalar(KEY_DOCUMENT_TYPE),
            document_category: scalar(KEY_DOCUMENT_CATEGORY),
            validation_status: scalar(KEY_VALIDATION_STATUS),
            version: scalar(KEY_VERSION),
            semantic_tags: items(KEY_SEMANTIC_TAGS),
            cross_references: items(KEY_CROSS_REFERENCES),
            extra_fields,
        }
    }

    pub fn consciousness_score_value(&self) -> Option<f64> {
        self.consciousness_score
            .as_deref()
            .and_then(|s| s.trim().parse::<f64>().ok())
    }
}

/// A Markdown file split into its front-matter and untouched body.
#[derive(Debug, Clone)]
pub struct Document {
    pub path: PathBuf,
    pub front_matter: FrontMatter,
    pub body: String,
    original: String,
}

impl Document {
    pub fn load(path: &Path) -> Result<Self, DmctError> {
        let text = fs::read_to_string(path).map_err(|source| DmctError::UnreadableFile {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(path, text)
    }

    pub fn parse(path: &Path, text: String) -> Result<Self, DmctError> {
        let (front_matter, body) = frontmatter::decode(&text)?;
        Ok(Self {
            path: path.to_path_buf(),
            front_matter,
            body,
            original: text,
        })
    }

    pub fn metadata(&self) -> Metadata {
        Metadata::from_front_matter(&self.front_matter)
    }

    pub fn original_text(&self) -> &str {
        &self.original
    }

    pub fn encode(&self) -> String {
        frontmatter::encode(&self.front_matter, &self.body)
    }

    pub fn is_modified(&self) -> bool {
        self.encode() != self.original
    }

    /// Front-matter title, falling back to the file stem.
    pub fn title(&self) -> String {
        match self.front_matter.get_str(KEY_TITLE).map(str::trim) {
            Some(t) if !t.is_empty() => t.to_string(),
            _ => self.stem(),
        }
    }

    pub fn stem(&self) -> String {
        self.path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub fn keywords(&self) -> Vec<String> {
        self.front_matter
            .get(KEY_KEYWORDS)
            .map(FieldValue::items)
            .unwrap_or_default()
    }

    pub fn set_keywords(&mut self, keywords: &[String]) -> bool {
        self.front_matter.set_scalar(KEY_KEYWORDS, keywords.join(", "))
    }

    /// `None` when no phase is declared; `Some(Err(UnknownPhase))` when the
    /// declared value is outside the catalogue.
    pub fn declared_phase(&self) -> Option<Result<CorePhase, DmctError>> {
        self.front_matter.get_str(KEY_PHASE).map(CorePhase::parse)
    }

    pub fn set_phase(&mut self, phase: CorePhase) -> bool {
        self.front_matter.set_scalar(KEY_PHASE, phase.to_string())
    }

    pub fn last_updated(&self) -> Option<&str> {
        self.front_matter.get_str(KEY_LAST_UPDATED)
    }

    /// Stamps `last_updated` with `now` in canonical form.
    pub fn touch(&mut self, now: &DateTime<FixedOffset>) -> bool {
        self.front_matter
            .set_scalar(KEY_LAST_UPDATED, time::format_canonical(now))
    }

    /// Markdown headers of level 1 to 3, in body order, without the hashes.
    pub fn headers(&self) -> Vec<&str> {
        self.body
            .lines()
            .filter_map(|line| {
                let hashes = line.chars().take_while(|c| *c == '#').count();
                let rest = &line[hashes..];
                ((1..=3).contains(&hashes) && rest.starts_with(' ')).then(|| rest.trim())
            })
            .filter(|h| !h.is_empty())
            .collect()
    }

    pub fn has_section(&self, heading: &str) -> bool {
        self.body.lines().any(|line| line.trim_end() == heading)
    }

    pub fn word_count(&self) -> usize {
        self.body.split_whitespace().count()
    }

    pub fn line_count(&self) -> usize {
        self.original.lines().count()
    }
}
