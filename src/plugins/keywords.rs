//! Keyword enhancer.
//!
//! Brings a document's `ai_keywords` to exactly [`TARGET_KEYWORDS`] tokens
//! drawn, in priority order, from the author's first keywords, the core
//! vocabulary, the phase vocabulary, and terms found in the document itself.

use crate::core::document::Document;
use crate::core::error::DmctError;
use crate::core::pass::{DocumentPass, Outcome, PassContext};
use crate::core::phase::{self, CorePhase};
use regex::Regex;
use rustc_hash::FxHashSet;
use std::sync::LazyLock;

pub const MIN_KEYWORDS: usize = 8;
pub const TARGET_KEYWORDS: usize = 12;
const ANCHOR_COUNT: usize = 4;
const CORE_ADDITIONS: usize = 4;
const PHASE_ADDITIONS: usize = 3;
const CONTENT_ADDITIONS: usize = 3;
const TITLE_WORDS: usize = 3;
const HEADERS_SCANNED: usize = 3;
const WORDS_PER_HEADER: usize = 2;
const MIN_CONTENT_WORD_LEN: usize = 3;

pub const CORE_POOL: [&str; 12] = [
    "biological",
    "consciousness",
    "harmonization",
    "godhood",
    "transcendence",
    "emergence",
    "evolution",
    "orchestration",
    "intelligence",
    "symbiosis",
    "resonance",
    "coherence",
];

const HEADER_STOP_WORDS: [&str; 5] = ["the", "and", "for", "with", "into"];

static TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z][a-z0-9-]*$").expect("static token pattern"));

pub fn phase_pool(phase: CorePhase) -> &'static [&'static str] {
    match phase.number() {
        0 => &["meta", "governance", "self-awareness", "documentation", "protocols", "standards", "validation"],
        1 => &["foundation", "vision", "executive", "roadmap", "birth", "genesis", "primordial"],
        2 => &["architecture", "design", "framework", "patterns", "orchestration", "intelligence"],
        3 => &["ai-ensemble", "grok", "maestro", "orchestration", "specialization", "coordination"],
        4 => &["technical", "implementation", "engineering", "frameworks", "development"],
        5 => &["requirements", "harmonization", "user-stories", "acceptance-criteria", "supreme"],
        6 => &["standards", "development-practices", "testing", "quality", "validation"],
        7 => &["validation", "testing", "verification", "emergence", "consciousness"],
        8 => &["deployment", "infrastructure", "orchestration", "monitoring", "scalability"],
        9 => &["analytics", "reporting", "monitoring", "insights", "health"],
        10 => &["experience", "intelligence", "interaction", "biological", "user"],
        11 => &["communication", "content", "strategy", "messaging", "engagement"],
        12 => &["training", "academy", "curriculum", "education", "learning"],
        13 => &["content", "ai-generated", "dynamic", "personalization", "adaptation"],
        14 => &["prompt-engineering", "orchestration", "intelligence", "grok", "maestro"],
        15 => &["ethics", "governance", "consciousness", "morality", "responsibility"],
        16 => &["future", "innovation", "reservoir", "transcendence", "evolution"],
        17 => &["heritage", "legacy", "history", "evolution", "memory"],
        18 => &["omega", "godhood", "transcendence", "culmination", "synthesis"],
        _ => &["post-godhood", "evolution", "continuity", "expansion", "stewardship"],
    }
}

pub fn is_valid_token(token: &str) -> bool {
    TOKEN_RE.is_match(token)
}

/// Lowercases, maps spaces and underscores to `-`, drops everything else
/// outside `[a-z0-9-]`. Returns `None` when the result is not a valid token.
pub fn normalize_token(raw: &str) -> Option<String> {
    let mapped: String = raw
        .trim()
        .to_lowercase()
        .chars()
        .filter_map(|c| match c {
            ' ' | '_' => Some('-'),
            'a'..='z' | '0'..='9' | '-' => Some(c),
            _ => None,
        })
        .collect();
    let token = mapped.trim_matches('-').to_string();
    is_valid_token(&token).then_some(token)
}

fn words(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split_whitespace().filter_map(normalize_token)
}

/// Terms derived from the title and the first H1-H3 headers.
pub fn content_pool(doc: &Document) -> Vec<String> {
    let mut pool: Vec<String> = Vec::new();
    let title = doc.title();
    let title_words = words(&title)
        .filter(|w| w.len() >= MIN_CONTENT_WORD_LEN)
        .take(TITLE_WORDS);
    push_unique(&mut pool, title_words);
    for header in doc.headers().into_iter().take(HEADERS_SCANNED) {
        let header_words = words(header)
            .filter(|w| w.len() >= MIN_CONTENT_WORD_LEN && !HEADER_STOP_WORDS.contains(&w.as_str()))
            .take(WORDS_PER_HEADER);
        push_unique(&mut pool, header_words);
    }
    pool
}

fn push_unique(pool: &mut Vec<String>, tokens: impl Iterator<Item = String>) {
    for token in tokens {
        if !pool.contains(&token) {
            pool.push(token);
        }
    }
}

/// Phase used to pick the vocabulary: a valid declared phase, else the
/// path-derived one, else `0.x`.
pub fn effective_phase(doc: &Document, root: &std::path::Path) -> CorePhase {
    match doc.declared_phase() {
        Some(Ok(declared)) => declared,
        _ => phase::resolve_in_root(root, &doc.path).unwrap_or_default(),
    }
}

/// Result of planning an enhancement for one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Plan {
    AlreadyCompliant,
    Enhance { before: Vec<String>, after: Vec<String> },
}

/// Computes the enhanced keyword set.
pub fn plan_keywords(existing: &[String], phase: CorePhase, content: &[String]) -> Plan {
    let mut existing_tokens: Vec<String> = Vec::new();
    push_unique(&mut existing_tokens, existing.iter().filter_map(|k| normalize_token(k)));
    if existing_tokens.len() >= TARGET_KEYWORDS {
        return Plan::AlreadyCompliant;
    }

    let anchors: Vec<String> = existing_tokens.iter().take(ANCHOR_COUNT).cloned().collect();
    let mut taken: FxHashSet<String> = anchors.iter().cloned().collect();

    let core_iter = || CORE_POOL.iter().map(|s| s.to_string());
    let phase_iter = || phase_pool(phase).iter().map(|s| s.to_string());
    let content_iter = || content.iter().cloned();

    let mut core = pick(core_iter(), CORE_ADDITIONS, &mut taken);
    let mut phase_terms = pick(phase_iter(), PHASE_ADDITIONS, &mut taken);
    let mut content_terms = pick(content_iter(), CONTENT_ADDITIONS, &mut taken);

    // Over target: shed the least specific additions first.
    let mut excess = (anchors.len() + core.len() + phase_terms.len() + content_terms.len())
        .saturating_sub(TARGET_KEYWORDS);
    for bucket in [&mut core, &mut phase_terms, &mut content_terms] {
        while excess > 0 && bucket.pop().is_some() {
            excess -= 1;
        }
    }

    let mut after: Vec<String> = anchors;
    after.extend(core);
    after.extend(phase_terms);
    after.extend(content_terms);

    let mut taken: FxHashSet<String> = after.iter().cloned().collect();
    let missing = TARGET_KEYWORDS.saturating_sub(after.len());
    let padding = core_iter().chain(phase_iter()).chain(content_iter());
    after.extend(pick(padding, missing, &mut taken));

    after.sort();
    Plan::Enhance {
        before: existing.to_vec(),
        after,
    }
}

/// Takes up to `limit` tokens from `pool` that are not in `taken` yet.
fn pick(pool: impl Iterator<Item = String>, limit: usize, taken: &mut FxHashSet<String>) -> Vec<String> {
    let mut picked = Vec::new();
    for token in pool {
        if picked.len() == limit {
            break;
        }
        if taken.insert(token.clone()) {
            picked.push(token);
        }
    }
    picked
}

pub struct KeywordPass;

impl DocumentPass for KeywordPass {
    fn name(&self) -> &'static str {
        "enhance-keywords"
    }

    fn verb(&self) -> &'static str {
        "enhanced"
    }

    fn apply(&self, doc: &mut Document, ctx: &PassContext<'_>) -> Result<Outcome, DmctError> {
        let existing = doc.keywords();
        let phase = effective_phase(doc, ctx.root);
        let content = content_pool(doc);

        match plan_keywords(&existing, phase, &content) {
            Plan::AlreadyCompliant => Ok(Outcome::skipped(format!(
                "AlreadyCompliant: {} keywords",
                existing.len()
            ))),
            Plan::Enhance { before, after } => {
                doc.set_keywords(&after);
                if let Some(Err(DmctError::UnknownPhase(declared))) = doc.declared_phase()
                    && let Some(resolved) = phase::resolve_in_root(ctx.root, &doc.path)
                {
                    tracing::debug!(path = %doc.path.display(), declared = %declared, resolved = %resolved, "replacing unknown phase");
                    doc.set_phase(resolved);
                }
                doc.touch(&ctx.now);
                Ok(Outcome::updated(format!(
                    "[{}] -> [{}]",
                    before.join(", "),
                    after.join(", ")
                )))
            }
        }
    }
}
