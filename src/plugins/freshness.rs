//! Stale-document refresher.

use crate::core::document::Document;
use crate::core::error::DmctError;
use crate::core::pass::{DocumentPass, Outcome, PassContext};
use crate::core::time;
use chrono::{DateTime, FixedOffset};

/// Why a document is (or is not) due for a refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Freshness {
    Fresh,
    Stale { age_days: i64 },
    /// Missing or non-canonical timestamp; treated as the epoch.
    Unparseable,
}

pub fn assess(last_updated: Option<&str>, now: &DateTime<FixedOffset>, threshold_days: u32) -> Freshness {
    match last_updated.and_then(time::parse_canonical) {
        None => Freshness::Unparseable,
        Some(ts) if time::is_stale(&ts, now, threshold_days) => Freshness::Stale {
            age_days: now.signed_duration_since(ts).num_days(),
        },
        Some(_) => Freshness::Fresh,
    }
}

pub struct FreshnessPass {
    pub threshold_days: u32,
}

impl DocumentPass for FreshnessPass {
    fn name(&self) -> &'static str {
        "refresh-stale"
    }

    fn verb(&self) -> &'static str {
        "refreshed"
    }

    fn apply(&self, doc: &mut Document, ctx: &PassContext<'_>) -> Result<Outcome, DmctError> {
        let previous = doc.last_updated().map(str::to_string);
        let detail = match assess(previous.as_deref(), &ctx.now, self.threshold_days) {
            Freshness::Fresh => return Ok(Outcome::skipped("fresh")),
            Freshness::Stale { age_days } => format!("stale for {} days", age_days),
            Freshness::Unparseable => format!(
                "unparseable last_updated {:?}",
                previous.as_deref().unwrap_or("")
            ),
        };
        doc.touch(&ctx.now);
        Ok(Outcome::updated(detail))
    }
}
