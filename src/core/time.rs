//! Canonical timestamp helpers.
//!
//! Every `last_updated` value written by dmct has the shape
//! `YYYY-MM-DD HH:MM:SS CET`. The zone is fixed by contract: wall-clock time is
//! taken at UTC+01:00 and no daylight-saving math is applied.

use chrono::{DateTime, Duration, FixedOffset, NaiveDateTime, Offset, TimeZone, Utc};

pub const CANONICAL_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
pub const ZONE_SUFFIX: &str = " CET";
const CET_OFFSET_SECS: i32 = 3600;

pub fn cet() -> FixedOffset {
    FixedOffset::east_opt(CET_OFFSET_SECS).unwrap_or_else(|| Utc.fix())
}

pub fn now_cet() -> DateTime<FixedOffset> {
    Utc::now().with_timezone(&cet())
}

/// Renders `ts` in the canonical `YYYY-MM-DD HH:MM:SS CET` form.
pub fn format_canonical(ts: &DateTime<FixedOffset>) -> String {
    format!(
        "{}{}",
        ts.with_timezone(&cet()).format(CANONICAL_FORMAT),
        ZONE_SUFFIX
    )
}

/// Parses a canonical timestamp. Anything else (naive ISO strings included)
/// yields `None`.
pub fn parse_canonical(value: &str) -> Option<DateTime<FixedOffset>> {
    let stripped = value.trim().strip_suffix(ZONE_SUFFIX)?;
    let naive = NaiveDateTime::parse_from_str(stripped.trim_end(), CANONICAL_FORMAT).ok()?;
    cet().from_local_datetime(&naive).single()
}

pub fn is_canonical(value: &str) -> bool {
    parse_canonical(value).is_some()
}

/// The moment unparseable timestamps collapse to.
pub fn epoch() -> DateTime<FixedOffset> {
    DateTime::<Utc>::UNIX_EPOCH.with_timezone(&cet())
}

pub fn parse_or_epoch(value: Option<&str>) -> DateTime<FixedOffset> {
    value.and_then(parse_canonical).unwrap_or_else(epoch)
}

/// True when `last` lies strictly more than `threshold_days` before `now`.
pub fn is_stale(last: &DateTime<FixedOffset>, now: &DateTime<FixedOffset>, threshold_days: u32) -> bool {
    now.signed_duration_since(*last) > Duration::days(i64::from(threshold_days))
}

/// Compact stamp used in report file names, e.g. `20260103_091500`.
pub fn file_stamp(ts: &DateTime<FixedOffset>) -> String {
    ts.format("%Y%m%d_%H%M%S").to_string()
}
