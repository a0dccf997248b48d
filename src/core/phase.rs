//! Phase catalogue and path-based phase resolution.
//!
//! The catalogue is closed: `0.x` through `19.x`. Phase directories are path
//! segments shaped `<N>.x-<slug>`; the topmost one decides a document's phase.

use crate::core::error::DmctError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Component, Path};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CorePhase(u8);

impl CorePhase {
    pub const MAX: u8 = 19;
    pub const COUNT: usize = Self::MAX as usize + 1;

    pub fn new(number: u8) -> Option<Self> {
        (number <= Self::MAX).then_some(Self(number))
    }

    pub fn number(self) -> u8 {
        self.0
    }

    pub fn all() -> impl Iterator<Item = CorePhase> {
        (0..=Self::MAX).map(CorePhase)
    }

    /// Parses a declared phase value such as `7.x`.
    pub fn parse(value: &str) -> Result<Self, DmctError> {
        let trimmed = value.trim();
        trimmed
            .strip_suffix(".x")
            .and_then(parse_number)
            .and_then(Self::new)
            .ok_or_else(|| DmctError::UnknownPhase(trimmed.to_string()))
    }
}

impl fmt::Display for CorePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.x", self.0)
    }
}

impl FromStr for CorePhase {
    type Err = DmctError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for CorePhase {
    type Error = DmctError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<CorePhase> for String {
    fn from(phase: CorePhase) -> Self {
        phase.to_string()
    }
}

fn parse_number(digits: &str) -> Option<u8> {
    let well_formed = !digits.is_empty()
        && digits.len() <= 2
        && digits.chars().all(|c| c.is_ascii_digit())
        && !(digits.len() > 1 && digits.starts_with('0'));
    if well_formed { digits.parse().ok() } else { None }
}

/// Phase named by a single directory segment, if it is a phase directory.
pub fn phase_of_segment(segment: &str) -> Option<CorePhase> {
    let (number, _slug) = segment.split_once(".x-")?;
    parse_number(number).and_then(CorePhase::new)
}

/// Maps a path to the phase implied by its topmost phase directory.
/// `None` means unresolved: the path sits outside every phase tree.
pub fn resolve(path: &Path) -> Option<CorePhase> {
    path.components().find_map(|component| match component {
        Component::Normal(name) => name.to_str().and_then(phase_of_segment),
        _ => None,
    })
}

/// Resolves `path` relative to the corpus `root` so that phase-shaped
/// directories above the root never count.
pub fn resolve_in_root(root: &Path, path: &Path) -> Option<CorePhase> {
    resolve(path.strip_prefix(root).unwrap_or(path))
}
