//! Run configuration.
//!
//! `DmctConfig` is built once per process and handed to every component by
//! reference. Values come from built-in defaults, then an optional
//! `dmct.toml`, then CLI flags applied by the caller.

use crate::core::error::DmctError;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE_NAME: &str = "dmct.toml";
pub const DEFAULT_ROOT: &str = "docs";
pub const DEFAULT_STALE_THRESHOLD_DAYS: u32 = 30;
pub const DEFAULT_HISTORY_CAP: usize = 52;
pub const DEFAULT_REPORTS_DIR: &str = "reports";
pub const HISTORY_FILE_NAME: &str = "compliance_history.json";

pub fn default_required_sections() -> Vec<String> {
    ["## Ethical Score", "## Status", "## Authors"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// On-disk shape of `dmct.toml`. Every table and key is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    #[serde(default)]
    pub freshness: FreshnessSection,
    #[serde(default)]
    pub audit: AuditSection,
    #[serde(default)]
    pub scan: ScanSection,
    #[serde(default)]
    pub write: WriteSection,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FreshnessSection {
    pub stale_threshold_days: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuditSection {
    pub reports_dir: Option<PathBuf>,
    pub history_cap: Option<usize>,
    pub required_sections: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScanSection {
    #[serde(default)]
    pub ignore: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WriteSection {
    pub backup: Option<bool>,
}

/// Resolved settings for one run.
#[derive(Debug, Clone)]
pub struct DmctConfig {
    pub root: PathBuf,
    pub dry_run: bool,
    pub backup: bool,
    pub stale_threshold_days: u32,
    pub reports_dir: PathBuf,
    pub history_cap: usize,
    pub required_sections: Vec<String>,
    pub extra_ignore: Vec<String>,
}

impl DmctConfig {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            dry_run: false,
            backup: true,
            stale_threshold_days: DEFAULT_STALE_THRESHOLD_DAYS,
            reports_dir: PathBuf::from(DEFAULT_REPORTS_DIR),
            history_cap: DEFAULT_HISTORY_CAP,
            required_sections: default_required_sections(),
            extra_ignore: Vec::new(),
        }
    }

    /// Overlays values present in `file` onto `self`.
    pub fn apply_file(mut self, file: ConfigFile) -> Result<Self, DmctError> {
        if let Some(days) = file.freshness.stale_threshold_days {
            self.stale_threshold_days = days;
        }
        if let Some(dir) = file.audit.reports_dir {
            self.reports_dir = dir;
        }
        if let Some(cap) = file.audit.history_cap {
            if cap == 0 {
                return Err(DmctError::ConfigError(
                    "[audit] history_cap must be at least 1".to_string(),
                ));
            }
            self.history_cap = cap;
        }
        if let Some(sections) = file.audit.required_sections {
            self.required_sections = sections;
        }
        if let Some(backup) = file.write.backup {
            self.backup = backup;
        }
        self.extra_ignore.extend(file.scan.ignore);
        Ok(self)
    }

    pub fn history_path(&self) -> PathBuf {
        self.reports_dir.join(HISTORY_FILE_NAME)
    }
}

pub fn parse_config(content: &str, origin: &Path) -> Result<ConfigFile, DmctError> {
    toml::from_str(content)
        .map_err(|e| DmctError::ConfigError(format!("{}: {}", origin.display(), e)))
}

/// Loads the config file for `root`. An explicit path must exist; the
/// implicit `<root>/dmct.toml` is optional.
pub fn load_config_file(root: &Path, explicit: Option<&Path>) -> Result<ConfigFile, DmctError> {
    let (path, required) = match explicit {
        Some(p) => (p.to_path_buf(), true),
        None => (root.join(CONFIG_FILE_NAME), false),
    };
    if !path.is_file() {
        if required {
            return Err(DmctError::ConfigError(format!(
                "config file not found: {}",
                path.display()
            )));
        }
        return Ok(ConfigFile::default());
    }
    let content = fs::read_to_string(&path).map_err(DmctError::IoError)?;
    tracing::debug!(path = %path.display(), "loaded config file");
    parse_config(&content, &path)
}
