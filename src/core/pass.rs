//! Read-modify-write pipeline shared by the corpus-mutating commands.
//!
//! Reads and parses run on the rayon pool; mutation and writes happen in
//! scanner order on the calling thread, so reports are deterministic. The
//! interrupt flag is checked before each document.

use crate::core::config::DmctConfig;
use crate::core::document::Document;
use crate::core::error::DmctError;
use crate::core::interrupt;
use crate::core::scanner::{self, IgnoreRules};
use crate::core::store::{self, CorpusLock};
use chrono::{DateTime, FixedOffset};
use rayon::prelude::*;
use rustc_hash::FxHashSet;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;

/// What a pass did to one document in memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Updated { detail: String },
    Skipped { reason: String },
}

impl Outcome {
    pub fn updated(detail: impl Into<String>) -> Self {
        Outcome::Updated {
            detail: detail.into(),
        }
    }

    pub fn skipped(reason: impl Into<String>) -> Self {
        Outcome::Skipped {
            reason: reason.into(),
        }
    }
}

pub struct PassContext<'a> {
    pub root: &'a Path,
    pub now: DateTime<FixedOffset>,
    pub config: &'a DmctConfig,
}

/// One corpus operation applied document by document.
pub trait DocumentPass: Sync {
    fn name(&self) -> &'static str;
    /// Past-tense verb used in the summary line, e.g. `enhanced`.
    fn verb(&self) -> &'static str;
    fn apply(&self, doc: &mut Document, ctx: &PassContext<'_>) -> Result<Outcome, DmctError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    Updated,
    Skipped,
    Error,
}

#[derive(Debug, Clone, Serialize)]
pub struct FileReport {
    pub path: PathBuf,
    pub status: FileStatus,
    pub detail: Option<String>,
    pub written: bool,
}

impl FileReport {
    fn error(path: PathBuf, err: &DmctError) -> Self {
        Self {
            path,
            status: FileStatus::Error,
            detail: Some(err.to_string()),
            written: false,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub command: String,
    pub verb: String,
    pub dry_run: bool,
    pub processed: usize,
    pub changed: usize,
    pub skipped: usize,
    pub errors: usize,
    /// Stopped early on Ctrl-C; `files` covers only what was reached.
    pub interrupted: bool,
    pub files: Vec<FileReport>,
}

impl RunSummary {
    fn new(pass: &dyn DocumentPass, dry_run: bool) -> Self {
        Self {
            command: pass.name().to_string(),
            verb: pass.verb().to_string(),
            dry_run,
            processed: 0,
            changed: 0,
            skipped: 0,
            errors: 0,
            interrupted: false,
            files: Vec::new(),
        }
    }

    fn record(&mut self, report: FileReport) {
        self.processed += 1;
        match report.status {
            FileStatus::Updated => self.changed += 1,
            FileStatus::Skipped => self.skipped += 1,
            FileStatus::Error => self.errors += 1,
        }
        self.files.push(report);
    }

    /// `path: message` for every errored file, in path order.
    pub fn error_messages(&self) -> Vec<String> {
        self.files
            .iter()
            .filter(|f| f.status == FileStatus::Error)
            .map(|f| {
                format!(
                    "{}: {}",
                    f.path.display(),
                    f.detail.as_deref().unwrap_or("error")
                )
            })
            .collect()
    }

    pub fn updated(&self) -> impl Iterator<Item = &FileReport> {
        self.files.iter().filter(|f| f.status == FileStatus::Updated)
    }
}

type Loaded = (PathBuf, Result<Document, DmctError>);

/// Folds walk errors into the loaded documents so every diagnostic is
/// reported in path order.
fn merge_scan_errors(root: &Path, mut loaded: Vec<Loaded>, scan_errors: Vec<DmctError>) -> Vec<Loaded> {
    for err in scan_errors {
        let path = match &err {
            DmctError::UnreadableFile { path, .. } => path.clone(),
            _ => root.to_path_buf(),
        };
        loaded.push((path, Err(err)));
    }
    loaded.sort_by(|a, b| a.0.cmp(&b.0));
    loaded
}

pub struct PassRunner<'a> {
    config: &'a DmctConfig,
    now: DateTime<FixedOffset>,
    cancel: &'a AtomicBool,
}

impl<'a> PassRunner<'a> {
    pub fn new(config: &'a DmctConfig, now: DateTime<FixedOffset>) -> Self {
        Self {
            config,
            now,
            cancel: interrupt::flag(),
        }
    }

    /// Checks `cancel` instead of the process-wide interrupt flag.
    pub fn with_cancel(mut self, cancel: &'a AtomicBool) -> Self {
        self.cancel = cancel;
        self
    }

    /// Runs one pass, holding the corpus lock unless this is a dry run.
    pub fn run(&self, pass: &dyn DocumentPass) -> Result<RunSummary, DmctError> {
        let mut summaries = self.run_all(&[pass])?;
        summaries
            .pop()
            .ok_or_else(|| DmctError::ArgumentError("no pass to run".to_string()))
    }

    /// Runs several passes back to back under a single lock. Each pass
    /// rescans the corpus so it sees the previous pass's writes. A file
    /// rewritten by more than one pass is backed up only on its first write,
    /// so `<file>.bak` always holds the bytes from before the run.
    pub fn run_all(&self, passes: &[&dyn DocumentPass]) -> Result<Vec<RunSummary>, DmctError> {
        let root = self.config.root.as_path();
        let _lock = if self.config.dry_run {
            None
        } else {
            Some(CorpusLock::acquire(root)?)
        };
        let mut backed_up = FxHashSet::default();
        passes
            .iter()
            .map(|pass| self.run_locked(*pass, &mut backed_up))
            .collect()
    }

    fn run_locked(&self, pass: &dyn DocumentPass, backed_up: &mut FxHashSet<PathBuf>) -> Result<RunSummary, DmctError> {
        let mut summary = RunSummary::new(pass, self.config.dry_run);
        if interrupt::is_set(self.cancel) {
            summary.interrupted = true;
            return Ok(summary);
        }

        let root = self.config.root.as_path();
        let rules = IgnoreRules::new(self.config.extra_ignore.iter().cloned());
        let (paths, scan_errors) = scanner::collect(root, &rules)?;
        tracing::info!(command = pass.name(), files = paths.len(), dry_run = self.config.dry_run, "pass started");

        let loaded: Vec<Loaded> = paths
            .into_par_iter()
            .map(|path| {
                let doc = Document::load(&path);
                (path, doc)
            })
            .collect();
        let loaded = merge_scan_errors(root, loaded, scan_errors);

        let ctx = PassContext {
            root,
            now: self.now,
            config: self.config,
        };

        for (path, loaded) in loaded {
            if interrupt::is_set(self.cancel) {
                tracing::warn!(command = pass.name(), processed = summary.processed, "interrupted, stopping");
                summary.interrupted = true;
                break;
            }
            let report = match loaded {
                Ok(mut doc) => self.process(pass, &mut doc, &ctx, backed_up),
                Err(err) => {
                    tracing::warn!(path = %path.display(), error = %err, "skipping document");
                    FileReport::error(path, &err)
                }
            };
            summary.record(report);
        }

        tracing::info!(
            command = pass.name(),
            processed = summary.processed,
            changed = summary.changed,
            errors = summary.errors,
            "pass finished"
        );
        Ok(summary)
    }

    fn process(
        &self,
        pass: &dyn DocumentPass,
        doc: &mut Document,
        ctx: &PassContext<'_>,
        backed_up: &mut FxHashSet<PathBuf>,
    ) -> FileReport {
        let path = doc.path.clone();
        match pass.apply(doc, ctx) {
            Ok(Outcome::Skipped { reason }) => {
                tracing::debug!(path = %path.display(), reason = %reason, "unchanged");
                FileReport {
                    path,
                    status: FileStatus::Skipped,
                    detail: Some(reason),
                    written: false,
                }
            }
            Ok(Outcome::Updated { detail }) => {
                if self.config.dry_run {
                    return FileReport {
                        path,
                        status: FileStatus::Updated,
                        detail: Some(detail),
                        written: false,
                    };
                }
                let backup = self.config.backup && !backed_up.contains(&path);
                match store::write_document(&path, &doc.encode(), backup) {
                    Ok(outcome) => {
                        if outcome.backup.is_some() {
                            backed_up.insert(path.clone());
                        }
                        tracing::debug!(path = %path.display(), detail = %detail, "rewritten");
                        FileReport {
                            path,
                            status: FileStatus::Updated,
                            detail: Some(detail),
                            written: true,
                        }
                    }
                    Err(err) => {
                        tracing::warn!(path = %path.display(), error = %err, "write failed");
                        FileReport::error(path, &err)
                    }
                }
            }
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "pass failed for document");
                FileReport::error(path, &err)
            }
        }
    }
}
