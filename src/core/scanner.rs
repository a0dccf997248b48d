//! Corpus scanner.
//!
//! Yields every `.md` file under a root in sorted path order. Directories
//! rejected by the ignore predicate are pruned, not just filtered.

use crate::core::error::DmctError;
use std::path::{Component, Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

const MARKDOWN_EXTENSION: &str = "md";

/// Path-component predicate deciding what the scanner skips.
#[derive(Debug, Clone, Default)]
pub struct IgnoreRules {
    extra: Vec<String>,
}

impl IgnoreRules {
    pub fn new(extra: impl IntoIterator<Item = String>) -> Self {
        Self {
            extra: extra.into_iter().collect(),
        }
    }

    /// Default rule: `.bak`, `__pycache__`, and dot-prefixed names.
    pub fn ignores_component(&self, name: &str) -> bool {
        name == ".bak"
            || name == "__pycache__"
            || name.starts_with('.')
            || self.extra.iter().any(|e| e == name)
    }

    /// Applies the rule to every component of `relative`.
    pub fn ignores(&self, relative: &Path) -> bool {
        relative.components().any(|c| match c {
            Component::Normal(name) => name.to_str().is_none_or(|n| self.ignores_component(n)),
            _ => false,
        })
    }
}

/// Lazy, restartable walk over the Markdown files under `root`.
pub struct Scan {
    root: PathBuf,
    inner: Box<dyn Iterator<Item = walkdir::Result<DirEntry>> + Send>,
    rules: IgnoreRules,
}

impl Iterator for Scan {
    type Item = Result<PathBuf, DmctError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let entry = match self.inner.next()? {
                Ok(entry) => entry,
                Err(err) => {
                    let path = err.path().map(Path::to_path_buf).unwrap_or_else(|| self.root.clone());
                    let source = err
                        .into_io_error()
                        .unwrap_or_else(|| std::io::Error::other("filesystem loop"));
                    return Some(Err(DmctError::UnreadableFile { path, source }));
                }
            };
            if !entry.file_type().is_file() || !is_markdown(entry.path()) {
                continue;
            }
            let relative = entry.path().strip_prefix(&self.root).unwrap_or(entry.path());
            if self.rules.ignores(relative) {
                continue;
            }
            return Some(Ok(entry.into_path()));
        }
    }
}

fn is_markdown(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some(MARKDOWN_EXTENSION)
}

fn keep_entry(root: &Path, rules: &IgnoreRules, entry: &DirEntry) -> bool {
    if entry.depth() == 0 {
        return true;
    }
    let relative = entry.path().strip_prefix(root).unwrap_or(entry.path());
    !rules.ignores(relative)
}

/// Starts a scan. Fails only when `root` is not a readable directory.
pub fn scan(root: &Path, rules: &IgnoreRules) -> Result<Scan, DmctError> {
    if !root.is_dir() {
        return Err(DmctError::RootUnavailable(format!(
            "{} is not a directory",
            root.display()
        )));
    }
    std::fs::read_dir(root)
        .map_err(|e| DmctError::RootUnavailable(format!("{}: {}", root.display(), e)))?;

    let filter_root = root.to_path_buf();
    let filter_rules = rules.clone();
    let inner = WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(move |e| keep_entry(&filter_root, &filter_rules, e));

    Ok(Scan {
        root: root.to_path_buf(),
        inner: Box::new(inner),
        rules: rules.clone(),
    })
}

/// Collects a scan, splitting walk errors from paths.
pub fn collect(root: &Path, rules: &IgnoreRules) -> Result<(Vec<PathBuf>, Vec<DmctError>), DmctError> {
    let mut paths = Vec::new();
    let mut errors = Vec::new();
    for item in scan(root, rules)? {
        match item {
            Ok(path) => paths.push(path),
            Err(err) => {
                tracing::warn!(error = %err, "scan error");
                errors.push(err);
            }
        }
    }
    Ok((paths, errors))
}
