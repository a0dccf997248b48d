//! Durable writes and the corpus lock.
//!
//! Document rewrites go temp file -> optional backup rename -> rename over
//! the original, so a crash leaves either the old file, the new file, or the
//! `.bak` sidecar, never a partial document.

use crate::core::error::DmctError;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use ulid::Ulid;

pub const LOCK_FILE_NAME: &str = ".dmct.lock";
pub const BACKUP_SUFFIX: &str = ".bak";
const TEMP_SUFFIX: &str = ".dmct-tmp";

/// `<file>.bak` next to `path`.
pub fn backup_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(BACKUP_SUFFIX);
    path.with_file_name(name)
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = std::ffi::OsString::from(".");
    name.push(path.file_name().unwrap_or_default());
    name.push(TEMP_SUFFIX);
    path.with_file_name(name)
}

fn write_temp(path: &Path, content: &[u8]) -> std::io::Result<PathBuf> {
    let tmp = temp_path(path);
    let result = (|| -> std::io::Result<()> {
        let mut file = File::create(&tmp)?;
        file.write_all(content)?;
        file.sync_all()?;
        if let Ok(meta) = fs::metadata(path) {
            fs::set_permissions(&tmp, meta.permissions())?;
        }
        Ok(())
    })();
    match result {
        Ok(()) => Ok(tmp),
        Err(err) => {
            let _ = fs::remove_file(&tmp);
            Err(err)
        }
    }
}

/// Result of a successful document rewrite.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteOutcome {
    pub backup: Option<PathBuf>,
}

/// Rewrites `path` with `content`. With `backup`, the previous file is kept
/// as `<file>.bak`. On failure the original is restored from the backup when
/// one was taken, and the error is a `WriteFailure`.
pub fn write_document(path: &Path, content: &str, backup: bool) -> Result<WriteOutcome, DmctError> {
    write_document_with(path, content, backup, |from, to| fs::rename(from, to))
}

fn write_document_with<R>(path: &Path, content: &str, backup: bool, mut rename: R) -> Result<WriteOutcome, DmctError>
where
    R: FnMut(&Path, &Path) -> std::io::Result<()>,
{
    let failure = |source: std::io::Error| DmctError::WriteFailure {
        path: path.to_path_buf(),
        source,
    };

    let tmp = write_temp(path, content.as_bytes()).map_err(failure)?;

    let bak = if backup {
        let bak = backup_path(path);
        if let Err(err) = rename(path, &bak) {
            let _ = fs::remove_file(&tmp);
            return Err(failure(err));
        }
        Some(bak)
    } else {
        None
    };

    if let Err(err) = rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        if let Some(bak) = &bak {
            match rename(bak, path) {
                Ok(()) => tracing::warn!(path = %path.display(), "write failed, restored from backup"),
                Err(revert) => tracing::error!(
                    path = %path.display(),
                    backup = %bak.display(),
                    error = %revert,
                    "write failed and revert failed; backup left in place"
                ),
            }
        }
        return Err(failure(err));
    }

    Ok(WriteOutcome { backup: bak })
}

/// Atomically replaces `path` (creating parent directories) with `content`.
pub fn write_atomic(path: &Path, content: &[u8]) -> Result<(), DmctError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(DmctError::IoError)?;
    }
    let failure = |source: std::io::Error| DmctError::WriteFailure {
        path: path.to_path_buf(),
        source,
    };
    let tmp = write_temp(path, content).map_err(failure)?;
    fs::rename(&tmp, path).map_err(|err| {
        let _ = fs::remove_file(&tmp);
        failure(err)
    })
}

/// Advisory single-writer lease over a corpus root.
///
/// `create_new` gives single-winner semantics; the file is removed on drop.
#[derive(Debug)]
pub struct CorpusLock {
    path: PathBuf,
    token: Ulid,
    _file: File,
}

impl CorpusLock {
    pub fn acquire(root: &Path) -> Result<Self, DmctError> {
        let path = root.join(LOCK_FILE_NAME);
        let mut file = match OpenOptions::new()
            .create_new(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&path)
        {
            Ok(file) => file,
            Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => {
                return Err(DmctError::CorpusLocked(path));
            }
            Err(err) => {
                return Err(DmctError::RootUnavailable(format!(
                    "cannot create lock in {}: {}",
                    root.display(),
                    err
                )));
            }
        };

        let token = Ulid::new();
        let lock = Self {
            path,
            token,
            _file: file.try_clone().map_err(DmctError::IoError)?,
        };
        writeln!(file, "pid {}\ntoken {}", std::process::id(), token).map_err(DmctError::IoError)?;
        tracing::debug!(lock = %lock.path.display(), token = %token, "corpus lock acquired");
        Ok(lock)
    }

    pub fn token(&self) -> Ulid {
        self.token
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for CorpusLock {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}
