use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DmctError {
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
    #[error("Malformed front-matter: {0}")]
    MalformedFrontMatter(String),
    #[error("Unreadable file {}: {source}", path.display())]
    UnreadableFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Write failed for {}: {source}", path.display())]
    WriteFailure {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Unknown phase: {0}")]
    UnknownPhase(String),
    #[error("Audit history corrupted: {0}")]
    HistoryCorruption(String),
    #[error("Argument error: {0}")]
    ArgumentError(String),
    #[error("Config error: {0}")]
    ConfigError(String),
    #[error("Corpus root unavailable: {0}")]
    RootUnavailable(String),
    #[error("Corpus is locked by another run: {}", .0.display())]
    CorpusLocked(PathBuf),
}

impl DmctError {
    /// Process exit code for errors that reach `main`.
    pub fn exit_code(&self) -> i32 {
        match self {
            DmctError::ArgumentError(_) => 2,
            _ => 1,
        }
    }

    /// Errors that are recorded against a single document and never abort a pass.
    pub fn is_per_file(&self) -> bool {
        matches!(
            self,
            DmctError::MalformedFrontMatter(_)
                | DmctError::UnreadableFile { .. }
                | DmctError::WriteFailure { .. }
                | DmctError::UnknownPhase(_)
        )
    }
}
