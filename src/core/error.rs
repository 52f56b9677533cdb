use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Coarse classification of a [`LibraryError`].
///
/// Callers branch on this instead of inspecting messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Transport,
    Timeout,
    Integrity,
    Resolution,
    BatchIncomplete,
    NotFound,
    /// Found, but the bytes are not a usable unit.
    Link,
    Configuration,
    Io,
}

/// Central error type for library acquisition and loading.
/// Every module returns `Result<T, LibraryError>`.
#[derive(Debug, Error)]
pub enum LibraryError {
    // ── IO ──────────────────────────────────────────────
    #[error("IO error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    // ── Network ─────────────────────────────────────────
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Transfer from {url} failed: {reason}")]
    Transport { url: String, reason: String },

    #[error("Download failed for {url}: HTTP {status}")]
    DownloadFailed { url: String, status: u16 },

    #[error("Transfer from {url} exceeded the {deadline:?} deadline")]
    Timeout { url: String, deadline: Duration },

    // ── Integrity ───────────────────────────────────────
    #[error("{algorithm} mismatch for {target}: expected {expected}, got {actual}")]
    Integrity {
        target: String,
        algorithm: String,
        expected: String,
        actual: String,
    },

    #[error("Unknown digest algorithm: {0}")]
    UnknownAlgorithm(String),

    // ── Resolution ──────────────────────────────────────
    #[error("Invalid artifact coordinate: {0}")]
    InvalidCoordinate(String),

    #[error("Version lookup failed for {coordinate}: {reason}")]
    Resolution { coordinate: String, reason: String },

    #[error("Metadata parse error: {0}")]
    MetadataParse(String),

    #[error("Bundled artifact {coordinate} is missing at {path:?}")]
    BundleMissing { coordinate: String, path: PathBuf },

    #[error("Cannot express {0:?} as a resource location")]
    InvalidLocation(PathBuf),

    // ── Batch ───────────────────────────────────────────
    #[error("Failed to load libraries: {completed}/{total} completed, {failed} failed ({reason})")]
    BatchIncomplete {
        completed: usize,
        failed: usize,
        total: usize,
        reason: String,
    },

    // ── Loader ──────────────────────────────────────────
    #[error("Code unit not found: {0}")]
    NotFound(String),

    #[error("Failed to link {name}: {reason}")]
    Link { name: String, reason: String },

    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    // ── Configuration ───────────────────────────────────
    #[error("Configuration error: {0}")]
    Config(#[from] serde_json::Error),
}

/// Convenience alias used throughout the crate.
pub type LibraryResult<T> = Result<T, LibraryError>;

impl LibraryError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LibraryError::Io { .. } | LibraryError::Archive(_) => ErrorKind::Io,
            LibraryError::Http(_)
            | LibraryError::Transport { .. }
            | LibraryError::DownloadFailed { .. } => ErrorKind::Transport,
            LibraryError::Timeout { .. } => ErrorKind::Timeout,
            LibraryError::Integrity { .. } => ErrorKind::Integrity,
            LibraryError::Resolution { .. } | LibraryError::MetadataParse(_) => {
                ErrorKind::Resolution
            }
            LibraryError::BatchIncomplete { .. } => ErrorKind::BatchIncomplete,
            LibraryError::NotFound(_) | LibraryError::BundleMissing { .. } => ErrorKind::NotFound,
            LibraryError::Link { .. } => ErrorKind::Link,
            LibraryError::UnknownAlgorithm(_)
            | LibraryError::InvalidCoordinate(_)
            | LibraryError::InvalidLocation(_)
            | LibraryError::Config(_) => ErrorKind::Configuration,
        }
    }

    /// Only version lookups may be retried or ignored; everything else aborts.
    pub fn is_recoverable(&self) -> bool {
        self.kind() == ErrorKind::Resolution
    }

    /// Errors after which the host process must not continue.
    pub fn is_process_fatal(&self) -> bool {
        matches!(self.kind(), ErrorKind::BatchIncomplete | ErrorKind::NotFound)
    }

    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| LibraryError::Io { path, source }
    }

    pub(crate) fn transport(url: &str, reason: impl ToString) -> Self {
        LibraryError::Transport {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }
}
