//! Error taxonomy for the fetch-and-checkpoint engine
//!
//! Two families with very different reach:
//! - [`LoadError`] is fatal and only ever raised before any work is dispatched.
//! - [`FetchError`] is per-record. It never propagates past the pool; it is
//!   stored in a [`FetchResult`](crate::record::FetchResult) and becomes data.

use std::fmt;
use std::path::PathBuf;

/// Fatal error while loading the input table or the checkpoint.
#[derive(Debug)]
pub enum LoadError {
    /// Required columns are absent from the input table.
    MissingColumns {
        path: PathBuf,
        missing: Vec<String>,
    },
    /// Existing checkpoint header differs from the phase's output header.
    HeaderMismatch {
        path: PathBuf,
        expected: Vec<String>,
        found: Vec<String>,
    },
    /// None of the configured encodings could decode the file.
    Encoding { path: PathBuf, tried: Vec<String> },
    Io { path: PathBuf, source: std::io::Error },
    Csv { path: PathBuf, source: csv::Error },
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingColumns { path, missing } => write!(
                f,
                "schema error: {} is missing required columns: {}",
                path.display(),
                missing.join(", ")
            ),
            Self::HeaderMismatch {
                path,
                expected,
                found,
            } => write!(
                f,
                "schema error: checkpoint {} has header [{}], expected [{}]",
                path.display(),
                found.join(", "),
                expected.join(", ")
            ),
            Self::Encoding { path, tried } => write!(
                f,
                "encoding error: unable to read {} with any of the encodings: {}",
                path.display(),
                tried.join(", ")
            ),
            Self::Io { path, source } => write!(f, "IO: {}: {source}", path.display()),
            Self::Csv { path, source } => write!(f, "CSV: {}: {source}", path.display()),
        }
    }
}

impl std::error::Error for LoadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Csv { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Per-record failure. Terminal for the id within a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// Target not located (no candidate link, no profile container).
    NotFound(String),
    /// Timeout or network fault.
    Transient(String),
    /// Defect inside a fetcher, caught at the pool boundary.
    Internal(String),
}

impl FetchError {
    /// Short label used in diagnostics and summaries
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::Transient(_) => "transient",
            Self::Internal(_) => "internal",
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::NotFound(m) | Self::Transient(m) | Self::Internal(m) => m,
        }
    }
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind(), self.message())
    }
}

impl std::error::Error for FetchError {}
