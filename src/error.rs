//! Error taxonomy and per-run error policy.
//!
//! Every library operation returns [`Result`], an alias over [`SyncError`].
//! The CLI converts these into `anyhow` errors at the boundary.
//!
//! Orchestrators differ in how they treat a failed item: Backfill keeps
//! going, Cleanup and Extraction stop. That choice is carried as an
//! explicit [`ErrorPolicy`] value rather than being buried in each loop.

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Result type alias for sync operations.
pub type Result<T> = std::result::Result<T, SyncError>;

/// Errors that can occur while synchronizing vendor data.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The credential exchange was rejected. Carries the authority's reason verbatim.
    #[error("Auth failed: {0}")]
    Auth(String),

    /// The remote entity store answered a request with a failure status.
    #[error("{operation} failed (HTTP {status}): {message}")]
    Remote {
        operation: String,
        status: u16,
        message: String,
    },

    /// Transport-level HTTP failure.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Malformed JSON from the remote store.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A local file or directory could not be read or written.
    #[error("{}: {source}", path.display())]
    LocalIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// One input document could not be read. Unlike [`SyncError::LocalIo`]
    /// this concerns a single item, so best-effort runs skip it.
    #[error("Unreadable document {}: {source}", path.display())]
    Document {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A tabular row or remote payload could not be interpreted.
    #[error("Invalid record: {0}")]
    InvalidRecord(String),
}

impl SyncError {
    /// Create a remote request error.
    pub fn remote(operation: impl Into<String>, status: u16, message: impl Into<String>) -> Self {
        Self::Remote {
            operation: operation.into(),
            status,
            message: message.into(),
        }
    }

    /// Wrap an I/O error with the path it concerns.
    pub fn local_io(path: &Path, source: std::io::Error) -> Self {
        Self::LocalIo {
            path: path.to_path_buf(),
            source,
        }
    }

    /// Create an invalid record error.
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidRecord(message.into())
    }

    /// Whether this error concerns a single item rather than the whole run.
    ///
    /// Auth and local I/O failures are always fatal, whatever the policy.
    pub fn is_item_scoped(&self) -> bool {
        matches!(
            self,
            Self::Remote { .. }
                | Self::Http(_)
                | Self::Json(_)
                | Self::Document { .. }
                | Self::InvalidRecord(_)
        )
    }
}

/// A run that stopped early, carrying the counts it reached.
#[derive(Debug, Error)]
#[error("{error}")]
pub struct RunAborted<R: std::fmt::Debug> {
    pub report: R,
    #[source]
    pub error: SyncError,
}

impl<R: std::fmt::Debug> RunAborted<R> {
    pub fn new(report: R, error: SyncError) -> Self {
        Self { report, error }
    }
}

/// Outcome of a whole orchestrator run.
pub type RunResult<R> = std::result::Result<R, RunAborted<R>>;

/// How an orchestrator reacts to a failed item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ErrorPolicy {
    /// Log the failure, count it, and continue with the next item.
    BestEffort,
    /// Abort the run on the first failure.
    Strict,
}

impl ErrorPolicy {
    /// Apply the policy to the outcome of one item.
    ///
    /// Returns `Ok(Some(value))` on success, `Ok(None)` when a failure was
    /// absorbed under [`ErrorPolicy::BestEffort`], and `Err` when the run
    /// must stop.
    pub fn absorb<T>(self, outcome: Result<T>, item: &str) -> Result<Option<T>> {
        match outcome {
            Ok(value) => Ok(Some(value)),
            Err(e) if self == ErrorPolicy::BestEffort && e.is_item_scoped() => {
                tracing::warn!(item, error = %e, "item failed, continuing");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}

impl std::fmt::Display for ErrorPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorPolicy::BestEffort => write!(f, "best-effort"),
            ErrorPolicy::Strict => write!(f, "strict"),
        }
    }
}
