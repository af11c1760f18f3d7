//! Error types for the job manager engine.
//!
//! Every failure a worker task can hit is an `EngineError`. Workers catch
//! these at the task boundary and hand them to the control thread as part of
//! a single terminal result, so no error ever escapes into the UI layer.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors produced by transfers, update checks, downloads and update application.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A required source subfolder (or root) is missing
    #[error("{what} folder not found in {}", .path.display())]
    PathNotFound { path: PathBuf, what: String },

    /// A copy, clear or mkdir failed partway through an operation
    #[error("Error {op} {}: {source}", .path.display())]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The version check or download could not reach the server
    #[error("Network request to {url} failed: {source}")]
    Network {
        url: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The update descriptor did not have the expected shape
    #[error("Malformed update descriptor: {reason}")]
    MalformedResponse { reason: String },

    /// The helper script could not be written or launched
    #[error("Failed to apply update via {}: {source}", .path.display())]
    UpdateApply {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Another transfer currently owns this destination root
    #[error("A transfer into {} is already running", .destination.display())]
    TransferInProgress { destination: PathBuf },

    /// The requested job or dropped folder is not usable
    #[error("Invalid job: {reason}")]
    InvalidJob { reason: String },
}

/// Coarse classification of an `EngineError`, matching the reporting policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    PathNotFound,
    IoFailure,
    NetworkFailure,
    UpdateApplyFailure,
    Busy,
    InvalidJob,
}

impl EngineError {
    /// Shorthand for wrapping an `io::Error` with the operation and path it hit.
    pub fn io(op: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        EngineError::Io {
            op,
            path: path.into(),
            source,
        }
    }

    pub fn network(
        url: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        EngineError::Network {
            url: url.into(),
            source: source.into(),
        }
    }

    /// Classify this error. Malformed descriptors count as network failures.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::PathNotFound { .. } => ErrorKind::PathNotFound,
            Self::Io { .. } => ErrorKind::IoFailure,
            Self::Network { .. } | Self::MalformedResponse { .. } => ErrorKind::NetworkFailure,
            Self::UpdateApply { .. } => ErrorKind::UpdateApplyFailure,
            Self::TransferInProgress { .. } => ErrorKind::Busy,
            Self::InvalidJob { .. } => ErrorKind::InvalidJob,
        }
    }

    /// The offending filesystem path, if this error carries one.
    pub fn path(&self) -> Option<&std::path::Path> {
        match self {
            Self::PathNotFound { path, .. }
            | Self::Io { path, .. }
            | Self::UpdateApply { path, .. } => Some(path),
            Self::TransferInProgress { destination } => Some(destination),
            _ => None,
        }
    }
}
