//! Error types for depot.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("checksum failed for {}: {message}", .path.display())]
    Checksum { path: PathBuf, message: String },

    #[error("cannot resolve path template '{template}': {message}")]
    PathResolution { template: String, message: String },

    #[error("invalid property spec: {0}")]
    PropertyResolution(String),

    #[error("invalid glob pattern '{pattern}': {message}")]
    Filter { pattern: String, message: String },

    #[error("duplicate deploy target {repository}/{path} (from {first} and {second})")]
    DuplicateDeployPath {
        repository: String,
        path: String,
        first: String,
        second: String,
    },

    #[error("upload of '{path}' failed (retryable: {retryable}): {message}")]
    Upload {
        path: String,
        retryable: bool,
        message: String,
    },

    #[error("build info publication failed: {0}")]
    PublishInfo(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("cancelled")]
    Cancelled,

    #[error("cannot write build info to {}: {message}", .path.display())]
    Persistence { path: PathBuf, message: String },

    #[error("proxy configuration rejected: {0}")]
    Proxy(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Whether retrying the failed operation may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Upload { retryable: true, .. } | Error::Timeout(_))
    }

    /// Short name of the error kind, used in run reports.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Checksum { .. } => "checksum",
            Error::PathResolution { .. } => "path-resolution",
            Error::PropertyResolution(_) => "property-resolution",
            Error::Filter { .. } => "filter",
            Error::DuplicateDeployPath { .. } => "duplicate-deploy-path",
            Error::Upload { .. } => "upload",
            Error::PublishInfo(_) => "publish-info",
            Error::Timeout(_) => "timeout",
            Error::Cancelled => "cancellation",
            Error::Persistence { .. } => "persistence",
            Error::Proxy(_) => "proxy",
            Error::Internal(_) => "internal",
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
