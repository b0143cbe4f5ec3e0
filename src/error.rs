//! Error types shared by search, resolution and download orchestration.

use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

/// Errors surfaced by the fetcher core.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Unknown job id, or a song that cannot be located in the current context.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The candidate is explicitly marked as not downloadable.
    #[error("Not downloadable: {0}")]
    NotDownloadable(String),

    /// Retry attempted while the job is active, or without a usable request.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// One of the layered timeouts elapsed.
    #[error("{stage} timed out after {}ms", .after.as_millis())]
    Timeout { stage: &'static str, after: Duration },

    /// Both the fast lookup and the automation path failed, or the gate is gone.
    #[error("Upstream failure: {0}")]
    Upstream(#[from] anyhow::Error),

    /// The automation download stage did not produce a file.
    #[error("Download failed: {0}")]
    Io(anyhow::Error),
}

/// Coarse classification of a [`FetchError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    NotDownloadable,
    Conflict,
    Timeout,
    UpstreamFailure,
    IoFailure,
}

impl ErrorKind {
    /// Returns true for errors the caller can fix by changing the request.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ErrorKind::NotFound | ErrorKind::NotDownloadable | ErrorKind::Conflict
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::NotFound => "not_found",
            ErrorKind::NotDownloadable => "not_downloadable",
            ErrorKind::Conflict => "conflict",
            ErrorKind::Timeout => "timeout",
            ErrorKind::UpstreamFailure => "upstream_failure",
            ErrorKind::IoFailure => "io_failure",
        }
    }
}

impl FetchError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            FetchError::NotFound(_) => ErrorKind::NotFound,
            FetchError::NotDownloadable(_) => ErrorKind::NotDownloadable,
            FetchError::Conflict(_) => ErrorKind::Conflict,
            FetchError::Timeout { .. } => ErrorKind::Timeout,
            FetchError::Upstream(_) => ErrorKind::UpstreamFailure,
            FetchError::Io(_) => ErrorKind::IoFailure,
        }
    }

    /// HTTP-equivalent status for the route layer.
    ///
    /// Upstream and IO failures whose message clearly describes a missing or
    /// non-downloadable song are reported as the matching 4xx instead of a 5xx.
    pub fn status_code(&self) -> u16 {
        match self.kind() {
            ErrorKind::NotFound => 404,
            ErrorKind::NotDownloadable => 422,
            ErrorKind::Conflict => 409,
            ErrorKind::Timeout => 504,
            ErrorKind::UpstreamFailure | ErrorKind::IoFailure => {
                let message = self.to_string().to_lowercase();
                if message.contains("not downloadable") {
                    422
                } else if message.contains("not found") {
                    404
                } else if self.kind() == ErrorKind::UpstreamFailure {
                    502
                } else {
                    500
                }
            }
        }
    }
}
