use std::time::Duration;

use reqwest::StatusCode;
use thiserror::Error;

/// Errors that can occur while discovering or downloading a document library
#[derive(Error, Debug)]
pub enum FlattenError {
    #[error("Unrecognised row label '{label}': {reason}")]
    Parse { label: String, reason: String },

    #[error("Timed out after {waited:?} waiting for '{selector}'")]
    Timeout { selector: String, waited: Duration },

    #[error("Could not resolve folder path from breadcrumb: {message}")]
    BaseUrlResolution { message: String },

    #[error("Listing of {url} stopped at {found} of {expected} declared items")]
    IncompleteListing {
        url: String,
        expected: usize,
        found: usize,
    },

    #[error("Listing of {url} still growing after {iterations} scroll steps")]
    ScrollLimit { url: String, iterations: usize },

    #[error("Browser error: {message}")]
    Browser { message: String },

    #[error("Failed to download {url}: {message}")]
    DownloadFetch {
        url: String,
        message: String,
        status: Option<StatusCode>,
    },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid tree document: {message}")]
    InvalidStructure { message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl FlattenError {
    /// Wrap an error raised by the browser driver
    pub fn browser(err: impl std::fmt::Display) -> Self {
        FlattenError::Browser {
            message: format!("{:#}", err),
        }
    }

    /// Whether a download failure is worth another attempt
    ///
    /// Transport failures, rate limiting and server-side errors are transient;
    /// everything else (404, 403, local IO) is not.
    pub fn is_retryable(&self) -> bool {
        match self {
            FlattenError::Network(_) => true,
            FlattenError::DownloadFetch {
                status: Some(status),
                ..
            } => *status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error(),
            _ => false,
        }
    }
}

/// Result type alias for discovery and download operations
pub type Result<T> = std::result::Result<T, FlattenError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn fetch_error(status: Option<StatusCode>) -> FlattenError {
        FlattenError::DownloadFetch {
            url: "https://example.com/a.txt".to_string(),
            message: "boom".to_string(),
            status,
        }
    }

    #[test]
    fn test_retryable_statuses() {
        assert!(fetch_error(Some(StatusCode::TOO_MANY_REQUESTS)).is_retryable());
        assert!(fetch_error(Some(StatusCode::BAD_GATEWAY)).is_retryable());
        assert!(!fetch_error(Some(StatusCode::NOT_FOUND)).is_retryable());
        assert!(!fetch_error(Some(StatusCode::FORBIDDEN)).is_retryable());
        assert!(!fetch_error(None).is_retryable());
    }

    #[test]
    fn test_discovery_errors_are_not_retryable() {
        let err = FlattenError::Timeout {
            selector: ".list".to_string(),
            waited: Duration::from_secs(10),
        };
        assert!(!err.is_retryable());
        assert!(err.to_string().contains(".list"));
    }
}
