//! Error types for kbsync.
//!
//! Library crates use [`KbSyncError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all kbsync operations.
#[derive(Debug, thiserror::Error)]
pub enum KbSyncError {
    /// The page is not KB-bearing, or this is not a production environment.
    /// A recognized skip rather than a failure.
    #[error("sync not applicable: {reason}")]
    NotApplicable { reason: String },

    /// The help-center call did not complete within the client timeout.
    /// Whether the remote side effect happened is unknown.
    #[error("help center {operation} timed out")]
    RemoteTimeout { operation: &'static str },

    /// The help-center call completed with an unexpected status code.
    #[error("help center {operation} rejected with HTTP {status}: {body}")]
    RemoteRejected {
        operation: &'static str,
        status: u16,
        body: String,
    },

    /// An update or delete was about to target remote article id 0.
    #[error("inconsistent sync state: {message}")]
    InconsistentState { message: String },

    /// The latest revision's content is missing KB fields or has the wrong shape.
    #[error("malformed page state: {message}")]
    MalformedState { message: String },

    /// Transport-level HTTP failure other than a timeout.
    #[error("network error: {0}")]
    Network(String),

    /// A remote response could not be decoded.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Database or storage layer error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Input validation error.
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, KbSyncError>;

impl KbSyncError {
    pub fn not_applicable(reason: impl Into<String>) -> Self {
        Self::NotApplicable {
            reason: reason.into(),
        }
    }

    pub fn inconsistent(msg: impl Into<String>) -> Self {
        Self::InconsistentState {
            message: msg.into(),
        }
    }

    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedState {
            message: msg.into(),
        }
    }

    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// True for failures of the outbound help-center call itself.
    pub fn is_remote_failure(&self) -> bool {
        matches!(
            self,
            Self::RemoteTimeout { .. } | Self::RemoteRejected { .. } | Self::Network(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = KbSyncError::config("missing token");
        assert_eq!(err.to_string(), "config error: missing token");

        let err = KbSyncError::RemoteRejected {
            operation: "create",
            status: 422,
            body: "{\"error\":\"RecordInvalid\"}".into(),
        };
        assert!(err.to_string().contains("HTTP 422"));
        assert!(err.to_string().contains("RecordInvalid"));
    }

    #[test]
    fn remote_failure_classification() {
        assert!(KbSyncError::RemoteTimeout { operation: "delete" }.is_remote_failure());
        assert!(KbSyncError::Network("refused".into()).is_remote_failure());
        assert!(!KbSyncError::not_applicable("not production").is_remote_failure());
        assert!(!KbSyncError::inconsistent("id 0").is_remote_failure());
    }
}
