//! Provider failures sorted into the backup error taxonomy.

use std::fmt;

use eventtracker_domain::{BackupErrorKind, BackupOutcome};
use reqwest::StatusCode;
use thiserror::Error;

use crate::errors::classify_status;

/// A classified provider failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct RemoteError {
    pub kind: BackupErrorKind,
    pub message: String,
}

impl RemoteError {
    pub fn new(kind: BackupErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into() }
    }

    /// Connectivity failure or timeout.
    pub fn network(detail: impl fmt::Display) -> Self {
        Self::new(
            BackupErrorKind::Network,
            format!("Network error. Please check your connection. ({detail})"),
        )
    }

    pub fn not_authenticated() -> Self {
        Self::new(BackupErrorKind::Auth, "Not authenticated")
    }

    /// Local file I/O around a transfer.
    pub fn local(err: &std::io::Error) -> Self {
        Self::new(BackupErrorKind::File, format!("File error: {err}"))
    }

    /// A response body that does not match the expected shape.
    pub fn malformed(detail: impl fmt::Display) -> Self {
        Self::new(BackupErrorKind::Unknown, format!("Malformed Dropbox response: {detail}"))
    }

    /// A non-success HTTP status. 401 and 403 ask the user to relink.
    pub fn status(status: StatusCode, summary: &str) -> Self {
        let code = status.as_u16();
        match classify_status(status) {
            BackupErrorKind::Auth => Self::new(
                BackupErrorKind::Auth,
                format!("Authentication failed. Please reconnect to Dropbox. (HTTP {code})"),
            ),
            kind => Self::new(kind, format!("Dropbox API error (HTTP {code}): {summary}")),
        }
    }

    pub fn into_outcome(self) -> BackupOutcome {
        BackupOutcome::error(self.kind, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_errors_split_auth_from_provider_failures() {
        let expired = RemoteError::status(StatusCode::UNAUTHORIZED, "expired_access_token/");
        assert_eq!(expired.kind, BackupErrorKind::Auth);
        assert!(expired.message.contains("reconnect"));

        let busy = RemoteError::status(StatusCode::SERVICE_UNAVAILABLE, "too_busy");
        assert_eq!(busy.kind, BackupErrorKind::Unknown);
        assert!(busy.message.ends_with("too_busy"));

        let outcome = RemoteError::network("connection refused").into_outcome();
        assert_eq!(outcome.error_kind(), Some(BackupErrorKind::Network));
    }
}
