//! Conversions from external infrastructure errors into domain errors.

use eventtracker_common::auth::{OAuthClientError, TokenManagerError};
use eventtracker_common::error::CommonError;
use eventtracker_common::security::KeychainError;
use eventtracker_domain::{BackupErrorKind, EventTrackerError};
use reqwest::Error as HttpError;
use reqwest::StatusCode;
use rusqlite::Error as SqlError;

/// Error newtype that keeps conversions on the infrastructure side and can be
/// converted back into the domain error.
#[derive(Debug)]
pub struct InfraError(pub EventTrackerError);

impl From<InfraError> for EventTrackerError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

impl From<EventTrackerError> for InfraError {
    fn from(value: EventTrackerError) -> Self {
        InfraError(value)
    }
}

/// Extension trait to make the conversion logic explicit in tests and within
/// this module.
trait IntoEventTrackerError {
    fn into_eventtracker(self) -> EventTrackerError;
}

/* -------------------------------------------------------------------------- */
/* Backup failure classification */
/* -------------------------------------------------------------------------- */

/// Map a provider HTTP status onto the backup failure taxonomy.
pub fn classify_status(status: StatusCode) -> BackupErrorKind {
    match status.as_u16() {
        401 | 403 => BackupErrorKind::Auth,
        _ => BackupErrorKind::Unknown,
    }
}

/* -------------------------------------------------------------------------- */
/* rusqlite::Error → EventTrackerError */
/* -------------------------------------------------------------------------- */

impl IntoEventTrackerError for SqlError {
    fn into_eventtracker(self) -> EventTrackerError {
        use rusqlite::ffi::ErrorCode;
        use rusqlite::Error as RE;

        match self {
            RE::SqliteFailure(err, maybe_message) => {
                let message = maybe_message.unwrap_or_default();
                match err.code {
                    ErrorCode::DatabaseBusy => {
                        EventTrackerError::Database("database is busy".into())
                    }
                    ErrorCode::DatabaseLocked => {
                        EventTrackerError::Database("database is locked".into())
                    }
                    ErrorCode::CannotOpen => {
                        EventTrackerError::File(format!("cannot open database file: {message}"))
                    }
                    ErrorCode::NotADatabase => {
                        EventTrackerError::File("file is not a database".into())
                    }
                    _ => EventTrackerError::Database(format!(
                        "sqlite failure {:?} (code {}): {}",
                        err.code, err.extended_code, message
                    )),
                }
            }
            RE::QueryReturnedNoRows => {
                EventTrackerError::NotFound("no rows returned by query".into())
            }
            RE::InvalidPath(path) => EventTrackerError::File(format!(
                "invalid database path: {}",
                path.to_string_lossy()
            )),
            other => EventTrackerError::Database(other.to_string()),
        }
    }
}

impl From<SqlError> for InfraError {
    fn from(value: SqlError) -> Self {
        InfraError(value.into_eventtracker())
    }
}

/* -------------------------------------------------------------------------- */
/* reqwest::Error → EventTrackerError */
/* -------------------------------------------------------------------------- */

impl IntoEventTrackerError for HttpError {
    fn into_eventtracker(self) -> EventTrackerError {
        if self.is_timeout() {
            return EventTrackerError::Network("HTTP request timed out".into());
        }

        if self.is_connect() {
            return EventTrackerError::Network("HTTP connection failure".into());
        }

        if let Some(status) = self.status() {
            let code = status.as_u16();
            let message =
                format!("HTTP {} {}", code, status.canonical_reason().unwrap_or("unknown status"));

            return match code {
                401 | 403 => EventTrackerError::Auth(message),
                404 => EventTrackerError::NotFound(message),
                _ => EventTrackerError::Internal(message),
            };
        }

        if self.is_request() || self.is_body() {
            return EventTrackerError::Network(self.to_string());
        }

        EventTrackerError::Internal(self.to_string())
    }
}

impl From<HttpError> for InfraError {
    fn from(value: HttpError) -> Self {
        InfraError(value.into_eventtracker())
    }
}

/* -------------------------------------------------------------------------- */
/* std::io, keychain and common errors → EventTrackerError */
/* -------------------------------------------------------------------------- */

impl From<std::io::Error> for InfraError {
    fn from(value: std::io::Error) -> Self {
        InfraError(EventTrackerError::File(value.to_string()))
    }
}

impl From<KeychainError> for InfraError {
    fn from(value: KeychainError) -> Self {
        InfraError(EventTrackerError::Security(value.to_string()))
    }
}

impl IntoEventTrackerError for CommonError {
    fn into_eventtracker(self) -> EventTrackerError {
        match self {
            CommonError::Persistence { .. } => EventTrackerError::File(self.to_string()),
            CommonError::Crypto { .. } | CommonError::Validation { .. } => {
                EventTrackerError::Security(self.to_string())
            }
        }
    }
}

impl From<CommonError> for InfraError {
    fn from(value: CommonError) -> Self {
        InfraError(value.into_eventtracker())
    }
}

/* -------------------------------------------------------------------------- */
/* TokenManagerError → EventTrackerError */
/* -------------------------------------------------------------------------- */

impl IntoEventTrackerError for TokenManagerError {
    fn into_eventtracker(self) -> EventTrackerError {
        match self {
            TokenManagerError::KeychainError(e) => EventTrackerError::Security(e.to_string()),
            TokenManagerError::OAuthError(OAuthClientError::RequestFailed(e)) => {
                e.into_eventtracker()
            }
            TokenManagerError::OAuthError(OAuthClientError::ConfigError(msg)) => {
                EventTrackerError::Config(msg)
            }
            TokenManagerError::OAuthError(e) => EventTrackerError::Auth(e.to_string()),
            TokenManagerError::InvalidRedirect(_) | TokenManagerError::MissingCode => {
                EventTrackerError::InvalidInput(self.to_string())
            }
            TokenManagerError::AuthorizationDenied { .. }
            | TokenManagerError::NoPendingAuthorization
            | TokenManagerError::MissingRefreshToken
            | TokenManagerError::NotAuthenticated => EventTrackerError::Auth(self.to_string()),
        }
    }
}

impl From<TokenManagerError> for InfraError {
    fn from(value: TokenManagerError) -> Self {
        InfraError(value.into_eventtracker())
    }
}

/* -------------------------------------------------------------------------- */
/* Tests */
/* -------------------------------------------------------------------------- */
