//! Errors raised by the stream cipher.
//!
//! Callers that wrap the cipher keep [`CommonError`] as a source:
//!
//! ```rust,ignore
//! #[derive(Debug, thiserror::Error)]
//! pub enum ArchiveError {
//!     #[error("Unknown archive member: {0}")]
//!     UnknownMember(String),
//!
//!     #[error(transparent)]
//!     Crypto(#[from] CommonError),
//! }
//! ```

use thiserror::Error;

pub type CommonResult<T> = Result<T, CommonError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommonError {
    /// Reading or writing the underlying stream failed
    #[error("I/O error: {message}")]
    Persistence { message: String },

    /// A segment failed to seal or authenticate, or the stream is truncated
    #[error("Cryptographic error during '{operation}': {message}")]
    Crypto { operation: String, message: String },

    /// The input is not a stream this cipher produced
    #[error("Validation error for field '{field}': {message}")]
    Validation { field: String, message: String },
}

impl CommonError {
    pub fn crypto(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Crypto { operation: operation.into(), message: message.into() }
    }

    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation { field: field.into(), message: message.into() }
    }
}

impl From<std::io::Error> for CommonError {
    fn from(err: std::io::Error) -> Self {
        Self::Persistence { message: err.to_string() }
    }
}
