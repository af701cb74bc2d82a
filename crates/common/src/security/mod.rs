//! Security primitives and utilities
//!
//! Secret storage behind the [`CredentialStore`] trait, with the platform
//! keychain as the production backend.

pub mod keychain;
pub mod traits;

pub use keychain::{KeychainError, KeychainProvider};
pub use traits::{CredentialStore, SYMMETRIC_KEY_LEN};
