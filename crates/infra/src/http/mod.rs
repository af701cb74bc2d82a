//! HTTP transport and error classification for the Dropbox adapter.

pub mod client;
pub mod error;

pub use client::HttpClient;
pub use error::RemoteError;
