//! Observability: structured logging setup.

pub mod logging;

pub use logging::{init_tracing, LogFormat, DEFAULT_LOG_FILTER};
