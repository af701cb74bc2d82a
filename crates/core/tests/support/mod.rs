//! Shared test helpers for `eventtracker-core` integration tests.
//!
//! Lightweight in-memory implementations of the backup ports so the
//! orchestrator tests can focus on behaviour instead of boilerplate.

pub mod backup;
