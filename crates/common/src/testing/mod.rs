//! Testing utilities and helpers
//!
//! - **[`mocks`]**: in-memory credential store and scripted OAuth client
//! - **[`time`]**: manually advanced wall clock
//!
//! ## Usage
//!
//! ```ignore
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use eventtracker_common::auth::Clock;
//! use eventtracker_common::testing::MockClock;
//!
//! let clock = Arc::new(MockClock::new(1_000));
//! clock.advance(Duration::from_secs(5));
//! assert_eq!(clock.now_millis(), 6_000);
//! ```

pub mod mocks;
pub mod time;

pub use mocks::{MockKeychainProvider, MockOAuthClient};
pub use time::MockClock;
