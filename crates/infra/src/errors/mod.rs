//! Infrastructure error conversions and backup failure classification.

mod conversions;

pub use conversions::{classify_status, InfraError};
