//! Shared cryptographic primitives used across runtime and platform features.

pub mod encryption;

pub use encryption::{SegmentedCipher, KEY_LEN as SEGMENTED_KEY_LEN};
