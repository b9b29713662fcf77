//! Shared utilities.
//!
//! Content hashing, atomic file writes and test helpers.

pub mod fs;
pub mod hash;
