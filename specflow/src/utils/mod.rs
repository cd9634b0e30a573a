//! Utility functions shared across the crate.

mod paths;

pub use paths::{normalize_lexically, relative_slash_path};
