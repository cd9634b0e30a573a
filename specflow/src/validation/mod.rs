//! Schema validation of parsed spec bodies.

mod schema;

pub use schema::SchemaValidator;

use crate::errors::SpecError;
use std::fmt;

/// Checks a parsed spec body against a schema.
pub trait Validator: fmt::Debug + Send + Sync {
    /// Validates `body`, appending one [`SpecError`] per violation.
    ///
    /// Returns true if no violation was found.
    fn validate(&self, body: &serde_json::Value, errors: &mut Vec<SpecError>) -> bool;
}

/// A validator that accepts every body.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAllValidator;

impl Validator for AcceptAllValidator {
    fn validate(&self, _body: &serde_json::Value, _errors: &mut Vec<SpecError>) -> bool {
        true
    }
}
