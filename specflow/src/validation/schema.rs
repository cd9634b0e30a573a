//! Default structural schema for pipeline bodies.

use super::Validator;
use crate::errors::SpecError;
use serde_json::Value;
use std::collections::HashSet;

const ALLOWED_KEYS: &[&str] = &[
    "name",
    "description",
    "steps",
    "schedule",
    "depends_on",
    "parameters",
    "env",
];

const STEP_KEYS: &[&str] = &["name", "executor", "script", "env", "description"];

/// Validates the structure of pipeline bodies.
///
/// Every violation is reported; validation does not stop at the first one.
#[derive(Debug, Clone, Default)]
pub struct SchemaValidator {
    allow_unknown_keys: bool,
}

impl SchemaValidator {
    /// Creates a strict validator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Accepts top-level and step keys outside the schema.
    #[must_use]
    pub fn allow_unknown_keys(mut self) -> Self {
        self.allow_unknown_keys = true;
        self
    }

    fn check_unknown_keys(&self, scope: &str, obj: &serde_json::Map<String, Value>, allowed: &[&str], errors: &mut Vec<SpecError>) {
        if self.allow_unknown_keys {
            return;
        }
        for key in obj.keys().filter(|k| !allowed.contains(&k.as_str())) {
            errors.push(violation(format!("{scope}unknown field '{key}'"), key));
        }
    }

    fn check_steps(&self, steps: Option<&Value>, errors: &mut Vec<SpecError>) {
        let steps = match steps {
            None => {
                errors.push(violation("missing required field 'steps'", "steps"));
                return;
            }
            Some(Value::Array(steps)) => steps,
            Some(_) => {
                errors.push(violation("'steps' must be a list", "steps"));
                return;
            }
        };
        if steps.is_empty() {
            errors.push(violation("'steps' must not be empty", "steps"));
            return;
        }

        let mut seen = HashSet::new();
        for (idx, step) in steps.iter().enumerate() {
            let field = format!("steps[{idx}]");
            let Value::Object(step) = step else {
                errors.push(violation(format!("{field} must be a table"), &field));
                continue;
            };

            match step.get("name").and_then(Value::as_str) {
                Some(name) if !name.trim().is_empty() => {
                    if !seen.insert(name.to_string()) {
                        errors.push(violation(format!("duplicate step name '{name}'"), format!("{field}.name")));
                    }
                }
                _ => errors.push(violation(format!("{field}.name must be a non-empty string"), format!("{field}.name"))),
            }

            for key in ["executor", "script"] {
                if step.get(key).is_some_and(|v| !v.is_string()) {
                    errors.push(violation(format!("{field}.{key} must be a string"), format!("{field}.{key}")));
                }
            }
            if let Some(env) = step.get("env") {
                check_string_table(&format!("{field}.env"), env, errors);
            }
            self.check_unknown_keys(&format!("{field}: "), step, STEP_KEYS, errors);
        }
    }
}

impl Validator for SchemaValidator {
    fn validate(&self, body: &Value, errors: &mut Vec<SpecError>) -> bool {
        let before = errors.len();

        let Value::Object(obj) = body else {
            errors.push(violation("pipeline body must be a table", "$"));
            return false;
        };

        self.check_unknown_keys("", obj, ALLOWED_KEYS, errors);
        self.check_steps(obj.get("steps"), errors);

        for key in ["name", "description", "schedule"] {
            if obj.get(key).is_some_and(|v| !v.is_string()) {
                errors.push(violation(format!("'{key}' must be a string"), key));
            }
        }
        match obj.get("depends_on") {
            None => {}
            Some(Value::Array(refs)) => {
                for (idx, reference) in refs.iter().enumerate() {
                    if !reference.as_str().is_some_and(|s| !s.is_empty()) {
                        errors.push(violation(
                            format!("depends_on[{idx}] must be a non-empty string"),
                            format!("depends_on[{idx}]"),
                        ));
                    }
                }
            }
            Some(_) => errors.push(violation("'depends_on' must be a list", "depends_on")),
        }
        if let Some(env) = obj.get("env") {
            check_string_table("env", env, errors);
        }
        if obj.get("parameters").is_some_and(|v| !v.is_object()) {
            errors.push(violation("'parameters' must be a table", "parameters"));
        }

        errors.len() == before
    }
}

fn check_string_table(field: &str, value: &Value, errors: &mut Vec<SpecError>) {
    match value {
        Value::Object(map) => {
            for (key, v) in map {
                if !v.is_string() {
                    errors.push(violation(format!("{field}.{key} must be a string"), format!("{field}.{key}")));
                }
            }
        }
        _ => errors.push(violation(format!("'{field}' must be a table of strings"), field)),
    }
}

fn violation(message: impl Into<String>, field: impl Into<String>) -> SpecError {
    SpecError::validation(message).with_context("field", field)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::SpecErrorKind;
    use serde_json::json;

    fn run(body: Value) -> (bool, Vec<SpecError>) {
        let mut errors = Vec::new();
        let ok = SchemaValidator::new().validate(&body, &mut errors);
        (ok, errors)
    }

    #[test]
    fn test_valid_body() {
        let (ok, errors) = run(json!({
            "name": "ingest",
            "schedule": "@daily",
            "depends_on": ["raw"],
            "env": {"STAGE": "prod"},
            "steps": [{"name": "load", "script": "load.py", "env": {"A": "1"}}],
        }));
        assert!(ok, "{errors:?}");
        assert!(errors.is_empty());
    }

    #[test]
    fn test_missing_steps() {
        let (ok, errors) = run(json!({"name": "x"}));
        assert!(!ok);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, SpecErrorKind::ValidationError);
        assert_eq!(errors[0].context["field"], "steps");
    }

    #[test]
    fn test_reports_every_violation() {
        let (ok, errors) = run(json!({
            "steps": [{"name": "a"}, {"name": "a"}, {"executor": 3}, "oops"],
            "schedule": 5,
            "depends_on": "raw",
            "colour": "blue",
        }));
        assert!(!ok);
        let messages: Vec<_> = errors.iter().map(|e| e.message.as_str()).collect();
        assert!(messages.contains(&"unknown field 'colour'"));
        assert!(messages.contains(&"duplicate step name 'a'"));
        assert!(messages.contains(&"steps[2].name must be a non-empty string"));
        assert!(messages.contains(&"steps[2].executor must be a string"));
        assert!(messages.contains(&"steps[3] must be a table"));
        assert!(messages.contains(&"'schedule' must be a string"));
        assert!(messages.contains(&"'depends_on' must be a list"));
    }

    #[test]
    fn test_non_table_body() {
        let (ok, errors) = run(json!("steps"));
        assert!(!ok);
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn test_errors_are_appended() {
        let mut errors = vec![SpecError::parse("earlier")];
        let ok = SchemaValidator::new().validate(&json!({}), &mut errors);
        assert!(!ok);
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].message, "earlier");
    }

    #[test]
    fn test_allow_unknown_keys() {
        let mut errors = Vec::new();
        let ok = SchemaValidator::new()
            .allow_unknown_keys()
            .validate(&json!({"steps": [{"name": "a", "retries": 3}], "owner": "data"}), &mut errors);
        assert!(ok, "{errors:?}");
    }
}
