//! Crontab trigger normalization.

use super::PipelineSpec;
use crate::errors::SpecError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;

/// One comma-list element: `*`, `n` or `a-b`, optionally followed by `/step`.
#[allow(clippy::expect_used)]
static FIELD_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\*|\d+(?:-\d+)?)(?:/(\d+))?$").expect("constant regex pattern is valid")
});

/// Normalized crontab fields of a pipeline trigger.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Schedule {
    /// Minute field (0-59).
    pub minute: String,
    /// Hour field (0-23).
    pub hour: String,
    /// Day of month field (1-31).
    pub day_of_month: String,
    /// Month field (1-12).
    pub month: String,
    /// Day of week field (0-7, both 0 and 7 are Sunday).
    pub day_of_week: String,
}

impl Schedule {
    /// Parses a 5-field crontab expression or one of the `@` macros.
    ///
    /// # Errors
    ///
    /// Returns a message describing the first offending field.
    pub fn parse(expression: &str) -> Result<Self, String> {
        let expression = expression.trim();
        let expanded = match expression {
            "@yearly" | "@annually" => "0 0 1 1 *",
            "@monthly" => "0 0 1 * *",
            "@weekly" => "0 0 * * 0",
            "@daily" | "@midnight" => "0 0 * * *",
            "@hourly" => "0 * * * *",
            other if other.starts_with('@') => {
                return Err(format!("unknown schedule macro '{other}'"));
            }
            other => other,
        };

        let fields: Vec<&str> = expanded.split_whitespace().collect();
        if fields.len() != 5 {
            return Err(format!(
                "expected 5 crontab fields, found {} in '{expression}'",
                fields.len()
            ));
        }

        let names = ["minute", "hour", "day_of_month", "month", "day_of_week"];
        let bounds = [(0, 59), (0, 23), (1, 31), (1, 12), (0, 7)];
        for ((field, name), (min, max)) in fields.iter().zip(names).zip(bounds) {
            check_field(field, min, max).map_err(|reason| format!("invalid {name} field '{field}': {reason}"))?;
        }

        Ok(Self {
            minute: fields[0].to_string(),
            hour: fields[1].to_string(),
            day_of_month: fields[2].to_string(),
            month: fields[3].to_string(),
            day_of_week: fields[4].to_string(),
        })
    }

    /// Converts to the JSON object stored in a normalized spec body.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "minute": self.minute,
            "hour": self.hour,
            "day_of_month": self.day_of_month,
            "month": self.month,
            "day_of_week": self.day_of_week,
        })
    }
}

impl fmt::Display for Schedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {} {}",
            self.minute, self.hour, self.day_of_month, self.month, self.day_of_week
        )
    }
}

/// Parses the body's `schedule` expression into [`PipelineSpec::schedule`].
///
/// On success the body field is replaced by its normalized object form; a
/// malformed expression appends a validation error and leaves the body as is.
pub fn normalize_schedule(spec: &mut PipelineSpec) {
    let Some(expression) = spec
        .body
        .as_ref()
        .and_then(|body| body.get("schedule"))
        .and_then(serde_json::Value::as_str)
        .map(str::to_string)
    else {
        return;
    };

    match Schedule::parse(&expression) {
        Ok(schedule) => {
            if let Some(serde_json::Value::Object(body)) = spec.body.as_mut() {
                body.insert("schedule".to_string(), schedule.to_json());
            }
            spec.schedule = Some(schedule);
        }
        Err(message) => {
            let error = SpecError::validation(message)
                .with_context("field", "schedule")
                .with_context("pipeline", spec.pipeline_id.clone());
            spec.push_error(error);
        }
    }
}

fn check_field(field: &str, min: u32, max: u32) -> Result<(), String> {
    for part in field.split(',') {
        let caps = FIELD_PATTERN
            .captures(part)
            .ok_or_else(|| format!("'{part}' is not a value, range or step"))?;

        if let Some(step) = caps.get(2) {
            let step: u32 = step.as_str().parse().map_err(|_| format!("step '{}' is too large", step.as_str()))?;
            if step == 0 {
                return Err("step must be greater than zero".to_string());
            }
        }

        let base = &caps[1];
        if base == "*" {
            continue;
        }
        let (lo, hi) = match base.split_once('-') {
            Some((lo, hi)) => (parse_bound(lo)?, parse_bound(hi)?),
            None => {
                let value = parse_bound(base)?;
                (value, value)
            }
        };
        if lo < min || hi > max {
            return Err(format!("values must be within {min}-{max}"));
        }
        if lo > hi {
            return Err(format!("range {lo}-{hi} is reversed"));
        }
    }
    Ok(())
}

fn parse_bound(value: &str) -> Result<u32, String> {
    value.parse().map_err(|_| format!("'{value}' is out of range"))
}
