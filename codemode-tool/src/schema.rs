//! JSON Schema validation that collects every issue.
//!
//! Backed by `jsonschema`; each error becomes a [`ValidationIssue`] tagged
//! with the JSON pointer of the offending value. Missing and unexpected
//! properties get their own phrasing because callers build hints from it.

use codemode_types::ValidationIssue;
use jsonschema::error::ValidationErrorKind;
use serde_json::Value;

/// Validate `input` against `schema`, returning every issue found.
///
/// An empty result means the input is valid. A schema that does not compile
/// yields a single root-level issue naming the compile error.
#[must_use]
pub fn validate(input: &Value, schema: &Value) -> Vec<ValidationIssue> {
    let validator = match jsonschema::validator_for(schema) {
        Ok(validator) => validator,
        Err(e) => {
            tracing::warn!(error = %e, "tool input schema failed to compile");
            return vec![ValidationIssue::new("", format!("input schema is invalid: {e}"))];
        }
    };

    let mut issues = Vec::new();
    for error in validator.iter_errors(input) {
        let path = error.instance_path().to_string();
        match error.kind() {
            ValidationErrorKind::Required { property } => {
                let name = property.as_str().map_or_else(|| property.to_string(), str::to_string);
                issues.push(ValidationIssue::new(
                    path,
                    format!("missing required property '{name}'"),
                ));
            }
            ValidationErrorKind::AdditionalProperties { unexpected } => {
                issues.extend(unexpected.iter().map(|key| {
                    ValidationIssue::new(path.clone(), format!("unexpected property '{key}'"))
                }));
            }
            _ => issues.push(ValidationIssue::new(path, error.to_string())),
        }
    }
    issues
}
