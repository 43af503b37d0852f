//! Schema validation for submitted documents.
//!
//! The schema is fixed:
//!
//! | field         | type   | rule                    |
//! |---------------|--------|-------------------------|
//! | `username`    | string | required, non-empty     |
//! | `description` | string | required, non-empty     |
//! | `github`      | string | optional, may be empty  |
//!
//! Any other field is accepted and preserved untouched.

use std::fmt;

use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

use crate::error::ValidationError;
use crate::types::Document;

/// Required, non-empty string field.
pub const USERNAME: &str = "username";
/// Required, non-empty string field.
pub const DESCRIPTION: &str = "description";
/// Optional string field.
pub const GITHUB: &str = "github";

/// What was wrong with a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Violation {
    /// The document itself is not a JSON object.
    NotAnObject,
    /// A required field is absent (or `null`).
    Missing,
    /// The field is present but not a string.
    NotAString,
    /// A required string is empty.
    Empty,
}

impl Violation {
    /// Human-readable reason, used on the wire.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Violation::NotAnObject => "must be an object",
            Violation::Missing => "is required",
            Violation::NotAString => "must be a string",
            Violation::Empty => "must not be empty",
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Violation {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// A single schema violation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    /// Field name; empty for the document root.
    pub field: String,
    /// Why the field was rejected.
    pub reason: Violation,
}

impl FieldError {
    /// Create a new field error.
    pub fn new(field: impl Into<String>, reason: Violation) -> Self {
        Self {
            field: field.into(),
            reason,
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.field.is_empty() {
            write!(f, "document {}", self.reason)
        } else {
            write!(f, "{} {}", self.field, self.reason)
        }
    }
}

/// Outcome of validating a candidate document.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationResult {
    /// The candidate, returned untouched.
    value: Value,
    /// All violations, in schema order. Empty means valid.
    errors: Vec<FieldError>,
}

impl ValidationResult {
    /// Whether the candidate satisfies the schema.
    pub fn ok(&self) -> bool {
        self.errors.is_empty()
    }

    /// The violations found.
    pub fn errors(&self) -> &[FieldError] {
        &self.errors
    }

    /// Turn the result into a [`Document`] or the collected errors.
    pub fn into_document(self) -> Result<Document, ValidationError> {
        if !self.errors.is_empty() {
            return Err(ValidationError(self.errors));
        }
        match self.value {
            Value::Object(map) => Ok(Document::from_validated(map)),
            // validate() always reports non-objects.
            _ => Err(ValidationError(vec![FieldError::new(
                "",
                Violation::NotAnObject,
            )])),
        }
    }
}

/// Validate a candidate document against the schema.
///
/// Collects every violation in one pass instead of stopping at the first,
/// so callers can report everything at once. Pure and reentrant.
pub fn validate(value: Value) -> ValidationResult {
    let mut errors = Vec::new();

    match &value {
        Value::Object(map) => {
            check_required_string(map, USERNAME, &mut errors);
            check_required_string(map, DESCRIPTION, &mut errors);
            check_optional_string(map, GITHUB, &mut errors);
        }
        _ => errors.push(FieldError::new("", Violation::NotAnObject)),
    }

    ValidationResult { value, errors }
}

fn check_required_string(map: &Map<String, Value>, field: &str, errors: &mut Vec<FieldError>) {
    match map.get(field) {
        None | Some(Value::Null) => errors.push(FieldError::new(field, Violation::Missing)),
        Some(Value::String(s)) if s.is_empty() => {
            errors.push(FieldError::new(field, Violation::Empty))
        }
        Some(Value::String(_)) => {}
        Some(_) => errors.push(FieldError::new(field, Violation::NotAString)),
    }
}

fn check_optional_string(map: &Map<String, Value>, field: &str, errors: &mut Vec<FieldError>) {
    match map.get(field) {
        None | Some(Value::String(_)) => {}
        Some(_) => errors.push(FieldError::new(field, Violation::NotAString)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn test_valid_minimal_document() {
        let result = validate(json!({"username": "alice", "description": "hello"}));
        assert!(result.ok());
        let doc = result.into_document().unwrap();
        assert_eq!(doc.username(), "alice");
        assert_eq!(doc.github(), None);
    }

    #[test]
    fn test_empty_github_is_allowed() {
        let result = validate(json!({"username": "a", "description": "b", "github": ""}));
        assert!(result.ok());
    }

    #[test]
    fn test_missing_username() {
        let result = validate(json!({"description": "missing username"}));
        assert_eq!(
            result.errors(),
            &[FieldError::new(USERNAME, Violation::Missing)]
        );
    }

    #[test]
    fn test_collects_all_violations_in_order() {
        let result = validate(json!({"username": "", "description": 5, "github": false}));
        assert_eq!(
            result.errors(),
            &[
                FieldError::new(USERNAME, Violation::Empty),
                FieldError::new(DESCRIPTION, Violation::NotAString),
                FieldError::new(GITHUB, Violation::NotAString),
            ]
        );
    }

    #[test]
    fn test_null_counts_as_missing() {
        let result = validate(json!({"username": null, "description": "x"}));
        assert_eq!(
            result.errors(),
            &[FieldError::new(USERNAME, Violation::Missing)]
        );
    }

    #[test]
    fn test_non_object_rejected() {
        for value in [json!([1, 2]), json!("text"), json!(null), json!(3)] {
            let result = validate(value);
            assert_eq!(result.errors(), &[FieldError::new("", Violation::NotAnObject)]);
            assert!(result.into_document().is_err());
        }
    }

    #[test]
    fn test_extra_fields_preserved_in_order() {
        let doc = validate(json!({
            "zeta": 1,
            "username": "bob",
            "description": "d",
            "alpha": {"nested": true}
        }))
        .into_document()
        .unwrap();

        let keys: Vec<&str> = doc.as_map().keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["zeta", "username", "description", "alpha"]);
    }

    #[test]
    fn test_field_error_serializes_reason_text() {
        let json = serde_json::to_value(FieldError::new(USERNAME, Violation::Missing)).unwrap();
        assert_eq!(json, json!({"field": "username", "reason": "is required"}));
    }

    proptest! {
        #[test]
        fn non_empty_strings_always_validate(
            username in ".{1,32}",
            description in ".{1,64}",
            github in proptest::option::of(".{0,16}"),
        ) {
            let mut value = json!({"username": username, "description": description});
            if let Some(g) = github {
                value["github"] = json!(g);
            }
            prop_assert!(validate(value).ok());
        }

        #[test]
        fn error_order_is_deterministic(username in any::<Option<bool>>(), github in any::<bool>()) {
            let mut value = json!({"description": ""});
            if let Some(flag) = username {
                value["username"] = json!(flag);
            }
            if github {
                value["github"] = json!(42);
            }
            let fields: Vec<String> = validate(value)
                .errors()
                .iter()
                .map(|e| e.field.clone())
                .collect();
            let mut expected = vec![USERNAME.to_string(), DESCRIPTION.to_string()];
            if github {
                expected.push(GITHUB.to_string());
            }
            prop_assert_eq!(fields, expected);
        }
    }
}
