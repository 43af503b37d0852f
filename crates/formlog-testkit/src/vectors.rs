//! Named document vectors with their expected validation outcome.
//!
//! These pin down the schema's edge cases so every layer (validator,
//! dispatcher, transports) can be checked against the same table.

use formlog_core::validate;
use serde_json::Value;

/// A named candidate document.
#[derive(Debug, Clone)]
pub struct DocumentVector {
    /// Human-readable name for the vector.
    pub name: &'static str,
    /// The candidate, as JSON text.
    pub json: &'static str,
    /// Fields the validator must report. Empty means the document is valid.
    pub rejected_fields: &'static [&'static str],
}

impl DocumentVector {
    /// Parse the candidate.
    pub fn value(&self) -> Value {
        serde_json::from_str(self.json).expect("vector JSON is well formed")
    }

    pub fn is_valid(&self) -> bool {
        self.rejected_fields.is_empty()
    }
}

/// Get all document vectors.
pub fn all_vectors() -> Vec<DocumentVector> {
    vec![
        DocumentVector {
            name: "minimal valid",
            json: r#"{"username":"alice","description":"hello"}"#,
            rejected_fields: &[],
        },
        DocumentVector {
            name: "with github",
            json: r#"{"username":"bob","description":"builds things","github":"bob"}"#,
            rejected_fields: &[],
        },
        DocumentVector {
            name: "empty github is allowed",
            json: r#"{"username":"carol","description":"x","github":""}"#,
            rejected_fields: &[],
        },
        DocumentVector {
            name: "extra fields are preserved",
            json: r#"{"username":"dave","description":"x","team":"blue","age":7}"#,
            rejected_fields: &[],
        },
        DocumentVector {
            name: "missing username",
            json: r#"{"description":"no name"}"#,
            rejected_fields: &["username"],
        },
        DocumentVector {
            name: "empty username",
            json: r#"{"username":"","description":"x"}"#,
            rejected_fields: &["username"],
        },
        DocumentVector {
            name: "null description",
            json: r#"{"username":"erin","description":null}"#,
            rejected_fields: &["description"],
        },
        DocumentVector {
            name: "numeric github",
            json: r#"{"username":"frank","description":"x","github":42}"#,
            rejected_fields: &["github"],
        },
        DocumentVector {
            name: "everything wrong",
            json: r#"{"username":1,"description":"","github":false}"#,
            rejected_fields: &["username", "description", "github"],
        },
        DocumentVector {
            name: "empty object",
            json: r#"{}"#,
            rejected_fields: &["username", "description"],
        },
        DocumentVector {
            name: "array is not a document",
            json: r#"["username","description"]"#,
            rejected_fields: &[""],
        },
    ]
}

/// Check every vector against the validator.
///
/// Returns the names and details of the vectors that disagree.
pub fn verify_all_vectors() -> Result<(), Vec<String>> {
    let failures: Vec<String> = all_vectors()
        .into_iter()
        .filter_map(|vector| {
            let result = validate(vector.value());
            let reported: Vec<&str> = result.errors().iter().map(|e| e.field.as_str()).collect();
            if reported == vector.rejected_fields {
                None
            } else {
                Some(format!(
                    "{}: expected {:?}, got {:?}",
                    vector.name, vector.rejected_fields, reported
                ))
            }
        })
        .collect();

    if failures.is_empty() {
        Ok(())
    } else {
        Err(failures)
    }
}
