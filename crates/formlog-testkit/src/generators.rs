//! Proptest generators for property-based testing.

use proptest::prelude::*;
use serde_json::{json, Map, Value};

/// A non-empty username.
pub fn username() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9_.-]{1,24}".prop_map(String::from)
}

/// A non-empty description, including unicode and whitespace.
pub fn description() -> impl Strategy<Value = String> {
    "\\PC{1,80}".prop_map(String::from)
}

/// A GitHub handle, possibly empty.
pub fn github() -> impl Strategy<Value = String> {
    "[a-z0-9-]{0,20}".prop_map(String::from)
}

/// An arbitrary scalar JSON value for extra fields.
pub fn scalar() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(|n| json!(n)),
        "[a-z ]{0,16}".prop_map(Value::String),
    ]
}

/// Extra fields outside the schema.
pub fn extras() -> impl Strategy<Value = Vec<(String, Value)>> {
    prop::collection::vec(("x_[a-z]{1,8}", scalar()), 0..4)
}

/// Parameters for generating a valid document.
#[derive(Debug, Clone)]
pub struct DocumentParams {
    pub username: String,
    pub description: String,
    pub github: Option<String>,
    pub extras: Vec<(String, Value)>,
}

impl DocumentParams {
    /// The submission payload for these parameters.
    pub fn to_value(&self) -> Value {
        let mut map = Map::new();
        map.insert("username".into(), json!(self.username));
        map.insert("description".into(), json!(self.description));
        if let Some(github) = &self.github {
            map.insert("github".into(), json!(github));
        }
        for (key, value) in &self.extras {
            map.insert(key.clone(), value.clone());
        }
        Value::Object(map)
    }
}

impl Arbitrary for DocumentParams {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        (username(), description(), prop::option::of(github()), extras())
            .prop_map(|(username, description, github, extras)| DocumentParams {
                username,
                description,
                github,
                extras,
            })
            .boxed()
    }
}

/// A schema-valid submission payload.
pub fn valid_document() -> impl Strategy<Value = Value> {
    any::<DocumentParams>().prop_map(|p| p.to_value())
}

/// Something that is not a JSON object.
pub fn non_object() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(|n| json!(n)),
        "[a-z]{0,8}".prop_map(Value::String),
        prop::collection::vec(scalar(), 0..3).prop_map(Value::Array),
    ]
}

/// A payload that violates the schema in at least one way.
pub fn invalid_document() -> impl Strategy<Value = Value> {
    let broken_field = prop_oneof![
        Just("username"),
        Just("description"),
        Just("github"),
    ];
    let bad_value = prop_oneof![
        Just(None),
        Just(Some(Value::Null)),
        Just(Some(json!(""))),
        any::<i64>().prop_map(|n| Some(json!(n))),
        Just(Some(json!({"nested": true}))),
    ];

    prop_oneof![
        non_object(),
        (any::<DocumentParams>(), broken_field, bad_value).prop_filter_map(
            "github accepts empty strings and absence",
            |(params, field, bad)| {
                let mut value = params.to_value();
                let map = value.as_object_mut()?;
                match (field, bad) {
                    ("github", None) | ("github", Some(Value::String(_))) => return None,
                    (field, None) => {
                        map.remove(field);
                    }
                    (field, Some(bad)) => {
                        map.insert(field.to_string(), bad);
                    }
                }
                Some(value)
            }
        ),
    ]
}
