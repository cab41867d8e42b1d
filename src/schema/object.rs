//! The `object` combinator.

use std::sync::Arc;

use serde_json::{Map, Value};

use super::{Schema, SharedSchema, ValidationError};

/// An ordered list of named field schemas.
#[derive(Clone, Default)]
pub struct Fields(Vec<(String, SharedSchema)>);

impl Fields {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Adds (or replaces) a field. Returns `self` for chaining.
    pub fn field(mut self, name: impl Into<String>, schema: SharedSchema) -> Self {
        let name = name.into();
        match self.0.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = schema,
            None => self.0.push((name, schema)),
        }
        self
    }

    pub fn len(&self) -> usize { self.0.len() }
    pub fn is_empty(&self) -> bool { self.0.is_empty() }
}

impl<'a> FromIterator<(&'a str, SharedSchema)> for Fields {
    fn from_iter<I: IntoIterator<Item = (&'a str, SharedSchema)>>(iter: I) -> Self {
        iter.into_iter().fold(Self::new(), |fields, (name, schema)| fields.field(name, schema))
    }
}

impl<const N: usize> From<[(&str, SharedSchema); N]> for Fields {
    fn from(fields: [(&str, SharedSchema); N]) -> Self {
        fields.into_iter().collect()
    }
}

/// Combines named field schemas into one object schema.
///
/// The input must be a JSON object. Each declared field is parsed on its
/// own (a missing field is parsed as `null`), undeclared keys are dropped,
/// and every failing field is reported with its path. A missing field whose
/// schema accepts `null` stays absent in the output.
pub fn object(fields: impl Into<Fields>) -> SharedSchema {
    Arc::new(ObjectSchema { fields: fields.into() })
}

struct ObjectSchema {
    fields: Fields,
}

impl Schema for ObjectSchema {
    fn parse(&self, value: Value) -> Result<Value, ValidationError> {
        let mut input = match value {
            Value::Object(map) => map,
            other => {
                return Err(ValidationError::new(format!("expected an object, got {}", kind(&other))));
            }
        };

        let mut output = Map::with_capacity(self.fields.len());
        let mut issues = Vec::new();

        for (name, schema) in &self.fields.0 {
            let present = input.contains_key(name);
            let raw = input.remove(name).unwrap_or(Value::Null);

            match schema.parse(raw) {
                Ok(Value::Null) if !present => {}
                Ok(parsed) => {
                    output.insert(name.clone(), parsed);
                }
                Err(err) => issues.extend(err.nested(name).issues().iter().cloned()),
            }
        }

        if issues.is_empty() {
            Ok(Value::Object(output))
        } else {
            Err(ValidationError::from_issues(issues))
        }
    }
}

pub(super) fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
