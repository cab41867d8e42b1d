//! Atomic schemas.
//!
//! Scalars coerce the string forms that arrive in query strings and path
//! parameters: `"5"` parses as an integer, `"true"` as a boolean.

use std::sync::Arc;

use serde_json::{Number, Value};

use super::object::kind;
use super::{Schema, SharedSchema, ValidationError};

/// Wraps a closure as a schema.
///
/// ```rust
/// use conduit::schema::{self, ValidationError};
/// use serde_json::{json, Value};
///
/// let even = schema::from_fn(|v: Value| match v.as_i64() {
///     Some(n) if n % 2 == 0 => Ok(v),
///     _ => Err(ValidationError::new("expected an even number")),
/// });
///
/// assert!(even.parse(json!(4)).is_ok());
/// assert!(even.parse(json!(3)).is_err());
/// ```
pub fn from_fn<F>(f: F) -> SharedSchema
where
    F: Fn(Value) -> Result<Value, ValidationError> + Send + Sync + 'static,
{
    Arc::new(FnSchema(f))
}

struct FnSchema<F>(F);

impl<F> Schema for FnSchema<F>
where
    F: Fn(Value) -> Result<Value, ValidationError> + Send + Sync + 'static,
{
    fn parse(&self, value: Value) -> Result<Value, ValidationError> {
        (self.0)(value)
    }
}

/// Accepts anything.
pub fn any() -> SharedSchema {
    from_fn(Ok)
}

/// Accepts strings only.
pub fn string() -> SharedSchema {
    from_fn(|value| match value {
        Value::String(_) => Ok(value),
        other => Err(expected("a string", &other)),
    })
}

/// Accepts integral numbers and strings that parse as `i64`.
pub fn integer() -> SharedSchema {
    from_fn(|value| {
        let parsed = match &value {
            Value::Number(n) if n.is_i64() || n.is_u64() => Some(Value::Number(n.clone())),
            Value::Number(n) => n
                .as_f64()
                .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
                .map(|f| Value::from(f as i64)),
            Value::String(s) => s.trim().parse::<i64>().ok().map(Value::from),
            _ => None,
        };
        parsed.ok_or_else(|| expected("an integer", &value))
    })
}

/// Accepts finite numbers and strings that parse as `f64`.
pub fn number() -> SharedSchema {
    from_fn(|value| {
        let parsed = match &value {
            Value::Number(n) => Some(Value::Number(n.clone())),
            Value::String(s) => s.trim().parse::<f64>().ok().and_then(Number::from_f64).map(Value::Number),
            _ => None,
        };
        parsed.ok_or_else(|| expected("a number", &value))
    })
}

/// Accepts booleans and the strings `"true"` / `"false"`.
pub fn boolean() -> SharedSchema {
    from_fn(|value| {
        let parsed = match &value {
            Value::Bool(b) => Some(*b),
            Value::String(s) if s == "true" => Some(true),
            Value::String(s) if s == "false" => Some(false),
            _ => None,
        };
        parsed.map(Value::Bool).ok_or_else(|| expected("a boolean", &value))
    })
}

/// Lets `null` through; anything else must satisfy `inner`.
pub fn optional(inner: SharedSchema) -> SharedSchema {
    from_fn(move |value| match value {
        Value::Null => Ok(Value::Null),
        other => inner.parse(other),
    })
}

/// Accepts arrays whose every element satisfies `item`.
pub fn array(item: SharedSchema) -> SharedSchema {
    from_fn(move |value| {
        let elements = match value {
            Value::Array(elements) => elements,
            other => return Err(expected("an array", &other)),
        };

        let mut parsed = Vec::with_capacity(elements.len());
        let mut issues = Vec::new();
        for (index, element) in elements.into_iter().enumerate() {
            match item.parse(element) {
                Ok(v) => parsed.push(v),
                Err(err) => issues.extend_from_slice(err.nested(&index.to_string()).issues()),
            }
        }

        if issues.is_empty() {
            Ok(Value::Array(parsed))
        } else {
            Err(ValidationError::from_issues(issues))
        }
    })
}

fn expected(what: &str, got: &Value) -> ValidationError {
    ValidationError::new(format!("expected {what}, got {}", kind(got)))
}
