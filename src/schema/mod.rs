//! Schemas: opaque validate-and-coerce capabilities.
//!
//! A pipeline never looks inside a schema. It hands a value over and gets
//! back either the normalised value or a [`ValidationError`], which it
//! forwards untouched.
//!
//! Routes can be configured with a whole-value schema or with a plain list
//! of named fields. [`IntoSchema`] normalises both into one [`SharedSchema`]:
//!
//! ```rust
//! use conduit::schema::{self, IntoSchema};
//! use serde_json::json;
//!
//! // A field list becomes an object schema...
//! let params = [("id", schema::integer())].into_schema();
//! assert_eq!(params.parse(json!({"id": "5"})).unwrap(), json!({"id": 5}));
//!
//! // ...while a schema passes through unchanged.
//! let name = schema::string().into_schema();
//! assert!(name.parse(json!(42)).is_err());
//! ```

use std::sync::Arc;

use serde_json::Value;

mod object;
mod primitive;

pub use object::{Fields, object};
pub use primitive::{any, array, boolean, from_fn, integer, number, optional, string};

/// Validates a value and returns its normalised form.
///
/// Implementations must behave as pure functions: the same input always
/// yields the same output, with no side effects.
pub trait Schema: Send + Sync + 'static {
    fn parse(&self, value: Value) -> Result<Value, ValidationError>;
}

/// A schema shared between every invocation of a route.
pub type SharedSchema = Arc<dyn Schema>;

// ── Normalisation ─────────────────────────────────────────────────────────────

/// Conversion into a [`SharedSchema`].
///
/// Schemas pass through as they are. Field lists are combined with
/// [`object`].
pub trait IntoSchema {
    fn into_schema(self) -> SharedSchema;
}

impl IntoSchema for SharedSchema {
    fn into_schema(self) -> SharedSchema { self }
}

impl IntoSchema for Fields {
    fn into_schema(self) -> SharedSchema { object(self) }
}

impl<const N: usize> IntoSchema for [(&str, SharedSchema); N] {
    fn into_schema(self) -> SharedSchema { object(Fields::from(self)) }
}

impl IntoSchema for Vec<(&str, SharedSchema)> {
    fn into_schema(self) -> SharedSchema { object(self.into_iter().collect::<Fields>()) }
}

// ── ValidationError ───────────────────────────────────────────────────────────

/// One reason a value was rejected.
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
#[error("{}{message}", path_prefix(.path))]
pub struct Issue {
    /// Location inside the validated value. Empty means the value itself.
    pub path: Vec<String>,
    pub message: String,
}

impl Issue {
    pub fn new(message: impl Into<String>) -> Self {
        Self { path: Vec::new(), message: message.into() }
    }

    fn nested(mut self, segment: &str) -> Self {
        self.path.insert(0, segment.to_owned());
        self
    }
}

fn path_prefix(path: &[String]) -> String {
    if path.is_empty() { String::new() } else { format!("{}: ", path.join(".")) }
}

/// The error produced when a schema rejects a value.
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
#[error("{}", join_issues(.issues))]
pub struct ValidationError {
    issues: Vec<Issue>,
}

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self { issues: vec![Issue::new(message)] }
    }

    pub fn from_issues(issues: Vec<Issue>) -> Self {
        Self { issues }
    }

    pub fn issues(&self) -> &[Issue] { &self.issues }

    /// Prefixes every issue's path with `segment`.
    pub(crate) fn nested(self, segment: &str) -> Self {
        Self { issues: self.issues.into_iter().map(|i| i.nested(segment)).collect() }
    }
}

fn join_issues(issues: &[Issue]) -> String {
    issues.iter().map(Issue::to_string).collect::<Vec<_>>().join("; ")
}
