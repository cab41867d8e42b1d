//! Per-invocation request context.
//!
//! A [`Context`] is an open map of named values built from the request.
//! It starts with three fields: `query`, `params` and `body`. Middleware
//! extends it by returning a [`Delta`]; validation replaces the three
//! request fields with their parsed forms. Handlers read fields by name,
//! with explicit presence and type checks:
//!
//! ```rust
//! use conduit::{Context, Delta, Request};
//! use http::Method;
//! use serde::Deserialize;
//! use serde_json::json;
//!
//! #[derive(Deserialize)]
//! struct User { id: u64 }
//!
//! let mut ctx = Context::new(Request::new(Method::GET, "/".parse().unwrap()));
//! ctx.merge(Delta::new().set("user", json!({"id": 1})));
//!
//! let user: User = ctx.get_as("user").unwrap();
//! assert_eq!(user.id, 1);
//! assert!(ctx.get_as::<User>("session").is_err());
//! ```

use http::{HeaderMap, Method, Uri};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::error::ContextError;
use crate::request::Request;

pub const QUERY: &str = "query";
pub const PARAMS: &str = "params";
pub const BODY: &str = "body";

static NULL: Value = Value::Null;

/// The request context one invocation works on.
#[derive(Debug)]
pub struct Context {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    fields: Map<String, Value>,
}

impl Context {
    pub fn new(request: Request) -> Self {
        let mut fields = Map::new();
        fields.insert(QUERY.to_owned(), request.query);
        fields.insert(PARAMS.to_owned(), request.params);
        fields.insert(BODY.to_owned(), request.body);

        Self { method: request.method, uri: request.uri, headers: request.headers, fields }
    }

    pub fn method(&self) -> &Method { &self.method }
    pub fn uri(&self) -> &Uri { &self.uri }
    pub fn path(&self) -> &str { self.uri.path() }
    pub fn headers(&self) -> &HeaderMap { &self.headers }

    /// Header lookup. Non-UTF-8 values read as absent.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn query(&self) -> &Value { self.field(QUERY) }
    pub fn params(&self) -> &Value { self.field(PARAMS) }
    pub fn body(&self) -> &Value { self.field(BODY) }

    /// A single path parameter, e.g. `ctx.param("id")` on `/users/{id}`.
    pub fn param(&self, name: &str) -> Option<&Value> {
        self.params().get(name)
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Reads a field and deserialises it into `T`.
    pub fn get_as<T: DeserializeOwned>(&self, name: &str) -> Result<T, ContextError> {
        let value = self.fields.get(name).ok_or_else(|| ContextError::Missing(name.to_owned()))?;
        T::deserialize(value).map_err(|source| ContextError::Type { field: name.to_owned(), source })
    }

    /// Adds or replaces every field in `delta`.
    pub fn merge(&mut self, delta: Delta) {
        self.fields.extend(delta.0);
    }

    pub(crate) fn take(&mut self, name: &str) -> Value {
        self.fields.get_mut(name).map(Value::take).unwrap_or(Value::Null)
    }

    pub(crate) fn insert(&mut self, name: &str, value: Value) {
        self.fields.insert(name.to_owned(), value);
    }

    fn field(&self, name: &str) -> &Value {
        self.fields.get(name).unwrap_or(&NULL)
    }
}

// ── Delta ─────────────────────────────────────────────────────────────────────

/// Named fields a middleware step adds to (or replaces in) the context.
///
/// An empty delta leaves the context unchanged.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Delta(Map<String, Value>);

impl Delta {
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Sets a field. Returns `self` for chaining.
    pub fn set(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(name.into(), value.into());
        self
    }

    pub fn is_empty(&self) -> bool { self.0.is_empty() }
    pub fn len(&self) -> usize { self.0.len() }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

impl From<Map<String, Value>> for Delta {
    fn from(fields: Map<String, Value>) -> Self {
        Self(fields)
    }
}
