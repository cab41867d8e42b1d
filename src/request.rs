//! Incoming HTTP request type.
//!
//! The router decodes the raw hyper request once, up front: the query
//! string, the route's path parameters and the body all become
//! [`serde_json::Value`]s so schemas can validate them uniformly.

use http::{HeaderMap, HeaderName, HeaderValue, Method, Uri, header};
use serde_json::{Map, Value};

use crate::error::HttpError;

/// An incoming HTTP request with its inputs decoded.
#[derive(Debug)]
pub struct Request {
    pub(crate) method: Method,
    pub(crate) uri: Uri,
    pub(crate) headers: HeaderMap,
    pub(crate) query: Value,
    pub(crate) params: Value,
    pub(crate) body: Value,
}

impl Request {
    /// A request with no headers, no path parameters and no body.
    /// The query is decoded from `uri`.
    ///
    /// ```rust
    /// use conduit::Request;
    /// use http::Method;
    /// use serde_json::json;
    ///
    /// let req = Request::new(Method::GET, "/users?limit=10".parse().unwrap());
    /// assert_eq!(req.query(), &json!({"limit": "10"}));
    /// ```
    pub fn new(method: Method, uri: Uri) -> Self {
        let query = decode_query(uri.query().unwrap_or(""));
        Self {
            method,
            uri,
            headers: HeaderMap::new(),
            query,
            params: Value::Object(Map::new()),
            body: Value::Null,
        }
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    /// Sets path parameters, as the router would after a match.
    pub fn with_params<K, V>(mut self, params: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.params = Value::Object(
            params.into_iter().map(|(k, v)| (k.into(), Value::String(v.into()))).collect(),
        );
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = body;
        self
    }

    pub(crate) fn from_parts(
        parts: http::request::Parts,
        params: Map<String, Value>,
        body: &[u8],
    ) -> Result<Self, HttpError> {
        let body = decode_body(&parts.headers, body)?;
        let query = decode_query(parts.uri.query().unwrap_or(""));
        Ok(Self {
            method: parts.method,
            uri: parts.uri,
            headers: parts.headers,
            query,
            params: Value::Object(params),
            body,
        })
    }

    pub fn method(&self) -> &Method { &self.method }
    pub fn uri(&self) -> &Uri { &self.uri }
    pub fn path(&self) -> &str { self.uri.path() }
    pub fn headers(&self) -> &HeaderMap { &self.headers }
    pub fn query(&self) -> &Value { &self.query }
    pub fn params(&self) -> &Value { &self.params }
    pub fn body(&self) -> &Value { &self.body }

    /// Header lookup. Non-UTF-8 values read as absent.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

// ── Decoding ──────────────────────────────────────────────────────────────────

/// `a=1&b=2&b=3` → `{"a": "1", "b": ["2", "3"]}`. Malformed input decodes
/// to an empty object; schemas decide whether that is acceptable.
fn decode_query(raw: &str) -> Value {
    let pairs: Vec<(String, String)> = serde_urlencoded::from_str(raw).unwrap_or_default();

    let mut map = Map::new();
    for (key, value) in pairs {
        match map.get_mut(&key) {
            Some(Value::Array(values)) => values.push(Value::String(value)),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, Value::String(value)]);
            }
            None => {
                map.insert(key, Value::String(value));
            }
        }
    }
    Value::Object(map)
}

fn decode_body(headers: &HeaderMap, bytes: &[u8]) -> Result<Value, HttpError> {
    if bytes.is_empty() {
        return Ok(Value::Null);
    }

    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    if content_type.contains("json") {
        serde_json::from_slice(bytes)
            .map_err(|e| HttpError::bad_request(format!("malformed JSON body: {e}")))
    } else if content_type.starts_with("application/x-www-form-urlencoded") {
        Ok(decode_query(&String::from_utf8_lossy(bytes)))
    } else {
        Ok(Value::String(String::from_utf8_lossy(bytes).into_owned()))
    }
}
