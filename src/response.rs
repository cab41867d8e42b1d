//! Outgoing HTTP response type.
//!
//! A [`Response`] starts empty (`200 OK`, no body) and is filled in by
//! exactly one operation that matters: [`Response::send`]. Pipelines wrap
//! that operation for the length of one invocation; see [`Reply`].
//!
//! [`Reply`]: crate::Reply

use bytes::Bytes;
use http::{HeaderMap, HeaderName, HeaderValue, StatusCode, header};
use http_body_util::Full;
use serde_json::{Value, json};
use tracing::warn;

/// An outgoing HTTP response.
///
/// ```rust
/// use conduit::Response;
/// use serde_json::json;
///
/// let mut res = Response::new();
/// assert!(!res.is_sent());
///
/// res.send(&json!({"id": 1}));
/// assert_eq!(res.payload(), Some(json!({"id": 1})));
/// ```
#[derive(Debug)]
pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
    body: Option<Bytes>,
}

impl Response {
    pub fn new() -> Self {
        Self { status: StatusCode::OK, headers: HeaderMap::new(), body: None }
    }

    /// An error envelope: `{"error": message}` with the given status.
    pub fn error(status: StatusCode, message: &str) -> Self {
        let mut res = Self::new();
        res.set_status(status);
        res.send(&json!({ "error": message }));
        res
    }

    pub fn status(&self) -> StatusCode { self.status }
    pub fn headers(&self) -> &HeaderMap { &self.headers }

    pub fn set_status(&mut self, status: StatusCode) {
        self.status = status;
    }

    pub fn insert_header(&mut self, name: HeaderName, value: HeaderValue) {
        self.headers.insert(name, value);
    }

    /// Transmits `payload` as the JSON body.
    ///
    /// `null` transmits an empty body. Sending twice keeps the last payload.
    pub fn send(&mut self, payload: &Value) {
        if self.body.is_some() {
            warn!(status = %self.status, "response already sent, replacing payload");
        }

        if payload.is_null() {
            self.headers.remove(header::CONTENT_TYPE);
            self.body = Some(Bytes::new());
        } else {
            self.headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
            self.body = Some(Bytes::from(payload.to_string()));
        }
    }

    pub fn is_sent(&self) -> bool {
        self.body.is_some()
    }

    /// The raw transmitted body, if anything was sent.
    pub fn body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    /// The transmitted body read back as JSON. `None` if nothing was sent;
    /// an empty body reads as `null`.
    pub fn payload(&self) -> Option<Value> {
        let body = self.body.as_ref()?;
        if body.is_empty() {
            return Some(Value::Null);
        }
        serde_json::from_slice(body).ok()
    }

    pub(crate) fn into_http(self) -> http::Response<Full<Bytes>> {
        let mut res = http::Response::new(Full::new(self.body.unwrap_or_default()));
        *res.status_mut() = self.status;
        *res.headers_mut() = self.headers;
        res
    }
}

impl Default for Response {
    fn default() -> Self { Self::new() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_unsent() {
        let res = Response::new();
        assert_eq!(res.status(), StatusCode::OK);
        assert!(!res.is_sent());
        assert_eq!(res.payload(), None);
    }

    #[test]
    fn null_sends_an_empty_body() {
        let mut res = Response::new();
        res.send(&Value::Null);
        assert!(res.is_sent());
        assert_eq!(res.body().map(Bytes::len), Some(0));
        assert!(res.headers().get(header::CONTENT_TYPE).is_none());
        assert_eq!(res.payload(), Some(Value::Null));
    }

    #[test]
    fn json_payload_sets_content_type() {
        let mut res = Response::new();
        res.send(&json!([1, 2]));
        assert_eq!(res.headers()[header::CONTENT_TYPE], "application/json");
        assert_eq!(res.body().unwrap().as_ref(), b"[1,2]");
    }

    #[test]
    fn error_envelope() {
        let res = Response::error(StatusCode::NOT_FOUND, "no such user");
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
        assert_eq!(res.payload(), Some(json!({"error": "no such user"})));
    }

    #[test]
    fn converts_to_http() {
        let mut res = Response::new();
        res.set_status(StatusCode::CREATED);
        res.insert_header(header::LOCATION, HeaderValue::from_static("/users/9"));
        res.send(&json!({"id": 9}));

        let http = res.into_http();
        assert_eq!(http.status(), StatusCode::CREATED);
        assert_eq!(http.headers()[header::LOCATION], "/users/9");
    }
}
