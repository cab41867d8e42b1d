//! Radix-tree request router.
//!
//! One tree per HTTP method. O(path-length) lookup. Every route is a
//! [`Pipeline`]; the router decodes the request, runs the pipeline, and
//! turns a captured error into a response with its error renderer.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use http::{Method, StatusCode};
use http_body_util::{BodyExt, Full};
use hyper::body::Body;
use matchit::Router as MatchitRouter;
use serde_json::{Map, Value, json};
use tracing::{error, warn};

use crate::error::{BoxError, HttpError, RejectedResult};
use crate::pipeline::{Failure, Pipeline};
use crate::request::Request;
use crate::response::Response;
use crate::schema::ValidationError;

/// Turns a captured error into the response the client sees.
pub type ErrorRenderer = Arc<dyn Fn(&BoxError) -> Response + Send + Sync>;

/// The application router.
///
/// One radix tree per HTTP method. Build it once at startup; pass it to
/// [`Server::serve`](crate::Server::serve). Each registration returns
/// `self` so routes chain naturally.
pub struct Router {
    routes: HashMap<Method, MatchitRouter<Arc<Pipeline>>>,
    render: ErrorRenderer,
}

impl Router {
    pub fn new() -> Self {
        Self { routes: HashMap::new(), render: Arc::new(render_error) }
    }

    /// Register a pipeline for a method + path pair. Returns `self` for chaining.
    ///
    /// Path parameters use `{name}` syntax and land in the context's
    /// `params` field as strings.
    ///
    /// # Panics
    ///
    /// Panics if `path` is not a valid route pattern or conflicts with one
    /// already registered for `method`.
    pub fn on(mut self, method: Method, path: &str, pipeline: Pipeline) -> Self {
        let pipeline = pipeline.labelled(format!("{method} {path}"));
        self.routes
            .entry(method)
            .or_default()
            .insert(path, Arc::new(pipeline))
            .unwrap_or_else(|e| panic!("invalid route `{path}`: {e}"));
        self
    }

    pub fn get(self, path: &str, pipeline: Pipeline) -> Self { self.on(Method::GET, path, pipeline) }
    pub fn post(self, path: &str, pipeline: Pipeline) -> Self { self.on(Method::POST, path, pipeline) }
    pub fn put(self, path: &str, pipeline: Pipeline) -> Self { self.on(Method::PUT, path, pipeline) }
    pub fn patch(self, path: &str, pipeline: Pipeline) -> Self { self.on(Method::PATCH, path, pipeline) }
    pub fn delete(self, path: &str, pipeline: Pipeline) -> Self { self.on(Method::DELETE, path, pipeline) }

    /// Replaces the default error renderer ([`render_error`]).
    pub fn on_error(mut self, render: impl Fn(&BoxError) -> Response + Send + Sync + 'static) -> Self {
        self.render = Arc::new(render);
        self
    }

    pub(crate) fn lookup(&self, method: &Method, path: &str) -> Option<(Arc<Pipeline>, Map<String, Value>)> {
        let tree = self.routes.get(method)?;
        let matched = tree.at(path).ok()?;
        let pipeline = Arc::clone(matched.value);
        let params = matched.params.iter()
            .map(|(k, v)| (k.to_owned(), Value::String(v.to_owned())))
            .collect();
        Some((pipeline, params))
    }

    /// Routes one request and produces one response.
    ///
    /// Every failure is handled here (404, 400, the error renderer), so the
    /// caller always gets a response.
    pub async fn dispatch<B>(&self, req: http::Request<B>) -> http::Response<Full<Bytes>>
    where
        B: Body<Data = Bytes>,
        B::Error: Into<BoxError>,
    {
        let (parts, body) = req.into_parts();

        let Some((pipeline, params)) = self.lookup(&parts.method, parts.uri.path()) else {
            return Response::error(StatusCode::NOT_FOUND, "not found").into_http();
        };

        let bytes = match body.collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(e) => {
                let e: BoxError = e.into();
                warn!(route = pipeline.label(), "failed to read request body: {e}");
                return Response::error(StatusCode::BAD_REQUEST, "unreadable request body").into_http();
            }
        };

        let request = match Request::from_parts(parts, params, &bytes) {
            Ok(request) => request,
            Err(e) => return Response::error(e.status(), e.message()).into_http(),
        };

        let mut response = Response::new();
        match pipeline.invoke(request, &mut response).await {
            Ok(()) => response.into_http(),
            Err(Failure { error, outbound: false }) => (self.render)(&error).into_http(),
            Err(Failure { error, outbound: true }) => {
                let error: BoxError = match error.downcast::<ValidationError>() {
                    Ok(rejected) => Box::new(RejectedResult(*rejected)),
                    Err(other) => other,
                };
                (self.render)(&error).into_http()
            }
        }
    }
}

impl Default for Router {
    fn default() -> Self { Self::new() }
}

/// The default error renderer.
///
/// - [`HttpError`] → its own status, `{"error": message}`
/// - [`ValidationError`] → `400`, `{"error": "validation failed", "issues": [...]}`
/// - [`RejectedResult`] → `500`, `{"error": "internal server error"}`; the
///   issues are logged, since the server produced the bad payload
/// - anything else → `500`, `{"error": "internal server error"}`; the error
///   itself is logged, not exposed
pub fn render_error(err: &BoxError) -> Response {
    if let Some(e) = err.downcast_ref::<HttpError>() {
        if e.status().is_server_error() {
            error!(status = %e.status(), "{e}");
        }
        return Response::error(e.status(), e.message());
    }

    if let Some(e) = err.downcast_ref::<ValidationError>() {
        let issues: Vec<Value> = e.issues().iter()
            .map(|i| json!({ "path": i.path.join("."), "message": i.message }))
            .collect();
        let mut res = Response::new();
        res.set_status(StatusCode::BAD_REQUEST);
        res.send(&json!({ "error": "validation failed", "issues": issues }));
        return res;
    }

    if let Some(RejectedResult(e)) = err.downcast_ref::<RejectedResult>() {
        error!(issues = %e, "handler result failed its schema");
        return Response::error(StatusCode::INTERNAL_SERVER_ERROR, "internal server error");
    }

    error!("unhandled error: {err}");
    Response::error(StatusCode::INTERNAL_SERVER_ERROR, "internal server error")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop() -> Pipeline {
        Pipeline::builder().handler(|_ctx, _reply| Box::pin(async { Ok(Value::Null) }))
    }

    #[test]
    fn lookup_extracts_params() {
        let router = Router::new().get("/users/{id}", noop());

        let (pipeline, params) = router.lookup(&Method::GET, "/users/42").unwrap();
        assert_eq!(pipeline.label(), "GET /users/{id}");
        assert_eq!(params.get("id"), Some(&json!("42")));

        assert!(router.lookup(&Method::POST, "/users/42").is_none());
        assert!(router.lookup(&Method::GET, "/teams/42").is_none());
    }

    #[test]
    #[should_panic(expected = "invalid route")]
    fn conflicting_routes_panic() {
        let _ = Router::new().get("/a/{x}", noop()).get("/a/{y}", noop());
    }

    #[test]
    fn renders_http_errors_with_their_status() {
        let err: BoxError = HttpError::forbidden("nope").into();
        let res = render_error(&err);
        assert_eq!(res.status(), StatusCode::FORBIDDEN);
        assert_eq!(res.payload(), Some(json!({"error": "nope"})));
    }

    #[test]
    fn renders_validation_errors_as_bad_requests() {
        let err: BoxError = crate::schema::integer().parse(json!("x")).unwrap_err().into();
        let res = render_error(&err);
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert_eq!(res.payload().unwrap()["issues"][0]["message"], "expected an integer, got a string");
    }

    #[test]
    fn renders_rejected_results_as_server_errors() {
        let issues = crate::schema::string().parse(json!(1)).unwrap_err();
        let err: BoxError = RejectedResult(issues).into();
        let res = render_error(&err);
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(res.payload(), Some(json!({"error": "internal server error"})));
    }

    #[test]
    fn hides_unknown_errors() {
        let err: BoxError = "database password is hunter2".into();
        let res = render_error(&err);
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(res.payload(), Some(json!({"error": "internal server error"})));
    }
}
