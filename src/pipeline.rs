//! The request pipeline.
//!
//! A [`Pipeline`] is built once per route and shared by every invocation.
//! Each invocation runs the same fixed sequence:
//!
//! ```text
//! Request → Context
//!   → middleware, in order          (first failure stops here)
//!   → validate query, params, body  (first rejection stops here)
//!   → arm the result guard          (if a result schema is set and checking is on)
//!   → handler
//!   → send the returned value       (unless already sent or failed)
//!   → hand the Response back
//!   → Next, exactly once, with the captured error or none
//! ```
//!
//! Errors are never wrapped: the value that reaches [`Next`] is the value
//! the middleware, schema or handler produced.
//!
//! ```rust
//! use conduit::{Pipeline, Request, Response, schema};
//! use http::Method;
//! use serde_json::json;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let route = Pipeline::builder()
//!     .params([("id", schema::integer())])
//!     .handler(|ctx, _reply| {
//!         let id = ctx.param("id").cloned();
//!         Box::pin(async move { Ok(json!({ "id": id })) })
//!     });
//!
//! let req = Request::new(Method::GET, "/users/5".parse().unwrap()).with_params([("id", "5")]);
//! let mut res = Response::new();
//! route.run(req, &mut res).await.unwrap();
//!
//! assert_eq!(res.payload(), Some(json!({"id": 5})));
//! # }
//! ```

use std::fmt;
use std::sync::Arc;

use tracing::{Instrument, debug, debug_span};

use crate::config::Environment;
use crate::context::{Context, Delta};
use crate::error::BoxError;
use crate::handler::{BoxFuture, BoxedHandler, FnHandler, Handler, HandlerResult};
use crate::middleware::{self, BoxedMiddleware, Middleware};
use crate::reply::Reply;
use crate::request::Request;
use crate::response::Response;
use crate::schema::{IntoSchema, SharedSchema};
use crate::validate::FieldSchemas;

// ── Next ──────────────────────────────────────────────────────────────────────

/// The error-continuation: told once how the invocation ended.
///
/// `None` means success. Consuming `self` makes a second call impossible.
pub struct Next<'a>(Box<dyn FnOnce(Option<BoxError>) + Send + 'a>);

impl<'a> Next<'a> {
    pub fn new(f: impl FnOnce(Option<BoxError>) + Send + 'a) -> Self {
        Self(Box::new(f))
    }

    pub fn run(self, error: Option<BoxError>) {
        (self.0)(error)
    }
}

// ── Pipeline ──────────────────────────────────────────────────────────────────

/// A captured error plus where it came from.
pub(crate) struct Failure {
    pub(crate) error: BoxError,
    /// Set when the result schema rejected the handler's payload.
    pub(crate) outbound: bool,
}

/// A route's immutable configuration and its request-handling routine.
pub struct Pipeline {
    label: String,
    middleware: Vec<BoxedMiddleware>,
    fields: FieldSchemas,
    result: Option<SharedSchema>,
    check_result: bool,
    handler: BoxedHandler,
}

impl Pipeline {
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::new()
    }

    /// Handles one request, then tells `next` how it ended.
    ///
    /// `response` is owned by the invocation while it runs and is always
    /// handed back before `next` is called.
    pub async fn call(&self, request: Request, response: &mut Response, next: Next<'_>) {
        let outcome = self.run(request, response).await;
        next.run(outcome.err());
    }

    /// Handles one request, returning the captured error if any.
    pub async fn run(&self, request: Request, response: &mut Response) -> Result<(), BoxError> {
        self.invoke(request, response).await.map_err(|failure| failure.error)
    }

    /// Like [`run`](Pipeline::run), but also reports whether the error is
    /// the result guard's rejection.
    pub(crate) async fn invoke(&self, request: Request, response: &mut Response) -> Result<(), Failure> {
        let span = debug_span!("pipeline", route = %self.label);

        let mut reply = Reply::new(std::mem::take(response));
        let outcome = self.drive(Context::new(request), &mut reply).instrument(span).await;
        let outbound = reply.result_rejected();

        // `drive` has already drained the error slot on every exit.
        let (restored, _) = reply.into_parts();
        *response = restored;
        outcome.map_err(|error| Failure { error, outbound })
    }

    async fn drive(&self, ctx: Context, reply: &mut Reply) -> Result<(), BoxError> {
        let mut ctx = middleware::run_chain(&self.middleware, ctx, reply).await?;

        self.fields.apply(&mut ctx)?;

        if self.check_result {
            if let Some(schema) = &self.result {
                reply.arm(Arc::clone(schema));
            }
        }

        match self.handler.call(ctx, reply).await {
            Ok(payload) if !reply.has_failed() && !reply.is_sent() => {
                debug!("sending handler result");
                reply.send(payload);
            }
            Ok(_) => {}
            Err(err) => reply.fail(err),
        }

        match reply.take_error() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    pub fn label(&self) -> &str { &self.label }

    pub(crate) fn labelled(mut self, label: String) -> Self {
        self.label = label;
        self
    }

    pub fn checks_result(&self) -> bool { self.check_result }
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("label", &self.label)
            .field("middleware", &self.middleware.iter().map(|m| m.name()).collect::<Vec<_>>())
            .field("query", &self.fields.query.is_some())
            .field("params", &self.fields.params.is_some())
            .field("body", &self.fields.body.is_some())
            .field("result", &self.result.is_some())
            .field("check_result", &self.check_result)
            .finish()
    }
}

// ── PipelineBuilder ───────────────────────────────────────────────────────────

/// Fluent builder for [`Pipeline`].
///
/// Obtain via [`Pipeline::builder()`]. Everything is optional except the
/// handler, which terminates the builder. Schemas are normalised here, once.
pub struct PipelineBuilder {
    middleware: Vec<BoxedMiddleware>,
    fields: FieldSchemas,
    result: Option<SharedSchema>,
    check_result: bool,
}

impl PipelineBuilder {
    /// Result checking defaults to on, except in production
    /// (see [`Environment::from_env`]).
    pub fn new() -> Self {
        Self {
            middleware: Vec::new(),
            fields: FieldSchemas::default(),
            result: None,
            check_result: !Environment::from_env().is_production(),
        }
    }

    /// Appends a middleware step.
    pub fn with(mut self, step: impl Middleware) -> Self {
        self.middleware.push(Arc::new(step));
        self
    }

    /// Appends an already shared middleware step.
    pub fn with_shared(mut self, step: BoxedMiddleware) -> Self {
        self.middleware.push(step);
        self
    }

    /// Appends an ordered list of shared steps.
    pub fn with_all(mut self, steps: impl IntoIterator<Item = BoxedMiddleware>) -> Self {
        self.middleware.extend(steps);
        self
    }

    /// Appends a closure step. Shorthand for `.with(middleware::from_fn(f))`.
    pub fn with_fn<F>(self, f: F) -> Self
    where
        F: for<'a> Fn(&'a Context, &'a mut Reply) -> BoxFuture<'a, Result<Delta, BoxError>>
            + Send
            + Sync
            + 'static,
    {
        self.with(middleware::from_fn(f))
    }

    pub fn query(mut self, schema: impl IntoSchema) -> Self {
        self.fields.query = Some(schema.into_schema());
        self
    }

    pub fn params(mut self, schema: impl IntoSchema) -> Self {
        self.fields.params = Some(schema.into_schema());
        self
    }

    pub fn body(mut self, schema: impl IntoSchema) -> Self {
        self.fields.body = Some(schema.into_schema());
        self
    }

    /// Schema for the outbound payload.
    pub fn result(mut self, schema: impl IntoSchema) -> Self {
        self.result = Some(schema.into_schema());
        self
    }

    /// Overrides the environment-derived result-checking default.
    pub fn check_result(mut self, enabled: bool) -> Self {
        self.check_result = enabled;
        self
    }

    /// Terminate with a closure handler.
    pub fn handler<F>(self, f: F) -> Pipeline
    where
        F: for<'a> Fn(Context, &'a mut Reply) -> BoxFuture<'a, HandlerResult> + Send + Sync + 'static,
    {
        self.handler_with(FnHandler(f))
    }

    /// Terminate with any [`Handler`].
    pub fn handler_with(self, handler: impl Handler) -> Pipeline {
        Pipeline {
            label: String::from("unrouted"),
            middleware: self.middleware,
            fields: self.fields,
            result: self.result,
            check_result: self.check_result,
            handler: Arc::new(handler),
        }
    }
}

impl Default for PipelineBuilder {
    fn default() -> Self { Self::new() }
}

#[cfg(test)]
mod tests {
    use http::{Method, StatusCode, Uri};
    use serde_json::{Value, json};

    use super::*;
    use crate::schema::{ValidationError, object, string};

    fn get(path: &'static str) -> Request {
        Request::new(Method::GET, Uri::from_static(path))
    }

    #[tokio::test]
    async fn returned_value_is_sent() {
        let route = Pipeline::builder().handler(|_ctx, _reply| Box::pin(async { Ok(json!("hi")) }));

        let mut res = Response::new();
        route.run(get("/"), &mut res).await.unwrap();
        assert_eq!(res.payload(), Some(json!("hi")));
    }

    #[tokio::test]
    async fn explicit_send_wins_over_return_value() {
        let route = Pipeline::builder().handler(|_ctx, reply| {
            Box::pin(async move {
                reply.set_status(StatusCode::CREATED);
                reply.send(json!({"explicit": true}));
                Ok(json!({"returned": true}))
            })
        });

        let mut res = Response::new();
        route.run(get("/"), &mut res).await.unwrap();
        assert_eq!(res.status(), StatusCode::CREATED);
        assert_eq!(res.payload(), Some(json!({"explicit": true})));
    }

    #[tokio::test]
    async fn next_runs_once_with_the_error() {
        let route = Pipeline::builder().handler(|_ctx, _reply| Box::pin(async { Err("boom".into()) }));

        let mut calls = Vec::new();
        let mut res = Response::new();
        route
            .call(get("/"), &mut res, Next::new(|err| calls.push(err.map(|e| e.to_string()))))
            .await;

        assert_eq!(calls, [Some("boom".to_owned())]);
        assert!(!res.is_sent());
    }

    #[tokio::test]
    async fn next_runs_once_without_error() {
        let route = Pipeline::builder().handler(|_ctx, _reply| Box::pin(async { Ok(Value::Null) }));

        let mut calls = 0;
        let mut seen = None;
        let mut res = Response::new();
        route
            .call(get("/"), &mut res, Next::new(|err| {
                calls += 1;
                seen = Some(err.is_none());
            }))
            .await;

        assert_eq!(calls, 1);
        assert_eq!(seen, Some(true));
    }

    #[tokio::test]
    async fn disabled_check_sends_invalid_results() {
        let route = Pipeline::builder()
            .result(object([("name", string())]))
            .check_result(false)
            .handler(|_ctx, _reply| Box::pin(async { Ok(json!({"unexpected": true})) }));

        let mut res = Response::new();
        route.run(get("/"), &mut res).await.unwrap();
        assert_eq!(res.payload(), Some(json!({"unexpected": true})));
    }

    #[tokio::test]
    async fn enabled_check_rejects_invalid_results() {
        let route = Pipeline::builder()
            .result(object([("name", string())]))
            .check_result(true)
            .handler(|_ctx, _reply| Box::pin(async { Ok(json!({"unexpected": true})) }));

        let mut res = Response::new();
        let err = route.run(get("/"), &mut res).await.unwrap_err();
        assert!(err.is::<ValidationError>());
        assert!(!res.is_sent());
    }

    #[tokio::test]
    async fn invoke_marks_only_result_rejections_as_outbound() {
        let bad_result = Pipeline::builder()
            .result(object([("name", string())]))
            .check_result(true)
            .handler(|_ctx, _reply| Box::pin(async { Ok(json!({"name": 7})) }));
        let bad_params = Pipeline::builder()
            .params(object([("id", crate::schema::integer())]))
            .result(object([("name", string())]))
            .check_result(true)
            .handler(|_ctx, _reply| Box::pin(async { Ok(json!({"name": "ok"})) }));

        let failure = bad_result.invoke(get("/"), &mut Response::new()).await.unwrap_err();
        assert!(failure.outbound);
        assert!(failure.error.is::<ValidationError>());

        let req = get("/users/x").with_params([("id", "x")]);
        let failure = bad_params.invoke(req, &mut Response::new()).await.unwrap_err();
        assert!(!failure.outbound);
        assert!(failure.error.is::<ValidationError>());
    }

    #[tokio::test]
    async fn signalled_error_beats_thrown_error() {
        let route = Pipeline::builder().handler(|_ctx, reply| {
            Box::pin(async move {
                reply.fail("signalled");
                Err("thrown".into())
            })
        });

        let err = route.run(get("/"), &mut Response::new()).await.unwrap_err();
        assert_eq!(err.to_string(), "signalled");
    }

    #[tokio::test]
    async fn signalled_errors_surface_from_every_stage() {
        let from_step = Pipeline::builder()
            .with_fn(|_ctx, reply| {
                Box::pin(async move {
                    reply.fail("step");
                    Ok(Delta::new())
                })
            })
            .handler(|_ctx, _reply| Box::pin(async { Ok(json!("unreachable")) }));

        let from_handler = Pipeline::builder().handler(|_ctx, reply| {
            Box::pin(async move {
                reply.fail("handler");
                Ok(json!("ignored"))
            })
        });

        let mut res = Response::new();
        assert_eq!(from_step.run(get("/"), &mut res).await.unwrap_err().to_string(), "step");
        assert!(!res.is_sent());

        let mut res = Response::new();
        assert_eq!(from_handler.run(get("/"), &mut res).await.unwrap_err().to_string(), "handler");
        assert!(!res.is_sent());
    }

    #[tokio::test]
    async fn shared_step_lists_run_in_order() {
        let stamp = |n: i64| -> BoxedMiddleware {
            Arc::new(middleware::from_fn(move |ctx, _reply| {
                let mut seen = ctx.get_as::<Vec<i64>>("seen").unwrap_or_default();
                seen.push(n);
                Box::pin(async move { Ok(Delta::new().set("seen", seen)) })
            }))
        };

        let route = Pipeline::builder()
            .with_all([stamp(1), stamp(2)])
            .with_shared(stamp(3))
            .handler(|ctx, _reply| {
                let seen = ctx.get("seen").cloned().unwrap_or_default();
                Box::pin(async move { Ok(seen) })
            });

        let mut res = Response::new();
        route.run(get("/"), &mut res).await.unwrap();
        assert_eq!(res.payload(), Some(json!([1, 2, 3])));
    }

    #[test]
    fn debug_lists_configuration() {
        let route = Pipeline::builder()
            .with(crate::middleware::RequestId)
            .params([("id", string())])
            .handler(|_ctx, _reply| Box::pin(async { Ok(Value::Null) }));

        let dbg = format!("{route:?}");
        assert!(dbg.contains("request_id"));
        assert!(dbg.contains("params: true"));
        assert!(dbg.contains("query: false"));
    }
}
