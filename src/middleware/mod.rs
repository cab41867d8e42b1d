//! Middleware: pre-processing steps that extend the context.
//!
//! A step sees the current [`Context`] and the invocation's [`Reply`], and
//! resolves to a [`Delta`] of fields to add or replace. Steps run strictly
//! in order; each one sees everything the previous steps added. A step
//! stops the chain by returning `Err` or by calling [`Reply::fail`], and
//! then neither the remaining steps nor the handler run.
//!
//! ```rust
//! use conduit::middleware;
//! use conduit::{Delta, HttpError};
//! use serde_json::json;
//!
//! let auth = middleware::from_fn(|ctx, _reply| {
//!     let token = ctx.header("authorization").map(str::to_owned);
//!     Box::pin(async move {
//!         match token.as_deref() {
//!             Some("Bearer secret") => Ok(Delta::new().set("user", json!({"id": 1}))),
//!             _ => Err(HttpError::unauthorized("missing or invalid token").into()),
//!         }
//!     })
//! });
//! ```

mod request_id;

use std::any::type_name;
use std::sync::Arc;

use tracing::debug;

use crate::context::{Context, Delta};
use crate::error::BoxError;
use crate::handler::BoxFuture;
use crate::reply::Reply;

pub use request_id::RequestId;

/// One pre-processing step.
pub trait Middleware: Send + Sync + 'static {
    /// Name used in logs.
    fn name(&self) -> &'static str {
        type_name::<Self>()
    }

    fn call<'a>(&'a self, ctx: &'a Context, reply: &'a mut Reply) -> BoxFuture<'a, Result<Delta, BoxError>>;
}

/// A step shared across concurrent invocations.
pub type BoxedMiddleware = Arc<dyn Middleware>;

/// Wraps a closure as a [`Middleware`].
pub fn from_fn<F>(f: F) -> FromFn<F>
where
    F: for<'a> Fn(&'a Context, &'a mut Reply) -> BoxFuture<'a, Result<Delta, BoxError>>
        + Send
        + Sync
        + 'static,
{
    FromFn(f)
}

/// Middleware built by [`from_fn`].
pub struct FromFn<F>(F);

impl<F> Middleware for FromFn<F>
where
    F: for<'a> Fn(&'a Context, &'a mut Reply) -> BoxFuture<'a, Result<Delta, BoxError>>
        + Send
        + Sync
        + 'static,
{
    fn name(&self) -> &'static str {
        "from_fn"
    }

    fn call<'a>(&'a self, ctx: &'a Context, reply: &'a mut Reply) -> BoxFuture<'a, Result<Delta, BoxError>> {
        (self.0)(ctx, reply)
    }
}

/// Runs `steps` in order against `ctx`, merging each step's delta.
///
/// Returns the extended context, or the first error a step raised or
/// signalled. A signalled error takes precedence over a returned one since
/// it was recorded first.
pub(crate) async fn run_chain(
    steps: &[BoxedMiddleware],
    mut ctx: Context,
    reply: &mut Reply,
) -> Result<Context, BoxError> {
    for (index, step) in steps.iter().enumerate() {
        debug!(step = step.name(), index, "middleware");

        let outcome = step.call(&ctx, reply).await;
        if let Some(err) = reply.take_error() {
            debug!(step = step.name(), "middleware signalled an error");
            return Err(err);
        }

        let delta = outcome?;
        if !delta.is_empty() {
            debug!(step = step.name(), fields = ?delta.keys().collect::<Vec<_>>(), "context extended");
        }
        ctx.merge(delta);
    }
    Ok(ctx)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use http::{Method, Uri};
    use serde_json::json;

    use super::*;
    use crate::request::Request;
    use crate::response::Response;

    fn ctx() -> Context {
        Context::new(Request::new(Method::GET, Uri::from_static("/")))
    }

    fn add(name: &'static str, value: i64) -> BoxedMiddleware {
        Arc::new(from_fn(move |_ctx, _reply| {
            Box::pin(async move { Ok(Delta::new().set(name, value)) })
        }))
    }

    struct Counting(Arc<AtomicUsize>);

    impl Middleware for Counting {
        fn call<'a>(&'a self, _ctx: &'a Context, _reply: &'a mut Reply) -> BoxFuture<'a, Result<Delta, BoxError>> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Box::pin(async { Ok(Delta::new()) })
        }
    }

    #[tokio::test]
    async fn later_steps_see_earlier_fields() {
        let doubler: BoxedMiddleware = Arc::new(from_fn(|ctx, _reply| {
            let n = ctx.get("n").and_then(|v| v.as_i64()).unwrap_or(0);
            Box::pin(async move { Ok(Delta::new().set("doubled", n * 2)) })
        }));

        let mut reply = Reply::new(Response::new());
        let ctx = run_chain(&[add("n", 21), doubler], ctx(), &mut reply).await.unwrap();

        assert_eq!(ctx.get("doubled"), Some(&json!(42)));
    }

    #[tokio::test]
    async fn returned_error_stops_the_chain() {
        let calls = Arc::new(AtomicUsize::new(0));
        let failing: BoxedMiddleware = Arc::new(from_fn(|_ctx, _reply| {
            Box::pin(async { Err("denied".into()) })
        }));

        let steps = [add("a", 1), failing, Arc::new(Counting(Arc::clone(&calls))) as BoxedMiddleware];
        let mut reply = Reply::new(Response::new());
        let err = run_chain(&steps, ctx(), &mut reply).await.unwrap_err();

        assert_eq!(err.to_string(), "denied");
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn signalled_error_wins_over_returned_delta() {
        let calls = Arc::new(AtomicUsize::new(0));
        let signalling: BoxedMiddleware = Arc::new(from_fn(|_ctx, reply| {
            Box::pin(async move {
                reply.fail("signalled");
                Ok(Delta::new().set("ignored", true))
            })
        }));

        let steps = [signalling, Arc::new(Counting(Arc::clone(&calls))) as BoxedMiddleware];
        let mut reply = Reply::new(Response::new());
        let err = run_chain(&steps, ctx(), &mut reply).await.unwrap_err();

        assert_eq!(err.to_string(), "signalled");
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn empty_chain_is_a_no_op() {
        let mut reply = Reply::new(Response::new());
        let ctx = run_chain(&[], ctx(), &mut reply).await.unwrap();
        assert!(!ctx.contains("anything"));
    }
}
