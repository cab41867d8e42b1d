//! Handler trait and type erasure.
//!
//! # How handlers are stored
//!
//! A [`Pipeline`](crate::Pipeline) holds its handler as
//! `Arc<dyn Handler>`, so routes with different handler types can live in
//! the same router. Handlers borrow the invocation's [`Reply`] for as long
//! as their future runs, which is why the future type carries a lifetime:
//!
//! ```text
//! |ctx, reply| Box::pin(async move { … })        ← user writes this
//!        ↓ Pipeline::builder().handler(f)
//! Arc::new(FnHandler(f))                         ← heap-allocated wrapper
//!        ↓  stored as BoxedHandler = Arc<dyn Handler>
//! handler.call(ctx, &mut reply)  per invocation  ← one vtable dispatch
//! ```

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::Value;

use crate::context::Context;
use crate::error::BoxError;
use crate::reply::Reply;

/// A heap-allocated, type-erased future borrowing for `'a`.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// What a handler resolves to: the payload to send, or an error.
pub type HandlerResult = Result<Value, BoxError>;

/// The business logic at the end of a pipeline.
///
/// Closures with the right shape implement this automatically; implement
/// it by hand for handlers that carry state.
///
/// ```rust
/// use conduit::{BoxFuture, Context, Handler, HandlerResult, Reply};
/// use serde_json::json;
///
/// struct Version(&'static str);
///
/// impl Handler for Version {
///     fn call<'a>(&'a self, _ctx: Context, _reply: &'a mut Reply) -> BoxFuture<'a, HandlerResult> {
///         Box::pin(async move { Ok(json!({ "version": self.0 })) })
///     }
/// }
/// ```
pub trait Handler: Send + Sync + 'static {
    fn call<'a>(&'a self, ctx: Context, reply: &'a mut Reply) -> BoxFuture<'a, HandlerResult>;
}

/// A handler shared across concurrent invocations.
pub type BoxedHandler = Arc<dyn Handler>;

/// Newtype that lets closures act as [`Handler`]s.
pub(crate) struct FnHandler<F>(pub(crate) F);

impl<F> Handler for FnHandler<F>
where
    F: for<'a> Fn(Context, &'a mut Reply) -> BoxFuture<'a, HandlerResult> + Send + Sync + 'static,
{
    fn call<'a>(&'a self, ctx: Context, reply: &'a mut Reply) -> BoxFuture<'a, HandlerResult> {
        (self.0)(ctx, reply)
    }
}
