//! # conduit
//!
//! Validated request pipelines on a minimal hyper-based HTTP framework.
//!
//! Every route is a [`Pipeline`]: an immutable bundle of middleware steps,
//! optional schemas for the request's `query`, `params` and `body`, an
//! optional schema for the outbound payload, and a handler. Per request the
//! pipeline:
//!
//! 1. runs the middleware in order, merging each step's [`Delta`] into the
//!    [`Context`], and stops at the first failure;
//! 2. validates `query`, `params` and `body`, replacing each with its
//!    parsed form, and stops at the first rejection;
//! 3. guards the first send against the result schema (unless result
//!    checking is off, which is the production default);
//! 4. calls the handler, sending its return value if it did not send
//!    anything itself;
//! 5. hands the [`Response`] back and reports the first captured error,
//!    untouched, exactly once.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use conduit::{HttpError, Pipeline, Router, Server, schema};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() {
//!     let get_user = Pipeline::builder()
//!         .params([("id", schema::integer())])
//!         .result([("id", schema::integer()), ("name", schema::string())])
//!         .handler(|ctx, _reply| {
//!             let id = ctx.param("id").and_then(|v| v.as_i64());
//!             Box::pin(async move {
//!                 match id {
//!                     Some(1) => Ok(json!({ "id": 1, "name": "alice" })),
//!                     _ => Err(HttpError::not_found("no such user").into()),
//!                 }
//!             })
//!         });
//!
//!     let app = Router::new().get("/users/{id}", get_user);
//!
//!     Server::bind("0.0.0.0:3000").serve(app).await.unwrap();
//! }
//! ```

mod context;
mod error;
mod handler;
mod pipeline;
mod reply;
mod request;
mod response;
mod router;
mod server;
mod validate;

pub mod config;
pub mod health;
pub mod middleware;
pub mod schema;

pub use context::{Context, Delta};
pub use error::{BoxError, ContextError, Error, HttpError, RejectedResult};
pub use handler::{BoxFuture, BoxedHandler, Handler, HandlerResult};
pub use middleware::{BoxedMiddleware, Middleware};
pub use pipeline::{Next, Pipeline, PipelineBuilder};
pub use reply::Reply;
pub use request::Request;
pub use response::Response;
pub use router::{ErrorRenderer, Router, render_error};
pub use server::Server;
