//! Ready-made health-check routes.
//!
//! | Probe | Path | Question |
//! |---|---|---|
//! | **Liveness** | `/healthz` | Is the process alive? Failure → restart. |
//! | **Readiness** | `/readyz` | Can the pod serve traffic? Failure → pulled from load-balancer. |
//!
//! ```rust,no_run
//! use conduit::{Router, health};
//!
//! let app = Router::new()
//!     .get("/healthz", health::liveness())
//!     .get("/readyz", health::readiness());
//! ```
//!
//! Build your own readiness pipeline if it must gate on dependencies.

use serde_json::json;

use crate::pipeline::Pipeline;

/// Always `{"status": "ok"}`.
pub fn liveness() -> Pipeline {
    Pipeline::builder().handler(|_ctx, _reply| Box::pin(async { Ok(json!({ "status": "ok" })) }))
}

/// Always `{"status": "ready"}`.
pub fn readiness() -> Pipeline {
    Pipeline::builder().handler(|_ctx, _reply| Box::pin(async { Ok(json!({ "status": "ready" })) }))
}
