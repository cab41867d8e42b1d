//! Request-id propagation.

use serde_json::Value;

use crate::context::{Context, Delta};
use crate::error::BoxError;
use crate::handler::BoxFuture;
use crate::reply::Reply;

use super::Middleware;

/// Adds a `request_id` field to the context.
///
/// Reuses the incoming `x-request-id` header when present, otherwise
/// generates a UUID v4.
#[derive(Clone, Copy, Debug, Default)]
pub struct RequestId;

impl RequestId {
    pub const HEADER: &'static str = "x-request-id";
    pub const FIELD: &'static str = "request_id";
}

impl Middleware for RequestId {
    fn name(&self) -> &'static str {
        "request_id"
    }

    fn call<'a>(&'a self, ctx: &'a Context, _reply: &'a mut Reply) -> BoxFuture<'a, Result<Delta, BoxError>> {
        let id = match ctx.header(Self::HEADER) {
            Some(id) if !id.trim().is_empty() => id.trim().to_owned(),
            _ => uuid::Uuid::new_v4().to_string(),
        };
        Box::pin(async move { Ok(Delta::new().set(Self::FIELD, Value::String(id))) })
    }
}

#[cfg(test)]
mod tests {
    use http::{HeaderValue, Method, Uri};

    use super::*;
    use crate::request::Request;
    use crate::response::Response;

    async fn run(req: Request) -> String {
        let ctx = Context::new(req);
        let mut reply = Reply::new(Response::new());
        let delta = RequestId.call(&ctx, &mut reply).await.unwrap();

        let mut ctx = ctx;
        ctx.merge(delta);
        ctx.get_as(RequestId::FIELD).unwrap()
    }

    #[tokio::test]
    async fn propagates_incoming_header() {
        let req = Request::new(Method::GET, Uri::from_static("/"))
            .with_header(RequestId::HEADER.parse().unwrap(), HeaderValue::from_static("abc-123"));
        assert_eq!(run(req).await, "abc-123");
    }

    #[tokio::test]
    async fn generates_when_absent() {
        let id = run(Request::new(Method::GET, Uri::from_static("/"))).await;
        assert!(uuid::Uuid::parse_str(&id).is_ok());
    }
}
