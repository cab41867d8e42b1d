//! The per-invocation response capsule.
//!
//! A [`Reply`] owns the invocation's [`Response`] while the pipeline runs
//! and hands it back when the invocation ends. Two things make it more than
//! a plain response:
//!
//! - **Result guard.** When the route validates results, the first
//!   [`send`](Reply::send) is checked against the result schema. A valid
//!   payload is transmitted in its parsed form; an invalid one is never
//!   transmitted and becomes the invocation's error. The guard is disarmed
//!   after that first send either way, so later sends go straight through.
//! - **Error slot.** [`fail`](Reply::fail) records an error without
//!   forwarding it. The first error recorded wins, and once an error is
//!   recorded every later send is suppressed.

use http::{HeaderName, HeaderValue, StatusCode};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::BoxError;
use crate::response::Response;
use crate::schema::SharedSchema;

/// The response handle given to middleware and handlers.
pub struct Reply {
    response: Response,
    guard: Option<SharedSchema>,
    error: Option<BoxError>,
    rejected: bool,
}

impl Reply {
    /// An unguarded capsule around `response`.
    pub fn new(response: Response) -> Self {
        Self { response, guard: None, error: None, rejected: false }
    }

    /// Validate the next send against `schema`.
    pub(crate) fn arm(&mut self, schema: SharedSchema) {
        self.guard = Some(schema);
    }

    /// Transmits `payload` through the wrapped response.
    pub fn send(&mut self, payload: Value) {
        if self.error.is_some() {
            debug!("error already captured, send suppressed");
            return;
        }

        let payload = match self.guard.take() {
            None => payload,
            Some(schema) => match schema.parse(payload) {
                Ok(parsed) => parsed,
                Err(err) => {
                    warn!(error = %err, "result validation failed, payload not sent");
                    self.error = Some(Box::new(err));
                    self.rejected = true;
                    return;
                }
            },
        };

        self.response.send(&payload);
    }

    /// Records `err` as the invocation's error unless one is already set.
    pub fn fail(&mut self, err: impl Into<BoxError>) {
        if self.error.is_some() {
            debug!("error already captured, later error dropped");
            return;
        }
        self.error = Some(err.into());
    }

    pub fn set_status(&mut self, status: StatusCode) {
        self.response.set_status(status);
    }

    pub fn insert_header(&mut self, name: HeaderName, value: HeaderValue) {
        self.response.insert_header(name, value);
    }

    pub fn is_sent(&self) -> bool {
        self.response.is_sent()
    }

    pub fn has_failed(&self) -> bool {
        self.error.is_some()
    }

    /// Whether the captured error is the result guard's rejection.
    pub fn result_rejected(&self) -> bool {
        self.rejected
    }

    pub fn response(&self) -> &Response {
        &self.response
    }

    /// Removes the recorded error, leaving the slot empty.
    pub(crate) fn take_error(&mut self) -> Option<BoxError> {
        self.error.take()
    }

    /// Ends the capsule: the response (guard dropped) and the captured error.
    pub fn into_parts(self) -> (Response, Option<BoxError>) {
        (self.response, self.error)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::schema::{ValidationError, object, string};

    fn guarded() -> Reply {
        let mut reply = Reply::new(Response::new());
        reply.arm(object([("name", string())]));
        reply
    }

    #[test]
    fn unguarded_send_goes_through() {
        let mut reply = Reply::new(Response::new());
        reply.send(json!({"anything": true}));
        assert_eq!(reply.response().payload(), Some(json!({"anything": true})));
    }

    #[test]
    fn guard_sends_parsed_payload() {
        let mut reply = guarded();
        reply.send(json!({"name": "ok", "secret": "x"}));

        let (res, err) = reply.into_parts();
        assert!(err.is_none());
        assert_eq!(res.payload(), Some(json!({"name": "ok"})));
    }

    #[test]
    fn rejected_payload_is_never_sent() {
        let mut reply = guarded();
        reply.send(json!({"unexpected": true}));
        assert!(reply.result_rejected());

        let (res, err) = reply.into_parts();
        assert!(!res.is_sent());
        assert!(err.unwrap().downcast_ref::<ValidationError>().is_some());
    }

    #[test]
    fn only_the_first_send_is_checked() {
        let mut reply = guarded();
        reply.send(json!({"name": "first"}));
        reply.send(json!({"unchecked": 1}));

        let (res, err) = reply.into_parts();
        assert!(err.is_none());
        assert_eq!(res.payload(), Some(json!({"unchecked": 1})));
    }

    #[test]
    fn first_error_wins_and_suppresses_sends() {
        let mut reply = Reply::new(Response::new());
        reply.fail("first");
        reply.fail("second");
        reply.send(json!("late"));
        assert!(!reply.result_rejected());

        let (res, err) = reply.into_parts();
        assert!(!res.is_sent());
        assert_eq!(err.unwrap().to_string(), "first");
    }
}
