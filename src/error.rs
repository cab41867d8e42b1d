//! Error types.
//!
//! Failures inside a pipeline travel as [`BoxError`] and reach the
//! error-continuation exactly as they were raised. The named types below
//! cover the crate's own failure modes: infrastructure ([`Error`]), typed
//! context access ([`ContextError`]), application errors that carry an
//! HTTP status ([`HttpError`]), and outbound payloads that failed their
//! result schema ([`RejectedResult`]).

use http::StatusCode;

use crate::schema::ValidationError;

/// A type-erased error, as captured by a pipeline invocation.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The error type returned by conduit's fallible infrastructure operations.
///
/// Request-level failures are not `Error`s. They are captured by the
/// pipeline and rendered by the router's error renderer. This type surfaces
/// binding to a port, accepting a connection, or reading configuration.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("config: {0}")]
    Config(String),
}

/// Failure to read a named field from a [`Context`](crate::Context).
#[derive(Debug, thiserror::Error)]
pub enum ContextError {
    #[error("context field `{0}` is not set")]
    Missing(String),

    #[error("context field `{field}` has an unexpected shape: {source}")]
    Type {
        field: String,
        #[source]
        source: serde_json::Error,
    },
}

/// An application error with an HTTP status attached.
///
/// Pipelines do not look inside it. The router's default error renderer
/// uses the status when it turns a captured error into a response.
///
/// ```rust
/// use conduit::HttpError;
///
/// let err = HttpError::not_found("user 5 does not exist");
/// assert_eq!(err.status(), http::StatusCode::NOT_FOUND);
/// ```
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct HttpError {
    status: StatusCode,
    message: String,
}

impl HttpError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self { status, message: message.into() }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn status(&self) -> StatusCode { self.status }
    pub fn message(&self) -> &str { &self.message }
}

/// A handler result rejected by its route's result schema.
///
/// Pipelines forward the schema's [`ValidationError`] as it is. The router
/// wraps it in this type before rendering, so an error renderer can tell a
/// bad payload produced by the server from a bad request sent by the client.
#[derive(Debug, Clone, thiserror::Error)]
#[error("handler result rejected: {0}")]
pub struct RejectedResult(pub ValidationError);

