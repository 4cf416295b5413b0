//! Failure module
//!
//! Every error raised while a request is inside the router is normalized into
//! a [`Failure`] before it reaches the translator, which is the only place a
//! failure becomes a client-visible response.

mod translator;

pub use translator::translate;

use hyper::StatusCode;
use std::any::Any;
use std::fmt;

/// Content type of every rendered failure page
pub const FAILURE_CONTENT_TYPE: &str = "text/html; charset=utf-8";

/// Normalized error value: status code, message and optional cause
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    status: StatusCode,
    message: String,
    cause: Option<String>,
}

impl Failure {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            cause: None,
        }
    }

    /// Attach the underlying cause (e.g. the error that triggered this failure)
    #[must_use]
    pub fn with_cause(mut self, cause: impl fmt::Display) -> Self {
        self.cause = Some(cause.to_string());
        self
    }

    /// Explicit failure signalled by a handler with only a status code.
    ///
    /// The message defaults to the canonical reason phrase.
    pub fn status(status: StatusCode) -> Self {
        Self::new(status, status.canonical_reason().unwrap_or("Unknown Status"))
    }

    /// Uncaught fault inside a handler or an offloaded operation
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    /// Build a 500 failure from a caught panic payload
    pub fn from_panic(payload: &(dyn Any + Send)) -> Self {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| (*s).to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "handler panicked with a non-string payload".to_string());
        Self::internal(message)
    }

    pub const fn status_code(&self) -> StatusCode {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn cause(&self) -> Option<&str> {
        self.cause.as_deref()
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.status.as_u16(), self.message)?;
        if let Some(cause) = &self.cause {
            write!(f, " (caused by: {cause})")?;
        }
        Ok(())
    }
}

impl std::error::Error for Failure {}

/// Errors that can stop a request between the router entry and the handler's reply
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("no route matches {method} {path}")]
    NoMatch { method: String, path: String },

    #[error("request body exceeds the limit of {limit} bytes")]
    BodyTooLarge { limit: u64 },

    #[error("failed to read request body")]
    BodyRead(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("content type {found:?} is not accepted, expected {expected}")]
    UnsupportedMediaType { expected: String, found: Option<String> },

    #[error("route produces {produces}, which the client does not accept")]
    NotAcceptable { produces: String },

    #[error("handler fault: {0}")]
    HandlerFault(String),

    #[error("request failed with status {}", .0.status_code())]
    ExplicitFailure(Failure),
}

impl From<DispatchError> for Failure {
    fn from(err: DispatchError) -> Self {
        match err {
            DispatchError::NoMatch { .. } => Self::not_found(err.to_string()),
            DispatchError::BodyTooLarge { .. } => {
                Self::new(StatusCode::PAYLOAD_TOO_LARGE, err.to_string())
            }
            DispatchError::BodyRead(ref source) => {
                let cause = source.to_string();
                Self::new(StatusCode::BAD_REQUEST, err.to_string()).with_cause(cause)
            }
            DispatchError::UnsupportedMediaType { .. } => {
                Self::new(StatusCode::UNSUPPORTED_MEDIA_TYPE, err.to_string())
            }
            DispatchError::NotAcceptable { .. } => {
                Self::new(StatusCode::NOT_ACCEPTABLE, err.to_string())
            }
            DispatchError::HandlerFault(message) => Self::internal(message),
            DispatchError::ExplicitFailure(failure) => failure,
        }
    }
}
