//! Request context and reply types
//!
//! A handler receives a [`RequestContext`] and returns exactly one terminal
//! outcome: `Ok(Reply)` writes a body and finalizes the response,
//! `Err(Failure)` fails the request with a status code.

use futures_util::future::BoxFuture;
use hyper::body::Bytes;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;

use crate::bridge::{BlockingBridge, Deferred};
use crate::failure::Failure;
use crate::routing::Params;
use crate::store::{EntityStore, StoreSession};

/// Terminal outcome of a handler
pub type HandlerResult = Result<Reply, Failure>;

/// Request handler registered on a route
pub trait Handler: Send + Sync + 'static {
    fn call(&self, ctx: RequestContext) -> BoxFuture<'static, HandlerResult>;
}

impl<F, Fut> Handler for F
where
    F: Fn(RequestContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    fn call(&self, ctx: RequestContext) -> BoxFuture<'static, HandlerResult> {
        Box::pin(self(ctx))
    }
}

/// Per-request data handed to a handler
pub struct RequestContext {
    path: String,
    params: Params,
    body: Bytes,
    store: Arc<dyn EntityStore>,
    bridge: BlockingBridge,
}

impl RequestContext {
    pub(crate) fn new(
        path: String,
        params: Params,
        body: Bytes,
        store: Arc<dyn EntityStore>,
        bridge: BlockingBridge,
    ) -> Self {
        Self {
            path,
            params,
            body,
            store,
            bridge,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Value bound to a `:name` path parameter
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    /// Request body as UTF-8 text
    pub fn body_str(&self) -> Result<&str, Failure> {
        std::str::from_utf8(&self.body)
            .map_err(|e| Failure::internal("request body is not valid UTF-8").with_cause(e))
    }

    /// Path parameter parsed as an integer id.
    ///
    /// A missing or non-numeric value is a handler fault (500).
    pub fn id_param(&self, name: &str) -> Result<i64, Failure> {
        let raw = self
            .param(name)
            .ok_or_else(|| Failure::internal(format!("missing path parameter :{name}")))?;
        raw.parse().map_err(|e| {
            Failure::internal(format!("invalid value {raw:?} for path parameter :{name}"))
                .with_cause(e)
        })
    }

    /// Run a blocking operation off the accepting loop
    pub fn offload<T, E, F>(&self, operation: F) -> Deferred<T>
    where
        F: FnOnce() -> Result<T, E> + Send + 'static,
        T: Send + 'static,
        E: Into<Failure>,
    {
        self.bridge.offload(operation)
    }

    /// Run `work` against a fresh store session on a worker thread.
    ///
    /// The session is dropped, and therefore released, when `work` returns,
    /// fails or panics.
    pub fn with_session<T, F>(&self, work: F) -> Deferred<T>
    where
        F: FnOnce(&mut dyn StoreSession) -> Result<T, Failure> + Send + 'static,
        T: Send + 'static,
    {
        let store = Arc::clone(&self.store);
        self.offload(move || {
            let mut session = store.open_session()?;
            work(session.as_mut())
        })
    }
}

/// Successful (200) response produced by a handler
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    fallback_content_type: &'static str,
    body: Bytes,
}

impl Reply {
    /// JSON body. The content type comes from the route's `produces`,
    /// falling back to `application/json`.
    pub fn json<T: Serialize>(value: &T) -> Result<Self, Failure> {
        let body = serde_json::to_vec(value)
            .map_err(|e| Failure::internal("failed to encode response as JSON").with_cause(e))?;
        Ok(Self {
            fallback_content_type: "application/json",
            body: Bytes::from(body),
        })
    }

    /// Plain text body
    pub fn text(body: impl Into<String>) -> Self {
        Self {
            fallback_content_type: "text/plain; charset=utf-8",
            body: Bytes::from(body.into()),
        }
    }

    /// Effective content type: the route's `produces` setting, if any
    pub fn content_type<'a>(&'a self, produces: Option<&'a str>) -> &'a str {
        produces.unwrap_or(self.fallback_content_type)
    }

    pub fn into_body(self) -> Bytes {
        self.body
    }
}
