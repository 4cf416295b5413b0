//! Request routing dispatch module
//!
//! Entry point for HTTP request processing: collects the body, selects the
//! route, runs the handler and funnels every failure through the failure
//! translator.

use futures_util::FutureExt;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::Bytes;
use hyper::header::{ACCEPT, CONTENT_LENGTH, CONTENT_TYPE};
use hyper::{HeaderMap, Method, Request, Response, StatusCode};
use std::convert::Infallible;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use super::context::{Handler, Reply, RequestContext};
use crate::bridge::BlockingBridge;
use crate::config::AppState;
use crate::failure::{self, DispatchError, Failure};
use crate::http::{self, mime};
use crate::logger::{self, AccessLogEntry};
use crate::routing::{PathPattern, Route, RouteError, RouteTable};
use crate::store::EntityStore;

/// Default request body limit (10MB)
const DEFAULT_MAX_BODY_SIZE: u64 = 10_485_760;

/// Method + path router.
///
/// Routes are registered during bootstrap; afterwards the router is only
/// read, so it is shared between connections without locking.
pub struct Router {
    routes: RouteTable<Arc<dyn Handler>>,
    store: Arc<dyn EntityStore>,
    bridge: BlockingBridge,
    max_body_size: u64,
}

impl Router {
    /// Create a router handing `store` to every handler
    pub fn new(store: Arc<dyn EntityStore>, bridge: BlockingBridge) -> Self {
        Self {
            routes: RouteTable::new(),
            store,
            bridge,
            max_body_size: DEFAULT_MAX_BODY_SIZE,
        }
    }

    #[must_use]
    pub fn with_max_body_size(mut self, max_body_size: u64) -> Self {
        self.max_body_size = max_body_size;
        self
    }

    /// Start registering a route for `method` and `pattern`
    pub fn route(&mut self, method: Method, pattern: &str) -> RouteBuilder<'_> {
        RouteBuilder {
            router: self,
            method,
            pattern: pattern.to_string(),
            consumes: None,
            produces: None,
        }
    }

    pub fn get(&mut self, pattern: &str) -> RouteBuilder<'_> {
        self.route(Method::GET, pattern)
    }

    pub fn put(&mut self, pattern: &str) -> RouteBuilder<'_> {
        self.route(Method::PUT, pattern)
    }

    pub fn delete(&mut self, pattern: &str) -> RouteBuilder<'_> {
        self.route(Method::DELETE, pattern)
    }

    pub const fn routes(&self) -> &RouteTable<Arc<dyn Handler>> {
        &self.routes
    }

    pub const fn bridge(&self) -> &BlockingBridge {
        &self.bridge
    }

    pub const fn max_body_size(&self) -> u64 {
        self.max_body_size
    }

    /// Dispatch a request whose body has already been read.
    ///
    /// Never fails: any error becomes a translated failure response.
    pub async fn dispatch(
        &self,
        method: Method,
        path: &str,
        headers: HeaderMap,
        body: Bytes,
    ) -> Response<Full<Bytes>> {
        let Some(found) = self.routes.find(&method, path) else {
            let failure = Failure::from(DispatchError::NoMatch {
                method: method.to_string(),
                path: path.to_string(),
            });
            return fail(&failure, path);
        };
        let route = found.route;

        if let Err(err) = check_media_types(route, &headers) {
            return fail(&Failure::from(err), path);
        }

        let ctx = RequestContext::new(
            path.to_string(),
            found.params,
            body,
            Arc::clone(&self.store),
            self.bridge.clone(),
        );

        match run_handler(route.handler.as_ref(), ctx).await {
            Ok(reply) => {
                let content_type = reply.content_type(route.produces.as_deref()).to_string();
                http::build_response(StatusCode::OK, &content_type, reply.into_body())
            }
            Err(err) => fail(&Failure::from(err), path),
        }
    }
}

/// Builder returned by [`Router::route`]
pub struct RouteBuilder<'a> {
    router: &'a mut Router,
    method: Method,
    pattern: String,
    consumes: Option<String>,
    produces: Option<String>,
}

impl RouteBuilder<'_> {
    /// Require the request `Content-Type` to match (otherwise 415)
    #[must_use]
    pub fn consumes(mut self, media_type: &str) -> Self {
        self.consumes = Some(media_type.to_string());
        self
    }

    /// Content type of successful replies; checked against `Accept` (otherwise 406)
    #[must_use]
    pub fn produces(mut self, media_type: &str) -> Self {
        self.produces = Some(media_type.to_string());
        self
    }

    /// Finish registration with the handler
    pub fn handler<H: Handler>(self, handler: H) -> Result<(), RouteError> {
        let pattern = PathPattern::parse(&self.pattern)?;
        self.router.routes.register(Route {
            method: self.method,
            pattern,
            handler: Arc::new(handler),
            consumes: self.consumes,
            produces: self.produces,
        })
    }
}

/// Run the handler.
///
/// A returned failure becomes `ExplicitFailure`, a panic becomes `HandlerFault`.
async fn run_handler(handler: &dyn Handler, ctx: RequestContext) -> Result<Reply, DispatchError> {
    let path = ctx.path().to_string();
    match AssertUnwindSafe(handler.call(ctx)).catch_unwind().await {
        Ok(result) => result.map_err(DispatchError::ExplicitFailure),
        Err(payload) => {
            let message = Failure::from_panic(payload.as_ref()).message().to_string();
            logger::log_handler_panic(&path, &message);
            Err(DispatchError::HandlerFault(message))
        }
    }
}

fn check_media_types(
    route: &Route<Arc<dyn Handler>>,
    headers: &HeaderMap,
) -> Result<(), DispatchError> {
    if let Some(consumes) = &route.consumes {
        let content_type = headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok());
        if !mime::content_type_matches(content_type, consumes) {
            return Err(DispatchError::UnsupportedMediaType {
                expected: consumes.clone(),
                found: content_type.map(ToString::to_string),
            });
        }
    }

    if let Some(produces) = &route.produces {
        let accept = headers.get(ACCEPT).and_then(|v| v.to_str().ok());
        if !mime::accepts(accept, produces) {
            return Err(DispatchError::NotAcceptable {
                produces: produces.clone(),
            });
        }
    }

    Ok(())
}

fn fail(failure: &Failure, path: &str) -> Response<Full<Bytes>> {
    logger::log_failure(path, failure);
    failure::translate(failure, path)
}

/// Main entry point for HTTP request handling
pub async fn handle_request(
    req: Request<hyper::body::Incoming>,
    state: Arc<AppState>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let started = Instant::now();
    let (parts, body) = req.into_parts();
    let path = parts.uri.path().to_string();
    let mut access = state.config.logging.access_log.then(|| {
        let mut entry = AccessLogEntry::new(
            parts
                .extensions
                .get::<std::net::SocketAddr>()
                .map_or_else(|| "-".to_string(), ToString::to_string),
            parts.method.to_string(),
            path.clone(),
        );
        entry.query = parts.uri.query().map(ToString::to_string);
        entry.http_version = format!("{:?}", parts.version)
            .trim_start_matches("HTTP/")
            .to_string();
        entry.user_agent = header_string(&parts.headers, hyper::header::USER_AGENT);
        entry.referer = header_string(&parts.headers, hyper::header::REFERER);
        entry
    });

    let router = &state.router;
    let collected = read_body(body, &parts.headers, router.max_body_size()).await;
    let mut response = match collected {
        Ok(bytes) => router.dispatch(parts.method, &path, parts.headers, bytes).await,
        Err(err) => fail(&Failure::from(err), &path),
    };
    http::set_server_header(&mut response, &state.config.http.server_name);

    if let Some(entry) = access.as_mut() {
        entry.status = response.status().as_u16();
        entry.body_bytes = response
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);
        entry.request_time_us = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX);
        logger::log_access(entry, &state.config.logging.access_log_format);
    }

    Ok(response)
}

/// Collect the request body, enforcing the size limit
async fn read_body(
    body: hyper::body::Incoming,
    headers: &HeaderMap,
    max_body_size: u64,
) -> Result<Bytes, DispatchError> {
    // Reject early when the declared length is already too large
    let declared = headers
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok());
    if declared.is_some_and(|size| size > max_body_size) {
        return Err(DispatchError::BodyTooLarge {
            limit: max_body_size,
        });
    }

    let limit = usize::try_from(max_body_size).unwrap_or(usize::MAX);
    match Limited::new(body, limit).collect().await {
        Ok(collected) => Ok(collected.to_bytes()),
        Err(err) if err.downcast_ref::<LengthLimitError>().is_some() => {
            Err(DispatchError::BodyTooLarge {
                limit: max_body_size,
            })
        }
        Err(err) => Err(DispatchError::BodyRead(err)),
    }
}

fn header_string(headers: &HeaderMap, name: hyper::header::HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(ToString::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::failure::FAILURE_CONTENT_TYPE;
    use crate::handler::HandlerResult;
    use crate::store::MemoryStore;
    use hyper::header::HeaderValue;

    async fn body_string(response: Response<Full<Bytes>>) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn router() -> Router {
        Router::new(Arc::new(MemoryStore::new()), BlockingBridge::current())
    }

    async fn echo_param(ctx: RequestContext) -> HandlerResult {
        Ok(Reply::text(ctx.param("id").unwrap_or("-").to_string()))
    }

    #[tokio::test]
    async fn test_dispatch_binds_params() {
        let mut router = router();
        router.get("/echo/:id").handler(echo_param).unwrap();

        let response = router
            .dispatch(Method::GET, "/echo/abc", HeaderMap::new(), Bytes::new())
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "abc");
    }

    #[tokio::test]
    async fn test_no_match_is_translated_404() {
        let mut router = router();
        router.get("/echo/:id").handler(echo_param).unwrap();

        for (method, path) in [
            (Method::PUT, "/echo/abc"),
            (Method::GET, "/echo/"),
            (Method::GET, "/unknown"),
        ] {
            let response = router
                .dispatch(method, path, HeaderMap::new(), Bytes::new())
                .await;
            assert_eq!(response.status(), StatusCode::NOT_FOUND);
            assert_eq!(response.headers()[CONTENT_TYPE], FAILURE_CONTENT_TYPE);
            let body = body_string(response).await;
            assert!(body.contains(path));
            assert!(body.contains("404"));
        }
    }

    #[tokio::test]
    async fn test_handler_panic_becomes_500() {
        let mut router = router();
        router
            .get("/panic")
            .handler(|_ctx: RequestContext| async move {
                if true {
                    panic!("handler blew up");
                }
                Ok::<_, Failure>(Reply::text("unreachable"))
            })
            .unwrap();

        let response = router
            .dispatch(Method::GET, "/panic", HeaderMap::new(), Bytes::new())
            .await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body_string(response).await.contains("handler blew up"));
    }

    #[tokio::test]
    async fn test_run_handler_classifies_outcomes() {
        let ctx = || {
            RequestContext::new(
                "/t".to_string(),
                crate::routing::Params::new(),
                Bytes::new(),
                Arc::new(MemoryStore::new()),
                BlockingBridge::current(),
            )
        };

        let ok = |_ctx: RequestContext| async { Ok::<_, Failure>(Reply::text("ok")) };
        assert!(run_handler(&ok, ctx()).await.is_ok());

        let explicit = |_ctx: RequestContext| async {
            Err::<Reply, _>(Failure::status(StatusCode::NOT_FOUND))
        };
        match run_handler(&explicit, ctx()).await {
            Err(DispatchError::ExplicitFailure(failure)) => {
                assert_eq!(failure.status_code(), StatusCode::NOT_FOUND);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }

        let faulty = |_ctx: RequestContext| async {
            if true {
                panic!("fault in handler");
            }
            Ok::<_, Failure>(Reply::text("unreachable"))
        };
        match run_handler(&faulty, ctx()).await {
            Err(DispatchError::HandlerFault(message)) => assert_eq!(message, "fault in handler"),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_offload_fault_becomes_500() {
        let mut router = router();
        router
            .get("/fault")
            .handler(|ctx: RequestContext| async move {
                let value: u32 = ctx
                    .offload(|| -> Result<u32, Failure> { panic!("worker fault") })
                    .await?;
                Ok::<_, Failure>(Reply::text(value.to_string()))
            })
            .unwrap();

        let response = router
            .dispatch(Method::GET, "/fault", HeaderMap::new(), Bytes::new())
            .await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body_string(response).await.contains("worker fault"));
        assert_eq!(router.bridge().in_flight(), 0);
    }

    #[tokio::test]
    async fn test_consumes_mismatch_is_415() {
        let mut router = router();
        router
            .put("/json")
            .consumes("application/json")
            .handler(|_ctx: RequestContext| async { Ok::<_, Failure>(Reply::text("ok")) })
            .unwrap();

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/plain"));
        let response = router
            .dispatch(Method::PUT, "/json", headers, Bytes::from("x"))
            .await;
        assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);

        let mut headers = HeaderMap::new();
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("application/json; charset=utf-8"),
        );
        let response = router
            .dispatch(Method::PUT, "/json", headers, Bytes::from("{}"))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_produces_sets_content_type_and_checks_accept() {
        let mut router = router();
        router
            .get("/doc")
            .produces("text/json")
            .handler(|_ctx: RequestContext| async { Reply::json(&serde_json::json!({"ok": true})) })
            .unwrap();

        let response = router
            .dispatch(Method::GET, "/doc", HeaderMap::new(), Bytes::new())
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[CONTENT_TYPE], "text/json");

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("image/png"));
        let response = router
            .dispatch(Method::GET, "/doc", headers, Bytes::new())
            .await;
        assert_eq!(response.status(), StatusCode::NOT_ACCEPTABLE);
    }

    #[tokio::test]
    async fn test_explicit_failure_keeps_status() {
        let mut router = router();
        router
            .delete("/gone/:id")
            .handler(|_ctx: RequestContext| async {
                Err::<Reply, _>(Failure::status(StatusCode::GONE))
            })
            .unwrap();

        let response = router
            .dispatch(Method::DELETE, "/gone/1", HeaderMap::new(), Bytes::new())
            .await;
        assert_eq!(response.status(), StatusCode::GONE);
        let body = body_string(response).await;
        assert!(body.contains("/gone/1"));
        assert!(body.contains("410"));
    }

    #[test]
    fn test_duplicate_registration_fails() {
        let store: Arc<dyn EntityStore> = Arc::new(MemoryStore::new());
        let runtime = tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap();
        let mut router = Router::new(store, BlockingBridge::new(runtime.handle().clone()));

        router.get("/echo/:id").handler(echo_param).unwrap();
        let err = router.get("/echo/:id").handler(echo_param).unwrap_err();
        assert!(matches!(err, RouteError::Conflict { .. }));
        assert!(matches!(
            router.get("no-slash").handler(echo_param),
            Err(RouteError::InvalidPattern { .. })
        ));
        assert_eq!(router.routes().len(), 1);
    }
}
