//! uwsgi middleware.
//!
//! Sits in front of any axum `Router` (the "next" handler). Requests whose
//! path matches a configured prefix are answered by a uwsgi backend; every
//! other request is passed through untouched.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Body,
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, Method, Response},
    middleware::{self, Next},
    response::IntoResponse,
};

use crate::config::RouteConfig;
use crate::http::relay::relay;
use crate::http::request::RequestIdExt;
use crate::observability::metrics;
use crate::protocol::{self, RequestContext};
use crate::routing::Router as ProxyRouter;
use crate::transport::{BackendRequest, BackendResponse, BackendTransport, ExchangeError};

/// Shared state for the uwsgi middleware.
#[derive(Clone)]
pub struct ProxyState {
    router: Arc<ProxyRouter>,
    transport: Arc<dyn BackendTransport>,
    response_headers: Arc<HeaderMap>,
    tls: bool,
}

impl ProxyState {
    pub fn new(routes: Vec<RouteConfig>, transport: Arc<dyn BackendTransport>) -> Self {
        Self {
            router: Arc::new(ProxyRouter::from_config(routes)),
            transport,
            response_headers: Arc::new(HeaderMap::new()),
            tls: false,
        }
    }

    /// Headers every proxied response starts out with.
    pub fn with_response_headers(mut self, headers: HeaderMap) -> Self {
        self.response_headers = Arc::new(headers);
        self
    }

    /// Mark inbound connections as TLS (forwarded as `HTTPS=on`).
    pub fn with_tls(mut self, tls: bool) -> Self {
        self.tls = tls;
        self
    }

    pub fn router(&self) -> &ProxyRouter {
        &self.router
    }

    fn base_response(&self) -> Response<Body> {
        let mut response = Response::new(Body::empty());
        *response.headers_mut() = (*self.response_headers).clone();
        response
    }
}

/// Failure attached to 502/504 responses so outer layers can inspect it.
#[derive(Debug, Clone)]
pub struct ProxyError(pub Arc<ExchangeError>);

/// Wrap `next` so matching requests go to uwsgi backends.
pub fn wrap(next: axum::Router, state: ProxyState) -> axum::Router {
    next.layer(middleware::from_fn_with_state(state, uwsgi_middleware))
}

/// Main proxy middleware.
/// Looks up the route, runs the backend exchange and relays the answer.
pub async fn uwsgi_middleware(
    State(state): State<ProxyState>,
    request: Request,
    next: Next,
) -> Response<Body> {
    let Some(route) = state.router.match_path(request.uri().path()) else {
        metrics::record_passthrough();
        return next.run(request).await;
    };

    let start_time = Instant::now();
    let backend = route.to.clone();
    let request_id = request.request_id().to_string();
    let method = request.method().clone();

    tracing::debug!(
        request_id = %request_id,
        method = %method,
        path = %request.uri().path(),
        backend = %backend,
        "Forwarding to uwsgi backend"
    );

    let remote_addr = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let (parts, body) = request.into_parts();
    let ctx = RequestContext::from_parts(&parts, remote_addr, state.tls);

    match forward(&state, &ctx, backend.clone(), method.clone(), body).await {
        Ok(response) => {
            let (status, response) = relay(state.base_response(), response);
            metrics::record_request(method.as_str(), status.as_u16(), &backend, start_time);
            tracing::debug!(request_id = %request_id, status = status.as_u16(), "Backend responded");
            response
        }
        Err(e) => {
            let status = e.status();
            tracing::error!(
                request_id = %request_id,
                backend = %backend,
                kind = e.kind(),
                error = %e,
                "Upstream error"
            );
            metrics::record_backend_error(&backend, e.kind());
            metrics::record_request(method.as_str(), status.as_u16(), &backend, start_time);

            let mut response = (status, "Upstream request failed").into_response();
            response.extensions_mut().insert(ProxyError(Arc::new(e)));
            response
        }
    }
}

async fn forward(
    state: &ProxyState,
    ctx: &RequestContext,
    address: String,
    method: Method,
    body: Body,
) -> Result<BackendResponse, ExchangeError> {
    let packet = protocol::encode(ctx)?;

    state
        .transport
        .exchange(BackendRequest {
            address,
            packet,
            method,
            body,
        })
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use axum::http::{HeaderValue, Request, StatusCode};
    use axum::routing::get;
    use futures_util::future::BoxFuture;
    use tower::ServiceExt;

    use crate::protocol::packet::decode_packet;
    use crate::protocol::Vars;

    /// Records what it was asked to send and answers with a canned response.
    #[derive(Default)]
    struct RecordingTransport {
        seen: Mutex<Vec<(String, Vars)>>,
        fail: bool,
    }

    impl BackendTransport for RecordingTransport {
        fn exchange(&self, request: BackendRequest) -> BoxFuture<'static, Result<BackendResponse, ExchangeError>> {
            let vars = decode_packet(&request.packet.to_bytes()).unwrap();
            self.seen.lock().unwrap().push((request.address.clone(), vars));
            let fail = self.fail;
            let address = request.address;

            Box::pin(async move {
                if fail {
                    return Err(ExchangeError::Dial {
                        address,
                        source: std::io::Error::from(std::io::ErrorKind::ConnectionRefused),
                    });
                }
                let mut headers = HeaderMap::new();
                headers.insert("x-frame-options", HeaderValue::from_static("SAMEORIGIN"));
                Ok(BackendResponse {
                    status: StatusCode::CREATED,
                    headers,
                    body: Body::from("from backend"),
                })
            })
        }
    }

    fn app(transport: Arc<RecordingTransport>) -> axum::Router {
        let mut defaults = HeaderMap::new();
        defaults.insert("x-frame-options", HeaderValue::from_static("DENY"));

        let state = ProxyState::new(
            vec![
                RouteConfig::new("/a", "h1:1"),
                RouteConfig::new("/a/b", "h2:1"),
            ],
            transport,
        )
        .with_response_headers(defaults);

        let next = axum::Router::new()
            .route("/z", get(|| async { "next handler" }))
            .fallback(|| async { (StatusCode::NOT_FOUND, "not found") });
        wrap(next, state)
    }

    #[tokio::test]
    async fn test_matched_request_goes_to_longest_prefix() {
        let transport = Arc::new(RecordingTransport::default());
        let response = app(transport.clone())
            .oneshot(Request::get("/a/b/c?q=1").header("X-My-Header", "a").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(response.headers()["x-frame-options"], "SAMEORIGIN");

        let seen = transport.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        let (address, vars) = &seen[0];
        assert_eq!(address, "h2:1");
        assert_eq!(vars.get("REQUEST_URI"), Some("/a/b/c?q=1"));
        assert_eq!(vars.get("QUERY_STRING"), Some("q=1"));
        assert_eq!(vars.get("HTTP_X_MY_HEADER"), Some("a"));
        assert!(!vars.contains("HTTPS"));
    }

    #[tokio::test]
    async fn test_encoded_path_routed_by_decoded_form() {
        let transport = Arc::new(RecordingTransport::default());
        let response = app(transport.clone())
            .oneshot(Request::get("/%61/b/c").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let seen = transport.seen.lock().unwrap();
        let (address, vars) = &seen[0];
        assert_eq!(address, "h2:1");
        assert_eq!(vars.get("REQUEST_URI"), Some("/%61/b/c"));
        assert_eq!(vars.get("PATH_INFO"), Some("/a/b/c"));
    }

    #[tokio::test]
    async fn test_unmatched_request_reaches_next_handler() {
        let transport = Arc::new(RecordingTransport::default());
        let response = app(transport.clone())
            .oneshot(Request::get("/z").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().get("x-frame-options").is_none());
        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        assert_eq!(&body[..], b"next handler");
        assert!(transport.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_exchange_failure_is_bad_gateway() {
        let transport = Arc::new(RecordingTransport {
            fail: true,
            ..Default::default()
        });
        let response = app(transport)
            .oneshot(Request::get("/a/x").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let error = response.extensions().get::<ProxyError>().unwrap();
        assert!(matches!(*error.0, ExchangeError::Dial { .. }));
        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        assert_eq!(&body[..], b"Upstream request failed");
    }

    #[tokio::test]
    async fn test_tls_flag_forwarded() {
        let transport = Arc::new(RecordingTransport::default());
        let state = ProxyState::new(vec![RouteConfig::new("/", "h:1")], transport.clone()).with_tls(true);
        let app = wrap(axum::Router::new(), state);

        app.oneshot(Request::get("/secure").body(Body::empty()).unwrap())
            .await
            .unwrap();

        let seen = transport.seen.lock().unwrap();
        assert_eq!(seen[0].1.get("HTTPS"), Some("on"));
    }
}
