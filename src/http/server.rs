//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router: uwsgi middleware in front of the next handler
//! - Wire up middleware (tracing, timeout, request ID)
//! - Serve over plain TCP or TLS
//! - Graceful shutdown on the lifecycle signal

use axum::{
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::IntoResponse,
    Router,
};
use axum_server::tls_rustls::RustlsConfig;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::ProxyConfig;
use crate::http::proxy::{self, ProxyState};
use crate::http::request::{propagate_request_id_layer, set_request_id_layer};
use crate::transport::{BackendTransport, TcpTransport};

/// How long in-flight requests get to finish once shutdown starts (TLS listener).
const TLS_DRAIN_SECS: u64 = 10;

/// HTTP server for the uwsgi proxy.
pub struct HttpServer {
    router: Router,
    config: ProxyConfig,
}

impl HttpServer {
    /// Create a server that dials backends over TCP and answers unmatched
    /// paths with 404.
    pub fn new(config: ProxyConfig) -> Self {
        let transport = Arc::new(TcpTransport::from_config(&config.timeouts));
        Self::with_transport(config, transport)
    }

    pub fn with_transport(config: ProxyConfig, transport: Arc<dyn BackendTransport>) -> Self {
        Self::with_next(config, transport, Router::new().fallback(not_found))
    }

    /// Full constructor: `next` handles every request no route claims.
    pub fn with_next(config: ProxyConfig, transport: Arc<dyn BackendTransport>, next: Router) -> Self {
        let state = ProxyState::new(config.routes.clone(), transport)
            .with_response_headers(default_headers(&config))
            .with_tls(config.listener.tls.is_some());

        tracing::info!(routes = state.router().len(), "uwsgi routes compiled");
        for route in &config.routes {
            tracing::debug!(from = %route.from, to = %route.to, "uwsgi route");
        }

        let router = Self::build_router(&config, state, next);
        Self { router, config }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &ProxyConfig, state: ProxyState, next: Router) -> Router {
        proxy::wrap(next, state)
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(propagate_request_id_layer())
            .layer(TraceLayer::new_for_http())
            .layer(set_request_id_layer())
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(self, listener: TcpListener, mut shutdown: broadcast::Receiver<()>) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            "HTTP server starting"
        );

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Run the server over TLS on `addr`.
    pub async fn run_tls(
        self,
        addr: SocketAddr,
        tls: RustlsConfig,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        tracing::info!(address = %addr, "HTTPS server starting");

        let handle = axum_server::Handle::new();
        let drain = handle.clone();
        tokio::spawn(async move {
            let _ = shutdown.recv().await;
            tracing::info!("Shutdown signal received");
            drain.graceful_shutdown(Some(Duration::from_secs(TLS_DRAIN_SECS)));
        });

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        axum_server::bind_rustls(addr, tls).handle(handle).serve(app).await?;

        tracing::info!("HTTPS server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    /// The assembled router, for in-process testing.
    pub fn into_router(self) -> Router {
        self.router
    }
}

fn default_headers(config: &ProxyConfig) -> HeaderMap {
    let mut headers = HeaderMap::new();
    for (name, value) in &config.security.response_headers {
        // validation already rejected malformed entries
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            headers.append(name, value);
        }
    }
    headers
}

async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, "No matching route found")
}
