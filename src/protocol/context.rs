//! Request metadata captured for a single backend exchange.

use axum::http::{request::Parts, uri::Authority, HeaderMap, Version};

/// Everything the encoder needs to know about one inbound request.
///
/// The body is kept apart and handed to the transport directly, so a
/// context is plain data and cheap to inspect in tests.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    /// Request method; empty is treated as `GET`.
    pub method: String,
    /// Protocol version string, e.g. `HTTP/1.1`.
    pub protocol: String,
    /// Raw (still percent-encoded) path.
    pub path: String,
    /// Raw query string without the leading `?`.
    pub query: String,
    /// Host the client addressed, with port if one was given.
    pub host: String,
    /// Peer address as `ip:port`.
    pub remote_addr: String,
    /// Whether the client connection is TLS.
    pub tls: bool,
    pub headers: HeaderMap,
}

impl RequestContext {
    /// Capture metadata from request parts.
    ///
    /// The host comes from the `Host` header and falls back to the URI
    /// authority (HTTP/2 requests carry `:authority` instead).
    pub fn from_parts(parts: &Parts, remote_addr: Option<std::net::SocketAddr>, tls: bool) -> Self {
        let host = parts
            .headers
            .get(axum::http::header::HOST)
            .and_then(|h| h.to_str().ok())
            .map(str::to_string)
            .or_else(|| parts.uri.authority().map(Authority::to_string))
            .unwrap_or_default();

        Self {
            method: parts.method.as_str().to_string(),
            protocol: protocol_string(parts.version).to_string(),
            path: parts.uri.path().to_string(),
            query: parts.uri.query().unwrap_or_default().to_string(),
            host,
            remote_addr: remote_addr.map(|a| a.to_string()).unwrap_or_default(),
            tls,
            headers: parts.headers.clone(),
        }
    }

    /// Path plus `?query`, the way the client sent it.
    pub fn request_uri(&self) -> String {
        let path = if self.path.is_empty() { "/" } else { self.path.as_str() };
        if self.query.is_empty() {
            path.to_string()
        } else {
            format!("{}?{}", path, self.query)
        }
    }
}

fn protocol_string(version: Version) -> &'static str {
    match version {
        Version::HTTP_09 => "HTTP/0.9",
        Version::HTTP_10 => "HTTP/1.0",
        Version::HTTP_2 => "HTTP/2.0",
        Version::HTTP_3 => "HTTP/3.0",
        _ => "HTTP/1.1",
    }
}
