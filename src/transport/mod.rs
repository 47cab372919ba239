//! Backend transport subsystem.
//!
//! # Data Flow
//! ```text
//! BackendRequest (address, packet, method, body)
//!     → tcp.rs (dial, write header + block + body)
//!     → response.rs (parse HTTP/1.x head from the same stream)
//!     → body.rs (lazy body stream: length / chunked / until EOF)
//!     → BackendResponse
//! ```
//!
//! # Design Decisions
//! - One connection per exchange, never reused
//! - The connection lives inside the response body and closes with it
//! - The transport is a trait object injected into the server state

use std::time::Duration;

use axum::body::Body;
use axum::http::{HeaderMap, Method, StatusCode};
use futures_util::future::BoxFuture;
use thiserror::Error;

use crate::protocol::{EncodeError, Packet};

pub mod body;
pub mod response;
pub mod tcp;

pub use tcp::TcpTransport;

/// One request bound for a backend.
#[derive(Debug)]
pub struct BackendRequest {
    /// Backend `host:port`.
    pub address: String,
    pub packet: Packet,
    /// Needed to frame the response (`HEAD` answers carry no body).
    pub method: Method,
    pub body: Body,
}

/// A parsed backend response whose body is still on the wire.
#[derive(Debug)]
pub struct BackendResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Body,
}

/// Errors that end an exchange before a response could be relayed.
#[derive(Debug, Error)]
pub enum ExchangeError {
    #[error("failed to connect to backend {address}: {source}")]
    Dial {
        address: String,
        source: std::io::Error,
    },

    #[error("failed to send request to backend: {0}")]
    Write(#[source] std::io::Error),

    #[error("failed to read client request body: {0}")]
    RequestBody(#[source] axum::Error),

    #[error("failed to read backend response: {0}")]
    Read(#[source] std::io::Error),

    #[error("malformed backend response: {0}")]
    Parse(String),

    #[error("backend {phase} timed out after {after:?}")]
    Timeout { phase: &'static str, after: Duration },

    #[error("cannot encode request: {0}")]
    Encode(#[from] EncodeError),
}

impl ExchangeError {
    /// Short label for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            ExchangeError::Dial { .. } => "dial",
            ExchangeError::Write(_) => "write",
            ExchangeError::RequestBody(_) => "request_body",
            ExchangeError::Read(_) => "read",
            ExchangeError::Parse(_) => "parse",
            ExchangeError::Timeout { .. } => "timeout",
            ExchangeError::Encode(_) => "encode",
        }
    }

    /// Status returned to the client for this failure.
    pub fn status(&self) -> StatusCode {
        match self {
            ExchangeError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::BAD_GATEWAY,
        }
    }
}

/// Performs a single request/response exchange with a backend.
pub trait BackendTransport: Send + Sync + 'static {
    fn exchange(&self, request: BackendRequest) -> BoxFuture<'static, Result<BackendResponse, ExchangeError>>;
}
