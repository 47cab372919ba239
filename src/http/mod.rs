//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → server.rs (Axum setup, tracing, timeout, request ID)
//!     → proxy.rs (route match: pass through to next handler, or...)
//!     → protocol + transport (encode, exchange with backend)
//!     → relay.rs (backend status, headers, body onto the client response)
//!     → Send to client
//! ```

pub mod proxy;
pub mod relay;
pub mod request;
pub mod server;

pub use proxy::{ProxyError, ProxyState};
pub use request::{RequestIdExt, X_REQUEST_ID};
pub use server::HttpServer;
