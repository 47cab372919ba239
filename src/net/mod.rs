//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! [listener.tls] in config
//!     → tls.rs (check files, load PEM certificate + key)
//!     → RustlsConfig handed to HttpServer::run_tls
//! ```
//!
//! # Design Decisions
//! - TLS is optional and terminates at the proxy; backends always get plain TCP

pub mod tls;
