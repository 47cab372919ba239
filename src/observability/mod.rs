//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Proxy middleware and transport produce:
//!     → logging.rs (structured log events via tracing)
//!     → metrics.rs (counters, histograms)
//!
//! Consumers:
//!     → stdout (fmt layer, filtered by RUST_LOG or config)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Request ID flows through every log line of a proxied request
//! - Metric updates are no-ops until an exporter is installed

pub mod logging;
pub mod metrics;
