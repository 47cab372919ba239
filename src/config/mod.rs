//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)            directive file / --uwsgi FROM TO
//!     → loader.rs                   → directive.rs
//!     → routes appended in declaration order
//!     → validation.rs (semantic checks)
//!     → ProxyConfig (validated, immutable)
//!     → shared via Arc to all subsystems
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod directive;
pub mod loader;
pub mod schema;
pub mod validation;

pub use schema::ProxyConfig;
pub use schema::ListenerConfig;
pub use schema::RouteConfig;
pub use schema::TimeoutConfig;
