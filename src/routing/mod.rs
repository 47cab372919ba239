//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (path)
//!     → router.rs (scan every route)
//!     → matcher.rs (segment-aware prefix test)
//!     → Return: longest matching RouteConfig or None
//!
//! Route Compilation (at startup):
//!     RouteConfig[] (declaration order)
//!     → Compile matchers (cleaned prefixes)
//!     → Freeze as immutable Router
//! ```
//!
//! # Design Decisions
//! - Routes compiled at startup, immutable at runtime
//! - No regex in hot path (prefix matching only)
//! - Deterministic: same input always matches same route
//! - Longest prefix wins; equal lengths resolve to the first declared

pub mod matcher;
pub mod router;

pub use router::Router;
