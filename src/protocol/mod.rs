//! uwsgi wire protocol.
//!
//! # Data Flow
//! ```text
//! http::Request parts
//!     → context.rs (RequestContext: method, uri, host, peer, tls, headers)
//!     → vars.rs (CGI-style Vars, headers normalized to HTTP_*)
//!     → packet.rs (length-prefixed block + 4-byte header)
//!     → transport
//! ```
//!
//! # Design Decisions
//! - Vars are kept sorted so packets are deterministic
//! - Length overflow is an error, never a silent wrap

pub mod context;
pub mod packet;
pub mod vars;

pub use context::RequestContext;
pub use packet::{DecodeError, EncodeError, Packet};
pub use vars::{normalize_header, percent_decode, Vars};

/// Encode a request's metadata into a ready-to-send packet.
pub fn encode(ctx: &RequestContext) -> Result<Packet, EncodeError> {
    Packet::encode(&Vars::from_context(ctx))
}
