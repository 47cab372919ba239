//! Response relay.
//!
//! # Responsibilities
//! - Copy backend headers onto the client response
//! - Forward the backend status and stream its body
//!
//! # Design Decisions
//! - Backend headers replace client-side values of the same name, never merge
//! - Headers the backend does not mention are left alone

use axum::body::Body;
use axum::http::{Response, StatusCode};

use crate::transport::BackendResponse;

/// Relay `backend` into `client`, returning the forwarded status.
pub fn relay(mut client: Response<Body>, backend: BackendResponse) -> (StatusCode, Response<Body>) {
    let BackendResponse { status, headers, body } = backend;

    let dst = client.headers_mut();
    for name in headers.keys() {
        dst.remove(name);
        for value in headers.get_all(name) {
            dst.append(name.clone(), value.clone());
        }
    }

    *client.status_mut() = status;
    *client.body_mut() = body;
    (status, client)
}
