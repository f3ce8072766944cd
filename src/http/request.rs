//! Per-request identity.
//!
//! # Responsibilities
//! - Generate a unique request ID (UUID v4) as early as possible
//! - Carry it in request extensions so the forwarder can log with it
//!
//! # Design Decisions
//! - The ID is never injected into forwarded headers; outbound headers
//!   mirror the caller's exactly

use axum::{body::Body, http::Request};
use uuid::Uuid;

/// Unique identifier assigned to each inbound request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestId(Uuid);

impl RequestId {
    /// Generate a new random request ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Access to the request ID stored in a request's extensions.
pub trait RequestIdExt {
    /// The assigned ID, if the request passed through the CORS layer.
    fn request_id(&self) -> Option<RequestId>;
}

impl RequestIdExt for Request<Body> {
    fn request_id(&self) -> Option<RequestId> {
        self.extensions().get::<RequestId>().copied()
    }
}
