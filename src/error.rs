//! Request-scoped error types for the proxy.
//!
//! # Design Decisions
//! - Client-caused failures (`MissingTarget`, `InvalidTarget`) answer 400
//! - Transport failures answer 500 with the raw error text; this is a
//!   developer tool, not a hardened gateway
//! - `RelayWriteFailure` is never rendered, the caller is already gone

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// Errors that can occur while handling one proxied request.
#[derive(Error, Debug)]
pub enum ProxyError {
    #[error("Illegal Parameters")]
    MissingTarget,

    #[error("Invalid Parameters: {reason}")]
    InvalidTarget { target: String, reason: String },

    #[error("{0}")]
    UpstreamUnreachable(String),

    #[error("relay aborted: {0}")]
    RelayWriteFailure(String),

    #[error("failed to build upstream client: {0}")]
    ClientBuild(#[source] reqwest::Error),
}

impl ProxyError {
    /// Status code surfaced to the caller for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::MissingTarget | ProxyError::InvalidTarget { .. } => StatusCode::BAD_REQUEST,
            ProxyError::UpstreamUnreachable(_)
            | ProxyError::RelayWriteFailure(_)
            | ProxyError::ClientBuild(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Wrap a transport error, keeping its whole source chain in the message.
    pub fn upstream(err: &(dyn std::error::Error + 'static)) -> Self {
        ProxyError::UpstreamUnreachable(error_chain(err))
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            ProxyError::MissingTarget => {
                tracing::warn!(status = status.as_u16(), "Missing target parameter");
            }
            ProxyError::InvalidTarget { target, reason } => {
                tracing::warn!(status = status.as_u16(), target = %target, reason = %reason, "Rejected target");
            }
            _ => {
                tracing::error!(status = status.as_u16(), error = %self, "Upstream request failed");
            }
        }
        (status, self.to_string()).into_response()
    }
}

/// Render an error and its sources as `outer: inner: root`.
pub fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        // reqwest and hyper often repeat the inner message in the outer one
        if !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = cause.source();
    }
    message
}
