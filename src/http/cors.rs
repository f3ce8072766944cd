//! CORS and preflight middleware.
//!
//! Wraps every route. Assigns the request ID, logs the inbound line,
//! answers `OPTIONS` itself with 204, and fills in the cross-origin
//! response headers on whatever the inner handler returns.
//!
//! # Design Decisions
//! - `Access-Control-Allow-Origin` echoes the caller's `Origin` with
//!   credentials allowed: any origin that asks is trusted
//! - Headers are only added when the response lacks them, so an upstream's
//!   own CORS headers are relayed untouched
//! - No `Origin` on the request means no `Access-Control-Allow-Origin`

use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, HeaderName, HeaderValue, Method, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::Instrument;

use crate::config::CorsConfig;
use crate::http::request::RequestId;
use crate::observability::metrics;
use crate::proxy::relay::Relayed;

/// Precomputed CORS header values.
#[derive(Debug, Clone)]
pub struct CorsPolicy {
    allow_methods: HeaderValue,
    allow_credentials: bool,
}

impl CorsPolicy {
    /// Build from config. Falls back to the default method list if the
    /// configured one is not a valid header value; validation rejects that
    /// case before startup.
    pub fn from_config(config: &CorsConfig) -> Self {
        let allow_methods = HeaderValue::from_str(&config.allow_methods).unwrap_or_else(|_| {
            HeaderValue::from_static("GET, POST, PUT, DELETE, PATCH, OPTIONS")
        });
        Self {
            allow_methods,
            allow_credentials: config.allow_credentials,
        }
    }

    /// Add the CORS headers missing from `headers`.
    pub fn apply(&self, origin: Option<&HeaderValue>, headers: &mut HeaderMap) {
        if let Some(origin) = origin {
            set_if_absent(headers, header::ACCESS_CONTROL_ALLOW_ORIGIN, origin.clone());
        }
        set_if_absent(
            headers,
            header::ACCESS_CONTROL_ALLOW_METHODS,
            self.allow_methods.clone(),
        );
        if self.allow_credentials {
            set_if_absent(
                headers,
                header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
                HeaderValue::from_static("true"),
            );
        }
    }
}

impl Default for CorsPolicy {
    fn default() -> Self {
        Self::from_config(&CorsConfig::default())
    }
}

fn set_if_absent(headers: &mut HeaderMap, name: HeaderName, value: HeaderValue) {
    headers.entry(name).or_insert(value);
}

/// Middleware answering preflights and decorating every response.
pub async fn cors_middleware(
    State(policy): State<Arc<CorsPolicy>>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let start = Instant::now();
    let request_id = RequestId::new();
    request.extensions_mut().insert(request_id);

    let method = request.method().clone();
    let uri = request.uri().clone();
    let origin = request.headers().get(header::ORIGIN).cloned();

    let span = tracing::info_span!("request", request_id = %request_id);
    tracing::info!(parent: &span, "<-- [{}] {}", method, uri);

    let mut response = if method == Method::OPTIONS {
        StatusCode::NO_CONTENT.into_response()
    } else {
        next.run(request).instrument(span.clone()).await
    };

    policy.apply(origin.as_ref(), response.headers_mut());

    let status = response.status();
    metrics::record_request(method.as_str(), status.as_u16(), start);
    // relayed bodies log their own end line once the stream finishes
    if response.extensions().get::<Relayed>().is_some() {
        tracing::debug!(
            parent: &span,
            status = status.as_u16(),
            elapsed = ?start.elapsed(),
            "Response head ready for [{}] {}",
            method,
            uri
        );
    } else {
        tracing::info!(
            parent: &span,
            "--> [{}] {} {} +{:?}",
            method,
            status.as_u16(),
            uri,
            start.elapsed()
        );
    }

    response
}
