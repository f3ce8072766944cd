//! Outbound dispatch and response relay.
//!
//! # Responsibilities
//! - Build the upstream request (method, target URL, filtered headers, body)
//! - Dispatch it once with the configured client
//! - Turn the upstream response into a streamed caller response
//!
//! # Design Decisions
//! - One attempt per inbound request, never retried
//! - Redirects are a client setting; the default relays 3xx as-is
//! - The dispatch timeout bounds waiting for response headers only, so long
//!   downloads are not cut off

use std::time::{Duration, Instant};

use axum::{
    body::{Body, HttpBody},
    http::Request,
    response::Response,
};
use reqwest::{redirect, Client};
use url::Url;

use crate::config::{RedirectPolicy, UpstreamConfig};
use crate::error::ProxyError;
use crate::http::headers::{filtered, OUTBOUND_EXCLUDED, RELAY_EXCLUDED};
use crate::http::request::RequestIdExt;
use crate::observability::metrics;
use crate::proxy::relay::{Exchange, RelayStream, Relayed};

/// Forwards one inbound request to its target and relays the answer.
///
/// Cheap to clone; clones share the client's connection pool.
#[derive(Clone, Debug)]
pub struct Forwarder {
    client: Client,
    dispatch_timeout: Duration,
}

impl Forwarder {
    /// Build a forwarder with its own client configured from `config`.
    pub fn new(config: &UpstreamConfig) -> Result<Self, ProxyError> {
        let redirect = match config.redirect {
            RedirectPolicy::None => redirect::Policy::none(),
            RedirectPolicy::Follow => redirect::Policy::limited(config.max_redirects),
        };

        let client = Client::builder()
            .redirect(redirect)
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .pool_idle_timeout(Duration::from_secs(config.pool_idle_timeout_secs))
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .no_proxy()
            .build()
            .map_err(ProxyError::ClientBuild)?;

        tracing::debug!(
            redirect = ?config.redirect,
            connect_timeout_secs = config.connect_timeout_secs,
            dispatch_timeout_secs = config.dispatch_timeout_secs,
            "Upstream client ready"
        );

        Ok(Self::with_client(
            client,
            Duration::from_secs(config.dispatch_timeout_secs),
        ))
    }

    /// Use a caller-supplied client, e.g. one with custom TLS roots.
    pub fn with_client(client: Client, dispatch_timeout: Duration) -> Self {
        Self {
            client,
            dispatch_timeout,
        }
    }

    /// Forward `request` to `target` and return the relayed response.
    ///
    /// The response body streams from upstream; the upstream connection is
    /// released when that body is finished or dropped.
    pub async fn forward(&self, request: Request<Body>, target: Url) -> Result<Response, ProxyError> {
        let started = Instant::now();
        let request_id = request.request_id();
        let (parts, body) = request.into_parts();

        let mut outbound = self
            .client
            .request(parts.method.clone(), target.clone())
            .headers(filtered(&parts.headers, &OUTBOUND_EXCLUDED));
        if !body.is_end_stream() {
            outbound = outbound.body(reqwest::Body::wrap_stream(body.into_data_stream()));
        }

        tracing::debug!(
            request_id = ?request_id,
            method = %parts.method,
            target_url = %target,
            "Dispatching upstream request"
        );

        let upstream = match tokio::time::timeout(self.dispatch_timeout, outbound.send()).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                metrics::record_upstream_error();
                return Err(ProxyError::upstream(&e));
            }
            Err(_) => {
                metrics::record_upstream_error();
                return Err(ProxyError::UpstreamUnreachable(format!(
                    "upstream did not respond within {:?}",
                    self.dispatch_timeout
                )));
            }
        };

        let status = upstream.status();
        let headers = filtered(upstream.headers(), &RELAY_EXCLUDED);
        let exchange = Exchange {
            request_id,
            method: parts.method,
            url: target.to_string(),
            status,
            expected_len: upstream.content_length(),
            started,
        };

        let mut response = Response::new(Body::from_stream(RelayStream::new(
            upstream.bytes_stream(),
            exchange,
        )));
        *response.status_mut() = status;
        *response.headers_mut() = headers;
        response.extensions_mut().insert(Relayed);
        Ok(response)
    }
}
