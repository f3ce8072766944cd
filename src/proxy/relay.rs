//! Streaming relay of an upstream response body.
//!
//! `RelayStream` owns the upstream body stream. It is handed to axum as the
//! response body, so the upstream connection lives exactly as long as the
//! relay: it is released when the last chunk is written, when reading
//! upstream fails, or when the caller disconnects and hyper drops the body.
//! The completion log line is emitted from `Drop`, after the whole exchange.
//!
//! hyper stops polling a body once it has written `Content-Length` bytes and
//! never polls bodies of HEAD, 204 or 304 responses, so end-of-stream alone
//! does not mark completion.

use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Instant;

use axum::{
    body::Bytes,
    http::{Method, StatusCode},
};
use futures_util::{stream::BoxStream, Stream, StreamExt};

use crate::error::ProxyError;
use crate::http::request::RequestId;
use crate::observability::metrics;

/// What is known about the exchange being relayed, for the final log line.
#[derive(Debug, Clone)]
pub struct Exchange {
    pub request_id: Option<RequestId>,
    pub method: Method,
    pub url: String,
    pub status: StatusCode,
    /// Upstream `Content-Length`, if it sent one.
    pub expected_len: Option<u64>,
    pub started: Instant,
}

impl Exchange {
    /// Whether the relayed response carries no body at all.
    pub fn is_bodyless(&self) -> bool {
        self.method == Method::HEAD
            || self.status.is_informational()
            || self.status == StatusCode::NO_CONTENT
            || self.status == StatusCode::NOT_MODIFIED
    }
}

/// Response extension marking a response whose end is logged by its
/// `RelayStream` rather than by the request wrapper.
#[derive(Debug, Clone, Copy)]
pub struct Relayed;

#[derive(Debug)]
enum Outcome {
    Streaming,
    Complete,
    Failed(String),
}

/// Body stream relaying upstream chunks unmodified.
pub struct RelayStream {
    inner: BoxStream<'static, Result<Bytes, reqwest::Error>>,
    exchange: Exchange,
    bytes: u64,
    outcome: Outcome,
}

impl RelayStream {
    pub fn new<S>(upstream: S, exchange: Exchange) -> Self
    where
        S: Stream<Item = Result<Bytes, reqwest::Error>> + Send + 'static,
    {
        Self {
            inner: upstream.boxed(),
            exchange,
            bytes: 0,
            outcome: Outcome::Streaming,
        }
    }

    fn all_bytes_relayed(&self) -> bool {
        self.exchange.is_bodyless() || self.exchange.expected_len == Some(self.bytes)
    }
}

impl Stream for RelayStream {
    type Item = Result<Bytes, reqwest::Error>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let polled = self.inner.poll_next_unpin(cx);
        match &polled {
            Poll::Ready(Some(Ok(chunk))) => {
                self.bytes += chunk.len() as u64;
                if self.all_bytes_relayed() {
                    self.outcome = Outcome::Complete;
                }
            }
            Poll::Ready(Some(Err(e))) => self.outcome = Outcome::Failed(e.to_string()),
            Poll::Ready(None) => self.outcome = Outcome::Complete,
            Poll::Pending => {}
        }
        polled
    }
}

impl Drop for RelayStream {
    fn drop(&mut self) {
        metrics::record_relayed_bytes(self.bytes);
        if matches!(self.outcome, Outcome::Streaming) && self.all_bytes_relayed() {
            self.outcome = Outcome::Complete;
        }

        let exchange = &self.exchange;
        let request_id = exchange.request_id.map(|id| id.to_string()).unwrap_or_default();
        let elapsed = exchange.started.elapsed();

        match &self.outcome {
            Outcome::Complete => {
                tracing::info!(
                    request_id = %request_id,
                    bytes = self.bytes,
                    "--> [{}] {} {} +{:?}",
                    exchange.method,
                    exchange.status.as_u16(),
                    exchange.url,
                    elapsed,
                );
            }
            Outcome::Streaming => {
                let err = ProxyError::RelayWriteFailure("client disconnected".into());
                tracing::warn!(
                    request_id = %request_id,
                    method = %exchange.method,
                    status = exchange.status.as_u16(),
                    url = %exchange.url,
                    bytes = self.bytes,
                    elapsed = ?elapsed,
                    error = %err,
                    "Relay abandoned"
                );
            }
            Outcome::Failed(reason) => {
                let err = ProxyError::RelayWriteFailure(reason.clone());
                tracing::warn!(
                    request_id = %request_id,
                    method = %exchange.method,
                    status = exchange.status.as_u16(),
                    url = %exchange.url,
                    bytes = self.bytes,
                    elapsed = ?elapsed,
                    error = %err,
                    "Relay failed"
                );
            }
        }
    }
}
