//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the proxy routes
//! - Wire up middleware (tracing, CORS/preflight)
//! - Bind server to listener and shut down gracefully
//! - Dispatch requests to the validator and forwarder

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware,
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::config::ProxyConfig;
use crate::error::ProxyError;
use crate::http::cors::{cors_middleware, CorsPolicy};
use crate::proxy::{extract_target, Forwarder};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub forwarder: Forwarder,
}

/// HTTP server for the forwarding proxy.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: ProxyConfig) -> Result<Self, ProxyError> {
        let forwarder = Forwarder::new(&config.upstream)?;
        let cors = CorsPolicy::from_config(&config.cors);
        let router = build_router(forwarder, cors);
        Ok(Self { router })
    }

    /// Run the server until a shutdown signal arrives.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Build the Axum router with all middleware layers.
pub fn build_router(forwarder: Forwarder, cors: CorsPolicy) -> Router {
    let state = AppState { forwarder };

    Router::new()
        .route("/proxy", any(proxy_handler))
        .route("/proxy/", any(proxy_handler))
        .route("/proxy/{*rest}", any(proxy_handler))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(middleware::from_fn_with_state(Arc::new(cors), cors_middleware)),
        )
}

/// Main proxy handler: validate the target, then forward.
async fn proxy_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let target = match extract_target(request.uri()) {
        Ok(target) => target,
        Err(e) => return e.into_response(),
    };

    match state.forwarder.forward(request, target).await {
        Ok(response) => response,
        Err(e) => e.into_response(),
    }
}
