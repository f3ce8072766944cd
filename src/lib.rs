//! CORS-friendly single-endpoint forwarding proxy.
//!
//! `GET /proxy?target=<url>` (any method) forwards the request to `<url>`
//! and streams the upstream answer back, minus `Set-Cookie`, with CORS
//! headers added. `OPTIONS` is answered locally with 204.

pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod proxy;

pub use config::ProxyConfig;
pub use error::ProxyError;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use proxy::Forwarder;
