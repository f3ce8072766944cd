//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, routes, layers)
//!     → cors.rs (request ID, preflight, CORS headers)
//!     → proxy::target (validate `target`)
//!     → proxy::forwarder (headers.rs filters both directions)
//!     → Send to client
//! ```

pub mod cors;
pub mod headers;
pub mod request;
pub mod server;

pub use cors::{cors_middleware, CorsPolicy};
pub use headers::copy_headers_except;
pub use request::{RequestId, RequestIdExt};
pub use server::{build_router, HttpServer};
