//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! http/cors.rs, proxy/relay.rs produce:
//!     → logging.rs (structured log events, request ID span field)
//!     → metrics.rs (counters, histograms)
//!
//! Consumers:
//!     → stdout (pretty or JSON)
//!     → Prometheus scrape endpoint (optional)
//! ```

pub mod logging;
pub mod metrics;

pub use logging::init_logging;
pub use metrics::init_metrics;
