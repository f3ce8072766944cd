//! Forwarding subsystem.
//!
//! # Data Flow
//! ```text
//! inbound request
//!     → target.rs (extract & validate `target`)
//!     → forwarder.rs (filter headers, dispatch once)
//!     → relay.rs (stream upstream body back, log on completion)
//! ```

pub mod forwarder;
pub mod relay;
pub mod target;

pub use forwarder::Forwarder;
pub use relay::{Exchange, RelayStream, Relayed};
pub use target::{extract_target, TARGET_PARAM};
