//! Forwarding subsystem: everything that happens to a request no local
//! route claimed.
//!
//! # Data Flow
//! ```text
//! InboundRequest (buffered)
//!     → forwarder.rs (target URL, body replay)
//!     → headers.rs (strip host/framing, inject user-agent)
//!     → [retries, when enabled] → upstream
//!     → headers.rs (strip response framing)
//!     → Response, or error.rs maps the failure kind to 502/504/500
//! ```

pub mod error;
pub mod forwarder;
pub mod headers;

pub use error::ForwardError;
pub use forwarder::{
    build_client, carries_body, target_url, Forwarder, InboundRequest, OutboundRequest,
    UpstreamResponse,
};
pub use headers::{HeaderPolicy, HeaderPolicyError};
