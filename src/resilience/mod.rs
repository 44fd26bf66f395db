//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Upstream-calling operation (content fetch, optional forward):
//!     → retries.rs (attempt, classify failure, back off, attempt again)
//!     → backoff.rs (delay = base * 2^attempt)
//!     → last failure surfaced unchanged on exhaustion
//! ```
//!
//! # Design Decisions
//! - Timeouts live on the outbound client; a timeout is just another failure here
//! - Retries are strictly sequential within one request
//! - No shared state: the policy is an immutable value

pub mod backoff;
pub mod retries;

pub use backoff::{calculate_backoff, Backoff};
pub use retries::{execute_with_retry, execute_with_retry_when, RetryPolicy};
