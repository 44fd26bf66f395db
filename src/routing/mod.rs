//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (method, path)
//!     → router.rs (ordered route lookup)
//!     → matcher.rs (full path match, bind named segments)
//!     → Return: Matched(route, params) or Unmatched
//!
//! Route Compilation (at startup):
//!     RouteDescriptor[] in registration order
//!     → Compile path patterns
//!     → Drop catch-all descriptors
//!     → Freeze as immutable RouteTable
//! ```
//!
//! # Design Decisions
//! - Routes compiled at startup, immutable at runtime
//! - No regex in hot path
//! - Deterministic: same input always matches same route
//! - First match wins (registration order)

pub mod matcher;
pub mod router;

pub use matcher::{PathParams, PathPattern, PatternError};
pub use router::{Resolution, RouteDescriptor, RouteMatch, RouteTable};
