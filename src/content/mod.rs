//! Content subsystem: the locally handled API surface.
//!
//! # Data Flow
//! ```text
//! Matched local route (LocalRoute, PathParams, query)
//!     → handlers.rs (validate params, pick store paths)
//!     → store.rs (fetch under retry policy, decode JSON/text/bytes)
//!     → types.rs (assemble listing envelopes)
//!     → LocalResponse or HandlerError
//! ```
//!
//! # Design Decisions
//! - Handlers only see the `ContentStore` trait
//! - Pagination is validated before the first fetch

pub mod handlers;
pub mod store;
pub mod types;

pub use handlers::{route_table, HandlerError, LocalHandlers, LocalResponse, LocalRoute, Page};
pub use store::{ContentError, ContentStore, HttpContentStore, MemoryContentStore};
pub use types::{ModListing, ModSummary, Pagination, REPORTED_DOWNLOADS};
