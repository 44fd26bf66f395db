//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID + trace layers)
//!     → request.rs (assign request ID, buffer body under the size limit)
//!     → dispatcher.rs (local route table lookup)
//!         → Matched: content handlers
//!         → Unmatched: forwarding proxy
//!     → response.rs (`{"detail"}` bodies for gateway-made errors)
//!     → Send to client
//! ```

pub mod dispatcher;
pub mod request;
pub mod response;
pub mod server;

pub use dispatcher::{Disposition, Gateway};
pub use request::{buffer_request, request_id, MakeRequestUuid, X_REQUEST_ID};
pub use response::detail_response;
pub use server::{AppState, HttpServer, ServerError};
