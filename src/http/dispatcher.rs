//! Request dispatch: local route table first, forwarding proxy otherwise.
//!
//! # Responsibilities
//! - Resolve the inbound (method, path) against the local route table
//! - Run the matched local handler, or hand the request to the forwarder
//! - Report which way each request went
//!
//! # Design Decisions
//! - A matched request never reaches the forwarder, whatever the handler returns
//! - Every inbound request yields exactly one response

use axum::response::{IntoResponse, Response};
use std::sync::Arc;

use crate::content::{route_table, ContentStore, LocalHandlers, LocalRoute};
use crate::proxy::{Forwarder, InboundRequest};
use crate::routing::{PatternError, Resolution, RouteTable};

/// Which path a request took through the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    LocallyHandled,
    Forwarded,
}

impl Disposition {
    /// Metrics label.
    pub fn as_str(&self) -> &'static str {
        match self {
            Disposition::LocallyHandled => "local",
            Disposition::Forwarded => "forwarded",
        }
    }
}

/// The gateway core, shared by every connection.
pub struct Gateway {
    routes: RouteTable<LocalRoute>,
    handlers: LocalHandlers,
    forwarder: Forwarder,
}

impl Gateway {
    pub fn new(store: Arc<dyn ContentStore>, forwarder: Forwarder) -> Result<Self, PatternError> {
        Ok(Self {
            routes: route_table()?,
            handlers: LocalHandlers::new(store),
            forwarder,
        })
    }

    pub fn routes(&self) -> &RouteTable<LocalRoute> {
        &self.routes
    }

    pub fn forwarder(&self) -> &Forwarder {
        &self.forwarder
    }

    /// Where `inbound` would go, without running anything.
    pub fn disposition(&self, inbound: &InboundRequest) -> Disposition {
        if self.routes.resolve(&inbound.method, &inbound.path).is_matched() {
            Disposition::LocallyHandled
        } else {
            Disposition::Forwarded
        }
    }

    /// Produce the response for `inbound`.
    pub async fn handle(&self, inbound: InboundRequest) -> (Disposition, Response) {
        match self.routes.resolve(&inbound.method, &inbound.path) {
            Resolution::Matched(matched) => {
                let route = *matched.target;
                tracing::debug!(
                    route = route.name(),
                    pattern = %matched.pattern,
                    "Handling request locally"
                );
                let response = match self
                    .handlers
                    .handle(route, &matched.params, inbound.query.as_deref())
                    .await
                {
                    Ok(payload) => payload.into_response(),
                    Err(e) => {
                        let status = e.status_code();
                        if status.is_server_error() {
                            tracing::error!(route = route.name(), error = %e, "Local handler failed");
                        } else {
                            tracing::debug!(route = route.name(), status = %status, error = %e, "Local handler rejected request");
                        }
                        e.into_response()
                    }
                };
                (Disposition::LocallyHandled, response)
            }
            Resolution::Unmatched => (Disposition::Forwarded, self.forwarder.forward(&inbound).await),
        }
    }
}
