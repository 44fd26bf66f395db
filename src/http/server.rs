//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Build the gateway core (route table, content store, forwarder) from config
//! - Create the Axum router with a single dispatch handler
//! - Wire up middleware (request ID, tracing)
//! - Bind server to listener and drain on shutdown

use axum::{
    body::Body,
    extract::State,
    http::Request,
    response::Response,
    routing::any,
    Router,
};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use url::Url;

use crate::config::GatewayConfig;
use crate::content::{ContentStore, HttpContentStore};
use crate::http::dispatcher::Gateway;
use crate::http::request::{buffer_request, request_id, MakeRequestUuid, X_REQUEST_ID};
use crate::observability::metrics;
use crate::proxy::{build_client, Forwarder, HeaderPolicy, HeaderPolicyError};
use crate::routing::PatternError;

/// Errors raised while assembling the server.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),

    #[error("invalid content root URL: {0}")]
    ContentRoot(#[from] url::ParseError),

    #[error(transparent)]
    Headers(#[from] HeaderPolicyError),

    #[error("invalid route pattern: {0}")]
    Routes(#[from] PatternError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Application state injected into the dispatch handler.
#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<Gateway>,
    pub max_body_bytes: usize,
}

/// HTTP server for the gateway.
pub struct HttpServer {
    router: Router,
    config: GatewayConfig,
}

impl HttpServer {
    /// Create a server reading content over HTTP from `content.root_url`.
    pub fn new(config: GatewayConfig) -> Result<Self, ServerError> {
        let content_client = reqwest::Client::builder()
            .timeout(config.content.timeout())
            .build()?;
        let store = HttpContentStore::new(
            content_client,
            Url::parse(&config.content.root_url)?,
            config.content.timeout(),
            config.retries.policy(),
        );
        Self::with_content_store(config, Arc::new(store))
    }

    /// Create a server over an arbitrary content store.
    pub fn with_content_store(
        config: GatewayConfig,
        store: Arc<dyn ContentStore>,
    ) -> Result<Self, ServerError> {
        let headers = HeaderPolicy::from_config(&config.headers, &config.upstream.user_agent)?;
        let mut forwarder = Forwarder::new(
            build_client(&config.upstream)?,
            config.upstream.base_url.clone(),
            headers,
            config.upstream.timeout(),
        );
        if config.upstream.retry {
            forwarder = forwarder.with_retry(config.retries.policy());
        }

        let gateway = Gateway::new(store, forwarder)?;
        tracing::info!(
            local_routes = gateway.routes().len(),
            upstream = %config.upstream.base_url,
            content_root = %config.content.root_url,
            forward_retry = config.upstream.retry,
            "Gateway assembled"
        );

        let state = AppState {
            gateway: Arc::new(gateway),
            max_body_bytes: config.limits.max_body_bytes,
        };
        let router = Self::build_router(state);
        Ok(Self { router, config })
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(state: AppState) -> Router {
        Router::new()
            .route("/{*path}", any(dispatch))
            .route("/", any(dispatch))
            .with_state(state)
            .layer(PropagateRequestIdLayer::new(X_REQUEST_ID.clone()))
            .layer(
                TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                    tracing::info_span!(
                        "request",
                        method = %request.method(),
                        uri = %request.uri(),
                        request_id = %request_id(request.headers()),
                    )
                }),
            )
            .layer(SetRequestIdLayer::new(X_REQUEST_ID.clone(), MakeRequestUuid))
    }

    /// The fully layered router, for in-process testing.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server until `shutdown` fires, then drain in-flight requests.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), ServerError> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received, draining connections");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }
}

/// The single entry point: buffer, then hand to the gateway core.
async fn dispatch(State(state): State<AppState>, request: Request<Body>) -> Response {
    let start = Instant::now();
    let method = request.method().clone();

    let inbound = match buffer_request(request, state.max_body_bytes).await {
        Ok(inbound) => inbound,
        Err(response) => {
            metrics::record_request(method.as_str(), response.status().as_u16(), "rejected", start);
            return response;
        }
    };

    let path = inbound.path.clone();
    let (disposition, response) = state.gateway.handle(inbound).await;

    tracing::info!(
        method = %method,
        path = %path,
        status = response.status().as_u16(),
        outcome = disposition.as_str(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Request completed"
    );
    metrics::record_request(
        method.as_str(),
        response.status().as_u16(),
        disposition.as_str(),
        start,
    );
    response
}
