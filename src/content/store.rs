//! Remote content store access.
//!
//! # Responsibilities
//! - Fetch raw documents (JSON, markdown, binaries) by relative path
//! - Classify fetch failures for the retry executor
//! - Decode JSON on top of the raw fetch
//!
//! # Design Decisions
//! - One trait seam so handlers can run against an in-memory store
//! - Every HTTP fetch runs under the shared retry policy
//! - Non-2xx answers are errors, never decoded as content

use axum::body::Bytes;
use axum::http::StatusCode;
use futures_util::future::BoxFuture;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use thiserror::Error;
use url::Url;

use crate::proxy::error::describe;
use crate::resilience::{execute_with_retry_when, RetryPolicy};

/// Errors raised while reading the content store.
#[derive(Debug, Error)]
pub enum ContentError {
    #[error("invalid content path '{0}'")]
    InvalidPath(String),

    #[error("fetching {location} timed out: {cause}")]
    Timeout { location: String, cause: String },

    #[error("fetching {location} failed: {cause}")]
    Transport { location: String, cause: String },

    #[error("content store returned {status} for {location}")]
    Status { location: String, status: StatusCode },

    #[error("content at {location} is malformed: {cause}")]
    Decode { location: String, cause: String },
}

impl ContentError {
    fn from_reqwest(location: &Url, err: reqwest::Error) -> Self {
        let location = location.to_string();
        let cause = describe(&err);
        if err.is_timeout() {
            ContentError::Timeout { location, cause }
        } else {
            ContentError::Transport { location, cause }
        }
    }

    /// Network trouble and server-side statuses may pass; bad paths, client
    /// errors and malformed documents will not change on a second try.
    pub fn is_retryable(&self) -> bool {
        match self {
            ContentError::Timeout { .. } | ContentError::Transport { .. } => true,
            ContentError::Status { status, .. } => {
                status.is_server_error() || *status == StatusCode::TOO_MANY_REQUESTS
            }
            ContentError::InvalidPath(_) | ContentError::Decode { .. } => false,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ContentError::Status { status, .. } if *status == StatusCode::NOT_FOUND)
    }
}

/// Read access to the remote content store.
pub trait ContentStore: Send + Sync {
    /// Fetch the raw bytes at `path`, relative to the store root.
    fn fetch_bytes<'a>(&'a self, path: &'a str) -> BoxFuture<'a, Result<Bytes, ContentError>>;

    /// Fetch and decode a JSON document.
    fn fetch_json<'a>(&'a self, path: &'a str) -> BoxFuture<'a, Result<Value, ContentError>> {
        Box::pin(async move {
            let bytes = self.fetch_bytes(path).await?;
            serde_json::from_slice(&bytes).map_err(|e| ContentError::Decode {
                location: path.to_string(),
                cause: e.to_string(),
            })
        })
    }

    /// Fetch a UTF-8 text document.
    fn fetch_text<'a>(&'a self, path: &'a str) -> BoxFuture<'a, Result<String, ContentError>> {
        Box::pin(async move {
            let bytes = self.fetch_bytes(path).await?;
            String::from_utf8(bytes.to_vec()).map_err(|e| ContentError::Decode {
                location: path.to_string(),
                cause: e.to_string(),
            })
        })
    }
}

/// Reject paths that could climb out of the store root.
fn check_path(path: &str) -> Result<(), ContentError> {
    let escapes = path.starts_with('/')
        || path.contains('\\')
        || path.split('/').any(|segment| {
            let normalized = segment.to_ascii_lowercase().replace("%2e", ".");
            normalized == "." || normalized == ".."
        });
    if path.is_empty() || escapes {
        return Err(ContentError::InvalidPath(path.to_string()));
    }
    Ok(())
}

/// Content store served over HTTP(S).
#[derive(Debug, Clone)]
pub struct HttpContentStore {
    client: reqwest::Client,
    root: Url,
    timeout: Duration,
    retry: RetryPolicy,
}

impl HttpContentStore {
    /// `root` is treated as a directory even without a trailing slash.
    pub fn new(client: reqwest::Client, mut root: Url, timeout: Duration, retry: RetryPolicy) -> Self {
        if !root.path().ends_with('/') {
            let dir = format!("{}/", root.path());
            root.set_path(&dir);
        }
        Self {
            client,
            root,
            timeout,
            retry,
        }
    }

    pub fn root(&self) -> &Url {
        &self.root
    }

    /// Absolute URL for a store path.
    pub fn resolve(&self, path: &str) -> Result<Url, ContentError> {
        check_path(path)?;
        self.root
            .join(path)
            .map_err(|_| ContentError::InvalidPath(path.to_string()))
    }

    async fn fetch_once(&self, url: &Url) -> Result<Bytes, ContentError> {
        let response = self
            .client
            .get(url.clone())
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| ContentError::from_reqwest(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ContentError::Status {
                location: url.to_string(),
                status,
            });
        }

        response
            .bytes()
            .await
            .map_err(|e| ContentError::from_reqwest(url, e))
    }
}

impl ContentStore for HttpContentStore {
    fn fetch_bytes<'a>(&'a self, path: &'a str) -> BoxFuture<'a, Result<Bytes, ContentError>> {
        Box::pin(async move {
            let url = self.resolve(path)?;
            tracing::debug!(url = %url, "Fetching content");
            execute_with_retry_when(
                &self.retry,
                "content_fetch",
                || self.fetch_once(&url),
                ContentError::is_retryable,
            )
            .await
        })
    }
}

/// In-memory content store. Missing paths answer 404.
#[derive(Debug, Default)]
pub struct MemoryContentStore {
    documents: HashMap<String, Bytes>,
    fetches: AtomicUsize,
}

impl MemoryContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bytes(mut self, path: &str, bytes: impl Into<Bytes>) -> Self {
        self.documents.insert(path.to_string(), bytes.into());
        self
    }

    pub fn with_json(self, path: &str, value: Value) -> Self {
        self.with_bytes(path, value.to_string())
    }

    pub fn with_text(self, path: &str, text: &str) -> Self {
        self.with_bytes(path, text.to_string())
    }

    /// Number of fetches served so far, hits and misses alike.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

impl ContentStore for MemoryContentStore {
    fn fetch_bytes<'a>(&'a self, path: &'a str) -> BoxFuture<'a, Result<Bytes, ContentError>> {
        Box::pin(async move {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            check_path(path)?;
            self.documents
                .get(path)
                .cloned()
                .ok_or_else(|| ContentError::Status {
                    location: path.to_string(),
                    status: StatusCode::NOT_FOUND,
                })
        })
    }
}
