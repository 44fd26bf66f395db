//! Failure taxonomy of the forwarding proxy.
//!
//! This is the one place where a failure kind turns into a status code.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use std::error::Error as StdError;
use std::time::Duration;
use thiserror::Error;

use crate::http::response::detail_response;

/// Why a forwarded call produced no upstream response.
#[derive(Debug, Error)]
pub enum ForwardError {
    /// The outbound connection could not be established.
    #[error("Error connecting to upstream {url}: {cause}")]
    Connect { url: String, cause: String },

    /// The upstream did not answer within the per-attempt timeout.
    #[error("Upstream {url} did not respond within {}s: {cause}", .timeout.as_secs())]
    Timeout {
        url: String,
        timeout: Duration,
        cause: String,
    },

    /// Any other transport-level failure.
    #[error("Error forwarding request to {url}: {cause}")]
    Transport { url: String, cause: String },

    /// The request could not even be built or sent (e.g. an unusable URL).
    #[error("Unexpected error forwarding request to {url}: {cause}")]
    Unexpected { url: String, cause: String },
}

impl ForwardError {
    /// Classify a client error raised while calling `url`.
    pub fn from_reqwest(url: &str, timeout: Duration, err: reqwest::Error) -> Self {
        let cause = describe(&err);
        let url = url.to_string();

        if err.is_builder() {
            ForwardError::Unexpected { url, cause }
        } else if err.is_timeout() {
            ForwardError::Timeout {
                url,
                timeout,
                cause,
            }
        } else if err.is_connect() {
            ForwardError::Connect { url, cause }
        } else {
            ForwardError::Transport { url, cause }
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ForwardError::Connect { .. } => StatusCode::BAD_GATEWAY,
            ForwardError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            ForwardError::Transport { .. } => StatusCode::BAD_GATEWAY,
            ForwardError::Unexpected { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Transport failures may clear up on their own; a request that could
    /// not be built will fail the same way every time.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, ForwardError::Unexpected { .. })
    }

    pub fn url(&self) -> &str {
        match self {
            ForwardError::Connect { url, .. }
            | ForwardError::Timeout { url, .. }
            | ForwardError::Transport { url, .. }
            | ForwardError::Unexpected { url, .. } => url,
        }
    }

    /// Short label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            ForwardError::Connect { .. } => "connect",
            ForwardError::Timeout { .. } => "timeout",
            ForwardError::Transport { .. } => "transport",
            ForwardError::Unexpected { .. } => "unexpected",
        }
    }
}

impl IntoResponse for ForwardError {
    fn into_response(self) -> Response {
        detail_response(self.status_code(), self.to_string())
    }
}

/// Render an error with its whole source chain.
pub(crate) fn describe(err: &(dyn StdError + 'static)) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(inner) = source {
        let text = inner.to_string();
        if !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = inner.source();
    }
    message
}
