//! Forwarding Proxy.
//!
//! # Responsibilities
//! - Rewrite the inbound target onto the upstream base URL
//! - Filter headers on both legs
//! - Replay the buffered body for methods that carry one
//! - Dispatch with a fixed timeout, optionally under the retry executor
//! - Translate the upstream response, or the failure, into the client response
//!
//! # Design Decisions
//! - Bodies are relayed byte-exact; the client never decompresses
//! - Upstream status codes are relayed as-is and never retried
//! - One pooled client; a connection is checked out per attempt and returned
//!   (or dropped) on every exit path

use axum::body::{Body, Bytes};
use axum::http::{HeaderMap, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use reqwest::redirect::Policy;
use std::time::Duration;

use crate::config::UpstreamConfig;
use crate::proxy::error::ForwardError;
use crate::proxy::headers::HeaderPolicy;
use crate::resilience::{execute_with_retry_when, RetryPolicy};

/// A fully buffered inbound request, read-only to the proxy.
#[derive(Debug, Clone)]
pub struct InboundRequest {
    pub method: Method,
    pub path: String,
    pub query: Option<String>,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl InboundRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: None,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }
}

/// The request sent upstream. Reused unchanged by every attempt.
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
}

/// What the upstream answered.
#[derive(Debug, Clone)]
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Only these methods conventionally carry a request body.
pub fn carries_body(method: &Method) -> bool {
    matches!(*method, Method::POST | Method::PUT | Method::PATCH)
}

/// Join the upstream base with the inbound path, keeping the query verbatim.
pub fn target_url(base_url: &str, path: &str, query: Option<&str>) -> String {
    let base = base_url.trim_end_matches('/');
    let path = if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    };
    match query {
        Some(q) if !q.is_empty() => format!("{base}{path}?{q}"),
        _ => format!("{base}{path}"),
    }
}

/// Build the shared outbound client for the upstream.
pub fn build_client(config: &UpstreamConfig) -> reqwest::Result<reqwest::Client> {
    let redirect = if config.follow_redirects {
        Policy::limited(config.max_redirects)
    } else {
        Policy::none()
    };

    reqwest::Client::builder()
        .timeout(config.timeout())
        .redirect(redirect)
        .build()
}

/// Forwards requests no local route claimed.
#[derive(Debug, Clone)]
pub struct Forwarder {
    client: reqwest::Client,
    base_url: String,
    headers: HeaderPolicy,
    timeout: Duration,
    retry: Option<RetryPolicy>,
}

impl Forwarder {
    pub fn new(
        client: reqwest::Client,
        base_url: impl Into<String>,
        headers: HeaderPolicy,
        timeout: Duration,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            headers,
            timeout,
            retry: None,
        }
    }

    /// Run every dispatch through the retry executor with `policy`.
    pub fn with_retry(mut self, policy: RetryPolicy) -> Self {
        self.retry = Some(policy);
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn header_policy(&self) -> &HeaderPolicy {
        &self.headers
    }

    /// Derive the outbound request for `inbound`.
    pub fn outbound(&self, inbound: &InboundRequest) -> OutboundRequest {
        OutboundRequest {
            method: inbound.method.clone(),
            url: target_url(&self.base_url, &inbound.path, inbound.query.as_deref()),
            headers: self.headers.filter_request(&inbound.headers),
            body: carries_body(&inbound.method).then(|| inbound.body.clone()),
        }
    }

    /// One attempt: send, then read the whole upstream body.
    pub async fn dispatch(&self, outbound: &OutboundRequest) -> Result<UpstreamResponse, ForwardError> {
        let mut request = self
            .client
            .request(outbound.method.clone(), outbound.url.as_str())
            .headers(outbound.headers.clone())
            .timeout(self.timeout);
        if let Some(body) = &outbound.body {
            request = request.body(body.clone());
        }

        let to_error = |e: reqwest::Error| ForwardError::from_reqwest(&outbound.url, self.timeout, e);

        let response = request.send().await.map_err(to_error)?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await.map_err(to_error)?;

        Ok(UpstreamResponse {
            status,
            headers,
            body,
        })
    }

    /// Forward `inbound` and always produce exactly one response.
    pub async fn forward(&self, inbound: &InboundRequest) -> Response {
        let outbound = self.outbound(inbound);
        tracing::debug!(
            method = %outbound.method,
            url = %outbound.url,
            body_bytes = outbound.body.as_ref().map_or(0, Bytes::len),
            "Forwarding request upstream"
        );

        let result = match &self.retry {
            Some(policy) => {
                execute_with_retry_when(
                    policy,
                    "forward",
                    || self.dispatch(&outbound),
                    ForwardError::is_retryable,
                )
                .await
            }
            None => self.dispatch(&outbound).await,
        };

        match result {
            Ok(upstream) => {
                tracing::debug!(
                    url = %outbound.url,
                    status = %upstream.status,
                    body_bytes = upstream.body.len(),
                    "Upstream responded"
                );
                self.relay(upstream)
            }
            Err(e) => {
                tracing::error!(
                    url = %outbound.url,
                    kind = e.kind(),
                    error = %e,
                    "Forwarding failed"
                );
                e.into_response()
            }
        }
    }

    /// Turn an upstream response into the client response.
    pub fn relay(&self, upstream: UpstreamResponse) -> Response {
        let mut response = Response::new(Body::from(upstream.body));
        *response.status_mut() = upstream.status;
        *response.headers_mut() = self.headers.filter_response(&upstream.headers);
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header::{CONTENT_LENGTH, HOST, TRANSFER_ENCODING, USER_AGENT};
    use axum::http::HeaderValue;

    fn forwarder(base: &str) -> Forwarder {
        Forwarder::new(
            reqwest::Client::new(),
            base,
            HeaderPolicy::default(),
            Duration::from_secs(30),
        )
    }

    #[test]
    fn target_url_keeps_query_verbatim() {
        assert_eq!(
            target_url("https://up.test", "/a/b", Some("x=1&y=%2F&z")),
            "https://up.test/a/b?x=1&y=%2F&z"
        );
        assert_eq!(target_url("https://up.test/", "/a", None), "https://up.test/a");
        assert_eq!(target_url("https://up.test/base", "/a", Some("")), "https://up.test/base/a");
        assert_eq!(target_url("https://up.test", "a", None), "https://up.test/a");
    }

    #[test]
    fn body_only_for_body_methods() {
        let fwd = forwarder("http://up.test");
        for method in [Method::POST, Method::PUT, Method::PATCH] {
            let out = fwd.outbound(&InboundRequest::new(method, "/x").with_body("payload"));
            assert_eq!(out.body.as_deref(), Some(&b"payload"[..]));
        }
        for method in [Method::GET, Method::DELETE, Method::HEAD, Method::OPTIONS] {
            let out = fwd.outbound(&InboundRequest::new(method, "/x").with_body("payload"));
            assert!(out.body.is_none());
        }
    }

    #[test]
    fn outbound_headers_are_filtered() {
        let mut headers = HeaderMap::new();
        headers.insert(HOST, HeaderValue::from_static("gateway.local"));
        headers.insert(CONTENT_LENGTH, HeaderValue::from_static("3"));
        headers.insert("authorization", HeaderValue::from_static("Bearer t"));

        let out = forwarder("http://up.test").outbound(
            &InboundRequest::new(Method::GET, "/unregistered/path")
                .with_query("x=1")
                .with_headers(headers),
        );

        assert_eq!(out.url, "http://up.test/unregistered/path?x=1");
        assert_eq!(out.method, Method::GET);
        assert!(out.headers.get(HOST).is_none());
        assert!(out.headers.get(CONTENT_LENGTH).is_none());
        assert_eq!(out.headers["authorization"], "Bearer t");
        assert!(out.headers.contains_key(USER_AGENT));
    }

    #[test]
    fn relay_is_byte_exact_and_strips_framing() {
        let payload: Vec<u8> = (0..=255u8).cycle().take(4096).collect();
        let mut headers = HeaderMap::new();
        headers.insert(TRANSFER_ENCODING, HeaderValue::from_static("chunked"));
        headers.insert(CONTENT_LENGTH, HeaderValue::from_static("4096"));
        headers.insert("content-type", HeaderValue::from_static("application/octet-stream"));

        let response = forwarder("http://up.test").relay(UpstreamResponse {
            status: StatusCode::CREATED,
            headers,
            body: Bytes::from(payload.clone()),
        });

        assert_eq!(response.status(), StatusCode::CREATED);
        assert!(response.headers().get(TRANSFER_ENCODING).is_none());
        assert!(response.headers().get(CONTENT_LENGTH).is_none());
        assert_eq!(response.headers()["content-type"], "application/octet-stream");

        let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let body = rt
            .block_on(axum::body::to_bytes(response.into_body(), usize::MAX))
            .unwrap();
        assert_eq!(body.as_ref(), payload.as_slice());
    }

    #[tokio::test]
    async fn unusable_url_maps_to_500() {
        let response = forwarder("not a url").forward(&InboundRequest::new(Method::GET, "/x")).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
