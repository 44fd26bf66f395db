//! Header filtering for both legs of a forwarded call.
//!
//! # Responsibilities
//! - Strip inbound headers the outbound client must recompute (host, framing)
//! - Inject a default client identifier when the caller sent none
//! - Strip upstream framing headers the gateway's own transport recomputes
//!
//! # Design Decisions
//! - The removed and added names are a fixed, enumerable set taken from config
//! - Names are case-insensitive (`HeaderName` is always lowercase)
//! - Filtering only removes whole names or inserts when absent, so it is idempotent
//! - Multi-valued headers that survive keep every value and their order

use axum::http::header::{InvalidHeaderName, InvalidHeaderValue, USER_AGENT};
use axum::http::{HeaderMap, HeaderName, HeaderValue};
use thiserror::Error;

use crate::config::HeaderConfig;

#[derive(Debug, Error)]
pub enum HeaderPolicyError {
    #[error("invalid header name '{name}': {source}")]
    Name {
        name: String,
        source: InvalidHeaderName,
    },

    #[error("invalid user agent '{value}': {source}")]
    UserAgent {
        value: String,
        source: InvalidHeaderValue,
    },
}

/// The fixed set of header edits applied by the forwarding proxy.
#[derive(Debug, Clone)]
pub struct HeaderPolicy {
    strip_request: Vec<HeaderName>,
    strip_response: Vec<HeaderName>,
    user_agent: HeaderValue,
}

impl HeaderPolicy {
    pub fn new(
        strip_request: Vec<HeaderName>,
        strip_response: Vec<HeaderName>,
        user_agent: HeaderValue,
    ) -> Self {
        Self {
            strip_request,
            strip_response,
            user_agent,
        }
    }

    /// Build from the `[headers]` section plus the configured user agent.
    pub fn from_config(config: &HeaderConfig, user_agent: &str) -> Result<Self, HeaderPolicyError> {
        let user_agent =
            HeaderValue::from_str(user_agent).map_err(|source| HeaderPolicyError::UserAgent {
                value: user_agent.to_string(),
                source,
            })?;

        Ok(Self::new(
            parse_names(&config.strip_request)?,
            parse_names(&config.strip_response)?,
            user_agent,
        ))
    }

    /// Headers for the outbound request derived from the inbound ones.
    pub fn filter_request(&self, inbound: &HeaderMap) -> HeaderMap {
        let mut headers = inbound.clone();
        for name in &self.strip_request {
            headers.remove(name);
        }
        if !headers.contains_key(USER_AGENT) {
            headers.insert(USER_AGENT, self.user_agent.clone());
        }
        headers
    }

    /// Headers for the relayed response derived from the upstream ones.
    pub fn filter_response(&self, upstream: &HeaderMap) -> HeaderMap {
        let mut headers = upstream.clone();
        for name in &self.strip_response {
            headers.remove(name);
        }
        headers
    }

    pub fn stripped_request_headers(&self) -> &[HeaderName] {
        &self.strip_request
    }

    pub fn stripped_response_headers(&self) -> &[HeaderName] {
        &self.strip_response
    }

    pub fn default_user_agent(&self) -> &HeaderValue {
        &self.user_agent
    }
}

impl Default for HeaderPolicy {
    fn default() -> Self {
        let defaults = HeaderConfig::default();
        Self::new(
            defaults
                .strip_request
                .iter()
                .filter_map(|n| HeaderName::from_bytes(n.as_bytes()).ok())
                .collect(),
            defaults
                .strip_response
                .iter()
                .filter_map(|n| HeaderName::from_bytes(n.as_bytes()).ok())
                .collect(),
            HeaderValue::from_static(concat!("fallback-gateway/", env!("CARGO_PKG_VERSION"))),
        )
    }
}

fn parse_names(names: &[String]) -> Result<Vec<HeaderName>, HeaderPolicyError> {
    names
        .iter()
        .map(|name| {
            HeaderName::from_bytes(name.as_bytes()).map_err(|source| HeaderPolicyError::Name {
                name: name.clone(),
                source,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header::{CONTENT_ENCODING, CONTENT_LENGTH, HOST, SET_COOKIE, TRANSFER_ENCODING};

    fn inbound() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(HOST, HeaderValue::from_static("gateway.local"));
        headers.insert(CONTENT_LENGTH, HeaderValue::from_static("12"));
        headers.insert(CONTENT_ENCODING, HeaderValue::from_static("gzip"));
        headers.insert("x-custom", HeaderValue::from_static("kept"));
        headers.append("accept", HeaderValue::from_static("text/html"));
        headers.append("accept", HeaderValue::from_static("application/json"));
        headers
    }

    #[test]
    fn request_filter_strips_and_injects() {
        let policy = HeaderPolicy::default();
        let filtered = policy.filter_request(&inbound());

        assert!(!filtered.contains_key(HOST));
        assert!(!filtered.contains_key(CONTENT_LENGTH));
        assert!(!filtered.contains_key(CONTENT_ENCODING));
        assert_eq!(filtered["x-custom"], "kept");
        assert_eq!(filtered.get_all("accept").iter().count(), 2);
        assert_eq!(filtered[USER_AGENT], *policy.default_user_agent());
    }

    #[test]
    fn caller_user_agent_is_preserved() {
        let mut headers = inbound();
        headers.insert(USER_AGENT, HeaderValue::from_static("curl/8.0"));

        let filtered = HeaderPolicy::default().filter_request(&headers);
        assert_eq!(filtered[USER_AGENT], "curl/8.0");
    }

    #[test]
    fn request_filter_is_idempotent() {
        let policy = HeaderPolicy::default();
        let once = policy.filter_request(&inbound());
        let twice = policy.filter_request(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn response_filter_strips_framing_and_is_idempotent() {
        let mut upstream = HeaderMap::new();
        upstream.insert(TRANSFER_ENCODING, HeaderValue::from_static("chunked"));
        upstream.insert(CONTENT_LENGTH, HeaderValue::from_static("7"));
        upstream.insert(CONTENT_ENCODING, HeaderValue::from_static("br"));
        upstream.append(SET_COOKIE, HeaderValue::from_static("a=1"));
        upstream.append(SET_COOKIE, HeaderValue::from_static("b=2"));

        let policy = HeaderPolicy::default();
        let once = policy.filter_response(&upstream);
        assert!(!once.contains_key(TRANSFER_ENCODING));
        assert!(!once.contains_key(CONTENT_LENGTH));
        assert_eq!(once[CONTENT_ENCODING], "br");
        assert_eq!(once.get_all(SET_COOKIE).iter().count(), 2);

        assert_eq!(policy.filter_response(&once), once);
    }

    #[test]
    fn configured_sets_are_honoured() {
        let config = HeaderConfig {
            strip_request: vec!["Host".into(), "X-Secret".into()],
            strip_response: vec![],
        };
        let policy = HeaderPolicy::from_config(&config, "probe/1").unwrap();

        let mut headers = inbound();
        headers.insert("x-secret", HeaderValue::from_static("s"));
        let filtered = policy.filter_request(&headers);

        assert!(!filtered.contains_key("x-secret"));
        assert!(!filtered.contains_key(HOST));
        // content-encoding is no longer in the strip set
        assert_eq!(filtered[CONTENT_ENCODING], "gzip");
        assert_eq!(filtered[USER_AGENT], "probe/1");
    }

    #[test]
    fn invalid_names_are_rejected() {
        let config = HeaderConfig {
            strip_request: vec!["bad name".into()],
            strip_response: vec![],
        };
        assert!(matches!(
            HeaderPolicy::from_config(&config, "ua"),
            Err(HeaderPolicyError::Name { .. })
        ));
        assert!(matches!(
            HeaderPolicy::from_config(&HeaderConfig::default(), "bad\nua"),
            Err(HeaderPolicyError::UserAgent { .. })
        ));
    }
}
