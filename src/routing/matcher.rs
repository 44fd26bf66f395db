//! Path pattern matching.
//!
//! # Responsibilities
//! - Compile pattern strings (`/api/v2/mods/{mod_id}`) once, at startup
//! - Match a request path in full, binding named segments
//!
//! # Design Decisions
//! - Literal segments are case-sensitive
//! - `{name}` binds exactly one non-empty segment; values are not validated here
//! - `{*name}` binds the remaining tail and may only appear last
//! - No regex to guarantee O(segments) matching
//! - Request paths are matched percent-decoded; pattern strings are taken literally

use percent_encoding::percent_decode_str;
use std::borrow::Cow;
use std::fmt;
use thiserror::Error;

/// Error raised for malformed pattern strings.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatternError {
    #[error("pattern '{0}' must start with '/'")]
    MissingLeadingSlash(String),

    #[error("pattern '{0}' has an empty parameter name")]
    EmptyParameter(String),

    #[error("pattern '{0}' has a catch-all segment before the end")]
    CatchAllNotLast(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
    CatchAll(String),
}

/// A compiled path pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPattern {
    source: String,
    segments: Vec<Segment>,
}

/// Named segment values bound by a successful match, in pattern order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathParams(Vec<(String, String)>);

impl PathParams {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl PathPattern {
    /// Compile a pattern string.
    pub fn parse(pattern: &str) -> Result<Self, PatternError> {
        if !pattern.starts_with('/') {
            return Err(PatternError::MissingLeadingSlash(pattern.to_string()));
        }

        let raw: Vec<&str> = split_segments(pattern).collect();
        let mut segments = Vec::with_capacity(raw.len());

        for (i, seg) in raw.iter().enumerate() {
            let segment = match seg.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
                Some(inner) => match inner.strip_prefix('*') {
                    Some(name) => {
                        if i + 1 != raw.len() {
                            return Err(PatternError::CatchAllNotLast(pattern.to_string()));
                        }
                        Segment::CatchAll(non_empty(name, pattern)?)
                    }
                    None => Segment::Param(non_empty(inner, pattern)?),
                },
                None => Segment::Literal(seg.to_string()),
            };
            segments.push(segment);
        }

        Ok(Self {
            source: pattern.to_string(),
            segments,
        })
    }

    /// The pattern string this was compiled from.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// True for a pattern that is nothing but a tail catch-all (`/{*path}`),
    /// i.e. one that claims every path.
    pub fn is_catch_all(&self) -> bool {
        matches!(self.segments.as_slice(), [Segment::CatchAll(_)])
    }

    /// Match `path` in full, returning bound parameters on success.
    ///
    /// Segments are percent-decoded before comparison and binding. A segment
    /// that decodes to invalid UTF-8 or to a `/` matches nothing.
    pub fn matches(&self, path: &str) -> Option<PathParams> {
        let mut params = Vec::new();
        let mut remaining = split_segments(path);

        for segment in &self.segments {
            match segment {
                Segment::Literal(expected) => {
                    if decode_segment(remaining.next()?)? != expected.as_str() {
                        return None;
                    }
                }
                Segment::Param(name) => {
                    let value = decode_segment(remaining.next()?)?;
                    if value.is_empty() {
                        return None;
                    }
                    params.push((name.clone(), value.into_owned()));
                }
                Segment::CatchAll(name) => {
                    let tail = remaining
                        .by_ref()
                        .map(decode_segment)
                        .collect::<Option<Vec<_>>>()?;
                    params.push((name.clone(), tail.join("/")));
                }
            }
        }

        if remaining.next().is_some() {
            return None;
        }
        Some(PathParams(params))
    }
}

impl fmt::Display for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// Segments after the leading slash. The root path has none; a trailing
/// slash yields a final empty segment, so `/a/` does not match `/a`.
fn split_segments(path: &str) -> impl Iterator<Item = &str> {
    let trimmed = path.strip_prefix('/').unwrap_or(path);
    let body = if trimmed.is_empty() { None } else { Some(trimmed) };
    body.into_iter().flat_map(|b| b.split('/'))
}

/// Percent-decode one raw path segment.
fn decode_segment(raw: &str) -> Option<Cow<'_, str>> {
    let decoded = percent_decode_str(raw).decode_utf8().ok()?;
    if decoded.contains('/') {
        return None;
    }
    Some(decoded)
}

fn non_empty(name: &str, pattern: &str) -> Result<String, PatternError> {
    if name.is_empty() {
        Err(PatternError::EmptyParameter(pattern.to_string()))
    } else {
        Ok(name.to_string())
    }
}
