//! Route Table and Route Resolver.
//!
//! # Responsibilities
//! - Store the compiled, locally handled routes
//! - Decide per (method, path) whether a local route claims the request
//! - Return the matched route or an explicit no-match
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - Registration order is priority: the first matching descriptor wins
//! - Catch-all descriptors are the fallback, never part of the table
//! - Method comparison is exact; a GET route does not claim HEAD

use axum::http::Method;

use crate::routing::matcher::{PathParams, PathPattern, PatternError};

/// A locally registered (method, path-pattern) pair and what it maps to.
#[derive(Debug, Clone)]
pub struct RouteDescriptor<T> {
    pub method: Method,
    pub pattern: PathPattern,
    pub target: T,
}

impl<T> RouteDescriptor<T> {
    /// Build a descriptor, compiling `pattern`.
    pub fn new(method: Method, pattern: &str, target: T) -> Result<Self, PatternError> {
        Ok(Self {
            method,
            pattern: PathPattern::parse(pattern)?,
            target,
        })
    }
}

/// A successful resolution: the claimed route and its bound segments.
#[derive(Debug, PartialEq, Eq)]
pub struct RouteMatch<'a, T> {
    pub target: &'a T,
    pub pattern: &'a PathPattern,
    pub params: PathParams,
}

/// Verdict of [`RouteTable::resolve`].
#[derive(Debug, PartialEq, Eq)]
pub enum Resolution<'a, T> {
    Matched(RouteMatch<'a, T>),
    Unmatched,
}

impl<T> Resolution<'_, T> {
    pub fn is_matched(&self) -> bool {
        matches!(self, Resolution::Matched(_))
    }
}

/// Ordered, immutable set of local routes.
#[derive(Debug, Clone)]
pub struct RouteTable<T> {
    routes: Vec<RouteDescriptor<T>>,
}

impl<T> RouteTable<T> {
    /// Freeze descriptors into a table, in the given priority order.
    ///
    /// Catch-all descriptors are dropped: they stand for "forward everything"
    /// and would otherwise claim every request, masking a genuine no-match.
    pub fn new(descriptors: Vec<RouteDescriptor<T>>) -> Self {
        let routes = descriptors
            .into_iter()
            .filter(|d| {
                if d.pattern.is_catch_all() {
                    tracing::debug!(
                        method = %d.method,
                        pattern = %d.pattern,
                        "Excluding catch-all descriptor from route table"
                    );
                    false
                } else {
                    true
                }
            })
            .collect();
        Self { routes }
    }

    /// Resolve a request. Pure and deterministic.
    pub fn resolve(&self, method: &Method, path: &str) -> Resolution<'_, T> {
        self.routes
            .iter()
            .filter(|route| route.method == *method)
            .find_map(|route| {
                route.pattern.matches(path).map(|params| RouteMatch {
                    target: &route.target,
                    pattern: &route.pattern,
                    params,
                })
            })
            .map_or(Resolution::Unmatched, Resolution::Matched)
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn descriptors(&self) -> impl Iterator<Item = &RouteDescriptor<T>> {
        self.routes.iter()
    }
}
