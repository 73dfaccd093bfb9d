//! Route lookup and dispatch.
//!
//! # Responsibilities
//! - Store compiled routes in registration order
//! - Look up the first route whose pattern matches the full path
//! - Bind captured values to parameter names and merge them into the query
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - O(n) scan in registration order; no specificity ranking
//! - Explicit `None` on a miss rather than a silent default
//! - Generic over the handler reference so the table knows nothing about HTTP

use std::collections::BTreeMap;

use crate::routing::matcher::{RegistrationError, RoutePattern};

/// A registered route: a compiled pattern plus the handler reference it maps to.
#[derive(Debug, Clone)]
pub struct Route<T> {
    pattern: RoutePattern,
    target: T,
}

impl<T> Route<T> {
    /// The compiled pattern.
    pub fn pattern(&self) -> &RoutePattern {
        &self.pattern
    }

    /// The handler reference registered with this route.
    pub fn target(&self) -> &T {
        &self.target
    }
}

/// Result of a successful dispatch.
#[derive(Debug)]
pub struct RouteMatch<'a, T> {
    /// The first matching route.
    pub route: &'a Route<T>,
    /// Route parameters by name. A name repeated within one pattern keeps the
    /// value of its last occurrence.
    pub params: BTreeMap<String, String>,
    /// Route parameters in ordinal order, followed by the original query pairs.
    pub query: Vec<(String, String)>,
}

impl<T> RouteMatch<'_, T> {
    /// First value bound to `name` in the merged query.
    ///
    /// Route parameters come first, so they shadow query-string values.
    pub fn query_value(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// The merged query re-encoded as `application/x-www-form-urlencoded`.
    pub fn encoded_query(&self) -> String {
        url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.query.iter())
            .finish()
    }
}

/// Ordered route table. First registered, first matched.
#[derive(Debug, Clone)]
pub struct RouteTable<T> {
    routes: Vec<Route<T>>,
}

impl<T> Default for RouteTable<T> {
    fn default() -> Self {
        Self { routes: Vec::new() }
    }
}

impl<T> RouteTable<T> {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Compile `pattern` and append it to the table.
    pub fn add(&mut self, pattern: &str, target: T) -> Result<(), RegistrationError> {
        let pattern = RoutePattern::compile(pattern)?;
        tracing::debug!(
            pattern = %pattern.as_str(),
            params = ?pattern.param_names(),
            position = self.routes.len(),
            "Route registered"
        );
        self.routes.push(Route { pattern, target });
        Ok(())
    }

    /// Builder-style variant of [`RouteTable::add`].
    pub fn with_route(mut self, pattern: &str, target: T) -> Result<Self, RegistrationError> {
        self.add(pattern, target)?;
        Ok(self)
    }

    /// Find the first route matching `path`.
    ///
    /// `raw_query` is the undecoded query string (without `?`), if any.
    pub fn dispatch(&self, path: &str, raw_query: Option<&str>) -> Option<RouteMatch<'_, T>> {
        for route in &self.routes {
            let Some(values) = route.pattern.captures(path) else {
                continue;
            };

            let mut params = BTreeMap::new();
            let mut query = Vec::with_capacity(values.len());
            for (name, value) in route.pattern.param_names().iter().zip(values) {
                params.insert(name.clone(), value.clone());
                query.push((name.clone(), value));
            }

            if let Some(raw) = raw_query {
                query.extend(
                    url::form_urlencoded::parse(raw.as_bytes())
                        .map(|(k, v)| (k.into_owned(), v.into_owned())),
                );
            }

            return Some(RouteMatch {
                route,
                params,
                query,
            });
        }

        None
    }

    /// Registered routes in order.
    pub fn routes(&self) -> impl Iterator<Item = &Route<T>> {
        self.routes.iter()
    }

    /// Number of registered routes.
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// True when no routes are registered.
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}
