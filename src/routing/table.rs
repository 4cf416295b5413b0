//! Route table module
//!
//! Holds registered routes per HTTP method and selects the most specific
//! pattern for an incoming path.

use hyper::Method;
use std::collections::HashMap;

use super::matcher::{Params, PathPattern};
use super::RouteError;

/// A registered route
#[derive(Debug)]
pub struct Route<H> {
    pub method: Method,
    pub pattern: PathPattern,
    pub handler: H,
    /// Required request content type (e.g. `application/json`)
    pub consumes: Option<String>,
    /// Content type of successful responses
    pub produces: Option<String>,
}

/// Result of a successful lookup
#[derive(Debug)]
pub struct RouteMatch<'a, H> {
    pub route: &'a Route<H>,
    pub params: Params,
}

/// Routes grouped by method. Immutable once the server starts.
#[derive(Debug)]
pub struct RouteTable<H> {
    routes: HashMap<Method, Vec<Route<H>>>,
}

impl<H> Default for RouteTable<H> {
    fn default() -> Self {
        Self {
            routes: HashMap::new(),
        }
    }
}

impl<H> RouteTable<H> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a route.
    ///
    /// Fails with [`RouteError::Conflict`] when an existing route for the same
    /// method overlaps the new pattern and neither is more specific.
    pub fn register(&mut self, route: Route<H>) -> Result<(), RouteError> {
        let existing = self.routes.entry(route.method.clone()).or_default();

        if let Some(other) = existing.iter().find(|r| {
            r.pattern.overlaps(&route.pattern) && r.pattern.specificity(&route.pattern).is_eq()
        }) {
            return Err(RouteError::Conflict {
                method: route.method.to_string(),
                pattern: route.pattern.to_string(),
                existing: other.pattern.to_string(),
            });
        }

        existing.push(route);
        Ok(())
    }

    /// Find the route for `method` and `path`, or `None` (no match)
    pub fn find(&self, method: &Method, path: &str) -> Option<RouteMatch<'_, H>> {
        self.routes
            .get(method)?
            .iter()
            .filter_map(|route| {
                let params = route.pattern.matches(path)?;
                Some(RouteMatch { route, params })
            })
            .reduce(|best, candidate| {
                if candidate.route.pattern.specificity(&best.route.pattern).is_gt() {
                    candidate
                } else {
                    best
                }
            })
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.routes.values().map(Vec::len).sum()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterate over all registered routes (used for startup logging)
    pub fn iter(&self) -> impl Iterator<Item = &Route<H>> {
        self.routes.values().flatten()
    }
}
