//! Route lookup and dispatch.
//!
//! # Responsibilities
//! - Store compiled routes
//! - Look up matching route for request
//! - Return matched route or explicit no-match
//!
//! # Design Decisions
//! - Immutable after construction; reloads build a new Router
//! - O(n) scan in priority order (acceptable for typical route counts)
//! - Ties keep configuration order

use axum::http::{HeaderMap, Uri};

use crate::config::RouteConfig;
use crate::routing::matcher::{AndMatcher, HostMatcher, Matcher, PathPrefixMatcher};

/// A compiled route.
#[derive(Debug)]
pub struct Route {
    /// Route identifier for logging.
    pub name: String,
    /// Upstream `host:port`.
    pub upstream: String,
    priority: u32,
    matcher: AndMatcher,
}

impl Route {
    fn compile(config: RouteConfig) -> Self {
        let mut matchers: Vec<Box<dyn Matcher>> = Vec::new();
        if let Some(host) = config.host {
            matchers.push(Box::new(HostMatcher::new(host)));
        }
        if let Some(prefix) = config.path_prefix {
            matchers.push(Box::new(PathPrefixMatcher::new(prefix)));
        }
        Self {
            name: config.name,
            upstream: config.upstream,
            priority: config.priority,
            matcher: AndMatcher::new(matchers),
        }
    }
}

/// Ordered set of routes.
#[derive(Debug, Default)]
pub struct Router {
    routes: Vec<Route>,
}

impl Router {
    /// Compile routes from configuration, highest priority first.
    pub fn from_config(routes: Vec<RouteConfig>) -> Self {
        let mut routes: Vec<Route> = routes.into_iter().map(Route::compile).collect();
        // Stable sort keeps configuration order among equal priorities.
        routes.sort_by(|a, b| b.priority.cmp(&a.priority));
        Self { routes }
    }

    /// Find the first route matching the request head.
    pub fn match_request(&self, uri: &Uri, headers: &HeaderMap) -> Option<&Route> {
        self.routes.iter().find(|r| r.matcher.matches(uri, headers))
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}
