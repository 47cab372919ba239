//! Route lookup and dispatch.
//!
//! # Responsibilities
//! - Store compiled routes in declaration order
//! - Look up the longest matching prefix for a request path
//! - Return matched route or explicit no-match
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - O(n) full scan (route tables are small)
//! - Strictly-longer wins, so ties keep the earlier route

use crate::config::RouteConfig;
use crate::protocol::percent_decode;
use crate::routing::matcher::{Matcher, PathPrefixMatcher};

#[derive(Debug)]
struct CompiledRoute {
    matcher: PathPrefixMatcher,
    config: RouteConfig,
}

/// Immutable longest-prefix router.
#[derive(Debug, Default)]
pub struct Router {
    routes: Vec<CompiledRoute>,
}

impl Router {
    /// Compile the ordered route list.
    pub fn from_config(routes: Vec<RouteConfig>) -> Self {
        let routes = routes
            .into_iter()
            .map(|config| CompiledRoute {
                matcher: PathPrefixMatcher::new(config.from.clone()),
                config,
            })
            .collect();
        Self { routes }
    }

    /// Find the route whose prefix is the longest match for `path`.
    ///
    /// `path` is the raw request path; it is decoded before matching, so
    /// routes see the same path the backend gets as `PATH_INFO`.
    pub fn match_path(&self, path: &str) -> Option<&RouteConfig> {
        let path = percent_decode(path);
        let path = path.as_str();
        let mut selected = None;
        let mut longest = 0;

        for route in &self.routes {
            if !route.matcher.matches(path) {
                continue;
            }
            if route.config.from.len() > longest {
                longest = route.config.from.len();
                selected = Some(&route.config);
            }
        }

        selected
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn router() -> Router {
        Router::from_config(vec![
            RouteConfig::new("/a", "h1:1"),
            RouteConfig::new("/a/b", "h2:1"),
        ])
    }

    #[test]
    fn test_encoded_path_matches_decoded_prefix() {
        let router = Router::from_config(vec![RouteConfig::new("/app", "h:1")]);
        assert_eq!(router.match_path("/%61pp/x").map(|r| r.to.as_str()), Some("h:1"));
        assert_eq!(router.match_path("/app%2Fx").map(|r| r.to.as_str()), Some("h:1"));
        assert!(router.match_path("/%62pp/x").is_none());
    }

    #[test]
    fn test_longest_prefix_wins() {
        let router = router();
        assert_eq!(router.match_path("/a/b/c").map(|r| r.to.as_str()), Some("h2:1"));
        assert_eq!(router.match_path("/a/x").map(|r| r.to.as_str()), Some("h1:1"));
        assert!(router.match_path("/z").is_none());
    }

    #[test]
    fn test_declaration_order_does_not_matter() {
        let router = Router::from_config(vec![
            RouteConfig::new("/a/b", "h2:1"),
            RouteConfig::new("/a", "h1:1"),
        ]);
        assert_eq!(router.match_path("/a/b/c").unwrap().to, "h2:1");
    }

    #[test]
    fn test_tie_keeps_first() {
        let router = Router::from_config(vec![
            RouteConfig::new("/a/", "first:1"),
            RouteConfig::new("/a/", "second:1"),
        ]);
        assert_eq!(router.match_path("/a/x").unwrap().to, "first:1");
    }

    #[test]
    fn test_empty_prefix_never_selected() {
        let router = Router::from_config(vec![RouteConfig::new("", "h:1")]);
        assert!(router.match_path("/anything").is_none());
    }

    #[test]
    fn test_root_prefix_is_catch_all() {
        let router = Router::from_config(vec![
            RouteConfig::new("/", "root:1"),
            RouteConfig::new("/api", "api:1"),
        ]);
        assert_eq!(router.match_path("/home").unwrap().to, "root:1");
        assert_eq!(router.match_path("/api/v1").unwrap().to, "api:1");
    }
}
