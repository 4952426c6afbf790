//! Named Route Resolution
//!
//! Provides a trait-based abstraction for resolving quoted URL references
//! (`"route-name"`) to absolute paths. Pages may point at routes owned by
//! the host application instead of carrying a path themselves; the resolver
//! is the seam where the host plugs its routing table in.
//!
//! Implementations are chosen at startup and injected into `PageService`
//! through its constructor.
//!
//! # Examples
//!
//! ```rust
//! use fiber_core::services::routes::{NamedRouteResolver, StaticRouteResolver};
//!
//! let resolver = StaticRouteResolver::new().with_route("docs", "/documentation/");
//! assert_eq!(resolver.resolve("docs"), Some("/documentation/".to_string()));
//! assert_eq!(resolver.resolve("missing"), None);
//! ```

use std::collections::HashMap;

/// Trait for resolving named routes to absolute paths
///
/// A page whose `url` field is quoted (`"docs"`) derives its absolute URL
/// by asking the resolver for the route name between the quotes. Returning
/// `None` makes the referencing page fail validation with
/// `UnresolvedNamedRoute` before anything persists.
pub trait NamedRouteResolver: Send + Sync {
    /// Resolve a route name to its absolute path
    fn resolve(&self, name: &str) -> Option<String>;
}

/// Table-backed route resolver
///
/// The bundled implementation: a fixed name-to-path table built at startup.
/// Hosts with dynamic routing implement [`NamedRouteResolver`] themselves.
#[derive(Debug, Clone, Default)]
pub struct StaticRouteResolver {
    routes: HashMap<String, String>,
}

impl StaticRouteResolver {
    /// Create an empty resolver that knows no routes
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a route, builder-style
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use fiber_core::services::routes::StaticRouteResolver;
    /// let resolver = StaticRouteResolver::new()
    ///     .with_route("docs", "/documentation/")
    ///     .with_route("blog", "/news/");
    /// ```
    pub fn with_route(mut self, name: impl Into<String>, path: impl Into<String>) -> Self {
        self.routes.insert(name.into(), path.into());
        self
    }

    /// Number of registered routes
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Whether the table is empty
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

impl NamedRouteResolver for StaticRouteResolver {
    fn resolve(&self, name: &str) -> Option<String> {
        self.routes.get(name).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_resolver_resolves_nothing() {
        let resolver = StaticRouteResolver::new();

        assert!(resolver.is_empty());
        assert_eq!(resolver.resolve("docs"), None);
    }

    #[test]
    fn test_with_route_builder() {
        let resolver = StaticRouteResolver::new()
            .with_route("docs", "/documentation/")
            .with_route("blog", "/news/");

        assert_eq!(resolver.len(), 2);
        assert_eq!(resolver.resolve("docs"), Some("/documentation/".to_string()));
        assert_eq!(resolver.resolve("blog"), Some("/news/".to_string()));
        assert_eq!(resolver.resolve("shop"), None);
    }

    #[test]
    fn test_later_route_overrides_earlier() {
        let resolver = StaticRouteResolver::new()
            .with_route("docs", "/old/")
            .with_route("docs", "/new/");

        assert_eq!(resolver.len(), 1);
        assert_eq!(resolver.resolve("docs"), Some("/new/".to_string()));
    }
}
