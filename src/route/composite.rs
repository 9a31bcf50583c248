//! First-match composition of route resolvers.

use std::sync::Arc;

use super::RouteResolver;
use crate::core::Request;

/// Tries resolvers in order and returns the first route found.
#[derive(Clone, Default)]
pub struct CompositeRouteResolver {
    resolvers: Vec<Arc<dyn RouteResolver>>,
}

impl CompositeRouteResolver {
    pub fn new(resolvers: Vec<Arc<dyn RouteResolver>>) -> Self {
        Self { resolvers }
    }

    /// Append a resolver.
    pub fn with<R: RouteResolver + 'static>(mut self, resolver: R) -> Self {
        self.resolvers.push(Arc::new(resolver));
        self
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.resolvers.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.resolvers.is_empty()
    }
}

impl RouteResolver for CompositeRouteResolver {
    fn resolve_route(&self, request: &Request) -> Option<String> {
        self.resolvers
            .iter()
            .find_map(|resolver| resolver.resolve_route(request))
    }
}
