//! Route resolution: map a request to a low-cardinality route template.
//!
//! Resolvers are consulted by the tracing and metrics handlers both on the
//! response path and on the error path, so they must be pure and cheap.
//! A route template keeps literal segments and replaces variable parts with
//! placeholders (`/users/{id}`); returning raw path values defeats the purpose.

mod attribute;
mod composite;

pub use attribute::RequestAttributeResolver;
pub use composite::CompositeRouteResolver;

use crate::core::Request;

/// Strategy for resolving the route template of a request.
pub trait RouteResolver: Send + Sync {
    /// Route template, or `None` when this resolver cannot tell.
    fn resolve_route(&self, request: &Request) -> Option<String>;
}

impl<R: RouteResolver + ?Sized> RouteResolver for std::sync::Arc<R> {
    fn resolve_route(&self, request: &Request) -> Option<String> {
        (**self).resolve_route(request)
    }
}

impl<R: RouteResolver + ?Sized> RouteResolver for Box<R> {
    fn resolve_route(&self, request: &Request) -> Option<String> {
        (**self).resolve_route(request)
    }
}
