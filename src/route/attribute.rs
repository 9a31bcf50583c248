//! Route taken from a request attribute set by a router.

use super::RouteResolver;
use crate::core::Request;

/// Reads the route template from a named request attribute.
#[derive(Clone, Debug)]
pub struct RequestAttributeResolver {
    attribute: String,
}

impl RequestAttributeResolver {
    pub fn new(attribute: impl Into<String>) -> Self {
        Self {
            attribute: attribute.into(),
        }
    }

    #[inline]
    pub fn attribute(&self) -> &str {
        &self.attribute
    }
}

impl RouteResolver for RequestAttributeResolver {
    fn resolve_route(&self, request: &Request) -> Option<String> {
        request.attribute(&self.attribute).map(|v| v.to_string())
    }
}
