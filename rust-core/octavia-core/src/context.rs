//! # Request Context
//!
//! Mutable per-request state threaded through the middleware stages.

use crate::request::Request;
use crate::response::Response;
use crate::route::Route;

/// State shared by the middlewares of one request
#[derive(Debug)]
pub struct Context<'r> {
    /// The request, rewritable by middlewares
    pub request: Request,
    /// Matched route, set once routing succeeded
    pub route: Option<&'r Route>,
    /// Captured dynamic segment values, left to right
    pub path_values: Vec<String>,
    /// Response, set once the handler or error path produced one
    pub response: Option<Response>,
    /// Set by a middleware to skip the rest of the current stage
    pub terminate_chain: bool,
}

impl<'r> Context<'r> {
    /// Fresh context for an incoming request
    #[must_use]
    pub const fn new(request: Request) -> Self {
        Self {
            request,
            route: None,
            path_values: Vec::new(),
            response: None,
            terminate_chain: false,
        }
    }

    /// Record the routing result
    pub fn set_route(&mut self, route: &'r Route, values: Vec<String>) {
        self.route = Some(route);
        self.path_values = values;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::router::Method;
    use std::collections::HashMap;

    #[test]
    fn test_context_new() {
        let ctx = Context::new(Request::new(Method::Get, "/".to_string(), HashMap::new(), None));
        assert!(ctx.route.is_none());
        assert!(ctx.path_values.is_empty());
        assert!(ctx.response.is_none());
        assert!(!ctx.terminate_chain);
    }
}
