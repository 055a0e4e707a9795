//! # Route Groups
//!
//! A group owns the routes registered under one path prefix together
//! with its group-scoped middlewares and exclusions. Routes are kept in
//! registration order, which is the order the router tries them in.

use crate::error::{Error, Result};
use crate::health::HealthConfig;
use crate::middleware::{Middleware, Scope, Scoped};
use crate::oauth::OAuthConfig;
use crate::response::Response;
use crate::route::{Call, Route, RouteKind};
use crate::router::Method;
use crate::upload::UploadConfig;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Routes sharing a prefix
#[derive(Debug)]
pub struct RouteGroup {
    prefix: String,
    base: String,
    routes: Vec<Route>,
    index: HashMap<(Method, String), usize>,
    scoped: Scoped,
}

impl RouteGroup {
    /// Create a group.
    ///
    /// `prefix` is matched against request paths once the router's
    /// global prefix has been stripped; `base` is the global prefix
    /// plus `prefix`, used to build full route paths.
    pub(crate) fn new(prefix: String, base: String) -> Self {
        Self {
            prefix,
            base,
            routes: Vec::new(),
            index: HashMap::new(),
            scoped: Scoped::new(Scope::Group),
        }
    }

    /// Group prefix, relative to the router's global prefix
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Global prefix plus group prefix
    #[must_use]
    pub fn base(&self) -> &str {
        &self.base
    }

    /// Registered routes in registration order
    #[must_use]
    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    /// Group-scoped middlewares and exclusions
    #[must_use]
    pub const fn scoped(&self) -> &Scoped {
        &self.scoped
    }

    /// Add a group-scoped middleware
    pub fn add<M: Middleware + 'static>(&mut self, middleware: M) -> &mut Self {
        self.scoped.add(Arc::new(middleware));
        self
    }

    /// Add an already shared group-scoped middleware
    pub fn add_shared(&mut self, middleware: Arc<dyn Middleware>) -> &mut Self {
        self.scoped.add(middleware);
        self
    }

    /// Exclude a middleware (by id) for every route of the group
    pub fn no(&mut self, id: &str) -> &mut Self {
        self.scoped.exclude(id);
        self
    }

    /// Register a GET route
    ///
    /// # Errors
    ///
    /// Returns `Error::RouteAlreadyRegistered` if the method and full
    /// path are already taken in this group.
    pub fn get<F>(&mut self, path: &str, handler: F) -> Result<&mut Route>
    where
        F: Fn(&Call<'_>) -> Result<Response> + Send + Sync + 'static,
    {
        self.register_route(Method::Get, RouteKind::Plain, path, Arc::new(handler))
    }

    /// Register a POST route
    ///
    /// # Errors
    ///
    /// Returns `Error::RouteAlreadyRegistered` on a duplicate.
    pub fn post<F>(&mut self, path: &str, handler: F) -> Result<&mut Route>
    where
        F: Fn(&Call<'_>) -> Result<Response> + Send + Sync + 'static,
    {
        self.register_route(Method::Post, RouteKind::Plain, path, Arc::new(handler))
    }

    /// Register a PUT route
    ///
    /// # Errors
    ///
    /// Returns `Error::RouteAlreadyRegistered` on a duplicate.
    pub fn put<F>(&mut self, path: &str, handler: F) -> Result<&mut Route>
    where
        F: Fn(&Call<'_>) -> Result<Response> + Send + Sync + 'static,
    {
        self.register_route(Method::Put, RouteKind::Plain, path, Arc::new(handler))
    }

    /// Register a DELETE route
    ///
    /// # Errors
    ///
    /// Returns `Error::RouteAlreadyRegistered` on a duplicate.
    pub fn delete<F>(&mut self, path: &str, handler: F) -> Result<&mut Route>
    where
        F: Fn(&Call<'_>) -> Result<Response> + Send + Sync + 'static,
    {
        self.register_route(Method::Delete, RouteKind::Plain, path, Arc::new(handler))
    }

    /// Register a PATCH route
    ///
    /// # Errors
    ///
    /// Returns `Error::RouteAlreadyRegistered` on a duplicate.
    pub fn patch<F>(&mut self, path: &str, handler: F) -> Result<&mut Route>
    where
        F: Fn(&Call<'_>) -> Result<Response> + Send + Sync + 'static,
    {
        self.register_route(Method::Patch, RouteKind::Plain, path, Arc::new(handler))
    }

    /// Register an OPTIONS route
    ///
    /// # Errors
    ///
    /// Returns `Error::RouteAlreadyRegistered` on a duplicate.
    pub fn options<F>(&mut self, path: &str, handler: F) -> Result<&mut Route>
    where
        F: Fn(&Call<'_>) -> Result<Response> + Send + Sync + 'static,
    {
        self.register_route(Method::Options, RouteKind::Plain, path, Arc::new(handler))
    }

    /// Register a HEAD route
    ///
    /// # Errors
    ///
    /// Returns `Error::RouteAlreadyRegistered` on a duplicate.
    pub fn head<F>(&mut self, path: &str, handler: F) -> Result<&mut Route>
    where
        F: Fn(&Call<'_>) -> Result<Response> + Send + Sync + 'static,
    {
        self.register_route(Method::Head, RouteKind::Plain, path, Arc::new(handler))
    }

    /// Register a POST file-upload route.
    ///
    /// Files are validated and stored before the handler runs; the handler
    /// receives the stored paths as `Extra::Files`.
    ///
    /// # Errors
    ///
    /// Returns `Error::RouteAlreadyRegistered` on a duplicate.
    pub fn upload<F>(&mut self, path: &str, handler: F, config: UploadConfig) -> Result<&mut Route>
    where
        F: Fn(&Call<'_>) -> Result<Response> + Send + Sync + 'static,
    {
        self.register_route(Method::Post, RouteKind::Upload(config), path, Arc::new(handler))
    }

    /// Register a GET health route, optionally behind basic auth
    ///
    /// # Errors
    ///
    /// Returns `Error::RouteAlreadyRegistered` on a duplicate.
    pub fn health<F>(&mut self, path: &str, handler: F, config: HealthConfig) -> Result<&mut Route>
    where
        F: Fn(&Call<'_>) -> Result<Response> + Send + Sync + 'static,
    {
        self.register_route(Method::Get, RouteKind::Health(config), path, Arc::new(handler))
    }

    /// Register a GET Google OAuth consent route.
    ///
    /// The handler receives the consent result as `Extra::OAuth`.
    ///
    /// # Errors
    ///
    /// Returns `Error::RouteAlreadyRegistered` on a duplicate.
    pub fn google_oauth<F>(
        &mut self,
        path: &str,
        handler: F,
        config: OAuthConfig,
    ) -> Result<&mut Route>
    where
        F: Fn(&Call<'_>) -> Result<Response> + Send + Sync + 'static,
    {
        self.register_route(Method::Get, RouteKind::GoogleOAuth(config), path, Arc::new(handler))
    }

    fn register_route(
        &mut self,
        method: Method,
        kind: RouteKind,
        path: &str,
        handler: crate::route::Handler,
    ) -> Result<&mut Route> {
        let full_path = join_path(&self.base, path);
        let key = (method, full_path.clone());
        if self.index.contains_key(&key) {
            return Err(Error::RouteAlreadyRegistered {
                method: method.to_string(),
                path: full_path,
            });
        }

        debug!(method = %method, path = %full_path, kind = kind.name(), "Registering route");
        let route = Route::new(method, kind, full_path, path, handler);
        let position = self.routes.len();
        self.index.insert(key, position);
        self.routes.push(route);
        Ok(&mut self.routes[position])
    }
}

/// Join a base prefix and a route path into a normalized absolute path
fn join_path(base: &str, path: &str) -> String {
    let path = path.trim_end_matches('/');
    let mut full = String::with_capacity(base.len() + path.len() + 1);
    full.push_str(base);
    if !path.is_empty() {
        if !path.starts_with('/') {
            full.push('/');
        }
        full.push_str(path);
    }
    if full.is_empty() {
        full.push('/');
    }
    full
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::{HtmlEncode, Stage};

    fn ok(_: &Call<'_>) -> Result<Response> {
        Ok(Response::default())
    }

    #[test]
    fn test_join_path() {
        assert_eq!(join_path("/api", "/users"), "/api/users");
        assert_eq!(join_path("/api", "users/"), "/api/users");
        assert_eq!(join_path("", "/"), "/");
        assert_eq!(join_path("/api", "/"), "/api");
    }

    #[test]
    fn test_register_keeps_order() {
        let mut group = RouteGroup::new("/x".into(), "/x".into());
        group.get("/{id}", ok).unwrap();
        group.get("/active", ok).unwrap();

        let paths: Vec<&str> = group.routes().iter().map(Route::path).collect();
        assert_eq!(paths, vec!["/x/{id}", "/x/active"]);
    }

    #[test]
    fn test_duplicate_route_rejected() {
        let mut group = RouteGroup::new("/api".into(), "/api".into());
        group.get("/users", ok).unwrap();
        let err = group.get("/users/", ok).unwrap_err();
        assert!(matches!(
            err,
            Error::RouteAlreadyRegistered { ref path, .. } if path == "/api/users"
        ));
        assert!(group.post("/users", ok).is_ok());
    }

    #[test]
    fn test_route_kinds() {
        let mut group = RouteGroup::new(String::new(), String::new());
        let upload = group.upload("/files", ok, UploadConfig::default()).unwrap();
        assert_eq!(upload.method(), Method::Post);
        assert_eq!(upload.kind().name(), "upload");

        let health = group.health("/health", ok, HealthConfig::default()).unwrap();
        assert_eq!(health.method(), Method::Get);

        let oauth = group.google_oauth("/google", ok, OAuthConfig::default()).unwrap();
        assert_eq!(oauth.kind().name(), "google_oauth");
    }

    #[test]
    fn test_group_middlewares() {
        let mut group = RouteGroup::new("/web".into(), "/web".into());
        group.add(HtmlEncode).no("json_encode");
        assert_eq!(group.scoped().at(Stage::BeforeOutput).len(), 1);
        assert!(group.scoped().excludes("json_encode"));
    }
}
