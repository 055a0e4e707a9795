//! # Route Definition
//!
//! A single registered endpoint: method, path pattern, access flags,
//! required parameters, route-scoped middlewares and the handler.
//!
//! Routes are built once at registration time and never mutated by
//! request handling. Values captured from dynamic segments travel with
//! the per-request [`Context`](crate::context::Context) instead.

use crate::error::Result;
use crate::health::HealthConfig;
use crate::middleware::{Middleware, Scope, Scoped};
use crate::oauth::OAuthConfig;
use crate::params::{Params, Required};
use crate::path::{dynamic_segment_types, route_name, segment_is_dynamic, split_path};
use crate::request::Request;
use crate::response::Response;
use crate::router::Method;
use crate::session::Session;
use crate::types::{ParamValue, SegmentType};
use crate::upload::UploadConfig;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Route-kind specific argument passed to the handler after the common ones
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extra {
    /// Plain and health routes
    None,
    /// Stored paths of the uploaded files
    Files(Vec<PathBuf>),
    /// Whether the OAuth consent succeeded
    OAuth(bool),
}

/// Arguments handed to a route handler
pub struct Call<'a> {
    /// Coerced dynamic segment values, left to right
    pub params: &'a [ParamValue],
    /// Query parameters
    pub query: &'a Params,
    /// Body parameters
    pub body: &'a Params,
    /// Session capability
    pub session: &'a dyn Session,
    /// The request as seen after AFTER_ROUTING middlewares
    pub request: &'a Request,
    /// Route-kind specific argument
    pub extra: Extra,
}

impl Call<'_> {
    /// Dynamic value at `index` as text
    #[must_use]
    pub fn param(&self, index: usize) -> Option<String> {
        self.params.get(index).map(ParamValue::as_string)
    }
}

/// Route handler function
pub type Handler = Arc<dyn Fn(&Call<'_>) -> Result<Response> + Send + Sync>;

/// Specialization of a route, governing pre-invocation work
#[derive(Debug, Clone)]
pub enum RouteKind {
    /// Plain method route
    Plain,
    /// File upload (POST)
    Upload(UploadConfig),
    /// Health check (GET), optionally behind basic auth
    Health(HealthConfig),
    /// Google OAuth consent (GET)
    GoogleOAuth(OAuthConfig),
}

impl RouteKind {
    /// Kind name for logging
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Plain => "plain",
            Self::Upload(_) => "upload",
            Self::Health(_) => "health",
            Self::GoogleOAuth(_) => "google_oauth",
        }
    }
}

/// A registered endpoint
pub struct Route {
    name: String,
    method: Method,
    kind: RouteKind,
    path: String,
    segments: Vec<String>,
    segment_types: Vec<Option<SegmentType>>,
    required_query: Required,
    required_body: Required,
    requires_login: bool,
    requires_admin: bool,
    scoped: Scoped,
    handler: Handler,
}

impl Route {
    /// Build a route.
    ///
    /// `full_path` is the prefix-expanded path (informational and used as
    /// the uniqueness key); `local_path` is the path relative to its
    /// group, from which the matchable segments are derived.
    pub(crate) fn new(
        method: Method,
        kind: RouteKind,
        full_path: String,
        local_path: &str,
        handler: Handler,
    ) -> Self {
        let segments: Vec<String> = split_path(local_path)
            .into_iter()
            .map(ToString::to_string)
            .collect();
        let segment_types = dynamic_segment_types(&segments);

        Self {
            name: route_name(&full_path),
            method,
            kind,
            path: full_path,
            segments,
            segment_types,
            required_query: Required::Nothing,
            required_body: Required::Nothing,
            requires_login: false,
            requires_admin: false,
            scoped: Scoped::new(Scope::Route),
            handler,
        }
    }

    /// Require a logged-in session
    pub fn login(&mut self) -> &mut Self {
        self.requires_login = true;
        self
    }

    /// Require an admin session
    pub fn admin(&mut self) -> &mut Self {
        self.requires_admin = true;
        self
    }

    /// Set the required query parameters
    pub fn query(&mut self, required: impl Into<Required>) -> &mut Self {
        self.required_query = required.into();
        self
    }

    /// Set the required body parameters
    pub fn body(&mut self, required: impl Into<Required>) -> &mut Self {
        self.required_body = required.into();
        self
    }

    /// Add a route-scoped middleware
    pub fn add<M: Middleware + 'static>(&mut self, middleware: M) -> &mut Self {
        self.scoped.add(Arc::new(middleware));
        self
    }

    /// Add an already shared route-scoped middleware
    pub fn add_shared(&mut self, middleware: Arc<dyn Middleware>) -> &mut Self {
        self.scoped.add(middleware);
        self
    }

    /// Exclude a middleware (by id) for this route
    pub fn no(&mut self, id: &str) -> &mut Self {
        self.scoped.exclude(id);
        self
    }

    /// Replace the handler
    pub fn handler<F>(&mut self, handler: F) -> &mut Self
    where
        F: Fn(&Call<'_>) -> Result<Response> + Send + Sync + 'static,
    {
        self.handler = Arc::new(handler);
        self
    }

    /// Slug derived from the path
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// HTTP method
    #[must_use]
    pub const fn method(&self) -> Method {
        self.method
    }

    /// Route kind
    #[must_use]
    pub const fn kind(&self) -> &RouteKind {
        &self.kind
    }

    /// Prefix-expanded path pattern
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Group-relative pattern segments
    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Declared types parallel to [`Route::segments`], `None` for static or untyped
    #[must_use]
    pub fn segment_types(&self) -> &[Option<SegmentType>] {
        &self.segment_types
    }

    /// Declared types of the dynamic segments only, left to right
    pub fn dynamic_types(&self) -> impl Iterator<Item = Option<SegmentType>> + '_ {
        self.segments
            .iter()
            .zip(&self.segment_types)
            .filter(|(segment, _)| segment_is_dynamic(segment))
            .map(|(_, ty)| *ty)
    }

    /// Required query parameters
    #[must_use]
    pub const fn required_query(&self) -> &Required {
        &self.required_query
    }

    /// Required body parameters
    #[must_use]
    pub const fn required_body(&self) -> &Required {
        &self.required_body
    }

    /// Whether a logged-in session is required
    #[must_use]
    pub const fn requires_login(&self) -> bool {
        self.requires_login
    }

    /// Whether an admin session is required
    #[must_use]
    pub const fn requires_admin(&self) -> bool {
        self.requires_admin
    }

    /// Route-scoped middlewares and exclusions
    #[must_use]
    pub const fn scoped(&self) -> &Scoped {
        &self.scoped
    }

    pub(crate) fn call(&self, call: &Call<'_>) -> Result<Response> {
        (self.handler)(call)
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("name", &self.name)
            .field("method", &self.method)
            .field("kind", &self.kind.name())
            .field("path", &self.path)
            .field("requires_login", &self.requires_login)
            .field("requires_admin", &self.requires_admin)
            .finish_non_exhaustive()
    }
}
