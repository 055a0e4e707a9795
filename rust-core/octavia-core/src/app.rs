//! # Application
//!
//! Registration surface and per-request orchestration.
//!
//! ```text
//! BEFORE_ROUTING -> route (404) -> AFTER_ROUTING -> access (401/403)
//!   -> route kind -> query/body validation -> path coercion -> handler
//!   -> BEFORE_OUTPUT
//! ```
//!
//! Any error is logged, turned into `{data: CODE, status}` and still
//! passed through BEFORE_OUTPUT. If that fails too, a fixed 500 JSON
//! body is returned.

use crate::config::Config;
use crate::context::Context;
use crate::error::{Error, Result};
use crate::group::RouteGroup;
use crate::json::parse_json_bytes;
use crate::logging::{Logger, TracingLogger};
use crate::middleware::{
    JsonEncode, Middleware, MiddlewareHandler, MiddlewareRegistry, Scoped, Stage,
};
use crate::oauth::{OAuthOutcome, OAuthProvider};
use crate::params::Params;
use crate::request::Request;
use crate::response::Response;
use crate::route::{Call, Extra, Route, RouteKind};
use crate::router::Router;
use crate::session::Session;
use crate::types::{coerce_segments, ParamValue};
use crate::upload;
use serde_json::{json, Value};
use std::fmt;
use std::sync::Arc;

/// Body sent when even the error response cannot be produced
pub const FALLBACK_BODY: &str = r#"{"data":"INTERNAL_SERVER_ERROR"}"#;

/// Router, middlewares and collaborators of one application
pub struct App {
    config: Config,
    router: Router,
    middlewares: MiddlewareHandler,
    registry: MiddlewareRegistry,
    logger: Arc<dyn Logger>,
    oauth: Option<Arc<dyn OAuthProvider>>,
}

impl Default for App {
    fn default() -> Self {
        Self::new()
    }
}

impl App {
    /// Application with default configuration
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    /// Application with the given configuration.
    ///
    /// JSON output encoding is registered globally; routes opt out with
    /// `.no("json_encode")`.
    #[must_use]
    pub fn with_config(config: Config) -> Self {
        let mut router = Router::new();
        router.set_strict_string_segments(config.strict_string_segments);
        let mut middlewares = MiddlewareHandler::new();
        middlewares.add(JsonEncode);

        Self {
            config,
            router,
            middlewares,
            registry: MiddlewareRegistry::with_defaults(),
            logger: Arc::new(TracingLogger::default()),
            oauth: None,
        }
    }

    /// Configuration
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Router
    #[must_use]
    pub const fn router(&self) -> &Router {
        &self.router
    }

    /// Mutable router, for settings not mirrored on the app
    pub fn router_mut(&mut self) -> &mut Router {
        &mut self.router
    }

    /// Middleware registry, for registering custom ids
    pub fn registry_mut(&mut self) -> &mut MiddlewareRegistry {
        &mut self.registry
    }

    /// Replace the logger
    pub fn set_logger(&mut self, logger: Arc<dyn Logger>) {
        self.logger = logger;
    }

    /// Register the provider driving OAuth routes
    pub fn set_oauth_provider(&mut self, provider: Arc<dyn OAuthProvider>) {
        self.oauth = Some(provider);
    }

    /// Set the global route prefix
    pub fn prefix(&mut self, prefix: &str) -> &mut Self {
        self.router.set_prefix(prefix);
        self
    }

    /// Register a route group
    ///
    /// # Errors
    ///
    /// Returns `Error::GroupAlreadyRegistered` on a duplicate prefix.
    pub fn group(&mut self, prefix: &str) -> Result<&mut RouteGroup> {
        self.router.group(prefix)
    }

    /// Group at the empty prefix
    pub fn default_group(&mut self) -> &mut RouteGroup {
        self.router.default_group()
    }

    /// Add a global middleware
    pub fn add<M: Middleware + 'static>(&mut self, middleware: M) -> &mut Self {
        self.middlewares.add(middleware);
        self
    }

    /// Add a global middleware ahead of the others of its stage
    pub fn add_before<M: Middleware + 'static>(&mut self, middleware: M) -> &mut Self {
        self.middlewares.add_before(middleware);
        self
    }

    /// Instantiate a registered middleware by id
    ///
    /// # Errors
    ///
    /// Returns `Error::UnknownMiddleware` for an unregistered id.
    pub fn middleware(&self, id: &str) -> Result<Arc<dyn Middleware>> {
        self.registry.create(id)
    }

    /// Instantiate a registered middleware by id and add it globally
    ///
    /// # Errors
    ///
    /// Returns `Error::UnknownMiddleware` for an unregistered id.
    pub fn use_middleware(&mut self, id: &str) -> Result<&mut Self> {
        let middleware = self.registry.create(id)?;
        self.middlewares.add_shared(middleware);
        Ok(self)
    }

    /// Register a GET route on the default group
    ///
    /// # Errors
    ///
    /// Returns `Error::RouteAlreadyRegistered` on a duplicate.
    pub fn get<F>(&mut self, path: &str, handler: F) -> Result<&mut Route>
    where
        F: Fn(&Call<'_>) -> Result<Response> + Send + Sync + 'static,
    {
        self.router.default_group().get(path, handler)
    }

    /// Register a POST route on the default group
    ///
    /// # Errors
    ///
    /// Returns `Error::RouteAlreadyRegistered` on a duplicate.
    pub fn post<F>(&mut self, path: &str, handler: F) -> Result<&mut Route>
    where
        F: Fn(&Call<'_>) -> Result<Response> + Send + Sync + 'static,
    {
        self.router.default_group().post(path, handler)
    }

    /// Register a PUT route on the default group
    ///
    /// # Errors
    ///
    /// Returns `Error::RouteAlreadyRegistered` on a duplicate.
    pub fn put<F>(&mut self, path: &str, handler: F) -> Result<&mut Route>
    where
        F: Fn(&Call<'_>) -> Result<Response> + Send + Sync + 'static,
    {
        self.router.default_group().put(path, handler)
    }

    /// Register a DELETE route on the default group
    ///
    /// # Errors
    ///
    /// Returns `Error::RouteAlreadyRegistered` on a duplicate.
    pub fn delete<F>(&mut self, path: &str, handler: F) -> Result<&mut Route>
    where
        F: Fn(&Call<'_>) -> Result<Response> + Send + Sync + 'static,
    {
        self.router.default_group().delete(path, handler)
    }

    /// Register a PATCH route on the default group
    ///
    /// # Errors
    ///
    /// Returns `Error::RouteAlreadyRegistered` on a duplicate.
    pub fn patch<F>(&mut self, path: &str, handler: F) -> Result<&mut Route>
    where
        F: Fn(&Call<'_>) -> Result<Response> + Send + Sync + 'static,
    {
        self.router.default_group().patch(path, handler)
    }

    /// Register an OPTIONS route on the default group
    ///
    /// # Errors
    ///
    /// Returns `Error::RouteAlreadyRegistered` on a duplicate.
    pub fn options<F>(&mut self, path: &str, handler: F) -> Result<&mut Route>
    where
        F: Fn(&Call<'_>) -> Result<Response> + Send + Sync + 'static,
    {
        self.router.default_group().options(path, handler)
    }

    /// Register a HEAD route on the default group
    ///
    /// # Errors
    ///
    /// Returns `Error::RouteAlreadyRegistered` on a duplicate.
    pub fn head<F>(&mut self, path: &str, handler: F) -> Result<&mut Route>
    where
        F: Fn(&Call<'_>) -> Result<Response> + Send + Sync + 'static,
    {
        self.router.default_group().head(path, handler)
    }

    /// Register an upload route on the default group with configured defaults
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidConfig` for a bad size limit, or
    /// `Error::RouteAlreadyRegistered` on a duplicate.
    pub fn upload<F>(&mut self, path: &str, handler: F) -> Result<&mut Route>
    where
        F: Fn(&Call<'_>) -> Result<Response> + Send + Sync + 'static,
    {
        let config = self.config.upload()?;
        self.router.default_group().upload(path, handler, config)
    }

    /// Register a health route on the default group with configured credentials
    ///
    /// # Errors
    ///
    /// Returns `Error::RouteAlreadyRegistered` on a duplicate.
    pub fn health<F>(&mut self, path: &str, handler: F) -> Result<&mut Route>
    where
        F: Fn(&Call<'_>) -> Result<Response> + Send + Sync + 'static,
    {
        let config = self.config.health();
        self.router.default_group().health(path, handler, config)
    }

    /// Handle one request
    pub fn handle(&self, request: Request, session: &dyn Session) -> Response {
        let mut ctx = Context::new(request);
        let mut group: Option<&RouteGroup> = None;

        let result = self.dispatch(&mut ctx, session, &mut group);
        let group_scope = group.map(RouteGroup::scoped);
        let route_scope = ctx.route.map(Route::scoped);

        let result = result.and_then(|()| {
            self.middlewares
                .handle(Stage::BeforeOutput, &mut ctx, group_scope, route_scope)
        });

        let mut response = match result {
            Ok(()) => ctx.response.take().unwrap_or_default(),
            Err(err) => self.render_error(&err, &mut ctx, group_scope, route_scope),
        };
        response.set_header("x-request-id", ctx.request.request_id());
        response
    }

    fn dispatch<'s>(
        &'s self,
        ctx: &mut Context<'s>,
        session: &dyn Session,
        group: &mut Option<&'s RouteGroup>,
    ) -> Result<()> {
        self.middlewares.handle(Stage::BeforeRouting, ctx, None, None)?;

        let method = ctx.request.method;
        let matched = self
            .router
            .route(method, &ctx.request.path)
            .ok_or_else(|| Error::NotFound {
                method: method.to_string(),
                path: ctx.request.path.clone(),
            })?;
        *group = Some(matched.group);
        let route = matched.route;
        ctx.set_route(route, matched.values);

        self.logger.info(
            &format!("[{method}] {} ({})", ctx.request.path, ctx.request.client_key()),
            &json!({ "request_id": ctx.request.request_id(), "route": route.path() }),
        );

        self.middlewares.handle(
            Stage::AfterRouting,
            ctx,
            Some(matched.group.scoped()),
            Some(route.scoped()),
        )?;

        if route.requires_login() && !session.is_logged() {
            return Err(Error::Unauthorized);
        }
        if route.requires_admin() && !session.is_admin() {
            return Err(Error::Forbidden);
        }

        let extra = match route.kind() {
            RouteKind::Plain => Extra::None,
            RouteKind::Upload(config) => Extra::Files(config.store(ctx.request.files())?),
            RouteKind::Health(config) => {
                config.authorize(&ctx.request)?;
                Extra::None
            }
            RouteKind::GoogleOAuth(config) => {
                let redirect = config.redirect_path.as_deref().unwrap_or(route.path());
                let outcome = match &self.oauth {
                    Some(provider) => provider.authorize(config, redirect, &ctx.request)?,
                    None => OAuthOutcome::Denied,
                };
                if let OAuthOutcome::Redirect(url) = outcome {
                    ctx.response = Some(Response::redirect(&url));
                    return Ok(());
                }
                Extra::OAuth(outcome == OAuthOutcome::Authorized)
            }
        };

        let (query, body, params) = match self.inputs(route, ctx) {
            Ok(inputs) => inputs,
            Err(err) => {
                if let Extra::Files(stored) = &extra {
                    upload::discard(stored);
                }
                return Err(err);
            }
        };

        let call = Call {
            params: &params,
            query: &query,
            body: &body,
            session,
            request: &ctx.request,
            extra,
        };
        let response = route.call(&call)?;
        ctx.response = Some(response);
        Ok(())
    }

    /// Validated query and body, and the coerced path values
    fn inputs(
        &self,
        route: &Route,
        ctx: &Context<'_>,
    ) -> Result<(Params, Params, Vec<ParamValue>)> {
        let query = Params::query(ctx.request.query_map())
            .with_required(route.required_query().clone());
        query.validate()?;
        let body = Params::body(request_body(&ctx.request))
            .with_required(route.required_body().clone());
        body.validate()?;

        let params = coerce_segments(
            &ctx.path_values,
            route.dynamic_types(),
            self.router.strict_string_segments(),
        )?;
        Ok((query, body, params))
    }

    fn render_error(
        &self,
        err: &Error,
        ctx: &mut Context<'_>,
        group: Option<&Scoped>,
        route: Option<&Scoped>,
    ) -> Response {
        self.logger.error(
            err.code(),
            &json!({
                "detail": err.to_string(),
                "status": err.status_code(),
                "method": ctx.request.method.as_str(),
                "path": ctx.request.path,
                "request_id": ctx.request.request_id(),
            }),
        );

        ctx.response = Some(Response::new(err.code()).with_status(err.status_code()));
        match self.middlewares.handle(Stage::BeforeOutput, ctx, group, route) {
            Ok(()) => ctx.response.take().unwrap_or_else(fallback_response),
            Err(fault) => {
                self.logger.error(
                    "Error while rendering error response",
                    &json!({ "detail": fault.to_string(), "original": err.code() }),
                );
                fallback_response()
            }
        }
    }
}

/// Decoded body if a middleware produced one, else a lenient JSON parse
fn request_body(request: &Request) -> Option<Value> {
    if let Some(decoded) = request.decoded_body() {
        return Some(decoded.clone());
    }
    let raw = request.body_bytes().filter(|b| !b.is_empty())?;
    let mut bytes = raw.to_vec();
    parse_json_bytes(&mut bytes).ok()
}

fn fallback_response() -> Response {
    Response::new(FALLBACK_BODY)
        .with_status(500)
        .with_header("Content-Type", "application/json")
}

impl fmt::Debug for App {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("App")
            .field("config", &self.config)
            .field("router", &self.router)
            .field("middlewares", &self.middlewares)
            .field("registry", &self.registry)
            .field("oauth", &self.oauth.is_some())
            .finish_non_exhaustive()
    }
}
