//! # Middleware System
//!
//! Three-stage interceptor pipeline around routing and output.
//!
//! ```text
//! BEFORE_ROUTING -> route() -> AFTER_ROUTING -> handler -> BEFORE_OUTPUT
//! ```
//!
//! Each stage runs global middlewares first, then group ones, then route
//! ones. Exclusions are matched by middleware id: group exclusions
//! remove global middlewares, route exclusions remove global, group and
//! route middlewares. A middleware that sets `ctx.terminate_chain`
//! stops the rest of its stage only.

use crate::context::Context;
use crate::error::{Error, Result};
use crate::json::parse_json_bytes;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing::{debug, info};

/// Pipeline stage a middleware runs in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Before the router resolves the request
    BeforeRouting,
    /// After a route matched, before access checks and the handler
    AfterRouting,
    /// After the handler (or error path) produced a response
    BeforeOutput,
}

impl Stage {
    /// All stages in execution order
    pub const ALL: [Self; 3] = [Self::BeforeRouting, Self::AfterRouting, Self::BeforeOutput];

    /// Short name used in logs
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::BeforeRouting => "BEFORE_ROUTING",
            Self::AfterRouting => "AFTER_ROUTING",
            Self::BeforeOutput => "BEFORE_OUTPUT",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a middleware was registered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Applies to every request
    Global,
    /// Applies to every route of a group
    Group,
    /// Applies to a single route
    Route,
}

/// Request interceptor
///
/// Implementations are shared across requests and must not keep
/// per-request state outside the [`Context`].
pub trait Middleware: Send + Sync {
    /// Identifier used for exclusions and registry lookup
    fn id(&self) -> &str;

    /// Stage this middleware runs in
    fn stage(&self) -> Stage;

    /// Transform the request context.
    ///
    /// Set `ctx.terminate_chain = true` to skip the remaining middlewares
    /// of the current stage.
    ///
    /// # Errors
    ///
    /// Any error aborts the request and is rendered by the orchestrator.
    fn handle(&self, ctx: &mut Context<'_>) -> Result<()>;
}

/// Middlewares and exclusions attached to one scope
#[derive(Clone)]
pub struct Scoped {
    scope: Scope,
    by_stage: HashMap<Stage, Vec<Arc<dyn Middleware>>>,
    exclusions: Vec<String>,
}

impl Scoped {
    /// Create an empty scope
    #[must_use]
    pub fn new(scope: Scope) -> Self {
        Self {
            scope,
            by_stage: HashMap::new(),
            exclusions: Vec::new(),
        }
    }

    /// Append a middleware under its own stage
    pub fn add(&mut self, middleware: Arc<dyn Middleware>) {
        self.by_stage.entry(middleware.stage()).or_default().push(middleware);
    }

    /// Prepend a middleware under its own stage
    pub fn add_before(&mut self, middleware: Arc<dyn Middleware>) {
        self.by_stage.entry(middleware.stage()).or_default().insert(0, middleware);
    }

    /// Record a middleware id to exclude
    pub fn exclude(&mut self, id: &str) {
        if !self.excludes(id) {
            self.exclusions.push(id.to_string());
        }
    }

    /// Middlewares registered for a stage, in order
    #[must_use]
    pub fn at(&self, stage: Stage) -> &[Arc<dyn Middleware>] {
        self.by_stage.get(&stage).map_or(&[][..], Vec::as_slice)
    }

    /// Excluded middleware ids
    #[must_use]
    pub fn exclusions(&self) -> &[String] {
        &self.exclusions
    }

    /// Whether an id is excluded by this scope
    #[must_use]
    pub fn excludes(&self, id: &str) -> bool {
        self.exclusions.iter().any(|e| e == id)
    }

    /// Scope of this set
    #[must_use]
    pub const fn scope(&self) -> Scope {
        self.scope
    }

    /// Total number of middlewares across stages
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_stage.values().map(Vec::len).sum()
    }

    /// Check if no middleware is registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for Scoped {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ids: HashMap<Stage, Vec<&str>> = self
            .by_stage
            .iter()
            .map(|(stage, list)| (*stage, list.iter().map(|m| m.id()).collect()))
            .collect();
        f.debug_struct("Scoped")
            .field("scope", &self.scope)
            .field("middlewares", &ids)
            .field("exclusions", &self.exclusions)
            .finish()
    }
}

/// Global middleware registry and stage executor
#[derive(Debug, Clone)]
pub struct MiddlewareHandler {
    global: Scoped,
}

impl Default for MiddlewareHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl MiddlewareHandler {
    /// Create an empty handler
    #[must_use]
    pub fn new() -> Self {
        Self {
            global: Scoped::new(Scope::Global),
        }
    }

    /// Add a global middleware
    pub fn add<M: Middleware + 'static>(&mut self, middleware: M) {
        self.global.add(Arc::new(middleware));
    }

    /// Add an already shared global middleware
    pub fn add_shared(&mut self, middleware: Arc<dyn Middleware>) {
        self.global.add(middleware);
    }

    /// Add several shared global middlewares, preserving order
    pub fn add_all<I>(&mut self, middlewares: I)
    where
        I: IntoIterator<Item = Arc<dyn Middleware>>,
    {
        for middleware in middlewares {
            self.global.add(middleware);
        }
    }

    /// Add a global middleware ahead of those already registered for its stage
    pub fn add_before<M: Middleware + 'static>(&mut self, middleware: M) {
        self.global.add_before(Arc::new(middleware));
    }

    /// Global middlewares
    #[must_use]
    pub const fn global(&self) -> &Scoped {
        &self.global
    }

    /// Run one stage.
    ///
    /// # Errors
    ///
    /// Propagates the first middleware error; later middlewares of the
    /// stage do not run.
    pub fn handle(
        &self,
        stage: Stage,
        ctx: &mut Context<'_>,
        group: Option<&Scoped>,
        route: Option<&Scoped>,
    ) -> Result<()> {
        let route_excludes = |id: &str| route.is_some_and(|r| r.excludes(id));
        let group_excludes = |id: &str| group.is_some_and(|g| g.excludes(id));

        let global = self
            .global
            .at(stage)
            .iter()
            .filter(|m| !group_excludes(m.id()) && !route_excludes(m.id()));
        let grouped = group
            .map_or(&[][..], |g| g.at(stage))
            .iter()
            .filter(|m| !route_excludes(m.id()));
        let routed = route
            .map_or(&[][..], |r| r.at(stage))
            .iter()
            .filter(|m| !route_excludes(m.id()));

        ctx.terminate_chain = false;
        for middleware in global.chain(grouped).chain(routed) {
            debug!(stage = %stage, middleware = middleware.id(), "Running middleware");
            middleware.handle(ctx)?;
            if ctx.terminate_chain {
                debug!(stage = %stage, middleware = middleware.id(), "Middleware chain terminated");
                break;
            }
        }
        Ok(())
    }
}

/// Factory producing a fresh middleware instance
pub type MiddlewareFactory = Arc<dyn Fn() -> Arc<dyn Middleware> + Send + Sync>;

/// Explicit id -> factory registry for looking up middlewares by name
#[derive(Clone, Default)]
pub struct MiddlewareRegistry {
    factories: HashMap<String, MiddlewareFactory>,
}

impl MiddlewareRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-populated with the built-in middlewares
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(JsonEncode::ID, || Arc::new(JsonEncode));
        registry.register(HtmlEncode::ID, || Arc::new(HtmlEncode));
        registry.register(JsonDecode::ID, || Arc::new(JsonDecode));
        registry.register(CorsMiddleware::ID, || Arc::new(CorsMiddleware::new()));
        registry.register(RequestLogging::ID, || Arc::new(RequestLogging::new()));
        registry.register(RateLimitMiddleware::ID, || Arc::new(RateLimitMiddleware::new(100, 2)));
        registry
    }

    /// Register a factory under an id, replacing any previous one
    pub fn register<F>(&mut self, id: impl Into<String>, factory: F)
    where
        F: Fn() -> Arc<dyn Middleware> + Send + Sync + 'static,
    {
        self.factories.insert(id.into(), Arc::new(factory));
    }

    /// Instantiate a middleware by id
    ///
    /// # Errors
    ///
    /// Returns `Error::UnknownMiddleware` if nothing is registered under `id`.
    pub fn create(&self, id: &str) -> Result<Arc<dyn Middleware>> {
        self.factories
            .get(id)
            .map(|factory| factory())
            .ok_or_else(|| Error::UnknownMiddleware(id.to_string()))
    }

    /// Check if an id is registered
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.factories.contains_key(id)
    }
}

impl fmt::Debug for MiddlewareRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MiddlewareRegistry")
            .field("ids", &self.factories.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Wraps response data as `{"data": ...}` JSON
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonEncode;

impl JsonEncode {
    /// Middleware id
    pub const ID: &'static str = "json_encode";
}

impl Middleware for JsonEncode {
    fn id(&self) -> &str {
        Self::ID
    }

    fn stage(&self) -> Stage {
        Stage::BeforeOutput
    }

    fn handle(&self, ctx: &mut Context<'_>) -> Result<()> {
        if let Some(response) = ctx.response.as_mut() {
            let wrapped = serde_json::json!({ "data": response.data.take() });
            response.data = serde_json::Value::String(serde_json::to_string(&wrapped)?);
            response.set_header("Content-Type", "application/json");
        }
        Ok(())
    }
}

/// Marks response data as HTML
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlEncode;

impl HtmlEncode {
    /// Middleware id
    pub const ID: &'static str = "html_encode";
}

impl Middleware for HtmlEncode {
    fn id(&self) -> &str {
        Self::ID
    }

    fn stage(&self) -> Stage {
        Stage::BeforeOutput
    }

    fn handle(&self, ctx: &mut Context<'_>) -> Result<()> {
        if let Some(response) = ctx.response.as_mut() {
            response.set_header("Content-Type", "text/html");
        }
        Ok(())
    }
}

/// Decodes a JSON request body into the request's decoded body
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonDecode;

impl JsonDecode {
    /// Middleware id
    pub const ID: &'static str = "json_decode";
}

impl Middleware for JsonDecode {
    fn id(&self) -> &str {
        Self::ID
    }

    fn stage(&self) -> Stage {
        Stage::AfterRouting
    }

    fn handle(&self, ctx: &mut Context<'_>) -> Result<()> {
        let Some(raw) = ctx.request.body_bytes().filter(|b| !b.is_empty()) else {
            return Ok(());
        };
        let mut bytes = raw.to_vec();
        let decoded = parse_json_bytes(&mut bytes)?;
        ctx.request.set_decoded_body(decoded);
        Ok(())
    }
}

/// Adds cross-origin headers to every response that reaches output
#[derive(Debug, Clone)]
pub struct CorsMiddleware {
    origins: Vec<String>,
    methods: String,
    headers: String,
    max_age: u32,
}

impl Default for CorsMiddleware {
    fn default() -> Self {
        Self {
            origins: vec!["*".to_string()],
            methods: "GET, POST, PUT, DELETE, PATCH, HEAD, OPTIONS".to_string(),
            headers: "Content-Type, Authorization, X-Requested-With".to_string(),
            max_age: 86400,
        }
    }
}

impl CorsMiddleware {
    /// Middleware id
    pub const ID: &'static str = "cors";

    /// Permissive defaults: any origin, the usual verbs
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict the allowed origins
    #[must_use]
    pub fn allow_origins<I, S>(mut self, origins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.origins = origins.into_iter().map(Into::into).collect();
        self
    }

    /// Comma-separated verbs for `Access-Control-Allow-Methods`
    #[must_use]
    pub fn allow_methods(mut self, methods: impl Into<String>) -> Self {
        self.methods = methods.into();
        self
    }

    /// Comma-separated names for `Access-Control-Allow-Headers`
    #[must_use]
    pub fn allow_headers(mut self, headers: impl Into<String>) -> Self {
        self.headers = headers.into();
        self
    }

    /// Preflight cache lifetime in seconds
    #[must_use]
    pub const fn max_age(mut self, seconds: u32) -> Self {
        self.max_age = seconds;
        self
    }

    /// `Access-Control-Allow-Origin` value
    #[must_use]
    pub fn origin(&self) -> String {
        self.origins.join(", ")
    }
}

impl Middleware for CorsMiddleware {
    fn id(&self) -> &str {
        Self::ID
    }

    fn stage(&self) -> Stage {
        Stage::BeforeOutput
    }

    fn handle(&self, ctx: &mut Context<'_>) -> Result<()> {
        let Some(response) = ctx.response.as_mut() else {
            return Ok(());
        };
        let origin = self.origin();
        let max_age = self.max_age.to_string();
        for (name, value) in [
            ("Access-Control-Allow-Origin", origin.as_str()),
            ("Access-Control-Allow-Methods", self.methods.as_str()),
            ("Access-Control-Allow-Headers", self.headers.as_str()),
            ("Access-Control-Allow-Credentials", "true"),
            ("Access-Control-Max-Age", max_age.as_str()),
        ] {
            response.set_header(name, value);
        }
        Ok(())
    }
}

/// Logs every incoming request before routing
#[derive(Debug, Clone, Default)]
pub struct RequestLogging {
    log_headers: bool,
}

impl RequestLogging {
    /// Middleware id
    pub const ID: &'static str = "request_logging";

    /// Create a new request logging middleware
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable header logging
    #[must_use]
    pub const fn with_headers(mut self) -> Self {
        self.log_headers = true;
        self
    }
}

impl Middleware for RequestLogging {
    fn id(&self) -> &str {
        Self::ID
    }

    fn stage(&self) -> Stage {
        Stage::BeforeRouting
    }

    fn handle(&self, ctx: &mut Context<'_>) -> Result<()> {
        let req = &ctx.request;
        if self.log_headers {
            info!(
                method = %req.method,
                path = %req.path,
                request_id = %req.request_id(),
                headers = ?req.headers_map(),
                "Request received"
            );
        } else {
            info!(
                method = %req.method,
                path = %req.path,
                request_id = %req.request_id(),
                "Request received"
            );
        }
        Ok(())
    }
}

/// Token bucket keyed by client and matched route.
///
/// Each key starts full; a request spends one token and tokens come back
/// at `refill_per_sec` up to `capacity`. Once more than `max_keys`
/// buckets exist, buckets that have refilled completely are dropped, and
/// if that is not enough the least recently used one goes.
pub struct RateLimitMiddleware {
    capacity: f64,
    refill_per_sec: f64,
    max_keys: usize,
    buckets: Mutex<HashMap<String, (f64, Instant)>>,
}

impl RateLimitMiddleware {
    /// Middleware id
    pub const ID: &'static str = "rate_limit";

    /// Default bound on tracked keys
    pub const DEFAULT_MAX_KEYS: usize = 10_000;

    /// Limiter allowing bursts of `capacity` requests per key
    #[must_use]
    pub fn new(capacity: u32, refill_per_sec: u32) -> Self {
        Self {
            capacity: f64::from(capacity),
            refill_per_sec: f64::from(refill_per_sec),
            max_keys: Self::DEFAULT_MAX_KEYS,
            buckets: Mutex::new(HashMap::new()),
        }
    }

    /// Bound the number of tracked keys
    #[must_use]
    pub fn max_keys(mut self, max_keys: usize) -> Self {
        self.max_keys = max_keys.max(1);
        self
    }

    /// Number of keys currently tracked
    pub fn tracked_keys(&self) -> usize {
        self.buckets
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len()
    }

    fn take(&self, key: &str) -> bool {
        let mut buckets = self.buckets.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let now = Instant::now();
        if !buckets.contains_key(key) && buckets.len() >= self.max_keys {
            self.evict(&mut buckets, now);
        }

        let (tokens, seen) = buckets
            .entry(key.to_string())
            .or_insert((self.capacity, now));
        *tokens = self.refilled(*tokens, *seen, now);
        *seen = now;

        if *tokens < 1.0 {
            return false;
        }
        *tokens -= 1.0;
        true
    }

    fn refilled(&self, tokens: f64, seen: Instant, now: Instant) -> f64 {
        let earned = now.duration_since(seen).as_secs_f64() * self.refill_per_sec;
        (tokens + earned).min(self.capacity)
    }

    fn evict(&self, buckets: &mut HashMap<String, (f64, Instant)>, now: Instant) {
        buckets.retain(|_, (tokens, seen)| self.refilled(*tokens, *seen, now) < self.capacity);
        while buckets.len() >= self.max_keys {
            let Some(oldest) = buckets
                .iter()
                .min_by_key(|(_, (_, seen))| *seen)
                .map(|(key, _)| key.clone())
            else {
                break;
            };
            buckets.remove(&oldest);
        }
        debug!(remaining = buckets.len(), "Evicted rate limit buckets");
    }
}

impl fmt::Debug for RateLimitMiddleware {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RateLimitMiddleware")
            .field("capacity", &self.capacity)
            .field("refill_per_sec", &self.refill_per_sec)
            .finish_non_exhaustive()
    }
}

impl Middleware for RateLimitMiddleware {
    fn id(&self) -> &str {
        Self::ID
    }

    fn stage(&self) -> Stage {
        Stage::AfterRouting
    }

    fn handle(&self, ctx: &mut Context<'_>) -> Result<()> {
        let route = ctx.route.map_or("-", |r| r.path());
        let key = format!("{}|{}", ctx.request.client_key(), route);
        if self.take(&key) {
            Ok(())
        } else {
            debug!(key = %key, "Rate limit exceeded");
            Err(Error::RateLimitExceeded)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::Request;
    use crate::response::Response;
    use crate::router::Method;
    use serde_json::{json, Value};
    use std::collections::HashMap as Map;

    /// Appends its tag to a trace header so tests can observe execution order
    struct Trace {
        id: &'static str,
        stage: Stage,
        terminate: bool,
    }

    impl Trace {
        fn new(id: &'static str, stage: Stage) -> Self {
            Self { id, stage, terminate: false }
        }

        fn terminating(id: &'static str, stage: Stage) -> Self {
            Self { id, stage, terminate: true }
        }
    }

    impl Middleware for Trace {
        fn id(&self) -> &str {
            self.id
        }

        fn stage(&self) -> Stage {
            self.stage
        }

        fn handle(&self, ctx: &mut Context<'_>) -> Result<()> {
            let trace = ctx.request.header("x-trace").unwrap_or("").to_string();
            ctx.request.set_header("x-trace", &format!("{trace}{};", self.id));
            if self.terminate {
                ctx.terminate_chain = true;
            }
            Ok(())
        }
    }

    fn ctx() -> Context<'static> {
        Context::new(Request::new(Method::Get, "/".to_string(), Map::new(), None))
    }

    fn trace(ctx: &Context<'_>) -> String {
        ctx.request.header("x-trace").unwrap_or("").to_string()
    }

    #[test]
    fn test_scoped_files_by_stage() {
        let mut scoped = Scoped::new(Scope::Group);
        scoped.add(Arc::new(JsonEncode));
        scoped.add(Arc::new(JsonDecode));
        scoped.add(Arc::new(HtmlEncode));

        assert_eq!(scoped.len(), 3);
        assert_eq!(scoped.at(Stage::BeforeOutput).len(), 2);
        assert_eq!(scoped.at(Stage::AfterRouting).len(), 1);
        assert!(scoped.at(Stage::BeforeRouting).is_empty());
    }

    #[test]
    fn test_order_global_group_route() {
        let mut handler = MiddlewareHandler::new();
        handler.add(Trace::new("global", Stage::AfterRouting));
        let mut group = Scoped::new(Scope::Group);
        group.add(Arc::new(Trace::new("group", Stage::AfterRouting)));
        let mut route = Scoped::new(Scope::Route);
        route.add(Arc::new(Trace::new("route", Stage::AfterRouting)));

        let mut ctx = ctx();
        handler
            .handle(Stage::AfterRouting, &mut ctx, Some(&group), Some(&route))
            .unwrap();
        assert_eq!(trace(&ctx), "global;group;route;");
    }

    #[test]
    fn test_add_before_prepends() {
        let mut handler = MiddlewareHandler::new();
        handler.add(Trace::new("second", Stage::BeforeRouting));
        handler.add_before(Trace::new("first", Stage::BeforeRouting));

        let mut ctx = ctx();
        handler.handle(Stage::BeforeRouting, &mut ctx, None, None).unwrap();
        assert_eq!(trace(&ctx), "first;second;");
    }

    #[test]
    fn test_only_requested_stage_runs() {
        let mut handler = MiddlewareHandler::new();
        handler.add(Trace::new("input", Stage::BeforeRouting));
        handler.add(Trace::new("output", Stage::BeforeOutput));

        let mut ctx = ctx();
        handler.handle(Stage::BeforeOutput, &mut ctx, None, None).unwrap();
        assert_eq!(trace(&ctx), "output;");
    }

    #[test]
    fn test_route_exclusion_swaps_encoder() {
        let mut handler = MiddlewareHandler::new();
        handler.add(JsonEncode);
        let mut route = Scoped::new(Scope::Route);
        route.add(Arc::new(HtmlEncode));
        route.exclude(JsonEncode::ID);

        let mut ctx = ctx();
        ctx.response = Some(Response::new(json!("<p>hi</p>")));
        handler
            .handle(Stage::BeforeOutput, &mut ctx, None, Some(&route))
            .unwrap();

        let response = ctx.response.unwrap();
        assert_eq!(response.data, Value::String("<p>hi</p>".to_string()));
        assert_eq!(response.header("Content-Type"), Some("text/html"));
    }

    #[test]
    fn test_group_exclusion_keeps_group_own_middlewares() {
        let mut handler = MiddlewareHandler::new();
        handler.add(Trace::new("x", Stage::BeforeOutput));
        let mut group = Scoped::new(Scope::Group);
        group.add(Arc::new(Trace::new("x", Stage::BeforeOutput)));
        group.exclude("x");

        let mut ctx = ctx();
        handler
            .handle(Stage::BeforeOutput, &mut ctx, Some(&group), None)
            .unwrap();
        assert_eq!(trace(&ctx), "x;");
    }

    #[test]
    fn test_route_exclusion_removes_every_scope() {
        let mut handler = MiddlewareHandler::new();
        handler.add(Trace::new("x", Stage::BeforeOutput));
        handler.add(Trace::new("y", Stage::BeforeOutput));
        let mut group = Scoped::new(Scope::Group);
        group.add(Arc::new(Trace::new("x", Stage::BeforeOutput)));
        let mut route = Scoped::new(Scope::Route);
        route.add(Arc::new(Trace::new("x", Stage::BeforeOutput)));
        route.exclude("x");

        let mut ctx = ctx();
        handler
            .handle(Stage::BeforeOutput, &mut ctx, Some(&group), Some(&route))
            .unwrap();
        assert_eq!(trace(&ctx), "y;");
    }

    #[test]
    fn test_termination_is_confined_to_stage() {
        let mut handler = MiddlewareHandler::new();
        handler.add(Trace::terminating("stop", Stage::AfterRouting));
        handler.add(Trace::new("skipped", Stage::AfterRouting));
        handler.add(Trace::new("output", Stage::BeforeOutput));

        let mut ctx = ctx();
        handler.handle(Stage::AfterRouting, &mut ctx, None, None).unwrap();
        assert!(ctx.terminate_chain);
        handler.handle(Stage::BeforeOutput, &mut ctx, None, None).unwrap();
        assert_eq!(trace(&ctx), "stop;output;");
    }

    #[test]
    fn test_registry_defaults() {
        let registry = MiddlewareRegistry::with_defaults();
        let ids = [
            "json_encode",
            "html_encode",
            "json_decode",
            "cors",
            "request_logging",
            "rate_limit",
        ];
        for id in ids {
            let middleware = registry.create(id).unwrap();
            assert_eq!(middleware.id(), id);
        }
        assert!(matches!(registry.create("nope"), Err(Error::UnknownMiddleware(_))));
    }

    #[test]
    fn test_json_encode_wraps_data() {
        let mut ctx = ctx();
        ctx.response = Some(Response::new(json!({"name": "Clarke"})));
        JsonEncode.handle(&mut ctx).unwrap();
        let response = ctx.response.unwrap();
        assert_eq!(response.body_text(), r#"{"data":{"name":"Clarke"}}"#);
        assert_eq!(response.header("Content-Type"), Some("application/json"));
    }

    #[test]
    fn test_json_decode_reads_body() {
        let mut ctx = Context::new(Request::new(
            Method::Post,
            "/login".to_string(),
            Map::new(),
            Some(r#"{"username": "admin"}"#.into()),
        ));
        JsonDecode.handle(&mut ctx).unwrap();
        assert_eq!(ctx.request.decoded_body(), Some(&json!({"username": "admin"})));
    }

    #[test]
    fn test_json_decode_rejects_invalid_body() {
        let mut ctx = Context::new(Request::new(
            Method::Post,
            "/login".to_string(),
            Map::new(),
            Some("not json".into()),
        ));
        let err = JsonDecode.handle(&mut ctx).unwrap_err();
        assert_eq!(err.status_code(), 400);
    }

    #[test]
    fn test_cors_middleware_headers() {
        let mw = CorsMiddleware::new()
            .allow_origins(["https://a.example", "https://b.example"])
            .max_age(600);
        assert_eq!(mw.origin(), "https://a.example, https://b.example");

        let mut ctx = ctx();
        ctx.response = Some(Response::default());
        mw.handle(&mut ctx).unwrap();
        let response = ctx.response.unwrap();
        assert_eq!(response.header("Access-Control-Max-Age"), Some("600"));
        assert_eq!(response.header("Access-Control-Allow-Credentials"), Some("true"));
    }

    #[test]
    fn test_rate_limit_exhausts_bucket() {
        let mw = RateLimitMiddleware::new(2, 0);
        let mut ctx = ctx();
        assert!(mw.handle(&mut ctx).is_ok());
        assert!(mw.handle(&mut ctx).is_ok());
        assert!(matches!(mw.handle(&mut ctx), Err(Error::RateLimitExceeded)));
    }

    fn client(ip: &str) -> Context<'static> {
        let mut headers = Map::new();
        headers.insert("x-client-ip".to_string(), ip.to_string());
        Context::new(Request::new(Method::Get, "/".to_string(), headers, None))
    }

    #[test]
    fn test_rate_limit_drops_idle_keys() {
        let mw = RateLimitMiddleware::new(1, 1000).max_keys(2);
        mw.handle(&mut client("10.0.0.1")).unwrap();
        mw.handle(&mut client("10.0.0.2")).unwrap();
        assert_eq!(mw.tracked_keys(), 2);

        std::thread::sleep(std::time::Duration::from_millis(20));
        mw.handle(&mut client("10.0.0.3")).unwrap();
        assert_eq!(mw.tracked_keys(), 1);
    }

    #[test]
    fn test_rate_limit_key_count_is_bounded() {
        let mw = RateLimitMiddleware::new(5, 0).max_keys(3);
        for i in 0..50 {
            mw.handle(&mut client(&format!("192.168.0.{i}"))).unwrap();
        }
        assert_eq!(mw.tracked_keys(), 3);
    }
}
