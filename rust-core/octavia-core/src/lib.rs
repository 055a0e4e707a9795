//! # Octavia Core
//!
//! Request routing and a staged middleware pipeline for thin HTTP APIs.
//!
//! ## Architecture
//!
//! Routes are registered once into prefix groups and never mutated
//! afterwards. Each request gets its own [`Context`] which carries the
//! captured path values and the response through three middleware
//! stages around the handler.
//!
//! ## Modules
//!
//! - `app` - Registration surface and request orchestration
//! - `router` - Longest-prefix group resolution, first-match route search
//! - `group` - Route groups and registration
//! - `route` - Route definition, handler arguments and route kinds
//! - `path` - Segment splitting and matching
//! - `types` - Typed path segments and coercion
//! - `params` - Query/body containers and required-parameter validation
//! - `middleware` - Stages, scoped middlewares, registry and built-ins
//! - `context` - Per-request pipeline state
//! - `request` / `response` - Transport-independent messages
//! - `host` - Hyper conversions
//! - `session` - Session capability (static and JWT-backed)
//! - `upload` / `health` / `oauth` - Route-kind collaborators
//! - `config` - Framework configuration
//! - `logging` - Subscriber setup and logger capability
//! - `json` - simd-json parsing
//! - `error` - Error types and handling

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod app;
pub mod config;
pub mod context;
pub mod error;
pub mod group;
pub mod health;
pub mod host;
pub mod json;
pub mod logging;
pub mod middleware;
pub mod oauth;
pub mod params;
pub mod path;
pub mod request;
pub mod response;
pub mod route;
pub mod router;
pub mod session;
pub mod types;
pub mod upload;

pub use app::App;
pub use config::Config;
pub use context::Context;
pub use error::{Error, Result};
pub use group::RouteGroup;
pub use health::{HealthConfig, HealthStatus};
pub use json::{parse_json, to_json};
pub use logging::{init_tracing, LogConfig, Logger, TracingLogger};
pub use middleware::{
    CorsMiddleware, HtmlEncode, JsonDecode, JsonEncode, Middleware, MiddlewareHandler,
    MiddlewareRegistry, RateLimitMiddleware, RequestLogging, Scope, Scoped, Stage,
};
pub use oauth::{OAuthConfig, OAuthOutcome, OAuthProvider};
pub use params::{FieldSpec, FieldType, ParamSource, Params, Required, Schema};
pub use request::Request;
pub use response::Response;
pub use route::{Call, Extra, Handler, Route, RouteKind};
pub use router::{Match, Method, Router};
pub use session::{JwtSession, Session, StaticSession};
pub use types::{ParamValue, SegmentType};
pub use upload::{UploadConfig, UploadedFile};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
