//! # Sessions
//!
//! The orchestrator only asks a session two questions: is the caller
//! logged in, and are they an admin. Handlers may read further values.

use crate::config::Config;
use crate::request::Request;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde_json::Value;
use std::collections::HashMap;
use tracing::warn;

/// Session capability consumed by access checks and handlers
pub trait Session: Send + Sync {
    /// Whether the caller is logged in
    fn is_logged(&self) -> bool;

    /// Whether the caller has admin rights
    fn is_admin(&self) -> bool;

    /// Read a session value
    fn get(&self, _key: &str) -> Option<Value> {
        None
    }
}

/// Session with fixed flags and values
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StaticSession {
    logged: bool,
    admin: bool,
    values: HashMap<String, Value>,
}

impl StaticSession {
    /// Anonymous session
    #[must_use]
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Logged-in, non-admin session
    #[must_use]
    pub fn logged() -> Self {
        Self {
            logged: true,
            ..Self::default()
        }
    }

    /// Logged-in admin session
    #[must_use]
    pub fn admin() -> Self {
        Self {
            logged: true,
            admin: true,
            ..Self::default()
        }
    }

    /// Attach a value
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: Value) -> Self {
        self.values.insert(key.into(), value);
        self
    }
}

impl Session for StaticSession {
    fn is_logged(&self) -> bool {
        self.logged
    }

    fn is_admin(&self) -> bool {
        self.admin
    }

    fn get(&self, key: &str) -> Option<Value> {
        self.values.get(key).cloned()
    }
}

/// Session backed by an HS256 bearer token
#[derive(Debug, Clone, Default)]
pub struct JwtSession {
    claims: Option<Value>,
    logged_key: Option<String>,
    admin_key: String,
}

impl JwtSession {
    /// Validate `token` with `secret`.
    ///
    /// An absent or invalid token gives an anonymous session. The
    /// `admin_key` claim grants admin rights when it is `true` or `1`.
    #[must_use]
    pub fn new(token: Option<&str>, secret: &str, admin_key: &str) -> Self {
        let claims = token.and_then(|token| {
            let key = DecodingKey::from_secret(secret.as_bytes());
            let validation = Validation::new(Algorithm::HS256);
            match decode::<Value>(token, &key, &validation) {
                Ok(data) => Some(data.claims),
                Err(e) => {
                    warn!("JWT validation failed: {}", e);
                    None
                }
            }
        });
        Self {
            claims,
            logged_key: None,
            admin_key: admin_key.to_string(),
        }
    }

    /// Session for `request` using the configured secret and claim names.
    ///
    /// Without `session_secret` every request is anonymous. A validated
    /// token only counts as logged in if its `session_is_logged_key`
    /// claim, when present, is `true` or `1`.
    #[must_use]
    pub fn from_config(request: &Request, config: &Config) -> Self {
        let Some(secret) = config.session_secret.as_deref() else {
            return Self {
                admin_key: config.session_is_admin_key.clone(),
                ..Self::default()
            };
        };
        let mut session = Self::from_request(request, secret, &config.session_is_admin_key);
        session.logged_key = Some(config.session_is_logged_key.clone());
        session
    }

    /// Read the token from the request's `Authorization: Bearer` header
    #[must_use]
    pub fn from_request(request: &Request, secret: &str, admin_key: &str) -> Self {
        let token = request
            .header("authorization")
            .and_then(|h| h.strip_prefix("Bearer "));
        Self::new(token, secret, admin_key)
    }

    /// Validated claims
    #[must_use]
    pub const fn claims(&self) -> Option<&Value> {
        self.claims.as_ref()
    }
}

fn is_set(flag: &Value) -> bool {
    flag.as_bool() == Some(true) || flag.as_i64() == Some(1)
}

impl Session for JwtSession {
    fn is_logged(&self) -> bool {
        let Some(claims) = &self.claims else {
            return false;
        };
        self.logged_key
            .as_deref()
            .and_then(|key| claims.get(key))
            .map_or(true, is_set)
    }

    fn is_admin(&self) -> bool {
        self.claims
            .as_ref()
            .and_then(|c| c.get(&self.admin_key))
            .is_some_and(is_set)
    }

    fn get(&self, key: &str) -> Option<Value> {
        self.claims.as_ref().and_then(|c| c.get(key)).cloned()
    }
}
