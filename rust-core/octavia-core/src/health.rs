//! # Health Checks
//!
//! Settings for health routes and the status values handlers report.

use crate::error::{Error, Result};
use crate::request::Request;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};

/// Status of a checked dependency
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HealthStatus {
    /// Working normally
    Healthy,
    /// Down or failing
    Critical,
    /// Working with reduced capacity
    Degraded,
    /// Not checked or undeterminable
    Unknown,
    /// Intentionally unavailable
    Maintenance,
    /// Not reachable
    Offline,
}

/// Health route settings
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HealthConfig {
    /// Whether basic auth is enforced
    pub auth_required: bool,
    /// Expected user name
    pub username: String,
    /// Expected password
    pub password: String,
}

impl HealthConfig {
    /// Health route without authentication
    #[must_use]
    pub fn open() -> Self {
        Self::default()
    }

    /// Health route behind basic auth
    #[must_use]
    pub fn basic_auth(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            auth_required: true,
            username: username.into(),
            password: password.into(),
        }
    }

    /// Enforce the configured credentials on a request
    ///
    /// # Errors
    ///
    /// Returns `Error::Unauthorized` when auth is required and the
    /// `Authorization: Basic` header is missing or does not match.
    pub fn authorize(&self, request: &Request) -> Result<()> {
        if !self.auth_required {
            return Ok(());
        }
        let valid = request
            .header("authorization")
            .and_then(|h| h.strip_prefix("Basic "))
            .and_then(|encoded| STANDARD.decode(encoded.trim()).ok())
            .and_then(|raw| String::from_utf8(raw).ok())
            .and_then(|pair| {
                pair.split_once(':')
                    .map(|(user, pass)| user == self.username && pass == self.password)
            })
            .unwrap_or(false);

        if valid {
            Ok(())
        } else {
            Err(Error::Unauthorized)
        }
    }
}
