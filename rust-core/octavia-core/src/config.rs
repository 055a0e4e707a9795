//! # Configuration
//!
//! Framework defaults, overridable from `OCTAVIA_<KEY>` environment
//! variables or deserialized from any serde source.

use crate::error::{Error, Result};
use crate::health::HealthConfig;
use crate::logging::LogConfig;
use crate::upload::{parse_size, UploadConfig};
use serde::Deserialize;
use std::path::PathBuf;

/// Environment variable prefix
pub const ENV_PREFIX: &str = "OCTAVIA_";

/// Framework configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Default upload directory
    pub upload_dir: String,
    /// Default per-file size limit, e.g. `"10MB"`
    pub upload_max_size: String,
    /// Whether upload routes accept several files by default
    pub upload_allow_multiple_files: bool,
    /// Session value marking a logged-in user
    pub session_is_logged_key: String,
    /// Session value marking an admin
    pub session_is_admin_key: String,
    /// Secret for token-backed sessions
    pub session_secret: Option<String>,
    /// Default log filter
    pub log_level: String,
    /// JSON log output
    pub log_json: bool,
    /// Whether health routes require basic auth by default
    pub health_auth_required: bool,
    /// Health basic-auth user name
    pub health_username: String,
    /// Health basic-auth password
    pub health_password: String,
    /// Reject purely numeric text in `string` path segments
    pub strict_string_segments: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            upload_dir: "uploads".to_string(),
            upload_max_size: "10MB".to_string(),
            upload_allow_multiple_files: true,
            session_is_logged_key: "is_logged".to_string(),
            session_is_admin_key: "is_admin".to_string(),
            session_secret: None,
            log_level: "debug".to_string(),
            log_json: false,
            health_auth_required: true,
            health_username: String::new(),
            health_password: String::new(),
            strict_string_segments: true,
        }
    }
}

impl Config {
    /// Defaults overridden by `OCTAVIA_<KEY>` environment variables
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidConfig` for malformed values.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden through `lookup`, called with `OCTAVIA_<KEY>` names
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidConfig` for malformed values.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(&format!("{ENV_PREFIX}{}", key.to_ascii_uppercase()));
        let mut config = Self::default();

        if let Some(v) = get("upload_dir") {
            config.upload_dir = v;
        }
        if let Some(v) = get("upload_max_size") {
            parse_size(&v)?;
            config.upload_max_size = v;
        }
        if let Some(v) = get("upload_allow_multiple_files") {
            config.upload_allow_multiple_files = parse_bool("upload_allow_multiple_files", &v)?;
        }
        if let Some(v) = get("session_is_logged_key") {
            config.session_is_logged_key = v;
        }
        if let Some(v) = get("session_is_admin_key") {
            config.session_is_admin_key = v;
        }
        if let Some(v) = get("session_secret") {
            config.session_secret = Some(v);
        }
        if let Some(v) = get("log_level") {
            config.log_level = v;
        }
        if let Some(v) = get("log_json") {
            config.log_json = parse_bool("log_json", &v)?;
        }
        if let Some(v) = get("health_auth_required") {
            config.health_auth_required = parse_bool("health_auth_required", &v)?;
        }
        if let Some(v) = get("health_username") {
            config.health_username = v;
        }
        if let Some(v) = get("health_password") {
            config.health_password = v;
        }
        if let Some(v) = get("strict_string_segments") {
            config.strict_string_segments = parse_bool("strict_string_segments", &v)?;
        }
        Ok(config)
    }

    /// Default upload route settings
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidConfig` if `upload_max_size` cannot be parsed.
    pub fn upload(&self) -> Result<UploadConfig> {
        Ok(UploadConfig::new(PathBuf::from(&self.upload_dir))
            .allow_multiple_files(self.upload_allow_multiple_files)
            .max_size_bytes(parse_size(&self.upload_max_size)?))
    }

    /// Default health route settings
    #[must_use]
    pub fn health(&self) -> HealthConfig {
        HealthConfig {
            auth_required: self.health_auth_required,
            username: self.health_username.clone(),
            password: self.health_password.clone(),
        }
    }

    /// Subscriber settings
    #[must_use]
    pub fn log(&self) -> LogConfig {
        LogConfig {
            level: self.log_level.clone(),
            json: self.log_json,
        }
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(Error::InvalidConfig {
            key: key.to_string(),
            reason: format!("expected a boolean, got {value:?}"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.upload_dir, "uploads");
        assert_eq!(config.upload_max_size, "10MB");
        assert!(config.health_auth_required);
        assert!(config.strict_string_segments);
        assert_eq!(config.session_is_admin_key, "is_admin");
    }

    #[test]
    fn test_from_lookup_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("OCTAVIA_UPLOAD_DIR", "/var/uploads"),
            ("OCTAVIA_LOG_JSON", "true"),
            ("OCTAVIA_STRICT_STRING_SEGMENTS", "0"),
            ("OCTAVIA_SESSION_SECRET", "s3cret"),
        ]))
        .unwrap();

        assert_eq!(config.upload_dir, "/var/uploads");
        assert!(config.log_json);
        assert!(!config.strict_string_segments);
        assert_eq!(config.session_secret.as_deref(), Some("s3cret"));
        assert_eq!(config.log_level, "debug");
    }

    #[test]
    fn test_from_lookup_invalid() {
        let err = Config::from_lookup(lookup(&[("OCTAVIA_LOG_JSON", "maybe")])).unwrap_err();
        assert!(matches!(err, Error::InvalidConfig { ref key, .. } if key == "log_json"));

        assert!(Config::from_lookup(lookup(&[("OCTAVIA_UPLOAD_MAX_SIZE", "lots")])).is_err());
    }

    #[test]
    fn test_projections() {
        let config = Config {
            upload_max_size: "2MB".to_string(),
            health_username: "monitor".to_string(),
            ..Config::default()
        };
        let upload = config.upload().unwrap();
        assert_eq!(upload.max_size, 2 * 1024 * 1024);
        assert_eq!(upload.upload_dir, PathBuf::from("uploads"));

        let health = config.health();
        assert!(health.auth_required);
        assert_eq!(health.username, "monitor");

        assert_eq!(config.log().level, "debug");
    }

    #[test]
    fn test_deserialize_partial() {
        let config: Config = serde_json::from_str(r#"{"log_level": "info"}"#).unwrap();
        assert_eq!(config.log_level, "info");
        assert_eq!(config.upload_dir, "uploads");
    }
}
