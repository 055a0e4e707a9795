//! # Google OAuth Consent
//!
//! OAuth routes delegate the consent dance to an [`OAuthProvider`]
//! registered on the app. Token exchange and storage stay with the
//! provider.

use crate::error::Result;
use crate::request::Request;

/// Default Gmail scope requested by consent routes
pub const GMAIL_SCOPE: &str = "https://mail.google.com/";

/// OAuth route settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthConfig {
    /// Scopes requested from the provider
    pub scopes: Vec<String>,
    /// Whether a refresh token is requested
    pub offline_access: bool,
    /// Redirect path, defaults to the route path
    pub redirect_path: Option<String>,
}

impl Default for OAuthConfig {
    fn default() -> Self {
        Self {
            scopes: vec![GMAIL_SCOPE.to_string()],
            offline_access: true,
            redirect_path: None,
        }
    }
}

impl OAuthConfig {
    /// Request the given scopes
    #[must_use]
    pub fn scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scopes = scopes.into_iter().map(Into::into).collect();
        self
    }

    /// Whether to ask for a refresh token
    #[must_use]
    pub const fn offline_access(mut self, offline: bool) -> Self {
        self.offline_access = offline;
        self
    }

    /// Override the redirect path
    #[must_use]
    pub fn redirect_path(mut self, path: impl Into<String>) -> Self {
        self.redirect_path = Some(path.into());
        self
    }
}

/// Step reached in the consent flow
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OAuthOutcome {
    /// Send the user to the consent screen
    Redirect(String),
    /// Consent granted and tokens stored
    Authorized,
    /// Consent refused or exchange failed
    Denied,
}

impl OAuthOutcome {
    /// Status handed to the route handler, `None` while redirecting
    #[must_use]
    pub const fn granted(&self) -> Option<bool> {
        match self {
            Self::Redirect(_) => None,
            Self::Authorized => Some(true),
            Self::Denied => Some(false),
        }
    }
}

/// Performs the consent flow for OAuth routes
pub trait OAuthProvider: Send + Sync {
    /// Advance the consent flow for `request`.
    ///
    /// `config` carries the route's scopes and offline access flag;
    /// `redirect_path` is where the provider should send the user back.
    ///
    /// # Errors
    ///
    /// Provider failures are surfaced as request errors.
    fn authorize(
        &self,
        config: &OAuthConfig,
        redirect_path: &str,
        request: &Request,
    ) -> Result<OAuthOutcome>;
}
