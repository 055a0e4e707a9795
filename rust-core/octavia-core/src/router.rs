//! # Router
//!
//! Prefix-grouped, registration-ordered route matching.
//!
//! ## Resolution
//!
//! 1. The global prefix must lead the path and is stripped.
//! 2. The group with the longest literal prefix of the remainder wins.
//!    There is no fallback to a shorter group.
//! 3. Within that group, the first route (registration order) whose
//!    segment count, static segments and method all agree is selected.
//!
//! Matching never mutates routes: captured values are returned in a
//! [`Match`] owned by the caller.

use crate::error::{Error, Result};
use crate::group::RouteGroup;
use crate::path::{match_segments, normalize_prefix, split_path};
use crate::route::Route;
use crate::types::{coerce_segments, ParamValue};
use tracing::{debug, trace};

/// HTTP methods supported by the router
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// HTTP GET
    Get,
    /// HTTP POST
    Post,
    /// HTTP PUT
    Put,
    /// HTTP DELETE
    Delete,
    /// HTTP PATCH
    Patch,
    /// HTTP HEAD
    Head,
    /// HTTP OPTIONS
    Options,
}

impl Method {
    /// Parse an upper-case method name (`"GET"`, `"POST"`, ...)
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "GET" => Some(Self::Get),
            "POST" => Some(Self::Post),
            "PUT" => Some(Self::Put),
            "DELETE" => Some(Self::Delete),
            "PATCH" => Some(Self::Patch),
            "HEAD" => Some(Self::Head),
            "OPTIONS" => Some(Self::Options),
            _ => None,
        }
    }

    /// Upper-case method name
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
            Self::Patch => "PATCH",
            Self::Head => "HEAD",
            Self::Options => "OPTIONS",
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a successful resolution
#[derive(Debug)]
pub struct Match<'a> {
    /// Group the route belongs to
    pub group: &'a RouteGroup,
    /// Selected route
    pub route: &'a Route,
    /// Captured dynamic segment text, left to right
    pub values: Vec<String>,
}

impl Match<'_> {
    /// Coerce the captured values according to the route's declared types
    ///
    /// # Errors
    ///
    /// Returns `Error::WrongPathParameterType` on the first mismatch.
    pub fn typed_values(&self, strict: bool) -> Result<Vec<ParamValue>> {
        coerce_segments(&self.values, self.route.dynamic_types(), strict)
    }
}

/// Route groups under an optional global prefix
#[derive(Debug)]
pub struct Router {
    prefix: String,
    groups: Vec<RouteGroup>,
    strict_string_segments: bool,
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

impl Router {
    /// Create a new empty router
    #[must_use]
    pub const fn new() -> Self {
        Self {
            prefix: String::new(),
            groups: Vec::new(),
            strict_string_segments: true,
        }
    }

    /// Set the global prefix.
    ///
    /// Applies to groups created afterwards; call it before registering.
    pub fn set_prefix(&mut self, prefix: &str) {
        self.prefix = normalize_prefix(prefix);
    }

    /// Global prefix
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Whether `string` segments reject purely numeric text
    #[must_use]
    pub const fn strict_string_segments(&self) -> bool {
        self.strict_string_segments
    }

    /// Toggle numeric rejection for `string` segments
    pub fn set_strict_string_segments(&mut self, strict: bool) {
        self.strict_string_segments = strict;
    }

    /// Register a new group
    ///
    /// # Errors
    ///
    /// Returns `Error::GroupAlreadyRegistered` if the global prefix plus
    /// `prefix` is already taken.
    pub fn group(&mut self, prefix: &str) -> Result<&mut RouteGroup> {
        let local = normalize_prefix(prefix);
        let base = format!("{}{}", self.prefix, local);
        if self.groups.iter().any(|g| g.base() == base) {
            return Err(Error::GroupAlreadyRegistered(base));
        }

        debug!(prefix = %base, "Registering route group");
        self.groups.push(RouteGroup::new(local, base));
        let last = self.groups.len() - 1;
        Ok(&mut self.groups[last])
    }

    /// Group at the empty prefix, created on first use
    pub fn default_group(&mut self) -> &mut RouteGroup {
        let position = match self.groups.iter().position(|g| g.prefix().is_empty()) {
            Some(position) => position,
            None => {
                self.groups.push(RouteGroup::new(String::new(), self.prefix.clone()));
                self.groups.len() - 1
            }
        };
        &mut self.groups[position]
    }

    /// Registered groups in registration order
    #[must_use]
    pub fn groups(&self) -> &[RouteGroup] {
        &self.groups
    }

    /// Resolve a request to a route
    #[must_use]
    pub fn route(&self, method: Method, path: &str) -> Option<Match<'_>> {
        let remaining = path.strip_prefix(self.prefix.as_str())?;

        let mut best: Option<&RouteGroup> = None;
        for group in &self.groups {
            if remaining.starts_with(group.prefix())
                && best.map_or(true, |b| group.prefix().len() > b.prefix().len())
            {
                best = Some(group);
            }
        }
        let group = best?;
        trace!(group = %group.base(), path = %path, "Resolved route group");

        let rest = &remaining[group.prefix().len()..];
        let segments = split_path(rest);
        group.routes().iter().find_map(|route| {
            if route.method() != method {
                return None;
            }
            match_segments(route.segments(), &segments).map(|values| Match {
                group,
                route,
                values,
            })
        })
    }
}
