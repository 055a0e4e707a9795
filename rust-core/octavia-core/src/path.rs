//! # Path Matching
//!
//! Segment-level helpers shared by registration and routing.
//!
//! Patterns use `{name}` for an untyped dynamic segment and
//! `{name:int}` / `{name:string}` for a typed one. There is no
//! wildcard or optional-segment syntax: a pattern only ever matches a
//! path with exactly the same number of segments.

use crate::types::SegmentType;

/// Split a path into its non-empty segments.
///
/// A single trailing slash is stripped, then empty segments produced by
/// leading or doubled slashes are discarded.
#[must_use]
pub fn split_path(path: &str) -> Vec<&str> {
    let path = path.strip_suffix('/').unwrap_or(path);
    path.split('/').filter(|s| !s.is_empty()).collect()
}

/// Normalize a group or router prefix: trailing slash removed, `/` becomes empty.
#[must_use]
pub fn normalize_prefix(prefix: &str) -> String {
    prefix.strip_suffix('/').unwrap_or(prefix).to_string()
}

/// Whether a pattern segment is dynamic (`{...}`)
#[must_use]
pub fn segment_is_dynamic(segment: &str) -> bool {
    segment.starts_with('{')
}

/// Extract the declared type of a dynamic segment.
///
/// `{id:int}` gives `Some(SegmentType::Int)`. Untyped segments, static
/// segments and unrecognized type names give `None`.
#[must_use]
pub fn parse_dynamic_type(segment: &str) -> Option<SegmentType> {
    if !segment_is_dynamic(segment) {
        return None;
    }
    let inner = segment.trim_start_matches('{').trim_end_matches('}');
    inner
        .split_once(':')
        .and_then(|(_, spec)| SegmentType::from_specifier(spec))
}

/// Per-segment declared types for a split pattern, `None` for static segments
#[must_use]
pub fn dynamic_segment_types(segments: &[String]) -> Vec<Option<SegmentType>> {
    segments.iter().map(|s| parse_dynamic_type(s)).collect()
}

/// Slug derived from a route path, e.g. `/api/v1/user-list` -> `api_v1_user_list`
#[must_use]
pub fn route_name(path: &str) -> String {
    let name = path.replace(['/', '-'], "_");
    name.strip_prefix('_').unwrap_or(&name).to_string()
}

/// Match a split pattern against split path segments.
///
/// Counts must be equal. Dynamic segments match anything and their text
/// is captured in order; static segments must match exactly
/// (case-sensitive). Returns the captured values on success.
#[must_use]
pub fn match_segments(pattern: &[String], segments: &[&str]) -> Option<Vec<String>> {
    if pattern.len() != segments.len() {
        return None;
    }

    let mut captured = Vec::new();
    for (expected, actual) in pattern.iter().zip(segments) {
        if segment_is_dynamic(expected) {
            captured.push((*actual).to_string());
        } else if expected != actual {
            return None;
        }
    }
    Some(captured)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owned(segments: &[&str]) -> Vec<String> {
        segments.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_split_path() {
        assert_eq!(split_path("/a//b/"), vec!["a", "b"]);
        assert!(split_path("/").is_empty());
        assert!(split_path("").is_empty());
        assert_eq!(split_path("api/v1/{user}/homepage"), vec!["api", "v1", "{user}", "homepage"]);
    }

    #[test]
    fn test_normalize_prefix() {
        assert_eq!(normalize_prefix("/api/"), "/api");
        assert_eq!(normalize_prefix("/api"), "/api");
        assert_eq!(normalize_prefix("/"), "");
    }

    #[test]
    fn test_segment_classification() {
        assert!(segment_is_dynamic("{id}"));
        assert!(segment_is_dynamic("{id:int}"));
        assert!(!segment_is_dynamic("users"));
    }

    #[test]
    fn test_parse_dynamic_type() {
        assert_eq!(parse_dynamic_type("{id:int}"), Some(SegmentType::Int));
        assert_eq!(parse_dynamic_type("{name:string}"), Some(SegmentType::String));
        assert_eq!(parse_dynamic_type("{id}"), None);
        assert_eq!(parse_dynamic_type("{id:uuid}"), None);
        assert_eq!(parse_dynamic_type("static"), None);
    }

    #[test]
    fn test_route_name() {
        assert_eq!(route_name("/api/v1/user-list"), "api_v1_user_list");
        assert_eq!(route_name("health"), "health");
    }

    #[test]
    fn test_match_segments_count_gate() {
        let pattern = owned(&["users", "{id}"]);
        assert!(match_segments(&pattern, &["users"]).is_none());
        assert!(match_segments(&pattern, &["users", "1", "posts"]).is_none());
        assert_eq!(match_segments(&pattern, &["users", "1"]), Some(vec!["1".to_string()]));
    }

    #[test]
    fn test_match_segments_static_is_case_sensitive() {
        let pattern = owned(&["users", "active"]);
        assert!(match_segments(&pattern, &["users", "Active"]).is_none());
        assert_eq!(match_segments(&pattern, &["users", "active"]), Some(vec![]));
    }

    #[test]
    fn test_match_segments_captures_in_order() {
        let pattern = owned(&["{user}", "posts", "{post:int}"]);
        assert_eq!(
            match_segments(&pattern, &["bob", "posts", "7"]),
            Some(vec!["bob".to_string(), "7".to_string()])
        );
    }
}
