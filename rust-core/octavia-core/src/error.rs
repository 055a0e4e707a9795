//! # Error Handling
//!
//! Centralized error types for Octavia core.
//! Uses `thiserror` for ergonomic error definitions.
//!
//! Every request-time variant carries a default HTTP status
//! ([`Error::status_code`]) and a stable machine code ([`Error::code`])
//! which the orchestrator sends back as the response `data`.

use thiserror::Error;

/// Result type alias for Octavia operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for the Octavia runtime
#[derive(Error, Debug)]
pub enum Error {
    /// No group or no route matched the request
    #[error("No route found for {method} {path}")]
    NotFound {
        /// Request method
        method: String,
        /// The path that wasn't matched
        path: String,
    },

    /// Route requires a logged-in session
    #[error("Login required")]
    Unauthorized,

    /// Route requires an admin session
    #[error("Admin rights required")]
    Forbidden,

    /// A required query parameter is absent
    #[error("Missing query parameter: {0}")]
    MissingQueryParameter(String),

    /// A required body parameter is absent
    #[error("Missing body parameter: {0}")]
    MissingBodyParameter(String),

    /// A query parameter does not have the declared type
    #[error("Wrong type for query parameter {field}, expected {{{expected}}} but got {{{actual}}}")]
    WrongQueryParameterType {
        /// Offending parameter
        field: String,
        /// Declared type
        expected: String,
        /// Observed type
        actual: String,
    },

    /// A body property does not have the declared type
    #[error("Wrong type for property {field}, expected {{{expected}}} but got {{{actual}}}")]
    WrongObjectPropertyType {
        /// Offending property
        field: String,
        /// Declared type
        expected: String,
        /// Observed type
        actual: String,
    },

    /// A dynamic path segment does not have the declared type
    #[error("Wrong type for path parameter {value}, expected {{{expected}}} but got {{{actual}}}")]
    WrongPathParameterType {
        /// Captured segment text
        value: String,
        /// Declared type
        expected: String,
        /// Observed type
        actual: String,
    },

    /// More than one file sent to a single-file upload route
    #[error("Multiple file uploads not allowed")]
    MultipleFilesNotAllowed,

    /// The host reported a failed upload, or the file could not be stored
    #[error("File upload error: {0}")]
    FileUploadError(String),

    /// Uploaded file is larger than the route allows
    #[error("File {name} exceeds the allowed size of {limit} bytes")]
    FileSizeExceeded {
        /// Client file name
        name: String,
        /// Max allowed size in bytes
        limit: u64,
    },

    /// Uploaded file extension is not allowed
    #[error("File type {0} is not allowed")]
    FileTypeNotAllowed(String),

    /// Too many requests from the same client
    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    /// Request payload too large
    #[error("Payload too large: limit={limit} bytes, received={actual} bytes")]
    PayloadTooLarge {
        /// Max allowed size
        limit: usize,
        /// Actual size
        actual: usize,
    },

    /// Request body is not valid JSON
    #[error("Invalid JSON body: {0}")]
    InvalidBody(String),

    /// Unexpected failure during request handling
    #[error("Internal server error: {0}")]
    InternalServerError(String),

    /// A route with the same method and path already exists in the group
    #[error("Route already registered: {method} {path}")]
    RouteAlreadyRegistered {
        /// Route method
        method: String,
        /// Full route path
        path: String,
    },

    /// A group with the same effective prefix already exists
    #[error("Route group already registered: {0}")]
    GroupAlreadyRegistered(String),

    /// No factory registered under the given middleware id
    #[error("Unknown middleware: {0}")]
    UnknownMiddleware(String),

    /// Invalid framework configuration value
    #[error("Invalid config value for {key}: {reason}")]
    InvalidConfig {
        /// Config key
        key: String,
        /// Reason for invalidity
        reason: String,
    },

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Default HTTP status code for this error kind
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::NotFound { .. } => 404,
            Self::Unauthorized => 401,
            Self::Forbidden => 403,
            Self::MissingQueryParameter(_)
            | Self::MissingBodyParameter(_)
            | Self::WrongQueryParameterType { .. }
            | Self::WrongObjectPropertyType { .. }
            | Self::WrongPathParameterType { .. }
            | Self::MultipleFilesNotAllowed
            | Self::FileUploadError(_)
            | Self::FileSizeExceeded { .. }
            | Self::FileTypeNotAllowed(_)
            | Self::InvalidBody(_) => 400,
            Self::PayloadTooLarge { .. } => 413,
            Self::RateLimitExceeded => 429,
            Self::InternalServerError(_)
            | Self::RouteAlreadyRegistered { .. }
            | Self::GroupAlreadyRegistered(_)
            | Self::UnknownMiddleware(_)
            | Self::InvalidConfig { .. }
            | Self::Json(_)
            | Self::Io(_) => 500,
        }
    }

    /// Stable machine-readable code sent as the response data
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "NOT_FOUND",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::Forbidden => "FORBIDDEN",
            Self::MissingQueryParameter(_) => "MISSING_QUERY_PARAMETER",
            Self::MissingBodyParameter(_) => "MISSING_BODY_PARAMETER",
            Self::WrongQueryParameterType { .. } => "WRONG_QUERY_PARAMETER_TYPE",
            Self::WrongObjectPropertyType { .. } => "WRONG_OBJECT_PROPERTY_TYPE",
            Self::WrongPathParameterType { .. } => "WRONG_PATH_PARAMETER_TYPE",
            Self::MultipleFilesNotAllowed => "MULTIPLE_FILES_NOT_ALLOWED",
            Self::FileUploadError(_) => "FILE_UPLOAD_ERROR",
            Self::FileSizeExceeded { .. } => "FILE_SIZE_EXCEEDED",
            Self::FileTypeNotAllowed(_) => "FILE_TYPE_NOT_ALLOWED",
            Self::RateLimitExceeded => "RATE_LIMIT_EXCEEDED",
            Self::PayloadTooLarge { .. } => "PAYLOAD_TOO_LARGE",
            Self::InvalidBody(_) => "INVALID_BODY",
            Self::InternalServerError(_)
            | Self::RouteAlreadyRegistered { .. }
            | Self::GroupAlreadyRegistered(_)
            | Self::UnknownMiddleware(_)
            | Self::InvalidConfig { .. }
            | Self::Json(_)
            | Self::Io(_) => "INTERNAL_SERVER_ERROR",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_error() {
        let err = Error::NotFound {
            method: "GET".to_string(),
            path: "/unknown".to_string(),
        };
        assert!(err.to_string().contains("/unknown"));
        assert_eq!(err.status_code(), 404);
        assert_eq!(err.code(), "NOT_FOUND");
    }

    #[test]
    fn test_validation_errors_are_bad_requests() {
        assert_eq!(Error::MissingQueryParameter("lang".into()).status_code(), 400);
        assert_eq!(Error::MissingBodyParameter("age".into()).status_code(), 400);
        let err = Error::WrongObjectPropertyType {
            field: "age".into(),
            expected: "int".into(),
            actual: "string".into(),
        };
        assert_eq!(err.status_code(), 400);
        assert!(err.to_string().contains("expected {int} but got {string}"));
    }

    #[test]
    fn test_access_and_limit_statuses() {
        assert_eq!(Error::Unauthorized.status_code(), 401);
        assert_eq!(Error::Forbidden.status_code(), 403);
        assert_eq!(Error::RateLimitExceeded.status_code(), 429);
        assert_eq!(Error::RateLimitExceeded.code(), "RATE_LIMIT_EXCEEDED");
    }

    #[test]
    fn test_configuration_errors_are_internal() {
        let err = Error::RouteAlreadyRegistered {
            method: "GET".into(),
            path: "/users".into(),
        };
        assert_eq!(err.status_code(), 500);
        assert_eq!(err.code(), "INTERNAL_SERVER_ERROR");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: Error = io_err.into();
        assert!(err.to_string().contains("denied"));
        assert_eq!(err.status_code(), 500);
    }
}
