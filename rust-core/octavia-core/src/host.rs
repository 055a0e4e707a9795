//! # Hyper Adapter
//!
//! Conversions between hyper messages and the framework's request and
//! response types. Accepting connections is left to the embedding
//! server.

use crate::app::App;
use crate::error::{Error, Result};
use crate::request::Request;
use crate::response::Response;
use crate::router::Method;
use crate::session::Session;
use http_body_util::{BodyExt, Full};
use hyper::body::{Body, Bytes};
use hyper::StatusCode;
use tracing::warn;

impl Request {
    /// Create from a hyper request without a body limit
    ///
    /// # Errors
    ///
    /// See [`Request::from_hyper_with_limit`].
    pub async fn from_hyper<B>(req: hyper::Request<B>) -> Result<Self>
    where
        B: Body,
        B::Error: std::fmt::Display,
    {
        Self::from_hyper_with_limit(req, usize::MAX).await
    }

    /// Create from a hyper request with a body size limit
    ///
    /// # Errors
    ///
    /// Returns `Error::PayloadTooLarge` if the declared or received body
    /// exceeds `max_body_size`, `Error::NotFound` for an unsupported
    /// method, and `Error::InvalidBody` if the body cannot be read.
    pub async fn from_hyper_with_limit<B>(
        req: hyper::Request<B>,
        max_body_size: usize,
    ) -> Result<Self>
    where
        B: Body,
        B::Error: std::fmt::Display,
    {
        let (parts, body) = req.into_parts();

        let method = Method::from_name(parts.method.as_str()).ok_or_else(|| Error::NotFound {
            method: parts.method.to_string(),
            path: parts.uri.path().to_string(),
        })?;

        if let Some(content_len) = parts
            .headers
            .get(hyper::header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<usize>().ok())
        {
            if content_len > max_body_size {
                return Err(Error::PayloadTooLarge {
                    limit: max_body_size,
                    actual: content_len,
                });
            }
        }

        let bytes = BodyExt::collect(body)
            .await
            .map_err(|e| Error::InvalidBody(e.to_string()))?
            .to_bytes();
        if bytes.len() > max_body_size {
            return Err(Error::PayloadTooLarge {
                limit: max_body_size,
                actual: bytes.len(),
            });
        }

        Ok(Self::from_parts(
            method,
            parts.uri.path().to_string(),
            parts.uri.query(),
            parts.headers,
            Some(bytes),
        ))
    }
}

impl Response {
    /// Convert to a hyper response
    #[must_use]
    pub fn into_hyper(self) -> hyper::Response<Full<Bytes>> {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = self.body_text();
        let mut builder = hyper::Response::builder().status(status);
        for (k, v) in self.headers() {
            builder = builder.header(k.as_str(), v.as_str());
        }

        builder.body(Full::new(Bytes::from(body))).unwrap_or_else(|e| {
            warn!("Invalid response header: {}", e);
            let body = Full::new(Bytes::from(crate::app::FALLBACK_BODY));
            let mut fallback = hyper::Response::new(body);
            *fallback.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
            fallback
        })
    }
}

impl App {
    /// Handle a hyper request end to end.
    ///
    /// Conversion failures (oversized or unreadable bodies, unsupported
    /// methods) are answered with their status and code directly.
    pub async fn handle_hyper<B>(
        &self,
        req: hyper::Request<B>,
        session: &dyn Session,
        max_body_size: usize,
    ) -> hyper::Response<Full<Bytes>>
    where
        B: Body,
        B::Error: std::fmt::Display,
    {
        match Request::from_hyper_with_limit(req, max_body_size).await {
            Ok(request) => self.handle(request, session).into_hyper(),
            Err(err) => {
                warn!(code = err.code(), "Rejected request: {}", err);
                Response::new(serde_json::json!({ "data": err.code() }).to_string())
                    .with_status(err.status_code())
                    .with_header("Content-Type", "application/json")
                    .into_hyper()
            }
        }
    }
}
