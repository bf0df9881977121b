//! HTTP transport middleware for request/response transformation.
//!
//! Middleware runs inside [`ReqwestTransport`](crate::shared::transport::ReqwestTransport)
//! around every exchange, including session refreshes and queue replays.
//! It sees fully resolved requests and raw responses, which makes it the
//! place for header injection, logging and metrics.

use crate::error::{Error, Result};
use crate::types::{Method, UploadForm};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

/// Context for HTTP middleware execution.
#[derive(Debug, Clone)]
pub struct HttpMiddlewareContext {
    /// Correlation id shared by a call and its post-refresh retry
    pub request_id: String,
    /// URL being requested
    pub url: String,
    /// HTTP method
    pub method: String,
    /// Attempt number (0 for the first try, 1 for the post-refresh retry)
    pub attempt: u32,
}

impl HttpMiddlewareContext {
    /// Create a context for one attempt of `request` against `url`.
    pub fn for_request(request: &HttpRequest, url: String) -> Self {
        Self {
            request_id: request.request_id.clone(),
            url,
            method: request.method.as_str().to_string(),
            attempt: request.attempt,
        }
    }
}

/// Request payload.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RequestBody {
    /// No body.
    #[default]
    None,
    /// Serialized JSON document.
    Json(String),
    /// Multipart form (uploads).
    Multipart(UploadForm),
}

impl RequestBody {
    /// Build from an optional serialized JSON body.
    pub fn from_json(body: Option<String>) -> Self {
        body.map_or(Self::None, Self::Json)
    }

    /// Whether there is any payload.
    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }
}

/// Logical HTTP request, before the base URL is applied.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    /// HTTP method
    pub method: Method,
    /// Logical path, e.g. `/transactions?limit=20`
    pub path: String,
    /// Request headers
    pub headers: HashMap<String, String>,
    /// Request body
    pub body: RequestBody,
    /// 0 for the first try, 1 for the retry after a session refresh
    pub attempt: u32,
    /// Correlation id for logs. A fresh UUID unless set; replays use the
    /// queued record id.
    pub request_id: String,
}

impl HttpRequest {
    /// Create a new HTTP request
    pub fn new(method: Method, path: impl Into<String>, body: RequestBody) -> Self {
        Self {
            method,
            path: path.into(),
            headers: HashMap::new(),
            body,
            attempt: 0,
            request_id: uuid::Uuid::new_v4().to_string(),
        }
    }

    /// Set the correlation id
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = request_id.into();
        self
    }

    /// Set the attempt number
    pub fn with_attempt(mut self, attempt: u32) -> Self {
        self.attempt = attempt;
        self
    }

    /// Add a header
    pub fn add_header(&mut self, name: &str, value: &str) {
        self.headers.insert(name.to_string(), value.to_string());
    }

    /// Check whether a header is present (case-insensitive)
    pub fn has_header(&self, name: &str) -> bool {
        self.headers.keys().any(|k| k.eq_ignore_ascii_case(name))
    }
}

/// HTTP response representation for middleware
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// HTTP status code
    pub status: u16,
    /// Response headers
    pub headers: HashMap<String, String>,
    /// Response body
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Create a new HTTP response
    pub fn new(status: u16, body: Vec<u8>) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            body,
        }
    }

    /// Get a header value (case-insensitive)
    pub fn get_header(&self, name: &str) -> Option<&String> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v)
    }

    /// 2xx status
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// 204, or a body that is empty or only whitespace
    pub fn is_empty(&self) -> bool {
        self.status == 204 || self.body.iter().all(u8::is_ascii_whitespace)
    }
}

/// HTTP-level middleware trait.
///
/// # Examples
///
/// ```rust
/// use fintrack_client::client::http_middleware::{HttpMiddleware, HttpRequest, HttpMiddlewareContext};
/// use async_trait::async_trait;
///
/// struct ClientVersionMiddleware;
///
/// #[async_trait]
/// impl HttpMiddleware for ClientVersionMiddleware {
///     async fn on_request(
///         &self,
///         request: &mut HttpRequest,
///         _context: &HttpMiddlewareContext,
///     ) -> fintrack_client::Result<()> {
///         request.add_header("X-Client-Version", env!("CARGO_PKG_VERSION"));
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait HttpMiddleware: Send + Sync {
    /// Called before HTTP request is sent
    async fn on_request(
        &self,
        request: &mut HttpRequest,
        context: &HttpMiddlewareContext,
    ) -> Result<()> {
        let _ = (request, context);
        Ok(())
    }

    /// Called after HTTP response is received
    async fn on_response(
        &self,
        response: &mut HttpResponse,
        context: &HttpMiddlewareContext,
    ) -> Result<()> {
        let _ = (response, context);
        Ok(())
    }

    /// Called when no response was obtained
    async fn on_error(&self, error: &Error, context: &HttpMiddlewareContext) -> Result<()> {
        let _ = (error, context);
        Ok(())
    }

    /// Priority for ordering (lower runs first)
    fn priority(&self) -> i32 {
        50 // Default priority
    }
}

/// Chain of HTTP middleware
#[derive(Clone, Default)]
pub struct HttpMiddlewareChain {
    middlewares: Vec<Arc<dyn HttpMiddleware>>,
}

impl HttpMiddlewareChain {
    /// Create a new HTTP middleware chain
    pub fn new() -> Self {
        Self {
            middlewares: Vec::new(),
        }
    }

    /// Add middleware to the chain
    pub fn add(&mut self, middleware: Arc<dyn HttpMiddleware>) {
        self.middlewares.push(middleware);
        // Sort by priority
        self.middlewares.sort_by_key(|m| m.priority());
    }

    /// Number of registered middleware
    pub fn len(&self) -> usize {
        self.middlewares.len()
    }

    /// Whether the chain is empty
    pub fn is_empty(&self) -> bool {
        self.middlewares.is_empty()
    }

    /// Process request through all middleware
    pub async fn process_request(
        &self,
        request: &mut HttpRequest,
        context: &HttpMiddlewareContext,
    ) -> Result<()> {
        for middleware in &self.middlewares {
            middleware.on_request(request, context).await?;
        }
        Ok(())
    }

    /// Process response through all middleware (in reverse order)
    pub async fn process_response(
        &self,
        response: &mut HttpResponse,
        context: &HttpMiddlewareContext,
    ) -> Result<()> {
        for middleware in self.middlewares.iter().rev() {
            middleware.on_response(response, context).await?;
        }
        Ok(())
    }

    /// Notify all middleware of a transport failure (in reverse order)
    pub async fn process_error(&self, error: &Error, context: &HttpMiddlewareContext) {
        for middleware in self.middlewares.iter().rev() {
            if let Err(e) = middleware.on_error(error, context).await {
                tracing::warn!("HTTP middleware on_error failed: {}", e);
            }
        }
    }
}

impl std::fmt::Debug for HttpMiddlewareChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpMiddlewareChain")
            .field("count", &self.middlewares.len())
            .finish()
    }
}
