//! HTTP logging middleware with sensitive header redaction.
//!
//! The session is carried in cookies, so `cookie` and `set-cookie` are
//! redacted by default alongside the usual credential headers.
//!
//! # Examples
//!
//! ```rust
//! use fintrack_client::client::http_logging_middleware::HttpLoggingMiddleware;
//! use fintrack_client::client::http_middleware::HttpMiddlewareChain;
//! use std::sync::Arc;
//!
//! let mut chain = HttpMiddlewareChain::new();
//! chain.add(Arc::new(
//!     HttpLoggingMiddleware::new()
//!         .with_level(tracing::Level::DEBUG)
//!         .with_max_body_bytes(512),
//! ));
//! ```

use crate::client::http_middleware::{
    HttpMiddleware, HttpMiddlewareContext, HttpRequest, HttpResponse, RequestBody,
};
use crate::error::{Error, Result};
use crate::shared::http_utils::{
    default_loggable_content_types, default_sensitive_headers, format_headers_for_logging,
    redact_url_query, should_log_body_for_content_type,
};
use async_trait::async_trait;
use http::HeaderName;
use std::collections::HashSet;

/// Emit one event at a runtime-selected level.
macro_rules! log_at {
    ($level:expr, $($arg:tt)+) => {
        match $level {
            tracing::Level::TRACE => tracing::trace!($($arg)+),
            tracing::Level::DEBUG => tracing::debug!($($arg)+),
            tracing::Level::INFO => tracing::info!($($arg)+),
            tracing::Level::WARN => tracing::warn!($($arg)+),
            tracing::Level::ERROR => tracing::error!($($arg)+),
        }
    };
}

/// HTTP logging middleware with sensitive header redaction.
#[derive(Debug, Clone)]
pub struct HttpLoggingMiddleware {
    level: tracing::Level,
    redact_headers: HashSet<HeaderName>,
    show_auth_scheme: bool,
    redact_query: bool,
    max_header_value_len: Option<usize>,
    max_body_bytes: Option<usize>,
    loggable_content_types: HashSet<String>,
}

impl Default for HttpLoggingMiddleware {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpLoggingMiddleware {
    /// Create a new HTTP logging middleware with secure defaults.
    ///
    /// Defaults:
    /// - Log level: DEBUG
    /// - Redacted headers: authorization, proxy-authorization, cookie, set-cookie, x-api-key, x-auth-token
    /// - Query strings: logged
    /// - Bodies: not logged
    pub fn new() -> Self {
        Self {
            level: tracing::Level::DEBUG,
            redact_headers: default_sensitive_headers(),
            show_auth_scheme: true,
            redact_query: false,
            max_header_value_len: None,
            max_body_bytes: None,
            loggable_content_types: default_loggable_content_types(),
        }
    }

    /// Set the log level for this middleware.
    pub fn with_level(mut self, level: tracing::Level) -> Self {
        self.level = level;
        self
    }

    /// Add a header to the redaction list.
    pub fn redact_header(mut self, name: HeaderName) -> Self {
        self.redact_headers.insert(name);
        self
    }

    /// Remove a header from the redaction list (use with caution).
    pub fn allow_header(mut self, name: &HeaderName) -> Self {
        self.redact_headers.remove(name);
        self
    }

    /// Whether to show the auth scheme in redacted Authorization headers.
    pub fn with_show_auth_scheme(mut self, show: bool) -> Self {
        self.show_auth_scheme = show;
        self
    }

    /// Replace query strings with `[REDACTED]` (account ids, search terms).
    pub fn with_redact_query(mut self, redact: bool) -> Self {
        self.redact_query = redact;
        self
    }

    /// Set maximum header value length. Longer values are truncated.
    pub fn with_max_header_value_len(mut self, max_len: usize) -> Self {
        self.max_header_value_len = Some(max_len);
        self
    }

    /// Set maximum body bytes to log. If unset, bodies are not logged.
    pub fn with_max_body_bytes(mut self, max_bytes: usize) -> Self {
        self.max_body_bytes = Some(max_bytes);
        self
    }

    /// Whether `name` is currently redacted.
    pub fn is_redacted(&self, name: &HeaderName) -> bool {
        self.redact_headers.contains(name)
    }

    fn body_preview(&self, body: &[u8], loggable: bool) -> String {
        match self.max_body_bytes {
            Some(max_bytes) if loggable && !body.is_empty() => {
                let preview_len = max_bytes.min(body.len());
                let preview = String::from_utf8_lossy(&body[..preview_len]);
                if body.len() > max_bytes {
                    format!(" body={}B (showing {}B): {}...", body.len(), preview_len, preview)
                } else {
                    format!(" body={}B: {}", body.len(), preview)
                }
            },
            _ => format!(" body={}B", body.len()),
        }
    }

    fn request_body_info(&self, body: &RequestBody) -> String {
        match body {
            RequestBody::None => String::new(),
            RequestBody::Json(json) => self.body_preview(json.as_bytes(), true),
            RequestBody::Multipart(form) => {
                format!(" multipart={}B in {} parts", form.len_bytes(), form.parts.len())
            },
        }
    }

    /// Render a request line as it will be logged.
    pub fn describe_request(&self, request: &HttpRequest) -> String {
        format!(
            "HTTP {} {} | headers: [{}]{}",
            request.method,
            redact_url_query(&request.path, self.redact_query),
            format_headers_for_logging(
                &request.headers,
                &self.redact_headers,
                self.show_auth_scheme,
                self.max_header_value_len,
            ),
            self.request_body_info(&request.body)
        )
    }

    /// Render a response line as it will be logged.
    pub fn describe_response(&self, response: &HttpResponse) -> String {
        let loggable = should_log_body_for_content_type(
            response.get_header("content-type").map(String::as_str),
            &self.loggable_content_types,
        );
        format!(
            "HTTP {} | headers: [{}]{}",
            response.status,
            format_headers_for_logging(
                &response.headers,
                &self.redact_headers,
                self.show_auth_scheme,
                self.max_header_value_len,
            ),
            self.body_preview(&response.body, loggable)
        )
    }
}

#[async_trait]
impl HttpMiddleware for HttpLoggingMiddleware {
    async fn on_request(
        &self,
        request: &mut HttpRequest,
        context: &HttpMiddlewareContext,
    ) -> Result<()> {
        log_at!(
            self.level,
            request_id = %context.request_id,
            attempt = context.attempt,
            "{}",
            self.describe_request(request)
        );
        Ok(())
    }

    async fn on_response(
        &self,
        response: &mut HttpResponse,
        context: &HttpMiddlewareContext,
    ) -> Result<()> {
        log_at!(
            self.level,
            request_id = %context.request_id,
            attempt = context.attempt,
            "{}",
            self.describe_response(response)
        );
        Ok(())
    }

    async fn on_error(&self, error: &Error, context: &HttpMiddlewareContext) -> Result<()> {
        tracing::warn!(
            request_id = %context.request_id,
            "HTTP {} {} failed without response: {}",
            context.method,
            redact_url_query(&context.url, self.redact_query),
            error
        );
        Ok(())
    }

    fn priority(&self) -> i32 {
        100 // Log what is actually sent, after other middleware
    }
}
