//! Transport abstraction and the reqwest-backed implementation.
//!
//! A [`Transport`] turns one logical [`HttpRequest`] into one
//! [`HttpResponse`]. Any HTTP status, including 5xx, is a response. Only a
//! failure to obtain a response at all is reported as
//! [`Error::Transport`]; the request client keys its offline behaviour on
//! exactly that distinction.

use std::collections::HashMap;

use async_trait::async_trait;
use url::Url;

use crate::client::http_middleware::{
    HttpMiddlewareChain, HttpMiddlewareContext, HttpRequest, HttpResponse, RequestBody,
};
use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::types::UploadForm;

/// Sends logical requests to the API.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Perform one exchange.
    ///
    /// # Errors
    ///
    /// [`Error::Transport`] when no response was obtained. Other variants
    /// come from middleware or request construction.
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse>;
}

/// [`Transport`] over `reqwest` with a cookie store.
///
/// The cookie store carries the session cookies set by the sign-in and
/// refresh endpoints on every subsequent request, including replays.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    base_url: Url,
    default_headers: HashMap<String, String>,
    middleware: HttpMiddlewareChain,
}

impl ReqwestTransport {
    /// Build a transport from configuration.
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| Error::configuration(format!("invalid base_url: {}", e)))?;
        let client = reqwest::Client::builder()
            .cookie_store(true)
            .timeout(config.timeout())
            .build()
            .map_err(|e| Error::configuration(format!("cannot build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url,
            default_headers: config.headers.clone(),
            middleware: HttpMiddlewareChain::new(),
        })
    }

    /// Attach a middleware chain run around every exchange.
    pub fn with_middleware(mut self, middleware: HttpMiddlewareChain) -> Self {
        self.middleware = middleware;
        self
    }

    /// Append a logical path to the base URL.
    ///
    /// The path is appended rather than resolved, so a base with a path
    /// prefix such as `https://host/api` keeps that prefix.
    pub fn url_for(&self, path: &str) -> Result<Url> {
        let base = self.base_url.as_str().trim_end_matches('/');
        let joined = if path.starts_with('/') {
            format!("{}{}", base, path)
        } else {
            format!("{}/{}", base, path)
        };
        Url::parse(&joined)
            .map_err(|e| Error::internal(format!("invalid request path {}: {}", path, e)))
    }

    fn multipart(form: UploadForm) -> Result<reqwest::multipart::Form> {
        let mut multipart = reqwest::multipart::Form::new();
        for part in form.parts {
            let mut p = reqwest::multipart::Part::bytes(part.data);
            if let Some(file_name) = part.file_name {
                p = p.file_name(file_name);
            }
            if let Some(mime) = part.mime_type {
                p = p
                    .mime_str(&mime)
                    .map_err(|e| Error::internal(format!("invalid MIME type {}: {}", mime, e)))?;
            }
            multipart = multipart.part(part.name, p);
        }
        Ok(multipart)
    }

    async fn exchange(&self, request: HttpRequest, url: Url) -> Result<HttpResponse> {
        let mut builder = self
            .client
            .request(http::Method::from(request.method), url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        builder = match request.body {
            RequestBody::None => builder,
            RequestBody::Json(json) => builder
                .header(http::header::CONTENT_TYPE, "application/json")
                .body(json),
            // reqwest sets the multipart boundary header itself.
            RequestBody::Multipart(form) => builder.multipart(Self::multipart(form)?),
        };

        let response = builder
            .send()
            .await
            .map_err(|e| Error::transport(e.to_string()))?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(k, v)| Some((k.as_str().to_string(), v.to_str().ok()?.to_string())))
            .collect();
        // The status line arrived, so a server-side write may already be applied.
        let body = response
            .bytes()
            .await
            .map_err(|e| Error::IncompleteResponse {
                status,
                message: e.to_string(),
            })?;

        Ok(HttpResponse {
            status,
            headers,
            body: body.to_vec(),
        })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, mut request: HttpRequest) -> Result<HttpResponse> {
        for (name, value) in &self.default_headers {
            if !request.has_header(name) {
                request.add_header(name, value);
            }
        }

        let url = self.url_for(&request.path)?;
        let context = HttpMiddlewareContext::for_request(&request, url.to_string());
        self.middleware.process_request(&mut request, &context).await?;

        match self.exchange(request, url).await {
            Ok(mut response) => {
                self.middleware
                    .process_response(&mut response, &context)
                    .await?;
                Ok(response)
            },
            Err(e) => {
                if e.is_transport() {
                    self.middleware.process_error(&e, &context).await;
                }
                Err(e)
            },
        }
    }
}
