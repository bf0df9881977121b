//! Request client: the single chokepoint every screen calls through.
//!
//! [`ApiClient`] executes logical requests against the API and decides, per
//! call, between returning the response, renewing the session and retrying
//! once, queueing an undeliverable write, or abandoning the call.
//!
//! # Module Organization
//!
//! - [`http_middleware`] - request/response hooks run inside the transport
//! - [`http_logging_middleware`] - redacting request/response logger
//! - [`navigator`] - sign-in redirect seam
//! - [`refresh`] - single-flight session renewal
//!
//! # Examples
//!
//! ```rust,no_run
//! use fintrack_client::{ApiClient, ApiResponse, ClientConfig};
//! use serde::Deserialize;
//!
//! #[derive(Deserialize)]
//! struct Account {
//!     id: i64,
//!     name: String,
//! }
//!
//! # async fn example() -> fintrack_client::Result<()> {
//! let client = ApiClient::new(ClientConfig::from_env())?;
//!
//! if let ApiResponse::Data(accounts) = client.get::<Vec<Account>>("/accounts").await? {
//!     println!("{} accounts", accounts.len());
//! }
//!
//! // Offline writes are accepted and delivered later.
//! let created = client
//!     .post::<serde_json::Value, _>("/transactions", &serde_json::json!({"amount": "12.50"}))
//!     .await?;
//! if created.is_queued() {
//!     println!("saved offline");
//! }
//! # Ok(())
//! # }
//! ```

pub mod http_logging_middleware;
pub mod http_middleware;
pub mod navigator;
pub mod refresh;

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::config::ClientConfig;
use crate::error::{extract_error_message, Error, Result, REQUEST_FAILED, UPLOAD_FAILED};
use crate::queue::drain::ReplayOutcome;
use crate::queue::file::FileBackend;
use crate::queue::{QueueStore, QueuedWrite};
use crate::shared::transport::{ReqwestTransport, Transport};
use crate::types::{ApiResponse, Method, UploadForm, WriteMethod};
use http_logging_middleware::HttpLoggingMiddleware;
use http_middleware::{HttpMiddleware, HttpMiddlewareChain, HttpRequest, HttpResponse, RequestBody};
use navigator::{LoggingNavigator, Navigator};
use refresh::RefreshCoordinator;

/// Status the API uses for an expired or missing session.
pub const UNAUTHORIZED: u16 = 401;

/// Result of one exchange after the refresh protocol has run.
enum Exchange {
    Response(HttpResponse),
    Abandoned,
}

/// The request client.
///
/// Owns one [`RefreshCoordinator`], so concurrent calls on the same client
/// share session renewals. Wrap it in an [`Arc`] to share it between tasks
/// and with a [`QueueDrainer`](crate::queue::drain::QueueDrainer).
pub struct ApiClient {
    config: ClientConfig,
    transport: Arc<dyn Transport>,
    coordinator: RefreshCoordinator,
    queue: QueueStore,
    navigator: Arc<dyn Navigator>,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.config.base_url)
            .field("coordinator", &self.coordinator)
            .field("queue", &self.queue)
            .finish()
    }
}

impl ApiClient {
    /// Client with the production stack: reqwest transport with request
    /// logging, file-backed queue under the configured directory, and a
    /// navigator that only logs.
    pub fn new(config: ClientConfig) -> Result<Self> {
        ApiClientBuilder::new(config).build()
    }

    /// Start a builder for injecting collaborators.
    pub fn builder(config: ClientConfig) -> ApiClientBuilder {
        ApiClientBuilder::new(config)
    }

    /// Active configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// The session refresh coordinator owned by this client.
    pub fn coordinator(&self) -> &RefreshCoordinator {
        &self.coordinator
    }

    /// The offline queue this client writes to.
    pub fn queue(&self) -> &QueueStore {
        &self.queue
    }

    /// Number of writes waiting for delivery.
    pub async fn pending_writes(&self) -> Result<usize> {
        self.queue.len().await
    }

    /// GET `path`.
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<ApiResponse<T>> {
        self.request(Method::Get, path, None).await
    }

    /// POST a JSON body to `path`.
    pub async fn post<T, B>(&self, path: &str, body: &B) -> Result<ApiResponse<T>>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.request(Method::Post, path, Some(serde_json::to_string(body)?))
            .await
    }

    /// PUT a JSON body to `path`.
    pub async fn put<T, B>(&self, path: &str, body: &B) -> Result<ApiResponse<T>>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.request(Method::Put, path, Some(serde_json::to_string(body)?))
            .await
    }

    /// PATCH a JSON body to `path`.
    pub async fn patch<T, B>(&self, path: &str, body: &B) -> Result<ApiResponse<T>>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.request(Method::Patch, path, Some(serde_json::to_string(body)?))
            .await
    }

    /// DELETE `path`.
    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<ApiResponse<T>> {
        self.request(Method::Delete, path, None).await
    }

    /// Execute one logical request.
    ///
    /// `body` is an already serialized JSON document.
    ///
    /// # Errors
    ///
    /// - [`Error::Transport`] for a read made while the API is unreachable.
    /// - [`Error::QueuePersistence`] for a write that was neither delivered
    ///   nor queued.
    /// - [`Error::Api`] for any other non-2xx status.
    /// - [`Error::Serialization`] if a success body does not decode as `T`.
    pub async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<String>,
    ) -> Result<ApiResponse<T>> {
        match self
            .exchange(HttpRequest::new(
                method,
                path,
                RequestBody::from_json(body.clone()),
            ))
            .await
        {
            Ok(Exchange::Response(response)) => Self::interpret(response, REQUEST_FAILED),
            Ok(Exchange::Abandoned) => Ok(ApiResponse::Abandoned),
            Err(e) if e.is_transport() => match WriteMethod::try_from(method) {
                Ok(write) => {
                    tracing::info!(method = %method, path = %path, error = %e, "API unreachable, queueing write");
                    let record = self.queue.enqueue(write, path, body).await?;
                    Ok(ApiResponse::Queued { id: record.id })
                },
                Err(_) => Err(e),
            },
            Err(e) => Err(e),
        }
    }

    /// Submit a multipart form to `path`.
    ///
    /// Follows the same refresh-and-retry protocol as [`request`](Self::request)
    /// but is never queued: an upload made while offline fails.
    pub async fn upload<T: DeserializeOwned>(
        &self,
        path: &str,
        form: UploadForm,
    ) -> Result<ApiResponse<T>> {
        match self
            .exchange(HttpRequest::new(
                Method::Post,
                path,
                RequestBody::Multipart(form),
            ))
            .await?
        {
            Exchange::Response(response) => Self::interpret(response, UPLOAD_FAILED),
            Exchange::Abandoned => Ok(ApiResponse::Abandoned),
        }
    }

    /// Deliver one queued record.
    ///
    /// Goes through the same refresh coordinator as live calls but never
    /// re-queues. The record itself is not touched; pruning is up to the caller.
    pub async fn replay(&self, record: &QueuedWrite) -> ReplayOutcome {
        let request = HttpRequest::new(
            record.method.into(),
            record.path.clone(),
            RequestBody::from_json(record.body.clone()),
        )
        .with_request_id(record.id.clone());
        match self.exchange(request).await {
            Ok(Exchange::Response(response)) if response.is_success() => ReplayOutcome::Delivered,
            Ok(Exchange::Response(response)) if self.config.is_conflict(response.status) => {
                ReplayOutcome::AlreadyApplied
            },
            Ok(Exchange::Response(response)) => ReplayOutcome::Rejected {
                status: response.status,
                message: extract_error_message(response.status, &response.body, REQUEST_FAILED),
            },
            Ok(Exchange::Abandoned) => ReplayOutcome::Unauthorized,
            Err(e) if e.is_transport() => ReplayOutcome::Unreachable,
            Err(e) => ReplayOutcome::Failed {
                message: e.to_string(),
            },
        }
    }

    /// Send once, and on 401 renew the session and send exactly once more.
    async fn exchange(&self, request: HttpRequest) -> Result<Exchange> {
        let path = request.path.clone();
        let retry = request.clone().with_attempt(1);
        let response = self.transport.send(request).await?;
        if response.status != UNAUTHORIZED {
            return Ok(Exchange::Response(response));
        }

        if self.is_refresh_path(&path) {
            return Ok(self.abandon(&path, "refresh endpoint rejected the session"));
        }
        if !self.coordinator.coordinate_refresh().await {
            return Ok(self.abandon(&path, "session refresh failed"));
        }

        let retried = self.transport.send(retry).await?;
        if retried.status == UNAUTHORIZED {
            return Ok(self.abandon(&path, "still unauthorized after refresh"));
        }
        Ok(Exchange::Response(retried))
    }

    fn is_refresh_path(&self, path: &str) -> bool {
        let bare = path.split(['?', '#']).next().unwrap_or(path);
        bare == self.config.refresh_path
    }

    fn abandon(&self, path: &str, reason: &str) -> Exchange {
        tracing::warn!(path = %path, reason = %reason, "Abandoning call, redirecting to sign-in");
        self.navigator.redirect(&self.config.sign_in_path);
        Exchange::Abandoned
    }

    fn interpret<T: DeserializeOwned>(response: HttpResponse, fallback: &str) -> Result<ApiResponse<T>> {
        if !response.is_success() {
            let message = extract_error_message(response.status, &response.body, fallback);
            return Err(Error::api(response.status, message));
        }
        if response.is_empty() {
            return Ok(ApiResponse::Empty);
        }
        Ok(ApiResponse::Data(serde_json::from_slice(&response.body)?))
    }
}

/// Builder for [`ApiClient`].
///
/// Anything not injected falls back to the production default.
pub struct ApiClientBuilder {
    config: ClientConfig,
    transport: Option<Arc<dyn Transport>>,
    queue: Option<QueueStore>,
    navigator: Option<Arc<dyn Navigator>>,
    middleware: HttpMiddlewareChain,
    log_requests: bool,
}

impl std::fmt::Debug for ApiClientBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClientBuilder")
            .field("config", &self.config)
            .field("custom_transport", &self.transport.is_some())
            .field("custom_queue", &self.queue.is_some())
            .field("middleware", &self.middleware)
            .finish()
    }
}

impl ApiClientBuilder {
    /// Start from a configuration.
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            transport: None,
            queue: None,
            navigator: None,
            middleware: HttpMiddlewareChain::new(),
            log_requests: true,
        }
    }

    /// Use a custom transport. Middleware added to the builder is ignored
    /// in that case; the transport owns its own.
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Use a specific queue store.
    pub fn queue(mut self, queue: QueueStore) -> Self {
        self.queue = Some(queue);
        self
    }

    /// Use a specific sign-in navigator.
    pub fn navigator(mut self, navigator: Arc<dyn Navigator>) -> Self {
        self.navigator = Some(navigator);
        self
    }

    /// Add middleware to the default reqwest transport.
    pub fn middleware(mut self, middleware: Arc<dyn HttpMiddleware>) -> Self {
        self.middleware.add(middleware);
        self
    }

    /// Enable or disable the default [`HttpLoggingMiddleware`].
    pub fn log_requests(mut self, enabled: bool) -> Self {
        self.log_requests = enabled;
        self
    }

    /// Build the client.
    ///
    /// # Errors
    ///
    /// [`Error::Configuration`] for an invalid configuration or when no
    /// queue directory can be determined.
    pub fn build(self) -> Result<ApiClient> {
        self.config.validate()?;

        let transport: Arc<dyn Transport> = match self.transport {
            Some(transport) => transport,
            None => {
                let mut chain = self.middleware;
                if self.log_requests {
                    chain.add(Arc::new(HttpLoggingMiddleware::new()));
                }
                Arc::new(ReqwestTransport::new(&self.config)?.with_middleware(chain))
            },
        };
        let queue = match self.queue {
            Some(queue) => queue,
            None => QueueStore::new(FileBackend::new(self.config.resolved_queue_dir()?)),
        };
        let navigator = self
            .navigator
            .unwrap_or_else(|| Arc::new(LoggingNavigator));
        let coordinator =
            RefreshCoordinator::new(Arc::clone(&transport), self.config.refresh_path.clone());

        Ok(ApiClient {
            config: self.config,
            transport,
            coordinator,
            queue,
            navigator,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::memory::InMemoryBackend;
    use async_trait::async_trait;
    use navigator::RecordingNavigator;
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;

    /// Answers each call with the next scripted status; `None` is a dropped connection.
    struct Script {
        replies: Mutex<Vec<Option<(u16, &'static str)>>>,
        seen: Mutex<Vec<(Method, String, u32)>>,
        request_ids: Mutex<Vec<String>>,
    }

    impl Script {
        fn new(mut replies: Vec<Option<(u16, &'static str)>>) -> Arc<Self> {
            replies.reverse();
            Arc::new(Self {
                replies: Mutex::new(replies),
                seen: Mutex::new(Vec::new()),
                request_ids: Mutex::new(Vec::new()),
            })
        }

        fn seen(&self) -> Vec<(Method, String, u32)> {
            self.seen.lock().clone()
        }
    }

    #[async_trait]
    impl Transport for Script {
        async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
            self.seen
                .lock()
                .push((request.method, request.path.clone(), request.attempt));
            self.request_ids.lock().push(request.request_id.clone());
            match self.replies.lock().pop().flatten() {
                Some((status, body)) => Ok(HttpResponse::new(status, body.as_bytes().to_vec())),
                None => Err(Error::transport("connection refused")),
            }
        }
    }

    fn client(script: Arc<Script>) -> (ApiClient, Arc<RecordingNavigator>) {
        let navigator = Arc::new(RecordingNavigator::new());
        let client = ApiClient::builder(ClientConfig::new())
            .transport(script)
            .queue(QueueStore::new(InMemoryBackend::new()))
            .navigator(navigator.clone())
            .build()
            .unwrap();
        (client, navigator)
    }

    #[tokio::test]
    async fn retry_after_refresh_keeps_request_id() {
        let script = Script::new(vec![Some((401, "")), Some((200, "")), Some((204, ""))]);
        let (client, _) = client(script.clone());

        client.delete::<serde_json::Value>("/budgets/2").await.unwrap();

        let ids = script.request_ids.lock().clone();
        assert_eq!(ids.len(), 3);
        assert_eq!(ids[0], ids[2]);
        assert_ne!(ids[0], ids[1]);
    }

    #[tokio::test]
    async fn replay_is_correlated_by_record_id() {
        let script = Script::new(vec![Some((201, "{}"))]);
        let (client, _) = client(script.clone());
        let record = QueuedWrite {
            id: "queued-1".to_string(),
            method: WriteMethod::Post,
            path: "/transactions".to_string(),
            body: Some("{}".to_string()),
            enqueued_at: chrono::Utc::now(),
        };

        assert_eq!(client.replay(&record).await, ReplayOutcome::Delivered);
        assert_eq!(*script.request_ids.lock(), vec!["queued-1".to_string()]);
    }

    #[tokio::test]
    async fn success_decodes_payload() {
        let (client, _) = client(Script::new(vec![Some((200, r#"{"balance":42}"#))]));
        let response: ApiResponse<serde_json::Value> = client.get("/accounts/1").await.unwrap();
        assert_eq!(response.into_data().unwrap()["balance"], 42);
    }

    #[tokio::test]
    async fn unauthorized_refreshes_and_retries_once() {
        let script = Script::new(vec![
            Some((401, "")),
            Some((200, "")),
            Some((200, r#"[1,2]"#)),
        ]);
        let (client, navigator) = client(script.clone());

        let response: ApiResponse<Vec<u8>> = client.get("/budgets").await.unwrap();

        assert_eq!(response.into_data(), Some(vec![1, 2]));
        assert_eq!(
            script.seen(),
            vec![
                (Method::Get, "/budgets".to_string(), 0),
                (Method::Post, "/auth/refresh".to_string(), 0),
                (Method::Get, "/budgets".to_string(), 1),
            ]
        );
        assert!(navigator.redirects().is_empty());
    }

    #[tokio::test]
    async fn second_unauthorized_abandons() {
        let script = Script::new(vec![Some((401, "")), Some((200, "")), Some((401, ""))]);
        let (client, navigator) = client(script.clone());

        let response: ApiResponse<()> = client.get("/budgets").await.unwrap();

        assert!(response.is_abandoned());
        assert_eq!(navigator.redirects(), vec!["/login"]);
        assert_eq!(script.seen().len(), 3);
    }

    #[tokio::test]
    async fn refresh_path_unauthorized_is_unrecoverable() {
        let script = Script::new(vec![Some((401, ""))]);
        let (client, navigator) = client(script.clone());

        let response: ApiResponse<()> = client
            .request(Method::Post, "/auth/refresh", None)
            .await
            .unwrap();

        assert!(response.is_abandoned());
        assert_eq!(navigator.last().as_deref(), Some("/login"));
        assert_eq!(client.coordinator().renewal_count(), 0);
    }

    #[tokio::test]
    async fn offline_write_is_queued() {
        let (client, _) = client(Script::new(vec![None]));

        let response: ApiResponse<()> = client
            .request(Method::Delete, "/transactions/7", None)
            .await
            .unwrap();

        let ApiResponse::Queued { id } = response else {
            panic!("expected queued, got {:?}", response);
        };
        let records = client.queue().list_all().await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, id);
        assert_eq!(records[0].method, WriteMethod::Delete);
        assert_eq!(records[0].body, None);
    }

    #[tokio::test]
    async fn offline_read_fails() {
        let (client, _) = client(Script::new(vec![None]));
        let err = client.get::<()>("/accounts").await.unwrap_err();
        assert!(err.is_transport());
        assert_eq!(client.pending_writes().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn api_error_carries_detail() {
        let (client, _) = client(Script::new(vec![Some((
            404,
            r#"{"detail":"Account not found"}"#,
        ))]));
        let err = client.get::<()>("/accounts/9").await.unwrap_err();
        assert_eq!(err.to_string(), "Account not found");
        assert_eq!(err.status(), Some(404));
    }

    #[tokio::test]
    async fn upload_uses_upload_fallback_and_is_never_queued() {
        let (client, _) = client(Script::new(vec![Some((500, "<html>")), None]));
        let form = UploadForm::new().file("file", "r.jpg", "image/jpeg", vec![1, 2, 3]);

        let err = client
            .upload::<()>("/documents", form.clone())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Upload failed");

        let err = client.upload::<()>("/documents", form).await.unwrap_err();
        assert!(err.is_transport());
        assert_eq!(client.pending_writes().await.unwrap(), 0);
    }

    #[test]
    fn refresh_path_match_ignores_query() {
        let (client, _) = client(Script::new(vec![]));
        assert!(client.is_refresh_path("/auth/refresh"));
        assert!(client.is_refresh_path("/auth/refresh?next=/"));
        assert!(!client.is_refresh_path("/auth/refresh-tokens"));
    }
}
