//! Scripted in-process API used by the integration tests.
//!
//! Models a cookie-session server: every call fails with 401 while the
//! session is expired, the refresh endpoint renews it after a configurable
//! delay, and the whole API can be taken offline.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use fintrack_client::client::http_middleware::{HttpRequest, HttpResponse, RequestBody};
use fintrack_client::{
    ApiClient, ClientConfig, Error, InMemoryBackend, Method, QueueStore, RecordingNavigator,
    Result, Transport,
};
use parking_lot::Mutex;

pub const REFRESH_PATH: &str = "/auth/refresh";

/// One call as seen by the fake server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub method: Method,
    pub path: String,
    pub body: Option<String>,
    pub attempt: u32,
}

/// Scripted reply for a resource path.
#[derive(Debug, Clone)]
pub enum Reply {
    Status(u16, String),
    Drop,
}

impl Reply {
    pub fn status(status: u16) -> Self {
        Self::Status(status, String::new())
    }

    pub fn json(status: u16, body: &str) -> Self {
        Self::Status(status, body.to_string())
    }
}

#[derive(Debug)]
struct State {
    session_valid: bool,
    online: bool,
    refresh_status: u16,
    replies: HashMap<String, VecDeque<Reply>>,
    calls: Vec<Call>,
}

#[derive(Debug)]
pub struct FakeApi {
    state: Mutex<State>,
    refresh_delay: Duration,
}

impl FakeApi {
    pub fn new() -> Arc<Self> {
        Self::with_refresh_delay(Duration::ZERO)
    }

    pub fn with_refresh_delay(refresh_delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(State {
                session_valid: true,
                online: true,
                refresh_status: 200,
                replies: HashMap::new(),
                calls: Vec::new(),
            }),
            refresh_delay,
        })
    }

    pub fn expire_session(&self) {
        self.state.lock().session_valid = false;
    }

    pub fn set_online(&self, online: bool) {
        self.state.lock().online = online;
    }

    pub fn set_refresh_status(&self, status: u16) {
        self.state.lock().refresh_status = status;
    }

    /// Queue a one-shot reply for `path`, used before the default behaviour.
    pub fn push_reply(&self, path: &str, reply: Reply) {
        self.state
            .lock()
            .replies
            .entry(path.to_string())
            .or_default()
            .push_back(reply);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().calls.clone()
    }

    pub fn paths(&self) -> Vec<String> {
        self.calls().into_iter().map(|c| c.path).collect()
    }

    pub fn calls_to(&self, path: &str) -> usize {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|c| c.path == path)
            .count()
    }

    pub fn refresh_calls(&self) -> usize {
        self.calls_to(REFRESH_PATH)
    }

    fn default_reply(method: Method, path: &str) -> HttpResponse {
        match method {
            Method::Get => HttpResponse::new(200, format!(r#"{{"path":"{}"}}"#, path).into_bytes()),
            Method::Delete => HttpResponse::new(204, Vec::new()),
            _ => HttpResponse::new(201, br#"{"ok":true}"#.to_vec()),
        }
    }
}

#[async_trait]
impl Transport for FakeApi {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        let body = match &request.body {
            RequestBody::Json(json) => Some(json.clone()),
            _ => None,
        };
        {
            let mut state = self.state.lock();
            state.calls.push(Call {
                method: request.method,
                path: request.path.clone(),
                body,
                attempt: request.attempt,
            });
            if !state.online {
                return Err(Error::transport("network unreachable"));
            }
        }

        if request.path == REFRESH_PATH {
            tokio::time::sleep(self.refresh_delay).await;
            let mut state = self.state.lock();
            let scripted = state
                .replies
                .get_mut(REFRESH_PATH)
                .and_then(VecDeque::pop_front);
            if let Some(Reply::Drop) = scripted {
                return Err(Error::transport("connection reset"));
            }
            let status = state.refresh_status;
            if (200..300).contains(&status) {
                state.session_valid = true;
            }
            return Ok(HttpResponse::new(status, Vec::new()));
        }

        let mut state = self.state.lock();
        if !state.session_valid {
            return Ok(HttpResponse::new(
                401,
                br#"{"detail":"Not authenticated"}"#.to_vec(),
            ));
        }
        let scripted = state
            .replies
            .get_mut(&request.path)
            .and_then(VecDeque::pop_front);
        match scripted {
            Some(Reply::Status(status, body)) => Ok(HttpResponse::new(status, body.into_bytes())),
            Some(Reply::Drop) => Err(Error::transport("connection reset")),
            None => Ok(Self::default_reply(request.method, &request.path)),
        }
    }
}

/// Client over `api` with an in-memory queue and a recording navigator.
pub fn client_for(api: &Arc<FakeApi>) -> (Arc<ApiClient>, Arc<RecordingNavigator>) {
    client_with_queue(api, QueueStore::new(InMemoryBackend::new()))
}

pub fn client_with_queue(
    api: &Arc<FakeApi>,
    queue: QueueStore,
) -> (Arc<ApiClient>, Arc<RecordingNavigator>) {
    let navigator = Arc::new(RecordingNavigator::new());
    let client = ApiClient::builder(ClientConfig::new())
        .transport(api.clone())
        .queue(queue)
        .navigator(navigator.clone())
        .build()
        .expect("client builds");
    (Arc::new(client), navigator)
}
