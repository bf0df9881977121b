//! `ReqwestTransport` against a local HTTP server.
//!
//! Tests:
//! - Headers and bodies on the wire
//! - Statuses are responses, refused connections are transport errors
//! - Session cookies set by the refresh endpoint are carried on the retry
//! - Offline writes land in the file-backed queue
//! - A body cut off after the status line is an error, not an offline write
//! - A base URL path prefix is kept

use std::sync::Arc;

use fintrack_client::client::http_middleware::{HttpRequest, RequestBody};
use fintrack_client::{
    ApiClient, ApiResponse, ClientConfig, Error, InMemoryBackend, Method, QueueStore,
    RecordingNavigator, ReqwestTransport, Transport, UploadForm,
};
use mockito::Matcher;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

/// Nothing listens on port 1.
const UNREACHABLE: &str = "http://127.0.0.1:1";

fn transport_for(url: &str) -> ReqwestTransport {
    ReqwestTransport::new(&ClientConfig::new().with_base_url(url).with_timeout(2_000)).unwrap()
}

#[tokio::test]
async fn json_body_is_sent_with_content_type() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/transactions")
        .match_header("content-type", "application/json")
        .match_body(Matcher::Json(json!({"amount": "12.00"})))
        .with_status(201)
        .with_header("content-type", "application/json")
        .with_body(r#"{"id":77}"#)
        .create_async()
        .await;

    let response = transport_for(&server.url())
        .send(HttpRequest::new(
            Method::Post,
            "/transactions",
            RequestBody::Json(r#"{"amount":"12.00"}"#.to_string()),
        ))
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(response.status, 201);
    assert_eq!(response.body, br#"{"id":77}"#.to_vec());
    assert_eq!(
        response.get_header("Content-Type").map(String::as_str),
        Some("application/json")
    );
}

#[tokio::test]
async fn bodyless_request_has_no_content_type() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("DELETE", "/budgets/3")
        .match_header("content-type", Matcher::Missing)
        .with_status(204)
        .create_async()
        .await;

    let response = transport_for(&server.url())
        .send(HttpRequest::new(Method::Delete, "/budgets/3", RequestBody::None))
        .await
        .unwrap();

    mock.assert_async().await;
    assert!(response.is_empty());
}

#[tokio::test]
async fn configured_headers_are_sent() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/accounts")
        .match_header("x-client", "fintrack-cli")
        .with_status(200)
        .with_body("[]")
        .create_async()
        .await;

    let config = ClientConfig::new()
        .with_base_url(server.url())
        .with_header("X-Client", "fintrack-cli");
    ReqwestTransport::new(&config)
        .unwrap()
        .send(HttpRequest::new(Method::Get, "/accounts", RequestBody::None))
        .await
        .unwrap();

    mock.assert_async().await;
}

#[tokio::test]
async fn server_error_is_a_response() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/reports")
        .with_status(503)
        .create_async()
        .await;

    let response = transport_for(&server.url())
        .send(HttpRequest::new(Method::Get, "/reports", RequestBody::None))
        .await
        .unwrap();
    assert_eq!(response.status, 503);
}

#[tokio::test]
async fn refused_connection_is_transport_error() {
    let err = transport_for(UNREACHABLE)
        .send(HttpRequest::new(Method::Get, "/accounts", RequestBody::None))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Transport(_)), "got {:?}", err);
}

#[tokio::test]
async fn upload_is_sent_as_multipart() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/documents/scan")
        .match_header(
            "content-type",
            Matcher::Regex("^multipart/form-data; boundary=".to_string()),
        )
        .match_body(Matcher::Regex("receipt.png".to_string()))
        .with_status(201)
        .with_body(r#"{"document_id":5}"#)
        .create_async()
        .await;

    let client = ApiClient::builder(ClientConfig::new().with_base_url(server.url()))
        .queue(QueueStore::new(InMemoryBackend::new()))
        .build()
        .unwrap();
    let form = UploadForm::new().file("file", "receipt.png", "image/png", b"fake-png-bytes".to_vec());
    let response = client.upload::<Value>("/documents/scan", form).await.unwrap();

    mock.assert_async().await;
    assert_eq!(response.into_data().unwrap()["document_id"], 5);
}

#[tokio::test]
async fn renewed_session_cookie_is_used_on_retry() {
    let mut server = mockito::Server::new_async().await;
    let expired = server
        .mock("GET", "/accounts")
        .match_header("cookie", Matcher::Missing)
        .with_status(401)
        .with_body(r#"{"detail":"Not authenticated"}"#)
        .expect(1)
        .create_async()
        .await;
    let refresh = server
        .mock("POST", "/auth/refresh")
        .with_status(200)
        .with_header("set-cookie", "session=renewed; Path=/; HttpOnly")
        .expect(1)
        .create_async()
        .await;
    let renewed = server
        .mock("GET", "/accounts")
        .match_header("cookie", "session=renewed")
        .with_status(200)
        .with_body(r#"[{"id":1,"name":"Checking"}]"#)
        .expect(1)
        .create_async()
        .await;

    let navigator = Arc::new(RecordingNavigator::new());
    let client = ApiClient::builder(ClientConfig::new().with_base_url(server.url()))
        .queue(QueueStore::new(InMemoryBackend::new()))
        .navigator(navigator.clone())
        .build()
        .unwrap();

    let response = client.get::<Value>("/accounts").await.unwrap();

    expired.assert_async().await;
    refresh.assert_async().await;
    renewed.assert_async().await;
    assert_eq!(response.into_data().unwrap()[0]["name"], "Checking");
    assert!(navigator.redirects().is_empty());
}

#[tokio::test]
async fn offline_write_is_persisted_to_disk() {
    let dir = tempfile::tempdir().unwrap();
    let config = ClientConfig::new()
        .with_base_url(UNREACHABLE)
        .with_queue_dir(dir.path());
    let client = ApiClient::new(config).unwrap();

    let response = client
        .post::<Value, _>("/transactions", &json!({"amount": "3.50"}))
        .await
        .unwrap();

    let ApiResponse::Queued { id } = response else {
        panic!("expected queued, got {:?}", response);
    };
    assert!(dir.path().join(format!("{}.json", id)).is_file());
    assert_eq!(client.pending_writes().await.unwrap(), 1);
}

/// Serve one connection: read the request head, send a status line and a
/// body shorter than its declared length, then hang up.
async fn truncating_server() -> String {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut head = Vec::new();
        let mut buf = [0u8; 1024];
        while !head.windows(4).any(|w| w == b"\r\n\r\n") {
            let n = socket.read(&mut buf).await.unwrap();
            if n == 0 {
                return;
            }
            head.extend_from_slice(&buf[..n]);
        }
        socket
            .write_all(b"HTTP/1.1 200 OK\r\ncontent-length: 100\r\n\r\n{\"ok\"")
            .await
            .unwrap();
        let _ = socket.shutdown().await;
    });
    format!("http://{}", addr)
}

#[tokio::test]
async fn cut_off_response_body_is_not_queued() {
    let url = truncating_server().await;
    let client = ApiClient::builder(ClientConfig::new().with_base_url(url))
        .queue(QueueStore::new(InMemoryBackend::new()))
        .build()
        .unwrap();

    let err = client.delete::<Value>("/budgets/3").await.unwrap_err();

    assert!(
        matches!(err, Error::IncompleteResponse { status: 200, .. }),
        "got {:?}",
        err
    );
    assert!(!err.is_transport());
    assert_eq!(client.pending_writes().await.unwrap(), 0);
}

#[tokio::test]
async fn base_url_path_prefix_is_kept() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/api/transactions")
        .with_status(201)
        .with_body(r#"{"id":1}"#)
        .create_async()
        .await;

    let config = ClientConfig::new().with_base_url(format!("{}/api", server.url()));
    let client = ApiClient::builder(config)
        .queue(QueueStore::new(InMemoryBackend::new()))
        .build()
        .unwrap();
    let response = client
        .post::<Value, _>("/transactions", &json!({"amount": "1.00"}))
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(response.into_data().unwrap()["id"], 1);
}
