//! Upload, session, and health endpoint integration tests
//!
//! Exercises the non-streaming `ApiClient` calls against a `wiremock` server.

use serde_json::json;
use wiremock::matchers::{header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use docchat::client::ApiClient;
use docchat::DocChatError;

mod common;
use common::config_for;

fn client_for(server: &MockServer) -> ApiClient {
    ApiClient::new(&config_for(&server.uri()).api).expect("client")
}

fn write_pdf(dir: &tempfile::TempDir, name: &str) -> std::path::PathBuf {
    let file = dir.path().join(name);
    std::fs::write(&file, b"%PDF-1.4\n%test\n").expect("write pdf");
    file
}

#[tokio::test]
async fn test_upload_returns_session() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/upload"))
        .and(header_exists("content-type"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "session_id": "abc",
            "status": "success",
            "filename": "report.pdf",
            "chunk_count": 12,
            "processing_time": 0.8
        })))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().expect("tempdir");
    let file = write_pdf(&dir, "report.pdf");

    let upload = client_for(&server)
        .upload_document(&file)
        .await
        .expect("upload");

    assert_eq!(upload.session_id, "abc");
    assert_eq!(upload.filename, "report.pdf");
    assert_eq!(upload.chunk_count, 12);

    let requests = server.received_requests().await.expect("recorded requests");
    let body = String::from_utf8_lossy(&requests[0].body);
    assert!(body.contains("name=\"file\""));
    assert!(body.contains("filename=\"report.pdf\""));
}

#[tokio::test]
async fn test_upload_error_uses_detail() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/upload"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "detail": "Only PDF files are allowed"
        })))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().expect("tempdir");
    let file = write_pdf(&dir, "scan.PDF");

    let err = client_for(&server)
        .upload_document(&file)
        .await
        .expect_err("server rejects");
    match err.downcast_ref::<DocChatError>() {
        Some(DocChatError::Server { status, message }) => {
            assert_eq!(*status, 400);
            assert_eq!(message, "Only PDF files are allowed");
        }
        other => panic!("Expected Server error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_upload_missing_file_fails_without_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().expect("tempdir");
    let missing = dir.path().join("missing.pdf");
    assert!(client_for(&server).upload_document(&missing).await.is_err());
}

#[tokio::test]
async fn test_list_sessions_accepts_wrapped_objects() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/sessions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "sessions": [
                {"session_id": "abc", "filename": "a.pdf", "chunk_count": 3},
                "def"
            ]
        })))
        .mount(&server)
        .await;

    let sessions = client_for(&server).list_sessions().await.expect("list");
    assert_eq!(sessions.len(), 2);
    assert_eq!(sessions[0].filename.as_deref(), Some("a.pdf"));
    assert_eq!(sessions[0].chunk_count, Some(3));
    assert_eq!(sessions[1].session_id, "def");
    assert!(sessions[1].filename.is_none());
}

#[tokio::test]
async fn test_delete_session_hits_session_path() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/sessions/abc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "deleted"})))
        .expect(1)
        .mount(&server)
        .await;

    client_for(&server)
        .delete_session("abc")
        .await
        .expect("delete");
}

#[tokio::test]
async fn test_delete_unknown_session_reports_detail() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/sessions/nope"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "detail": "Session not found"
        })))
        .mount(&server)
        .await;

    let err = client_for(&server)
        .delete_session("nope")
        .await
        .expect_err("404");
    assert_eq!(err.to_string(), "Session not found");
}

#[tokio::test]
async fn test_health_reports_server_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "healthy",
            "model": "llama3"
        })))
        .mount(&server)
        .await;

    let status = client_for(&server).health().await;
    assert!(status.is_healthy());
    assert_eq!(status.details["model"], "llama3");
}

#[tokio::test]
async fn test_health_failure_is_unhealthy() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let status = client_for(&server).health().await;
    assert_eq!(status.status, "unhealthy");
    assert!(!status.is_healthy());
}
