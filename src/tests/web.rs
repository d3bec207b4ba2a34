use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use super::fakes::{test_app, test_app_with, test_config, FakeEmbedder, FakeLlm, TestApp};
use crate::web::router;

async fn send(t: &TestApp, request: Request<Body>) -> (StatusCode, Value) {
    let response = router(t.app.clone()).oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn empty_request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

const BOUNDARY: &str = "lectern-test-boundary";

/// `(name, filename, content)`; a filename marks a file part.
fn multipart_request(uri: &str, parts: &[(&str, Option<&str>, &[u8])]) -> Request<Body> {
    let mut body = Vec::new();
    for (name, filename, content) in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match filename {
            Some(filename) => body.extend_from_slice(
                format!(
                    "Content-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\n\
                     Content-Type: application/octet-stream\r\n\r\n"
                )
                .as_bytes(),
            ),
            None => body.extend_from_slice(
                format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
            ),
        }
        body.extend_from_slice(content);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

async fn create(t: &TestApp, body: Value) -> String {
    let (status, created) = send(t, json_request("POST", "/api/sessions", body)).await;
    assert_eq!(status, StatusCode::OK);
    created["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_create_and_list_sessions() {
    let t = test_app(FakeEmbedder::new(2), FakeLlm::replying("ok"));

    let (status, created) = send(
        &t,
        json_request("POST", "/api/sessions", json!({"name": "Graphs", "className": "CS201"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(created["name"], "Graphs");
    assert_eq!(created["className"], "CS201");

    let (status, defaults) = send(&t, json_request("POST", "/api/sessions", json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(defaults["name"], "Untitled Session");
    assert_eq!(defaults["className"], "General");

    let (status, list) = send(&t, empty_request("GET", "/api/sessions")).await;
    assert_eq!(status, StatusCode::OK);
    let list = list.as_array().unwrap();
    assert_eq!(list.len(), 2);
    assert!(list.iter().all(|s| s["transcriptCount"] == 0));
}

#[tokio::test]
async fn test_missing_session_is_404() {
    let t = test_app(FakeEmbedder::new(2), FakeLlm::replying("ok"));

    let (status, body) = send(&t, empty_request("GET", "/api/sessions/nope")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("nope"));

    let (status, _) = send(
        &t,
        json_request("POST", "/api/sessions/nope/recording", json!({"isRecording": true})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_recording_toggle_and_delete() {
    let t = test_app(FakeEmbedder::new(2), FakeLlm::replying("ok"));
    let id = create(&t, json!({})).await;

    let (status, body) = send(
        &t,
        json_request(
            "POST",
            &format!("/api/sessions/{id}/recording"),
            json!({"isRecording": true}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);

    let (_, detail) = send(&t, empty_request("GET", &format!("/api/sessions/{id}"))).await;
    assert_eq!(detail["isRecording"], true);
    assert_eq!(detail["noteFiles"], json!([]));

    for _ in 0..2 {
        let (status, body) =
            send(&t, empty_request("DELETE", &format!("/api/sessions/{id}"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ok"], true);
    }

    let (status, _) = send(&t, empty_request("GET", &format!("/api/sessions/{id}"))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_chat_round_trip() {
    let t = test_app(FakeEmbedder::new(2), FakeLlm::replying("Dijkstra needs non-negative weights."));
    let id = create(&t, json!({})).await;

    let (status, reply) = send(
        &t,
        json_request(
            "POST",
            "/api/chat",
            json!({"sessionId": id, "message": "when does dijkstra fail?"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(reply["role"], "assistant");
    assert_eq!(reply["content"], "Dijkstra needs non-negative weights.");

    let (_, detail) = send(&t, empty_request("GET", &format!("/api/sessions/{id}"))).await;
    let messages = detail["chatMessages"].as_array().unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0]["role"], "user");
    assert_eq!(messages[1]["id"], reply["id"]);
}

#[tokio::test]
async fn test_chat_missing_fields_is_400() {
    let t = test_app(FakeEmbedder::new(2), FakeLlm::replying("ok"));

    let (status, body) = send(&t, json_request("POST", "/api/chat", json!({"sessionId": "x"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_chat_upstream_failure_is_502() {
    let t = test_app(FakeEmbedder::new(2).failing(), FakeLlm::replying("ok"));
    let id = create(&t, json!({})).await;

    let (status, body) = send(
        &t,
        json_request("POST", "/api/chat", json!({"sessionId": id, "message": "hi"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(body["error"].as_str().unwrap().starts_with("embedding service failed"));
}

#[tokio::test]
async fn test_upload_document() {
    let t = test_app(FakeEmbedder::new(2), FakeLlm::replying("ok"));
    let id = create(&t, json!({})).await;

    let text = (0..20).map(|i| format!("w{i}")).collect::<Vec<_>>().join(" ");
    let (status, report) = send(
        &t,
        multipart_request(
            "/api/upload",
            &[
                ("sessionId", None, id.as_bytes()),
                ("file", Some("week1.md"), text.as_bytes()),
            ],
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["filename"], "week1.md");
    assert_eq!(report["chunks"], 3);
    assert_eq!(report["message"], "Uploaded and indexed 3 chunks from week1.md");

    let (_, detail) = send(&t, empty_request("GET", &format!("/api/sessions/{id}"))).await;
    assert_eq!(detail["noteFiles"], json!(["week1.md"]));
}

#[tokio::test]
async fn test_upload_without_file_is_400() {
    let t = test_app(FakeEmbedder::new(2), FakeLlm::replying("ok"));
    let id = create(&t, json!({})).await;

    let (status, _) = send(
        &t,
        multipart_request("/api/upload", &[("sessionId", None, id.as_bytes())]),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_transcribe_audio() {
    let t = test_app_with(
        &test_config(),
        FakeEmbedder::new(2),
        FakeLlm::replying("ok"),
        "heaps are complete binary trees",
    );
    let id = create(&t, json!({})).await;

    let (status, body) = send(
        &t,
        multipart_request(
            "/api/transcribe",
            &[
                ("audio", Some("chunk.webm"), &[1u8, 2, 3, 4][..]),
                ("sessionId", None, id.as_bytes()),
                ("timestamp", None, &b"not-a-number"[..]),
            ],
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["text"], "heaps are complete binary trees");
    assert_eq!(body["timestamp"], 0.0);
    assert!(body["id"].is_string());
}

#[tokio::test]
async fn test_transcribe_silence() {
    let t = test_app(FakeEmbedder::new(2), FakeLlm::replying("ok"));
    let id = create(&t, json!({})).await;

    let (status, body) = send(
        &t,
        multipart_request(
            "/api/transcribe",
            &[
                ("audio", Some("chunk.webm"), &[0u8, 0][..]),
                ("sessionId", None, id.as_bytes()),
                ("timestamp", None, &b"12.5"[..]),
            ],
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"text": "", "id": null}));
}

#[tokio::test]
async fn test_transcribe_empty_audio() {
    let t = test_app_with(
        &test_config(),
        FakeEmbedder::new(2),
        FakeLlm::replying("ok"),
        "never heard",
    );
    let id = create(&t, json!({})).await;

    let (status, body) = send(
        &t,
        multipart_request(
            "/api/transcribe",
            &[
                ("audio", Some("chunk.webm"), &b""[..]),
                ("sessionId", None, id.as_bytes()),
                ("timestamp", None, &b"3"[..]),
            ],
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"text": "", "id": null}));
}
