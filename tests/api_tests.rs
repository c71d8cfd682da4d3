//! Router-level tests for the gateway endpoints, backed by a scripted upstream.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::util::ServiceExt;

use gemini_gateway::server::api::{build_router, AppState};
use gemini_gateway::upstream::mock::MockGenerator;
use gemini_gateway::upstream::UpstreamError;

fn app(generator: MockGenerator) -> Router {
    build_router(Arc::new(AppState::new(
        Arc::new(generator),
        Duration::from_secs(15),
    )))
}

fn post(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, String, Option<String>) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .map(|v| v.to_str().unwrap().to_string());
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, String::from_utf8(bytes.to_vec()).unwrap(), content_type)
}

async fn process(reply: &str) -> (StatusCode, Value) {
    let (status, body, _) = send(
        app(MockGenerator::replying(reply)),
        post("/process-text", r#"{"prompt": "give me json"}"#),
    )
    .await;
    (status, serde_json::from_str(&body).unwrap())
}

/// Parse an SSE body into the JSON payloads of its `data:` events.
fn sse_events(body: &str) -> Vec<Value> {
    body.split("\n\n")
        .filter_map(|frame| frame.strip_prefix("data: "))
        .map(|data| serde_json::from_str(data).unwrap())
        .collect()
}

#[tokio::test]
async fn test_health() {
    let request = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .unwrap();
    let (status, body, _) = send(app(MockGenerator::default()), request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(serde_json::from_str::<Value>(&body).unwrap(), json!({"status": "ok"}));
}

#[tokio::test]
async fn test_missing_prompt_is_rejected_on_both_paths() {
    for uri in ["/process-text", "/stream-text"] {
        for body in ["{}", r#"{"text": "hi"}"#, "not json", "", r#"{"prompt": ""}"#] {
            let (status, response, _) =
                send(app(MockGenerator::replying("unused")), post(uri, body)).await;

            assert_eq!(status, StatusCode::BAD_REQUEST, "{uri} with {body:?}");
            assert_eq!(
                serde_json::from_str::<Value>(&response).unwrap(),
                json!({"error": "Missing prompt parameter"})
            );
        }
    }
}

#[tokio::test]
async fn test_non_string_prompt_is_server_error() {
    let (status, body, _) = send(
        app(MockGenerator::replying("unused")),
        post("/process-text", r#"{"prompt": 7}"#),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        serde_json::from_str::<Value>(&body).unwrap(),
        json!({"error": "prompt must be a string"})
    );
}

#[tokio::test]
async fn test_process_text_tagged_fence() {
    let (status, body) = process("```json\n{\"a\":1}\n```").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"a": 1}));
}

#[tokio::test]
async fn test_process_text_generic_fence() {
    let (status, body) = process("```\n{\"a\":1}\n```").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"a": 1}));
}

#[tokio::test]
async fn test_process_text_bare_json() {
    let (status, body) = process("{\"a\":1}").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"a": 1}));
}

#[tokio::test]
async fn test_process_text_plain_text() {
    let (status, body) = process("hello world").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"mode": "plain_text", "content": "hello world"}));
}

#[tokio::test]
async fn test_process_text_unclosed_fence_is_plain_text() {
    let raw = "```json\n{\"a\":1}";
    let (status, body) = process(raw).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"mode": "plain_text", "content": raw}));
}

#[tokio::test]
async fn test_process_text_upstream_failure() {
    let generator = MockGenerator::failing(UpstreamError::RateLimited(
        "Resource has been exhausted".to_string(),
    ));
    let (status, body, _) = send(
        app(generator),
        post("/process-text", r#"{"prompt": "hi"}"#),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        serde_json::from_str::<Value>(&body).unwrap(),
        json!({"error": "Rate limited by Gemini API: Resource has been exhausted"})
    );
}

#[tokio::test]
async fn test_stream_text_events() {
    let (status, body, content_type) = send(
        app(MockGenerator::streaming(["Hel", "lo"])),
        post("/stream-text", r#"{"prompt": "greet"}"#),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert!(content_type.unwrap().starts_with("text/event-stream"));
    assert_eq!(
        sse_events(&body),
        vec![
            json!({"chunk": "Hel", "buffer": "Hel"}),
            json!({"chunk": "lo", "buffer": "Hello"}),
            json!({"complete": true, "final_text": "Hello"}),
        ]
    );
}

#[tokio::test]
async fn test_stream_text_skips_empty_fragments() {
    let (_, body, _) = send(
        app(MockGenerator::streaming(["", "a", "", "b", ""])),
        post("/stream-text", r#"{"prompt": "x"}"#),
    )
    .await;

    assert_eq!(
        sse_events(&body),
        vec![
            json!({"chunk": "a", "buffer": "a"}),
            json!({"chunk": "b", "buffer": "ab"}),
            json!({"complete": true, "final_text": "ab"}),
        ]
    );
}

#[tokio::test]
async fn test_stream_text_failure_before_first_fragment() {
    let generator = MockGenerator::streaming([""]).then_fail(UpstreamError::Network(
        "connection refused".to_string(),
    ));
    let (status, body, content_type) = send(
        app(generator),
        post("/stream-text", r#"{"prompt": "x"}"#),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(content_type.as_deref(), Some("application/json"));
    assert_eq!(
        serde_json::from_str::<Value>(&body).unwrap(),
        json!({"error": "Network error: connection refused"})
    );
}

#[tokio::test]
async fn test_stream_text_failure_on_open() {
    let generator = MockGenerator::failing(UpstreamError::Api {
        status: 400,
        message: "API key not valid.".to_string(),
    });
    let (status, body, _) = send(
        app(generator),
        post("/stream-text", r#"{"prompt": "x"}"#),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        serde_json::from_str::<Value>(&body).unwrap(),
        json!({"error": "Gemini API error 400: API key not valid."})
    );
}

#[tokio::test]
async fn test_stream_text_failure_mid_stream() {
    let generator = MockGenerator::streaming(["partial"])
        .then_fail(UpstreamError::Network("connection reset".to_string()));
    let (status, body, _) = send(
        app(generator),
        post("/stream-text", r#"{"prompt": "x"}"#),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        sse_events(&body),
        vec![
            json!({"chunk": "partial", "buffer": "partial"}),
            json!({"error": "Network error: connection reset"}),
        ]
    );
}

#[tokio::test]
async fn test_oversized_body_gets_json_error() {
    let prompt = "a".repeat(4096);
    for uri in ["/process-text", "/stream-text"] {
        let app = build_router(Arc::new(
            AppState::new(
                Arc::new(MockGenerator::replying("unused")),
                Duration::from_secs(15),
            )
            .with_body_limit(1024),
        ));
        let (status, body, content_type) =
            send(app, post(uri, &json!({ "prompt": prompt }).to_string())).await;

        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE, "{uri}");
        assert_eq!(content_type.as_deref(), Some("application/json"));
        let body: Value = serde_json::from_str(&body).unwrap();
        assert!(body["error"].as_str().unwrap().contains("length limit exceeded"));
    }
}

#[tokio::test]
async fn test_large_prompt_accepted_by_default() {
    let prompt = "a".repeat(3 * 1024 * 1024);
    let (status, body, _) = send(
        app(MockGenerator::replying("{\"ok\": true}")),
        post("/process-text", &json!({ "prompt": prompt }).to_string()),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(serde_json::from_str::<Value>(&body).unwrap(), json!({"ok": true}));
}
