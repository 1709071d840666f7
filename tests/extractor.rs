//! Gemini extractor against a mock inference service.

use std::time::Duration;

use cardkeep::config::ExtractorConfig;
use cardkeep::extractor::{ExtractionError, FieldExtractor, GeminiExtractor};
use cardkeep_core::models::Rotation;
use cardkeep_core::reply::ReplyError;
use serde_json::{json, Value};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const GENERATE_PATH: &str = "/v1beta/models/gemini-2.5-flash:generateContent";

fn config(server: &MockServer) -> ExtractorConfig {
    ExtractorConfig {
        provider: "gemini".to_string(),
        base_url: server.uri(),
        timeout_secs: 1,
        ..Default::default()
    }
}

fn reply(text: &str) -> Value {
    json!({
        "candidates": [{
            "content": { "role": "model", "parts": [ { "text": text } ] },
            "finishReason": "STOP"
        }]
    })
}

#[tokio::test]
async fn test_extracts_fenced_reply() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .and(header("x-goog-api-key", "test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(reply(
            "```json\n{\"suggested_rotation\": 90, \"name\": \"王小明\", \"company\": \"Acme\", \
             \"phone\": \"+886 2 1234 5678\", \"email\": \"ming@acme.tw\"}\n```",
        )))
        .expect(1)
        .mount(&server)
        .await;

    let extractor = GeminiExtractor::with_api_key(&config(&server), "test-key").unwrap();
    let fields = extractor.extract(&[0xFF, 0xD8, 0xFF, 0xE0]).await.unwrap();

    assert_eq!(fields.name, "王小明");
    assert_eq!(fields.company, "Acme");
    assert_eq!(fields.email, "ming@acme.tw");
    assert_eq!(fields.title, "");
    assert_eq!(fields.suggested_rotation, Rotation::Quarter);
}

#[tokio::test]
async fn test_request_carries_prompt_and_inline_image() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(reply("{\"name\": \"Jane\"}")))
        .mount(&server)
        .await;

    let extractor = GeminiExtractor::with_api_key(&config(&server), "k").unwrap();
    extractor.extract(&[0xFF, 0xD8, 0xFF, 0xE0]).await.unwrap();

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    let body: Value = serde_json::from_slice(&requests[0].body).unwrap();
    let parts = &body["contents"][0]["parts"];
    assert!(parts[0]["text"]
        .as_str()
        .unwrap()
        .contains("suggested_rotation"));
    assert_eq!(parts[1]["inline_data"]["mime_type"], "image/jpeg");
    assert_eq!(parts[1]["inline_data"]["data"], "/9j/4A==");
}

#[tokio::test]
async fn test_service_error_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream exploded"))
        .expect(1)
        .mount(&server)
        .await;

    let extractor = GeminiExtractor::with_api_key(&config(&server), "k").unwrap();
    match extractor.extract(b"img").await {
        Err(ExtractionError::Service { status, body }) => {
            assert_eq!(status, 500);
            assert!(body.contains("upstream exploded"));
        }
        other => panic!("expected service error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_malformed_reply() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(reply("Sorry, I cannot read this card.")),
        )
        .mount(&server)
        .await;

    let extractor = GeminiExtractor::with_api_key(&config(&server), "k").unwrap();
    assert!(matches!(
        extractor.extract(b"img").await,
        Err(ExtractionError::Reply(ReplyError::Json(_)))
    ));
}

#[tokio::test]
async fn test_reply_without_name() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(reply("{\"name\": \"  \", \"company\": \"Acme\"}")),
        )
        .mount(&server)
        .await;

    let extractor = GeminiExtractor::with_api_key(&config(&server), "k").unwrap();
    assert!(matches!(
        extractor.extract(b"img").await,
        Err(ExtractionError::Reply(ReplyError::MissingName))
    ));
}

#[tokio::test]
async fn test_blocked_reply_has_no_text() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "promptFeedback": { "blockReason": "SAFETY" } })),
        )
        .mount(&server)
        .await;

    let extractor = GeminiExtractor::with_api_key(&config(&server), "k").unwrap();
    assert!(matches!(
        extractor.extract(b"img").await,
        Err(ExtractionError::EmptyResponse)
    ));
}

#[tokio::test]
async fn test_slow_service_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(reply("{\"name\": \"Late\"}"))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let extractor = GeminiExtractor::with_api_key(&config(&server), "k").unwrap();
    assert!(matches!(
        extractor.extract(b"img").await,
        Err(ExtractionError::Timeout)
    ));
}

#[test]
fn test_missing_api_key_env() {
    let config = ExtractorConfig {
        provider: "gemini".to_string(),
        api_key_env: "CARDKEEP_TEST_KEY_THAT_IS_NEVER_SET".to_string(),
        ..Default::default()
    };
    assert!(matches!(
        GeminiExtractor::new(&config),
        Err(ExtractionError::Config(_))
    ));
}
