//! # AI Provider Tests
//!
//! Wire format and error handling of the Gemini and OpenAI-compatible providers.

mod common;

use askdb::providers::ai::{gemini::GeminiProvider, local::LocalAiProvider, AiProvider};
use askdb::providers::factory::create_ai_provider;
use askdb::{AiProviderConfig, AskError};
use common::setup_tracing;
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::test]
async fn test_gemini_sends_prompts_and_joins_parts() {
    setup_tracing();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/test:generateContent"))
        .and(query_param("key", "gemini-key"))
        .and(body_partial_json(json!({
            "systemInstruction": {"parts": [{"text": "system"}]},
            "contents": [{"parts": [{"text": "user"}]}]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{
                "content": {"parts": [{"text": "SELECT "}, {"text": "1"}]}
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let provider = GeminiProvider::new(
        format!("{}/v1beta/models/test:generateContent", server.uri()),
        "gemini-key".to_string(),
        TIMEOUT,
    )
    .unwrap();

    assert_eq!(provider.generate("system", "user").await.unwrap(), "SELECT 1");
}

#[tokio::test]
async fn test_gemini_error_message_is_extracted() {
    setup_tracing();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429).set_body_json(json!({
            "error": {"code": 429, "message": "Quota exceeded", "status": "RESOURCE_EXHAUSTED"}
        })))
        .mount(&server)
        .await;

    let provider = GeminiProvider::new(server.uri(), "k".to_string(), TIMEOUT).unwrap();
    let err = provider.generate("s", "u").await.unwrap_err();

    assert!(matches!(err, AskError::AiApi(ref m) if m == "Quota exceeded"), "{err:?}");
}

#[tokio::test]
async fn test_local_provider_uses_chat_completions() {
    setup_tracing();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer local-key"))
        .and(body_partial_json(json!({
            "model": "sql-coder",
            "temperature": 0.0,
            "stream": false,
            "messages": [
                {"role": "system", "content": "system"},
                {"role": "user", "content": "user"}
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"role": "assistant", "content": "SELECT 2"}}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let provider = create_ai_provider(
        &AiProviderConfig {
            provider: "local".to_string(),
            api_url: Some(format!("{}/v1/chat/completions", server.uri())),
            api_key: Some("local-key".to_string()),
            model_name: "sql-coder".to_string(),
        },
        TIMEOUT,
    )
    .unwrap();

    assert_eq!(provider.generate("system", "user").await.unwrap(), "SELECT 2");
}

#[tokio::test]
async fn test_local_provider_without_choices_returns_empty_text() {
    setup_tracing();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
        .mount(&server)
        .await;

    let provider = LocalAiProvider::new(server.uri(), None, None, TIMEOUT).unwrap();

    assert_eq!(provider.generate("s", "u").await.unwrap(), "");
}

#[tokio::test]
async fn test_local_provider_plain_text_error() {
    setup_tracing();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503).set_body_string("model is loading\n"))
        .mount(&server)
        .await;

    let provider = LocalAiProvider::new(server.uri(), None, None, TIMEOUT).unwrap();
    let err = provider.generate("s", "u").await.unwrap_err();

    assert_eq!(err.to_string(), "AI provider returned an error: model is loading");
}
