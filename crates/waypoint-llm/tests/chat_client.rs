use httpmock::prelude::*;
use serde_json::json;
use waypoint_core::{ChatMessage, LanguageModel, ModelError};
use waypoint_llm::{ChatClient, ClientConfig, Provider};

fn client_for(server: &MockServer) -> ChatClient {
    let mut config = ClientConfig::new(Provider::OpenAi);
    config.api_key = Some("sk-test".to_string());
    config.model = Some("gpt-4o-mini".to_string());
    config.base_url = Some(server.url("/v1"));
    ChatClient::new(config).unwrap()
}

#[tokio::test]
async fn test_completion_round_trip() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST)
            .path("/v1/chat/completions")
            .header("authorization", "Bearer sk-test")
            .json_body_includes(
                json!({
                    "model": "gpt-4o-mini",
                    "messages": [{"role": "system"}, {"role": "user", "content": "Task: buy milk"}]
                })
                .to_string(),
            );
        then.status(200).json_body(json!({
            "choices": [{"message": {"role": "assistant", "content": "2;5:milk ENTER"}}]
        }));
    });

    let answer = client_for(&server)
        .complete(&[ChatMessage::system("navigate"), ChatMessage::user("Task: buy milk")])
        .await
        .unwrap();

    mock.assert();
    assert_eq!(answer, "2;5:milk ENTER");
}

#[tokio::test]
async fn test_error_status_becomes_api_error() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/v1/chat/completions");
        then.status(429)
            .json_body(json!({"error": {"message": "Rate limit reached"}}));
    });

    let err = client_for(&server)
        .complete(&[ChatMessage::user("hi")])
        .await
        .unwrap_err();

    assert_eq!(
        err,
        ModelError::Api {
            status: 429,
            message: "Rate limit reached".to_string()
        }
    );
}

#[tokio::test]
async fn test_unreachable_endpoint_is_transport_error() {
    let mut config = ClientConfig::new(Provider::Groq);
    config.api_key = Some("gsk-test".to_string());
    config.base_url = Some("http://127.0.0.1:9".to_string());
    let client = ChatClient::new(config).unwrap();

    let err = client.complete(&[ChatMessage::user("hi")]).await.unwrap_err();
    assert!(matches!(err, ModelError::Transport(_)));
}
