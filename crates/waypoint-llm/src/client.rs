use crate::{Error, Result};
use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::Deserialize;
use serde_json::{Value, json};
use std::fmt;
use std::time::Duration;
use waypoint_core::{ChatMessage, LanguageModel, ModelError};

/// Hosted completion services speaking the OpenAI chat API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Provider {
    #[default]
    OpenAi,
    Groq,
}

impl Provider {
    pub fn name(&self) -> &'static str {
        match self {
            Provider::OpenAi => "openai",
            Provider::Groq => "groq",
        }
    }

    pub fn base_url(&self) -> &'static str {
        match self {
            Provider::OpenAi => "https://api.openai.com/v1",
            Provider::Groq => "https://api.groq.com/openai/v1",
        }
    }

    /// Environment variable holding the API key.
    pub fn api_key_env(&self) -> &'static str {
        match self {
            Provider::OpenAi => "OPENAI_API_KEY",
            Provider::Groq => "GROQ_API_KEY",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            Provider::OpenAi => "gpt-4o",
            Provider::Groq => "llama3-8b-8192",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub provider: Provider,
    pub api_key: Option<String>,
    /// Falls back to the provider's default model.
    pub model: Option<String>,
    /// Falls back to the provider's public endpoint.
    pub base_url: Option<String>,
    pub request_timeout: Duration,
}

impl ClientConfig {
    pub fn new(provider: Provider) -> Self {
        Self {
            provider,
            api_key: None,
            model: None,
            base_url: None,
            request_timeout: Duration::from_secs(120),
        }
    }
}

/// `/chat/completions` client implementing [`LanguageModel`].
#[derive(Debug, Clone)]
pub struct ChatClient {
    http: reqwest::Client,
    endpoint: String,
    model: String,
    provider: Provider,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

impl ChatClient {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let provider = config.provider;
        let api_key = config
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or(Error::MissingApiKey {
                provider: provider.name(),
                env: provider.api_key_env(),
            })?;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let mut bearer = HeaderValue::from_str(&format!("Bearer {}", api_key))
            .map_err(|_| Error::InvalidApiKey)?;
        bearer.set_sensitive(true);
        headers.insert(AUTHORIZATION, bearer);

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.request_timeout)
            .build()?;

        let base = config
            .base_url
            .as_deref()
            .unwrap_or(provider.base_url())
            .trim_end_matches('/');
        let model = config
            .model
            .unwrap_or_else(|| provider.default_model().to_string());

        tracing::debug!(provider = provider.name(), "Using model {}", model);

        Ok(Self {
            http,
            endpoint: format!("{}/chat/completions", base),
            model,
            provider,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn provider(&self) -> Provider {
        self.provider
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn request_body(&self, messages: &[ChatMessage]) -> Value {
        json!({
            "model": self.model,
            "messages": messages,
        })
    }
}

#[async_trait]
impl LanguageModel for ChatClient {
    async fn complete(&self, messages: &[ChatMessage]) -> std::result::Result<String, ModelError> {
        tracing::debug!(
            provider = self.provider.name(),
            "Requesting completion for {} messages",
            messages.len()
        );

        let response = self
            .http
            .post(&self.endpoint)
            .json(&self.request_body(messages))
            .send()
            .await
            .map_err(|e| ModelError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ModelError::Transport(e.to_string()))?;

        if !status.is_success() {
            return Err(ModelError::Api {
                status: status.as_u16(),
                message: api_error_message(&body),
            });
        }

        parse_completion(&body)
    }
}

/// First choice's content, trimmed.
fn parse_completion(body: &str) -> std::result::Result<String, ModelError> {
    let response: CompletionResponse =
        serde_json::from_str(body).map_err(|e| ModelError::Malformed(e.to_string()))?;
    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .map(|content| content.trim().to_string())
        .ok_or_else(|| ModelError::Malformed("response has no message content".to_string()))
}

/// `error.message` from an error body, or the raw body.
fn api_error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(provider: Provider) -> ChatClient {
        let mut config = ClientConfig::new(provider);
        config.api_key = Some("sk-test".to_string());
        ChatClient::new(config).unwrap()
    }

    #[test]
    fn test_provider_defaults() {
        let openai = client(Provider::OpenAi);
        assert_eq!(openai.model(), "gpt-4o");
        assert_eq!(openai.endpoint(), "https://api.openai.com/v1/chat/completions");

        let groq = client(Provider::Groq);
        assert_eq!(groq.model(), "llama3-8b-8192");
        assert_eq!(groq.endpoint(), "https://api.groq.com/openai/v1/chat/completions");
    }

    #[test]
    fn test_missing_key_names_env_var() {
        let err = ChatClient::new(ClientConfig::new(Provider::Groq)).unwrap_err();
        assert!(err.to_string().contains("GROQ_API_KEY"));

        let mut blank = ClientConfig::new(Provider::OpenAi);
        blank.api_key = Some("   ".to_string());
        assert!(matches!(
            ChatClient::new(blank),
            Err(Error::MissingApiKey { .. })
        ));
    }

    #[test]
    fn test_request_body() {
        let body = client(Provider::OpenAi).request_body(&[
            ChatMessage::system("be brief"),
            ChatMessage::user("hi"),
        ]);
        assert_eq!(
            body,
            json!({
                "model": "gpt-4o",
                "messages": [
                    {"role": "system", "content": "be brief"},
                    {"role": "user", "content": "hi"}
                ]
            })
        );
    }

    #[test]
    fn test_parse_completion() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":"  3:hello ENTER \n"}}]}"#;
        assert_eq!(parse_completion(body).unwrap(), "3:hello ENTER");

        let empty = r#"{"choices":[]}"#;
        assert!(matches!(parse_completion(empty), Err(ModelError::Malformed(_))));

        let null_content = r#"{"choices":[{"message":{"content":null}}]}"#;
        assert!(matches!(
            parse_completion(null_content),
            Err(ModelError::Malformed(_))
        ));

        assert!(matches!(parse_completion("<html>"), Err(ModelError::Malformed(_))));
    }

    #[test]
    fn test_api_error_message() {
        let body = r#"{"error":{"message":"Incorrect API key provided","type":"invalid_request_error"}}"#;
        assert_eq!(api_error_message(body), "Incorrect API key provided");
        assert_eq!(api_error_message("Bad Gateway\n"), "Bad Gateway");
    }
}
