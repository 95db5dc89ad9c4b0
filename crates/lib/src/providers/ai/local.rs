use crate::{
    errors::AskError,
    providers::ai::{api_error_message, AiProvider},
};
use async_trait::async_trait;
use reqwest::Client as ReqwestClient;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::time::Duration;

/// Upper bound on completion length; a single SELECT never needs more.
const MAX_COMPLETION_TOKENS: u32 = 1024;

// --- OpenAI-compatible chat completion structures ---

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    messages: [ChatMessage<'a>; 2],
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
    temperature: f32,
    max_tokens: u32,
    stream: bool,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize, Debug)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize, Debug)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize, Debug)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

// --- Local Provider implementation ---

/// A provider for a local or hosted OpenAI-compatible `chat/completions` endpoint.
#[derive(Clone, Debug)]
pub struct LocalAiProvider {
    client: ReqwestClient,
    api_url: String,
    api_key: Option<String>,
    model: Option<String>,
}

impl LocalAiProvider {
    /// Creates a new `LocalAiProvider`.
    pub fn new(
        api_url: String,
        api_key: Option<String>,
        model: Option<String>,
        timeout: Duration,
    ) -> Result<Self, AskError> {
        let client = ReqwestClient::builder()
            .timeout(timeout)
            .build()
            .map_err(AskError::ReqwestClientBuild)?;
        Ok(Self {
            client,
            api_url,
            api_key,
            model,
        })
    }
}

#[async_trait]
impl AiProvider for LocalAiProvider {
    async fn generate(&self, system_prompt: &str, user_prompt: &str) -> Result<String, AskError> {
        let request_body = ChatCompletionRequest {
            messages: [
                ChatMessage {
                    role: "system",
                    content: system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: user_prompt,
                },
            ],
            model: self.model.as_deref(),
            temperature: 0.0,
            max_tokens: MAX_COMPLETION_TOKENS,
            stream: false,
        };

        let mut request_builder = self.client.post(&self.api_url);
        if let Some(key) = &self.api_key {
            request_builder = request_builder.bearer_auth(key);
        }

        let response = request_builder
            .json(&request_body)
            .send()
            .await
            .map_err(AskError::AiRequest)?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(AskError::AiApi(api_error_message(&error_text)));
        }

        let completion: ChatCompletionResponse = response
            .json()
            .await
            .map_err(AskError::AiDeserialization)?;

        Ok(completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default())
    }
}
