//! # AI Provider Factory
//!
//! Builds the configured AI provider so that any consumer (the CLI, tests, an
//! embedding service) resolves provider settings the same way.

use crate::{
    errors::AskError,
    providers::ai::{gemini::GeminiProvider, local::LocalAiProvider, AiProvider},
    types::AiProviderConfig,
};
use std::time::Duration;
use tracing::info;

/// Creates an AI provider instance from its configuration.
///
/// - `gemini` requires an API key; the URL defaults to the model's `generateContent` endpoint.
/// - `local` requires an API URL; the key is optional.
pub fn create_ai_provider(
    config: &AiProviderConfig,
    timeout: Duration,
) -> Result<Box<dyn AiProvider>, AskError> {
    match config.provider.as_str() {
        "gemini" => {
            let api_key = config.api_key.clone().ok_or_else(|| {
                AskError::MissingAiProvider("api_key is required for the gemini provider".into())
            })?;
            let api_url = config
                .api_url
                .clone()
                .unwrap_or_else(|| GeminiProvider::endpoint_for_model(&config.model_name));
            info!(model = %config.model_name, "Configuring Gemini provider.");
            Ok(Box::new(GeminiProvider::new(api_url, api_key, timeout)?))
        }
        "local" => {
            let api_url = config.api_url.clone().ok_or_else(|| {
                AskError::MissingAiProvider("api_url is required for the local provider".into())
            })?;
            info!(api_url = %api_url, model = %config.model_name, "Configuring local AI provider.");
            Ok(Box::new(LocalAiProvider::new(
                api_url,
                config.api_key.clone(),
                Some(config.model_name.clone()),
                timeout,
            )?))
        }
        other => Err(AskError::MissingAiProvider(format!(
            "unsupported AI provider type '{other}'"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(provider: &str, api_url: Option<&str>, api_key: Option<&str>) -> AiProviderConfig {
        AiProviderConfig {
            provider: provider.into(),
            api_url: api_url.map(String::from),
            api_key: api_key.map(String::from),
            model_name: "test-model".into(),
        }
    }

    #[test]
    fn test_gemini_requires_api_key() {
        let result = create_ai_provider(&config("gemini", None, None), Duration::from_secs(5));
        assert!(matches!(result, Err(AskError::MissingAiProvider(_))));
        assert!(
            create_ai_provider(&config("gemini", None, Some("k")), Duration::from_secs(5)).is_ok()
        );
    }

    #[test]
    fn test_local_requires_api_url() {
        let result = create_ai_provider(&config("local", None, None), Duration::from_secs(5));
        assert!(matches!(result, Err(AskError::MissingAiProvider(_))));
        assert!(create_ai_provider(
            &config("local", Some("http://localhost:1234/v1/chat/completions"), None),
            Duration::from_secs(5)
        )
        .is_ok());
    }

    #[test]
    fn test_unknown_provider_is_rejected() {
        let result = create_ai_provider(&config("mystery", None, None), Duration::from_secs(5));
        assert!(matches!(result, Err(AskError::MissingAiProvider(msg)) if msg.contains("mystery")));
    }

    #[test]
    fn test_gemini_endpoint_uses_model_name() {
        assert_eq!(
            GeminiProvider::endpoint_for_model("gemini-2.0-flash"),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.0-flash:generateContent"
        );
    }
}
