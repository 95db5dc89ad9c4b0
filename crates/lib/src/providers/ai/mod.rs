pub mod gemini;
pub mod local;

use crate::errors::AskError;
use async_trait::async_trait;
use dyn_clone::DynClone;
use std::fmt::Debug;

/// A trait for interacting with an AI provider.
///
/// This trait defines a common interface for turning a system instruction and a
/// user prompt into a single text completion, independent of the vendor.
#[async_trait]
pub trait AiProvider: Send + Sync + Debug + DynClone {
    /// Generates a response from a given system and user prompt.
    async fn generate(&self, system_prompt: &str, user_prompt: &str) -> Result<String, AskError>;
}

dyn_clone::clone_trait_object!(AiProvider);

/// Extracts `error.message` from a provider's JSON error body, else returns the body.
pub(crate) fn api_error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.pointer("/error/message")
                .and_then(serde_json::Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.trim().to_string())
}
