use crate::types::FailureKind;
use thiserror::Error;

/// Custom error types for the application.
#[derive(Error, Debug)]
pub enum AskError {
    #[error("Failed to build Reqwest client: {0}")]
    ReqwestClientBuild(reqwest::Error),
    #[error("Failed to send request to AI provider: {0}")]
    AiRequest(reqwest::Error),
    #[error("Failed to deserialize AI provider response: {0}")]
    AiDeserialization(reqwest::Error),
    #[error("AI provider returned an error: {0}")]
    AiApi(String),
    #[error("AI provider is not configured: {0}")]
    MissingAiProvider(String),
    #[error("Invalid database URL '{url}': {reason}")]
    InvalidDatabaseUrl { url: String, reason: String },
    #[error("Failed to send request to database: {0}")]
    DatabaseRequest(reqwest::Error),
    #[error("Database returned an error (HTTP {status}): {message}")]
    DatabaseApi { status: u16, message: String },
    #[error("Failed to decode database response: {0}")]
    DatabaseDecode(String),
    #[error("Schema unavailable: {0}")]
    SchemaUnavailable(String),
    #[error("Could not generate query: {0}")]
    GenerationFailed(String),
    #[error("Unsafe query generated: {0}")]
    UnsafeQuery(String),
    #[error("Query execution failed: {0}")]
    ExecutionFailed(String),
    #[error("Failed to record query history: {0}")]
    HistoryWrite(String),
    #[error("Query task did not complete: {0}")]
    TaskFailed(String),
    #[error("{0} is required to build the orchestrator")]
    MissingComponent(&'static str),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),
}

impl AskError {
    /// Classifies the error into the failure category reported to callers.
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            Self::SchemaUnavailable(_) => FailureKind::SchemaUnavailable,
            Self::GenerationFailed(_)
            | Self::AiRequest(_)
            | Self::AiDeserialization(_)
            | Self::AiApi(_)
            | Self::MissingAiProvider(_) => FailureKind::GenerationFailed,
            Self::UnsafeQuery(_) => FailureKind::UnsafeQuery,
            Self::ExecutionFailed(_)
            | Self::DatabaseRequest(_)
            | Self::DatabaseApi { .. }
            | Self::DatabaseDecode(_) => FailureKind::ExecutionFailed,
            _ => FailureKind::Internal,
        }
    }
}
