use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

/// Decrypted credentials for a remote PostgREST-compatible database.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConnectionCredentials {
    pub base_url: String,
    pub api_key: String,
    #[serde(default)]
    pub service_key: Option<String>,
}

impl ConnectionCredentials {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        service_key: Option<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            service_key,
        }
    }

    /// The token sent as `Authorization: Bearer`. The service key wins when present.
    pub fn bearer_token(&self) -> &str {
        self.service_key.as_deref().unwrap_or(&self.api_key)
    }
}

impl fmt::Debug for ConnectionCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionCredentials")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .field(
                "service_key",
                &self.service_key.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

/// A reusable configuration for a specific AI provider instance.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct AiProviderConfig {
    /// The type of provider ("gemini" or "local").
    pub provider: String,
    /// The API URL. Optional for Gemini, where it is derived from the model name.
    #[serde(default)]
    pub api_url: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    pub model_name: String,
}

/// A natural-language question against one stored connection.
#[derive(Debug, Clone)]
pub struct QueryRequest {
    pub user_id: String,
    pub connection_id: String,
    pub question: String,
    pub credentials: ConnectionCredentials,
    /// Tables to list first in the schema context.
    pub priority_tables: Vec<String>,
}

impl QueryRequest {
    pub fn new(
        user_id: impl Into<String>,
        connection_id: impl Into<String>,
        question: impl Into<String>,
        credentials: ConnectionCredentials,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            connection_id: connection_id.into(),
            question: question.into(),
            credentials,
            priority_tables: Vec::new(),
        }
    }

    pub fn with_priority_tables(mut self, tables: Vec<String>) -> Self {
        self.priority_tables = tables;
        self
    }
}

/// A user-supplied SQL statement to run against one stored connection.
#[derive(Debug, Clone)]
pub struct SqlRequest {
    pub user_id: String,
    pub connection_id: String,
    pub sql: String,
    pub credentials: ConnectionCredentials,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum QueryStatus {
    Success,
    Error,
}

/// The record of one question-to-SQL round trip, handed to the history sink.
///
/// Only the two constructors exist, so `error_message` is set exactly when the
/// status is `Error` and the execution metrics exactly when it is `Success`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct QueryAttempt {
    pub id: Uuid,
    pub user_id: String,
    pub connection_id: String,
    pub natural_language_query: String,
    pub generated_sql: Option<String>,
    pub status: QueryStatus,
    pub error_message: Option<String>,
    pub execution_time_ms: Option<u64>,
    pub row_count: Option<usize>,
    pub created_at: DateTime<Utc>,
}

impl QueryAttempt {
    pub fn succeeded(
        user_id: &str,
        connection_id: &str,
        natural_language_query: &str,
        sql: String,
        execution_time_ms: u64,
        row_count: usize,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            connection_id: connection_id.to_string(),
            natural_language_query: natural_language_query.to_string(),
            generated_sql: Some(sql),
            status: QueryStatus::Success,
            error_message: None,
            execution_time_ms: Some(execution_time_ms),
            row_count: Some(row_count),
            created_at: Utc::now(),
        }
    }

    pub fn failed(
        user_id: &str,
        connection_id: &str,
        natural_language_query: &str,
        generated_sql: Option<String>,
        error_message: String,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            connection_id: connection_id.to_string(),
            natural_language_query: natural_language_query.to_string(),
            generated_sql,
            status: QueryStatus::Error,
            error_message: Some(error_message),
            execution_time_ms: None,
            row_count: None,
            created_at: Utc::now(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == QueryStatus::Success
    }
}

/// Why a request ended in `QueryStatus::Error`.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    SchemaUnavailable,
    GenerationFailed,
    UnsafeQuery,
    ExecutionFailed,
    Internal,
}

/// The structured result of one orchestrated request.
#[derive(Serialize, Debug, Clone)]
pub struct QueryOutcome {
    pub attempt: QueryAttempt,
    /// Result rows, empty unless the query succeeded.
    pub rows: Vec<Value>,
    pub failure: Option<FailureKind>,
}

impl QueryOutcome {
    pub fn is_success(&self) -> bool {
        self.attempt.is_success()
    }

    pub fn message(&self) -> Option<&str> {
        self.attempt.error_message.as_deref()
    }
}
