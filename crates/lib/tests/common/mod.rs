#![allow(dead_code)]
//! # Common Test Utilities
//!
//! Shared mocks for the AI provider, the remote database and the history sink,
//! so orchestration can be tested without any network access.

use askdb::providers::ai::AiProvider;
use askdb::providers::db::storage::{DatabaseClient, DatabaseConnector};
use askdb::schema::{ColumnInfo, ForeignKey, SchemaDiscovery};
use askdb::{
    AskError, ConnectionCredentials, HistorySink, QueryAttempt, QueryOrchestrator, SafeSql,
    SchemaCache,
};
use async_trait::async_trait;
use dotenvy::dotenv;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Once, RwLock};
use std::time::Duration;

static INIT: Once = Once::new();

/// Initializes the tracing subscriber and loads .env for tests.
pub fn setup_tracing() {
    INIT.call_once(|| {
        dotenv().ok();
        tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init()
            .ok();
    });
}

pub fn credentials() -> ConnectionCredentials {
    ConnectionCredentials::new("https://project.example.com", "anon-key", None)
}

pub fn column(table: &str, name: &str, data_type: &str, nullable: bool) -> ColumnInfo {
    ColumnInfo {
        table: table.to_string(),
        name: name.to_string(),
        data_type: data_type.to_string(),
        nullable,
        default: None,
    }
}

pub fn foreign_key(table: &str, column: &str, foreign_table: &str, foreign_column: &str) -> ForeignKey {
    ForeignKey {
        table: table.to_string(),
        column: column.to_string(),
        foreign_table: foreign_table.to_string(),
        foreign_column: foreign_column.to_string(),
    }
}

// --- Mock AI Provider ---

#[derive(Clone, Debug)]
pub struct MockAiProvider {
    pub call_history: Arc<RwLock<Vec<(String, String)>>>,
    pub responses: Arc<RwLock<Vec<String>>>,
}

impl MockAiProvider {
    pub fn new(responses: Vec<String>) -> Self {
        Self {
            call_history: Arc::new(RwLock::new(Vec::new())),
            responses: Arc::new(RwLock::new(responses.into_iter().rev().collect())),
        }
    }

    pub fn calls(&self) -> usize {
        self.call_history.read().unwrap().len()
    }
}

#[async_trait]
impl AiProvider for MockAiProvider {
    async fn generate(&self, system_prompt: &str, user_prompt: &str) -> Result<String, AskError> {
        self.call_history
            .write()
            .unwrap()
            .push((system_prompt.to_string(), user_prompt.to_string()));

        if let Some(response) = self.responses.write().unwrap().pop() {
            Ok(response)
        } else {
            Ok("Default mock response".to_string())
        }
    }
}

/// An AI provider whose every call fails like an upstream API error.
#[derive(Clone, Debug)]
pub struct FailingAiProvider;

#[async_trait]
impl AiProvider for FailingAiProvider {
    async fn generate(&self, _system: &str, _user: &str) -> Result<String, AskError> {
        Err(AskError::AiApi("model overloaded".to_string()))
    }
}

/// An AI provider that answers only after `delay`.
#[derive(Clone, Debug)]
pub struct SlowAiProvider {
    pub delay: Duration,
    pub response: String,
}

#[async_trait]
impl AiProvider for SlowAiProvider {
    async fn generate(&self, _system: &str, _user: &str) -> Result<String, AskError> {
        tokio::time::sleep(self.delay).await;
        Ok(self.response.clone())
    }
}

/// An AI provider that panics mid-request.
#[derive(Clone, Debug)]
pub struct PanickingAiProvider;

#[async_trait]
impl AiProvider for PanickingAiProvider {
    async fn generate(&self, _system: &str, _user: &str) -> Result<String, AskError> {
        panic!("provider crashed while generating");
    }
}

// --- Mock Database ---

/// An in-memory stand-in for a remote database.
///
/// Each capability can be switched off independently. Every call is logged in
/// `calls` (e.g. `list_tables`, `fetch_rows:orders`, `execute_sql:SELECT 1`).
#[derive(Clone, Debug, Default)]
pub struct MockDatabase {
    pub tables: Vec<String>,
    pub columns: Vec<ColumnInfo>,
    pub foreign_keys: Vec<ForeignKey>,
    /// Tables reachable by row sampling, with the rows they return.
    pub sample_rows: HashMap<String, Vec<Value>>,
    pub execute_rows: Vec<Value>,
    pub deny_catalog: bool,
    pub deny_foreign_keys: bool,
    pub execute_error: Option<String>,
    pub calls: Arc<RwLock<Vec<String>>>,
}

impl MockDatabase {
    pub fn with_catalog(tables: &[&str], columns: Vec<ColumnInfo>) -> Self {
        Self {
            tables: tables.iter().map(|t| t.to_string()).collect(),
            columns,
            ..Default::default()
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.read().unwrap().clone()
    }

    pub fn count_calls(&self, prefix: &str) -> usize {
        self.calls
            .read()
            .unwrap()
            .iter()
            .filter(|c| c.starts_with(prefix))
            .count()
    }

    fn log(&self, call: String) {
        self.calls.write().unwrap().push(call);
    }

    fn permission_denied(what: &str) -> AskError {
        AskError::DatabaseApi {
            status: 403,
            message: format!("permission denied for {what}"),
        }
    }
}

#[async_trait]
impl DatabaseClient for MockDatabase {
    fn name(&self) -> &str {
        "MockDB"
    }

    async fn list_tables(&self) -> Result<Vec<String>, AskError> {
        self.log("list_tables".to_string());
        if self.deny_catalog {
            return Err(Self::permission_denied("schema information_schema"));
        }
        Ok(self.tables.clone())
    }

    async fn list_columns(&self) -> Result<Vec<ColumnInfo>, AskError> {
        self.log("list_columns".to_string());
        if self.deny_catalog {
            return Err(Self::permission_denied("schema information_schema"));
        }
        Ok(self.columns.clone())
    }

    async fn list_foreign_keys(&self) -> Result<Vec<ForeignKey>, AskError> {
        self.log("list_foreign_keys".to_string());
        if self.deny_catalog || self.deny_foreign_keys {
            return Err(Self::permission_denied("table constraint_column_usage"));
        }
        Ok(self.foreign_keys.clone())
    }

    async fn fetch_rows(&self, table: &str, limit: usize) -> Result<Vec<Value>, AskError> {
        self.log(format!("fetch_rows:{table}"));
        match self.sample_rows.get(table) {
            Some(rows) => Ok(rows.iter().take(limit).cloned().collect()),
            None => Err(AskError::DatabaseApi {
                status: 404,
                message: format!("relation \"public.{table}\" does not exist"),
            }),
        }
    }

    async fn execute_sql(&self, sql: &SafeSql) -> Result<Vec<Value>, AskError> {
        self.log(format!("execute_sql:{sql}"));
        match &self.execute_error {
            Some(message) => Err(AskError::DatabaseApi {
                status: 400,
                message: message.clone(),
            }),
            None => Ok(self.execute_rows.clone()),
        }
    }
}

/// Hands out clones of one [`MockDatabase`], counting connections.
#[derive(Clone, Debug, Default)]
pub struct MockConnector {
    pub database: MockDatabase,
    pub connections: Arc<RwLock<usize>>,
}

impl MockConnector {
    pub fn new(database: MockDatabase) -> Self {
        Self {
            database,
            connections: Arc::new(RwLock::new(0)),
        }
    }
}

impl DatabaseConnector for MockConnector {
    fn connect(
        &self,
        _credentials: &ConnectionCredentials,
    ) -> Result<Box<dyn DatabaseClient>, AskError> {
        *self.connections.write().unwrap() += 1;
        Ok(Box::new(self.database.clone()))
    }
}

// --- History Sinks ---

#[derive(Clone, Debug, Default)]
pub struct MemoryHistorySink {
    pub attempts: Arc<RwLock<Vec<QueryAttempt>>>,
}

impl MemoryHistorySink {
    pub fn attempts(&self) -> Vec<QueryAttempt> {
        self.attempts.read().unwrap().clone()
    }
}

#[async_trait]
impl HistorySink for MemoryHistorySink {
    async fn record(&self, attempt: &QueryAttempt) -> Result<(), AskError> {
        self.attempts.write().unwrap().push(attempt.clone());
        Ok(())
    }
}

#[derive(Clone, Debug, Default)]
pub struct FailingHistorySink;

#[async_trait]
impl HistorySink for FailingHistorySink {
    async fn record(&self, _attempt: &QueryAttempt) -> Result<(), AskError> {
        Err(AskError::HistoryWrite("history store is read-only".to_string()))
    }
}

/// Builds an orchestrator over the given mocks with a fresh five-minute cache.
pub fn orchestrator(
    ai: impl AiProvider + 'static,
    database: &MockDatabase,
    history: Arc<dyn HistorySink>,
) -> QueryOrchestrator {
    QueryOrchestrator::builder()
        .cache(Arc::new(SchemaCache::new(Duration::from_secs(300))))
        .ai_provider(Box::new(ai))
        .connector(Arc::new(MockConnector::new(database.clone())))
        .history(history)
        .discovery(SchemaDiscovery::new(vec![
            "users".to_string(),
            "orders".to_string(),
        ]))
        .build()
        .expect("orchestrator should build with all components")
}
