//! # Natural Language to Safe SQL
//!
//! This crate answers natural-language questions against a remote Postgres
//! database reached over a PostgREST-style HTTP interface. It discovers and
//! caches the database's schema, asks a configurable AI provider for a query,
//! lets only read-only `SELECT` statements through, executes them and records
//! every attempt.
//!
//! The entry point is [`QueryOrchestrator`], built with
//! [`QueryOrchestratorBuilder`].

pub mod cache;
pub mod constants;
pub mod errors;
pub mod generation;
pub mod history;
pub mod orchestrator;
pub mod prompts;
pub mod providers;
pub mod schema;
pub mod types;
pub mod validator;

pub use cache::{schema_cache_key, ExpiringCache, SchemaCache};
pub use errors::AskError;
pub use history::{HistorySink, JsonlHistorySink, NoopHistorySink};
pub use orchestrator::{QueryOrchestrator, QueryOrchestratorBuilder};
pub use schema::{format_schema, SchemaDescription, SchemaDiscovery};
pub use types::{
    AiProviderConfig, ConnectionCredentials, FailureKind, QueryAttempt, QueryOutcome,
    QueryRequest, QueryStatus, SqlRequest,
};
pub use validator::{is_safe, SafeSql};
