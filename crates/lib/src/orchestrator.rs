//! # Query Orchestrator
//!
//! Drives one natural-language question through
//! `schema → generate → validate → execute → record`.
//!
//! Every request ends with exactly one [`QueryAttempt`] handed to the
//! [`HistorySink`], whichever stage it stopped at. Failures never escape as
//! errors: they come back as a [`QueryOutcome`] whose `failure` names the stage.
//! The pipeline runs on its own tokio task, so a caller that stops waiting does
//! not stop the attempt from being recorded.

use crate::{
    cache::{schema_cache_key, SchemaCache},
    constants::DEFAULT_SCHEMA_CACHE_TTL_SECS,
    errors::AskError,
    generation::parse_generated_sql,
    history::HistorySink,
    prompts::core::{build_user_prompt, SQL_SYSTEM_PROMPT},
    providers::{
        ai::AiProvider,
        db::{postgrest::PostgrestConnector, storage::DatabaseConnector},
    },
    schema::{format_schema, SchemaDiscovery},
    types::{
        ConnectionCredentials, FailureKind, QueryAttempt, QueryOutcome, QueryRequest, SqlRequest,
    },
    validator::{self, SafeSql},
};
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// The identity of a request, kept outside the pipeline task so a failed task
/// can still be recorded.
#[derive(Clone)]
struct AttemptContext {
    user_id: String,
    connection_id: String,
    question: String,
}

#[derive(Clone, Debug)]
pub struct QueryOrchestrator {
    cache: Arc<SchemaCache>,
    ai_provider: Box<dyn AiProvider>,
    connector: Arc<dyn DatabaseConnector>,
    history: Arc<dyn HistorySink>,
    discovery: SchemaDiscovery,
    schema_ttl: Duration,
}

impl QueryOrchestrator {
    pub fn builder() -> QueryOrchestratorBuilder {
        QueryOrchestratorBuilder::new()
    }

    pub fn cache(&self) -> &Arc<SchemaCache> {
        &self.cache
    }

    /// Answers a natural-language question. Always records one attempt.
    pub async fn ask(&self, request: QueryRequest) -> QueryOutcome {
        let context = AttemptContext {
            user_id: request.user_id.clone(),
            connection_id: request.connection_id.clone(),
            question: request.question.clone(),
        };
        let orchestrator = self.clone();
        self.run_detached(context, async move { orchestrator.answer(request).await })
            .await
    }

    /// Validates and executes caller-supplied SQL. Always records one attempt,
    /// with the SQL as both the question and the generated query.
    pub async fn run_sql(&self, request: SqlRequest) -> QueryOutcome {
        let context = AttemptContext {
            user_id: request.user_id.clone(),
            connection_id: request.connection_id.clone(),
            question: request.sql.clone(),
        };
        let orchestrator = self.clone();
        let pipeline_context = context.clone();
        self.run_detached(context, async move {
            orchestrator
                .validate_and_execute(&pipeline_context, &request.credentials, request.sql)
                .await
        })
        .await
    }

    /// Returns the formatted schema context for a connection, from the cache
    /// when fresh, otherwise discovered, formatted and cached.
    ///
    /// `priority_tables` only affect a context built by this call; a cached
    /// context is returned as stored.
    pub async fn schema_context(
        &self,
        user_id: &str,
        connection_id: &str,
        credentials: &ConnectionCredentials,
        priority_tables: &[String],
    ) -> Result<String, AskError> {
        let key = schema_cache_key(user_id, connection_id);
        if let Some(context) = self.cache.get(&key) {
            debug!(key = %key, "Schema cache hit.");
            return Ok(context);
        }

        debug!(key = %key, "Schema cache miss; discovering.");
        let client = self
            .connector
            .connect(credentials)
            .map_err(|e| AskError::SchemaUnavailable(e.to_string()))?;
        let schema = self.discovery.discover(client.as_ref()).await?;
        let context = format_schema(&schema, priority_tables);
        self.cache.set(key, context.clone(), self.schema_ttl);
        Ok(context)
    }

    /// Drops any cached context for the connection and builds a new one.
    pub async fn refresh_schema(
        &self,
        user_id: &str,
        connection_id: &str,
        credentials: &ConnectionCredentials,
        priority_tables: &[String],
    ) -> Result<String, AskError> {
        self.invalidate_schema(user_id, connection_id);
        self.schema_context(user_id, connection_id, credentials, priority_tables)
            .await
    }

    /// Forgets the cached context of a connection, e.g. after it was edited or
    /// deleted. Returns whether anything was cached.
    pub fn invalidate_schema(&self, user_id: &str, connection_id: &str) -> bool {
        self.cache.delete(&schema_cache_key(user_id, connection_id))
    }

    async fn run_detached<F>(&self, context: AttemptContext, pipeline: F) -> QueryOutcome
    where
        F: Future<Output = QueryOutcome> + Send + 'static,
    {
        match tokio::spawn(pipeline).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(error = %e, "Query pipeline task did not complete.");
                self.fail(&context, None, AskError::TaskFailed(e.to_string()))
                    .await
            }
        }
    }

    async fn answer(&self, request: QueryRequest) -> QueryOutcome {
        let context = AttemptContext {
            user_id: request.user_id,
            connection_id: request.connection_id,
            question: request.question,
        };
        info!(
            user_id = %context.user_id,
            connection_id = %context.connection_id,
            "Answering question."
        );

        let schema = match self
            .schema_context(
                &context.user_id,
                &context.connection_id,
                &request.credentials,
                &request.priority_tables,
            )
            .await
        {
            Ok(schema) => schema,
            Err(e) => return self.fail(&context, None, e).await,
        };

        let sql = match self.generate_sql(&schema, &context.question).await {
            Ok(sql) => sql,
            Err(e) => return self.fail(&context, None, e).await,
        };

        self.validate_and_execute(&context, &request.credentials, sql)
            .await
    }

    async fn generate_sql(&self, schema: &str, question: &str) -> Result<String, AskError> {
        let user_prompt = build_user_prompt(schema, question);
        debug!(user_prompt = %user_prompt, "--> Sending prompts to AI provider");
        let raw = self
            .ai_provider
            .generate(SQL_SYSTEM_PROMPT, &user_prompt)
            .await
            .map_err(|e| AskError::GenerationFailed(e.to_string()))?;
        debug!(response = %raw, "<-- Response from AI provider");
        parse_generated_sql(&raw)
    }

    async fn validate_and_execute(
        &self,
        context: &AttemptContext,
        credentials: &ConnectionCredentials,
        sql: String,
    ) -> QueryOutcome {
        let safe = match validator::validate(&sql) {
            Ok(safe) => safe,
            Err(reason) => {
                warn!(sql = %sql, reason = %reason, "Rejected unsafe query.");
                let error = AskError::UnsafeQuery(reason.to_string());
                return self.fail(context, Some(sql), error).await;
            }
        };

        match self.execute(credentials, &safe).await {
            Ok((rows, elapsed)) => {
                let execution_time_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
                let attempt = QueryAttempt::succeeded(
                    &context.user_id,
                    &context.connection_id,
                    &context.question,
                    safe.into_inner(),
                    execution_time_ms,
                    rows.len(),
                );
                self.conclude(attempt, rows, None).await
            }
            Err(e) => self.fail(context, Some(safe.into_inner()), e).await,
        }
    }

    /// Runs validated SQL, timing only the database call.
    async fn execute(
        &self,
        credentials: &ConnectionCredentials,
        sql: &SafeSql,
    ) -> Result<(Vec<Value>, Duration), AskError> {
        let client = self
            .connector
            .connect(credentials)
            .map_err(|e| AskError::ExecutionFailed(e.to_string()))?;
        let started = Instant::now();
        let rows = client
            .execute_sql(sql)
            .await
            .map_err(|e| AskError::ExecutionFailed(e.to_string()))?;
        Ok((rows, started.elapsed()))
    }

    async fn fail(
        &self,
        context: &AttemptContext,
        generated_sql: Option<String>,
        error: AskError,
    ) -> QueryOutcome {
        let failure = error.failure_kind();
        let attempt = QueryAttempt::failed(
            &context.user_id,
            &context.connection_id,
            &context.question,
            generated_sql,
            error.to_string(),
        );
        self.conclude(attempt, Vec::new(), Some(failure)).await
    }

    /// Records the attempt. A recording failure is logged and otherwise ignored.
    async fn conclude(
        &self,
        attempt: QueryAttempt,
        rows: Vec<Value>,
        failure: Option<FailureKind>,
    ) -> QueryOutcome {
        match failure {
            None => info!(
                id = %attempt.id,
                row_count = rows.len(),
                execution_time_ms = ?attempt.execution_time_ms,
                "Query succeeded."
            ),
            Some(kind) => warn!(
                id = %attempt.id,
                failure = ?kind,
                message = attempt.error_message.as_deref().unwrap_or_default(),
                "Query failed."
            ),
        }

        if let Err(e) = self.history.record(&attempt).await {
            error!(id = %attempt.id, error = %e, "Failed to record query attempt.");
        }

        QueryOutcome {
            attempt,
            rows,
            failure,
        }
    }
}

/// A builder for [`QueryOrchestrator`].
///
/// The AI provider and the history sink are required. Without a cache, a new
/// one with the default TTL is created; without a connector, PostgREST is used.
#[derive(Default, Debug)]
pub struct QueryOrchestratorBuilder {
    cache: Option<Arc<SchemaCache>>,
    ai_provider: Option<Box<dyn AiProvider>>,
    connector: Option<Arc<dyn DatabaseConnector>>,
    history: Option<Arc<dyn HistorySink>>,
    discovery: Option<SchemaDiscovery>,
    schema_ttl: Option<Duration>,
}

impl QueryOrchestratorBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shares an existing cache, e.g. one with a running cleanup task.
    pub fn cache(mut self, cache: Arc<SchemaCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn ai_provider(mut self, ai_provider: Box<dyn AiProvider>) -> Self {
        self.ai_provider = Some(ai_provider);
        self
    }

    pub fn connector(mut self, connector: Arc<dyn DatabaseConnector>) -> Self {
        self.connector = Some(connector);
        self
    }

    pub fn history(mut self, history: Arc<dyn HistorySink>) -> Self {
        self.history = Some(history);
        self
    }

    pub fn discovery(mut self, discovery: SchemaDiscovery) -> Self {
        self.discovery = Some(discovery);
        self
    }

    /// Overrides the TTL of cached schema contexts. Defaults to the cache's own default.
    pub fn schema_ttl(mut self, ttl: Duration) -> Self {
        self.schema_ttl = Some(ttl);
        self
    }

    pub fn build(self) -> Result<QueryOrchestrator, AskError> {
        let ai_provider = self
            .ai_provider
            .ok_or(AskError::MissingComponent("an AI provider"))?;
        let history = self
            .history
            .ok_or(AskError::MissingComponent("a history sink"))?;
        let cache = self.cache.unwrap_or_else(|| {
            Arc::new(SchemaCache::new(Duration::from_secs(
                DEFAULT_SCHEMA_CACHE_TTL_SECS,
            )))
        });
        let schema_ttl = self.schema_ttl.unwrap_or_else(|| cache.default_ttl());

        Ok(QueryOrchestrator {
            cache,
            ai_provider,
            connector: self
                .connector
                .unwrap_or_else(|| Arc::new(PostgrestConnector::default())),
            history,
            discovery: self.discovery.unwrap_or_default(),
            schema_ttl,
        })
    }
}
