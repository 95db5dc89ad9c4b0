//! # askdb: ask a database questions in plain language
//!
//! This is the main entry point for the `askdb` command-line interface. It
//! loads configuration, wires the orchestrator and runs one command.

mod config;

use anyhow::{bail, Context, Result};
use askdb::constants::DEFAULT_CACHE_SWEEP_SECS;
use askdb::providers::db::postgrest::PostgrestConnector;
use askdb::providers::factory::create_ai_provider;
use askdb::{
    ConnectionCredentials, ExpiringCache, JsonlHistorySink, QueryOrchestrator, QueryOutcome,
    QueryRequest, SchemaCache, SchemaDiscovery, SqlRequest,
};
use clap::{Args, Parser, Subcommand};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::{get_config, AppConfig};

// --- CLI Definition ---

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to a YAML config file (defaults to ./config.yml when present)
    #[arg(long, global = true, env = "ASKDB_CONFIG")]
    config: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Answer one or more natural-language questions
    Ask(AskArgs),
    /// Print the schema context the model would see
    Schema(SchemaArgs),
    /// Run a read-only SQL statement after the safety check
    Sql(SqlArgs),
}

#[derive(Args, Debug)]
struct ConnectionArgs {
    /// Base URL of the PostgREST endpoint (e.g. https://xyz.supabase.co)
    #[arg(long, env = "DATABASE_URL")]
    database_url: String,
    /// API key sent as `apikey`
    #[arg(long, env = "DATABASE_API_KEY", hide_env_values = true)]
    api_key: String,
    /// Service key used as the bearer token instead of the API key
    #[arg(long, env = "DATABASE_SERVICE_KEY", hide_env_values = true)]
    service_key: Option<String>,
    /// Identifies the caller in history and cache keys
    #[arg(long, env = "ASKDB_USER_ID", default_value = "local")]
    user_id: String,
    /// Identifies the connection in history and cache keys
    #[arg(long, env = "ASKDB_CONNECTION_ID", default_value = "default")]
    connection_id: String,
}

impl ConnectionArgs {
    fn credentials(&self) -> ConnectionCredentials {
        ConnectionCredentials::new(
            self.database_url.clone(),
            self.api_key.clone(),
            self.service_key.clone(),
        )
    }
}

#[derive(Args, Debug)]
struct AskArgs {
    #[command(flatten)]
    connection: ConnectionArgs,
    /// Questions to answer, in order; later ones reuse the cached schema
    #[arg(required = true)]
    questions: Vec<String>,
    /// Tables to list first in the schema context (comma-separated)
    #[arg(long, value_delimiter = ',')]
    priority_tables: Vec<String>,
    /// Print each outcome as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Args, Debug)]
struct SchemaArgs {
    #[command(flatten)]
    connection: ConnectionArgs,
    /// Tables to list first in the schema context (comma-separated)
    #[arg(long, value_delimiter = ',')]
    priority_tables: Vec<String>,
}

#[derive(Args, Debug)]
struct SqlArgs {
    #[command(flatten)]
    connection: ConnectionArgs,
    /// The SQL statement; only a single SELECT passes
    sql: String,
    /// Print the outcome as JSON
    #[arg(long)]
    json: bool,
}

// --- Main Application Entry ---

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let config = get_config(cli.config.as_deref())?;

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let orchestrator = build_orchestrator(&config)?;

    match cli.command {
        Commands::Ask(args) => ask(&orchestrator, args).await,
        Commands::Schema(args) => schema(&orchestrator, args).await,
        Commands::Sql(args) => sql(&orchestrator, args).await,
    }
}

/// Wires the cache, AI provider, database connector and history sink from config.
fn build_orchestrator(config: &AppConfig) -> Result<QueryOrchestrator> {
    let cache = Arc::new(SchemaCache::new(Duration::from_secs(
        config.schema_cache_ttl_secs,
    )));
    let _sweeper =
        ExpiringCache::start_cleanup_task(&cache, Duration::from_secs(DEFAULT_CACHE_SWEEP_SECS));

    let ai_provider =
        create_ai_provider(&config.provider, Duration::from_secs(config.ai_timeout_secs))
            .context("Failed to configure the AI provider")?;
    let discovery = if config.sample_tables.is_empty() {
        SchemaDiscovery::default()
    } else {
        SchemaDiscovery::new(config.sample_tables.clone())
    };

    info!(
        provider = %config.provider.provider,
        history = %config.history_path,
        ttl_secs = config.schema_cache_ttl_secs,
        "Configuration loaded."
    );

    Ok(QueryOrchestrator::builder()
        .cache(cache)
        .ai_provider(ai_provider)
        .connector(Arc::new(PostgrestConnector::new(
            Duration::from_secs(config.database_timeout_secs),
            config.rpc_function.clone(),
        )))
        .history(Arc::new(JsonlHistorySink::new(&config.history_path)))
        .discovery(discovery)
        .build()?)
}

async fn ask(orchestrator: &QueryOrchestrator, args: AskArgs) -> Result<()> {
    let credentials = args.connection.credentials();
    let mut failures = 0;

    for question in args.questions {
        let request = QueryRequest::new(
            args.connection.user_id.clone(),
            args.connection.connection_id.clone(),
            question,
            credentials.clone(),
        )
        .with_priority_tables(args.priority_tables.clone());

        let outcome = orchestrator.ask(request).await;
        if !outcome.is_success() {
            failures += 1;
        }
        print_outcome(&outcome, args.json)?;
    }

    if failures > 0 {
        bail!("{failures} question(s) failed");
    }
    Ok(())
}

async fn schema(orchestrator: &QueryOrchestrator, args: SchemaArgs) -> Result<()> {
    let context = orchestrator
        .schema_context(
            &args.connection.user_id,
            &args.connection.connection_id,
            &args.connection.credentials(),
            &args.priority_tables,
        )
        .await?;
    print!("{context}");
    Ok(())
}

async fn sql(orchestrator: &QueryOrchestrator, args: SqlArgs) -> Result<()> {
    let outcome = orchestrator
        .run_sql(SqlRequest {
            user_id: args.connection.user_id.clone(),
            connection_id: args.connection.connection_id.clone(),
            sql: args.sql,
            credentials: args.connection.credentials(),
        })
        .await;
    print_outcome(&outcome, args.json)?;
    if !outcome.is_success() {
        bail!("the statement failed");
    }
    Ok(())
}

fn print_outcome(outcome: &QueryOutcome, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(outcome)?);
        return Ok(());
    }

    let attempt = &outcome.attempt;
    println!("Q: {}", attempt.natural_language_query);
    if let Some(sql) = &attempt.generated_sql {
        println!("SQL: {sql}");
    }
    match outcome.message() {
        Some(message) => eprintln!("Error: {message}"),
        None => {
            println!("{}", serde_json::to_string_pretty(&outcome.rows)?);
            println!(
                "({} row(s) in {} ms)",
                attempt.row_count.unwrap_or_default(),
                attempt.execution_time_ms.unwrap_or_default()
            );
        }
    }
    Ok(())
}
