use crate::{
    constants::DEFAULT_REQUEST_TIMEOUT_SECS,
    errors::AskError,
    providers::db::storage::{DatabaseClient, DatabaseConnector},
    schema::{ColumnInfo, ForeignKey},
    types::ConnectionCredentials,
    validator::{self, SafeSql},
};
use async_trait::async_trait;
use reqwest::{Client as ReqwestClient, RequestBuilder, Response, Url};
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::{json, Value};
use std::fmt::{self, Debug};
use std::time::Duration;
use tracing::debug;

pub mod sql;

/// The RPC function used for SQL execution unless configured otherwise.
pub const DEFAULT_RPC_FUNCTION: &str = "execute_sql";

/// The per-request timeout unless configured otherwise.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS);

// --- Catalog row shapes ---

#[derive(Deserialize, Debug)]
struct TableRow {
    table_name: String,
}

#[derive(Deserialize, Debug)]
struct ColumnRow {
    table_name: String,
    column_name: String,
    data_type: String,
    is_nullable: String,
    column_default: Option<String>,
}

#[derive(Deserialize, Debug)]
struct ForeignKeyRow {
    table_name: String,
    column_name: String,
    foreign_table_name: String,
    foreign_column_name: String,
}

// --- PostgREST client ---

/// A client for a PostgREST-compatible HTTP interface to a Postgres database.
///
/// Rows are read with `GET /rest/v1/<table>`; SQL (including catalog queries)
/// goes through `POST /rest/v1/rpc/<function>` with a `{"query": ...}` body.
#[derive(Clone)]
pub struct PostgrestClient {
    client: ReqwestClient,
    base_url: Url,
    api_key: String,
    bearer_token: String,
    rpc_function: String,
}

impl PostgrestClient {
    /// Creates a new `PostgrestClient`.
    pub fn new(
        credentials: &ConnectionCredentials,
        timeout: Duration,
        rpc_function: impl Into<String>,
    ) -> Result<Self, AskError> {
        let raw = credentials.base_url.trim();
        let base_url = Url::parse(raw).map_err(|e| AskError::InvalidDatabaseUrl {
            url: raw.to_string(),
            reason: e.to_string(),
        })?;
        if !matches!(base_url.scheme(), "http" | "https") || base_url.cannot_be_a_base() {
            return Err(AskError::InvalidDatabaseUrl {
                url: raw.to_string(),
                reason: "expected an http(s) URL".to_string(),
            });
        }

        let client = ReqwestClient::builder()
            .timeout(timeout)
            .build()
            .map_err(AskError::ReqwestClientBuild)?;

        Ok(Self {
            client,
            base_url,
            api_key: credentials.api_key.clone(),
            bearer_token: credentials.bearer_token().to_string(),
            rpc_function: rpc_function.into(),
        })
    }

    /// Builds `<base>/rest/v1/<segments...>`, percent-encoding each segment.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, AskError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| AskError::InvalidDatabaseUrl {
                url: self.base_url.to_string(),
                reason: "URL cannot carry a path".to_string(),
            })?
            .pop_if_empty()
            .extend(["rest", "v1"])
            .extend(segments);
        Ok(url)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", &self.api_key)
            .bearer_auth(&self.bearer_token)
            .header("Accept", "application/json")
    }

    async fn call_rpc(&self, sql: &SafeSql) -> Result<Vec<Value>, AskError> {
        let url = self.endpoint(&["rpc", &self.rpc_function])?;
        debug!(function = %self.rpc_function, sql = %sql, "--> Executing SQL via RPC");
        let response = self
            .authorize(self.client.post(url))
            .json(&json!({ "query": sql.as_str() }))
            .send()
            .await
            .map_err(AskError::DatabaseRequest)?;
        read_rows(response).await
    }

    async fn catalog_query<T: DeserializeOwned>(&self, sql: &str) -> Result<Vec<T>, AskError> {
        let safe = validator::validate(sql)
            .map_err(|reason| AskError::UnsafeQuery(reason.to_string()))?;
        self.call_rpc(&safe)
            .await?
            .into_iter()
            .map(|row| {
                serde_json::from_value(row).map_err(|e| AskError::DatabaseDecode(e.to_string()))
            })
            .collect()
    }
}

impl Debug for PostgrestClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PostgrestClient")
            .field("base_url", &self.base_url.as_str())
            .field("rpc_function", &self.rpc_function)
            .finish_non_exhaustive()
    }
}

/// Turns a PostgREST response into rows, mapping error statuses to `DatabaseApi`.
async fn read_rows(response: Response) -> Result<Vec<Value>, AskError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(AskError::DatabaseApi {
            status: status.as_u16(),
            message: error_message(&body),
        });
    }

    let body: Value = response
        .json()
        .await
        .map_err(|e| AskError::DatabaseDecode(e.to_string()))?;

    Ok(match body {
        Value::Array(rows) => rows,
        Value::Null => Vec::new(),
        other => vec![other],
    })
}

/// Prefers PostgREST's `message` field, falling back to the raw body.
fn error_message(body: &str) -> String {
    let parsed = serde_json::from_str::<Value>(body).ok();
    if let Some(message) = parsed
        .as_ref()
        .and_then(|v| v.get("message"))
        .and_then(Value::as_str)
    {
        return message.to_string();
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        "empty error response".to_string()
    } else {
        trimmed.to_string()
    }
}

#[async_trait]
impl DatabaseClient for PostgrestClient {
    fn name(&self) -> &str {
        "PostgREST"
    }

    async fn list_tables(&self) -> Result<Vec<String>, AskError> {
        let rows: Vec<TableRow> = self.catalog_query(sql::LIST_TABLES).await?;
        Ok(rows.into_iter().map(|r| r.table_name).collect())
    }

    async fn list_columns(&self) -> Result<Vec<ColumnInfo>, AskError> {
        let rows: Vec<ColumnRow> = self.catalog_query(sql::LIST_COLUMNS).await?;
        Ok(rows
            .into_iter()
            .map(|r| ColumnInfo {
                table: r.table_name,
                name: r.column_name,
                data_type: r.data_type,
                nullable: !r.is_nullable.eq_ignore_ascii_case("NO"),
                default: r.column_default,
            })
            .collect())
    }

    async fn list_foreign_keys(&self) -> Result<Vec<ForeignKey>, AskError> {
        let rows: Vec<ForeignKeyRow> = self.catalog_query(sql::LIST_FOREIGN_KEYS).await?;
        Ok(rows
            .into_iter()
            .map(|r| ForeignKey {
                table: r.table_name,
                column: r.column_name,
                foreign_table: r.foreign_table_name,
                foreign_column: r.foreign_column_name,
            })
            .collect())
    }

    async fn fetch_rows(&self, table: &str, limit: usize) -> Result<Vec<Value>, AskError> {
        let url = self.endpoint(&[table])?;
        debug!(table = %table, limit, "--> Fetching rows");
        let response = self
            .authorize(self.client.get(url))
            .query(&[("select", "*".to_string()), ("limit", limit.to_string())])
            .send()
            .await
            .map_err(AskError::DatabaseRequest)?;
        read_rows(response).await
    }

    async fn execute_sql(&self, sql: &SafeSql) -> Result<Vec<Value>, AskError> {
        self.call_rpc(sql).await
    }
}

/// Builds a [`PostgrestClient`] per set of credentials.
#[derive(Debug, Clone)]
pub struct PostgrestConnector {
    timeout: Duration,
    rpc_function: String,
}

impl PostgrestConnector {
    pub fn new(timeout: Duration, rpc_function: impl Into<String>) -> Self {
        Self {
            timeout,
            rpc_function: rpc_function.into(),
        }
    }
}

impl Default for PostgrestConnector {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT, DEFAULT_RPC_FUNCTION)
    }
}

impl DatabaseConnector for PostgrestConnector {
    fn connect(
        &self,
        credentials: &ConnectionCredentials,
    ) -> Result<Box<dyn DatabaseClient>, AskError> {
        Ok(Box::new(PostgrestClient::new(
            credentials,
            self.timeout,
            self.rpc_function.clone(),
        )?))
    }
}
