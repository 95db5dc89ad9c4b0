use crate::errors::AskError;
use crate::schema::{ColumnInfo, ForeignKey};
use crate::types::ConnectionCredentials;
use crate::validator::SafeSql;
use async_trait::async_trait;
use serde_json::Value;
use std::fmt::Debug;

/// A trait for interacting with a remote database.
///
/// Each capability may be missing or fail independently (a role without catalog
/// access, a missing helper function), so discovery treats them separately.
#[async_trait]
pub trait DatabaseClient: Send + Sync + Debug {
    /// Returns the name of the database provider (e.g., "PostgREST").
    fn name(&self) -> &str;

    /// Lists the base tables visible in the catalog.
    async fn list_tables(&self) -> Result<Vec<String>, AskError>;

    /// Lists columns from the catalog, ordered by table then declaration order.
    async fn list_columns(&self) -> Result<Vec<ColumnInfo>, AskError>;

    /// Lists foreign-key relations from the catalog.
    async fn list_foreign_keys(&self) -> Result<Vec<ForeignKey>, AskError>;

    /// Reads up to `limit` rows from `table`.
    async fn fetch_rows(&self, table: &str, limit: usize) -> Result<Vec<Value>, AskError>;

    /// Executes a validated statement and returns its rows.
    async fn execute_sql(&self, sql: &SafeSql) -> Result<Vec<Value>, AskError>;
}

/// Creates a [`DatabaseClient`] for a set of decrypted credentials.
pub trait DatabaseConnector: Send + Sync + Debug {
    fn connect(
        &self,
        credentials: &ConnectionCredentials,
    ) -> Result<Box<dyn DatabaseClient>, AskError>;
}
