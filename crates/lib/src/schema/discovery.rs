//! # Schema Discovery
//!
//! Learns a remote database's structure by trying strategies from richest to
//! weakest until one finds at least one table:
//!
//! 1. **Privileged**: tables, columns and foreign keys from the catalog.
//! 2. **Restricted**: the same, but a failing foreign-key query is tolerated.
//! 3. **Row sampling**: read one row from each well-known table name and infer
//!    columns from the values that come back.
//!
//! A strategy failure is logged and the next one is tried. Only when every
//! strategy comes up empty does discovery fail.

use super::{ColumnInfo, DiscoveryStrategy, SchemaDescription};
use crate::{errors::AskError, providers::db::storage::DatabaseClient};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use futures::future::join_all;
use serde_json::Value;
use std::collections::HashSet;
use tracing::{debug, info, warn};

/// Table names probed by row sampling when the catalog is unreadable.
pub const DEFAULT_SAMPLE_TABLES: &[&str] = &[
    "users",
    "profiles",
    "accounts",
    "customers",
    "orders",
    "order_items",
    "products",
    "categories",
    "inventory",
    "invoices",
    "payments",
    "transactions",
    "subscriptions",
    "employees",
    "departments",
    "projects",
    "tasks",
    "posts",
    "comments",
    "messages",
    "events",
    "logs",
];

#[derive(Debug, Clone)]
pub struct SchemaDiscovery {
    sample_tables: Vec<String>,
}

impl Default for SchemaDiscovery {
    fn default() -> Self {
        Self::new(DEFAULT_SAMPLE_TABLES.iter().map(|t| t.to_string()).collect())
    }
}

impl SchemaDiscovery {
    /// Creates a discovery pass probing `sample_tables` in the row-sampling tier.
    /// Repeated names are probed once.
    pub fn new(sample_tables: Vec<String>) -> Self {
        let mut seen = HashSet::new();
        let sample_tables = sample_tables
            .into_iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty() && seen.insert(t.clone()))
            .collect();
        Self { sample_tables }
    }

    pub fn sample_tables(&self) -> &[String] {
        &self.sample_tables
    }

    /// Produces a complete [`SchemaDescription`] or fails with `SchemaUnavailable`.
    pub async fn discover(
        &self,
        client: &dyn DatabaseClient,
    ) -> Result<SchemaDescription, AskError> {
        let mut failures = Vec::new();

        for strategy in DiscoveryStrategy::ALL {
            let attempt = match strategy {
                DiscoveryStrategy::Privileged | DiscoveryStrategy::Restricted => {
                    self.introspect_catalog(client, strategy).await
                }
                DiscoveryStrategy::RowSampling => Ok(self.sample_rows(client).await),
            };

            match attempt {
                Ok(schema) if !schema.tables().is_empty() => {
                    info!(
                        provider = client.name(),
                        strategy = %strategy,
                        tables = schema.tables().len(),
                        columns = schema.columns().len(),
                        foreign_keys = schema.foreign_keys().len(),
                        "Schema discovered."
                    );
                    return Ok(schema);
                }
                Ok(_) => {
                    warn!(strategy = %strategy, "Discovery strategy found no tables.");
                    failures.push(format!("{strategy}: no tables found"));
                }
                Err(e) => {
                    warn!(strategy = %strategy, error = %e, "Discovery strategy failed.");
                    failures.push(format!("{strategy}: {e}"));
                }
            }
        }

        Err(AskError::SchemaUnavailable(failures.join("; ")))
    }

    async fn introspect_catalog(
        &self,
        client: &dyn DatabaseClient,
        strategy: DiscoveryStrategy,
    ) -> Result<SchemaDescription, AskError> {
        let tables = client.list_tables().await?;
        let columns = client.list_columns().await?;
        let foreign_keys = match client.list_foreign_keys().await {
            Ok(foreign_keys) => foreign_keys,
            Err(e) if strategy == DiscoveryStrategy::Restricted => {
                warn!(
                    error = %e,
                    "Foreign keys are not readable; continuing without relations."
                );
                Vec::new()
            }
            Err(e) => return Err(e),
        };
        Ok(SchemaDescription::new(
            strategy,
            tables,
            columns,
            foreign_keys,
        ))
    }

    /// Probes every candidate table concurrently; unreachable ones are skipped.
    async fn sample_rows(&self, client: &dyn DatabaseClient) -> SchemaDescription {
        let probes = self.sample_tables.iter().map(|table| async move {
            (table.as_str(), client.fetch_rows(table, 1).await)
        });

        let mut tables = Vec::new();
        let mut columns = Vec::new();
        for (table, result) in join_all(probes).await {
            match result {
                Ok(rows) => {
                    tables.push(table.to_string());
                    if let Some(Value::Object(row)) = rows.first() {
                        columns.extend(row.iter().map(|(name, value)| ColumnInfo {
                            table: table.to_string(),
                            name: name.clone(),
                            data_type: infer_column_type(value).to_string(),
                            nullable: true,
                            default: None,
                        }));
                    } else {
                        debug!(table = %table, "Sampled table is empty; columns unknown.");
                    }
                }
                Err(e) => debug!(table = %table, error = %e, "Sample probe failed."),
            }
        }

        SchemaDescription::new(DiscoveryStrategy::RowSampling, tables, columns, Vec::new())
    }
}

/// Best-effort Postgres type name for a sampled JSON value.
pub fn infer_column_type(value: &Value) -> &'static str {
    match value {
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_i64() || n.is_u64() => "integer",
        Value::Number(_) => "numeric",
        Value::String(s) if looks_like_timestamp(s) => "timestamp",
        _ => "text",
    }
}

fn looks_like_timestamp(s: &str) -> bool {
    DateTime::parse_from_rfc3339(s).is_ok()
        || NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f").is_ok()
        || NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f").is_ok()
        || NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok()
}
