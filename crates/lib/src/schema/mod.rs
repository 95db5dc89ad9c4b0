//! # Schema Description
//!
//! A normalized view of a remote database's structure, produced by
//! [`discovery`] and rendered into prompt context by [`format`].

pub mod discovery;
pub mod format;

pub use discovery::SchemaDiscovery;
pub use format::format_schema;

use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use tracing::warn;

/// The discovery method that produced a [`SchemaDescription`], richest first.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DiscoveryStrategy {
    /// Tables, columns and foreign keys from the catalog.
    Privileged,
    /// Tables and columns from the catalog; foreign keys were not readable.
    Restricted,
    /// Tables found by reading one row from well-known names; column types inferred.
    RowSampling,
}

impl DiscoveryStrategy {
    pub const ALL: [DiscoveryStrategy; 3] = [Self::Privileged, Self::Restricted, Self::RowSampling];

    /// Whether columns come from the catalog rather than from sampled values.
    pub fn is_column_level(self) -> bool {
        matches!(self, Self::Privileged | Self::Restricted)
    }
}

impl fmt::Display for DiscoveryStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Privileged => "privileged introspection",
            Self::Restricted => "restricted introspection",
            Self::RowSampling => "row sampling",
        };
        f.write_str(label)
    }
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    pub table: String,
    pub name: String,
    pub data_type: String,
    pub nullable: bool,
    pub default: Option<String>,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct ForeignKey {
    pub table: String,
    pub column: String,
    pub foreign_table: String,
    pub foreign_column: String,
}

/// The structure of a remote database. Immutable once built.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct SchemaDescription {
    strategy: DiscoveryStrategy,
    tables: Vec<String>,
    columns: Vec<ColumnInfo>,
    foreign_keys: Vec<ForeignKey>,
}

impl SchemaDescription {
    /// Builds a description, normalizing its parts:
    ///
    /// * table names are de-duplicated, keeping first-seen order;
    /// * a table referenced only by a column is added to `tables`;
    /// * for catalog strategies, foreign keys whose source column is unknown are dropped.
    pub fn new(
        strategy: DiscoveryStrategy,
        tables: Vec<String>,
        columns: Vec<ColumnInfo>,
        foreign_keys: Vec<ForeignKey>,
    ) -> Self {
        let mut seen = HashSet::new();
        let mut unique_tables = Vec::with_capacity(tables.len());
        for table in tables
            .into_iter()
            .chain(columns.iter().map(|c| c.table.clone()))
        {
            if seen.insert(table.clone()) {
                unique_tables.push(table);
            }
        }

        let foreign_keys = if strategy.is_column_level() {
            let known: HashSet<(&str, &str)> = columns
                .iter()
                .map(|c| (c.table.as_str(), c.name.as_str()))
                .collect();
            let (kept, dropped): (Vec<_>, Vec<_>) = foreign_keys
                .into_iter()
                .partition(|fk| known.contains(&(fk.table.as_str(), fk.column.as_str())));
            for fk in &dropped {
                warn!(
                    table = %fk.table,
                    column = %fk.column,
                    "Dropping foreign key that references an undiscovered column."
                );
            }
            kept
        } else {
            foreign_keys
        };

        Self {
            strategy,
            tables: unique_tables,
            columns,
            foreign_keys,
        }
    }

    pub fn strategy(&self) -> DiscoveryStrategy {
        self.strategy
    }

    pub fn tables(&self) -> &[String] {
        &self.tables
    }

    pub fn columns(&self) -> &[ColumnInfo] {
        &self.columns
    }

    pub fn foreign_keys(&self) -> &[ForeignKey] {
        &self.foreign_keys
    }

    /// Columns of `table` in their recorded order.
    pub fn columns_for<'a>(&'a self, table: &'a str) -> impl Iterator<Item = &'a ColumnInfo> + 'a {
        self.columns.iter().filter(move |c| c.table == table)
    }

    /// True when the schema came from a weaker strategy and may be incomplete.
    pub fn is_degraded(&self) -> bool {
        self.strategy != DiscoveryStrategy::Privileged
    }
}
