//! Renders a [`SchemaDescription`] as compact pseudo-DDL for a model prompt.
//!
//! Output is a pure function of its inputs so cached and freshly built
//! contexts are byte-identical.

use super::{ColumnInfo, SchemaDescription};
use std::collections::HashSet;
use std::fmt::Write;

/// Formats `schema`, listing `priority_tables` first in the given order and
/// the remaining tables sorted by name.
///
/// Priority names that are not in the schema are ignored, as are repeats.
pub fn format_schema(schema: &SchemaDescription, priority_tables: &[String]) -> String {
    let mut out = String::new();

    if schema.is_degraded() {
        let _ = writeln!(
            out,
            "-- Schema discovered via {}; it may be incomplete.",
            schema.strategy()
        );
        out.push('\n');
    }

    let known: HashSet<&str> = schema.tables().iter().map(String::as_str).collect();
    let mut ordered: Vec<&str> = Vec::with_capacity(known.len());
    let mut placed = HashSet::new();
    for table in priority_tables {
        let table = table.as_str();
        if known.contains(table) && placed.insert(table) {
            ordered.push(table);
        }
    }
    let mut rest: Vec<&str> = schema
        .tables()
        .iter()
        .map(String::as_str)
        .filter(|t| !placed.contains(t))
        .collect();
    rest.sort_unstable();
    ordered.extend(rest);

    for (i, table) in ordered.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        write_table(&mut out, table, schema.columns_for(table));
    }

    if !schema.foreign_keys().is_empty() {
        out.push_str("\n-- Foreign keys\n");
        for fk in schema.foreign_keys() {
            let _ = writeln!(
                out,
                "-- {}.{} -> {}.{}",
                fk.table, fk.column, fk.foreign_table, fk.foreign_column
            );
        }
    }

    out
}

fn write_table<'a>(out: &mut String, table: &str, columns: impl Iterator<Item = &'a ColumnInfo>) {
    let lines: Vec<String> = columns.map(column_definition).collect();
    let _ = writeln!(out, "CREATE TABLE {table} (");
    if lines.is_empty() {
        out.push_str("  -- columns unknown\n");
    } else {
        out.push_str(&lines.join(",\n"));
        out.push('\n');
    }
    out.push_str(");\n");
}

fn column_definition(column: &ColumnInfo) -> String {
    let mut line = format!("  {} {}", column.name, column.data_type.to_uppercase());
    if !column.nullable {
        line.push_str(" NOT NULL");
    }
    if let Some(default) = &column.default {
        let _ = write!(line, " DEFAULT {default}");
    }
    line
}
