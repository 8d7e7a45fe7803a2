//! Parquet writer backed by an embedded DuckDB connection.
//!
//! Rows are loaded into an in-memory table with batched multi-row INSERTs
//! and exported with `COPY ... TO ... (FORMAT PARQUET)`. The same writer is
//! the chunker's [`SizeProbe`]: measuring a sample means writing it for real.

use crate::chunker::SizeProbe;
use anyhow::{Context, Result};
use duckdb::Connection;
use std::fs;
use std::path::{Path, PathBuf};
use synth_records::{Record, TableKind, Value};
use tempfile::TempPath;

/// Rows per generated INSERT statement
pub const INSERT_BATCH_ROWS: usize = 1_000;

/// File extension used for staged and uploaded files
pub const PARQUET_EXTENSION: &str = "parquet";

/// Writes record batches as Parquet files
#[derive(Debug, Clone, Default)]
pub struct ParquetWriter {
    /// Directory for staged files (system temp dir if `None`)
    staging_dir: Option<PathBuf>,
    /// Parquet compression codec
    compression: Compression,
}

/// Parquet column compression
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Compression {
    #[default]
    Snappy,
    Zstd,
    Uncompressed,
}

impl Compression {
    fn as_duckdb(&self) -> &'static str {
        match self {
            Compression::Snappy => "SNAPPY",
            Compression::Zstd => "ZSTD",
            Compression::Uncompressed => "UNCOMPRESSED",
        }
    }
}

impl std::str::FromStr for Compression {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "snappy" => Ok(Compression::Snappy),
            "zstd" => Ok(Compression::Zstd),
            "none" | "uncompressed" => Ok(Compression::Uncompressed),
            _ => Err(format!(
                "Unknown compression: {}. Valid options: snappy, zstd, none",
                s
            )),
        }
    }
}

impl ParquetWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_staging_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.staging_dir = dir;
        self
    }

    pub fn with_compression(mut self, compression: Compression) -> Self {
        self.compression = compression;
        self
    }

    /// Write `rows` to `path`, returning the file size in bytes.
    pub fn write(&self, table: TableKind, rows: &[Record], path: &Path) -> Result<u64> {
        let conn = Connection::open_in_memory()
            .context("Failed to create in-memory DuckDB database")?;

        conn.execute_batch(&create_table_sql(table))
            .with_context(|| format!("Failed to create staging table for {}", table))?;

        for batch in rows.chunks(INSERT_BATCH_ROWS) {
            conn.execute_batch(&generate_batch_insert(table, batch))
                .with_context(|| format!("Failed to load rows into {}", table))?;
        }

        let copy_sql = format!(
            "COPY \"{}\" TO '{}' (FORMAT PARQUET, COMPRESSION {})",
            table.name(),
            escape_string(&path.to_string_lossy()),
            self.compression.as_duckdb()
        );
        conn.execute_batch(&copy_sql)
            .with_context(|| format!("Failed to write Parquet file {}", path.display()))?;

        let size = fs::metadata(path)
            .with_context(|| format!("Failed to stat {}", path.display()))?
            .len();
        Ok(size)
    }

    /// Write `rows` to a fresh temporary file that is deleted when the
    /// returned path is dropped.
    pub fn stage(&self, table: TableKind, rows: &[Record]) -> Result<TempPath> {
        let prefix = format!("{}_", table.name());
        let suffix = format!(".{}", PARQUET_EXTENSION);
        let mut builder = tempfile::Builder::new();
        builder.prefix(&prefix).suffix(&suffix);

        let file = match &self.staging_dir {
            Some(dir) => {
                fs::create_dir_all(dir)
                    .with_context(|| format!("Failed to create staging dir {}", dir.display()))?;
                builder.tempfile_in(dir)
            }
            None => builder.tempfile(),
        }
        .context("Failed to create staging file")?;

        // Close our handle so DuckDB can replace the file on every platform.
        let path = file.into_temp_path();
        self.write(table, rows, &path)?;
        Ok(path)
    }
}

impl SizeProbe for ParquetWriter {
    fn measure(&self, table: TableKind, rows: &[Record]) -> Result<u64> {
        let staged = self.stage(table, rows)?;
        let size = fs::metadata(&staged)?.len();
        staged.close()?;
        Ok(size)
    }
}

/// `CREATE TABLE` for a table's column catalog
fn create_table_sql(table: TableKind) -> String {
    let columns: Vec<String> = table
        .columns()
        .iter()
        .map(|c| {
            let null = if c.nullable { "" } else { " NOT NULL" };
            format!("\"{}\" {}{}", c.name, c.ty.to_duckdb(), null)
        })
        .collect();
    format!("CREATE TABLE \"{}\" ({});", table.name(), columns.join(", "))
}

fn escape_string(s: &str) -> String {
    s.replace('\'', "''")
}

/// Format a value as a DuckDB SQL literal
fn format_value_for_sql(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Id(n) => n.to_string(),
        Value::Int(n) => n.to_string(),
        Value::Float(f) if f.is_finite() => format!("{:?}", f),
        Value::Float(_) => "NULL".to_string(),
        Value::Text(s) => format!("'{}'", escape_string(s)),
        Value::Bool(true) => "TRUE".to_string(),
        Value::Bool(false) => "FALSE".to_string(),
        Value::Date(d) => format!("DATE '{}'", d.format("%Y-%m-%d")),
        Value::Timestamp(ts) => format!("TIMESTAMP '{}'", ts.format("%Y-%m-%d %H:%M:%S%.f")),
    }
}

/// Generate a batched INSERT statement for `rows`
fn generate_batch_insert(table: TableKind, rows: &[Record]) -> String {
    if rows.is_empty() {
        return String::new();
    }

    let mut sql = format!("INSERT INTO \"{}\" VALUES\n", table.name());
    for (i, row) in rows.iter().enumerate() {
        if i > 0 {
            sql.push_str(",\n");
        }
        sql.push('(');
        for (j, value) in row.iter().enumerate() {
            if j > 0 {
                sql.push_str(", ");
            }
            sql.push_str(&format_value_for_sql(value));
        }
        sql.push(')');
    }
    sql.push(';');

    sql
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_format_values() {
        assert_eq!(format_value_for_sql(&Value::Null), "NULL");
        assert_eq!(format_value_for_sql(&Value::Id(42)), "42");
        assert_eq!(format_value_for_sql(&Value::Float(1.0)), "1.0");
        assert_eq!(format_value_for_sql(&Value::Float(f64::NAN)), "NULL");
        assert_eq!(
            format_value_for_sql(&Value::Text("O'Brien".to_string())),
            "'O''Brien'"
        );
        assert_eq!(format_value_for_sql(&Value::Bool(true)), "TRUE");
        let date = NaiveDate::from_ymd_opt(2025, 5, 30).unwrap();
        assert_eq!(format_value_for_sql(&Value::Date(date)), "DATE '2025-05-30'");
        let ts = date.and_hms_opt(14, 30, 5).unwrap();
        assert_eq!(
            format_value_for_sql(&Value::Timestamp(ts)),
            "TIMESTAMP '2025-05-30 14:30:05'"
        );
    }

    #[test]
    fn test_generate_batch_insert() {
        let rows = vec![
            vec![Value::Id(1), Value::Text("a".to_string())],
            vec![Value::Id(2), Value::Null],
        ];
        let sql = generate_batch_insert(TableKind::Users, &rows);
        assert_eq!(sql, "INSERT INTO \"users\" VALUES\n(1, 'a'),\n(2, NULL);");
        assert!(generate_batch_insert(TableKind::Users, &[]).is_empty());
    }

    #[test]
    fn test_create_table_marks_nullable_columns() {
        let sql = create_table_sql(TableKind::Users);
        assert!(sql.starts_with("CREATE TABLE \"users\" (\"user_id\" UBIGINT NOT NULL"));
        assert!(sql.contains("\"address_line_2\" VARCHAR,"));
    }
}
