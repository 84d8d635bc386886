use crate::adapters::duckdb_store::quote_ident;
use crate::adapters::run_blocking;
use crate::core::{RecordSet, Source};
use crate::domain::model::{Column, ColumnType, Schema, Value};
use crate::utils::error::Result;
use crate::utils::validation::validate_identifier;
use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags};
use std::path::PathBuf;

/// Reads a whole table out of a SQLite file.
#[derive(Debug, Clone)]
pub struct SqliteSource {
    db_path: PathBuf,
    table: String,
}

impl SqliteSource {
    pub fn new(db_path: impl Into<PathBuf>, table: impl Into<String>) -> Self {
        Self {
            db_path: db_path.into(),
            table: table.into(),
        }
    }

    fn read_table(&self) -> Result<RecordSet> {
        validate_identifier("sqlite.table", &self.table)?;
        let conn = Connection::open_with_flags(&self.db_path, OpenFlags::SQLITE_OPEN_READ_ONLY)?;

        let sql = format!("SELECT * FROM {}", quote_ident(&self.table));
        let mut stmt = conn.prepare(&sql)?;
        let names: Vec<String> = stmt
            .column_names()
            .into_iter()
            .map(str::to_string)
            .collect();
        let width = names.len();

        let mut rows = Vec::new();
        let mut result = stmt.query([])?;
        while let Some(row) = result.next()? {
            let mut values = Vec::with_capacity(width);
            for i in 0..width {
                values.push(match row.get_ref(i)? {
                    ValueRef::Null => Value::Null,
                    ValueRef::Integer(n) => Value::Integer(n),
                    ValueRef::Real(f) => Value::Float(f),
                    ValueRef::Text(t) => Value::Text(String::from_utf8_lossy(t).into_owned()),
                    ValueRef::Blob(b) => {
                        tracing::warn!(column = %names[i], bytes = b.len(), "Skipping BLOB value");
                        Value::Null
                    }
                });
            }
            rows.push(values);
        }

        // SQLite is dynamically typed: take each column's type from its first non-null value.
        let columns = names
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let column_type = rows
                    .iter()
                    .find_map(|row: &Vec<Value>| match &row[i] {
                        Value::Integer(_) => Some(ColumnType::Integer),
                        Value::Float(_) => Some(ColumnType::Float),
                        Value::Text(_) => Some(ColumnType::Text),
                        _ => None,
                    })
                    .unwrap_or(ColumnType::Text);
                Column::new(name.clone(), column_type)
            })
            .collect();

        tracing::debug!(rows = rows.len(), table = %self.table, "Read SQLite table");
        Ok(RecordSet::new(Schema::new(columns), rows))
    }
}

impl Source for SqliteSource {
    fn describe(&self) -> String {
        format!("sqlite:{}", self.table)
    }

    async fn extract(&self) -> Result<RecordSet> {
        let source = self.clone();
        run_blocking(move || source.read_table()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::error::EtlError;
    use tempfile::TempDir;

    fn seed(dir: &TempDir) -> PathBuf {
        let path = dir.path().join("tpch.db");
        let conn = Connection::open(&path).unwrap();
        conn.execute_batch(
            "CREATE TABLE Customer (c_custkey INTEGER, c_name TEXT, c_acctbal REAL, c_comment TEXT);
             INSERT INTO Customer VALUES (1, 'Customer#000000001', 711.56, NULL);
             INSERT INTO Customer VALUES (2, 'Customer#000000002', 121.65, 'regular');",
        )
        .unwrap();
        path
    }

    #[tokio::test]
    async fn test_extract_reads_all_rows_with_types() {
        let dir = TempDir::new().unwrap();
        let source = SqliteSource::new(seed(&dir), "Customer");

        let rs = source.extract().await.unwrap();

        assert_eq!(rs.len(), 2);
        assert_eq!(
            rs.schema.columns,
            vec![
                Column::new("c_custkey", ColumnType::Integer),
                Column::new("c_name", ColumnType::Text),
                Column::new("c_acctbal", ColumnType::Float),
                Column::new("c_comment", ColumnType::Text),
            ]
        );
        assert_eq!(rs.rows[0][2], Value::Float(711.56));
        assert_eq!(rs.rows[0][3], Value::Null);
    }

    #[tokio::test]
    async fn test_extract_missing_table_is_sqlite_error() {
        let dir = TempDir::new().unwrap();
        let source = SqliteSource::new(seed(&dir), "Orders");

        let err = source.extract().await.unwrap_err();
        assert!(matches!(err, EtlError::SqliteError(_)));
    }
}
