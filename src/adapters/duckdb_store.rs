//! DuckDB: the embedded analytical store every exercise loads into.
//!
//! A [`DuckDbStore`] owns one connection and is opened per logical operation;
//! dropping it closes the connection, on success and error paths alike.

use crate::adapters::run_blocking;
use crate::core::{RecordSet, Sink};
use crate::domain::model::{Column, ColumnType, Schema, Value};
use crate::utils::error::{EtlError, Result};
use crate::utils::validation::validate_identifier;
use chrono::NaiveDate;
use duckdb::types::{ToSqlOutput, Value as DuckValue};
use duckdb::{params_from_iter, Connection, ToSql};
use std::path::{Path, PathBuf};

/// Double-quote an identifier for interpolation into SQL.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Single-quote a string literal for interpolation into SQL.
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

impl ToSql for Value {
    fn to_sql(&self) -> duckdb::Result<ToSqlOutput<'_>> {
        let value = match self {
            Value::Null => DuckValue::Null,
            Value::Integer(v) => DuckValue::BigInt(*v),
            Value::Float(v) => DuckValue::Double(*v),
            Value::Text(v) => DuckValue::Text(v.clone()),
            // DuckDB casts ISO-8601 text into DATE columns.
            Value::Date(v) => DuckValue::Text(v.format("%Y-%m-%d").to_string()),
            Value::Boolean(v) => DuckValue::Boolean(*v),
        };
        Ok(ToSqlOutput::Owned(value))
    }
}

fn epoch_days_to_date(days: i32) -> Option<NaiveDate> {
    const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;
    NaiveDate::from_num_days_from_ce_opt(days.checked_add(UNIX_EPOCH_DAYS_FROM_CE)?)
}

fn from_duck_value(value: DuckValue) -> Value {
    match value {
        DuckValue::Null => Value::Null,
        DuckValue::Boolean(v) => Value::Boolean(v),
        DuckValue::TinyInt(v) => Value::Integer(v.into()),
        DuckValue::SmallInt(v) => Value::Integer(v.into()),
        DuckValue::Int(v) => Value::Integer(v.into()),
        DuckValue::BigInt(v) => Value::Integer(v),
        DuckValue::HugeInt(v) => i64::try_from(v)
            .map(Value::Integer)
            .unwrap_or(Value::Float(v as f64)),
        DuckValue::UTinyInt(v) => Value::Integer(v.into()),
        DuckValue::USmallInt(v) => Value::Integer(v.into()),
        DuckValue::UInt(v) => Value::Integer(v.into()),
        DuckValue::UBigInt(v) => i64::try_from(v)
            .map(Value::Integer)
            .unwrap_or(Value::Float(v as f64)),
        DuckValue::Float(v) => Value::Float(v.into()),
        DuckValue::Double(v) => Value::Float(v),
        DuckValue::Text(v) => Value::Text(v),
        DuckValue::Date32(days) => epoch_days_to_date(days)
            .map(Value::Date)
            .unwrap_or(Value::Null),
        other => Value::Text(format!("{:?}", other)),
    }
}

fn infer_column_type(rows: &[Vec<Value>], idx: usize) -> ColumnType {
    rows.iter()
        .find_map(|row| match &row[idx] {
            Value::Null => None,
            Value::Integer(_) => Some(ColumnType::Integer),
            Value::Float(_) => Some(ColumnType::Float),
            Value::Text(_) => Some(ColumnType::Text),
            Value::Date(_) => Some(ColumnType::Date),
            Value::Boolean(_) => Some(ColumnType::Boolean),
        })
        .unwrap_or(ColumnType::Text)
}

pub struct DuckDbStore {
    conn: Connection,
}

impl DuckDbStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        tracing::debug!("Opening DuckDB at {}", path.display());
        Ok(Self {
            conn: Connection::open(path)?,
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        Ok(Self {
            conn: Connection::open_in_memory()?,
        })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Run one or more `;`-separated statements.
    pub fn execute_batch(&self, sql: &str) -> Result<()> {
        tracing::debug!(sql = %sql.trim(), "execute_batch");
        self.conn.execute_batch(sql)?;
        Ok(())
    }

    /// Run `sql` between `BEGIN` and `COMMIT`, rolling back if any statement fails.
    pub fn execute_in_transaction(&self, sql: &str) -> Result<()> {
        self.execute_batch("BEGIN TRANSACTION")?;
        let outcome = self
            .execute_batch(sql)
            .and_then(|_| self.execute_batch("COMMIT"));
        if let Err(e) = outcome {
            if let Err(rollback) = self.execute_batch("ROLLBACK") {
                tracing::warn!(error = %rollback, "Rollback failed");
            }
            return Err(e);
        }
        Ok(())
    }

    /// Run a single statement and return the number of affected rows.
    pub fn execute(&self, sql: &str) -> Result<usize> {
        tracing::debug!(sql = %sql.trim(), "execute");
        Ok(self.conn.execute(sql, [])?)
    }

    pub fn table_exists(&self, table: &str) -> Result<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM information_schema.tables WHERE table_name = ?",
            [table],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    pub fn count_rows(&self, table: &str) -> Result<usize> {
        validate_identifier("table", table)?;
        let sql = format!("SELECT COUNT(*) FROM {}", quote_ident(table));
        let count: i64 = self.conn.query_row(&sql, [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// `CREATE TABLE IF NOT EXISTS` with one column per schema column.
    pub fn create_table(&self, table: &str, schema: &Schema) -> Result<()> {
        validate_identifier("table", table)?;
        if schema.columns.is_empty() {
            return Err(EtlError::ProcessingError {
                message: format!("cannot create table {} without columns", table),
            });
        }
        let columns = schema
            .columns
            .iter()
            .map(|c| format!("{} {}", quote_ident(&c.name), c.column_type.sql_type()))
            .collect::<Vec<_>>()
            .join(", ");
        self.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS {} ({})",
            quote_ident(table),
            columns
        ))
    }

    pub fn drop_table(&self, table: &str) -> Result<()> {
        validate_identifier("table", table)?;
        self.execute_batch(&format!("DROP TABLE IF EXISTS {}", quote_ident(table)))
    }

    /// Append every row of `data` to `table` inside one transaction.
    pub fn insert(&mut self, table: &str, data: &RecordSet) -> Result<usize> {
        validate_identifier("table", table)?;
        if data.is_empty() {
            return Ok(0);
        }

        let column_list = data
            .schema
            .names()
            .map(quote_ident)
            .collect::<Vec<_>>()
            .join(", ");
        let placeholders = vec!["?"; data.schema.columns.len()].join(", ");
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quote_ident(table),
            column_list,
            placeholders
        );

        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(&sql)?;
            for row in &data.rows {
                stmt.execute(params_from_iter(row.iter()))?;
            }
        }
        tx.commit()?;
        Ok(data.len())
    }

    /// Bulk load a delimited file with DuckDB's own CSV reader.
    pub fn load_csv(&self, table: &str, csv_path: impl AsRef<Path>) -> Result<usize> {
        validate_identifier("table", table)?;
        let csv_path = csv_path.as_ref();
        if !csv_path.exists() {
            return Err(EtlError::IoError(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("CSV file not found: {}", csv_path.display()),
            )));
        }
        let sql = format!(
            "INSERT INTO {} SELECT * FROM read_csv_auto({}, header = true)",
            quote_ident(table),
            quote_literal(&csv_path.to_string_lossy())
        );
        self.execute(&sql)
    }

    /// Run a query and materialise the result as a record set.
    ///
    /// Column types are inferred from the first non-null value of each column.
    pub fn query(&self, sql: &str) -> Result<RecordSet> {
        tracing::debug!(sql = %sql.trim(), "query");
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows: Vec<Vec<Value>> = Vec::new();
        {
            let mut result = stmt.query([])?;
            while let Some(row) = result.next()? {
                let width = row.as_ref().column_count();
                let mut values = Vec::with_capacity(width);
                for i in 0..width {
                    values.push(from_duck_value(row.get::<_, DuckValue>(i)?));
                }
                rows.push(values);
            }
        }

        let names = stmt.column_names();
        let columns = names
            .into_iter()
            .enumerate()
            .map(|(idx, name)| Column::new(name, infer_column_type(&rows, idx)))
            .collect();

        Ok(RecordSet::new(Schema::new(columns), rows))
    }

    pub fn select_all(&self, table: &str) -> Result<RecordSet> {
        validate_identifier("table", table)?;
        self.query(&format!("SELECT * FROM {}", quote_ident(table)))
    }
}

/// How a [`DuckDbSink`] treats an existing destination table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadMode {
    /// Create the table if it is missing, then append.
    #[default]
    Append,
    /// Drop and recreate the table before inserting.
    Replace,
}

/// Loads record sets into a DuckDB file, opening a fresh handle per load.
#[derive(Debug, Clone)]
pub struct DuckDbSink {
    path: PathBuf,
    mode: LoadMode,
}

impl DuckDbSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            mode: LoadMode::default(),
        }
    }

    pub fn with_mode(mut self, mode: LoadMode) -> Self {
        self.mode = mode;
        self
    }

    fn load_blocking(&self, table: &str, data: &RecordSet) -> Result<usize> {
        let mut store = DuckDbStore::open(&self.path)?;
        if self.mode == LoadMode::Replace {
            store.drop_table(table)?;
        }
        store.create_table(table, &data.schema)?;
        store.insert(table, data)
    }
}

impl Sink for DuckDbSink {
    fn describe(&self) -> String {
        format!("duckdb:{}", self.path.display())
    }

    async fn load(&self, table: &str, data: &RecordSet) -> Result<usize> {
        let (sink, table, data) = (self.clone(), table.to_string(), data.clone());
        run_blocking(move || sink.load_blocking(&table, &data)).await
    }
}
