//! The same cleaning steps as [`super::frame`], issued as SQL against one
//! DuckDB table. Each method mutates the table in place.

use super::{Aggregate, AgeBuckets, CategoryMapping, GroupAggregate, OutlierRule};
use crate::adapters::duckdb_store::{quote_ident, quote_literal, DuckDbStore};
use crate::domain::model::{ColumnType, Value};
use crate::domain::records::columns::{FIRST_NAME, LAST_NAME};
use crate::domain::records::Customer;
use crate::utils::error::{EtlError, Result};
use crate::utils::validation::validate_identifier;
use std::path::Path;

const NUMERIC: &[ColumnType] = &[ColumnType::Integer, ColumnType::Float];

fn column_type_from_sql(data_type: &str) -> ColumnType {
    let upper = data_type.to_ascii_uppercase();
    match upper.as_str() {
        "TINYINT" | "SMALLINT" | "INTEGER" | "BIGINT" | "HUGEINT" | "UTINYINT" | "USMALLINT"
        | "UINTEGER" | "UBIGINT" => ColumnType::Integer,
        "FLOAT" | "REAL" | "DOUBLE" => ColumnType::Float,
        "DATE" => ColumnType::Date,
        "BOOLEAN" => ColumnType::Boolean,
        other if other.starts_with("DECIMAL") => ColumnType::Float,
        _ => ColumnType::Text,
    }
}

/// Transform helpers bound to one table of a [`DuckDbStore`].
pub struct SqlTransforms<'a> {
    store: &'a DuckDbStore,
    table: String,
}

impl<'a> SqlTransforms<'a> {
    pub fn new(store: &'a DuckDbStore, table: impl Into<String>) -> Result<Self> {
        let table = table.into();
        validate_identifier("transform.table", &table)?;
        Ok(Self { store, table })
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    fn quoted_table(&self) -> String {
        quote_ident(&self.table)
    }

    /// Create the customer table if it is missing.
    pub fn create_customer_table(&self) -> Result<()> {
        self.store.create_table(&self.table, &Customer::schema())
    }

    /// Append the rows of a customer CSV. Loading the same file twice is how
    /// the walkthrough produces duplicates to clean up.
    pub fn load_csv(&self, csv_path: impl AsRef<Path>) -> Result<usize> {
        self.create_customer_table()?;
        let loaded = self.store.load_csv(&self.table, csv_path)?;
        tracing::debug!(rows = loaded, table = %self.table, "Loaded CSV");
        Ok(loaded)
    }

    /// Drop the table, recreate it with the customer schema and reload the CSV.
    pub fn reset(&self, csv_path: impl AsRef<Path>) -> Result<usize> {
        self.store.drop_table(&self.table)?;
        self.load_csv(csv_path)
    }

    pub fn row_count(&self) -> Result<usize> {
        self.store.count_rows(&self.table)
    }

    fn column_type(&self, column: &str) -> Result<ColumnType> {
        let found = self.store.query(&format!(
            "SELECT data_type FROM information_schema.columns \
             WHERE table_name = {} AND column_name = {}",
            quote_literal(&self.table),
            quote_literal(column)
        ))?;
        found
            .rows
            .first()
            .and_then(|row| row[0].as_str())
            .map(column_type_from_sql)
            .ok_or_else(|| EtlError::MissingColumnError {
                column: column.to_string(),
            })
    }

    fn expect_type(&self, column: &str, allowed: &[ColumnType]) -> Result<ColumnType> {
        let actual = self.column_type(column)?;
        if !allowed.contains(&actual) {
            return Err(EtlError::TypeMismatchError {
                column: column.to_string(),
                expected: allowed
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(" or "),
                actual: actual.to_string(),
            });
        }
        Ok(actual)
    }

    /// Null count per requested column, in request order.
    pub fn null_counts(&self, columns: &[&str]) -> Result<Vec<(String, usize)>> {
        columns
            .iter()
            .map(|column| {
                self.column_type(column)?;
                let sql = format!(
                    "SELECT COUNT(*) FROM {} WHERE {} IS NULL",
                    self.quoted_table(),
                    quote_ident(column)
                );
                let nulls: i64 = self
                    .store
                    .connection()
                    .query_row(&sql, [], |row| row.get(0))?;
                Ok((column.to_string(), nulls as usize))
            })
            .collect()
    }

    /// Keep the row with the greatest `order_by` per `key`; returns the rows left.
    ///
    /// Ties keep the lowest `rowid`. The table is rewritten in key order.
    pub fn deduplicate_latest(&self, key: &str, order_by: &str) -> Result<usize> {
        self.column_type(key)?;
        self.column_type(order_by)?;
        let (table, key, order_by) = (self.quoted_table(), quote_ident(key), quote_ident(order_by));

        self.store.execute_in_transaction(&format!(
            "CREATE OR REPLACE TEMP TABLE __latest AS
               SELECT * EXCLUDE (__rank) FROM (
                 SELECT *, ROW_NUMBER() OVER (
                   PARTITION BY {key} ORDER BY {order_by} DESC NULLS LAST, rowid
                 ) AS __rank
                 FROM {table}
               )
               WHERE __rank = 1
               ORDER BY {key} NULLS LAST;
             DELETE FROM {table};
             INSERT INTO {table} SELECT * FROM __latest;
             DROP TABLE __latest;",
        ))?;

        let remaining = self.row_count()?;
        tracing::debug!(remaining, table = %self.table, "Deduplicated");
        Ok(remaining)
    }

    /// Replace nulls in `columns` with zero of the column's type; returns cells filled.
    pub fn fill_missing(&self, columns: &[&str]) -> Result<usize> {
        let mut targets: Vec<&str> = Vec::with_capacity(columns.len());
        for &column in columns {
            if !targets.contains(&column) {
                targets.push(column);
            }
        }

        let mut assignments = Vec::with_capacity(targets.len());
        for column in &targets {
            let zero = match self.expect_type(
                column,
                &[ColumnType::Integer, ColumnType::Float, ColumnType::Text],
            )? {
                ColumnType::Integer => "0",
                ColumnType::Float => "0.0",
                _ => "'0'",
            };
            let column = quote_ident(column);
            assignments.push(format!("{column} = COALESCE({column}, {zero})"));
        }
        if assignments.is_empty() {
            return Ok(0);
        }

        let filled = self
            .null_counts(&targets)?
            .into_iter()
            .map(|(_, nulls)| nulls)
            .sum();
        self.store.execute(&format!(
            "UPDATE {} SET {}",
            self.quoted_table(),
            assignments.join(", ")
        ))?;
        Ok(filled)
    }

    /// `DELETE` every row the rule flags; returns the number removed.
    pub fn remove_outliers(&self, rule: &OutlierRule) -> Result<usize> {
        for bound in &rule.bounds {
            self.expect_type(&bound.column, NUMERIC)?;
        }
        let removed = self.store.execute(&format!(
            "DELETE FROM {} WHERE {}",
            self.quoted_table(),
            rule.to_sql()
        ))?;
        tracing::debug!(removed, table = %self.table, "Removed outliers");
        Ok(removed)
    }

    fn first_unmapped(&self, column: &str, known: Vec<String>) -> Result<Option<String>> {
        let quoted = quote_ident(column);
        let filter = match known.is_empty() {
            true => format!("{quoted} IS NOT NULL"),
            false => format!("{quoted} IS NOT NULL AND {quoted} NOT IN ({})", known.join(", ")),
        };
        let sql = format!(
            "SELECT CAST({quoted} AS VARCHAR) FROM {} WHERE {filter} LIMIT 1",
            self.quoted_table()
        );
        let found = self.store.query(&sql)?;
        Ok(found
            .rows
            .first()
            .and_then(|row| row[0].group_key()))
    }

    /// Convert a text column to integer codes. Fails without changes if any
    /// non-null value is outside the mapping.
    pub fn encode_categorical(&self, column: &str, mapping: &CategoryMapping) -> Result<()> {
        self.expect_type(column, &[ColumnType::Text])?;
        let labels = mapping.labels().map(quote_literal).collect();
        if let Some(value) = self.first_unmapped(column, labels)? {
            return Err(EtlError::UnknownCategoryError {
                column: column.to_string(),
                value,
            });
        }
        self.store.execute_batch(&format!(
            "ALTER TABLE {} ALTER {} TYPE BIGINT USING ({})",
            self.quoted_table(),
            quote_ident(column),
            mapping.encode_case_sql(column)
        ))
    }

    pub fn decode_categorical(&self, column: &str, mapping: &CategoryMapping) -> Result<()> {
        self.expect_type(column, &[ColumnType::Integer])?;
        let codes = mapping
            .labels()
            .filter_map(|label| mapping.code(label))
            .map(|code| code.to_string())
            .collect();
        if let Some(value) = self.first_unmapped(column, codes)? {
            return Err(EtlError::UnknownCategoryError {
                column: column.to_string(),
                value,
            });
        }
        self.store.execute_batch(&format!(
            "ALTER TABLE {} ALTER {} TYPE VARCHAR USING ({})",
            self.quoted_table(),
            quote_ident(column),
            mapping.decode_case_sql(column)
        ))
    }

    /// Add `First_Name` / `Last_Name` populated from a whitespace-separated name.
    pub fn split_full_name(&self, column: &str) -> Result<()> {
        self.expect_type(column, &[ColumnType::Text])?;
        for new_column in [FIRST_NAME, LAST_NAME] {
            if self.column_type(new_column).is_ok() {
                return Err(EtlError::ProcessingError {
                    message: format!("column {} already exists", new_column),
                });
            }
        }

        let table = self.quoted_table();
        // Padded names split into empty edge tokens; drop them.
        let tokens = format!(
            r"list_filter(string_split_regex({}, '\s+'), t -> t <> '')",
            quote_ident(column)
        );
        self.store.execute_batch(&format!(
            "ALTER TABLE {table} ADD COLUMN {first} VARCHAR;
             ALTER TABLE {table} ADD COLUMN {last} VARCHAR;
             UPDATE {table} SET
               {first} = NULLIF({tokens}[1], ''),
               {last} = NULLIF(list_aggregate(list_slice({tokens}, 2, len({tokens})), 'string_agg', ' '), '');",
            first = quote_ident(FIRST_NAME),
            last = quote_ident(LAST_NAME),
        ))
    }

    fn aggregate_over(
        &self,
        group_expr: &str,
        measure: &str,
        aggregate: Aggregate,
    ) -> Result<Vec<GroupAggregate>> {
        self.expect_type(measure, NUMERIC)?;
        let sql = format!(
            "SELECT {group_expr} AS grp,
                    round({}(CAST({} AS DOUBLE)), 2) AS value,
                    COUNT(*) AS row_count
             FROM {}
             GROUP BY 1",
            aggregate.sql_function(),
            quote_ident(measure),
            self.quoted_table()
        );

        // Labels use Value's Display, sorted as text with the null group first.
        let result = self.store.query(&sql)?;
        let mut groups = result
            .rows
            .into_iter()
            .map(|row| {
                let rows = match row[2] {
                    Value::Integer(n) => n as usize,
                    ref other => {
                        return Err(EtlError::ProcessingError {
                            message: format!("unexpected row count {:?}", other),
                        })
                    }
                };
                Ok(GroupAggregate {
                    group: row[0].group_key(),
                    value: row[1].as_f64(),
                    rows,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        groups.sort_by(|a, b| a.group.cmp(&b.group));
        Ok(groups)
    }

    pub fn aggregate_by(
        &self,
        group: &str,
        measure: &str,
        aggregate: Aggregate,
    ) -> Result<Vec<GroupAggregate>> {
        self.column_type(group)?;
        self.aggregate_over(&quote_ident(group), measure, aggregate)
    }

    pub fn sum_by(&self, group: &str, measure: &str) -> Result<Vec<GroupAggregate>> {
        self.aggregate_by(group, measure, Aggregate::Sum)
    }

    pub fn mean_by(&self, group: &str, measure: &str) -> Result<Vec<GroupAggregate>> {
        self.aggregate_by(group, measure, Aggregate::Mean)
    }

    pub fn mean_by_age_group(
        &self,
        age: &str,
        measure: &str,
        buckets: &AgeBuckets,
    ) -> Result<Vec<GroupAggregate>> {
        self.expect_type(age, NUMERIC)?;
        self.aggregate_over(&buckets.case_sql(age), measure, Aggregate::Mean)
    }
}
