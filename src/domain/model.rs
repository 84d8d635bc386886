//! In-memory tabular record set shared by every source, sink and transform.

use crate::utils::error::{EtlError, Result};
use chrono::NaiveDate;
use serde::Serialize;
use std::cmp::Ordering;
use std::fmt;

/// Logical type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Integer,
    Float,
    Text,
    Date,
    Boolean,
}

impl ColumnType {
    /// DuckDB DDL type used when a table is created from a record set.
    pub fn sql_type(&self) -> &'static str {
        match self {
            ColumnType::Integer => "BIGINT",
            ColumnType::Float => "DOUBLE",
            ColumnType::Text => "VARCHAR",
            ColumnType::Date => "DATE",
            ColumnType::Boolean => "BOOLEAN",
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ColumnType::Integer => "integer",
            ColumnType::Float => "float",
            ColumnType::Text => "text",
            ColumnType::Date => "date",
            ColumnType::Boolean => "boolean",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub column_type: ColumnType,
}

impl Column {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Schema {
    pub columns: Vec<Column>,
}

impl Schema {
    pub fn new(columns: Vec<Column>) -> Self {
        Self { columns }
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }
}

/// A single scalar cell.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Integer(i64),
    Float(f64),
    Text(String),
    Date(NaiveDate),
    Boolean(bool),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(v) => Some(*v as f64),
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Key used to bucket rows by value. Nulls share one key.
    pub fn group_key(&self) -> Option<String> {
        match self {
            Value::Null => None,
            other => Some(other.to_string()),
        }
    }

    /// Total order used for sorting and "latest value" selection.
    ///
    /// Nulls sort before everything. Integers and floats compare numerically;
    /// otherwise values of different types compare by their type rank.
    pub fn total_cmp(&self, other: &Value) -> Ordering {
        match (self, other) {
            (Value::Null, Value::Null) => Ordering::Equal,
            (Value::Null, _) => Ordering::Less,
            (_, Value::Null) => Ordering::Greater,
            (Value::Integer(a), Value::Integer(b)) => a.cmp(b),
            (Value::Text(a), Value::Text(b)) => a.cmp(b),
            (Value::Date(a), Value::Date(b)) => a.cmp(b),
            (Value::Boolean(a), Value::Boolean(b)) => a.cmp(b),
            (a, b) => match (a.as_f64(), b.as_f64()) {
                (Some(x), Some(y)) => x.total_cmp(&y),
                _ => a.type_rank().cmp(&b.type_rank()),
            },
        }
    }

    fn type_rank(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Boolean(_) => 1,
            Value::Integer(_) | Value::Float(_) => 2,
            Value::Date(_) => 3,
            Value::Text(_) => 4,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Integer(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::Text(v) => f.write_str(v),
            Value::Date(v) => write!(f, "{}", v.format("%Y-%m-%d")),
            Value::Boolean(v) => write!(f, "{}", v),
        }
    }
}

impl From<Option<i64>> for Value {
    fn from(value: Option<i64>) -> Self {
        value.map(Value::Integer).unwrap_or(Value::Null)
    }
}

impl From<Option<f64>> for Value {
    fn from(value: Option<f64>) -> Self {
        value.map(Value::Float).unwrap_or(Value::Null)
    }
}

impl From<Option<String>> for Value {
    fn from(value: Option<String>) -> Self {
        value.map(Value::Text).unwrap_or(Value::Null)
    }
}

impl From<Option<NaiveDate>> for Value {
    fn from(value: Option<NaiveDate>) -> Self {
        value.map(Value::Date).unwrap_or(Value::Null)
    }
}

impl From<Option<bool>> for Value {
    fn from(value: Option<bool>) -> Self {
        value.map(Value::Boolean).unwrap_or(Value::Null)
    }
}

/// Ordered rows with named, typed columns.
///
/// Rows are stored row-major in schema order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RecordSet {
    pub schema: Schema,
    pub rows: Vec<Vec<Value>>,
}

impl RecordSet {
    pub fn new(schema: Schema, rows: Vec<Vec<Value>>) -> Self {
        Self { schema, rows }
    }

    pub fn empty(schema: Schema) -> Self {
        Self::new(schema, Vec::new())
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Result<usize> {
        self.schema
            .index_of(name)
            .ok_or_else(|| EtlError::MissingColumnError {
                column: name.to_string(),
            })
    }

    pub fn column_type(&self, name: &str) -> Result<ColumnType> {
        let idx = self.column_index(name)?;
        Ok(self.schema.columns[idx].column_type)
    }

    /// Values of one column, in row order.
    pub fn column(&self, name: &str) -> Result<Vec<&Value>> {
        let idx = self.column_index(name)?;
        Ok(self.rows.iter().map(|row| &row[idx]).collect())
    }

    pub fn null_count(&self, name: &str) -> Result<usize> {
        Ok(self.column(name)?.into_iter().filter(|v| v.is_null()).count())
    }

    /// Copy of this record set with only the rows for which `predicate` holds.
    pub fn filter_rows<F>(&self, mut predicate: F) -> Self
    where
        F: FnMut(&[Value]) -> bool,
    {
        let rows = self
            .rows
            .iter()
            .filter(|row| predicate(row.as_slice()))
            .cloned()
            .collect();
        Self::new(self.schema.clone(), rows)
    }

    /// Rows as JSON objects keyed by column name.
    pub fn to_json_records(&self) -> Vec<serde_json::Map<String, serde_json::Value>> {
        self.rows
            .iter()
            .map(|row| {
                self.schema
                    .names()
                    .zip(row.iter())
                    .map(|(name, value)| {
                        let json = serde_json::to_value(value).unwrap_or(serde_json::Value::Null);
                        (name.to_string(), json)
                    })
                    .collect()
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn people() -> RecordSet {
        let schema = Schema::new(vec![
            Column::new("id", ColumnType::Integer),
            Column::new("name", ColumnType::Text),
            Column::new("joined", ColumnType::Date),
        ]);
        RecordSet::new(
            schema,
            vec![
                vec![
                    Value::Integer(1),
                    Value::Text("Ada".to_string()),
                    Value::Date(NaiveDate::from_ymd_opt(2023, 1, 5).unwrap()),
                ],
                vec![Value::Integer(2), Value::Null, Value::Null],
            ],
        )
    }

    #[test]
    fn test_column_lookup_reports_missing_column() {
        let rs = people();
        assert_eq!(rs.column_index("name").unwrap(), 1);
        let err = rs.column_index("email").unwrap_err();
        assert!(matches!(err, EtlError::MissingColumnError { column } if column == "email"));
    }

    #[test]
    fn test_null_count() {
        let rs = people();
        assert_eq!(rs.null_count("id").unwrap(), 0);
        assert_eq!(rs.null_count("name").unwrap(), 1);
    }

    #[test]
    fn test_to_json_records() {
        let records = people().to_json_records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["id"], serde_json::json!(1));
        assert_eq!(records[0]["joined"], serde_json::json!("2023-01-05"));
        assert!(records[1]["name"].is_null());
    }

    #[test]
    fn test_total_cmp_orders_nulls_first_and_mixes_numbers() {
        assert_eq!(Value::Null.total_cmp(&Value::Integer(0)), Ordering::Less);
        assert_eq!(
            Value::Integer(2).total_cmp(&Value::Float(1.5)),
            Ordering::Greater
        );
        let early = Value::Date(NaiveDate::from_ymd_opt(2023, 1, 1).unwrap());
        let late = Value::Date(NaiveDate::from_ymd_opt(2023, 6, 1).unwrap());
        assert_eq!(early.total_cmp(&late), Ordering::Less);
    }
}
