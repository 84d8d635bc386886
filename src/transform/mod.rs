//! Cleaning and aggregation of the customer record set.
//!
//! [`frame`] works on an in-memory [`RecordSet`](crate::domain::model::RecordSet);
//! [`sql`] issues the equivalent statements to a DuckDB table. Both share the
//! rule types defined here so the two styles cannot drift apart.

pub mod frame;
pub mod sql;

use crate::adapters::duckdb_store::{quote_ident, quote_literal};
use crate::domain::model::Value;
use crate::utils::error::{EtlError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const UNKNOWN_AGE: &str = "UnknownAge";

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// How the bounds of an [`OutlierRule`] combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Match {
    /// A row is an outlier if any bound is violated.
    #[default]
    Any,
    /// A row is an outlier only if every bound is violated.
    All,
}

/// Allowed closed range for one numeric column. A null never violates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bound {
    pub column: String,
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
}

impl Bound {
    pub fn at_most(column: impl Into<String>, max: f64) -> Self {
        Self {
            column: column.into(),
            min: None,
            max: Some(max),
        }
    }

    pub fn violated_by(&self, value: &Value) -> bool {
        match value.as_f64() {
            Some(v) => self.min.is_some_and(|min| v < min) || self.max.is_some_and(|max| v > max),
            None => false,
        }
    }

    fn violation_sql(&self) -> String {
        let column = quote_ident(&self.column);
        let mut parts = Vec::new();
        if let Some(min) = self.min {
            parts.push(format!("{} < {}", column, min));
        }
        if let Some(max) = self.max {
            parts.push(format!("{} > {}", column, max));
        }
        match parts.len() {
            0 => "FALSE".to_string(),
            _ => format!("({})", parts.join(" OR ")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutlierRule {
    pub bounds: Vec<Bound>,
    #[serde(default)]
    pub mode: Match,
}

impl OutlierRule {
    pub fn any(bounds: Vec<Bound>) -> Self {
        Self {
            bounds,
            mode: Match::Any,
        }
    }

    pub fn all(bounds: Vec<Bound>) -> Self {
        Self {
            bounds,
            mode: Match::All,
        }
    }

    /// `Age > 100 OR Purchase_Amount > 1000`.
    pub fn customer_default() -> Self {
        Self::any(vec![
            Bound::at_most("Age", 100.0),
            Bound::at_most("Purchase_Amount", 1000.0),
        ])
    }

    /// Combine per-bound violation flags (in bound order). An empty rule matches nothing.
    pub fn matches(&self, mut violations: impl Iterator<Item = bool>) -> bool {
        if self.bounds.is_empty() {
            return false;
        }
        match self.mode {
            Match::Any => violations.any(|v| v),
            Match::All => violations.all(|v| v),
        }
    }

    /// SQL boolean expression that is true for outlier rows.
    pub fn to_sql(&self) -> String {
        if self.bounds.is_empty() {
            return "FALSE".to_string();
        }
        let joiner = match self.mode {
            Match::Any => " OR ",
            Match::All => " AND ",
        };
        self.bounds
            .iter()
            .map(Bound::violation_sql)
            .collect::<Vec<_>>()
            .join(joiner)
    }
}

/// Injective lookup table from category label to integer code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryMapping {
    codes: BTreeMap<String, i64>,
}

impl CategoryMapping {
    pub fn new(codes: BTreeMap<String, i64>) -> Result<Self> {
        let mut seen = BTreeMap::new();
        for (label, code) in &codes {
            if let Some(previous) = seen.insert(*code, label) {
                return Err(EtlError::ProcessingError {
                    message: format!(
                        "labels '{}' and '{}' share code {}; mapping must be reversible",
                        previous, label, code
                    ),
                });
            }
        }
        Ok(Self { codes })
    }

    /// `{"Female": 0, "Male": 1}`.
    pub fn gender() -> Self {
        Self {
            codes: BTreeMap::from([("Female".to_string(), 0), ("Male".to_string(), 1)]),
        }
    }

    pub fn code(&self, label: &str) -> Option<i64> {
        self.codes.get(label).copied()
    }

    pub fn label(&self, code: i64) -> Option<&str> {
        self.codes
            .iter()
            .find(|(_, c)| **c == code)
            .map(|(label, _)| label.as_str())
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.codes.keys().map(String::as_str)
    }

    /// `CASE col WHEN 'Female' THEN 0 ... END`
    fn encode_case_sql(&self, column: &str) -> String {
        let arms = self
            .codes
            .iter()
            .map(|(label, code)| format!("WHEN {} THEN {}", quote_literal(label), code))
            .collect::<Vec<_>>()
            .join(" ");
        format!("CASE {} {} END", quote_ident(column), arms)
    }

    fn decode_case_sql(&self, column: &str) -> String {
        let arms = self
            .codes
            .iter()
            .map(|(label, code)| format!("WHEN {} THEN {}", code, quote_literal(label)))
            .collect::<Vec<_>>()
            .join(" ");
        format!("CASE {} {} END", quote_ident(column), arms)
    }
}

/// One closed age interval.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgeBucket {
    pub label: String,
    pub low: i64,
    pub high: i64,
}

/// Non-overlapping closed intervals; anything outside falls into [`UNKNOWN_AGE`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgeBuckets {
    buckets: Vec<AgeBucket>,
}

impl Default for AgeBuckets {
    fn default() -> Self {
        let bounds = [(18, 30), (31, 40), (41, 50), (51, 60), (61, 70)];
        Self {
            buckets: bounds
                .iter()
                .map(|&(low, high)| AgeBucket {
                    label: format!("{}-{}", low, high),
                    low,
                    high,
                })
                .collect(),
        }
    }
}

impl AgeBuckets {
    pub fn new(buckets: Vec<AgeBucket>) -> Result<Self> {
        let mut sorted = buckets.clone();
        sorted.sort_by_key(|b| b.low);
        for bucket in &sorted {
            if bucket.low > bucket.high {
                return Err(EtlError::ProcessingError {
                    message: format!("age bucket {} is empty", bucket.label),
                });
            }
        }
        for pair in sorted.windows(2) {
            if pair[1].low <= pair[0].high {
                return Err(EtlError::ProcessingError {
                    message: format!(
                        "age buckets {} and {} overlap",
                        pair[0].label, pair[1].label
                    ),
                });
            }
        }
        Ok(Self { buckets })
    }

    pub fn label_for(&self, age: &Value) -> &str {
        age.as_f64()
            .and_then(|age| {
                self.buckets
                    .iter()
                    .find(|b| age >= b.low as f64 && age <= b.high as f64)
            })
            .map(|b| b.label.as_str())
            .unwrap_or(UNKNOWN_AGE)
    }

    fn case_sql(&self, column: &str) -> String {
        let column = quote_ident(column);
        let arms = self
            .buckets
            .iter()
            .map(|b| {
                format!(
                    "WHEN {col} >= {} AND {col} <= {} THEN {}",
                    b.low,
                    b.high,
                    quote_literal(&b.label),
                    col = column
                )
            })
            .collect::<Vec<_>>()
            .join(" ");
        format!("CASE {} ELSE {} END", arms, quote_literal(UNKNOWN_AGE))
    }
}

/// One output row of a grouped aggregation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupAggregate {
    /// Group value rendered as text; `None` for the null group.
    pub group: Option<String>,
    /// Aggregate rounded to two decimals; `None` when every measure is null.
    pub value: Option<f64>,
    pub rows: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregate {
    Sum,
    Mean,
}

impl Aggregate {
    fn sql_function(&self) -> &'static str {
        match self {
            Aggregate::Sum => "SUM",
            Aggregate::Mean => "AVG",
        }
    }
}
