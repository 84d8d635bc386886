//! Record-set ("dataframe") style transforms. Every function leaves its input
//! untouched and returns a new record set.

use super::{round2, Aggregate, AgeBuckets, CategoryMapping, GroupAggregate, OutlierRule};
use crate::domain::model::{Column, ColumnType, RecordSet, Value};
use crate::domain::records::columns::{FIRST_NAME, LAST_NAME};
use crate::utils::error::{EtlError, Result};
use std::cmp::Ordering;
use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, HashMap};

fn expect_type(data: &RecordSet, column: &str, allowed: &[ColumnType]) -> Result<usize> {
    let idx = data.column_index(column)?;
    let actual = data.schema.columns[idx].column_type;
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
    Ok(idx)
}

const NUMERIC: &[ColumnType] = &[ColumnType::Integer, ColumnType::Float];

/// Keep one row per `key`: the one with the greatest `order_by` value.
///
/// Null ordering values lose to any non-null value; exact ties keep the
/// earliest row. Output is sorted by key, null key last.
pub fn deduplicate_latest(data: &RecordSet, key: &str, order_by: &str) -> Result<RecordSet> {
    let key_idx = data.column_index(key)?;
    let order_idx = data.column_index(order_by)?;

    let mut winners: HashMap<Option<String>, usize> = HashMap::new();
    for (i, row) in data.rows.iter().enumerate() {
        match winners.entry(row[key_idx].group_key()) {
            Entry::Vacant(slot) => {
                slot.insert(i);
            }
            Entry::Occupied(mut slot) => {
                let current = &data.rows[*slot.get()][order_idx];
                if row[order_idx].total_cmp(current) == Ordering::Greater {
                    slot.insert(i);
                }
            }
        }
    }

    let mut kept: Vec<usize> = winners.into_values().collect();
    kept.sort_by(|&a, &b| {
        let (ka, kb) = (&data.rows[a][key_idx], &data.rows[b][key_idx]);
        let by_key = match (ka.is_null(), kb.is_null()) {
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            _ => ka.total_cmp(kb),
        };
        by_key.then(a.cmp(&b))
    });

    tracing::debug!(
        before = data.len(),
        after = kept.len(),
        "Deduplicated on {}",
        key
    );
    Ok(RecordSet::new(
        data.schema.clone(),
        kept.into_iter().map(|i| data.rows[i].clone()).collect(),
    ))
}

/// Replace nulls in `columns` with zero of the column's type.
///
/// Returns the filled record set and the number of cells that were null.
pub fn fill_missing(data: &RecordSet, columns: &[&str]) -> Result<(RecordSet, usize)> {
    let targets = columns
        .iter()
        .map(|name| {
            let idx = expect_type(
                data,
                name,
                &[ColumnType::Integer, ColumnType::Float, ColumnType::Text],
            )?;
            let zero = match data.schema.columns[idx].column_type {
                ColumnType::Integer => Value::Integer(0),
                ColumnType::Float => Value::Float(0.0),
                _ => Value::Text("0".to_string()),
            };
            Ok((idx, zero))
        })
        .collect::<Result<Vec<_>>>()?;

    let mut filled = 0;
    let mut out = data.clone();
    for row in &mut out.rows {
        for (idx, zero) in &targets {
            if row[*idx].is_null() {
                row[*idx] = zero.clone();
                filled += 1;
            }
        }
    }
    Ok((out, filled))
}

/// Drop every row that `rule` flags as an outlier.
pub fn remove_outliers(data: &RecordSet, rule: &OutlierRule) -> Result<RecordSet> {
    let indexes = rule
        .bounds
        .iter()
        .map(|b| expect_type(data, &b.column, NUMERIC))
        .collect::<Result<Vec<_>>>()?;

    Ok(data.filter_rows(|row| {
        let violations = rule
            .bounds
            .iter()
            .zip(&indexes)
            .map(|(bound, &idx)| bound.violated_by(&row[idx]));
        !rule.matches(violations)
    }))
}

/// Replace each label in `column` with its code; the column becomes an integer column.
///
/// Nulls stay null. A label outside the mapping fails the whole call.
pub fn encode_categorical(
    data: &RecordSet,
    column: &str,
    mapping: &CategoryMapping,
) -> Result<RecordSet> {
    let idx = expect_type(data, column, &[ColumnType::Text])?;

    let mut out = data.clone();
    for row in &mut out.rows {
        row[idx] = match &row[idx] {
            Value::Null => Value::Null,
            value => {
                let label = value.to_string();
                let code = mapping
                    .code(&label)
                    .ok_or_else(|| EtlError::UnknownCategoryError {
                        column: column.to_string(),
                        value: label,
                    })?;
                Value::Integer(code)
            }
        };
    }
    out.schema.columns[idx].column_type = ColumnType::Integer;
    Ok(out)
}

/// Inverse of [`encode_categorical`].
pub fn decode_categorical(
    data: &RecordSet,
    column: &str,
    mapping: &CategoryMapping,
) -> Result<RecordSet> {
    let idx = expect_type(data, column, &[ColumnType::Integer])?;

    let mut out = data.clone();
    for row in &mut out.rows {
        row[idx] = match &row[idx] {
            Value::Integer(code) => {
                let label = mapping
                    .label(*code)
                    .ok_or_else(|| EtlError::UnknownCategoryError {
                        column: column.to_string(),
                        value: code.to_string(),
                    })?;
                Value::Text(label.to_string())
            }
            _ => Value::Null,
        };
    }
    out.schema.columns[idx].column_type = ColumnType::Text;
    Ok(out)
}

/// Split a whitespace-separated full name into `First_Name` and `Last_Name`.
///
/// The first token is the first name and every remaining token, joined by a
/// single space, is the last name. One token leaves `Last_Name` null; an empty
/// or null name leaves both null.
pub fn split_full_name(data: &RecordSet, column: &str) -> Result<RecordSet> {
    let idx = expect_type(data, column, &[ColumnType::Text])?;
    for new_column in [FIRST_NAME, LAST_NAME] {
        if data.schema.index_of(new_column).is_some() {
            return Err(EtlError::ProcessingError {
                message: format!("column {} already exists", new_column),
            });
        }
    }

    let mut out = data.clone();
    out.schema
        .columns
        .push(Column::new(FIRST_NAME, ColumnType::Text));
    out.schema
        .columns
        .push(Column::new(LAST_NAME, ColumnType::Text));

    for row in &mut out.rows {
        let tokens: Vec<&str> = row[idx]
            .as_str()
            .map(|name| name.split_whitespace().collect())
            .unwrap_or_default();
        let first = tokens
            .first()
            .map(|t| Value::Text(t.to_string()))
            .unwrap_or(Value::Null);
        let last = match tokens.len() {
            0 | 1 => Value::Null,
            _ => Value::Text(tokens[1..].join(" ")),
        };
        row.push(first);
        row.push(last);
    }
    Ok(out)
}

fn aggregate_with<F>(
    data: &RecordSet,
    measure: &str,
    aggregate: Aggregate,
    mut group_of: F,
) -> Result<Vec<GroupAggregate>>
where
    F: FnMut(&[Value]) -> Option<String>,
{
    let measure_idx = expect_type(data, measure, NUMERIC)?;

    // group -> (rows, non-null measures, running sum)
    let mut groups: BTreeMap<Option<String>, (usize, usize, f64)> = BTreeMap::new();
    for row in &data.rows {
        let entry = groups.entry(group_of(row)).or_insert((0, 0, 0.0));
        entry.0 += 1;
        if let Some(v) = row[measure_idx].as_f64() {
            entry.1 += 1;
            entry.2 += v;
        }
    }

    Ok(groups
        .into_iter()
        .map(|(group, (rows, present, sum))| {
            let value = match (present, aggregate) {
                (0, _) => None,
                (_, Aggregate::Sum) => Some(round2(sum)),
                (n, Aggregate::Mean) => Some(round2(sum / n as f64)),
            };
            GroupAggregate { group, value, rows }
        })
        .collect())
}

/// One aggregate of `measure` per distinct value of `group` (null group included).
pub fn aggregate_by(
    data: &RecordSet,
    group: &str,
    measure: &str,
    aggregate: Aggregate,
) -> Result<Vec<GroupAggregate>> {
    let group_idx = data.column_index(group)?;
    aggregate_with(data, measure, aggregate, |row| row[group_idx].group_key())
}

pub fn sum_by(data: &RecordSet, group: &str, measure: &str) -> Result<Vec<GroupAggregate>> {
    aggregate_by(data, group, measure, Aggregate::Sum)
}

pub fn mean_by(data: &RecordSet, group: &str, measure: &str) -> Result<Vec<GroupAggregate>> {
    aggregate_by(data, group, measure, Aggregate::Mean)
}

/// Mean of `measure` per age bucket of `age`.
pub fn mean_by_age_group(
    data: &RecordSet,
    age: &str,
    measure: &str,
    buckets: &AgeBuckets,
) -> Result<Vec<GroupAggregate>> {
    let age_idx = expect_type(data, age, NUMERIC)?;
    aggregate_with(data, measure, Aggregate::Mean, |row| {
        Some(buckets.label_for(&row[age_idx]).to_string())
    })
}
