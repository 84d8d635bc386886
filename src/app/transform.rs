//! The customer cleaning walkthrough, once per style. As in the exercises,
//! every step starts again from the raw CSV rather than chaining.

use crate::adapters::csv_file::CsvFileSource;
use crate::adapters::duckdb_store::{quote_ident, DuckDbStore};
use crate::config::ExerciseConfig;
use crate::core::Source;
use crate::domain::model::RecordSet;
use crate::transform::sql::SqlTransforms;
use crate::transform::{frame, AgeBuckets, CategoryMapping, GroupAggregate};
use crate::utils::error::Result;
use serde::Serialize;
use serde_json::{Map, Value as JsonValue};
use std::time::Instant;

const PREVIEW_ROWS: usize = 5;

#[derive(Debug, Clone, Serialize)]
pub struct TransformReport {
    pub style: &'static str,
    pub rows_read: usize,
    /// Rows present when deduplication ran (the SQL walkthrough loads the file twice).
    pub rows_before_dedup: usize,
    pub rows_after_dedup: usize,
    pub cells_filled: usize,
    pub outliers_removed: usize,
    /// First rows after gender encoding and name splitting.
    pub preview: Vec<Map<String, JsonValue>>,
    pub total_purchase_by_gender: Vec<GroupAggregate>,
    pub mean_purchase_by_gender: Vec<GroupAggregate>,
    pub mean_purchase_by_age_group: Vec<GroupAggregate>,
    /// The raw file as a list of objects; frame style only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub records: Option<Vec<Map<String, JsonValue>>>,
}

fn preview(data: &RecordSet) -> Vec<Map<String, JsonValue>> {
    let mut records = data.to_json_records();
    records.truncate(PREVIEW_ROWS);
    records
}

/// In-memory walkthrough over the customer CSV.
pub async fn run_frame(config: &ExerciseConfig) -> Result<TransformReport> {
    let started = Instant::now();
    let t = &config.transform;
    let raw = CsvFileSource::new(&config.csv.path).extract().await?;
    tracing::info!(rows = raw.len(), "Read customer CSV");

    let deduplicated = frame::deduplicate_latest(&raw, &t.key_column, &t.order_column)?;
    let (_, cells_filled) = frame::fill_missing(&raw, &t.fill_columns())?;
    let without_outliers = frame::remove_outliers(&raw, &t.outliers)?;

    let encoded = frame::encode_categorical(&raw, &t.gender_column, &CategoryMapping::gender())?;
    let split = frame::split_full_name(&encoded, &t.name_column)?;

    let report = TransformReport {
        style: "frame",
        rows_read: raw.len(),
        rows_before_dedup: raw.len(),
        rows_after_dedup: deduplicated.len(),
        cells_filled,
        outliers_removed: raw.len() - without_outliers.len(),
        preview: preview(&split),
        total_purchase_by_gender: frame::sum_by(&raw, &t.gender_column, &t.measure_column)?,
        mean_purchase_by_gender: frame::mean_by(&raw, &t.gender_column, &t.measure_column)?,
        mean_purchase_by_age_group: frame::mean_by_age_group(
            &raw,
            &t.age_column,
            &t.measure_column,
            &AgeBuckets::default(),
        )?,
        records: Some(raw.to_json_records()),
    };
    tracing::info!(
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Frame walkthrough finished"
    );
    Ok(report)
}

/// SQL walkthrough against `csv.table` in the configured DuckDB file.
pub fn run_sql(config: &ExerciseConfig) -> Result<TransformReport> {
    let store = DuckDbStore::open(&config.duckdb.path)?;
    run_sql_on(&store, config)
}

/// Same as [`run_sql`] against an already opened store.
pub fn run_sql_on(store: &DuckDbStore, config: &ExerciseConfig) -> Result<TransformReport> {
    let started = Instant::now();
    let t = &config.transform;
    let csv_path = &config.csv.path;
    let sql = SqlTransforms::new(store, &config.csv.table)?;

    let rows_read = sql.reset(csv_path)?;
    tracing::info!(rows = rows_read, table = %sql.table(), "Loaded customer CSV");

    // A second load gives every customer a duplicate.
    sql.load_csv(csv_path)?;
    let rows_before_dedup = sql.row_count()?;
    let rows_after_dedup = sql.deduplicate_latest(&t.key_column, &t.order_column)?;
    let cells_filled = sql.fill_missing(&t.fill_columns())?;
    let outliers_removed = sql.remove_outliers(&t.sql_outliers)?;

    sql.reset(csv_path)?;
    sql.encode_categorical(&t.gender_column, &CategoryMapping::gender())?;
    sql.split_full_name(&t.name_column)?;
    let preview = store.query(&format!(
        "SELECT * FROM {} LIMIT {}",
        quote_ident(sql.table()),
        PREVIEW_ROWS
    ))?;

    sql.reset(csv_path)?;
    let report = TransformReport {
        style: "sql",
        rows_read,
        rows_before_dedup,
        rows_after_dedup,
        cells_filled,
        outliers_removed,
        preview: preview.to_json_records(),
        total_purchase_by_gender: sql.sum_by(&t.gender_column, &t.measure_column)?,
        mean_purchase_by_gender: sql.mean_by(&t.gender_column, &t.measure_column)?,
        mean_purchase_by_age_group: sql.mean_by_age_group(
            &t.age_column,
            &t.measure_column,
            &AgeBuckets::default(),
        )?,
        records: None,
    };
    tracing::info!(
        elapsed_ms = started.elapsed().as_millis() as u64,
        "SQL walkthrough finished"
    );
    Ok(report)
}
