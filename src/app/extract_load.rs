//! Extract/load exercises: each source is copied into the DuckDB file named in
//! `[duckdb]`. Runs replace the destination table so they can be repeated.

use crate::adapters::csv_file::CsvFileSource;
use crate::adapters::duckdb_store::{DuckDbSink, DuckDbStore, LoadMode};
use crate::adapters::http_api::ExchangeApiSource;
use crate::adapters::scrape::scrape_links;
use crate::adapters::sqlite::SqliteSource;
use crate::config::ExerciseConfig;
use crate::core::etl::EtlEngine;
use crate::core::pipeline::ExtractLoadPipeline;
use crate::core::{LoadSummary, Sink, Source};
use crate::domain::records::Customer;
use crate::utils::error::Result;
use serde_json::{Map, Value as JsonValue};

fn duckdb_sink(config: &ExerciseConfig) -> DuckDbSink {
    DuckDbSink::new(&config.duckdb.path).with_mode(LoadMode::Replace)
}

/// SQLite `Customer` table into DuckDB.
pub async fn sqlite_to_duckdb(config: &ExerciseConfig) -> Result<LoadSummary> {
    let source = SqliteSource::new(&config.sqlite.path, &config.sqlite.table);
    let pipeline = ExtractLoadPipeline::new(
        source,
        duckdb_sink(config),
        &config.sqlite.destination_table,
    );
    EtlEngine::new(pipeline).run().await
}

/// One GHCN-Daily station file from S3 into `WeatherData`.
#[cfg(feature = "s3")]
pub async fn s3_to_duckdb(config: &ExerciseConfig) -> Result<LoadSummary> {
    use crate::adapters::object_store::S3ObjectSource;

    let source = S3ObjectSource::new(&config.s3.bucket, &config.s3.key, &config.s3.region)
        .with_endpoint(config.s3.endpoint_url.clone());
    let pipeline =
        ExtractLoadPipeline::new(source, duckdb_sink(config), &config.s3.destination_table);
    EtlEngine::new(pipeline).run().await
}

/// CoinCap exchanges listing into `Exchanges`.
pub async fn api_to_duckdb(config: &ExerciseConfig) -> Result<LoadSummary> {
    let source = ExchangeApiSource::new(&config.api.endpoint, config.api.api_key.clone());
    let pipeline =
        ExtractLoadPipeline::new(source, duckdb_sink(config), &config.api.destination_table);
    EtlEngine::new(pipeline).run().await
}

/// Customer CSV into `SampleData` with DuckDB's own CSV reader.
pub fn csv_to_duckdb(config: &ExerciseConfig) -> Result<LoadSummary> {
    let store = DuckDbStore::open(&config.duckdb.path)?;
    let table = &config.csv.table;
    store.drop_table(table)?;
    store.create_table(table, &Customer::schema())?;
    let loaded = store.load_csv(table, &config.csv.path)?;
    tracing::info!(rows = loaded, "Loaded {} into {}", config.csv.path, table);

    Ok(LoadSummary {
        source: CsvFileSource::new(&config.csv.path).describe(),
        destination: duckdb_sink(config).describe(),
        table: table.clone(),
        rows_extracted: loaded,
        rows_loaded: loaded,
    })
}

/// Links of the configured page, or of `url` when given.
pub async fn scrape(config: &ExerciseConfig, url: Option<&str>) -> Result<Vec<String>> {
    let client = reqwest::Client::new();
    scrape_links(&client, url.unwrap_or(&config.scrape.url)).await
}

/// Every row of a DuckDB table as JSON objects.
pub fn show_table(config: &ExerciseConfig, table: &str) -> Result<Vec<Map<String, JsonValue>>> {
    let store = DuckDbStore::open(&config.duckdb.path)?;
    Ok(store.select_all(table)?.to_json_records())
}
