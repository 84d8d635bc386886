use etl_exercises::app;
use etl_exercises::{DuckDbStore, EtlError, ExerciseConfig, Value};
use httpmock::prelude::*;
use std::path::Path;
use tempfile::TempDir;

const SAMPLE_CSV: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/data/sample_data.csv");

fn config_in(dir: &TempDir) -> ExerciseConfig {
    let mut config = ExerciseConfig::default();
    config.duckdb.path = dir.path().join("db").join("duckdb.db").display().to_string();
    config.sqlite.path = dir.path().join("tpch.db").display().to_string();
    config.csv.path = SAMPLE_CSV.to_string();
    config
}

fn seed_sqlite(path: &Path) {
    let conn = rusqlite::Connection::open(path).unwrap();
    conn.execute_batch(
        "CREATE TABLE Customer (
             c_custkey INTEGER, c_name TEXT, c_address TEXT, c_nationkey INTEGER,
             c_phone TEXT, c_acctbal REAL, c_mktsegment TEXT, c_comment TEXT
         );
         INSERT INTO Customer VALUES
             (1, 'Customer#000000001', 'IVhzIApeRb', 15, '25-989-741-2988', 711.56, 'BUILDING', 'to the even'),
             (2, 'Customer#000000002', 'XSTf4,NCwDVaW', 13, '23-768-687-3665', 121.65, 'AUTOMOBILE', NULL),
             (3, 'Customer#000000003', 'MG9kdTD2WBHm', 1, '11-719-748-3364', 7498.12, 'AUTOMOBILE', 'deposits');",
    )
    .unwrap();
}

fn exchanges_listing() -> serde_json::Value {
    serde_json::json!({
        "data": [
            {
                "exchangeId": "binance",
                "name": "Binance",
                "rank": "1",
                "percentTotalVolume": "32.1",
                "volumeUsd": "4210000000.55",
                "tradingPairs": "1200",
                "socket": true,
                "exchangeUrl": "https://www.binance.com/",
                "updated": 1726084380000i64
            },
            {
                "exchangeId": "itbit",
                "name": "Itbit",
                "rank": "33",
                "percentTotalVolume": null,
                "volumeUsd": null,
                "tradingPairs": "0",
                "socket": null,
                "exchangeUrl": "https://www.itbit.com/",
                "updated": 0
            }
        ],
        "timestamp": 1726084388658i64
    })
}

#[tokio::test]
async fn test_sqlite_table_copied_into_duckdb() {
    let dir = TempDir::new().unwrap();
    let config = config_in(&dir);
    seed_sqlite(Path::new(&config.sqlite.path));

    let summary = app::sqlite_to_duckdb(&config).await.unwrap();

    assert_eq!(summary.rows_extracted, 3);
    assert_eq!(summary.rows_loaded, 3);
    assert_eq!(summary.table, "Customer");

    let store = DuckDbStore::open(&config.duckdb.path).unwrap();
    let rows = store
        .query("SELECT c_custkey, c_acctbal, c_comment FROM Customer ORDER BY c_custkey")
        .unwrap();
    assert_eq!(
        rows.rows[1],
        vec![Value::Integer(2), Value::Float(121.65), Value::Null]
    );
}

#[tokio::test]
async fn test_rerunning_a_load_replaces_the_table() {
    let dir = TempDir::new().unwrap();
    let config = config_in(&dir);
    seed_sqlite(Path::new(&config.sqlite.path));

    app::sqlite_to_duckdb(&config).await.unwrap();
    app::sqlite_to_duckdb(&config).await.unwrap();

    let store = DuckDbStore::open(&config.duckdb.path).unwrap();
    assert_eq!(store.count_rows("Customer").unwrap(), 3);
}

#[tokio::test]
async fn test_api_listing_loaded_into_exchanges() {
    let dir = TempDir::new().unwrap();
    let mut config = config_in(&dir);

    let server = MockServer::start();
    let api_mock = server.mock(|when, then| {
        when.method(GET)
            .path("/v3/exchanges")
            .query_param("apiKey", "test-key");
        then.status(200)
            .header("Content-Type", "application/json")
            .json_body(exchanges_listing());
    });
    config.api.endpoint = server.url("/v3/exchanges");
    config.api.api_key = Some("test-key".to_string());

    let summary = app::api_to_duckdb(&config).await.unwrap();

    api_mock.assert();
    assert_eq!(summary.rows_loaded, 2);
    assert_eq!(summary.table, "Exchanges");

    let records = app::show_table(&config, "Exchanges").unwrap();
    assert_eq!(records.len(), 2);
    let binance = records
        .iter()
        .find(|r| r["exchangeId"] == "binance")
        .unwrap();
    assert_eq!(binance["rank"], serde_json::json!(1));
    assert_eq!(binance["tradingPairs"], serde_json::json!(1200));
    assert_eq!(binance["socket"], serde_json::json!(true));
}

#[tokio::test]
async fn test_api_unauthorized_is_network_error() {
    let dir = TempDir::new().unwrap();
    let mut config = config_in(&dir);

    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/v3/exchanges");
        then.status(401).body("{\"error\": \"missing api key\"}");
    });
    config.api.endpoint = server.url("/v3/exchanges");

    let err = app::api_to_duckdb(&config).await.unwrap_err();

    assert!(matches!(err, EtlError::HttpStatusError { status: 401, .. }));
    assert!(err.recovery_suggestion().contains("API_KEY"));
    assert!(!Path::new(&config.duckdb.path).exists());
}

#[test]
fn test_csv_loaded_natively_into_sample_data() {
    let dir = TempDir::new().unwrap();
    let config = config_in(&dir);

    let summary = app::csv_to_duckdb(&config).unwrap();
    assert_eq!(summary.rows_loaded, 16);

    // reloading starts from an empty table
    app::csv_to_duckdb(&config).unwrap();
    let records = app::show_table(&config, "SampleData").unwrap();
    assert_eq!(records.len(), 16);
    assert_eq!(records[0]["Customer_Name"], "John Doe");
    assert_eq!(records[0]["Purchase_Date"], "2023-01-15");
    assert!(records[3]["Age"].is_null());
}

#[test]
fn test_csv_missing_file_is_reported() {
    let dir = TempDir::new().unwrap();
    let mut config = config_in(&dir);
    config.csv.path = dir.path().join("absent.csv").display().to_string();

    let err = app::csv_to_duckdb(&config).unwrap_err();
    assert!(matches!(err, EtlError::IoError(_)));
}

#[test]
fn test_show_unknown_table_is_duckdb_error() {
    let dir = TempDir::new().unwrap();
    let config = config_in(&dir);

    let err = app::show_table(&config, "NoSuchTable").unwrap_err();
    assert!(matches!(err, EtlError::DuckDbError(_)));
}

#[tokio::test]
async fn test_scrape_lists_links_in_order() {
    let dir = TempDir::new().unwrap();
    let mut config = config_in(&dir);

    let server = MockServer::start();
    let page_mock = server.mock(|when, then| {
        when.method(GET).path("/jimin-kang/python-for-data-engineering");
        then.status(200)
            .header("Content-Type", "text/html")
            .body(
                r#"<html><body>
                     <a href="/">Home</a>
                     <a id="no-href">skip me</a>
                     <a href="https://docs.opendata.aws/noaa-ghcn-pds/readme.html">NOAA</a>
                   </body></html>"#,
            );
    });
    config.scrape.url = server.url("/jimin-kang/python-for-data-engineering");

    let links = app::scrape(&config, None).await.unwrap();

    page_mock.assert();
    assert_eq!(
        links,
        vec!["/", "https://docs.opendata.aws/noaa-ghcn-pds/readme.html"]
    );
}

#[tokio::test]
async fn test_scrape_url_override_and_http_error() {
    let dir = TempDir::new().unwrap();
    let config = config_in(&dir);

    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/missing");
        then.status(404);
    });

    let url = server.url("/missing");
    let err = app::scrape(&config, Some(url.as_str()))
        .await
        .unwrap_err();
    assert!(matches!(err, EtlError::HttpStatusError { status: 404, .. }));
}
