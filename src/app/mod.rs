pub mod extract_load;
pub mod transform;

pub use extract_load::{api_to_duckdb, csv_to_duckdb, scrape, show_table, sqlite_to_duckdb};
#[cfg(feature = "s3")]
pub use extract_load::s3_to_duckdb;
pub use transform::{run_frame, run_sql, TransformReport};
