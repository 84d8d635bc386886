// Adapters layer: concrete sources and sinks for the external systems.

pub mod csv_file;
pub mod duckdb_store;
pub mod http_api;
pub mod object_store;
pub mod scrape;
pub mod sqlite;

use crate::utils::error::{EtlError, Result};

/// Run synchronous store or file work on tokio's blocking pool.
pub(crate) async fn run_blocking<T, F>(task: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(task)
        .await
        .map_err(|e| EtlError::ProcessingError {
            message: format!("blocking task failed: {}", e),
        })?
}
