use crate::domain::model::RecordSet;
use crate::utils::error::Result;
use async_trait::async_trait;
use serde::Serialize;

/// Anything that can produce a record set: a database table, an object, an API.
pub trait Source: Send + Sync {
    /// Short label used in logs, e.g. `sqlite:Customer`.
    fn describe(&self) -> String;

    fn extract(&self) -> impl std::future::Future<Output = Result<RecordSet>> + Send;
}

/// Destination of a load. Returns the number of rows written.
pub trait Sink: Send + Sync {
    fn describe(&self) -> String;

    fn load(
        &self,
        table: &str,
        data: &RecordSet,
    ) -> impl std::future::Future<Output = Result<usize>> + Send;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadSummary {
    pub source: String,
    pub destination: String,
    pub table: String,
    pub rows_extracted: usize,
    pub rows_loaded: usize,
}

#[async_trait]
pub trait Pipeline: Send + Sync {
    async fn extract(&self) -> Result<RecordSet>;
    async fn transform(&self, data: RecordSet) -> Result<RecordSet>;
    async fn load(&self, data: RecordSet) -> Result<LoadSummary>;
}
