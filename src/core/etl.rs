use crate::core::{LoadSummary, Pipeline};
use crate::utils::error::Result;
use std::time::Instant;

pub struct EtlEngine<P: Pipeline> {
    pipeline: P,
}

impl<P: Pipeline> EtlEngine<P> {
    pub fn new(pipeline: P) -> Self {
        Self { pipeline }
    }

    pub async fn run(&self) -> Result<LoadSummary> {
        let started = Instant::now();
        tracing::info!("Starting extract/load");

        let raw_data = self.pipeline.extract().await?;
        let rows_extracted = raw_data.len();
        tracing::info!(rows = rows_extracted, "Extracted records");

        let transformed = self.pipeline.transform(raw_data).await?;
        tracing::debug!(rows = transformed.len(), "Transformed records");

        let mut summary = self.pipeline.load(transformed).await?;
        summary.rows_extracted = rows_extracted;
        tracing::info!(
            rows = summary.rows_loaded,
            table = %summary.table,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Loaded records into {}",
            summary.destination
        );

        Ok(summary)
    }
}
