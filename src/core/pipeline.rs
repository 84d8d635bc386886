use crate::core::{LoadSummary, Pipeline, RecordSet, Sink, Source};
use crate::utils::error::Result;

type TransformFn = Box<dyn Fn(RecordSet) -> Result<RecordSet> + Send + Sync>;

/// Reads one source and appends the result into one table of a sink.
pub struct ExtractLoadPipeline<S: Source, K: Sink> {
    source: S,
    sink: K,
    table: String,
    transform: Option<TransformFn>,
}

impl<S: Source, K: Sink> ExtractLoadPipeline<S, K> {
    pub fn new(source: S, sink: K, table: impl Into<String>) -> Self {
        Self {
            source,
            sink,
            table: table.into(),
            transform: None,
        }
    }

    /// Apply `transform` to the extracted rows before they are loaded.
    pub fn with_transform<F>(mut self, transform: F) -> Self
    where
        F: Fn(RecordSet) -> Result<RecordSet> + Send + Sync + 'static,
    {
        self.transform = Some(Box::new(transform));
        self
    }
}

#[async_trait::async_trait]
impl<S: Source, K: Sink> Pipeline for ExtractLoadPipeline<S, K> {
    async fn extract(&self) -> Result<RecordSet> {
        tracing::debug!("Extracting from {}", self.source.describe());
        self.source.extract().await
    }

    async fn transform(&self, data: RecordSet) -> Result<RecordSet> {
        match &self.transform {
            Some(transform) => transform(data),
            None => Ok(data),
        }
    }

    async fn load(&self, data: RecordSet) -> Result<LoadSummary> {
        tracing::debug!(
            "Loading {} rows into {}.{}",
            data.len(),
            self.sink.describe(),
            self.table
        );
        let rows_loaded = self.sink.load(&self.table, &data).await?;

        Ok(LoadSummary {
            source: self.source.describe(),
            destination: self.sink.describe(),
            table: self.table.clone(),
            rows_extracted: data.len(),
            rows_loaded,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::etl::EtlEngine;
    use crate::domain::model::{Column, ColumnType, Schema, Value};
    use crate::utils::error::EtlError;
    use std::collections::HashMap;
    use std::sync::Arc;
    use tokio::sync::Mutex;

    struct StaticSource {
        data: RecordSet,
    }

    impl Source for StaticSource {
        fn describe(&self) -> String {
            "static".to_string()
        }

        async fn extract(&self) -> Result<RecordSet> {
            Ok(self.data.clone())
        }
    }

    struct FailingSource;

    impl Source for FailingSource {
        fn describe(&self) -> String {
            "failing".to_string()
        }

        async fn extract(&self) -> Result<RecordSet> {
            Err(EtlError::HttpStatusError {
                url: "http://example.com".to_string(),
                status: 500,
            })
        }
    }

    #[derive(Clone, Default)]
    struct MockSink {
        tables: Arc<Mutex<HashMap<String, Vec<Vec<Value>>>>>,
    }

    impl MockSink {
        async fn rows(&self, table: &str) -> Vec<Vec<Value>> {
            let tables = self.tables.lock().await;
            tables.get(table).cloned().unwrap_or_default()
        }
    }

    impl Sink for MockSink {
        fn describe(&self) -> String {
            "mock".to_string()
        }

        async fn load(&self, table: &str, data: &RecordSet) -> Result<usize> {
            let mut tables = self.tables.lock().await;
            tables
                .entry(table.to_string())
                .or_default()
                .extend(data.rows.iter().cloned());
            Ok(data.len())
        }
    }

    fn numbers(values: &[i64]) -> RecordSet {
        RecordSet::new(
            Schema::new(vec![Column::new("n", ColumnType::Integer)]),
            values.iter().map(|v| vec![Value::Integer(*v)]).collect(),
        )
    }

    #[tokio::test]
    async fn test_engine_loads_all_extracted_rows() {
        let sink = MockSink::default();
        let pipeline = ExtractLoadPipeline::new(
            StaticSource {
                data: numbers(&[1, 2, 3]),
            },
            sink.clone(),
            "Numbers",
        );

        let summary = EtlEngine::new(pipeline).run().await.unwrap();

        assert_eq!(summary.rows_extracted, 3);
        assert_eq!(summary.rows_loaded, 3);
        assert_eq!(summary.table, "Numbers");
        assert_eq!(summary.source, "static");
        assert_eq!(sink.rows("Numbers").await.len(), 3);
    }

    #[tokio::test]
    async fn test_engine_applies_transform_before_load() {
        let sink = MockSink::default();
        let pipeline = ExtractLoadPipeline::new(
            StaticSource {
                data: numbers(&[5, 50, 500]),
            },
            sink.clone(),
            "Numbers",
        )
        .with_transform(|rs| Ok(rs.filter_rows(|row| row[0] != Value::Integer(50))));

        let summary = EtlEngine::new(pipeline).run().await.unwrap();

        assert_eq!(summary.rows_extracted, 3);
        assert_eq!(summary.rows_loaded, 2);
        assert_eq!(
            sink.rows("Numbers").await,
            vec![vec![Value::Integer(5)], vec![Value::Integer(500)]]
        );
    }

    #[tokio::test]
    async fn test_engine_propagates_extract_failure() {
        let sink = MockSink::default();
        let pipeline = ExtractLoadPipeline::new(FailingSource, sink.clone(), "Numbers");

        let err = EtlEngine::new(pipeline).run().await.unwrap_err();

        assert!(matches!(err, EtlError::HttpStatusError { status: 500, .. }));
        assert!(sink.rows("Numbers").await.is_empty());
    }
}
