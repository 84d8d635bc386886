pub mod adapters;
pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod transform;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliArgs;
pub use config::ExerciseConfig;

pub use adapters::duckdb_store::{DuckDbSink, DuckDbStore, LoadMode};
pub use core::{etl::EtlEngine, pipeline::ExtractLoadPipeline};
pub use domain::model::{Column, ColumnType, RecordSet, Schema, Value};
pub use transform::sql::SqlTransforms;
pub use utils::error::{EtlError, Result};
