pub mod etl;
pub mod pipeline;

pub use crate::domain::model::RecordSet;
pub use crate::domain::ports::{LoadSummary, Pipeline, Sink, Source};
pub use crate::utils::error::Result;
