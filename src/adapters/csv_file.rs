use crate::adapters::run_blocking;
use crate::core::{RecordSet, Source};
use crate::domain::records::Customer;
use crate::utils::error::Result;
use std::io::Read;
use std::path::PathBuf;

/// Parse customer rows from any reader. The header line is required; column
/// order may differ from the canonical schema.
pub fn read_customers<R: Read>(reader: R) -> Result<Vec<Customer>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut customers = Vec::new();
    for result in rdr.deserialize::<Customer>() {
        customers.push(result?);
    }
    Ok(customers)
}

/// The local customer purchases file (`data/sample_data.csv`).
#[derive(Debug, Clone)]
pub struct CsvFileSource {
    path: PathBuf,
}

impl CsvFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn read(&self) -> Result<RecordSet> {
        let file = std::fs::File::open(&self.path)?;
        let customers = read_customers(file)?;
        tracing::debug!(rows = customers.len(), path = %self.path.display(), "Read customer CSV");
        Ok(Customer::to_record_set(customers))
    }
}

impl Source for CsvFileSource {
    fn describe(&self) -> String {
        format!("csv:{}", self.path.display())
    }

    async fn extract(&self) -> Result<RecordSet> {
        let source = self.clone();
        run_blocking(move || source.read()).await
    }
}
