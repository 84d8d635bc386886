use crate::transform::{Bound, OutlierRule};
use crate::utils::error::{EtlError, Result};
use crate::utils::validation::{
    validate_aws_region, validate_file_extensions, validate_identifier,
    validate_non_empty_string, validate_path, validate_s3_bucket_name,
    validate_url, Validate,
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_CONFIG_PATH: &str = "etl.toml";
const API_KEY_ENV: &str = "API_KEY";

/// Everything the exercises read from `etl.toml`. Every section and field is
/// optional; a missing file yields [`ExerciseConfig::default`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExerciseConfig {
    pub duckdb: DuckDbConfig,
    pub sqlite: SqliteConfig,
    pub s3: S3Config,
    pub api: ApiConfig,
    pub csv: CsvConfig,
    pub scrape: ScrapeConfig,
    pub transform: TransformConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DuckDbConfig {
    pub path: String,
}

impl Default for DuckDbConfig {
    fn default() -> Self {
        Self {
            path: "db/duckdb.db".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SqliteConfig {
    pub path: String,
    pub table: String,
    pub destination_table: String,
}

impl Default for SqliteConfig {
    fn default() -> Self {
        Self {
            path: "db/tpch.db".to_string(),
            table: "Customer".to_string(),
            destination_table: "Customer".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct S3Config {
    pub bucket: String,
    pub key: String,
    pub region: String,
    /// S3-compatible endpoint override (MinIO, localstack).
    pub endpoint_url: Option<String>,
    pub destination_table: String,
}

impl Default for S3Config {
    fn default() -> Self {
        Self {
            bucket: "noaa-ghcn-pds".to_string(),
            key: "csv.gz/by_station/ASN00002024.csv.gz".to_string(),
            region: "us-east-1".to_string(),
            endpoint_url: None,
            destination_table: "WeatherData".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub endpoint: String,
    pub api_key: Option<String>,
    pub destination_table: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://rest.coincap.io/v3/exchanges".to_string(),
            api_key: None,
            destination_table: "Exchanges".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CsvConfig {
    pub path: String,
    pub table: String,
}

impl Default for CsvConfig {
    fn default() -> Self {
        Self {
            path: "data/sample_data.csv".to_string(),
            table: "SampleData".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrapeConfig {
    pub url: String,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            url: "https://github.com/jimin-kang/python-for-data-engineering".to_string(),
        }
    }
}

/// Column choices and rules for the cleaning walkthrough.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransformConfig {
    pub key_column: String,
    pub order_column: String,
    pub fill_columns: Vec<String>,
    pub outliers: OutlierRule,
    /// Rule for the second, conjunctive delete in the SQL walkthrough.
    pub sql_outliers: OutlierRule,
    pub gender_column: String,
    pub name_column: String,
    pub age_column: String,
    pub measure_column: String,
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            key_column: "Customer_ID".to_string(),
            order_column: "Purchase_Date".to_string(),
            fill_columns: vec!["Age".to_string(), "Purchase_Amount".to_string()],
            outliers: OutlierRule::customer_default(),
            sql_outliers: OutlierRule::all(vec![
                Bound::at_most("Age", 50.0),
                Bound::at_most("Purchase_Amount", 700.0),
            ]),
            gender_column: "Gender".to_string(),
            name_column: "Customer_Name".to_string(),
            age_column: "Age".to_string(),
            measure_column: "Purchase_Amount".to_string(),
        }
    }
}

impl TransformConfig {
    pub fn fill_columns(&self) -> Vec<&str> {
        self.fill_columns.iter().map(String::as_str).collect()
    }
}

impl ExerciseConfig {
    /// Load from `path`, falling back to defaults when the file does not exist.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::info!("No config at {}, using defaults", path.display());
            return Ok(Self::default().with_env_api_key());
        }
        Self::from_file(path)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(EtlError::IoError)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed = Self::substitute_env_vars(content)?;
        let config: Self =
            toml::from_str(&processed).map_err(|e| EtlError::ConfigValidationError {
                field: "toml_parsing".to_string(),
                message: format!("TOML parsing error: {}", e),
            })?;
        Ok(config.with_env_api_key())
    }

    /// Replace `${VAR}` with the environment value; unset variables are left as-is.
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| EtlError::ConfigError {
            message: format!("invalid substitution pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    /// An unresolved `${...}` or blank key counts as missing; then `API_KEY` is tried.
    fn with_env_api_key(mut self) -> Self {
        let usable = |key: &String| !key.trim().is_empty() && !key.contains("${");
        self.api.api_key = self
            .api
            .api_key
            .take()
            .filter(usable)
            .or_else(|| std::env::var(API_KEY_ENV).ok().filter(usable));
        self
    }

    pub fn validate_config(&self) -> Result<()> {
        validate_path("duckdb.path", &self.duckdb.path)?;

        validate_path("sqlite.path", &self.sqlite.path)?;
        validate_identifier("sqlite.table", &self.sqlite.table)?;
        validate_identifier("sqlite.destination_table", &self.sqlite.destination_table)?;

        validate_s3_bucket_name("s3.bucket", &self.s3.bucket)?;
        validate_non_empty_string("s3.key", &self.s3.key)?;
        validate_aws_region("s3.region", &self.s3.region)?;
        if let Some(endpoint) = &self.s3.endpoint_url {
            validate_url("s3.endpoint_url", endpoint)?;
        }
        validate_identifier("s3.destination_table", &self.s3.destination_table)?;

        validate_url("api.endpoint", &self.api.endpoint)?;
        validate_identifier("api.destination_table", &self.api.destination_table)?;

        validate_path("csv.path", &self.csv.path)?;
        validate_file_extensions("csv.path", std::slice::from_ref(&self.csv.path), &["csv"])?;
        validate_identifier("csv.table", &self.csv.table)?;

        validate_url("scrape.url", &self.scrape.url)?;

        let t = &self.transform;
        for (field, column) in [
            ("transform.key_column", &t.key_column),
            ("transform.order_column", &t.order_column),
            ("transform.gender_column", &t.gender_column),
            ("transform.name_column", &t.name_column),
            ("transform.age_column", &t.age_column),
            ("transform.measure_column", &t.measure_column),
        ] {
            validate_identifier(field, column)?;
        }
        for column in &t.fill_columns {
            validate_identifier("transform.fill_columns", column)?;
        }
        for (field, rule) in [
            ("transform.outliers", &t.outliers),
            ("transform.sql_outliers", &t.sql_outliers),
        ] {
            for bound in &rule.bounds {
                validate_identifier(field, &bound.column)?;
                if let Some(limit) = bound.min.into_iter().chain(bound.max).find(|v| !v.is_finite()) {
                    return Err(EtlError::InvalidConfigValueError {
                        field: field.to_string(),
                        value: format!("{}: {}", bound.column, limit),
                        reason: "bounds must be finite numbers".to_string(),
                    });
                }
                if let (Some(min), Some(max)) = (bound.min, bound.max) {
                    if min > max {
                        return Err(EtlError::InvalidConfigValueError {
                            field: field.to_string(),
                            value: format!("{}: {}..{}", bound.column, min, max),
                            reason: "min must not exceed max".to_string(),
                        });
                    }
                }
            }
        }

        Ok(())
    }
}

impl Validate for ExerciseConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::Match;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_empty_document_is_all_defaults() {
        let config = ExerciseConfig::from_toml_str("").unwrap();
        assert_eq!(config.duckdb.path, "db/duckdb.db");
        assert_eq!(config.csv.table, "SampleData");
        assert_eq!(config.transform.outliers, OutlierRule::customer_default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_sections_and_partial_overrides() {
        let toml_content = r#"
[duckdb]
path = "/tmp/exercises.duckdb"

[s3]
bucket = "noaa-ghcn-pds"
key = "csv.gz/by_station/ASN00002022.csv.gz"
endpoint_url = "http://localhost:9000"

[transform]
fill_columns = ["Age"]

[transform.outliers]
mode = "all"
bounds = [
  { column = "Age", max = 60.0 },
  { column = "Purchase_Amount", min = 0.0, max = 500.0 },
]
"#;

        let config = ExerciseConfig::from_toml_str(toml_content).unwrap();

        assert_eq!(config.duckdb.path, "/tmp/exercises.duckdb");
        assert_eq!(config.s3.region, "us-east-1");
        assert_eq!(config.s3.endpoint_url.as_deref(), Some("http://localhost:9000"));
        assert_eq!(config.transform.fill_columns(), vec!["Age"]);
        assert_eq!(config.transform.outliers.mode, Match::All);
        assert_eq!(config.transform.outliers.bounds[1].min, Some(0.0));
        assert_eq!(config.transform.key_column, "Customer_ID");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("ETL_EXERCISES_TEST_ENDPOINT", "https://api.example.com/v3/exchanges");

        let config = ExerciseConfig::from_toml_str(
            r#"
[api]
endpoint = "${ETL_EXERCISES_TEST_ENDPOINT}"
"#,
        )
        .unwrap();
        assert_eq!(config.api.endpoint, "https://api.example.com/v3/exchanges");

        std::env::remove_var("ETL_EXERCISES_TEST_ENDPOINT");
    }

    #[test]
    fn test_unresolved_api_key_is_dropped() {
        let config = ExerciseConfig::from_toml_str(
            r#"
[api]
api_key = "${ETL_EXERCISES_UNSET_VARIABLE}"
"#,
        )
        .unwrap();
        // falls through to API_KEY, which may or may not be set where tests run
        let from_env = std::env::var(API_KEY_ENV)
            .ok()
            .filter(|k| !k.trim().is_empty() && !k.contains("${"));
        assert_eq!(config.api.api_key, from_env);
    }

    #[test]
    fn test_config_validation() {
        let mut config = ExerciseConfig::default();
        config.api.endpoint = "invalid-url".to_string();
        assert!(config.validate().is_err());

        let mut config = ExerciseConfig::default();
        config.csv.table = "Sample Data".to_string();
        assert!(matches!(
            config.validate(),
            Err(EtlError::InvalidConfigValueError { ref field, .. }) if field == "csv.table"
        ));

        let mut config = ExerciseConfig::default();
        config.csv.path = "data/sample_data.json".to_string();
        assert!(config.validate().is_err());

        let mut config = ExerciseConfig::default();
        config.transform.outliers = OutlierRule::any(vec![Bound {
            column: "Age".to_string(),
            min: Some(10.0),
            max: Some(5.0),
        }]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_non_finite_bounds_are_rejected() {
        for limit in ["nan", "inf", "-inf"] {
            let config = ExerciseConfig::from_toml_str(&format!(
                "[transform.sql_outliers]\nbounds = [{{ column = \"Age\", max = {} }}]\n",
                limit
            ))
            .unwrap();
            assert!(matches!(
                config.validate(),
                Err(EtlError::InvalidConfigValueError { ref field, .. })
                    if field == "transform.sql_outliers"
            ));
        }
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let err = ExerciseConfig::from_toml_str("[duckdb\npath = 1").unwrap_err();
        assert!(matches!(err, EtlError::ConfigValidationError { .. }));
    }

    #[test]
    fn test_config_from_file_and_missing_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file
            .write_all(b"[csv]\npath = \"fixtures/customers.csv\"\n")
            .unwrap();

        let config = ExerciseConfig::load(temp_file.path()).unwrap();
        assert_eq!(config.csv.path, "fixtures/customers.csv");

        let defaults = ExerciseConfig::load("does/not/exist/etl.toml").unwrap();
        assert_eq!(defaults.csv, CsvConfig::default());
    }
}
