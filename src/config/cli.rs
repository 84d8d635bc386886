use super::toml_config::DEFAULT_CONFIG_PATH;
use clap::{Parser, Subcommand, ValueEnum};

#[derive(Debug, Clone, Parser)]
#[command(name = "etl-exercises")]
#[command(about = "Extract, load and transform walkthroughs over SQLite, S3, HTTP, CSV and DuckDB")]
pub struct CliArgs {
    /// Path to TOML configuration file (defaults apply when it is missing)
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    pub config: String,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Copy one source into DuckDB
    ExtractLoad {
        #[arg(value_enum)]
        source: SourceKind,
    },
    /// List the links of an HTML page
    Scrape {
        /// Page to fetch (overrides scrape.url)
        #[arg(long)]
        url: Option<String>,
    },
    /// Run the cleaning walkthrough on the customer CSV
    Transform {
        #[arg(value_enum)]
        style: TransformStyle,
    },
    /// Print a DuckDB table as JSON records
    Show { table: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SourceKind {
    Sqlite,
    S3,
    Api,
    Csv,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TransformStyle {
    /// In-memory record set
    Frame,
    /// Statements against the DuckDB table
    Sql,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_extract_load() {
        let args = CliArgs::parse_from(["etl-exercises", "extract-load", "api", "--verbose"]);
        assert_eq!(args.config, "etl.toml");
        assert!(args.verbose);
        assert!(matches!(
            args.command,
            Command::ExtractLoad {
                source: SourceKind::Api
            }
        ));
    }

    #[test]
    fn test_parse_transform_and_show() {
        let args = CliArgs::parse_from(["etl-exercises", "-c", "custom.toml", "transform", "sql"]);
        assert_eq!(args.config, "custom.toml");
        assert!(matches!(
            args.command,
            Command::Transform {
                style: TransformStyle::Sql
            }
        ));

        let args = CliArgs::parse_from(["etl-exercises", "--log-json", "show", "SampleData"]);
        assert!(args.log_json);
        assert!(matches!(args.command, Command::Show { ref table } if table == "SampleData"));
    }

    #[test]
    fn test_unknown_source_is_rejected() {
        assert!(CliArgs::try_parse_from(["etl-exercises", "extract-load", "ftp"]).is_err());
    }
}
