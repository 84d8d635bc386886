use anyhow::Context;
use clap::Parser;
use etl_exercises::app;
use etl_exercises::config::{CliArgs, Command, SourceKind, TransformStyle};
use etl_exercises::utils::error::{ErrorSeverity, EtlError, Result};
use etl_exercises::utils::{logger, validation::Validate};
use etl_exercises::ExerciseConfig;
use serde::Serialize;

#[tokio::main]
async fn main() {
    let args = CliArgs::parse();

    if args.log_json {
        logger::init_json_logger(args.verbose);
    } else {
        logger::init_cli_logger(args.verbose);
    }

    tracing::info!("Starting etl-exercises");
    tracing::debug!("CLI args: {:?}", args);

    let config = match load_config(&args.config) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("❌ {:#}", e);
            eprintln!("❌ {:#}", e);
            if let Some(etl_error) = e.downcast_ref::<EtlError>() {
                eprintln!("💡 Suggestion: {}", etl_error.recovery_suggestion());
            }
            std::process::exit(1);
        }
    };

    if let Err(e) = dispatch(&args.command, &config).await {
        tracing::error!(
            "❌ Exercise failed: {} (Category: {:?}, Severity: {:?})",
            e,
            e.category(),
            e.severity()
        );
        tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

        eprintln!("❌ {}", e.user_friendly_message());
        eprintln!("💡 Suggestion: {}", e.recovery_suggestion());

        let exit_code = match e.severity() {
            ErrorSeverity::Low => 0,
            ErrorSeverity::Medium => 2,
            ErrorSeverity::High => 1,
            ErrorSeverity::Critical => 3,
        };
        if exit_code > 0 {
            std::process::exit(exit_code);
        }
    }
}

fn load_config(path: &str) -> anyhow::Result<ExerciseConfig> {
    let config = ExerciseConfig::load(path)
        .with_context(|| format!("Failed to load config file '{}'", path))?;
    config
        .validate()
        .context("Configuration validation failed")?;
    Ok(config)
}

async fn dispatch(command: &Command, config: &ExerciseConfig) -> Result<()> {
    match command {
        Command::ExtractLoad { source } => {
            let summary = match source {
                SourceKind::Sqlite => app::sqlite_to_duckdb(config).await?,
                SourceKind::S3 => s3_to_duckdb(config).await?,
                SourceKind::Api => app::api_to_duckdb(config).await?,
                SourceKind::Csv => app::csv_to_duckdb(config)?,
            };
            println!(
                "✅ Loaded {} rows from {} into {}",
                summary.rows_loaded, summary.source, summary.table
            );
            print_json(&summary)
        }
        Command::Scrape { url } => print_json(&app::scrape(config, url.as_deref()).await?),
        Command::Transform { style } => {
            let report = match style {
                TransformStyle::Frame => app::run_frame(config).await?,
                TransformStyle::Sql => app::run_sql(config)?,
            };
            print_json(&report)
        }
        Command::Show { table } => print_json(&app::show_table(config, table)?),
    }
}

#[cfg(feature = "s3")]
async fn s3_to_duckdb(config: &ExerciseConfig) -> Result<etl_exercises::core::LoadSummary> {
    app::s3_to_duckdb(config).await
}

#[cfg(not(feature = "s3"))]
async fn s3_to_duckdb(_config: &ExerciseConfig) -> Result<etl_exercises::core::LoadSummary> {
    Err(EtlError::ConfigError {
        message: "this build does not include the `s3` feature".to_string(),
    })
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
