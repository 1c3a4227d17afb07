//! Command-line interface components.

use crate::config::PipelineConfig;
use crate::constants::{FIELD_COMPONENT, WEATHER_COMPONENT};
use crate::logging::{LogLevel, PipelineLogger, init_subscriber};
use crate::processor::{FieldProcessor, WeatherProcessor};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use polars::prelude::DataFrame;
use std::path::PathBuf;
use std::time::Instant;
use tracing::debug;

#[derive(Parser, Debug)]
#[command(name = "maji-ndogo-processor")]
#[command(about = "Clean the Maji Ndogo farm survey and summarise its weather station feed")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Pipeline configuration file (TOML)
    #[arg(short, long, global = true, default_value = "pipeline.toml")]
    pub config: PathBuf,

    /// Log level for the pipelines (DEBUG, INFO, NONE); overrides the config file
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Compact log output
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Ingest, repair, correct, and map the field survey
    Field {
        /// Database descriptor overriding `field.db_path`
        #[arg(long, value_name = "URL")]
        database: Option<String>,
    },
    /// Extract measurements from station messages and average them per station
    Weather,
}

impl Args {
    fn resolve_log_level(&self, config: &PipelineConfig) -> LogLevel {
        self.log_level
            .as_deref()
            .map(LogLevel::parse_lenient)
            .unwrap_or(config.log_level)
    }
}

/// Run the selected pipeline and print its table
pub async fn run(args: Args, command: Commands) -> Result<DataFrame> {
    let start_time = Instant::now();

    let config = PipelineConfig::from_file(&args.config)
        .with_context(|| format!("Failed to load configuration from {}", args.config.display()))?;
    let level = args.resolve_log_level(&config);
    init_subscriber(level, args.quiet);
    debug!("Command line arguments: {:?}", args);

    let table = match command {
        Commands::Field { database } => {
            let mut field = config.field()?.clone();
            if let Some(database) = database {
                field.db_path = database;
            }
            let mut processor =
                FieldProcessor::new(field, PipelineLogger::new(FIELD_COMPONENT, level));
            processor
                .process()
                .await
                .context("Field data processing failed")?
                .clone()
        }
        Commands::Weather => {
            let weather = config.weather()?.clone();
            let mut processor =
                WeatherProcessor::new(weather, PipelineLogger::new(WEATHER_COMPONENT, level))?;
            processor
                .process()
                .await
                .context("Weather data processing failed")?;
            processor.calculate_means()?
        }
    };

    println!("{}", table);
    println!(
        "\n{} {} rows x {} columns in {}ms",
        "Done:".bright_green().bold(),
        table.height().to_string().bright_white(),
        table.width().to_string().bright_white(),
        start_time.elapsed().as_millis()
    );

    Ok(table)
}
