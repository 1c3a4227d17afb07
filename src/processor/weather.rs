//! Weather station pipeline.
//!
//! Fetches the station message table, extracts one typed measurement per
//! free-text message using ordered pattern rules, and averages the
//! extracted values per station and measurement kind.

use super::{require_column, require_state};
use crate::config::WeatherConfig;
use crate::constants::{MEASUREMENT_COLUMN, VALUE_COLUMN, WEATHER_COMPONENT};
use crate::error::{PipelineError, Result};
use crate::ingestion::fetch_remote_table;
use crate::logging::{LogLevel, PipelineLogger};
use crate::models::{Measurement, PatternRuleSet, PipelineState};
use polars_ops::pivot::{PivotAgg, pivot_stable};
use polars::prelude::*;

const MESSAGE_TABLE: &str = "the station message table";

/// Processes station messages according to a `WeatherConfig`
#[derive(Debug)]
pub struct WeatherProcessor {
    config: WeatherConfig,
    rules: PatternRuleSet,
    logger: PipelineLogger,
    weather_df: Option<DataFrame>,
    state: PipelineState,
}

impl WeatherProcessor {
    /// Create a processor, compiling the configured pattern rules
    pub fn new(config: WeatherConfig, logger: PipelineLogger) -> Result<Self> {
        let rules = PatternRuleSet::compile(&config.regex_patterns)?;
        Ok(Self::with_rules(config, rules, logger))
    }

    /// Create a processor from an already compiled rule set
    ///
    /// `rules` takes precedence over `config.regex_patterns`.
    pub fn with_rules(
        config: WeatherConfig,
        rules: PatternRuleSet,
        logger: PipelineLogger,
    ) -> Self {
        logger.debug(format!("Using {} measurement rules.", rules.len()));
        Self {
            config,
            rules,
            logger,
            weather_df: None,
            state: PipelineState::Uninitialized,
        }
    }

    /// Create a processor logging under the default component name
    pub fn with_level(config: WeatherConfig, level: LogLevel) -> Result<Self> {
        Self::new(config, PipelineLogger::new(WEATHER_COMPONENT, level))
    }

    pub fn config(&self) -> &WeatherConfig {
        &self.config
    }

    pub fn rules(&self) -> &PatternRuleSet {
        &self.rules
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn data(&self) -> Option<&DataFrame> {
        self.weather_df.as_ref()
    }

    /// Load the station message table
    pub async fn weather_station_mapping(&mut self) -> Result<&DataFrame> {
        let df = fetch_remote_table(&self.config.weather_csv_path).await?;
        self.logger
            .info("Successfully loaded weather station data from the web.");

        self.state = PipelineState::Loaded;
        Ok(&*self.weather_df.insert(df))
    }

    /// Measurement described by `message`, or `None` when no rule matches
    pub fn extract_measurement(&self, message: &str) -> Result<Option<Measurement>> {
        let measurement = extract_measurement(&self.rules, message)?;
        match &measurement {
            Some(m) => self
                .logger
                .debug(format!("Measurement extracted: {}", m.kind)),
            None => self.logger.debug("No measurement match found."),
        }
        Ok(measurement)
    }

    /// Add aligned measurement kind and value columns to the message table
    pub fn process_messages(&mut self) -> Result<&DataFrame> {
        require_state(
            &self.logger,
            self.state,
            PipelineState::Loaded,
            "process messages",
        )?;

        if self.rules.is_empty() {
            self.logger
                .warn("No measurement rules configured; every message will be unmatched.");
        }

        let df = self.loaded_table("process messages")?;
        let annotated = annotate_measurements(df, &self.config.message_column, |message| {
            self.extract_measurement(message)
        })?;

        let matched = annotated.height() - annotated.column(MEASUREMENT_COLUMN)?.null_count();
        self.logger.info(format!(
            "Messages processed and measurements extracted: {} of {} matched.",
            matched,
            annotated.height()
        ));

        self.state = PipelineState::Processed;
        Ok(&*self.weather_df.insert(annotated))
    }

    /// Mean value per station (rows) and measurement kind (columns)
    pub fn calculate_means(&mut self) -> Result<DataFrame> {
        require_state(
            &self.logger,
            self.state,
            PipelineState::Processed,
            "calculate means",
        )?;

        let df = self.loaded_table("calculate means")?;
        let means = mean_by_station(df, &self.config.station_column)?;

        self.logger.info("Mean values calculated.");
        self.state = PipelineState::Aggregated;
        Ok(means)
    }

    /// Load the message table and extract measurements
    ///
    /// Aggregation is left to a separate `calculate_means` call.
    pub async fn process(&mut self) -> Result<()> {
        self.weather_station_mapping().await?;
        self.process_messages()?;
        self.logger.info("Data processing completed.");
        Ok(())
    }

    fn loaded_table(&self, operation: &'static str) -> Result<&DataFrame> {
        self.weather_df.as_ref().ok_or(PipelineError::InvalidState {
            operation,
            state: self.state,
        })
    }
}

/// Try each rule in order; the first match yields the measurement
///
/// The value is the first capture group that took part in the match.
/// Captured text that is not a number is a `Conversion` error.
pub fn extract_measurement(rules: &PatternRuleSet, message: &str) -> Result<Option<Measurement>> {
    for rule in rules.iter() {
        let Some(captures) = rule.pattern().captures(message) else {
            continue;
        };

        let text = captures
            .iter()
            .skip(1)
            .flatten()
            .next()
            .map(|m| m.as_str())
            .ok_or_else(|| PipelineError::Conversion {
                kind: rule.kind().to_string(),
                text: String::new(),
            })?;

        let value = text
            .trim()
            .parse::<f64>()
            .map_err(|_| PipelineError::Conversion {
                kind: rule.kind().to_string(),
                text: text.to_string(),
            })?;

        return Ok(Some(Measurement {
            kind: rule.kind().to_string(),
            value,
        }));
    }

    Ok(None)
}

/// Copy of `df` with `Measurement` and `Value` columns derived from `message_column`
///
/// Null messages and messages no rule matches get nulls in both columns.
pub fn annotate_measurements<F>(
    df: &DataFrame,
    message_column: &str,
    mut extract: F,
) -> Result<DataFrame>
where
    F: FnMut(&str) -> Result<Option<Measurement>>,
{
    require_column(df, message_column, MESSAGE_TABLE)?;

    let messages = df
        .column(message_column)?
        .as_materialized_series()
        .str()
        .map_err(|_| PipelineError::Schema {
            column: message_column.to_string(),
            table: format!("{} as a text column", MESSAGE_TABLE),
        })?;

    let mut kinds: Vec<Option<String>> = Vec::with_capacity(df.height());
    let mut values: Vec<Option<f64>> = Vec::with_capacity(df.height());

    for message in messages.into_iter() {
        let measurement = match message {
            Some(text) => extract(text)?,
            None => None,
        };
        match measurement {
            Some(Measurement { kind, value }) => {
                kinds.push(Some(kind));
                values.push(Some(value));
            }
            None => {
                kinds.push(None);
                values.push(None);
            }
        }
    }

    let mut annotated = df.clone();
    annotated.with_column(Series::new(MEASUREMENT_COLUMN.into(), kinds))?;
    annotated.with_column(Series::new(VALUE_COLUMN.into(), values))?;
    Ok(annotated)
}

/// Reshape grouped means so stations are rows and measurement kinds are columns
///
/// Rows and columns are sorted. Station identifiers are rendered as text.
/// A cell is null when the station has no message of that kind.
pub fn mean_by_station(df: &DataFrame, station_column: &str) -> Result<DataFrame> {
    require_column(df, station_column, MESSAGE_TABLE)?;
    require_column(df, MEASUREMENT_COLUMN, MESSAGE_TABLE)?;
    require_column(df, VALUE_COLUMN, MESSAGE_TABLE)?;

    let grouped = df
        .clone()
        .lazy()
        .filter(col(MEASUREMENT_COLUMN).is_not_null())
        .group_by([col(station_column), col(MEASUREMENT_COLUMN)])
        .agg([col(VALUE_COLUMN).cast(DataType::Float64).mean()])
        .sort(
            [station_column, MEASUREMENT_COLUMN],
            SortMultipleOptions::default(),
        )
        .with_column(col(station_column).cast(DataType::String))
        .collect()?;

    // Nothing matched: the aggregate has stations only, and there are none
    if grouped.height() == 0 {
        return Ok(grouped.select([station_column])?);
    }

    // One row per (station, kind) already, so `First` just places each mean
    let means = pivot_stable(
        &grouped,
        [MEASUREMENT_COLUMN],
        Some([station_column]),
        Some([VALUE_COLUMN]),
        true,
        Some(PivotAgg::First),
        None,
    )?;

    Ok(means)
}
