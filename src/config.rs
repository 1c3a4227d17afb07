//! Configuration management and validation.
//!
//! Provides the configuration bundles handed to the field and weather
//! pipelines, TOML loading for the binary, and validation of locations,
//! the column swap directive, and the measurement rules.

use crate::constants::{
    ARTIFACT_INDEX_COLUMN, DEFAULT_CROP_COLUMN, DEFAULT_CROP_CORRECTIONS,
    DEFAULT_ELEVATION_COLUMN, DEFAULT_FIELD_QUERY, DEFAULT_PATTERN_RULES,
    DEFAULT_SWAPPED_COLUMNS, FIELD_ID_COLUMN, MESSAGE_COLUMN, STATION_ID_COLUMN,
};
use crate::error::{PipelineError, Result};
use crate::logging::LogLevel;
use crate::models::{ColumnSwap, PatternSpec, ValueRenameMap};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// Settings for the field survey pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldConfig {
    /// SQLite connection descriptor, e.g. `sqlite://Maji_Ndogo_farm_survey_small.db`
    pub db_path: String,

    /// Query producing the field table
    #[serde(default = "default_field_query")]
    pub sql_query: String,

    /// Columns whose contents were ingested swapped
    #[serde(default = "default_swapped_columns")]
    pub columns_to_rename: ColumnSwap,

    /// Crop value corrections
    #[serde(default = "default_crop_corrections")]
    pub values_to_rename: ValueRenameMap,

    /// URL or path of the field-to-station mapping CSV
    pub weather_mapping_csv: String,

    #[serde(default = "default_crop_column")]
    pub crop_column: String,

    #[serde(default = "default_elevation_column")]
    pub elevation_column: String,

    /// Key shared by the field table and the station mapping
    #[serde(default = "default_join_column")]
    pub join_column: String,

    /// Index column written into the mapping CSV, dropped after the merge
    #[serde(default = "default_artifact_column")]
    pub artifact_column: String,
}

impl FieldConfig {
    /// Create a configuration with the survey defaults for everything but the locations
    pub fn new(db_path: impl Into<String>, weather_mapping_csv: impl Into<String>) -> Self {
        Self {
            db_path: db_path.into(),
            sql_query: default_field_query(),
            columns_to_rename: default_swapped_columns(),
            values_to_rename: default_crop_corrections(),
            weather_mapping_csv: weather_mapping_csv.into(),
            crop_column: default_crop_column(),
            elevation_column: default_elevation_column(),
            join_column: default_join_column(),
            artifact_column: default_artifact_column(),
        }
    }

    pub fn with_sql_query(mut self, sql_query: impl Into<String>) -> Self {
        self.sql_query = sql_query.into();
        self
    }

    pub fn with_columns_to_rename(mut self, swap: ColumnSwap) -> Self {
        self.columns_to_rename = swap;
        self
    }

    pub fn with_values_to_rename(mut self, values: ValueRenameMap) -> Self {
        self.values_to_rename = values;
        self
    }

    pub fn validate(&self) -> Result<()> {
        require_non_empty("field.db_path", &self.db_path)?;
        require_non_empty("field.sql_query", &self.sql_query)?;
        require_non_empty("field.weather_mapping_csv", &self.weather_mapping_csv)?;
        require_non_empty("field.columns_to_rename.first", &self.columns_to_rename.first)?;
        require_non_empty(
            "field.columns_to_rename.second",
            &self.columns_to_rename.second,
        )?;
        require_non_empty("field.join_column", &self.join_column)?;
        Ok(())
    }
}

/// Settings for the weather station pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherConfig {
    /// URL or path of the station message CSV
    pub weather_csv_path: String,

    /// Ordered measurement rules; the first matching rule wins
    #[serde(default = "default_pattern_rules")]
    pub regex_patterns: Vec<PatternSpec>,

    #[serde(default = "default_station_column")]
    pub station_column: String,

    #[serde(default = "default_message_column")]
    pub message_column: String,
}

impl WeatherConfig {
    /// Create a configuration with the default measurement rules
    pub fn new(weather_csv_path: impl Into<String>) -> Self {
        Self {
            weather_csv_path: weather_csv_path.into(),
            regex_patterns: default_pattern_rules(),
            station_column: default_station_column(),
            message_column: default_message_column(),
        }
    }

    pub fn with_patterns(mut self, patterns: Vec<PatternSpec>) -> Self {
        self.regex_patterns = patterns;
        self
    }

    pub fn validate(&self) -> Result<()> {
        require_non_empty("weather.weather_csv_path", &self.weather_csv_path)?;
        if self.regex_patterns.is_empty() {
            return Err(PipelineError::configuration(
                "weather.regex_patterns must contain at least one rule",
            ));
        }
        Ok(())
    }
}

/// Top-level configuration file read by the binary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub log_level: LogLevel,

    pub field: Option<FieldConfig>,

    pub weather: Option<WeatherConfig>,
}

impl PipelineConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&content)?;
        debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| PipelineError::configuration(format!("invalid TOML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(field) = &self.field {
            field.validate()?;
        }
        if let Some(weather) = &self.weather {
            weather.validate()?;
        }
        Ok(())
    }

    pub fn field(&self) -> Result<&FieldConfig> {
        self.field
            .as_ref()
            .ok_or_else(|| PipelineError::configuration("missing [field] section"))
    }

    pub fn weather(&self) -> Result<&WeatherConfig> {
        self.weather
            .as_ref()
            .ok_or_else(|| PipelineError::configuration("missing [weather] section"))
    }
}

fn require_non_empty(name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(PipelineError::configuration(format!(
            "{} must not be empty",
            name
        )));
    }
    Ok(())
}

fn default_field_query() -> String {
    DEFAULT_FIELD_QUERY.to_string()
}

fn default_swapped_columns() -> ColumnSwap {
    ColumnSwap::new(DEFAULT_SWAPPED_COLUMNS.0, DEFAULT_SWAPPED_COLUMNS.1)
}

fn default_crop_corrections() -> ValueRenameMap {
    DEFAULT_CROP_CORRECTIONS.iter().copied().collect()
}

fn default_crop_column() -> String {
    DEFAULT_CROP_COLUMN.to_string()
}

fn default_elevation_column() -> String {
    DEFAULT_ELEVATION_COLUMN.to_string()
}

fn default_join_column() -> String {
    FIELD_ID_COLUMN.to_string()
}

fn default_artifact_column() -> String {
    ARTIFACT_INDEX_COLUMN.to_string()
}

fn default_pattern_rules() -> Vec<PatternSpec> {
    DEFAULT_PATTERN_RULES
        .iter()
        .map(|(kind, pattern)| PatternSpec::new(*kind, *pattern))
        .collect()
}

fn default_station_column() -> String {
    STATION_ID_COLUMN.to_string()
}

fn default_message_column() -> String {
    MESSAGE_COLUMN.to_string()
}
