//! Maji Ndogo Processor Library
//!
//! Batch pipelines that turn the Maji Ndogo farm survey and its weather
//! station feed into analysis-ready Polars tables.
//!
//! This library provides tools for:
//! - Ingesting the field survey from a SQLite database
//! - Repairing swapped column names and correcting elevation and crop values
//! - Joining field records with their weather station mapping
//! - Extracting typed measurements from free-text station messages
//! - Averaging measurements per station and measurement kind

pub mod cli;
pub mod config;
pub mod constants;
pub mod error;
pub mod ingestion;
pub mod logging;
pub mod models;
pub mod processor;

// Re-export commonly used types
pub use config::{FieldConfig, PipelineConfig, WeatherConfig};
pub use error::{PipelineError, Result};
pub use logging::{LogLevel, PipelineLogger};
pub use models::{ColumnSwap, Measurement, PatternRuleSet, PipelineState, ValueRenameMap};
pub use processor::{FieldProcessor, WeatherProcessor};
