//! Error handling for the field and weather pipelines.
//!
//! One variant per failure kind the pipelines can surface: database
//! connection and query failures, empty result sets, remote fetch and
//! parse failures, missing columns, and numeric conversion of captured text.

use crate::models::PipelineState;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Failed to connect to database '{descriptor}': {source}")]
    Connection {
        descriptor: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("Query failed: {source}")]
    Query {
        query: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("The query returned an empty result set")]
    EmptyResult { query: String },

    #[error("Failed to fetch '{location}': {reason}")]
    Fetch { location: String, reason: String },

    #[error("'{location}' is not valid delimited text: {reason}")]
    Parse { location: String, reason: String },

    #[error("Column '{column}' not found in {table}")]
    Schema { column: String, table: String },

    #[error("Captured text '{text}' for measurement '{kind}' is not a number")]
    Conversion { kind: String, text: String },

    #[error("Cannot {operation} while the pipeline is {state}")]
    InvalidState {
        operation: &'static str,
        state: PipelineState,
    },

    #[error("Invalid pattern for measurement '{kind}': {reason}")]
    Pattern { kind: String, reason: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),
}

impl PipelineError {
    /// Create a missing-column error
    pub fn missing_column(column: impl Into<String>, table: impl Into<String>) -> Self {
        Self::Schema {
            column: column.into(),
            table: table.into(),
        }
    }

    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
