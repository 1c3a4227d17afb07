//! Field and weather processing pipelines.
//!
//! Each pipeline owns its table and advances through `PipelineState`
//! as its stages run. Stages run strictly in sequence; a stage called
//! before its prerequisite has completed fails with `InvalidState`.

pub mod field;
pub mod weather;

#[cfg(test)]
mod tests;

pub use field::FieldProcessor;
pub use weather::WeatherProcessor;

use crate::constants::TEMP_NAME_FILLER;
use crate::error::{PipelineError, Result};
use crate::logging::PipelineLogger;
use crate::models::PipelineState;
use polars::prelude::*;

/// Fail with `Schema` unless `df` has a column called `column`
pub(crate) fn require_column(df: &DataFrame, column: &str, table: &str) -> Result<()> {
    if df.get_column_index(column).is_none() {
        return Err(PipelineError::missing_column(column, table));
    }
    Ok(())
}

/// `seed`, extended with filler characters until no column in `df` has that name
pub(crate) fn unique_column_name(df: &DataFrame, seed: &str) -> String {
    let mut name = seed.to_string();
    while df.get_column_index(&name).is_some() {
        name.push(TEMP_NAME_FILLER);
    }
    name
}

/// Fail with `InvalidState` (and log a warning) unless `current` has reached `required`
pub(crate) fn require_state(
    logger: &PipelineLogger,
    current: PipelineState,
    required: PipelineState,
    operation: &'static str,
) -> Result<()> {
    if current < required {
        logger.warn(format!(
            "Cannot {}: data is {}, expected at least {}.",
            operation, current, required
        ));
        return Err(PipelineError::InvalidState {
            operation,
            state: current,
        });
    }
    Ok(())
}
