//! Field survey pipeline.
//!
//! Ingests the survey table from the database, repairs the pair of column
//! names that were ingested swapped, corrects elevation signs and crop
//! spellings, and left-joins the field-to-station mapping.

use super::{require_column, require_state, unique_column_name};
use crate::config::FieldConfig;
use crate::constants::{FIELD_COMPONENT, TEMP_SWAP_MARKER};
use crate::error::{PipelineError, Result};
use crate::ingestion::{connect_and_query, fetch_remote_table};
use crate::logging::{LogLevel, PipelineLogger};
use crate::models::{ColumnSwap, PipelineState, ValueRenameMap};
use polars::prelude::*;

const FIELD_TABLE: &str = "the field table";
const MAPPING_TABLE: &str = "the weather station mapping";

/// Processes the field survey according to a `FieldConfig`
#[derive(Debug)]
pub struct FieldProcessor {
    config: FieldConfig,
    logger: PipelineLogger,
    df: Option<DataFrame>,
    state: PipelineState,
}

impl FieldProcessor {
    pub fn new(config: FieldConfig, logger: PipelineLogger) -> Self {
        Self {
            config,
            logger,
            df: None,
            state: PipelineState::Uninitialized,
        }
    }

    /// Create a processor logging under the default component name
    pub fn with_level(config: FieldConfig, level: LogLevel) -> Self {
        Self::new(config, PipelineLogger::new(FIELD_COMPONENT, level))
    }

    pub fn config(&self) -> &FieldConfig {
        &self.config
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Current table, including partial progress from a failed run
    pub fn data(&self) -> Option<&DataFrame> {
        self.df.as_ref()
    }

    /// Load the field table from the database
    pub async fn ingest_sql_data(&mut self) -> Result<&DataFrame> {
        let df = connect_and_query(&self.config.db_path, &self.config.sql_query).await?;
        self.logger.info(format!(
            "Successfully loaded data: {} rows, {} columns.",
            df.height(),
            df.width()
        ));

        self.state = PipelineState::Loaded;
        Ok(&*self.df.insert(df))
    }

    /// Exchange the contents of the two configured columns
    pub fn rename_columns(&mut self) -> Result<()> {
        let swap = self.config.columns_to_rename.clone();
        let df = self.table_mut("rename columns")?;
        swap_columns(df, &swap)?;
        self.logger
            .info(format!("Swapped columns: {} with {}", swap.first, swap.second));
        Ok(())
    }

    /// Make `elevation_column` non-negative and normalise `crop_column` values
    pub fn apply_corrections(&mut self, crop_column: &str, elevation_column: &str) -> Result<()> {
        let values = self.config.values_to_rename.clone();
        let df = self.table_mut("apply corrections")?;
        let corrected = correct_values(df, crop_column, elevation_column, &values)?;
        *df = corrected;
        self.logger.info(format!(
            "Applied corrections to '{}' and '{}'.",
            elevation_column, crop_column
        ));
        Ok(())
    }

    /// Left-join the field-to-station mapping onto the field table
    pub async fn weather_station_mapping(&mut self) -> Result<&DataFrame> {
        require_state(
            &self.logger,
            self.state,
            PipelineState::Loaded,
            "map weather stations",
        )?;

        let mapping = fetch_remote_table(&self.config.weather_mapping_csv).await?;
        let join_column = self.config.join_column.clone();
        let artifact_column = self.config.artifact_column.clone();

        let df = self.table_mut("map weather stations")?;
        let merged = merge_station_mapping(df, mapping, &join_column, &artifact_column)?;

        self.state = PipelineState::Processed;
        self.logger.info(format!(
            "Merged weather station mapping on '{}'.",
            join_column
        ));
        Ok(&*self.df.insert(merged))
    }

    /// Run ingest, column repair, corrections, and station mapping in order
    pub async fn process(&mut self) -> Result<&DataFrame> {
        self.ingest_sql_data().await?;
        self.rename_columns()?;
        let crop_column = self.config.crop_column.clone();
        let elevation_column = self.config.elevation_column.clone();
        self.apply_corrections(&crop_column, &elevation_column)?;
        self.weather_station_mapping().await
    }

    fn table_mut(&mut self, operation: &'static str) -> Result<&mut DataFrame> {
        require_state(&self.logger, self.state, PipelineState::Loaded, operation)?;
        self.df.as_mut().ok_or(PipelineError::InvalidState {
            operation,
            state: self.state,
        })
    }
}

/// Exchange the contents of two columns through a collision-free temporary name
///
/// No other column is touched. Swapping a column with itself leaves the
/// table unchanged.
pub fn swap_columns(df: &mut DataFrame, swap: &ColumnSwap) -> Result<()> {
    require_column(df, &swap.first, FIELD_TABLE)?;
    require_column(df, &swap.second, FIELD_TABLE)?;

    if swap.first == swap.second {
        return Ok(());
    }

    let temp_name = unique_column_name(df, TEMP_SWAP_MARKER);
    df.rename(&swap.first, temp_name.as_str().into())?;
    df.rename(&swap.second, swap.first.as_str().into())?;
    df.rename(&temp_name, swap.second.as_str().into())?;
    Ok(())
}

/// Absolute elevation and canonical crop names
pub fn correct_values(
    df: &DataFrame,
    crop_column: &str,
    elevation_column: &str,
    values: &ValueRenameMap,
) -> Result<DataFrame> {
    require_column(df, crop_column, FIELD_TABLE)?;
    require_column(df, elevation_column, FIELD_TABLE)?;

    let mut corrected = df
        .clone()
        .lazy()
        .with_column(col(elevation_column).abs())
        .collect()?;

    let crops = corrected
        .column(crop_column)?
        .as_materialized_series()
        .str()
        .map_err(|_| PipelineError::Schema {
            column: crop_column.to_string(),
            table: "the field table as a text column".to_string(),
        })?
        .into_iter()
        .map(|crop| crop.map(|raw| values.apply(raw).to_string()))
        .collect::<Vec<Option<String>>>();

    corrected.with_column(Series::new(crop_column.into(), crops))?;
    Ok(corrected)
}

/// Left-join `mapping` onto `df` by `join_column`, dropping `artifact_column`
///
/// Every row of `df` is kept in its original order; rows without a match
/// get nulls in the mapping columns.
pub fn merge_station_mapping(
    df: &DataFrame,
    mapping: DataFrame,
    join_column: &str,
    artifact_column: &str,
) -> Result<DataFrame> {
    require_column(df, join_column, FIELD_TABLE)?;
    require_column(&mapping, join_column, MAPPING_TABLE)?;
    require_column(&mapping, artifact_column, MAPPING_TABLE)?;

    let mapping = mapping.drop(artifact_column)?;
    let key_dtype = df.column(join_column)?.dtype().clone();
    let row_index = unique_column_name(df, "__row_nr");

    let merged = df
        .clone()
        .lazy()
        .with_row_index(row_index.as_str(), None)
        .join(
            mapping
                .lazy()
                .with_column(col(join_column).cast(key_dtype)),
            [col(join_column)],
            [col(join_column)],
            JoinArgs::new(JoinType::Left),
        )
        .sort([row_index.as_str()], SortMultipleOptions::default())
        .collect()?
        .drop(&row_index)?;

    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn survey_frame() -> DataFrame {
        df!(
            "Field_ID" => [1i64, 2, 3],
            "Elevation" => [-120.5, 0.0, 45.25],
            "Annual_yield" => ["cassaval", "wheatn", "maize"],
            "Crop_type" => [1.5, 2.5, 3.5],
        )
        .unwrap()
    }

    fn column_names(df: &DataFrame) -> Vec<String> {
        df.get_column_names().iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn test_swap_columns_exchanges_contents() {
        let mut df = survey_frame();
        let original = survey_frame();

        swap_columns(&mut df, &ColumnSwap::new("Annual_yield", "Crop_type")).unwrap();

        let series = |frame: &DataFrame, name: &str| {
            frame.column(name).unwrap().as_materialized_series().clone()
        };

        assert!(series(&df, "Crop_type").equals(&series(&original, "Annual_yield")));
        assert!(series(&df, "Annual_yield").equals(&series(&original, "Crop_type")));
        assert!(series(&df, "Field_ID").equals(&series(&original, "Field_ID")));
        assert!(series(&df, "Elevation").equals(&series(&original, "Elevation")));
        // Labels trade places; every other column keeps its position
        assert_eq!(
            column_names(&df),
            vec!["Field_ID", "Elevation", "Crop_type", "Annual_yield"]
        );
    }

    #[test]
    fn test_swap_columns_avoids_existing_marker_names() {
        let mut df = df!(
            "a" => [1i64, 2],
            "b" => [10i64, 20],
            "__temp_name_for_swap__" => [7i64, 8],
            "__temp_name_for_swap___" => [9i64, 9],
        )
        .unwrap();

        swap_columns(&mut df, &ColumnSwap::new("a", "b")).unwrap();

        let a = df.column("a").unwrap().as_materialized_series().i64().unwrap();
        let b = df.column("b").unwrap().as_materialized_series().i64().unwrap();
        assert_eq!(a.get(0), Some(10));
        assert_eq!(b.get(0), Some(1));

        let marker = df
            .column("__temp_name_for_swap__")
            .unwrap()
            .as_materialized_series()
            .i64()
            .unwrap();
        assert_eq!(marker.get(1), Some(8));
        assert_eq!(
            column_names(&df),
            vec!["b", "a", "__temp_name_for_swap__", "__temp_name_for_swap___"]
        );
    }

    #[test]
    fn test_swap_columns_requires_both_columns() {
        let mut df = survey_frame();
        let result = swap_columns(&mut df, &ColumnSwap::new("Annual_yield", "Missing"));

        match result {
            Err(PipelineError::Schema { column, .. }) => assert_eq!(column, "Missing"),
            other => panic!("Expected Schema error, got {:?}", other),
        }
        assert_eq!(column_names(&df), column_names(&survey_frame()));
    }

    #[test]
    fn test_swap_column_with_itself_is_noop() {
        let mut df = survey_frame();
        swap_columns(&mut df, &ColumnSwap::new("Crop_type", "Crop_type")).unwrap();
        assert!(df.equals(&survey_frame()));
    }

    #[test]
    fn test_correct_values() {
        let df = df!(
            "Crop_type" => [Some("cassaval"), Some("tea"), None, Some("teaa")],
            "Elevation" => [-5.5, 3.0, 0.0, -0.25],
        )
        .unwrap();
        let values: ValueRenameMap = [("cassaval", "cassava"), ("teaa", "tea")]
            .into_iter()
            .collect();

        let corrected = correct_values(&df, "Crop_type", "Elevation", &values).unwrap();

        let crops: Vec<Option<&str>> = corrected
            .column("Crop_type")
            .unwrap()
            .as_materialized_series()
            .str()
            .unwrap()
            .into_iter()
            .collect();
        assert_eq!(crops, vec![Some("cassava"), Some("tea"), None, Some("tea")]);

        let elevation: Vec<Option<f64>> = corrected
            .column("Elevation")
            .unwrap()
            .as_materialized_series()
            .f64()
            .unwrap()
            .into_iter()
            .collect();
        assert_eq!(elevation, vec![Some(5.5), Some(3.0), Some(0.0), Some(0.25)]);
    }

    #[test]
    fn test_correct_values_is_idempotent() {
        let df = df!(
            "Crop_type" => ["wheatn", "maize"],
            "Elevation" => [-10i64, 20],
        )
        .unwrap();
        let values: ValueRenameMap = [("wheatn", "wheat")].into_iter().collect();

        let once = correct_values(&df, "Crop_type", "Elevation", &values).unwrap();
        let twice = correct_values(&once, "Crop_type", "Elevation", &values).unwrap();
        assert!(once.equals(&twice));
    }

    #[test]
    fn test_correct_values_honours_column_arguments() {
        let df = df!(
            "Crop" => ["teaa"],
            "Height" => [-3.0],
            "Crop_type" => ["teaa"],
            "Elevation" => [-3.0],
        )
        .unwrap();
        let values: ValueRenameMap = [("teaa", "tea")].into_iter().collect();

        let corrected = correct_values(&df, "Crop", "Height", &values).unwrap();

        let crop = corrected.column("Crop").unwrap().as_materialized_series();
        assert_eq!(crop.str().unwrap().get(0), Some("tea"));
        let untouched = corrected.column("Crop_type").unwrap().as_materialized_series();
        assert_eq!(untouched.str().unwrap().get(0), Some("teaa"));
        let elevation = corrected.column("Elevation").unwrap().as_materialized_series();
        assert_eq!(elevation.f64().unwrap().get(0), Some(-3.0));
    }

    #[test]
    fn test_correct_values_missing_column() {
        let df = survey_frame();
        let result = correct_values(&df, "Crop", "Elevation", &ValueRenameMap::new());
        assert!(matches!(result, Err(PipelineError::Schema { .. })));
    }

    #[test]
    fn test_merge_keeps_every_field_row() {
        let df = df!(
            "Field_ID" => [3i64, 1, 2, 4],
            "Elevation" => [1.0, 2.0, 3.0, 4.0],
        )
        .unwrap();
        let mapping = df!(
            "Unnamed: 0" => [0i64, 1],
            "Field_ID" => [1i64, 3],
            "Weather_station" => [0i64, 4],
        )
        .unwrap();

        let merged = merge_station_mapping(&df, mapping, "Field_ID", "Unnamed: 0").unwrap();

        assert_eq!(merged.height(), df.height());
        assert_eq!(
            column_names(&merged),
            vec!["Field_ID", "Elevation", "Weather_station"]
        );

        let ids: Vec<Option<i64>> = merged
            .column("Field_ID")
            .unwrap()
            .as_materialized_series()
            .i64()
            .unwrap()
            .into_iter()
            .collect();
        assert_eq!(ids, vec![Some(3), Some(1), Some(2), Some(4)]);

        let stations: Vec<Option<i64>> = merged
            .column("Weather_station")
            .unwrap()
            .as_materialized_series()
            .i64()
            .unwrap()
            .into_iter()
            .collect();
        assert_eq!(stations, vec![Some(4), Some(0), None, None]);
    }

    #[test]
    fn test_merge_casts_mapping_key() {
        let df = df!("Field_ID" => [1i64, 2]).unwrap();
        let mapping = df!(
            "Unnamed: 0" => [0i64],
            "Field_ID" => [2i32],
            "Weather_station" => ["north"],
        )
        .unwrap();

        let merged = merge_station_mapping(&df, mapping, "Field_ID", "Unnamed: 0").unwrap();
        let stations = merged.column("Weather_station").unwrap().as_materialized_series();
        assert_eq!(stations.str().unwrap().get(1), Some("north"));
        assert_eq!(stations.null_count(), 1);
    }

    #[test]
    fn test_merge_requires_artifact_column() {
        let df = df!("Field_ID" => [1i64]).unwrap();
        let mapping = df!("Field_ID" => [1i64], "Weather_station" => [0i64]).unwrap();

        let result = merge_station_mapping(&df, mapping, "Field_ID", "Unnamed: 0");
        match result {
            Err(PipelineError::Schema { column, .. }) => assert_eq!(column, "Unnamed: 0"),
            other => panic!("Expected Schema error, got {:?}", other),
        }
    }

    #[test]
    fn test_merge_requires_join_key() {
        let df = df!("Field" => [1i64]).unwrap();
        let mapping = df!("Unnamed: 0" => [0i64], "Field_ID" => [1i64]).unwrap();

        let result = merge_station_mapping(&df, mapping, "Field_ID", "Unnamed: 0");
        assert!(matches!(result, Err(PipelineError::Schema { .. })));
    }

    #[test]
    fn test_stages_require_loaded_table() {
        let config = FieldConfig::new("sqlite://unused.db", "unused.csv");
        let mut processor = FieldProcessor::with_level(config, LogLevel::None);

        assert!(matches!(
            processor.rename_columns(),
            Err(PipelineError::InvalidState {
                state: PipelineState::Uninitialized,
                ..
            })
        ));
        assert!(matches!(
            processor.apply_corrections("Crop_type", "Elevation"),
            Err(PipelineError::InvalidState { .. })
        ));
        assert!(processor.data().is_none());
    }
}
