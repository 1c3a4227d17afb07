//! Application constants for the Maji Ndogo processor
//!
//! Column names, default queries, and default correction/extraction
//! rules shared by the field and weather pipelines.

// =============================================================================
// Field Survey Columns
// =============================================================================

/// Identifier shared by the field table and the weather-station mapping
pub const FIELD_ID_COLUMN: &str = "Field_ID";

/// Categorical column normalised through the value rename map
pub const DEFAULT_CROP_COLUMN: &str = "Crop_type";

/// Numeric column corrected to its absolute value
pub const DEFAULT_ELEVATION_COLUMN: &str = "Elevation";

/// Index column left behind when the mapping CSV was written with its row index
pub const ARTIFACT_INDEX_COLUMN: &str = "Unnamed: 0";

/// Prefix used for blank header cells when reading delimited text
pub const UNNAMED_COLUMN_PREFIX: &str = "Unnamed: ";

/// Seed for collision-free temporary column names
pub const TEMP_SWAP_MARKER: &str = "__temp_name_for_swap__";

/// Filler appended to a temporary name until it is unique
pub const TEMP_NAME_FILLER: char = '_';

/// Query that assembles the full survey from its four feature tables
pub const DEFAULT_FIELD_QUERY: &str = "SELECT *
FROM geographic_features
LEFT JOIN weather_features USING (Field_ID)
LEFT JOIN soil_and_crop_features USING (Field_ID)
LEFT JOIN farm_management_features USING (Field_ID)";

/// Known misspellings in the crop type column
pub const DEFAULT_CROP_CORRECTIONS: &[(&str, &str)] = &[
    ("cassaval", "cassava"),
    ("wheatn", "wheat"),
    ("teaa", "tea"),
];

/// Columns that were ingested with each other's contents
pub const DEFAULT_SWAPPED_COLUMNS: (&str, &str) = ("Annual_yield", "Crop_type");

// =============================================================================
// Weather Station Columns
// =============================================================================

/// Station identifier in the message table
pub const STATION_ID_COLUMN: &str = "Weather_station_ID";

/// Free-text message column
pub const MESSAGE_COLUMN: &str = "Message";

/// Extracted measurement kind
pub const MEASUREMENT_COLUMN: &str = "Measurement";

/// Extracted measurement value
pub const VALUE_COLUMN: &str = "Value";

/// Ordered default extraction rules: (measurement kind, pattern)
pub const DEFAULT_PATTERN_RULES: &[(&str, &str)] = &[
    ("Rainfall", r"(\d+(\.\d+)?)\s?mm"),
    ("Temperature", r"(\d+(\.\d+)?)\s?C"),
    (
        "Pollution_level",
        r"=\s*(-?\d+(\.\d+)?)|Pollution at \s*(-?\d+(\.\d+)?)",
    ),
];

// =============================================================================
// Logging
// =============================================================================

/// Component name attached to field pipeline events
pub const FIELD_COMPONENT: &str = "FieldDataProcessor";

/// Component name attached to weather pipeline events
pub const WEATHER_COMPONENT: &str = "WeatherDataProcessor";

/// Filter target used when the binary installs its subscriber
pub const LOG_TARGET: &str = "maji_ndogo_processor";
