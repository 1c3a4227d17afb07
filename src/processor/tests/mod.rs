//! Pipeline tests for the processor module
//!
//! Runs both pipelines end to end against a temporary SQLite survey
//! database and CSV files on disk standing in for the remote resources.


use sqlx::sqlite::{SqliteConnectOptions, SqlitePool};
use std::path::PathBuf;
use std::str::FromStr;
use tempfile::TempDir;

/// Field-to-station mapping as written by pandas, index column included
pub const MAPPING_CSV: &str = ",Field_ID,Weather_station
0,1,0
1,2,4
2,3,1
";

/// Create a small survey database with the columns ingested swapped
pub async fn create_survey_db(temp_dir: &TempDir) -> String {
    let path = temp_dir.path().join("Maji_Ndogo_farm_survey_small.db");
    let descriptor = format!("sqlite://{}", path.display());
    let options = SqliteConnectOptions::from_str(&descriptor)
        .unwrap()
        .create_if_missing(true);
    let pool = SqlitePool::connect_with(options).await.unwrap();

    sqlx::query(
        "CREATE TABLE geographic_features (Field_ID INTEGER PRIMARY KEY, Elevation REAL, Rainfall REAL)",
    )
    .execute(&pool)
    .await
    .unwrap();
    sqlx::query(
        "CREATE TABLE soil_and_crop_features (Field_ID INTEGER PRIMARY KEY, Crop_type REAL, Annual_yield TEXT)",
    )
    .execute(&pool)
    .await
    .unwrap();

    sqlx::query(
        "INSERT INTO geographic_features VALUES (1, -350.5, 1500.0), (2, 610.25, 800.0), (3, 0.0, 1200.0), (4, -12.0, 950.0)",
    )
    .execute(&pool)
    .await
    .unwrap();
    sqlx::query(
        "INSERT INTO soil_and_crop_features VALUES (1, 0.75, 'cassaval'), (2, 1.25, 'tea'), (3, 0.5, 'wheatn'), (4, 2.0, 'teaa')",
    )
    .execute(&pool)
    .await
    .unwrap();

    pool.close().await;
    descriptor
}

/// Query joining the two survey tables
pub const SURVEY_QUERY: &str = "SELECT *
FROM geographic_features
LEFT JOIN soil_and_crop_features USING (Field_ID)
ORDER BY Field_ID";

/// Write `content` to `name` inside `temp_dir`
pub fn write_csv(temp_dir: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = temp_dir.path().join(name);
    std::fs::write(&path, content).unwrap();
    path
}
