//! Tabular data sources used by the pipelines.
//!
//! Runs a query against a SQLite database and materialises the rows as a
//! Polars `DataFrame`, and fetches delimited text from a URL or local path.
//! Both sources fail loudly: an empty query result is an error, as is a
//! resource that cannot be reached or parsed.

use crate::constants::UNNAMED_COLUMN_PREFIX;
use crate::error::{PipelineError, Result};
use polars::prelude::*;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Column as _, Row, TypeInfo, ValueRef};
use std::collections::HashSet;
use std::io::Cursor;
use tracing::{debug, error, info};

/// Open a database connection pool for `descriptor`
pub async fn connect(descriptor: &str) -> Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect(descriptor)
        .await
        .map_err(|source| {
            error!("Failed to create database engine. Error: {}", source);
            PipelineError::Connection {
                descriptor: descriptor.to_string(),
                source,
            }
        })?;

    info!("Database engine created successfully.");
    Ok(pool)
}

/// Execute `sql` and return every row as a table
///
/// A query that yields no rows is reported as `EmptyResult`.
pub async fn query_table(pool: &SqlitePool, sql: &str) -> Result<DataFrame> {
    let rows = sqlx::query(sql).fetch_all(pool).await.map_err(|source| {
        error!("An error occurred while querying the database. Error: {}", source);
        PipelineError::Query {
            query: sql.to_string(),
            source,
        }
    })?;

    if rows.is_empty() {
        error!("The query returned an empty result set.");
        return Err(PipelineError::EmptyResult {
            query: sql.to_string(),
        });
    }

    let df = rows_to_dataframe(&rows).map_err(|e| match e {
        PipelineError::Query { source, .. } => PipelineError::Query {
            query: sql.to_string(),
            source,
        },
        other => other,
    })?;

    info!("Query executed successfully.");
    debug!("Query returned {} rows x {} columns", df.height(), df.width());
    Ok(df)
}

/// Connect, run one query, and release the connection
pub async fn connect_and_query(descriptor: &str, sql: &str) -> Result<DataFrame> {
    let pool = connect(descriptor).await?;
    let result = query_table(&pool, sql).await;
    pool.close().await;
    result
}

/// A single decoded SQLite value
#[derive(Debug, Clone, PartialEq)]
enum SqlCell {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
}

fn rows_to_dataframe(rows: &[SqliteRow]) -> Result<DataFrame> {
    let names = unique_names(
        rows[0]
            .columns()
            .iter()
            .map(|column| column.name().to_string())
            .collect(),
    );

    let mut cells: Vec<Vec<SqlCell>> = vec![Vec::with_capacity(rows.len()); names.len()];
    for row in rows {
        for (idx, column_cells) in cells.iter_mut().enumerate() {
            column_cells.push(decode_cell(row, idx)?);
        }
    }

    let columns = names
        .iter()
        .zip(cells)
        .map(|(name, column_cells)| cells_to_column(name, column_cells))
        .collect::<Vec<_>>();

    Ok(DataFrame::new(columns)?)
}

fn decode_cell(row: &SqliteRow, idx: usize) -> Result<SqlCell> {
    let to_query_error = |source: sqlx::Error| PipelineError::Query {
        query: String::new(),
        source,
    };

    let type_name = {
        let raw = row.try_get_raw(idx).map_err(to_query_error)?;
        if raw.is_null() {
            return Ok(SqlCell::Null);
        }
        raw.type_info().name().to_string()
    };

    let cell = match type_name.as_str() {
        "INTEGER" => {
            SqlCell::Integer(row.try_get_unchecked::<i64, _>(idx).map_err(to_query_error)?)
        }
        "REAL" => {
            SqlCell::Real(row.try_get_unchecked::<f64, _>(idx).map_err(to_query_error)?)
        }
        "BLOB" => {
            let bytes = row
                .try_get_unchecked::<Vec<u8>, _>(idx)
                .map_err(to_query_error)?;
            SqlCell::Text(String::from_utf8_lossy(&bytes).into_owned())
        }
        _ => SqlCell::Text(
            row.try_get_unchecked::<String, _>(idx)
                .map_err(to_query_error)?,
        ),
    };

    Ok(cell)
}

/// Build a column with the narrowest type that holds every value:
/// integers, then floats, then text.
fn cells_to_column(name: &str, cells: Vec<SqlCell>) -> Column {
    let has_text = cells.iter().any(|c| matches!(c, SqlCell::Text(_)));
    let has_real = cells.iter().any(|c| matches!(c, SqlCell::Real(_)));
    let has_integer = cells.iter().any(|c| matches!(c, SqlCell::Integer(_)));

    if has_text || !(has_real || has_integer) {
        let values: Vec<Option<String>> = cells
            .into_iter()
            .map(|cell| match cell {
                SqlCell::Null => None,
                SqlCell::Integer(v) => Some(v.to_string()),
                SqlCell::Real(v) => Some(v.to_string()),
                SqlCell::Text(v) => Some(v),
            })
            .collect();
        Column::new(name.into(), values)
    } else if has_real {
        let values: Vec<Option<f64>> = cells
            .into_iter()
            .map(|cell| match cell {
                SqlCell::Integer(v) => Some(v as f64),
                SqlCell::Real(v) => Some(v),
                _ => None,
            })
            .collect();
        Column::new(name.into(), values)
    } else {
        let values: Vec<Option<i64>> = cells
            .into_iter()
            .map(|cell| match cell {
                SqlCell::Integer(v) => Some(v),
                _ => None,
            })
            .collect();
        Column::new(name.into(), values)
    }
}

/// Suffix repeated names so every column in the result is addressable
fn unique_names(names: Vec<String>) -> Vec<String> {
    let mut used: HashSet<String> = HashSet::with_capacity(names.len());
    names
        .into_iter()
        .map(|name| {
            let mut candidate = name.clone();
            let mut suffix = 0;
            while used.contains(&candidate) {
                suffix += 1;
                candidate = format!("{}_{}", name, suffix);
            }
            used.insert(candidate.clone());
            candidate
        })
        .collect()
}

/// Fetch a delimited text resource and parse it into a table
///
/// `location` may be an `http(s)://` URL or a local file path.
pub async fn fetch_remote_table(location: &str) -> Result<DataFrame> {
    let content = fetch_bytes(location).await?;
    let df = parse_delimited(&content, location)?;
    info!("CSV file read successfully from {}.", location);
    Ok(df)
}

fn is_remote(location: &str) -> bool {
    let lower = location.to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

async fn fetch_bytes(location: &str) -> Result<Vec<u8>> {
    let fetch_error = |reason: String| {
        error!("Failed to read CSV from {}. Error: {}", location, reason);
        PipelineError::Fetch {
            location: location.to_string(),
            reason,
        }
    };

    if !is_remote(location) {
        return tokio::fs::read(location)
            .await
            .map_err(|e| fetch_error(e.to_string()));
    }

    let response = reqwest::get(location)
        .await
        .and_then(|response| response.error_for_status())
        .map_err(|e| fetch_error(e.to_string()))?;

    let body = response
        .bytes()
        .await
        .map_err(|e| fetch_error(e.to_string()))?;

    debug!("Fetched {} bytes from {}", body.len(), location);
    Ok(body.to_vec())
}

/// Parse CSV text into a table
///
/// Blank header cells are named `Unnamed: <position>`, so an index column
/// written without a header is still addressable by name. Column types are
/// inferred from every row; a column whose values stop fitting a numeric
/// type is read as text. Markup documents and rows whose field count differs
/// from the header are rejected.
pub fn parse_delimited(content: &[u8], location: &str) -> Result<DataFrame> {
    let parse_error = |reason: String| {
        error!(
            "The resource at {} is not a valid CSV file: {}",
            location, reason
        );
        PipelineError::Parse {
            location: location.to_string(),
            reason,
        }
    };

    let headers = inspect_records(content).map_err(parse_error)?;

    let mut df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(None)
        .into_reader_with_file_handle(Cursor::new(content))
        .finish()
        .map_err(|e| parse_error(e.to_string()))?;

    if df.width() != headers.len() {
        return Err(parse_error(format!(
            "expected {} columns from the header, found {}",
            headers.len(),
            df.width()
        )));
    }

    df.set_column_names(headers.iter().map(String::as_str))
        .map_err(|e| parse_error(e.to_string()))?;

    Ok(df)
}

/// Header names of `content`, after checking every record has the header's width
fn inspect_records(content: &[u8]) -> std::result::Result<Vec<String>, String> {
    if content.trim_ascii_start().first() == Some(&b'<') {
        return Err("content is a markup document".to_string());
    }

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(content);

    let headers = reader.headers().map_err(|e| e.to_string())?.clone();
    if headers.is_empty() {
        return Err("no columns to parse".to_string());
    }

    for record in reader.records() {
        record.map_err(|e| e.to_string())?;
    }

    Ok(headers
        .iter()
        .enumerate()
        .map(|(idx, name)| {
            if name.trim().is_empty() {
                format!("{}{}", UNNAMED_COLUMN_PREFIX, idx)
            } else {
                name.to_string()
            }
        })
        .collect())
}
