//! Dataset loading, previews and the column-major feature table used by the
//! preprocessing pipeline.

use crate::error::{BuilderError, Result};
use polars::prelude::*;
use std::io::Cursor;
use std::path::Path;

/// Supported upload formats, resolved from a file name's extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataFormat {
    Csv,
    Json,
    Parquet,
}

impl DataFormat {
    pub fn from_file_name(name: &str) -> Result<Self> {
        let ext = Path::new(name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        match ext.as_str() {
            "csv" => Ok(DataFormat::Csv),
            "json" => Ok(DataFormat::Json),
            "parquet" => Ok(DataFormat::Parquet),
            _ => Err(BuilderError::InvalidInput(
                "Unsupported file type. Please upload CSV, JSON or Parquet.".to_string(),
            )),
        }
    }
}

/// Parse an in-memory upload into a frame
pub fn read_bytes(data: &[u8], format: DataFormat) -> Result<DataFrame> {
    let df = match format {
        DataFormat::Csv => CsvReadOptions::default()
            .with_infer_schema_length(Some(1000))
            .with_has_header(true)
            .into_reader_with_file_handle(Cursor::new(data))
            .finish()?,
        DataFormat::Json => JsonReader::new(Cursor::new(data)).finish()?,
        DataFormat::Parquet => ParquetReader::new(Cursor::new(data)).finish()?,
    };
    Ok(df)
}

/// Load a dataset from disk, choosing the reader by extension
pub fn load_data(path: &Path) -> Result<DataFrame> {
    let name = path.to_string_lossy();
    let format = DataFormat::from_file_name(&name)?;
    let bytes = std::fs::read(path)?;
    read_bytes(&bytes, format)
}

/// Write a frame as CSV
pub fn write_csv(df: &mut DataFrame, path: &Path) -> Result<()> {
    let mut file = std::fs::File::create(path)?;
    CsvWriter::new(&mut file).include_header(true).finish(df)?;
    Ok(())
}

/// Encode a frame as Arrow IPC bytes for session snapshots
pub fn to_ipc_bytes(df: &DataFrame) -> Result<Vec<u8>> {
    let mut df = df.clone();
    let mut buf = Vec::new();
    IpcWriter::new(&mut buf).finish(&mut df)?;
    Ok(buf)
}

pub fn from_ipc_bytes(bytes: &[u8]) -> Result<DataFrame> {
    Ok(IpcReader::new(Cursor::new(bytes)).finish()?)
}

pub fn column_names(df: &DataFrame) -> Vec<String> {
    df.get_column_names().iter().map(|s| s.to_string()).collect()
}

/// Integer and float storage types count as numeric
pub fn is_numeric_dtype(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float32
            | DataType::Float64
    )
}

fn any_value_to_json(value: &AnyValue) -> serde_json::Value {
    match value {
        AnyValue::Null => serde_json::Value::Null,
        AnyValue::Boolean(v) => serde_json::json!(v),
        AnyValue::String(v) => serde_json::json!(v),
        AnyValue::StringOwned(v) => serde_json::json!(v.as_str()),
        AnyValue::Int8(v) => serde_json::json!(v),
        AnyValue::Int16(v) => serde_json::json!(v),
        AnyValue::Int32(v) => serde_json::json!(v),
        AnyValue::Int64(v) => serde_json::json!(v),
        AnyValue::UInt8(v) => serde_json::json!(v),
        AnyValue::UInt16(v) => serde_json::json!(v),
        AnyValue::UInt32(v) => serde_json::json!(v),
        AnyValue::UInt64(v) => serde_json::json!(v),
        // serde_json maps non-finite floats to null
        AnyValue::Float32(v) => serde_json::json!(v),
        AnyValue::Float64(v) => serde_json::json!(v),
        other => serde_json::json!(other.to_string()),
    }
}

/// First `n` rows as JSON records keyed by column name
pub fn preview_records(df: &DataFrame, n: usize) -> Vec<serde_json::Map<String, serde_json::Value>> {
    let head = df.head(Some(n));
    (0..head.height())
        .map(|i| {
            head.get_columns()
                .iter()
                .map(|col| {
                    let value = col
                        .as_materialized_series()
                        .get(i)
                        .map(|v| any_value_to_json(&v))
                        .unwrap_or(serde_json::Value::Null);
                    (col.name().to_string(), value)
                })
                .collect()
        })
        .collect()
}

/// Numeric view of a column; NaN counts as missing
pub fn numeric_values(series: &Series) -> Result<Vec<Option<f64>>> {
    let cast = series.cast(&DataType::Float64)?;
    let ca = cast.f64()?;
    Ok(ca
        .into_iter()
        .map(|v| v.filter(|x| !x.is_nan()))
        .collect())
}

/// String view of a column; booleans and temporals render through their
/// string cast
pub fn categorical_values(series: &Series) -> Result<Vec<Option<String>>> {
    let cast = series.cast(&DataType::String)?;
    let ca = cast.str()?;
    Ok(ca.into_iter().map(|v| v.map(|s| s.to_string())).collect())
}

/// Column-major feature table: numeric block then categorical block, each in
/// declared order
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureTable {
    pub numeric: Vec<(String, Vec<Option<f64>>)>,
    pub categorical: Vec<(String, Vec<Option<String>>)>,
    n_rows: usize,
}

impl FeatureTable {
    /// Extract the named columns from a frame
    pub fn from_frame(df: &DataFrame, numeric: &[String], categorical: &[String]) -> Result<Self> {
        let lookup = |name: &String| {
            df.column(name)
                .map(|c| c.as_materialized_series().clone())
                .map_err(|_| BuilderError::DataError(format!("Feature column '{}' not found", name)))
        };

        let numeric = numeric
            .iter()
            .map(|name| Ok((name.clone(), numeric_values(&lookup(name)?)?)))
            .collect::<Result<Vec<_>>>()?;
        let categorical = categorical
            .iter()
            .map(|name| Ok((name.clone(), categorical_values(&lookup(name)?)?)))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            numeric,
            categorical,
            n_rows: df.height(),
        })
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn numeric_column(&self, name: &str) -> Option<&[Option<f64>]> {
        self.numeric
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_slice())
    }

    pub fn categorical_column(&self, name: &str) -> Option<&[Option<String>]> {
        self.categorical
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_slice())
    }

    /// Row subset in the given order
    pub fn take(&self, indices: &[usize]) -> Self {
        let numeric = self
            .numeric
            .iter()
            .map(|(name, values)| (name.clone(), indices.iter().map(|&i| values[i]).collect()))
            .collect();
        let categorical = self
            .categorical
            .iter()
            .map(|(name, values)| {
                (name.clone(), indices.iter().map(|&i| values[i].clone()).collect())
            })
            .collect();

        Self {
            numeric,
            categorical,
            n_rows: indices.len(),
        }
    }
}
