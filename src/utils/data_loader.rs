//! Data loading utilities

use crate::error::{Result, StackwiseError};
use polars::prelude::*;
use std::fs::File;
use std::path::Path;
use tracing::debug;

/// Data loader for tabular files
pub struct DataLoader {
    /// Rows used for schema inference
    infer_schema_length: usize,
}

impl Default for DataLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl DataLoader {
    /// Create a new data loader
    pub fn new() -> Self {
        Self {
            infer_schema_length: 1000,
        }
    }

    /// Load a CSV file with a header row
    pub fn load_csv(&self, path: impl AsRef<Path>) -> Result<DataFrame> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            StackwiseError::DataError(format!("cannot open {}: {}", path.display(), e))
        })?;

        let df = CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(Some(self.infer_schema_length))
            .into_reader_with_file_handle(file)
            .finish()
            .map_err(|e| StackwiseError::DataError(format!("{}: {}", path.display(), e)))?;

        debug!(path = %path.display(), rows = df.height(), cols = df.width(), "loaded csv");
        Ok(df)
    }

    /// Load a Parquet file
    pub fn load_parquet(&self, path: impl AsRef<Path>) -> Result<DataFrame> {
        let file = File::open(path.as_ref())?;
        ParquetReader::new(file)
            .finish()
            .map_err(|e| StackwiseError::DataError(e.to_string()))
    }

    /// Load a JSON file
    pub fn load_json(&self, path: impl AsRef<Path>) -> Result<DataFrame> {
        let file = File::open(path.as_ref())?;
        JsonReader::new(file)
            .finish()
            .map_err(|e| StackwiseError::DataError(e.to_string()))
    }

    /// Detect file format from extension and load. Unknown extensions are read as CSV.
    pub fn load_auto(&self, path: impl AsRef<Path>) -> Result<DataFrame> {
        let path = path.as_ref();
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default();

        match ext.as_str() {
            "parquet" | "pq" => self.load_parquet(path),
            "json" => self.load_json(path),
            _ => self.load_csv(path),
        }
    }
}

/// Writes DataFrames to disk
pub struct DataSaver;

impl DataSaver {
    /// Write a DataFrame as CSV with a header row
    pub fn save_csv(df: &DataFrame, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let mut file = File::create(path)?;
        let mut out = df.clone();
        CsvWriter::new(&mut file)
            .include_header(true)
            .finish(&mut out)
            .map_err(|e| StackwiseError::DataError(format!("{}: {}", path.display(), e)))?;
        debug!(path = %path.display(), rows = out.height(), "wrote csv");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_csv_roundtrip_preserves_shape() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frame.csv");
        let df = df!(
            "id" => &[1i64, 2, 3],
            "x" => &[0.5, 1.5, 2.5]
        )
        .unwrap();

        DataSaver::save_csv(&df, &path).unwrap();
        let loaded = DataLoader::new().load_auto(&path).unwrap();

        assert_eq!(loaded.height(), 3);
        assert_eq!(loaded.width(), 2);
        assert!(loaded.column("x").is_ok());
    }

    #[test]
    fn test_missing_file_is_data_error() {
        let err = DataLoader::new().load_csv("does/not/exist.csv").unwrap_err();
        assert!(matches!(err, StackwiseError::DataError(_)));
    }
}
