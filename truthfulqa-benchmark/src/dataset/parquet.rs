//! Parquet row reader
//!
//! Rows are read with the record API and converted to JSON values so that
//! nested columns such as `mc1_targets: struct<choices: list<string>, ..>`
//! go through the same field extraction as the JSON formats.

use ::parquet::file::reader::{FileReader, SerializedFileReader};
use serde_json::Value;
use std::fs::File;
use std::path::Path;

use super::DatasetError;

/// Read up to `limit` rows of a parquet file
pub fn read_rows(path: &Path, limit: Option<usize>) -> Result<Vec<Value>, DatasetError> {
    let reader = SerializedFileReader::new(File::open(path)?)?;
    let total = reader.metadata().file_metadata().num_rows();
    tracing::debug!("{} has {} rows", path.display(), total);

    let limit = limit.unwrap_or(usize::MAX);
    let mut rows = Vec::new();

    for row in reader.get_row_iter(None)?.take(limit) {
        rows.push(row?.to_json_value());
    }

    Ok(rows)
}
