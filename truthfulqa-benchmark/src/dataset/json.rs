//! JSON and JSON Lines row readers

use serde_json::Value;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use super::DatasetError;

/// Read a file holding a JSON array of row objects
pub fn read_array(path: &Path, limit: Option<usize>) -> Result<Vec<Value>, DatasetError> {
    let reader = BufReader::new(File::open(path)?);
    let value: Value = serde_json::from_reader(reader)?;

    match value {
        Value::Array(mut rows) => {
            if let Some(limit) = limit {
                rows.truncate(limit);
            }
            Ok(rows)
        }
        _ => Err(DatasetError::UnsupportedFormat(format!(
            "{}: expected a JSON array of rows",
            path.display()
        ))),
    }
}

/// Read a file with one JSON row object per line; blank lines are skipped
pub fn read_lines(path: &Path, limit: Option<usize>) -> Result<Vec<Value>, DatasetError> {
    let reader = BufReader::new(File::open(path)?);
    let limit = limit.unwrap_or(usize::MAX);
    let mut rows = Vec::new();

    for (idx, line) in reader.lines().enumerate() {
        if rows.len() >= limit {
            break;
        }
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let value = serde_json::from_str(&line)
            .map_err(|source| DatasetError::JsonLine { line: idx + 1, source })?;
        rows.push(value);
    }

    Ok(rows)
}
