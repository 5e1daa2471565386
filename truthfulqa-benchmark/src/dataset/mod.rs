//! Question records and dataset loading

pub mod json;
pub mod parquet;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;

use crate::analysis::ScoreError;
use crate::config::DatasetConfig;

/// One multiple-choice question. `candidates[0]` is the ground truth.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawQuestionRecord")]
pub struct QuestionRecord {
    question: String,
    candidates: Vec<String>,
}

/// Unchecked wire form; deserialization goes through [`QuestionRecord::try_new`]
#[derive(Deserialize)]
struct RawQuestionRecord {
    question: String,
    candidates: Vec<String>,
}

impl TryFrom<RawQuestionRecord> for QuestionRecord {
    type Error = ScoreError;

    fn try_from(raw: RawQuestionRecord) -> Result<Self, Self::Error> {
        Self::try_new(raw.question, raw.candidates)
    }
}

impl QuestionRecord {
    /// Build a record; the candidate list must not be empty
    pub fn try_new(
        question: impl Into<String>,
        candidates: Vec<String>,
    ) -> Result<Self, ScoreError> {
        if candidates.is_empty() {
            return Err(ScoreError::InvalidInput("candidate list is empty".to_string()));
        }
        Ok(Self {
            question: question.into(),
            candidates,
        })
    }

    pub fn question(&self) -> &str {
        &self.question
    }

    pub fn candidates(&self) -> &[String] {
        &self.candidates
    }

    /// The designated correct answer
    pub fn ground_truth(&self) -> &str {
        &self.candidates[0]
    }
}

/// Error type for dataset loading
#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parquet error: {0}")]
    Parquet(#[from] ::parquet::errors::ParquetError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("JSON error on line {line}: {source}")]
    JsonLine {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("Row {row}: missing field '{field}'")]
    MissingField { row: usize, field: String },

    #[error("Row {row}: field '{field}' is not {expected}")]
    InvalidField {
        row: usize,
        field: String,
        expected: &'static str,
    },

    #[error("Row {row}: candidate list is empty")]
    EmptyCandidates { row: usize },

    #[error("Unsupported dataset format: {0}")]
    UnsupportedFormat(String),
}

/// On-disk dataset encodings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatasetFormat {
    Parquet,
    Json,
    JsonLines,
}

impl DatasetFormat {
    /// Detect the format from a file extension
    pub fn from_path(path: &Path) -> Result<Self, DatasetError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default();

        match ext.as_str() {
            "parquet" => Ok(DatasetFormat::Parquet),
            "json" => Ok(DatasetFormat::Json),
            "jsonl" | "ndjson" => Ok(DatasetFormat::JsonLines),
            _ => Err(DatasetError::UnsupportedFormat(path.display().to_string())),
        }
    }
}

/// Load question records from `path`, honoring the field layout and row
/// limit in `config`
pub fn load_dataset(
    path: impl AsRef<Path>,
    config: &DatasetConfig,
) -> Result<Vec<QuestionRecord>, DatasetError> {
    let path = path.as_ref();
    let format = DatasetFormat::from_path(path)?;

    let rows = match format {
        DatasetFormat::Parquet => parquet::read_rows(path, config.limit)?,
        DatasetFormat::Json => json::read_array(path, config.limit)?,
        DatasetFormat::JsonLines => json::read_lines(path, config.limit)?,
    };

    let records = records_from_values(&rows, config)?;
    tracing::info!("Loaded {} questions from {}", records.len(), path.display());
    Ok(records)
}

/// Convert row values into records
pub fn records_from_values(
    rows: &[Value],
    config: &DatasetConfig,
) -> Result<Vec<QuestionRecord>, DatasetError> {
    rows.iter()
        .enumerate()
        .map(|(row, value)| record_from_value(row, value, config))
        .collect()
}

/// Extract one record from a row value.
///
/// The question is `question_field`. Candidates come from
/// `targets_field.choices_field` when the target is an object (the
/// TruthfulQA `mc1_targets` layout), or from `targets_field` directly when
/// it is already a list.
pub fn record_from_value(
    row: usize,
    value: &Value,
    config: &DatasetConfig,
) -> Result<QuestionRecord, DatasetError> {
    let question = value
        .get(&config.question_field)
        .ok_or_else(|| DatasetError::MissingField {
            row,
            field: config.question_field.clone(),
        })?
        .as_str()
        .ok_or_else(|| DatasetError::InvalidField {
            row,
            field: config.question_field.clone(),
            expected: "a string",
        })?;

    let targets = value
        .get(&config.targets_field)
        .ok_or_else(|| DatasetError::MissingField {
            row,
            field: config.targets_field.clone(),
        })?;

    let (field, choices) = match targets {
        Value::Object(obj) => {
            let field = format!("{}.{}", config.targets_field, config.choices_field);
            let choices = obj
                .get(&config.choices_field)
                .ok_or_else(|| DatasetError::MissingField {
                    row,
                    field: field.clone(),
                })?;
            (field, choices)
        }
        other => (config.targets_field.clone(), other),
    };

    let items = choices.as_array().ok_or_else(|| DatasetError::InvalidField {
        row,
        field: field.clone(),
        expected: "a list",
    })?;

    let candidates = items
        .iter()
        .map(|c| c.as_str().map(str::to_string))
        .collect::<Option<Vec<String>>>()
        .ok_or_else(|| DatasetError::InvalidField {
            row,
            field,
            expected: "a list of strings",
        })?;

    QuestionRecord::try_new(question, candidates).map_err(|_| DatasetError::EmptyCandidates { row })
}
