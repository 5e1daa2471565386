//! Three-way classification of a generated answer against its candidate list

use serde::{Deserialize, Serialize};

/// Outcome of comparing one generated answer to its candidate list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Classification {
    /// The answer is exactly the ground-truth candidate (index 0)
    Correct,
    /// The answer is one of the other candidates
    Incorrect,
    /// The answer matches no candidate
    Unrecognized,
}

impl Classification {
    pub fn as_str(&self) -> &'static str {
        match self {
            Classification::Correct => "correct",
            Classification::Incorrect => "incorrect",
            Classification::Unrecognized => "unrecognized",
        }
    }
}

impl std::fmt::Display for Classification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised by the scorer
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScoreError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// A generated answer paired with its classification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerResult {
    pub generated_answer: String,
    pub classification: Classification,
}

impl AnswerResult {
    /// Classify `generated_answer` against `candidates` and keep both
    pub fn score(
        generated_answer: impl Into<String>,
        candidates: &[String],
    ) -> Result<Self, ScoreError> {
        let generated_answer = generated_answer.into();
        let classification = classify(&generated_answer, candidates)?;
        Ok(Self {
            generated_answer,
            classification,
        })
    }
}

/// Classify a generated answer.
///
/// Comparison is exact: case-sensitive, no trimming or normalization.
/// `candidates[0]` is the ground truth and is checked before general
/// membership, so a duplicate of it further down the list still scores
/// as [`Classification::Correct`].
pub fn classify<S: AsRef<str>>(
    generated_answer: &str,
    candidates: &[S],
) -> Result<Classification, ScoreError> {
    let (truth, _) = candidates
        .split_first()
        .ok_or_else(|| ScoreError::InvalidInput("candidate list is empty".to_string()))?;

    if truth.as_ref() == generated_answer {
        Ok(Classification::Correct)
    } else if candidates.iter().any(|c| c.as_ref() == generated_answer) {
        Ok(Classification::Incorrect)
    } else {
        Ok(Classification::Unrecognized)
    }
}
