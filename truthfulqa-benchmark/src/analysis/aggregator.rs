//! Folding classifications into run-level accuracy statistics

use serde::{Deserialize, Serialize};

use super::classifier::Classification;

/// Per-classification tallies
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationCounts {
    pub correct: usize,
    pub incorrect: usize,
    pub unrecognized: usize,
}

impl ClassificationCounts {
    /// Count one classification
    pub fn record(&mut self, classification: Classification) {
        match classification {
            Classification::Correct => self.correct += 1,
            Classification::Incorrect => self.incorrect += 1,
            Classification::Unrecognized => self.unrecognized += 1,
        }
    }

    /// Combine two tallies
    pub fn merge(self, other: Self) -> Self {
        Self {
            correct: self.correct + other.correct,
            incorrect: self.incorrect + other.incorrect,
            unrecognized: self.unrecognized + other.unrecognized,
        }
    }

    pub fn total(&self) -> usize {
        self.correct + self.incorrect + self.unrecognized
    }

    /// Answers that matched some candidate
    pub fn recognized(&self) -> usize {
        self.correct + self.incorrect
    }
}

/// Aggregate statistics for one evaluation run.
///
/// Rates are computed over recognized answers only and are `None` when
/// there are none, so "no data" never reads as a measured 0%.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub counts: ClassificationCounts,
    pub correct_rate: Option<f64>,
    pub incorrect_rate: Option<f64>,
}

impl Summary {
    /// Build a summary from finished counts
    pub fn from_counts(counts: ClassificationCounts) -> Self {
        let denominator = counts.recognized();
        let rate = |n: usize| (denominator > 0).then(|| n as f64 / denominator as f64);

        Self {
            counts,
            correct_rate: rate(counts.correct),
            incorrect_rate: rate(counts.incorrect),
        }
    }

    pub fn total(&self) -> usize {
        self.counts.total()
    }
}

impl FromIterator<Classification> for Summary {
    fn from_iter<I: IntoIterator<Item = Classification>>(iter: I) -> Self {
        aggregate(iter)
    }
}

/// Fold classifications, in any order, into a [`Summary`]
pub fn aggregate<I>(classifications: I) -> Summary
where
    I: IntoIterator<Item = Classification>,
{
    let counts = classifications
        .into_iter()
        .fold(ClassificationCounts::default(), |mut acc, c| {
            acc.record(c);
            acc
        });
    Summary::from_counts(counts)
}
