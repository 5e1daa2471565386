//! Answer classification and accuracy aggregation

pub mod aggregator;
pub mod classifier;

pub use aggregator::{aggregate, ClassificationCounts, Summary};
pub use classifier::{classify, AnswerResult, Classification, ScoreError};
