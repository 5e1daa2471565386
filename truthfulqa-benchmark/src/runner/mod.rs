//! Benchmark execution engine

pub mod executor;
pub mod generator;

pub use executor::{
    ConsoleProgress, EvaluationRun, Executor, ExecutorConfig, ExecutorError, NoOpProgress,
    ProgressCallback, QuestionOutcome, QuestionResult,
};
pub use generator::{AnswerGenerator, ChatAnswerGenerator};
