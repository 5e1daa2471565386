//! Truthfulness Benchmark for Chat LLMs
//!
//! Evaluates a chat model on a multiple-choice truthfulness dataset
//! (TruthfulQA `mc1_targets` layout): every question is sent with its
//! candidate answers through a fixed two-turn prompt, the free-text reply
//! is matched exactly against the candidates, and the outcomes are folded
//! into accuracy statistics.
//!
//! # Features
//!
//! - Parquet, JSON and JSON Lines datasets
//! - OpenAI (and OpenAI-compatible) and Anthropic providers
//! - Concurrent generation with a bounded number of in-flight requests
//! - Fail-fast or skip-and-continue handling of failed generations
//! - JSON summary and per-question answer logs
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use truthfulqa_benchmark::{
//!     config::Config,
//!     dataset::load_dataset,
//!     prompt::ChatPrompt,
//!     providers::create_provider_with_config,
//!     runner::{ChatAnswerGenerator, Executor, ExecutorConfig},
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load_or_default();
//!     let records = load_dataset(&config.dataset.path, &config.dataset)?;
//!
//!     let provider = create_provider_with_config("openai", &config)?;
//!     let generator = ChatAnswerGenerator::from_config(
//!         provider,
//!         ChatPrompt::from_config(&config.prompt),
//!         &config.benchmark,
//!     );
//!
//!     let executor = Executor::new(Arc::new(generator), ExecutorConfig::from(&config.benchmark));
//!     let run = executor.run(&records).await?;
//!     println!("{:?}", run.summary());
//!     Ok(())
//! }
//! ```

pub mod analysis;
pub mod config;
pub mod dataset;
pub mod prompt;
pub mod providers;
pub mod reporting;
pub mod runner;

pub use config::{Config, OnGenerationError};

/// Prelude module for common imports
pub mod prelude {
    pub use crate::analysis::{
        aggregate, classify, AnswerResult, Classification, ClassificationCounts, ScoreError,
        Summary,
    };
    pub use crate::config::{Config, OnGenerationError};
    pub use crate::dataset::{load_dataset, DatasetError, QuestionRecord};
    pub use crate::prompt::{candidates_display, ChatPrompt, PromptError, PromptTemplate};
    pub use crate::providers::{
        create_provider_with_config, CompletionRequest, CompletionResponse, LLMProvider, Message,
        ProviderError, ProviderResult,
    };
    pub use crate::reporting::{print_console_report, write_answers_jsonl, RunReport};
    pub use crate::runner::{
        AnswerGenerator, ChatAnswerGenerator, ConsoleProgress, EvaluationRun, Executor,
        ExecutorConfig, ExecutorError, NoOpProgress, QuestionOutcome, QuestionResult,
    };
}
