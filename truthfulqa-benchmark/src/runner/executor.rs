//! Async executor: one generation task per question, gathered before scoring

use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use super::generator::AnswerGenerator;
use crate::analysis::{aggregate, AnswerResult, Classification, ScoreError, Summary};
use crate::config::{BenchmarkConfig, OnGenerationError};
use crate::dataset::QuestionRecord;
use crate::prompt::candidates_display;
use crate::providers::{ProviderError, ProviderResult};

/// Configuration for the executor
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Maximum in-flight generation requests
    pub parallel_requests: usize,
    /// Per-request timeout in milliseconds
    pub timeout_ms: u64,
    pub on_generation_error: OnGenerationError,
    /// Shuffle the displayed candidate order
    pub shuffle_choices: bool,
    pub shuffle_seed: u64,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            parallel_requests: 8,
            timeout_ms: 120_000,
            on_generation_error: OnGenerationError::SkipAndContinue,
            shuffle_choices: false,
            shuffle_seed: 0,
        }
    }
}

impl From<&BenchmarkConfig> for ExecutorConfig {
    fn from(config: &BenchmarkConfig) -> Self {
        Self {
            parallel_requests: config.parallel_requests,
            timeout_ms: config.timeout_ms,
            on_generation_error: config.on_generation_error,
            shuffle_choices: config.shuffle_choices,
            shuffle_seed: config.shuffle_seed,
        }
    }
}

/// What happened to one question
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum QuestionOutcome {
    Answered(AnswerResult),
    GenerationFailed { error: String },
}

/// Result for one dataset row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionResult {
    pub row: usize,
    pub record: QuestionRecord,
    /// Candidate block exactly as shown to the model
    pub candidates_display: String,
    pub outcome: QuestionOutcome,
}

impl QuestionResult {
    pub fn classification(&self) -> Option<Classification> {
        match &self.outcome {
            QuestionOutcome::Answered(answer) => Some(answer.classification),
            QuestionOutcome::GenerationFailed { .. } => None,
        }
    }
}

/// All per-question results of a run, ordered by row
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvaluationRun {
    pub results: Vec<QuestionResult>,
}

impl EvaluationRun {
    /// Aggregate the classifications of answered questions
    pub fn summary(&self) -> Summary {
        aggregate(self.results.iter().filter_map(QuestionResult::classification))
    }

    /// Questions whose generation failed; not part of any count in
    /// [`EvaluationRun::summary`]
    pub fn generation_failed(&self) -> usize {
        self.results
            .iter()
            .filter(|r| matches!(r.outcome, QuestionOutcome::GenerationFailed { .. }))
            .count()
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

/// Errors that abort a run
#[derive(Debug, thiserror::Error)]
pub enum ExecutorError {
    #[error("Generation failed for row {row}: {source}")]
    Generation {
        row: usize,
        #[source]
        source: ProviderError,
    },

    #[error("Generation task for row {row} did not complete: {message}")]
    TaskFailed { row: usize, message: String },

    #[error("Scoring failed for row {row}: {source}")]
    Score {
        row: usize,
        #[source]
        source: ScoreError,
    },
}

/// Executor for running the benchmark over a dataset
pub struct Executor {
    config: ExecutorConfig,
    generator: Arc<dyn AnswerGenerator>,
    semaphore: Arc<Semaphore>,
    progress: Arc<dyn ProgressCallback>,
}

impl Executor {
    pub fn new(generator: Arc<dyn AnswerGenerator>, config: ExecutorConfig) -> Self {
        let semaphore = Arc::new(Semaphore::new(config.parallel_requests.max(1)));
        Self {
            config,
            generator,
            semaphore,
            progress: Arc::new(NoOpProgress),
        }
    }

    /// Report per-question progress to `progress`
    pub fn with_progress(mut self, progress: Arc<dyn ProgressCallback>) -> Self {
        self.progress = progress;
        self
    }

    /// Candidate blocks in dispatch order. Shuffling only changes what the
    /// model sees; records keep their source order for scoring.
    pub fn candidate_displays(&self, records: &[QuestionRecord]) -> Vec<String> {
        if !self.config.shuffle_choices {
            return records
                .iter()
                .map(|r| candidates_display(r.candidates()))
                .collect();
        }

        let mut rng = StdRng::seed_from_u64(self.config.shuffle_seed);
        records
            .iter()
            .map(|r| {
                let mut shown: Vec<&str> = r.candidates().iter().map(String::as_str).collect();
                shown.shuffle(&mut rng);
                candidates_display(&shown)
            })
            .collect()
    }

    /// Generate, classify and collect an answer for every record.
    ///
    /// Requests run concurrently up to `parallel_requests` and may finish in
    /// any order; results come back sorted by row.
    pub async fn run(&self, records: &[QuestionRecord]) -> Result<EvaluationRun, ExecutorError> {
        let total = records.len();
        let displays = self.candidate_displays(records);
        let timeout_ms = self.config.timeout_ms;

        let mut tasks: JoinSet<(usize, ProviderResult<String>)> = JoinSet::new();
        let mut rows_by_task = HashMap::with_capacity(total);

        for (row, (record, display)) in records.iter().zip(&displays).enumerate() {
            let generator = self.generator.clone();
            let semaphore = self.semaphore.clone();
            let question = record.question().to_string();
            let display = display.clone();

            let handle = tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                let timeout = Duration::from_millis(timeout_ms);
                let result = match tokio::time::timeout(timeout, generator.generate(&question, &display)).await {
                    Ok(result) => result,
                    Err(_) => Err(ProviderError::Timeout { timeout_ms }),
                };
                (row, result)
            });
            rows_by_task.insert(handle.id(), row);
        }

        tracing::info!(
            "Dispatched {} questions to {} ({}), up to {} in flight",
            total,
            self.generator.provider_name(),
            self.generator.model(),
            self.config.parallel_requests.max(1)
        );

        let mut results = Vec::with_capacity(total);

        while let Some(joined) = tasks.join_next().await {
            let (row, outcome) = match joined {
                Ok((row, Ok(answer))) => {
                    let scored = AnswerResult::score(answer, records[row].candidates())
                        .map_err(|source| ExecutorError::Score { row, source })?;
                    (row, QuestionOutcome::Answered(scored))
                }
                Ok((row, Err(source))) => match self.config.on_generation_error {
                    OnGenerationError::FailFast => {
                        tracing::error!("Row {} failed, aborting run: {}", row, source);
                        tasks.abort_all();
                        return Err(ExecutorError::Generation { row, source });
                    }
                    OnGenerationError::SkipAndContinue => {
                        tracing::warn!("Row {} failed, skipping: {}", row, source);
                        let error = source.to_string();
                        (row, QuestionOutcome::GenerationFailed { error })
                    }
                },
                Err(e) => {
                    let Some(&row) = rows_by_task.get(&e.id()) else {
                        tracing::error!("Untracked generation task failed: {}", e);
                        continue;
                    };
                    match self.config.on_generation_error {
                        OnGenerationError::FailFast => {
                            tracing::error!("Row {} task failed, aborting run: {}", row, e);
                            tasks.abort_all();
                            return Err(ExecutorError::TaskFailed {
                                row,
                                message: e.to_string(),
                            });
                        }
                        OnGenerationError::SkipAndContinue => {
                            tracing::warn!("Row {} task failed, skipping: {}", row, e);
                            let error = format!("task did not complete: {}", e);
                            (row, QuestionOutcome::GenerationFailed { error })
                        }
                    }
                }
            };

            let result = QuestionResult {
                row,
                record: records[row].clone(),
                candidates_display: displays[row].clone(),
                outcome,
            };
            self.progress.on_question_complete(row, result.classification());
            results.push(result);
            self.progress.on_progress(results.len(), total);
        }

        results.sort_by_key(|r| r.row);
        Ok(EvaluationRun { results })
    }
}

/// Progress callback for tracking execution
pub trait ProgressCallback: Send + Sync {
    /// `classification` is `None` when generation failed
    fn on_question_complete(&self, row: usize, classification: Option<Classification>);
    fn on_progress(&self, completed: usize, total: usize);
}

/// Default no-op progress callback
pub struct NoOpProgress;

impl ProgressCallback for NoOpProgress {
    fn on_question_complete(&self, _row: usize, _classification: Option<Classification>) {}
    fn on_progress(&self, _completed: usize, _total: usize) {}
}

/// Console progress callback
pub struct ConsoleProgress {
    /// Print a progress line every `every` completions
    every: usize,
}

impl ConsoleProgress {
    pub fn new(every: usize) -> Self {
        Self { every: every.max(1) }
    }

    /// Line printed after `completed` of `total` questions settle, answered
    /// or failed
    fn progress_line(&self, completed: usize, total: usize) -> Option<String> {
        (completed % self.every == 0 || completed == total)
            .then(|| format!("Progress: {}/{} questions completed", completed, total))
    }
}

impl Default for ConsoleProgress {
    fn default() -> Self {
        Self::new(25)
    }
}

impl ProgressCallback for ConsoleProgress {
    fn on_question_complete(&self, row: usize, classification: Option<Classification>) {
        if classification.is_none() {
            println!("  FAILED row {}", row);
        }
    }

    fn on_progress(&self, completed: usize, total: usize) {
        if let Some(line) = self.progress_line(completed, total) {
            println!("{}", line);
        }
    }
}
