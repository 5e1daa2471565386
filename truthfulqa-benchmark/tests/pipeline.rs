//! End-to-end pipeline tests.
//!
//! A scripted in-process provider stands in for the model API; datasets are
//! written to temporary directories and loaded through the public loader.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use truthfulqa_benchmark::prelude::*;
use truthfulqa_benchmark::config::DatasetConfig;

// =============================================================================
// Helpers
// =============================================================================

/// Replies by looking up the question in the user turn
struct ScriptedProvider {
    answers: HashMap<String, Reply>,
    delay_ms: HashMap<String, u64>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    calls: AtomicUsize,
}

#[derive(Clone)]
enum Reply {
    Text(&'static str),
    Fail,
    Hang,
}

impl ScriptedProvider {
    fn new(script: &[(&str, Reply)]) -> Self {
        Self {
            answers: script
                .iter()
                .map(|(q, r)| (q.to_string(), r.clone()))
                .collect(),
            delay_ms: HashMap::new(),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
        }
    }

    fn with_delay(mut self, question: &str, ms: u64) -> Self {
        self.delay_ms.insert(question.to_string(), ms);
        self
    }

    fn question_of(request: &CompletionRequest) -> String {
        let user = &request.messages[0].content;
        user.strip_prefix("Question: ")
            .and_then(|rest| rest.split("\n\n").next())
            .unwrap_or_default()
            .to_string()
    }
}

#[async_trait]
impl LLMProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    fn default_model(&self) -> &str {
        "scripted-1"
    }

    async fn complete(&self, request: &CompletionRequest) -> ProviderResult<CompletionResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let question = Self::question_of(request);
        let delay = self.delay_ms.get(&question).copied().unwrap_or(5);
        tokio::time::sleep(Duration::from_millis(delay)).await;

        let reply = self.answers.get(&question).cloned();
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let content = match reply {
            Some(Reply::Text(text)) => text.to_string(),
            Some(Reply::Fail) => {
                return Err(ProviderError::Api {
                    status: 500,
                    message: format!("scripted failure for {}", question),
                })
            }
            Some(Reply::Hang) => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                String::new()
            }
            None => "I don't know".to_string(),
        };

        Ok(CompletionResponse {
            content,
            model: "scripted-1".to_string(),
            input_tokens: 10,
            output_tokens: 2,
            finish_reason: "stop".to_string(),
            latency_ms: delay,
        })
    }
}

fn capitals(question: &str) -> QuestionRecord {
    QuestionRecord::try_new(
        question,
        vec!["Paris".to_string(), "London".to_string(), "Berlin".to_string()],
    )
    .unwrap()
}

fn executor(provider: Arc<ScriptedProvider>, config: ExecutorConfig) -> Executor {
    let generator = ChatAnswerGenerator::new(provider, ChatPrompt::default());
    Executor::new(Arc::new(generator), config)
}

fn write_jsonl(dir: &tempfile::TempDir, lines: &[serde_json::Value]) -> PathBuf {
    let path = dir.path().join("validation.jsonl");
    let body: Vec<String> = lines.iter().map(|l| l.to_string()).collect();
    std::fs::write(&path, body.join("\n")).unwrap();
    path
}

// =============================================================================
// Scoring through the pipeline
// =============================================================================

#[tokio::test]
async fn test_capitals_scenario() {
    let provider = Arc::new(ScriptedProvider::new(&[
        ("q-correct", Reply::Text("Paris")),
        ("q-incorrect", Reply::Text("London")),
        ("q-unrecognized", Reply::Text("Rome")),
    ]));
    let records = vec![capitals("q-correct"), capitals("q-incorrect"), capitals("q-unrecognized")];

    let run = executor(provider, ExecutorConfig::default()).run(&records).await.unwrap();

    let classes: Vec<_> = run.results.iter().map(|r| r.classification()).collect();
    assert_eq!(
        classes,
        vec![
            Some(Classification::Correct),
            Some(Classification::Incorrect),
            Some(Classification::Unrecognized),
        ]
    );

    let summary = run.summary();
    assert_eq!(summary.counts.correct, 1);
    assert_eq!(summary.counts.incorrect, 1);
    assert_eq!(summary.counts.unrecognized, 1);
    assert_eq!(summary.correct_rate, Some(0.5));
    assert_eq!(summary.incorrect_rate, Some(0.5));
}

#[tokio::test]
async fn test_raw_text_is_not_normalized() {
    let provider = Arc::new(ScriptedProvider::new(&[
        ("trailing", Reply::Text("Paris\n")),
        ("lower", Reply::Text("paris")),
    ]));
    let records = vec![capitals("trailing"), capitals("lower")];

    let run = executor(provider, ExecutorConfig::default()).run(&records).await.unwrap();
    let summary = run.summary();

    assert_eq!(summary.counts.unrecognized, 2);
    assert_eq!(summary.correct_rate, None);
    assert_eq!(summary.incorrect_rate, None);

    match &run.results[0].outcome {
        QuestionOutcome::Answered(answer) => assert_eq!(answer.generated_answer, "Paris\n"),
        other => panic!("unexpected outcome {:?}", other),
    }
}

#[tokio::test]
async fn test_results_sorted_despite_completion_order() {
    let provider = ScriptedProvider::new(&[
        ("slow", Reply::Text("Paris")),
        ("medium", Reply::Text("London")),
        ("fast", Reply::Text("Berlin")),
    ])
    .with_delay("slow", 120)
    .with_delay("medium", 60)
    .with_delay("fast", 1);
    let records = vec![capitals("slow"), capitals("medium"), capitals("fast")];

    let run = executor(Arc::new(provider), ExecutorConfig::default())
        .run(&records)
        .await
        .unwrap();

    let rows: Vec<usize> = run.results.iter().map(|r| r.row).collect();
    assert_eq!(rows, vec![0, 1, 2]);
    assert_eq!(run.results[0].record.question(), "slow");
    assert_eq!(run.results[0].classification(), Some(Classification::Correct));
}

// =============================================================================
// Failure policies
// =============================================================================

#[tokio::test]
async fn test_skip_and_continue_tallies_failures_separately() {
    let provider = Arc::new(ScriptedProvider::new(&[
        ("ok", Reply::Text("Paris")),
        ("broken", Reply::Fail),
        ("wrong", Reply::Text("Berlin")),
    ]));
    let records = vec![capitals("ok"), capitals("broken"), capitals("wrong")];

    let config = ExecutorConfig {
        on_generation_error: OnGenerationError::SkipAndContinue,
        ..Default::default()
    };
    let run = executor(provider, config).run(&records).await.unwrap();

    assert_eq!(run.len(), 3);
    assert_eq!(run.generation_failed(), 1);
    assert!(matches!(
        &run.results[1].outcome,
        QuestionOutcome::GenerationFailed { error } if error.contains("scripted failure")
    ));

    let summary = run.summary();
    assert_eq!(summary.total(), 2);
    assert_eq!(summary.correct_rate, Some(0.5));
}

#[tokio::test]
async fn test_fail_fast_aborts_run() {
    let provider = Arc::new(
        ScriptedProvider::new(&[("broken", Reply::Fail), ("hang", Reply::Hang)])
            .with_delay("broken", 1),
    );
    let records = vec![capitals("hang"), capitals("broken")];

    let config = ExecutorConfig {
        on_generation_error: OnGenerationError::FailFast,
        ..Default::default()
    };

    let result = tokio::time::timeout(
        Duration::from_secs(10),
        executor(provider, config).run(&records),
    )
    .await
    .expect("fail-fast must not wait for the hanging request");

    match result {
        Err(ExecutorError::Generation { row, source }) => {
            assert_eq!(row, 1);
            assert!(matches!(source, ProviderError::Api { status: 500, .. }));
        }
        other => panic!("expected generation error, got {:?}", other.map(|r| r.len())),
    }
}

#[tokio::test]
async fn test_timeout_becomes_generation_failure() {
    let provider = Arc::new(ScriptedProvider::new(&[
        ("hang", Reply::Hang),
        ("ok", Reply::Text("Paris")),
    ]));
    let records = vec![capitals("hang"), capitals("ok")];

    let config = ExecutorConfig {
        timeout_ms: 50,
        ..Default::default()
    };
    let run = executor(provider, config).run(&records).await.unwrap();

    assert_eq!(run.generation_failed(), 1);
    assert!(matches!(
        &run.results[0].outcome,
        QuestionOutcome::GenerationFailed { error } if error.contains("Timeout")
    ));
    assert_eq!(run.summary().counts.correct, 1);
}

// =============================================================================
// Concurrency
// =============================================================================

#[tokio::test]
async fn test_parallel_requests_cap() {
    let script: Vec<(String, Reply)> = (0..24).map(|i| (format!("q{}", i), Reply::Text("Paris"))).collect();
    let script_refs: Vec<(&str, Reply)> = script.iter().map(|(q, r)| (q.as_str(), r.clone())).collect();

    let mut provider = ScriptedProvider::new(&script_refs);
    for (q, _) in &script {
        provider = provider.with_delay(q, 20);
    }
    let provider = Arc::new(provider);
    let records: Vec<_> = script.iter().map(|(q, _)| capitals(q)).collect();

    let config = ExecutorConfig {
        parallel_requests: 3,
        ..Default::default()
    };
    let run = executor(provider.clone(), config).run(&records).await.unwrap();

    assert_eq!(run.summary().counts.correct, 24);
    assert_eq!(provider.calls.load(Ordering::SeqCst), 24);
    let peak = provider.max_in_flight.load(Ordering::SeqCst);
    assert!(peak <= 3, "peak in-flight was {}", peak);
    assert!(peak >= 2, "requests never overlapped");
}

// =============================================================================
// Dataset to summary
// =============================================================================

#[tokio::test]
async fn test_jsonl_dataset_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_jsonl(
        &dir,
        &[
            serde_json::json!({
                "question": "What is the capital of France?",
                "mc1_targets": {"choices": ["Paris", "London", "Berlin"], "labels": [1, 0, 0]}
            }),
            serde_json::json!({
                "question": "What color is the sky on a clear day?",
                "mc1_targets": {"choices": ["Blue", "Green"], "labels": [1, 0]}
            }),
            serde_json::json!({
                "question": "Is this row beyond the limit?",
                "mc1_targets": {"choices": ["Yes"], "labels": [1]}
            }),
        ],
    );

    let config = DatasetConfig {
        limit: Some(2),
        ..Default::default()
    };
    let records = load_dataset(&path, &config).unwrap();
    assert_eq!(records.len(), 2);

    let provider = Arc::new(ScriptedProvider::new(&[
        ("What is the capital of France?", Reply::Text("Paris")),
        ("What color is the sky on a clear day?", Reply::Text("Green")),
    ]));
    let run = executor(provider, ExecutorConfig::default()).run(&records).await.unwrap();

    let report = RunReport::new("test-run", path.display().to_string(), "scripted", "scripted-1", &run);
    assert_eq!(report.total_questions, 2);
    assert_eq!(report.generation_failed, 0);
    assert_eq!(report.summary.counts.correct, 1);
    assert_eq!(report.summary.counts.incorrect, 1);

    let answers = dir.path().join("answers.jsonl");
    write_answers_jsonl(&answers, &run).unwrap();
    let written = std::fs::read_to_string(&answers).unwrap();
    assert_eq!(written.lines().count(), 2);
    assert!(written.contains("\"ground_truth\":\"Blue\""));
}

#[test]
fn test_dataset_with_empty_candidates_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_jsonl(
        &dir,
        &[
            serde_json::json!({"question": "fine", "mc1_targets": {"choices": ["a"]}}),
            serde_json::json!({"question": "empty", "mc1_targets": {"choices": []}}),
        ],
    );

    let err = load_dataset(&path, &DatasetConfig::default()).unwrap_err();
    assert!(matches!(err, DatasetError::EmptyCandidates { row: 1 }));
}
