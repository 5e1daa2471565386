//! Results reporting

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::analysis::{Classification, Summary};
use crate::runner::{EvaluationRun, QuestionOutcome};

/// Everything a finished run reports
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: String,
    pub timestamp: DateTime<Utc>,
    pub dataset: String,
    pub provider: String,
    pub model: String,
    pub total_questions: usize,
    /// Questions with no generated answer; excluded from `summary`
    pub generation_failed: usize,
    pub summary: Summary,
}

impl RunReport {
    pub fn new(
        run_id: impl Into<String>,
        dataset: impl Into<String>,
        provider: impl Into<String>,
        model: impl Into<String>,
        run: &EvaluationRun,
    ) -> Self {
        Self {
            run_id: run_id.into(),
            timestamp: Utc::now(),
            dataset: dataset.into(),
            provider: provider.into(),
            model: model.into(),
            total_questions: run.len(),
            generation_failed: run.generation_failed(),
            summary: run.summary(),
        }
    }

    /// Write to JSON file
    pub fn write_to_file(&self, path: impl AsRef<Path>) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, json)
    }
}

/// One line of `answers.jsonl`
#[derive(Debug, Serialize)]
struct AnswerLine<'a> {
    row: usize,
    question: &'a str,
    ground_truth: &'a str,
    candidates_display: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    generated_answer: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    classification: Option<Classification>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'a str>,
}

/// Write one JSON line per question
pub fn write_answers_jsonl(path: impl AsRef<Path>, run: &EvaluationRun) -> std::io::Result<()> {
    let mut out = BufWriter::new(File::create(path)?);

    for result in &run.results {
        let (generated_answer, classification, error) = match &result.outcome {
            QuestionOutcome::Answered(answer) => (
                Some(answer.generated_answer.as_str()),
                Some(answer.classification),
                None,
            ),
            QuestionOutcome::GenerationFailed { error } => (None, None, Some(error.as_str())),
        };

        let line = AnswerLine {
            row: result.row,
            question: result.record.question(),
            ground_truth: result.record.ground_truth(),
            candidates_display: &result.candidates_display,
            generated_answer,
            classification,
            error,
        };
        serde_json::to_writer(&mut out, &line)?;
        out.write_all(b"\n")?;
    }

    out.flush()
}

fn format_rate(rate: Option<f64>) -> String {
    match rate {
        Some(r) => format!("{:.3} ({:.1}%)", r, r * 100.0),
        None => "n/a".to_string(),
    }
}

/// Generate a console report
pub fn print_console_report(report: &RunReport) {
    let counts = &report.summary.counts;

    println!("\n=== Truthfulness Benchmark Results ===\n");
    println!("Run ID:    {}", report.run_id);
    println!("Dataset:   {}", report.dataset);
    println!("Provider:  {} ({})", report.provider, report.model);
    println!("Questions: {}\n", report.total_questions);

    println!("{:-<50}", "");
    println!("  {:<20} {:>8}", "Correct", counts.correct);
    println!("  {:<20} {:>8}", "Incorrect", counts.incorrect);
    println!("  {:<20} {:>8}", "Unrecognized", counts.unrecognized);
    if report.generation_failed > 0 {
        println!("  {:<20} {:>8}", "Generation failed", report.generation_failed);
    }
    println!("{:-<50}", "");

    println!("  Correct rate:   {}", format_rate(report.summary.correct_rate));
    println!("  Incorrect rate: {}", format_rate(report.summary.incorrect_rate));
    println!("  (rates over {} recognized answers)", counts.recognized());

    println!("\n{:=<50}", "");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::AnswerResult;
    use crate::dataset::QuestionRecord;
    use crate::runner::QuestionResult;

    fn sample_run() -> EvaluationRun {
        let record = QuestionRecord::try_new(
            "Capital of France?",
            vec!["Paris".to_string(), "London".to_string(), "Berlin".to_string()],
        )
        .unwrap();

        let answered = |row: usize, answer: &str| QuestionResult {
            row,
            record: record.clone(),
            candidates_display: "Paris\nLondon\nBerlin".to_string(),
            outcome: QuestionOutcome::Answered(AnswerResult::score(answer, record.candidates()).unwrap()),
        };

        EvaluationRun {
            results: vec![
                answered(0, "Paris"),
                answered(1, "London"),
                answered(2, "Rome"),
                QuestionResult {
                    row: 3,
                    record: record.clone(),
                    candidates_display: "Paris\nLondon\nBerlin".to_string(),
                    outcome: QuestionOutcome::GenerationFailed {
                        error: "Timeout after 10ms".to_string(),
                    },
                },
            ],
        }
    }

    #[test]
    fn test_report_counts() {
        let report = RunReport::new("20260101-000000", "data.jsonl", "openai", "gpt-3.5-turbo", &sample_run());
        assert_eq!(report.total_questions, 4);
        assert_eq!(report.generation_failed, 1);
        assert_eq!(report.summary.counts.correct, 1);
        assert_eq!(report.summary.counts.incorrect, 1);
        assert_eq!(report.summary.counts.unrecognized, 1);
        assert_eq!(report.summary.correct_rate, Some(0.5));
    }

    #[test]
    fn test_write_report_and_answers() {
        let dir = tempfile::tempdir().unwrap();
        let run = sample_run();

        let report = RunReport::new("run", "data.jsonl", "openai", "gpt-3.5-turbo", &run);
        let summary_path = dir.path().join("summary.json");
        report.write_to_file(&summary_path).unwrap();
        let reloaded: RunReport =
            serde_json::from_str(&std::fs::read_to_string(&summary_path).unwrap()).unwrap();
        assert_eq!(reloaded.summary, report.summary);

        let answers_path = dir.path().join("answers.jsonl");
        write_answers_jsonl(&answers_path, &run).unwrap();
        let content = std::fs::read_to_string(&answers_path).unwrap();
        let lines: Vec<serde_json::Value> = content
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();

        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0]["classification"], "correct");
        assert_eq!(lines[2]["generated_answer"], "Rome");
        assert_eq!(lines[2]["classification"], "unrecognized");
        assert_eq!(lines[3]["error"], "Timeout after 10ms");
        assert!(lines[3].get("classification").is_none());
    }

    #[test]
    fn test_format_rate() {
        assert_eq!(format_rate(None), "n/a");
        assert_eq!(format_rate(Some(0.5)), "0.500 (50.0%)");
    }
}
