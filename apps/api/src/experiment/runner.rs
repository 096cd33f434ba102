//! Experiment runner — one LLM call per matrix cell, bounded by a semaphore,
//! each successful cell graded by the rubric judge.
//!
//! Results come back in matrix order regardless of completion order. A failed
//! cell records its error; it never fails the experiment.

use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::blueprint::render::render_blueprint;
use crate::blueprint::spec::PromptSpec;
use crate::blueprint::vocab::{Format, Length, Tone};
use crate::evaluation::judge::judge_output;
use crate::evaluation::rubric::RubricReport;
use crate::experiment::matrix::MatrixCell;
use crate::experiment::prompts::CELL_SYSTEM;
use crate::llm_client::{CompletionBackend, CompletionRequest, Provider, Usage, UsageRecord};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CellResult {
    pub index: usize,
    pub tone: Tone,
    pub length: Length,
    pub format: Format,
    pub blueprint: String,
    pub output: Option<String>,
    pub error: Option<String>,
    pub score: Option<RubricReport>,
    pub feedback: Option<String>,
    /// True when the judge reply was unusable and neutral scores were used.
    #[serde(default)]
    pub score_degraded: bool,
    pub latency_ms: u64,
}

impl CellResult {
    fn pending(cell: &MatrixCell, blueprint: String) -> Self {
        Self {
            index: cell.index,
            tone: cell.tone,
            length: cell.length,
            format: cell.format,
            blueprint,
            output: None,
            error: None,
            score: None,
            feedback: None,
            score_degraded: false,
            latency_ms: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ExperimentRun {
    pub cells: Vec<CellResult>,
    pub succeeded: usize,
    pub failed: usize,
    /// Index of the highest-scoring cell, first wins on ties.
    pub best_index: Option<usize>,
    #[serde(skip)]
    pub usage: Option<UsageRecord>,
}

/// Folds per-call records into one, labelled with the first call's provider
/// and model.
pub fn merge_usage(records: &[UsageRecord]) -> Option<UsageRecord> {
    let first = records.first()?;
    let mut usage = Usage::default();
    for record in records {
        usage.add(record.usage);
    }
    Some(UsageRecord {
        provider: first.provider,
        model: first.model.clone(),
        usage,
    })
}

fn best_index(cells: &[CellResult]) -> Option<usize> {
    cells
        .iter()
        .filter_map(|c| c.score.as_ref().map(|s| (c.index, s.overall_score)))
        .fold(None, |best: Option<(usize, u32)>, (index, score)| match best {
            Some((_, top)) if top >= score => best,
            _ => Some((index, score)),
        })
        .map(|(index, _)| index)
}

async fn run_cell(
    backend: Arc<dyn CompletionBackend>,
    spec: PromptSpec,
    cell: MatrixCell,
    provider: Option<Provider>,
) -> (CellResult, Vec<UsageRecord>) {
    let cell_spec = spec.with_style(cell.tone, cell.length, cell.format);
    let blueprint = render_blueprint(&cell_spec);
    let mut result = CellResult::pending(&cell, blueprint.clone());
    let mut usage = Vec::new();

    let started = Instant::now();
    let request = CompletionRequest::new(blueprint, CELL_SYSTEM).with_provider(provider);
    let completion = match backend.complete(&request).await {
        Ok(c) => c,
        Err(e) => {
            warn!("Experiment cell {} failed: {e}", cell.index);
            result.error = Some(e.to_string());
            result.latency_ms = started.elapsed().as_millis() as u64;
            return (result, usage);
        }
    };
    result.latency_ms = started.elapsed().as_millis() as u64;
    usage.push(UsageRecord::from(&completion));

    match judge_output(backend.as_ref(), &cell_spec, &completion.text, provider).await {
        Ok(judgement) => {
            usage.extend(judgement.usage);
            result.score = Some(judgement.report);
            result.feedback = judgement.feedback;
            result.score_degraded = judgement.degraded;
        }
        Err(e) => warn!("Judging cell {} failed: {e}", cell.index),
    }
    result.output = Some(completion.text);
    (result, usage)
}

/// Runs every cell with at most `concurrency` cells in flight.
pub async fn run_experiment(
    backend: Arc<dyn CompletionBackend>,
    spec: &PromptSpec,
    cells: &[MatrixCell],
    provider: Option<Provider>,
    concurrency: usize,
) -> ExperimentRun {
    let sem = Arc::new(Semaphore::new(concurrency.max(1)));
    let mut join_set = JoinSet::new();

    for cell in cells.iter().copied() {
        let sem = sem.clone();
        let backend = backend.clone();
        let spec = spec.clone();
        join_set.spawn(async move {
            let _permit = sem.acquire_owned().await.ok();
            run_cell(backend, spec, cell, provider).await
        });
    }

    let mut slots: Vec<Option<CellResult>> = vec![None; cells.len()];
    let mut records: Vec<UsageRecord> = Vec::new();

    while let Some(joined) = join_set.join_next().await {
        match joined {
            Ok((result, usage)) => {
                records.extend(usage);
                let position = cells.iter().position(|c| c.index == result.index);
                if let Some(slot) = position.and_then(|p| slots.get_mut(p)) {
                    *slot = Some(result);
                }
            }
            Err(e) => error!("Experiment cell task panicked: {e}"),
        }
    }

    let results: Vec<CellResult> = cells
        .iter()
        .zip(slots)
        .map(|(cell, slot)| {
            slot.unwrap_or_else(|| {
                let mut aborted = CellResult::pending(cell, String::new());
                aborted.error = Some("cell task aborted".to_string());
                aborted
            })
        })
        .collect();

    let succeeded = results.iter().filter(|c| c.output.is_some()).count();
    let failed = results.len() - succeeded;
    info!("Experiment finished: {succeeded} succeeded, {failed} failed");

    ExperimentRun {
        best_index: best_index(&results),
        cells: results,
        succeeded,
        failed,
        usage: merge_usage(&records),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;

    use crate::blueprint::spec::{build_spec, SpecDraft};
    use crate::experiment::matrix::expand_matrix;
    use crate::llm_client::testing::StubBackend;
    use crate::llm_client::{Completion, LlmError};

    const JUDGE_REPLY: &str = r#"{"scores":{"clarity":8,"specificity":8,"tone_alignment":8,"format_compliance":8,"completeness":8}}"#;

    fn spec() -> PromptSpec {
        build_spec(
            &SpecDraft {
                intent: "Describe our return policy".to_string(),
                ..Default::default()
            },
            None,
        )
    }

    fn is_judge(request: &CompletionRequest) -> bool {
        request.prompt.starts_with("Grade the OUTPUT")
    }

    fn cells() -> Vec<MatrixCell> {
        expand_matrix(
            &[Tone::Casual, Tone::Formal],
            &[Length::Short],
            &[Format::Paragraph, Format::BulletPoints],
        )
    }

    #[tokio::test]
    async fn test_results_in_matrix_order_with_scores() {
        let backend = Arc::new(StubBackend::new(|req| {
            Ok(if is_judge(req) {
                JUDGE_REPLY.to_string()
            } else {
                "generated".to_string()
            })
        }));
        let cells = cells();
        let run = run_experiment(backend.clone(), &spec(), &cells, None, 2).await;

        assert_eq!(run.cells.len(), 4);
        assert_eq!(run.succeeded, 4);
        for (i, cell) in run.cells.iter().enumerate() {
            assert_eq!(cell.index, i);
            assert_eq!(cell.score.as_ref().unwrap().overall_score, 80);
        }
        assert_eq!(run.cells[3].tone, Tone::Formal);
        assert_eq!(run.cells[3].format, Format::BulletPoints);
        assert_eq!(backend.calls(), 8);
        // 8 calls × (10 in, 5 out)
        assert_eq!(run.usage.unwrap().usage.input_tokens, 80);
        assert_eq!(run.best_index, Some(0));
    }

    #[tokio::test]
    async fn test_failed_cell_does_not_fail_experiment() {
        let backend = Arc::new(StubBackend::new(|req| {
            if is_judge(req) {
                Ok(JUDGE_REPLY.to_string())
            } else if req.prompt.contains("bullet points") {
                Err(LlmError::EmptyContent)
            } else {
                Ok("generated".to_string())
            }
        }));
        let run = run_experiment(backend, &spec(), &cells(), None, 4).await;
        assert_eq!(run.succeeded, 2);
        assert_eq!(run.failed, 2);
        let failed = &run.cells[1];
        assert!(failed.output.is_none());
        assert!(failed.score.is_none());
        assert!(failed.error.as_deref().unwrap().contains("empty"));
    }

    #[tokio::test]
    async fn test_unparseable_judge_marks_degraded() {
        let backend = Arc::new(StubBackend::fixed("plain text"));
        let run = run_experiment(backend, &spec(), &cells()[..1], None, 1).await;
        let cell = &run.cells[0];
        assert!(cell.score_degraded);
        assert_eq!(cell.score.as_ref().unwrap().overall_score, 50);
    }

    #[tokio::test]
    async fn test_empty_matrix() {
        let backend = Arc::new(StubBackend::failing());
        let run = run_experiment(backend, &spec(), &[], None, 4).await;
        assert!(run.cells.is_empty());
        assert!(run.usage.is_none());
        assert_eq!(run.best_index, None);
    }

    struct CountingBackend {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl CompletionBackend for CountingBackend {
        async fn complete(&self, request: &CompletionRequest) -> Result<Completion, LlmError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(Completion {
                text: if is_judge(request) {
                    JUDGE_REPLY.to_string()
                } else {
                    "ok".to_string()
                },
                provider: Provider::Anthropic,
                model: "counting".to_string(),
                usage: Usage::default(),
            })
        }
    }

    #[tokio::test]
    async fn test_concurrency_cap_respected() {
        let backend = Arc::new(CountingBackend {
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        });
        let cells = expand_matrix(&Tone::ALL, &[Length::Brief], &[Format::Json]);
        let run = run_experiment(backend.clone(), &spec(), &cells, None, 3).await;
        assert_eq!(run.succeeded, 8);
        assert!(backend.peak.load(Ordering::SeqCst) <= 3);
    }

    #[test]
    fn test_merge_usage_sums_tokens() {
        let record = |i, o| UsageRecord {
            provider: Provider::OpenAi,
            model: "gpt-4o".to_string(),
            usage: Usage {
                input_tokens: i,
                output_tokens: o,
            },
        };
        let merged = merge_usage(&[record(3, 4), record(5, 6)]).unwrap();
        assert_eq!(merged.usage, Usage { input_tokens: 8, output_tokens: 10 });
        assert!(merge_usage(&[]).is_none());
    }
}
