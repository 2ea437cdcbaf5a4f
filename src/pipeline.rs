//! Row orchestration: per-row stage sequencing and bounded fan-out.
//!
//! [`RowProcessor`] runs one row through the configured stage list and the
//! QC battery, catching any stage failure at the row boundary so one bad
//! row never aborts the rest. [`PipelineRunner`] fans rows out across a
//! semaphore-bounded set of tasks and collects results in input order.

use std::sync::Arc;
use std::time::Duration;

use futures::stream::{FuturesUnordered, StreamExt};
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

use crate::config::{RetryConfig, StageKind};
use crate::error::UpstreamError;
use crate::generate::Generate;
use crate::qc::QualityController;
use crate::row::{Row, RowMeta};

/// Ceiling on the doubling exponent of the retry backoff.
const MAX_BACKOFF_EXPONENT: u32 = 16;

/// One runnable stage: its configuration plus a client bound to it.
pub struct Stage {
    pub name: String,
    pub kind: StageKind,
    pub client: Arc<dyn Generate>,
}

/// Processes one row end to end: stages in order, then QC.
pub struct RowProcessor {
    stages: Vec<Stage>,
    qc: QualityController,
    retry: Option<RetryConfig>,
    stage_timeout: Option<Duration>,
}

impl RowProcessor {
    pub fn new(
        stages: Vec<Stage>,
        qc: QualityController,
        retry: Option<RetryConfig>,
        stage_timeout: Option<Duration>,
    ) -> Self {
        Self {
            stages,
            qc,
            retry,
            stage_timeout,
        }
    }

    /// Runs the stage list over `row`. Stage failures are contained here:
    /// the row comes back with `error` set and whatever progress it made.
    pub async fn process(&self, mut row: Row) -> Row {
        let mut previous = String::new();

        for (index, stage) in self.stages.iter().enumerate() {
            let prompt = match stage.kind {
                StageKind::Outline => build_outline_prompt(&row),
                StageKind::Rewrite => {
                    build_rewrite_prompt(&row, &previous, self.qc.config().min_word_count)
                }
            };

            match self.call_stage(stage, &prompt).await {
                Ok(text) => {
                    debug!(title = %row.title, stage = %stage.name, chars = text.len(), "stage complete");
                    if index == 0 {
                        row.record_outline(text.clone());
                    }
                    previous = text;
                }
                Err(err) => {
                    warn!(title = %row.title, stage = %stage.name, error = %err, "stage failed");
                    row.record_error(format!("{} stage failed: {}", stage.name, err));
                    return row;
                }
            }
        }

        row.record_content(previous);
        let content = row.rewritten_content.as_deref().unwrap_or("");
        let result = self.qc.validate(content, &row.title, &row.meta);
        row.record_qc(result);
        row
    }

    async fn call_stage(&self, stage: &Stage, prompt: &str) -> Result<String, UpstreamError> {
        let attempts = self
            .retry
            .as_ref()
            .map(|r| r.max_attempts.max(1))
            .unwrap_or(1);
        let backoff_secs = self.retry.as_ref().map(|r| r.backoff_secs).unwrap_or(0);

        let mut attempt = 1;
        loop {
            let call = stage.client.generate(prompt);
            let result = match self.stage_timeout {
                Some(limit) => match tokio::time::timeout(limit, call).await {
                    Ok(inner) => inner,
                    Err(_) => Err(UpstreamError::DeadlineElapsed {
                        stage: stage.name.clone(),
                        seconds: limit.as_secs(),
                    }),
                },
                None => call.await,
            };

            match result {
                Ok(text) => return Ok(text),
                Err(err) if attempt < attempts => {
                    // Exponent capped so large retry budgets cannot overflow
                    // the shift.
                    let factor = 1u64 << (attempt - 1).min(MAX_BACKOFF_EXPONENT);
                    let delay = Duration::from_secs(backoff_secs.saturating_mul(factor));
                    warn!(
                        stage = %stage.name,
                        attempt,
                        error = %err,
                        delay_secs = delay.as_secs(),
                        "stage attempt failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

fn build_outline_prompt(row: &Row) -> String {
    format!(
        "Create a detailed section outline for an article.\n\n\
         Title: {}\nDescription: {}\nKeywords: {}\nTarget audience: {}\n\n\
         Include 5-7 main sections as markdown \"##\" headings, key points \
         under each, and a closing \"## FAQ\" section with 3-5 questions.",
        row.title, row.meta.description, row.meta.keywords, row.meta.target_audience
    )
}

fn build_rewrite_prompt(row: &Row, draft: &str, min_words: usize) -> String {
    format!(
        "Rewrite and expand the draft below into a complete article of at \
         least {} words.\n\n\
         Title: {}\nKeywords: {}\nTarget audience: {}\n\n\
         Original content (reference):\n{}\n\nDraft to expand:\n{}\n\n\
         Keep the \"##\" section structure, integrate the keywords naturally, \
         and keep the \"## FAQ\" section.",
        min_words,
        row.title,
        row.meta.keywords,
        row.meta.target_audience,
        row.meta.content,
        draft
    )
}

/// Bounded fan-out scheduler over a shared [`RowProcessor`].
pub struct PipelineRunner {
    processor: Arc<RowProcessor>,
    concurrency: usize,
}

impl PipelineRunner {
    pub fn new(processor: RowProcessor, concurrency: usize) -> Self {
        Self {
            processor: Arc::new(processor),
            concurrency: concurrency.max(1),
        }
    }

    /// Processes every row with at most `concurrency` in flight. The
    /// returned vector matches the input order regardless of completion
    /// order; a row whose task panicked comes back marked failed rather
    /// than disappearing.
    pub async fn run(&self, rows: Vec<Row>) -> Vec<Row> {
        let total = rows.len();
        let inputs: Vec<(String, RowMeta)> = rows
            .iter()
            .map(|r| (r.title.clone(), r.meta.clone()))
            .collect();
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut futures = FuturesUnordered::new();

        for (index, row) in rows.into_iter().enumerate() {
            let semaphore = Arc::clone(&semaphore);
            let processor = Arc::clone(&self.processor);
            futures.push(tokio::spawn(async move {
                let _permit = semaphore.acquire().await.expect("Semaphore closed");
                (index, processor.process(row).await)
            }));
        }

        let mut slots: Vec<Option<Row>> = Vec::with_capacity(total);
        slots.resize_with(total, || None);
        let mut completed = 0;

        while let Some(joined) = futures.next().await {
            match joined {
                Ok((index, row)) => {
                    slots[index] = Some(row);
                }
                Err(err) => {
                    // process() contains all row-level failures, so a join
                    // error means a task panicked.
                    error!(error = %err, "row task failed to join");
                }
            }
            completed += 1;
            debug!(completed, total, "row finished");
        }

        info!(total, "all rows processed");
        slots
            .into_iter()
            .enumerate()
            .map(|(index, slot)| {
                slot.unwrap_or_else(|| {
                    let (title, meta) = inputs[index].clone();
                    let mut row = Row::new(title, meta);
                    row.record_error("row task panicked".to_string());
                    row
                })
            })
            .collect()
    }
}
