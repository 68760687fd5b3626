//! Work pipeline: a bounded worker pool draining a shared URL queue
//!
//! One producer enqueues every URL in input order and closes the queue.
//! `concurrency` workers each loop: take an item, sleep the politeness delay,
//! fetch, parse, record the outcome, acknowledge the item. The run is complete
//! when the queue reports drained: closed, and every enqueued item acknowledged.
//!
//! A single item's failure never stops the run; it is counted and skipped.
//! That includes a handler that panics: the item counts as failed and the
//! worker moves on to the next one. Result order is not input order.

use crate::crawler::fetcher::{with_retry, FetchError, RetryPolicy};
use crate::crawler::queue::{QueueSnapshot, WorkQueue};
use crate::output::RunStats;
use crate::state::{PhaseTracker, PipelinePhase, WorkerState};
use crate::CrawlError;
use async_trait::async_trait;
use futures::future::join_all;
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Per-URL work performed by the pipeline: fetch, then parse
///
/// The pipeline wraps [`WorkHandler::fetch_once`] in the retry stage itself
/// so that worker state follows each attempt.
#[async_trait]
pub trait WorkHandler: Send + Sync + 'static {
    type Output: Send + 'static;

    /// Retry budget applied around `fetch_once`
    fn retry_policy(&self) -> RetryPolicy;

    /// A single fetch attempt
    async fn fetch_once(&self, url: &str) -> Result<String, FetchError>;

    /// Turns fetched content into a result; `None` means the page did not
    /// have the expected shape
    fn parse(&self, url: &str, content: &str) -> Option<Self::Output>;
}

/// How workers are scheduled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PipelineMode {
    /// Producer first, then a single worker drains the queue inline
    Sequential,

    /// Producer and workers are spawned as tasks on the runtime
    #[default]
    Threaded,

    /// Producer and workers are futures polled together on the calling task
    Cooperative,
}

/// Settings for one pipeline run
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Number of workers; must be greater than 0
    pub concurrency: usize,

    /// Pause before each fetch
    pub politeness_delay: Duration,

    pub mode: PipelineMode,
}

impl PipelineOptions {
    pub fn new(concurrency: usize, politeness_delay: Duration) -> Self {
        Self {
            concurrency,
            politeness_delay,
            mode: PipelineMode::default(),
        }
    }

    pub fn with_mode(mut self, mode: PipelineMode) -> Self {
        self.mode = mode;
        self
    }
}

/// Everything a finished run produced
#[derive(Debug)]
pub struct PipelineReport<T> {
    /// Successful results, in completion order
    pub results: Vec<T>,

    pub stats: RunStats,

    /// Queue counters after drain
    pub queue: QueueSnapshot,
}

/// Distributes URLs across a fixed-size worker pool
#[derive(Debug, Clone)]
pub struct Pipeline {
    options: PipelineOptions,
    cancel: CancellationToken,
    phase: PhaseTracker,
}

impl Pipeline {
    pub fn new(options: PipelineOptions) -> Self {
        Self {
            options,
            cancel: CancellationToken::new(),
            phase: PhaseTracker::new(PipelinePhase::DistributingWork),
        }
    }

    /// Stops the run between items once `token` is cancelled
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Publishes phase changes through an existing tracker
    pub fn with_phase_tracker(mut self, phase: PhaseTracker) -> Self {
        self.phase = phase;
        self
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    pub fn phase(&self) -> &PhaseTracker {
        &self.phase
    }

    /// Processes every URL with `handler` and waits for the queue to drain
    ///
    /// # Returns
    ///
    /// * `Ok(PipelineReport)` - All items processed (or cancelled)
    /// * `Err(CrawlError::InvalidConcurrency)` - `concurrency` is 0; nothing was enqueued
    pub async fn run<H: WorkHandler>(
        &self,
        urls: Vec<String>,
        handler: Arc<H>,
    ) -> Result<PipelineReport<H::Output>, CrawlError> {
        let concurrency = self.options.concurrency;
        if concurrency == 0 {
            return Err(CrawlError::InvalidConcurrency(concurrency));
        }

        let total = urls.len();
        let start = Instant::now();
        tracing::info!(
            total,
            concurrency,
            mode = ?self.options.mode,
            "Starting work pipeline"
        );
        self.phase.set(PipelinePhase::DistributingWork);

        let queue = Arc::new(WorkQueue::new());
        let context = WorkerContext {
            queue: queue.clone(),
            handler,
            politeness_delay: self.options.politeness_delay,
            cancel: self.cancel.clone(),
            progress: Arc::new(Progress::new(total, start)),
        };

        let (reports, rejected) = match self.options.mode {
            PipelineMode::Sequential => {
                if concurrency > 1 {
                    tracing::debug!(concurrency, "Sequential mode uses a single worker");
                }
                let rejected = produce(&queue, urls, &self.phase);
                (vec![run_worker(0, context).await], rejected)
            }
            PipelineMode::Cooperative => {
                let producer = async { produce(&queue, urls, &self.phase) };
                let workers = join_all((0..concurrency).map(|id| run_worker(id, context.clone())));
                let (rejected, reports) = futures::join!(producer, workers);
                (reports, rejected)
            }
            PipelineMode::Threaded => {
                let producer = {
                    let queue = queue.clone();
                    let phase = self.phase.clone();
                    tokio::spawn(async move { produce(&queue, urls, &phase) })
                };
                let handles: Vec<_> = (0..concurrency)
                    .map(|id| tokio::spawn(run_worker(id, context.clone())))
                    .collect();

                let rejected = match producer.await {
                    Ok(rejected) => rejected,
                    Err(e) => {
                        tracing::error!("Producer task failed: {}", e);
                        queue.close();
                        0
                    }
                };

                let mut reports = Vec::with_capacity(concurrency);
                for (id, outcome) in join_all(handles).await.into_iter().enumerate() {
                    match outcome {
                        Ok(report) => reports.push(report),
                        Err(e) => tracing::error!(worker = id, "Worker task failed: {}", e),
                    }
                }
                (reports, rejected)
            }
        };

        // Only non-zero if every worker died before the queue emptied
        let orphaned = queue.abandon_pending();
        if orphaned > 0 {
            tracing::error!(orphaned, "Items left in the queue without a worker");
        }

        queue.join().await;
        self.phase.set(PipelinePhase::Complete);

        let snapshot = queue.snapshot();
        let mut stats = RunStats {
            total,
            workers: concurrency,
            cancelled: snapshot.discarded + rejected,
            ..RunStats::default()
        };
        let mut results = Vec::new();
        for report in reports {
            stats.succeeded += report.succeeded;
            stats.skipped += report.skipped;
            stats.failed += report.failed;
            stats.retries += report.retries;
            results.extend(report.results);
        }
        stats.elapsed = start.elapsed();

        tracing::info!(
            succeeded = stats.succeeded,
            skipped = stats.skipped,
            failed = stats.failed,
            cancelled = stats.cancelled,
            "Work pipeline drained in {:?}",
            stats.elapsed
        );

        Ok(PipelineReport {
            results,
            stats,
            queue: snapshot,
        })
    }
}

/// Runs `handler` over `urls` with `concurrency` threaded workers
pub async fn run<H: WorkHandler>(
    urls: Vec<String>,
    handler: Arc<H>,
    concurrency: usize,
    politeness_delay: Duration,
) -> Result<PipelineReport<H::Output>, CrawlError> {
    Pipeline::new(PipelineOptions::new(concurrency, politeness_delay))
        .run(urls, handler)
        .await
}

/// Enqueues every URL in order, then closes the queue
///
/// Returns how many URLs were refused because the queue was already closed.
fn produce(queue: &WorkQueue<String>, urls: Vec<String>, phase: &PhaseTracker) -> usize {
    let total = urls.len();
    let mut rejected = 0;

    for url in urls {
        if queue.push(url).is_err() {
            rejected += 1;
        }
    }
    queue.close();

    if rejected > 0 {
        tracing::info!(rejected, total, "Queue closed before all URLs were enqueued");
    } else {
        tracing::debug!(total, "All URLs enqueued");
    }
    phase.set(PipelinePhase::Draining);

    rejected
}

struct WorkerContext<H> {
    queue: Arc<WorkQueue<String>>,
    handler: Arc<H>,
    politeness_delay: Duration,
    cancel: CancellationToken,
    progress: Arc<Progress>,
}

impl<H> Clone for WorkerContext<H> {
    fn clone(&self) -> Self {
        Self {
            queue: self.queue.clone(),
            handler: self.handler.clone(),
            politeness_delay: self.politeness_delay,
            cancel: self.cancel.clone(),
            progress: self.progress.clone(),
        }
    }
}

/// Outcomes gathered by one worker
struct WorkerReport<T> {
    results: Vec<T>,
    succeeded: usize,
    skipped: usize,
    failed: usize,
    retries: u64,
}

impl<T> Default for WorkerReport<T> {
    fn default() -> Self {
        Self {
            results: Vec::new(),
            succeeded: 0,
            skipped: 0,
            failed: 0,
            retries: 0,
        }
    }
}

/// Worker-local state machine
struct Worker {
    id: usize,
    state: WorkerState,
    retries: u64,
}

impl Worker {
    fn new(id: usize) -> Self {
        Self {
            id,
            state: WorkerState::Idle,
            retries: 0,
        }
    }

    fn transition(&mut self, next: WorkerState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "invalid worker transition {} -> {}",
            self.state,
            next
        );
        tracing::trace!(worker = self.id, from = %self.state, to = %next, "Worker state");
        if next == WorkerState::Retrying {
            self.retries += 1;
        }
        self.state = next;
    }

    /// Moves to `RecordingSkip` after the handler panicked mid-item
    fn recover(&mut self, url: &str, message: &str) {
        let stage = if self.state.is_network() { "fetch" } else { "parse" };
        tracing::error!(
            worker = self.id,
            url = %url,
            state = %self.state,
            "Handler panicked during {}, skipping: {}",
            stage,
            message
        );
        self.state = WorkerState::RecordingSkip;
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}

/// Shared completion counter used for progress logging
struct Progress {
    completed: AtomicUsize,
    total: usize,
    start: Instant,
}

impl Progress {
    fn new(total: usize, start: Instant) -> Self {
        Self {
            completed: AtomicUsize::new(0),
            total,
            start,
        }
    }

    fn tick(&self) {
        let completed = self.completed.fetch_add(1, Ordering::Relaxed) + 1;
        if completed % 10 == 0 || completed == self.total {
            let rate = completed as f64 / self.start.elapsed().as_secs_f64().max(f64::EPSILON);
            tracing::info!(
                "Progress: {}/{} items processed, {:.2} items/sec",
                completed,
                self.total,
                rate
            );
        }
    }
}

async fn run_worker<H: WorkHandler>(id: usize, context: WorkerContext<H>) -> WorkerReport<H::Output> {
    let mut worker = Worker::new(id);
    let mut report = WorkerReport::default();
    let policy = context.handler.retry_policy();

    loop {
        let ticket = if context.cancel.is_cancelled() {
            None
        } else {
            tokio::select! {
                biased;
                _ = context.cancel.cancelled() => None,
                ticket = context.queue.pop() => ticket,
            }
        };

        let Some(ticket) = ticket else {
            if context.cancel.is_cancelled() {
                let discarded = context.queue.abandon_pending();
                if discarded > 0 {
                    tracing::info!(worker = id, discarded, "Run cancelled, dropping pending items");
                }
            }
            break;
        };
        let url = ticket.item();

        if !context.politeness_delay.is_zero() {
            tokio::time::sleep(context.politeness_delay).await;
        }

        let processed = AssertUnwindSafe(process_item(
            &mut worker,
            context.handler.as_ref(),
            &policy,
            url,
            &mut report,
        ))
        .catch_unwind()
        .await;
        if let Err(payload) = processed {
            worker.recover(url, panic_message(payload.as_ref()));
            report.failed += 1;
        }

        ticket.done();
        worker.transition(WorkerState::Idle);
        context.progress.tick();
    }

    worker.transition(WorkerState::Done);
    report.retries = worker.retries;
    tracing::debug!(
        worker = id,
        succeeded = report.succeeded,
        skipped = report.skipped,
        failed = report.failed,
        "Worker finished"
    );
    report
}

/// Fetches (with retry) and parses one item, recording its outcome in `report`
async fn process_item<H: WorkHandler>(
    worker: &mut Worker,
    handler: &H,
    policy: &RetryPolicy,
    url: &str,
    report: &mut WorkerReport<H::Output>,
) {
    worker.transition(WorkerState::Fetching);
    let fetched = with_retry(policy, |attempt| {
        if attempt > 1 {
            worker.transition(WorkerState::Retrying);
        }
        handler.fetch_once(url)
    })
    .await;

    match fetched {
        Ok(fetched) => {
            worker.transition(WorkerState::Parsing);
            match handler.parse(url, &fetched.value) {
                Some(output) => {
                    worker.transition(WorkerState::RecordingSuccess);
                    report.results.push(output);
                    report.succeeded += 1;
                }
                None => {
                    worker.transition(WorkerState::RecordingSkip);
                    tracing::debug!(worker = worker.id, url = %url, "Page shape mismatch, skipping");
                    report.skipped += 1;
                }
            }
        }
        Err(failure) => {
            worker.transition(WorkerState::RecordingSkip);
            tracing::warn!(
                worker = worker.id,
                url = %url,
                attempts = failure.attempts,
                error = %failure.value,
                "Fetch failed, skipping"
            );
            report.failed += 1;
        }
    }
}
