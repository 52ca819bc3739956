//! Bounded task queues for the slow analysis services
//!
//! Tagging and color extraction are external, slow and retryable. Requests go
//! through a [`TaskQueue`] that caps how many run at once; everything else
//! waits its turn. The results are plain data that the catalog merges later
//! with [`merge_analysis`], so a queue never touches the catalog itself.

use async_trait::async_trait;
use futures::future::join_all;
use std::collections::BTreeSet;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use crate::error::{AnalysisError, QueueError};
use crate::state::{ColorInfo, MediaRecord};

/// Concurrency-limited queue of async tasks
#[derive(Clone)]
pub struct TaskQueue {
    name: &'static str,
    permits: Arc<Semaphore>,
    concurrency: usize,
    backlog: Arc<Mutex<Backlog>>,
    running: Arc<AtomicUsize>,
}

/// Waiting tasks of the current generation
#[derive(Debug, Default)]
struct Backlog {
    /// Bumped by `reset`; waiting tasks from an older generation are dropped
    generation: u64,
    waiting: usize,
}

/// Counts one waiting task for as long as its generation is current
struct WaitGuard<'a> {
    backlog: &'a Mutex<Backlog>,
    generation: u64,
}

impl<'a> WaitGuard<'a> {
    fn enter(backlog: &'a Mutex<Backlog>) -> Self {
        let mut state = lock(backlog);
        state.waiting += 1;
        WaitGuard {
            backlog,
            generation: state.generation,
        }
    }

    fn is_current(&self) -> bool {
        lock(self.backlog).generation == self.generation
    }
}

impl Drop for WaitGuard<'_> {
    fn drop(&mut self) {
        let mut state = lock(self.backlog);
        if state.generation == self.generation {
            state.waiting = state.waiting.saturating_sub(1);
        }
    }
}

fn lock(backlog: &Mutex<Backlog>) -> MutexGuard<'_, Backlog> {
    backlog.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Decrements a counter when dropped
struct CountGuard<'a>(&'a AtomicUsize);

impl<'a> CountGuard<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        CountGuard(counter)
    }
}

impl Drop for CountGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl TaskQueue {
    pub fn new(name: &'static str, concurrency: usize) -> Self {
        let concurrency = concurrency.max(1);
        Self {
            name,
            permits: Arc::new(Semaphore::new(concurrency)),
            concurrency,
            backlog: Arc::new(Mutex::new(Backlog::default())),
            running: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Run `task` once a slot is free and return its result.
    ///
    /// Fails with [`QueueError::Cancelled`] if the queue was reset while the
    /// task was still waiting.
    pub async fn submit<F, Fut, T>(&self, task: F) -> Result<T, QueueError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let permit = {
            let waiting = WaitGuard::enter(&self.backlog);
            let permit = self
                .permits
                .acquire()
                .await
                .map_err(|_| QueueError::Closed)?;
            if !waiting.is_current() {
                debug!("{} queue: dropping task submitted before reset", self.name);
                return Err(QueueError::Cancelled);
            }
            permit
        };

        let _running = CountGuard::enter(&self.running);
        let result = task().await;
        drop(permit);
        Ok(result)
    }

    /// Number of tasks waiting for a slot
    pub fn queue_length(&self) -> usize {
        lock(&self.backlog).waiting
    }

    /// Number of tasks currently running
    pub fn running_tasks(&self) -> usize {
        self.running.load(Ordering::SeqCst)
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Drop every waiting task. Tasks already running finish normally.
    pub fn reset(&self) {
        let dropped = {
            let mut state = lock(&self.backlog);
            state.generation += 1;
            std::mem::take(&mut state.waiting)
        };
        debug!(
            "{} queue reset ({} waiting dropped, {} running)",
            self.name,
            dropped,
            self.running_tasks()
        );
    }
}

// Implement Debug for better error messages
impl std::fmt::Debug for TaskQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskQueue")
            .field("name", &self.name)
            .field("concurrency", &self.concurrency)
            .field("queued", &self.queue_length())
            .field("running", &self.running_tasks())
            .finish()
    }
}

/// AI tagging service
#[async_trait]
pub trait Tagger: Send + Sync {
    async fn tags(&self, record: &MediaRecord) -> Result<Vec<String>, AnalysisError>;
}

/// Dominant-color extraction service
#[async_trait]
pub trait ColorExtractor: Send + Sync {
    async fn colors(&self, record: &MediaRecord) -> Result<Vec<ColorInfo>, AnalysisError>;
}

/// Result of analyzing one record
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Analysis {
    pub id: String,
    pub tags: Vec<String>,
    pub colors: Vec<ColorInfo>,
}

/// Analysis results plus the records that failed
#[derive(Debug, Default)]
pub struct AnalysisBatch {
    pub results: Vec<Analysis>,
    pub failures: Vec<AnalysisError>,
}

/// Tagging and color queues sized from the configuration
#[derive(Debug, Clone)]
pub struct Analyzer {
    pub tag_queue: TaskQueue,
    pub color_queue: TaskQueue,
}

impl Analyzer {
    pub fn new(tag_concurrency: usize, color_concurrency: usize) -> Self {
        Self {
            tag_queue: TaskQueue::new("tagging", tag_concurrency),
            color_queue: TaskQueue::new("colors", color_concurrency),
        }
    }

    /// Tag every record through the tagging queue
    pub async fn tag_all(&self, records: &[MediaRecord], tagger: &dyn Tagger) -> AnalysisBatch {
        let jobs = records.iter().map(|record| async move {
            let outcome = self.tag_queue.submit(|| tagger.tags(record)).await;
            (record.id.clone(), outcome)
        });

        collect(join_all(jobs).await, |id, tags| Analysis {
            id,
            tags,
            ..Default::default()
        })
    }

    /// Extract colors for every record through the color queue
    pub async fn extract_all(
        &self,
        records: &[MediaRecord],
        extractor: &dyn ColorExtractor,
    ) -> AnalysisBatch {
        let jobs = records.iter().map(|record| async move {
            let outcome = self.color_queue.submit(|| extractor.colors(record)).await;
            (record.id.clone(), outcome)
        });

        collect(join_all(jobs).await, |id, colors| Analysis {
            id,
            colors,
            ..Default::default()
        })
    }

    pub fn reset(&self) {
        self.tag_queue.reset();
        self.color_queue.reset();
    }
}

type JobOutcome<T> = (String, Result<Result<T, AnalysisError>, QueueError>);

fn collect<T>(outcomes: Vec<JobOutcome<T>>, build: impl Fn(String, T) -> Analysis) -> AnalysisBatch {
    let mut batch = AnalysisBatch::default();
    for (id, outcome) in outcomes {
        match outcome {
            Ok(Ok(value)) => batch.results.push(build(id, value)),
            Ok(Err(e)) => {
                warn!("{}", e);
                batch.failures.push(e);
            }
            Err(e) => {
                warn!("Analysis of {} not run: {}", id, e);
                batch.failures.push(AnalysisError {
                    id,
                    reason: e.to_string(),
                });
            }
        }
    }
    batch
}

/// Merge an analysis into a record.
///
/// Tags are trimmed and unioned with the existing set. Colors are only applied
/// when the record has none yet. Returns true if the record changed.
pub fn merge_analysis(record: &mut MediaRecord, analysis: &Analysis) -> bool {
    let before = (record.tags.len(), record.colors.len());

    let incoming: BTreeSet<String> = analysis
        .tags
        .iter()
        .map(|tag| tag.trim().to_string())
        .filter(|tag| !tag.is_empty())
        .collect();
    record.tags.extend(incoming);

    if record.colors.is_empty() && !analysis.colors.is_empty() {
        record.colors = analysis.colors.clone();
    }

    before != (record.tags.len(), record.colors.len())
}
