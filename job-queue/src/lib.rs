//! # job-queue
//!
//! Bounded-concurrency poll/dispatch loop: one poller pulls work items one
//! at a time, workers run as detached tasks up to a configured bound, and
//! poll failures back off adaptively.
//!
//! Polling never awaits worker completion; the active-job counter is the
//! only admission control. When the counter is at the bound the cycle is
//! re-checked after a short fixed delay without polling.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Default number of concurrently running workers.
const DEFAULT_MAX_CONCURRENT_JOBS: usize = 2;
/// Default cap for the accumulated poll backoff.
const DEFAULT_MAX_POLL_DELAY: Duration = Duration::from_millis(60_000);
/// Backoff added per failed poll.
const POLL_DELAY_STEP: Duration = Duration::from_millis(5_000);
/// Re-check period while every worker slot is taken.
const SATURATED_RETRY: Duration = Duration::from_millis(100);

/// Startup misconfiguration. The running loop itself never fails.
#[derive(Error, Debug)]
pub enum QueueError {
    #[error("job queue started without a poller")]
    MissingPoller,
    #[error("job queue started without a worker")]
    MissingWorker,
}

/// Pulls one unit of work; suspends until work is available or polling
/// fails. A failure delays the next poll but never stops the loop.
#[async_trait]
pub trait JobPoller<J>: Send + Sync {
    async fn poll(&self) -> anyhow::Result<J>;
}

/// Processes one unit of work. Errors are logged by the queue, never
/// propagated.
#[async_trait]
pub trait JobWorker<J>: Send + Sync {
    async fn run(&self, job: J) -> anyhow::Result<()>;
}

/// Poll backoff: grows by a fixed step on every failure, capped, and resets
/// to zero on the first subsequent success.
#[derive(Debug, Clone)]
pub struct PollBackoff {
    delay: Duration,
    step: Duration,
    max: Duration,
}

impl PollBackoff {
    pub fn new(step: Duration, max: Duration) -> Self {
        Self {
            delay: Duration::ZERO,
            step,
            max,
        }
    }

    /// Delay before the next poll.
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Records a failed poll.
    pub fn bump(&mut self) {
        self.delay = (self.delay + self.step).min(self.max);
    }

    /// Records a successful poll.
    pub fn reset(&mut self) {
        self.delay = Duration::ZERO;
    }
}

/// Releases the worker slot when the task finishes, even on panic.
struct SlotGuard(Arc<AtomicUsize>);

impl Drop for SlotGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Bounded-concurrency dispatcher over a poller/worker pair.
pub struct JobQueue<J> {
    max_concurrent_jobs: usize,
    max_poll_delay: Duration,
    active_jobs: Arc<AtomicUsize>,
    poller: Option<Arc<dyn JobPoller<J>>>,
    worker: Option<Arc<dyn JobWorker<J>>>,
}

impl<J: Send + 'static> JobQueue<J> {
    pub fn new() -> Self {
        Self {
            max_concurrent_jobs: DEFAULT_MAX_CONCURRENT_JOBS,
            max_poll_delay: DEFAULT_MAX_POLL_DELAY,
            active_jobs: Arc::new(AtomicUsize::new(0)),
            poller: None,
            worker: None,
        }
    }

    /// Sets the worker bound; zero is treated as one.
    pub fn max_concurrent_jobs(mut self, max_jobs: usize) -> Self {
        self.max_concurrent_jobs = max_jobs.max(1);
        self
    }

    /// Caps the accumulated poll backoff.
    pub fn max_poll_delay(mut self, delay: Duration) -> Self {
        self.max_poll_delay = delay;
        self
    }

    pub fn set_poller<P>(mut self, poller: Arc<P>) -> Self
    where
        P: JobPoller<J> + 'static,
    {
        self.poller = Some(poller);
        self
    }

    pub fn set_worker<W>(mut self, worker: Arc<W>) -> Self
    where
        W: JobWorker<J> + 'static,
    {
        self.worker = Some(worker);
        self
    }

    /// Number of workers currently running.
    pub fn active_jobs(&self) -> usize {
        self.active_jobs.load(Ordering::Acquire)
    }

    /// Starts the loop as a detached task and returns its handle. Fails when
    /// the poller or worker was never set; the loop itself runs until the
    /// process exits.
    pub fn start(self) -> Result<JoinHandle<()>, QueueError> {
        let poller = self.poller.ok_or(QueueError::MissingPoller)?;
        let worker = self.worker.ok_or(QueueError::MissingWorker)?;
        let active_jobs = self.active_jobs;
        let max_jobs = self.max_concurrent_jobs;
        let max_delay = self.max_poll_delay;

        Ok(tokio::spawn(async move {
            run_loop(poller, worker, active_jobs, max_jobs, max_delay).await;
        }))
    }
}

impl<J: Send + 'static> Default for JobQueue<J> {
    fn default() -> Self {
        Self::new()
    }
}

async fn run_loop<J: Send + 'static>(
    poller: Arc<dyn JobPoller<J>>,
    worker: Arc<dyn JobWorker<J>>,
    active_jobs: Arc<AtomicUsize>,
    max_jobs: usize,
    max_delay: Duration,
) {
    let mut backoff = PollBackoff::new(POLL_DELAY_STEP, max_delay);

    loop {
        if active_jobs.load(Ordering::Acquire) >= max_jobs {
            tokio::time::sleep(SATURATED_RETRY).await;
            continue;
        }

        match poller.poll().await {
            Ok(job) => {
                backoff.reset();
                // take the slot before the task is spawned so the bound
                // holds no matter how spawning is scheduled
                active_jobs.fetch_add(1, Ordering::AcqRel);
                let guard = SlotGuard(active_jobs.clone());
                let worker = worker.clone();
                tokio::spawn(async move {
                    let _guard = guard;
                    if let Err(error) = worker.run(job).await {
                        warn!(error = %error, "worker failed");
                    }
                });
            }
            Err(error) => {
                warn!(error = %error, "polling failed");
                backoff.bump();
            }
        }

        let delay = backoff.delay();
        if !delay.is_zero() {
            debug!(delay_ms = delay.as_millis() as u64, "delaying next poll");
            tokio::time::sleep(delay).await;
        }
    }
}
