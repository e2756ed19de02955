// Bounded worker pool running cancellable jobs from a FIFO queue.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::types::RapidError;

/// A unit of work the pool can run. `execute` does the work; when it fails
/// the worker hands the error straight to `on_error` on the same task.
#[async_trait]
pub trait Job: Send {
    async fn execute(&mut self, ctx: &CancellationToken) -> Result<(), RapidError>;
    async fn on_error(&mut self, ctx: &CancellationToken, err: RapidError);
}

/// Fixed-size executor over a bounded job queue.
///
/// Workers race three signals: the shutdown latch, the shared cancellation
/// context, and the next queued job. A worker that already holds a job
/// finishes it before exiting; cancellation reaches in-flight jobs through
/// the `ctx` passed to `execute`. The workers collectively own the queue:
/// once the last of them exits, jobs still sitting in it are dropped, so
/// anything waiting on job teardown (a completion guard, a blocked `add`)
/// is released rather than left hanging.
pub struct WorkerPool {
    concurrency: usize,
    jobs: mpsc::Sender<Box<dyn Job>>,
    receiver: std::sync::Mutex<Option<mpsc::Receiver<Box<dyn Job>>>>,
    ctx: CancellationToken,
    quit: CancellationToken,
    started: AtomicBool,
    stopped: AtomicBool,
}

impl WorkerPool {
    /// Create a pool bound to `ctx` with `concurrency` workers and a queue
    /// holding up to `queue_size` pending jobs. The bounded channel needs at
    /// least one slot, so a zero queue size is clamped to one.
    pub fn new(
        ctx: CancellationToken,
        concurrency: usize,
        queue_size: usize,
    ) -> Result<Self, RapidError> {
        if concurrency == 0 {
            return Err(RapidError::InvalidConcurrency);
        }

        let (jobs, receiver) = mpsc::channel(queue_size.max(1));

        Ok(Self {
            concurrency,
            jobs,
            receiver: std::sync::Mutex::new(Some(receiver)),
            ctx,
            quit: CancellationToken::new(),
            started: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
        })
    }

    /// Spawn the workers. Subsequent calls are no-ops.
    pub fn start(&self) {
        if self.started.swap(true, Ordering::SeqCst) {
            return;
        }

        // hand the queue over to the workers; the last one to exit drops it
        let receiver = match self.receiver.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        let Some(receiver) = receiver else {
            return;
        };
        let receiver = Arc::new(Mutex::new(receiver));

        for id in 0..self.concurrency {
            let receiver = receiver.clone();
            let ctx = self.ctx.clone();
            let quit = self.quit.clone();

            tokio::spawn(async move {
                debug!(worker = id, "worker started");
                loop {
                    let job = {
                        let mut receiver = receiver.lock().await;
                        tokio::select! {
                            _ = quit.cancelled() => {
                                debug!(worker = id, "worker shutting down");
                                return;
                            }
                            _ = ctx.cancelled() => {
                                debug!(worker = id, "worker context cancelled");
                                return;
                            }
                            job = receiver.recv() => job,
                        }
                    };

                    let Some(mut job) = job else {
                        debug!(worker = id, "job queue closed");
                        return;
                    };

                    if let Err(err) = job.execute(&ctx).await {
                        job.on_error(&ctx, err).await;
                    }
                }
            });
        }
    }

    /// Enqueue a job. Blocks while the queue is full, but a pending send is
    /// released as soon as `stop` is called, so callers never deadlock on a
    /// stopped pool. Once every worker has exited the queue is gone and the
    /// job is dropped instead.
    pub async fn add(&self, job: Box<dyn Job>) {
        tokio::select! {
            _ = self.quit.cancelled() => {}
            sent = self.jobs.send(job) => {
                if sent.is_err() {
                    warn!("job dropped: queue closed");
                }
            }
        }
    }

    /// Signal shutdown. Idempotent. Idle workers return immediately;
    /// workers holding a job finish it first.
    pub fn stop(&self) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        debug!("stopping worker pool");
        self.quit.cancel();
    }
}
