//! Job queue processing.
//!
//! A dispatcher polls the store for pending jobs and feeds them into a
//! bounded channel consumed by a fixed pool of workers, so a burst of
//! submissions queues in the store instead of fanning out into unbounded
//! background tasks. Jobs stranded mid-stage by a previous process are
//! reset to pending at startup.

use crate::config::WorkerConfig;
use crate::orchestrator::Orchestrator;
use slidecast_common::JobId;
use slidecast_db::models::JobStage;
use slidecast_db::pool::{get_conn, DbPool};
use slidecast_db::queries::jobs;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Job processor that runs the pipeline for queued jobs.
pub struct JobProcessor {
    pool: DbPool,
    orchestrator: Arc<Orchestrator>,
    worker_count: usize,
    queue_depth: usize,
    poll_interval: Duration,
    shutdown: CancellationToken,
}

impl JobProcessor {
    pub fn new(pool: DbPool, orchestrator: Arc<Orchestrator>, worker: &WorkerConfig) -> Self {
        Self {
            pool,
            orchestrator,
            worker_count: worker.count.max(1),
            queue_depth: worker.queue_depth.max(1),
            poll_interval: Duration::from_secs(worker.poll_interval_secs.max(1)),
            shutdown: CancellationToken::new(),
        }
    }

    /// Token that stops the dispatcher and lets workers finish their
    /// in-flight job.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Process jobs until the shutdown token fires.
    pub async fn run(self) {
        info!("Job processor started ({} workers)", self.worker_count);

        // Recover jobs interrupted by a previous process
        match get_conn(&self.pool).and_then(|conn| jobs::reset_orphaned_jobs(&conn)) {
            Ok(count) if count > 0 => {
                info!("Reset {} orphaned jobs from previous session", count)
            }
            Ok(_) => {}
            Err(e) => warn!("Failed to reset orphaned jobs: {}", e),
        }

        let (tx, rx) = mpsc::channel::<JobId>(self.queue_depth);
        let rx = Arc::new(Mutex::new(rx));

        let mut workers = Vec::with_capacity(self.worker_count);
        for worker_id in 0..self.worker_count {
            workers.push(tokio::spawn(worker_loop(
                worker_id,
                Arc::clone(&rx),
                Arc::clone(&self.orchestrator),
                self.shutdown.clone(),
            )));
        }

        self.dispatch(tx).await;

        for worker in workers {
            let _ = worker.await;
        }

        info!("Job processor stopped");
    }

    /// Poll the store and enqueue pending jobs, oldest first. `sent` tracks
    /// what is already in the channel so one poll cycle does not enqueue
    /// the same pending job twice; a job leaves the set once a worker moves
    /// it out of pending.
    async fn dispatch(&self, tx: mpsc::Sender<JobId>) {
        let mut sent: HashSet<JobId> = HashSet::new();

        loop {
            tokio::select! {
                biased;

                _ = self.shutdown.cancelled() => {
                    info!("Job dispatcher shutting down");
                    return;
                }
                _ = tokio::time::sleep(self.poll_interval) => {}
            }

            let pending = match get_conn(&self.pool)
                .and_then(|conn| jobs::list_jobs_by_stage(&conn, JobStage::Pending, self.queue_depth))
            {
                Ok(pending) => pending,
                Err(e) => {
                    warn!("Dispatcher failed to list pending jobs: {}", e);
                    continue;
                }
            };

            sent.retain(|id| pending.iter().any(|job| job.id == *id));

            for job in pending {
                if sent.contains(&job.id) {
                    continue;
                }
                match tx.try_send(job.id) {
                    Ok(()) => {
                        sent.insert(job.id);
                    }
                    // Queue full: leave the rest pending in the store
                    Err(mpsc::error::TrySendError::Full(_)) => break,
                    Err(mpsc::error::TrySendError::Closed(_)) => return,
                }
            }
        }
    }
}

async fn worker_loop(
    worker_id: usize,
    rx: Arc<Mutex<mpsc::Receiver<JobId>>>,
    orchestrator: Arc<Orchestrator>,
    shutdown: CancellationToken,
) {
    loop {
        let job_id = {
            let mut rx = rx.lock().await;
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => return,
                received = rx.recv() => match received {
                    Some(job_id) => job_id,
                    None => return,
                },
            }
        };

        info!("Worker {} processing job {}", worker_id, job_id);
        match orchestrator.run(job_id).await {
            Ok(outcome) => {
                info!(
                    "Worker {} finished job {}: {}",
                    worker_id,
                    job_id,
                    outcome.video_path.display()
                );
            }
            Err(e) => {
                // Failure state is already persisted by the orchestrator;
                // a lost entry-gate race lands here too and is harmless.
                warn!("Worker {}: job {} did not complete: {:#}", worker_id, job_id, e);
            }
        }
    }
}
