//! # Delayed-Job Dispatch
//!
//! The precise dispatch trigger. `DispatchQueue` is the enqueue surface
//! used at post creation, reschedule, and cancel; `DispatchWorker`
//! consumes due jobs continuously and hands each post to the
//! orchestrator in its own task. The worker runs a small fixed number of
//! jobs concurrently; jobs are always for different posts, so the only
//! cross-task coordination needed is the orchestrator's claim.

use std::sync::Arc;

use metrics::counter;
use rand::Rng;
use sea_orm::{DatabaseConnection, DbErr};
use tokio::sync::Semaphore;
use tokio::time::{Duration as TokioDuration, sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::config::DispatchConfig;
use crate::orchestrator::PublishOrchestrator;
use crate::repositories::DispatchJobRepository;

/// Enqueue surface over the durable job store.
#[derive(Clone)]
pub struct DispatchQueue {
    jobs: DispatchJobRepository,
}

impl DispatchQueue {
    pub fn new(db: DatabaseConnection) -> Self {
        Self {
            jobs: DispatchJobRepository::new(db),
        }
    }

    /// Enqueue (or move) the job firing at the post's due instant.
    pub async fn schedule(&self, post_id: Uuid, fire_at_ms: i64) -> Result<(), DbErr> {
        self.jobs.schedule(post_id, fire_at_ms).await?;
        debug!(post_id = %post_id, fire_at_ms, "Dispatch job scheduled");
        Ok(())
    }

    /// Enqueue, tolerating job-store unavailability: post creation must
    /// not fail because the precise trigger could not be armed. The
    /// periodic scanner is the safety net for such posts.
    pub async fn schedule_best_effort(&self, post_id: Uuid, fire_at_ms: i64) {
        if let Err(err) = self.schedule(post_id, fire_at_ms).await {
            counter!("dispatch_enqueue_failures_total").increment(1);
            warn!(
                post_id = %post_id,
                error = ?err,
                "Dispatch enqueue failed; periodic scan will pick this post up"
            );
        }
    }

    /// Remove the post's pending job, if any. Idempotent.
    pub async fn cancel(&self, post_id: Uuid) -> Result<(), DbErr> {
        self.jobs.cancel(post_id).await?;
        debug!(post_id = %post_id, "Dispatch job cancelled");
        Ok(())
    }
}

/// Background worker consuming the durable job queue.
pub struct DispatchWorker {
    jobs: DispatchJobRepository,
    orchestrator: Arc<PublishOrchestrator>,
    config: DispatchConfig,
}

impl DispatchWorker {
    pub fn new(
        db: DatabaseConnection,
        orchestrator: Arc<PublishOrchestrator>,
        config: DispatchConfig,
    ) -> Self {
        Self {
            jobs: DispatchJobRepository::new(db),
            orchestrator,
            config,
        }
    }

    /// Run the worker loop until the provided shutdown token fires.
    #[instrument(skip_all)]
    pub async fn run(self, shutdown: CancellationToken) {
        info!(
            tick_ms = self.config.tick_ms,
            concurrency = self.config.concurrency,
            "Starting dispatch worker"
        );

        let semaphore = Arc::new(Semaphore::new(self.config.concurrency));

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Dispatch worker shutdown requested");
                    break;
                }
                _ = sleep(self.tick_interval()) => {
                    if let Err(err) = self.tick(&semaphore).await {
                        error!(error = ?err, "Dispatch tick failed");
                    }
                }
            }
        }

        info!("Dispatch worker stopped");
    }

    /// Poll interval with jitter so multiple instances spread their polls.
    fn tick_interval(&self) -> TokioDuration {
        let base = self.config.tick_ms as f64;
        let jitter = rand::thread_rng().gen_range(0.0..=(self.config.jitter_factor * base));
        TokioDuration::from_millis((base + jitter) as u64)
    }

    /// Consume every due job, spawning one bounded task per post.
    pub async fn tick(&self, semaphore: &Arc<Semaphore>) -> Result<usize, DbErr> {
        let now_ms = chrono::Utc::now().timestamp_millis();
        let due = self
            .jobs
            .find_due(now_ms, self.config.concurrency as u64 * 4)
            .await?;

        if due.is_empty() {
            return Ok(0);
        }

        let mut handles = Vec::new();
        for job in due {
            // Winning the row delete decides which worker fires the job;
            // the post claim still protects against the scanner.
            if !self.jobs.consume(job.id).await? {
                continue;
            }
            counter!("dispatch_jobs_consumed_total").increment(1);

            let Ok(permit) = semaphore.clone().acquire_owned().await else {
                warn!("Dispatch semaphore closed; stopping tick early");
                break;
            };
            let orchestrator = Arc::clone(&self.orchestrator);
            let post_id = job.post_id;

            let handle = tokio::spawn(async move {
                let _permit = permit;
                match orchestrator.process_post(post_id).await {
                    Ok(outcome) => {
                        debug!(post_id = %post_id, ?outcome, "Dispatch job processed");
                    }
                    Err(err) => {
                        error!(post_id = %post_id, error = ?err, "Dispatch job processing failed");
                    }
                }
            });
            handles.push(handle);
        }

        let count = handles.len();
        for handle in handles {
            let _ = handle.await;
        }

        Ok(count)
    }
}
