//! # Periodic Scanner
//!
//! The coarse dispatch trigger: a fixed-interval sweep over every due
//! post still in `scheduled`. It is stateless and needs nothing beyond
//! the database, which makes it the safety net when delayed-job
//! enqueueing failed or the job runtime lost a job. Batches are processed
//! sequentially with a short delay between posts to respect the
//! platform's rate limits; stragglers are picked up on the next tick.

use std::sync::Arc;

use metrics::{counter, histogram};
use sea_orm::{DatabaseConnection, DbErr};
use serde::Serialize;
use tokio::time::{Duration as TokioDuration, Instant, sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument};
use utoipa::ToSchema;

use crate::config::ScanConfig;
use crate::orchestrator::{PublishOrchestrator, PublishOutcome};
use crate::repositories::ScheduledPostRepository;

/// Counters from one sweep, surfaced by the manual scan endpoint.
#[derive(Debug, Default, Clone, Serialize, ToSchema)]
pub struct SweepStats {
    /// Due posts found in this sweep
    pub due_seen: u64,
    /// Posts confirmed on the platform
    pub published: u64,
    /// Posts whose attempt failed below the cap
    pub retried: u64,
    /// Posts that exhausted their attempt budget
    pub failed: u64,
    /// Posts another trigger claimed first
    pub claims_lost: u64,
    /// Posts whose processing hit an infrastructure error
    pub errors: u64,
}

/// Background due-post scanner.
pub struct PeriodicScanner {
    posts: ScheduledPostRepository,
    orchestrator: Arc<PublishOrchestrator>,
    config: ScanConfig,
}

impl PeriodicScanner {
    pub fn new(
        db: DatabaseConnection,
        orchestrator: Arc<PublishOrchestrator>,
        config: ScanConfig,
    ) -> Self {
        Self {
            posts: ScheduledPostRepository::new(db),
            orchestrator,
            config,
        }
    }

    /// Run the scan loop until the provided shutdown token fires.
    #[instrument(skip_all)]
    pub async fn run(self, shutdown: CancellationToken) {
        info!(
            interval_seconds = self.config.interval_seconds,
            batch_size = self.config.batch_size,
            "Starting periodic scanner"
        );
        let tick_interval = TokioDuration::from_secs(self.config.interval_seconds);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Periodic scanner shutdown requested");
                    break;
                }
                _ = sleep(tick_interval) => {
                    let tick_started = Instant::now();
                    match self.sweep().await {
                        Ok(stats) => {
                            debug!(
                                due_seen = stats.due_seen,
                                published = stats.published,
                                retried = stats.retried,
                                failed = stats.failed,
                                claims_lost = stats.claims_lost,
                                errors = stats.errors,
                                "Scan tick completed"
                            );
                        }
                        Err(err) => {
                            error!(error = ?err, "Scan tick failed");
                        }
                    }
                    histogram!("scan_tick_duration_ms")
                        .record(tick_started.elapsed().as_secs_f64() * 1_000.0);
                }
            }
        }

        info!("Periodic scanner stopped");
    }

    /// Sweep once: process up to one batch of due posts sequentially.
    ///
    /// One post's failure never aborts the rest of the batch; a hung
    /// attempt delays the remainder, which the next tick absorbs.
    pub async fn sweep(&self) -> Result<SweepStats, DbErr> {
        let now_ms = chrono::Utc::now().timestamp_millis();
        let mut stats = SweepStats::default();

        let due_ids = self
            .posts
            .find_due_ids(now_ms, self.config.batch_size)
            .await?;
        stats.due_seen = due_ids.len() as u64;

        if due_ids.is_empty() {
            return Ok(stats);
        }

        info!(count = due_ids.len(), "Sweep found due posts");

        let inter_post_delay = TokioDuration::from_millis(self.config.inter_post_delay_ms);
        let mut first = true;

        for post_id in due_ids {
            if !first && !inter_post_delay.is_zero() {
                sleep(inter_post_delay).await;
            }
            first = false;

            match self.orchestrator.process_post(post_id).await {
                Ok(PublishOutcome::Published { .. }) => stats.published += 1,
                Ok(PublishOutcome::Retrying { .. }) => stats.retried += 1,
                Ok(PublishOutcome::Failed { .. }) => stats.failed += 1,
                Ok(PublishOutcome::ClaimLost) => stats.claims_lost += 1,
                Err(err) => {
                    stats.errors += 1;
                    error!(post_id = %post_id, error = ?err, "Failed to process due post");
                }
            }
        }

        counter!("scan_posts_processed_total")
            .increment(stats.published + stats.retried + stats.failed);

        Ok(stats)
    }
}
