//! Publish orchestrator.
//!
//! Drives one post through the publish state machine: claim it with the
//! atomic conditional update, resolve its asset and credential, invoke
//! the protocol client, and record the outcome with retry bookkeeping.
//! Every per-attempt failure is converted into a state transition plus a
//! persisted error message; nothing escapes a single post's processing,
//! so one bad post never aborts a batch or a worker slot.

use std::sync::Arc;

use metrics::{counter, histogram};
use sea_orm::{DatabaseConnection, DbErr};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::accounts::{AccountError, AccountResolver};
use crate::assets::{AssetError, AssetResolver};
use crate::models::scheduled_post::{Model as ScheduledPost, PostStatus};
use crate::platform::{PublishApi, PublishError, PublishRequest, caption::compose_caption};
use crate::repositories::ScheduledPostRepository;

/// Anything that can fail one publish attempt. Each variant consumes one
/// unit of the post's retry budget.
#[derive(Debug, Error)]
pub enum PublishAttemptError {
    #[error(transparent)]
    Asset(#[from] AssetError),
    #[error(transparent)]
    Account(#[from] AccountError),
    #[error(transparent)]
    Platform(#[from] PublishError),
}

/// Result of processing one post through the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    /// Confirmed on the platform.
    Published { media_id: String },
    /// Attempt failed below the cap; the post is `scheduled` again.
    Retrying { attempts: i32 },
    /// Attempt failed at the cap; the post is terminally `failed`.
    Failed { attempts: i32 },
    /// Another trigger holds (or already finished) this post.
    ClaimLost,
}

/// State-machine driver for scheduled posts.
pub struct PublishOrchestrator {
    posts: ScheduledPostRepository,
    assets: AssetResolver,
    accounts: AccountResolver,
    platform: Arc<dyn PublishApi>,
    max_attempts: u32,
}

impl PublishOrchestrator {
    pub fn new(
        db: DatabaseConnection,
        assets: AssetResolver,
        accounts: AccountResolver,
        platform: Arc<dyn PublishApi>,
        max_attempts: u32,
    ) -> Self {
        Self {
            posts: ScheduledPostRepository::new(db),
            assets,
            accounts,
            platform,
            max_attempts,
        }
    }

    /// Process one post end to end.
    ///
    /// Returns `Err` only for infrastructure failures talking to the
    /// database; attempt failures come back as `Retrying`/`Failed`
    /// outcomes with the message persisted on the row.
    #[instrument(skip(self), fields(post_id = %post_id))]
    pub async fn process_post(&self, post_id: Uuid) -> Result<PublishOutcome, DbErr> {
        // The claim races against the other trigger; losing is the
        // expected quiet path, not an error.
        let Some(post) = self.posts.claim_for_publish(post_id).await? else {
            debug!("Claim lost; another trigger owns this post");
            counter!("publish_claims_lost_total").increment(1);
            return Ok(PublishOutcome::ClaimLost);
        };

        let attempts = post.publish_attempts;
        info!(attempt = attempts, subtype = ?post.subtype, "Starting publish attempt");
        counter!("publish_attempts_total").increment(1);
        let started = std::time::Instant::now();

        let outcome = match self.attempt(&post).await {
            Ok(media_id) => {
                self.posts.mark_published(post.id, &media_id).await?;
                info!(media_id = %media_id, "Post published");
                counter!("publish_success_total").increment(1);
                PublishOutcome::Published { media_id }
            }
            Err(err) => {
                let message = err.to_string();
                let next_status = self
                    .posts
                    .record_failure(post.id, attempts, self.max_attempts, &message)
                    .await?;
                counter!("publish_failure_total").increment(1);

                match next_status {
                    PostStatus::Failed => {
                        warn!(attempt = attempts, error = %message, "Post failed permanently");
                        PublishOutcome::Failed { attempts }
                    }
                    _ => {
                        warn!(attempt = attempts, error = %message, "Attempt failed; will retry");
                        PublishOutcome::Retrying { attempts }
                    }
                }
            }
        };

        histogram!("publish_attempt_duration_ms")
            .record(started.elapsed().as_secs_f64() * 1_000.0);

        Ok(outcome)
    }

    /// One publish attempt: resolve asset, resolve account, run the
    /// three-step protocol.
    async fn attempt(&self, post: &ScheduledPost) -> Result<String, PublishAttemptError> {
        let asset_url = self.assets.resolve(&post.asset_ref).await?;
        let credential = self.accounts.resolve(post).await?;

        let request = PublishRequest {
            asset_url,
            caption: compose_caption(&post.caption, &post.hashtag_list()),
            subtype: post.subtype,
        };

        Ok(self.platform.publish(&request, &credential).await?)
    }
}
