//! # ScheduledPost Repository
//!
//! Repository operations for the scheduled_posts table, including every
//! state-machine transition. The claim here is the single serialization
//! point between the periodic scanner and the delayed-job worker: a
//! one-round-trip conditional UPDATE, never a read-then-write pair.

use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::models::scheduled_post::{
    ActiveModel, Column, Entity, Model, PostStatus, PostSubtype,
};

/// Fields accepted when scheduling a new post.
#[derive(Debug, Clone)]
pub struct NewScheduledPost {
    pub user_id: Uuid,
    pub organization_id: Option<Uuid>,
    pub asset_ref: String,
    pub caption: String,
    pub hashtags: Vec<String>,
    pub subtype: PostSubtype,
    pub scheduled_at_ms: i64,
    pub display_datetime: Option<String>,
    pub display_timezone: Option<String>,
    pub target_account_id: Option<Uuid>,
}

/// Repository for scheduled post database operations
#[derive(Clone)]
pub struct ScheduledPostRepository {
    db: DatabaseConnection,
}

impl ScheduledPostRepository {
    /// Create a new ScheduledPostRepository with the given database
    /// connection
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Insert a new post in the `scheduled` state.
    pub async fn create(&self, new_post: NewScheduledPost) -> Result<Model, DbErr> {
        let now = Utc::now().fixed_offset();
        let hashtags: JsonValue = new_post.hashtags.into();

        let post = ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(new_post.user_id),
            organization_id: Set(new_post.organization_id),
            asset_ref: Set(new_post.asset_ref),
            caption: Set(new_post.caption),
            hashtags: Set(Some(hashtags)),
            subtype: Set(new_post.subtype),
            scheduled_at_ms: Set(new_post.scheduled_at_ms),
            display_datetime: Set(new_post.display_datetime),
            display_timezone: Set(new_post.display_timezone),
            status: Set(PostStatus::Scheduled),
            publish_attempts: Set(0),
            last_publish_attempt: Set(None),
            error_message: Set(None),
            platform_media_id: Set(None),
            published_at: Set(None),
            target_account_id: Set(new_post.target_account_id),
            created_at: Set(now),
            updated_at: Set(now),
        };

        post.insert(&self.db).await
    }

    /// Find a post by id.
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Model>, DbErr> {
        Entity::find_by_id(id).one(&self.db).await
    }

    /// List posts for operator views, newest first.
    pub async fn list(
        &self,
        user_id: Option<Uuid>,
        organization_id: Option<Uuid>,
        status: Option<PostStatus>,
        limit: u64,
    ) -> Result<Vec<Model>, DbErr> {
        let mut query = Entity::find().order_by_desc(Column::CreatedAt);

        if let Some(user_id) = user_id {
            query = query.filter(Column::UserId.eq(user_id));
        }
        if let Some(org_id) = organization_id {
            query = query.filter(Column::OrganizationId.eq(org_id));
        }
        if let Some(status) = status {
            query = query.filter(Column::Status.eq(status));
        }

        query.limit(limit).all(&self.db).await
    }

    /// Ids of due posts still in `scheduled`, oldest due first, limited
    /// to the scanner's batch size.
    pub async fn find_due_ids(&self, now_ms: i64, batch: u64) -> Result<Vec<Uuid>, DbErr> {
        Entity::find()
            .select_only()
            .column(Column::Id)
            .filter(Column::Status.eq(PostStatus::Scheduled))
            .filter(Column::ScheduledAtMs.lte(now_ms))
            .order_by_asc(Column::ScheduledAtMs)
            .limit(batch)
            .into_tuple::<Uuid>()
            .all(&self.db)
            .await
    }

    /// Atomically claim a post for publishing.
    ///
    /// The conditional UPDATE is the only mutual exclusion in the system:
    /// whichever trigger loses the race sees zero rows affected and must
    /// treat that as a silent no-op. The attempt counter is incremented
    /// here, inside the claim, so it moves exactly once per genuine
    /// attempt no matter how many triggers fire.
    pub async fn claim_for_publish(&self, id: Uuid) -> Result<Option<Model>, DbErr> {
        let now = Utc::now().fixed_offset();

        let result = Entity::update_many()
            .col_expr(Column::Status, Expr::value(PostStatus::Publishing))
            .col_expr(
                Column::PublishAttempts,
                Expr::value(Expr::col(Column::PublishAttempts).add(1)),
            )
            .col_expr(Column::LastPublishAttempt, Expr::value(now))
            .col_expr(Column::UpdatedAt, Expr::value(now))
            .filter(Column::Id.eq(id))
            .filter(Column::Status.eq(PostStatus::Scheduled))
            .exec(&self.db)
            .await?;

        if result.rows_affected == 0 {
            return Ok(None);
        }

        self.find_by_id(id).await
    }

    /// Record a confirmed publish. Conditional on the row still being in
    /// `publishing`, so terminal states are never overwritten.
    pub async fn mark_published(&self, id: Uuid, media_id: &str) -> Result<(), DbErr> {
        let now = Utc::now().fixed_offset();

        Entity::update_many()
            .col_expr(Column::Status, Expr::value(PostStatus::Published))
            .col_expr(Column::PlatformMediaId, Expr::value(media_id))
            .col_expr(Column::PublishedAt, Expr::value(now))
            .col_expr(Column::ErrorMessage, Expr::value(Option::<String>::None))
            .col_expr(Column::UpdatedAt, Expr::value(now))
            .filter(Column::Id.eq(id))
            .filter(Column::Status.eq(PostStatus::Publishing))
            .exec(&self.db)
            .await?;

        Ok(())
    }

    /// Record a failed attempt: below the attempt cap the post reverts to
    /// `scheduled` for the next trigger; at the cap it becomes `failed`.
    /// Returns the resulting status.
    pub async fn record_failure(
        &self,
        id: Uuid,
        attempts_made: i32,
        max_attempts: u32,
        error_message: &str,
    ) -> Result<PostStatus, DbErr> {
        let now = Utc::now().fixed_offset();
        let next_status = if attempts_made >= max_attempts as i32 {
            PostStatus::Failed
        } else {
            PostStatus::Scheduled
        };

        Entity::update_many()
            .col_expr(Column::Status, Expr::value(next_status))
            .col_expr(Column::ErrorMessage, Expr::value(error_message))
            .col_expr(Column::UpdatedAt, Expr::value(now))
            .filter(Column::Id.eq(id))
            .filter(Column::Status.eq(PostStatus::Publishing))
            .exec(&self.db)
            .await?;

        Ok(next_status)
    }

    /// Flip a still-scheduled post to `cancelled` so any pending claim
    /// fails. Returns whether this call performed the flip.
    pub async fn cancel_if_scheduled(&self, id: Uuid) -> Result<bool, DbErr> {
        let now = Utc::now().fixed_offset();

        let result = Entity::update_many()
            .col_expr(Column::Status, Expr::value(PostStatus::Cancelled))
            .col_expr(Column::UpdatedAt, Expr::value(now))
            .filter(Column::Id.eq(id))
            .filter(Column::Status.eq(PostStatus::Scheduled))
            .exec(&self.db)
            .await?;

        Ok(result.rows_affected == 1)
    }

    /// Move a still-scheduled post to a new due instant. Returns whether
    /// the post was still reschedulable.
    pub async fn reschedule_if_scheduled(
        &self,
        id: Uuid,
        scheduled_at_ms: i64,
        display_datetime: Option<String>,
        display_timezone: Option<String>,
    ) -> Result<bool, DbErr> {
        let now = Utc::now().fixed_offset();

        let result = Entity::update_many()
            .col_expr(Column::ScheduledAtMs, Expr::value(scheduled_at_ms))
            .col_expr(Column::DisplayDatetime, Expr::value(display_datetime))
            .col_expr(Column::DisplayTimezone, Expr::value(display_timezone))
            .col_expr(Column::UpdatedAt, Expr::value(now))
            .filter(Column::Id.eq(id))
            .filter(Column::Status.eq(PostStatus::Scheduled))
            .exec(&self.db)
            .await?;

        Ok(result.rows_affected == 1)
    }
}
