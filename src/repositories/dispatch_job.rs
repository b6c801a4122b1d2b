//! # DispatchJob Repository
//!
//! Repository operations for the dispatch_jobs table: the job-store
//! adapter behind the delayed-job trigger. Jobs are keyed uniquely by
//! post id; scheduling an already-queued post moves its fire instant
//! instead of stacking a second job.

use chrono::Utc;
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, QueryOrder, QuerySelect, Set,
};
use uuid::Uuid;

use crate::models::dispatch_job::{ActiveModel, Column, Entity, Model};

/// Repository for dispatch job database operations
#[derive(Clone)]
pub struct DispatchJobRepository {
    db: DatabaseConnection,
}

impl DispatchJobRepository {
    /// Create a new DispatchJobRepository with the given database
    /// connection
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Schedule (or reschedule) the job for a post. Upserts on the
    /// post-id uniqueness guard.
    pub async fn schedule(&self, post_id: Uuid, fire_at_ms: i64) -> Result<(), DbErr> {
        let now = Utc::now().fixed_offset();

        let job = ActiveModel {
            id: Set(Uuid::new_v4()),
            post_id: Set(post_id),
            fire_at_ms: Set(fire_at_ms),
            created_at: Set(now),
            updated_at: Set(now),
        };

        let insert = Entity::insert(job).on_conflict(
            OnConflict::column(Column::PostId)
                .update_columns([Column::FireAtMs, Column::UpdatedAt])
                .to_owned(),
        );

        match insert.exec(&self.db).await {
            Ok(_) | Err(DbErr::UnpackInsertId) => Ok(()),
            Err(err) => Err(err),
        }
    }

    /// Remove the job for a post, if any. Idempotent.
    pub async fn cancel(&self, post_id: Uuid) -> Result<(), DbErr> {
        Entity::delete_many()
            .filter(Column::PostId.eq(post_id))
            .exec(&self.db)
            .await?;
        Ok(())
    }

    /// Jobs whose fire instant has passed, oldest first.
    pub async fn find_due(&self, now_ms: i64, limit: u64) -> Result<Vec<Model>, DbErr> {
        Entity::find()
            .filter(Column::FireAtMs.lte(now_ms))
            .order_by_asc(Column::FireAtMs)
            .limit(limit)
            .all(&self.db)
            .await
    }

    /// Consume a single job. Returns whether this worker won the row;
    /// a loser proceeding anyway is harmless because the post claim is
    /// the real gate.
    pub async fn consume(&self, job_id: Uuid) -> Result<bool, DbErr> {
        let result = Entity::delete_many()
            .filter(Column::Id.eq(job_id))
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected == 1)
    }

    /// The pending job for a post, if one exists.
    pub async fn find_for_post(&self, post_id: Uuid) -> Result<Option<Model>, DbErr> {
        Entity::find()
            .filter(Column::PostId.eq(post_id))
            .one(&self.db)
            .await
    }
}
