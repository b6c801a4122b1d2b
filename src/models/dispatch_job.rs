//! DispatchJob entity model
//!
//! This module contains the SeaORM entity model for the dispatch_jobs
//! table, the durable queue behind the delayed-job trigger. One visible
//! row per pending post; consumed rows are deleted.

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;
use uuid::Uuid;

/// DispatchJob entity mapping a post to its fire instant
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "dispatch_jobs")]
pub struct Model {
    /// Unique identifier for the job (primary key)
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Post this job fires for (unique; reschedules upsert)
    pub post_id: Uuid,

    /// Fire instant, integer epoch millis
    pub fire_at_ms: i64,

    /// Timestamp when the job was created
    pub created_at: DateTimeWithTimeZone,

    /// Timestamp when the job was last updated
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::scheduled_post::Entity",
        from = "Column::PostId",
        to = "super::scheduled_post::Column::Id"
    )]
    ScheduledPost,
}

impl Related<super::scheduled_post::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ScheduledPost.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
