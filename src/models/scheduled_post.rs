//! ScheduledPost entity model
//!
//! This module contains the SeaORM entity model for the scheduled_posts
//! table, the unit of work the dispatch layer and the publish orchestrator
//! coordinate through.

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use utoipa::ToSchema;
use uuid::Uuid;

/// Lifecycle state of a scheduled post.
///
/// `scheduled` and `publishing` are active; the rest are terminal and only
/// operator intervention may move a post out of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize, ToSchema)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
    /// Waiting for its due instant, eligible to be claimed.
    #[sea_orm(string_value = "scheduled")]
    Scheduled,
    /// Claimed by a trigger, a publish attempt is in flight.
    #[sea_orm(string_value = "publishing")]
    Publishing,
    /// Confirmed on the platform, media id recorded.
    #[sea_orm(string_value = "published")]
    Published,
    /// Exhausted its attempt budget.
    #[sea_orm(string_value = "failed")]
    Failed,
    /// Cancelled by its owner before any claim succeeded.
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
}

impl PostStatus {
    /// A terminal post never transitions again without operator action.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PostStatus::Published | PostStatus::Failed | PostStatus::Cancelled
        )
    }
}

/// Platform-specific content subtype of a post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize, ToSchema)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "lowercase")]
pub enum PostSubtype {
    #[sea_orm(string_value = "photo")]
    Photo,
    #[sea_orm(string_value = "reel")]
    Reel,
    #[sea_orm(string_value = "story")]
    Story,
}

/// ScheduledPost entity representing one pending or completed publish
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "scheduled_posts")]
pub struct Model {
    /// Unique identifier for the post (primary key, stable across retries)
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Owning user
    pub user_id: Uuid,

    /// Owning organization, when the post is shared with an org
    pub organization_id: Option<Uuid>,

    /// Asset reference: an http(s) URL or an inline data URI
    pub asset_ref: String,

    /// Caption text as authored
    pub caption: String,

    /// Hashtags appended to the caption at publish time (JSON array of strings)
    #[sea_orm(column_type = "JsonBinary")]
    pub hashtags: Option<JsonValue>,

    /// Content subtype driving the platform request shape
    pub subtype: PostSubtype,

    /// Authoritative due instant, integer epoch millis
    pub scheduled_at_ms: i64,

    /// Human-readable date/time, display only
    pub display_datetime: Option<String>,

    /// Human-readable timezone, display only
    pub display_timezone: Option<String>,

    /// Current lifecycle state
    pub status: PostStatus,

    /// Number of genuine publish attempts made (monotonic)
    pub publish_attempts: i32,

    /// Timestamp of the most recent claimed attempt
    pub last_publish_attempt: Option<DateTimeWithTimeZone>,

    /// Last failure reason, kept for operator visibility
    pub error_message: Option<String>,

    /// Platform media id once published
    pub platform_media_id: Option<String>,

    /// Timestamp of the confirmed publish
    pub published_at: Option<DateTimeWithTimeZone>,

    /// Explicit account to publish with; required when the owner has
    /// more than one connected account
    pub target_account_id: Option<Uuid>,

    /// Timestamp when the post was created
    pub created_at: DateTimeWithTimeZone,

    /// Timestamp when the post was last updated
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::account::Entity",
        from = "Column::TargetAccountId",
        to = "super::account::Column::Id"
    )]
    Account,
}

impl Related<super::account::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Account.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Hashtags as a plain string list, tolerating a missing or
    /// malformed column value.
    pub fn hashtag_list(&self) -> Vec<String> {
        self.hashtags
            .as_ref()
            .and_then(|value| value.as_array())
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| item.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }
}
