//! Migration to create the scheduled_posts table.
//!
//! Each row is one unit of publish work: an asset, a caption, a due
//! instant, and the state-machine bookkeeping (status, attempts, last
//! error, publish result) the dispatch triggers coordinate through.

use sea_orm_migration::prelude::*;
use sea_orm_migration::sea_orm::Statement;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ScheduledPosts::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ScheduledPosts::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ScheduledPosts::UserId).uuid().not_null())
                    .col(ColumnDef::new(ScheduledPosts::OrganizationId).uuid().null())
                    .col(ColumnDef::new(ScheduledPosts::AssetRef).text().not_null())
                    .col(ColumnDef::new(ScheduledPosts::Caption).text().not_null())
                    .col(ColumnDef::new(ScheduledPosts::Hashtags).json_binary().null())
                    .col(
                        ColumnDef::new(ScheduledPosts::Subtype)
                            .string_len(16)
                            .not_null()
                            .default("photo"),
                    )
                    // Authoritative due instant in integer epoch millis;
                    // display fields below are never used for dispatch.
                    .col(
                        ColumnDef::new(ScheduledPosts::ScheduledAtMs)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(ScheduledPosts::DisplayDatetime).text().null())
                    .col(ColumnDef::new(ScheduledPosts::DisplayTimezone).text().null())
                    .col(
                        ColumnDef::new(ScheduledPosts::Status)
                            .string_len(16)
                            .not_null()
                            .default("scheduled"),
                    )
                    .col(
                        ColumnDef::new(ScheduledPosts::PublishAttempts)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(ScheduledPosts::LastPublishAttempt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(ColumnDef::new(ScheduledPosts::ErrorMessage).text().null())
                    .col(ColumnDef::new(ScheduledPosts::PlatformMediaId).text().null())
                    .col(
                        ColumnDef::new(ScheduledPosts::PublishedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(ColumnDef::new(ScheduledPosts::TargetAccountId).uuid().null())
                    .col(
                        ColumnDef::new(ScheduledPosts::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(ScheduledPosts::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_scheduled_posts_target_account_id")
                            .from(ScheduledPosts::Table, ScheduledPosts::TargetAccountId)
                            .to(Accounts::Table, Accounts::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        // Index driving the periodic due-post sweep
        manager
            .get_connection()
            .execute(Statement::from_string(
                manager.get_database_backend(),
                "CREATE INDEX IF NOT EXISTS idx_scheduled_posts_status_due \
                 ON scheduled_posts (status, scheduled_at_ms)"
                    .to_string(),
            ))
            .await?;

        // Index for per-owner listing views
        manager
            .create_index(
                Index::create()
                    .name("idx_scheduled_posts_user_status")
                    .table(ScheduledPosts::Table)
                    .col(ScheduledPosts::UserId)
                    .col(ScheduledPosts::Status)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(Index::drop().name("idx_scheduled_posts_status_due").to_owned())
            .await?;

        manager
            .drop_index(
                Index::drop()
                    .name("idx_scheduled_posts_user_status")
                    .to_owned(),
            )
            .await?;

        manager
            .drop_table(Table::drop().table(ScheduledPosts::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum ScheduledPosts {
    Table,
    Id,
    UserId,
    OrganizationId,
    AssetRef,
    Caption,
    Hashtags,
    Subtype,
    ScheduledAtMs,
    DisplayDatetime,
    DisplayTimezone,
    Status,
    PublishAttempts,
    LastPublishAttempt,
    ErrorMessage,
    PlatformMediaId,
    PublishedAt,
    TargetAccountId,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Accounts {
    Table,
    Id,
}
