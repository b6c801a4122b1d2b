//! Migration to create the dispatch_jobs table.
//!
//! The durable queue behind the delayed-job trigger: one visible row per
//! pending post, keyed uniquely by post id so reschedules upsert instead
//! of stacking duplicates. Rows are deleted when consumed or cancelled.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(DispatchJobs::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(DispatchJobs::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(DispatchJobs::PostId)
                            .uuid()
                            .not_null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(DispatchJobs::FireAtMs)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(DispatchJobs::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(DispatchJobs::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_dispatch_jobs_post_id")
                            .from(DispatchJobs::Table, DispatchJobs::PostId)
                            .to(ScheduledPosts::Table, ScheduledPosts::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_dispatch_jobs_fire_at")
                    .table(DispatchJobs::Table)
                    .col(DispatchJobs::FireAtMs)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(Index::drop().name("idx_dispatch_jobs_fire_at").to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(DispatchJobs::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum DispatchJobs {
    Table,
    Id,
    PostId,
    FireAtMs,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum ScheduledPosts {
    Table,
    Id,
}
