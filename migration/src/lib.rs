//! Database migrations for the publishing service.
//!
//! This module contains all database migrations using SeaORM Migration.

pub use sea_orm_migration::prelude::*;

mod m2026_01_10_000100_create_accounts;
mod m2026_01_10_000200_create_scheduled_posts;
mod m2026_01_10_000300_create_dispatch_jobs;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m2026_01_10_000100_create_accounts::Migration),
            Box::new(m2026_01_10_000200_create_scheduled_posts::Migration),
            Box::new(m2026_01_10_000300_create_dispatch_jobs::Migration),
        ]
    }
}
