//! Shared helpers for integration tests.

#![allow(dead_code)]

use chrono::Utc;
use sea_orm::{ActiveModelTrait, Database, DatabaseConnection, Set};
use uuid::Uuid;

use migration::{Migrator, MigratorTrait};
use publisher::crypto::{self, CryptoKey};
use publisher::models::account;
use publisher::models::scheduled_post::PostSubtype;
use publisher::repositories::{NewScheduledPost, ScheduledPostRepository};

pub const PLATFORM_USER_ID: &str = "17841400000000001";

/// Fresh in-memory database with all migrations applied.
pub async fn memory_db() -> DatabaseConnection {
    let db = Database::connect("sqlite::memory:")
        .await
        .expect("create in-memory db");
    Migrator::up(&db, None).await.expect("apply migrations");
    db
}

/// Deterministic token-sealing key for tests.
pub fn test_key() -> CryptoKey {
    CryptoKey::new(vec![42u8; 32]).expect("32-byte key")
}

/// Insert an active account with a sealed token for the given scope.
pub async fn seed_account(
    db: &DatabaseConnection,
    user_id: Option<Uuid>,
    organization_id: Option<Uuid>,
) -> account::Model {
    let id = Uuid::new_v4();
    let now = Utc::now().fixed_offset();
    let ciphertext = crypto::seal_token(&test_key(), id, "test-access-token").expect("seal token");

    account::ActiveModel {
        id: Set(id),
        user_id: Set(user_id),
        organization_id: Set(organization_id),
        external_user_id: Set(PLATFORM_USER_ID.to_string()),
        external_username: Set("brand_account".to_string()),
        access_token_ciphertext: Set(ciphertext),
        active: Set(true),
        last_used_at: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(db)
    .await
    .expect("insert account")
}

/// Schedule a post due in the past so every trigger sees it as due.
pub async fn seed_due_post(
    db: &DatabaseConnection,
    user_id: Uuid,
    asset_ref: &str,
    subtype: PostSubtype,
) -> publisher::models::scheduled_post::Model {
    let repo = ScheduledPostRepository::new(db.clone());
    repo.create(NewScheduledPost {
        user_id,
        organization_id: None,
        asset_ref: asset_ref.to_string(),
        caption: "Launch day".to_string(),
        hashtags: vec!["spring".to_string()],
        subtype,
        scheduled_at_ms: Utc::now().timestamp_millis() - 1_000,
        display_datetime: None,
        display_timezone: None,
        target_account_id: None,
    })
    .await
    .expect("insert post")
}
