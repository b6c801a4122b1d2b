//! Integration tests for account resolution against a real schema.

mod common;

use chrono::{Duration, Utc};
use sea_orm::{ActiveModelTrait, ActiveValue::Set};
use uuid::Uuid;

use publisher::accounts::{AccountError, AccountResolver};
use publisher::models::scheduled_post::PostSubtype;
use publisher::repositories::AccountRepository;

#[tokio::test]
async fn explicit_target_account_is_used() {
    let db = common::memory_db().await;
    let user = Uuid::new_v4();
    let account = common::seed_account(&db, Some(user), None).await;

    let mut post = common::seed_due_post(
        &db,
        user,
        "https://cdn.example.com/a.jpg",
        PostSubtype::Photo,
    )
    .await;
    post.target_account_id = Some(account.id);

    let resolver = AccountResolver::new(db, common::test_key());
    let credential = resolver.resolve(&post).await.unwrap();

    assert_eq!(credential.account_id, account.id);
    assert_eq!(credential.platform_user_id, common::PLATFORM_USER_ID);
    assert_eq!(credential.access_token, "test-access-token");
}

#[tokio::test]
async fn inactive_target_account_is_rejected() {
    let db = common::memory_db().await;
    let user = Uuid::new_v4();
    let account = common::seed_account(&db, Some(user), None).await;

    AccountRepository::new(db.clone())
        .deactivate(account.id)
        .await
        .unwrap();

    let mut post = common::seed_due_post(
        &db,
        user,
        "https://cdn.example.com/a.jpg",
        PostSubtype::Photo,
    )
    .await;
    post.target_account_id = Some(account.id);

    let resolver = AccountResolver::new(db, common::test_key());
    let result = resolver.resolve(&post).await;
    assert!(matches!(result, Err(AccountError::AccountNotFound)));
}

#[tokio::test]
async fn target_account_from_another_scope_is_rejected() {
    let db = common::memory_db().await;
    let user = Uuid::new_v4();
    let foreign_account = common::seed_account(&db, Some(Uuid::new_v4()), None).await;

    let mut post = common::seed_due_post(
        &db,
        user,
        "https://cdn.example.com/a.jpg",
        PostSubtype::Photo,
    )
    .await;
    post.target_account_id = Some(foreign_account.id);

    let resolver = AccountResolver::new(db, common::test_key());
    let result = resolver.resolve(&post).await;
    assert!(matches!(result, Err(AccountError::AccountNotFound)));
}

#[tokio::test]
async fn most_recently_used_account_wins() {
    let db = common::memory_db().await;
    let user = Uuid::new_v4();

    let stale = common::seed_account(&db, Some(user), None).await;
    let fresh = common::seed_account(&db, Some(user), None).await;

    let long_ago = (Utc::now() - Duration::days(30)).fixed_offset();
    let recent = Utc::now().fixed_offset();

    publisher::models::account::ActiveModel {
        id: Set(stale.id),
        last_used_at: Set(Some(long_ago)),
        ..Default::default()
    }
    .update(&db)
    .await
    .unwrap();
    publisher::models::account::ActiveModel {
        id: Set(fresh.id),
        last_used_at: Set(Some(recent)),
        ..Default::default()
    }
    .update(&db)
    .await
    .unwrap();

    let post = common::seed_due_post(
        &db,
        user,
        "https://cdn.example.com/a.jpg",
        PostSubtype::Photo,
    )
    .await;

    let resolver = AccountResolver::new(db, common::test_key());
    let credential = resolver.resolve(&post).await.unwrap();
    assert_eq!(credential.account_id, fresh.id);
}

#[tokio::test]
async fn org_posts_resolve_against_org_accounts() {
    let db = common::memory_db().await;
    let user = Uuid::new_v4();
    let org = Uuid::new_v4();

    // The user's personal account must not win for an org post.
    common::seed_account(&db, Some(user), None).await;
    let shared = common::seed_account(&db, None, Some(org)).await;

    let mut post = common::seed_due_post(
        &db,
        user,
        "https://cdn.example.com/a.jpg",
        PostSubtype::Photo,
    )
    .await;
    post.organization_id = Some(org);

    let resolver = AccountResolver::new(db, common::test_key());
    let credential = resolver.resolve(&post).await.unwrap();
    assert_eq!(credential.account_id, shared.id);
}

#[tokio::test]
async fn no_connected_account_is_an_error() {
    let db = common::memory_db().await;
    let post = common::seed_due_post(
        &db,
        Uuid::new_v4(),
        "https://cdn.example.com/a.jpg",
        PostSubtype::Photo,
    )
    .await;

    let resolver = AccountResolver::new(db, common::test_key());
    let result = resolver.resolve(&post).await;
    assert!(matches!(result, Err(AccountError::NoAccountConnected)));
}

#[tokio::test]
async fn deactivated_accounts_never_resolve() {
    let db = common::memory_db().await;
    let user = Uuid::new_v4();
    let account = common::seed_account(&db, Some(user), None).await;

    AccountRepository::new(db.clone())
        .deactivate(account.id)
        .await
        .unwrap();

    let post = common::seed_due_post(
        &db,
        user,
        "https://cdn.example.com/a.jpg",
        PostSubtype::Photo,
    )
    .await;

    let resolver = AccountResolver::new(db, common::test_key());
    let result = resolver.resolve(&post).await;
    assert!(matches!(result, Err(AccountError::NoAccountConnected)));
}
