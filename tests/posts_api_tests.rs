//! Integration tests for the posts API surface: scheduling, status,
//! cancellation, rescheduling, and the operator scan trigger.

mod common;

use std::sync::Arc;

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use sea_orm::DatabaseConnection;
use serde_json::{Value, json};
use tower::ServiceExt;
use uuid::Uuid;

use publisher::accounts::{AccountResolver, Credential};
use publisher::assets::AssetResolver;
use publisher::config::AppConfig;
use publisher::dispatch::DispatchQueue;
use publisher::models::scheduled_post::{PostStatus, PostSubtype};
use publisher::orchestrator::PublishOrchestrator;
use publisher::platform::{PublishApi, PublishError, PublishRequest};
use publisher::repositories::{DispatchJobRepository, ScheduledPostRepository};
use publisher::scanner::PeriodicScanner;
use publisher::server::{AppState, create_app};
use publisher::storage::HttpBlobStore;

const TOKEN: &str = "operator-token";

struct AlwaysPublish;

#[async_trait]
impl PublishApi for AlwaysPublish {
    async fn publish(
        &self,
        _request: &PublishRequest,
        _credential: &Credential,
    ) -> Result<String, PublishError> {
        Ok("media-1".to_string())
    }
}

async fn test_app() -> (Router, DatabaseConnection) {
    let db = common::memory_db().await;

    let config = Arc::new(AppConfig {
        operator_tokens: vec![TOKEN.to_string()],
        crypto_key: Some(vec![42u8; 32]),
        ..Default::default()
    });

    let orchestrator = Arc::new(PublishOrchestrator::new(
        db.clone(),
        AssetResolver::new(Arc::new(HttpBlobStore::new(
            "https://unused.example.com".to_string(),
        ))),
        AccountResolver::new(db.clone(), common::test_key()),
        Arc::new(AlwaysPublish),
        3,
    ));
    let scanner = Arc::new(PeriodicScanner::new(
        db.clone(),
        orchestrator,
        config.scan.clone(),
    ));

    let state = AppState {
        db: db.clone(),
        config,
        queue: DispatchQueue::new(db.clone()),
        scanner,
    };

    (create_app(state), db)
}

fn authed(request: axum::http::request::Builder) -> axum::http::request::Builder {
    request
        .header(header::AUTHORIZATION, format!("Bearer {}", TOKEN))
        .header(header::CONTENT_TYPE, "application/json")
}

fn schedule_body(user_id: Uuid) -> Value {
    json!({
        "user_id": user_id,
        "asset_ref": "https://cdn.example.com/launch.jpg",
        "caption": "Launch day",
        "hashtags": ["spring"],
        "subtype": "photo",
        "scheduled_at_ms": 4_102_444_800_000i64,
        "display_datetime": "2100-01-01 09:00",
        "display_timezone": "Europe/Berlin"
    })
}

async fn read_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn scheduling_requires_a_bearer_token() {
    let (app, _db) = test_app().await;

    let response = app
        .oneshot(
            Request::post("/posts")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(schedule_body(Uuid::new_v4()).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn scheduling_creates_the_post_and_arms_the_job() {
    let (app, db) = test_app().await;
    let user = Uuid::new_v4();

    let response = app
        .oneshot(
            authed(Request::post("/posts"))
                .body(Body::from(schedule_body(user).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let body = read_json(response).await;
    let post_id: Uuid = body["id"].as_str().unwrap().parse().unwrap();

    let post = ScheduledPostRepository::new(db.clone())
        .find_by_id(post_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(post.status, PostStatus::Scheduled);
    assert_eq!(post.subtype, PostSubtype::Photo);
    assert_eq!(post.scheduled_at_ms, 4_102_444_800_000);

    // The delayed job fires at exactly the due instant.
    let job = DispatchJobRepository::new(db)
        .find_for_post(post_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(job.fire_at_ms, 4_102_444_800_000);
}

#[tokio::test]
async fn malformed_asset_references_are_rejected() {
    let (app, _db) = test_app().await;

    let mut body = schedule_body(Uuid::new_v4());
    body["asset_ref"] = json!("ftp://not-supported/file.png");

    let response = app
        .oneshot(
            authed(Request::post("/posts"))
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = read_json(response).await;
    assert_eq!(body["code"], "VALIDATION_FAILED");
}

#[tokio::test]
async fn status_endpoint_reflects_the_row() {
    let (app, db) = test_app().await;
    let post = common::seed_due_post(
        &db,
        Uuid::new_v4(),
        "https://cdn.example.com/a.jpg",
        PostSubtype::Photo,
    )
    .await;

    let response = app
        .oneshot(
            authed(Request::get(format!("/posts/{}", post.id)))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["state"], "scheduled");
    assert_eq!(body["attempts"], 0);
    assert!(body["media_id"].is_null());
}

#[tokio::test]
async fn unknown_posts_return_404() {
    let (app, _db) = test_app().await;

    let response = app
        .oneshot(
            authed(Request::get(format!("/posts/{}", Uuid::new_v4())))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn cancel_flips_state_and_removes_the_job() {
    let (app, db) = test_app().await;
    let post = common::seed_due_post(
        &db,
        Uuid::new_v4(),
        "https://cdn.example.com/a.jpg",
        PostSubtype::Photo,
    )
    .await;
    DispatchQueue::new(db.clone())
        .schedule(post.id, post.scheduled_at_ms)
        .await
        .unwrap();

    let response = app
        .clone()
        .oneshot(
            authed(Request::delete(format!("/posts/{}", post.id)))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["state"], "cancelled");

    assert!(
        DispatchJobRepository::new(db.clone())
            .find_for_post(post.id)
            .await
            .unwrap()
            .is_none()
    );

    // Cancelling again is a no-op, not an error.
    let response = app
        .oneshot(
            authed(Request::delete(format!("/posts/{}", post.id)))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn cancelling_a_mid_publish_post_conflicts() {
    let (app, db) = test_app().await;
    let post = common::seed_due_post(
        &db,
        Uuid::new_v4(),
        "https://cdn.example.com/a.jpg",
        PostSubtype::Photo,
    )
    .await;

    // Simulate a trigger holding the claim.
    ScheduledPostRepository::new(db.clone())
        .claim_for_publish(post.id)
        .await
        .unwrap()
        .unwrap();

    let response = app
        .oneshot(
            authed(Request::delete(format!("/posts/{}", post.id)))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn reschedule_moves_the_post_and_its_job() {
    let (app, db) = test_app().await;
    let post = common::seed_due_post(
        &db,
        Uuid::new_v4(),
        "https://cdn.example.com/a.jpg",
        PostSubtype::Photo,
    )
    .await;
    DispatchQueue::new(db.clone())
        .schedule(post.id, post.scheduled_at_ms)
        .await
        .unwrap();

    let response = app
        .oneshot(
            authed(Request::post(format!("/posts/{}/reschedule", post.id)))
                .body(Body::from(
                    json!({ "scheduled_at_ms": 4_102_444_800_000i64 }).to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let stored = ScheduledPostRepository::new(db.clone())
        .find_by_id(post.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.scheduled_at_ms, 4_102_444_800_000);

    let job = DispatchJobRepository::new(db)
        .find_for_post(post.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(job.fire_at_ms, 4_102_444_800_000);
}

#[tokio::test]
async fn manual_scan_publishes_due_posts() {
    let (app, db) = test_app().await;
    let user = Uuid::new_v4();
    common::seed_account(&db, Some(user), None).await;
    common::seed_due_post(
        &db,
        user,
        "https://cdn.example.com/a.jpg",
        PostSubtype::Photo,
    )
    .await;

    let response = app
        .oneshot(
            authed(Request::post("/internal/scan"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["due_seen"], 1);
    assert_eq!(body["published"], 1);
}

#[tokio::test]
async fn health_and_root_are_public() {
    let (app, _db) = test_app().await;

    let response = app
        .clone()
        .oneshot(Request::get("/healthz").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(Request::get("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["service"], "publisher");
}
