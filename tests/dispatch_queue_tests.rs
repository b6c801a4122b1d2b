//! Integration tests for the durable dispatch job store.

mod common;

use chrono::Utc;
use uuid::Uuid;

use publisher::dispatch::DispatchQueue;
use publisher::models::scheduled_post::PostSubtype;
use publisher::repositories::DispatchJobRepository;

#[tokio::test]
async fn reschedule_upserts_instead_of_stacking_jobs() {
    let db = common::memory_db().await;
    let post = common::seed_due_post(
        &db,
        Uuid::new_v4(),
        "https://cdn.example.com/a.jpg",
        PostSubtype::Photo,
    )
    .await;

    let queue = DispatchQueue::new(db.clone());
    queue.schedule(post.id, 1_000).await.unwrap();
    queue.schedule(post.id, 2_000).await.unwrap();

    let jobs = DispatchJobRepository::new(db);
    let job = jobs.find_for_post(post.id).await.unwrap().unwrap();
    assert_eq!(job.fire_at_ms, 2_000);

    // Exactly one visible job per post.
    let due = jobs.find_due(10_000, 10).await.unwrap();
    assert_eq!(due.len(), 1);
}

#[tokio::test]
async fn cancel_removes_the_job_and_is_idempotent() {
    let db = common::memory_db().await;
    let post = common::seed_due_post(
        &db,
        Uuid::new_v4(),
        "https://cdn.example.com/a.jpg",
        PostSubtype::Photo,
    )
    .await;

    let queue = DispatchQueue::new(db.clone());
    queue.schedule(post.id, 1_000).await.unwrap();
    queue.cancel(post.id).await.unwrap();
    queue.cancel(post.id).await.unwrap();

    let jobs = DispatchJobRepository::new(db);
    assert!(jobs.find_for_post(post.id).await.unwrap().is_none());
}

#[tokio::test]
async fn due_jobs_are_ordered_and_bounded() {
    let db = common::memory_db().await;
    let queue = DispatchQueue::new(db.clone());

    let mut post_ids = Vec::new();
    for fire_at in [3_000i64, 1_000, 2_000, 9_999_999_999_999] {
        let post = common::seed_due_post(
            &db,
            Uuid::new_v4(),
            "https://cdn.example.com/a.jpg",
            PostSubtype::Photo,
        )
        .await;
        queue.schedule(post.id, fire_at).await.unwrap();
        post_ids.push((post.id, fire_at));
    }

    let jobs = DispatchJobRepository::new(db);
    let due = jobs.find_due(5_000, 10).await.unwrap();

    let fire_ats: Vec<i64> = due.iter().map(|job| job.fire_at_ms).collect();
    assert_eq!(fire_ats, vec![1_000, 2_000, 3_000]);

    let limited = jobs.find_due(5_000, 2).await.unwrap();
    assert_eq!(limited.len(), 2);
}

#[tokio::test]
async fn a_job_is_consumed_exactly_once() {
    let db = common::memory_db().await;
    let post = common::seed_due_post(
        &db,
        Uuid::new_v4(),
        "https://cdn.example.com/a.jpg",
        PostSubtype::Photo,
    )
    .await;

    let queue = DispatchQueue::new(db.clone());
    queue
        .schedule(post.id, Utc::now().timestamp_millis() - 1)
        .await
        .unwrap();

    let jobs = DispatchJobRepository::new(db);
    let job = jobs.find_for_post(post.id).await.unwrap().unwrap();

    assert!(jobs.consume(job.id).await.unwrap());
    // A second worker racing on the same row loses the delete.
    assert!(!jobs.consume(job.id).await.unwrap());
}
