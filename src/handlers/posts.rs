//! # Posts API Handlers
//!
//! Handlers for scheduling, inspecting, rescheduling and cancelling
//! scheduled posts. These endpoints are the surface consumed by the web
//! application; the dispatch triggers do their work behind them.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::assets::AssetRef;
use crate::auth::OperatorAuth;
use crate::error::{ApiError, conflict, not_found, validation_error};
use crate::models::scheduled_post::{Model as ScheduledPost, PostStatus, PostSubtype};
use crate::repositories::{NewScheduledPost, ScheduledPostRepository};
use crate::server::AppState;

/// Platform caption limit, enforced before the platform can reject it.
const MAX_CAPTION_CHARS: usize = 2200;
/// Platform hashtag limit per post.
const MAX_HASHTAGS: usize = 30;
const MAX_LIST_LIMIT: u64 = 100;

/// Request payload for scheduling a post
#[derive(Debug, Deserialize, ToSchema)]
pub struct SchedulePostRequest {
    /// Owning user
    pub user_id: Uuid,
    /// Owning organization for shared posts
    pub organization_id: Option<Uuid>,
    /// Asset reference: http(s) URL or base64 data URI
    pub asset_ref: String,
    /// Caption text
    #[serde(default)]
    pub caption: String,
    /// Hashtags appended at publish time
    #[serde(default)]
    pub hashtags: Vec<String>,
    /// Content subtype (photo, reel, story)
    pub subtype: PostSubtype,
    /// Due instant, integer epoch millis
    pub scheduled_at_ms: i64,
    /// Human-readable date/time, display only
    pub display_datetime: Option<String>,
    /// Human-readable timezone, display only
    pub display_timezone: Option<String>,
    /// Explicit account to publish with
    pub target_account_id: Option<Uuid>,
}

/// Request payload for rescheduling a post
#[derive(Debug, Deserialize, ToSchema)]
pub struct ReschedulePostRequest {
    /// New due instant, integer epoch millis
    pub scheduled_at_ms: i64,
    /// Human-readable date/time, display only
    pub display_datetime: Option<String>,
    /// Human-readable timezone, display only
    pub display_timezone: Option<String>,
}

/// Query parameters for listing posts
#[derive(Debug, Deserialize)]
pub struct ListPostsQuery {
    /// Filter by owning user
    pub user_id: Option<Uuid>,
    /// Filter by owning organization
    pub organization_id: Option<Uuid>,
    /// Filter by lifecycle state
    pub status: Option<PostStatus>,
    /// Maximum number of posts to return (default: 50, max: 100)
    pub limit: Option<u64>,
}

/// Post status response
#[derive(Debug, Serialize, ToSchema)]
pub struct PostStatusResponse {
    /// Post identifier
    pub id: Uuid,
    /// Lifecycle state
    pub state: PostStatus,
    /// Publish attempts made so far
    pub attempts: i32,
    /// Last failure reason, if any
    pub error: Option<String>,
    /// Platform media id once published
    pub media_id: Option<String>,
    /// Due instant, epoch millis
    pub scheduled_at_ms: i64,
    /// Confirmed publish timestamp (RFC3339)
    pub published_at: Option<String>,
}

/// Response payload for the posts listing endpoint
#[derive(Debug, Serialize, ToSchema)]
pub struct PostsResponse {
    /// Posts matching the query
    pub posts: Vec<PostStatusResponse>,
}

/// Creation response carrying the new post id
#[derive(Debug, Serialize, ToSchema)]
pub struct PostCreatedResponse {
    /// Identifier of the scheduled post
    pub id: Uuid,
}

impl From<ScheduledPost> for PostStatusResponse {
    fn from(model: ScheduledPost) -> Self {
        Self {
            id: model.id,
            state: model.status,
            attempts: model.publish_attempts,
            error: model.error_message,
            media_id: model.platform_media_id,
            scheduled_at_ms: model.scheduled_at_ms,
            published_at: model.published_at.map(|dt| dt.to_rfc3339()),
        }
    }
}

fn validate_schedule_request(request: &SchedulePostRequest) -> Result<(), ApiError> {
    if let Err(err) = AssetRef::parse(&request.asset_ref) {
        return Err(validation_error(
            "Invalid asset reference",
            serde_json::json!({ "asset_ref": err.to_string() }),
        ));
    }

    if request.caption.chars().count() > MAX_CAPTION_CHARS {
        return Err(validation_error(
            "Caption too long",
            serde_json::json!({ "caption": format!("Must not exceed {} characters", MAX_CAPTION_CHARS) }),
        ));
    }

    if request.hashtags.len() > MAX_HASHTAGS {
        return Err(validation_error(
            "Too many hashtags",
            serde_json::json!({ "hashtags": format!("Must not exceed {} entries", MAX_HASHTAGS) }),
        ));
    }

    if request.scheduled_at_ms <= 0 {
        return Err(validation_error(
            "Invalid schedule instant",
            serde_json::json!({ "scheduled_at_ms": "Must be a positive epoch-millis instant" }),
        ));
    }

    Ok(())
}

/// Schedule a post for future publishing
#[utoipa::path(
    post,
    path = "/posts",
    security(("bearer_auth" = [])),
    request_body = SchedulePostRequest,
    responses(
        (status = 201, description = "Post scheduled", body = PostCreatedResponse),
        (status = 400, description = "Invalid payload", body = ApiError),
        (status = 401, description = "Missing or invalid bearer token", body = ApiError)
    ),
    tag = "posts"
)]
pub async fn schedule_post(
    State(state): State<AppState>,
    _operator_auth: OperatorAuth,
    Json(request): Json<SchedulePostRequest>,
) -> Result<(StatusCode, Json<PostCreatedResponse>), ApiError> {
    validate_schedule_request(&request)?;

    let repo = ScheduledPostRepository::new(state.db.clone());
    let post = repo
        .create(NewScheduledPost {
            user_id: request.user_id,
            organization_id: request.organization_id,
            asset_ref: request.asset_ref,
            caption: request.caption,
            hashtags: request.hashtags,
            subtype: request.subtype,
            scheduled_at_ms: request.scheduled_at_ms,
            display_datetime: request.display_datetime,
            display_timezone: request.display_timezone,
            target_account_id: request.target_account_id,
        })
        .await?;

    // Arm the precise trigger; the periodic scanner covers us if the job
    // store is unavailable right now.
    state
        .queue
        .schedule_best_effort(post.id, post.scheduled_at_ms)
        .await;

    tracing::info!(
        post_id = %post.id,
        scheduled_at_ms = post.scheduled_at_ms,
        "Post scheduled"
    );

    Ok((StatusCode::CREATED, Json(PostCreatedResponse { id: post.id })))
}

/// Get the status of a scheduled post
#[utoipa::path(
    get,
    path = "/posts/{id}",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Post identifier")),
    responses(
        (status = 200, description = "Post status", body = PostStatusResponse),
        (status = 404, description = "Unknown post", body = ApiError)
    ),
    tag = "posts"
)]
pub async fn get_post_status(
    State(state): State<AppState>,
    _operator_auth: OperatorAuth,
    Path(id): Path<Uuid>,
) -> Result<Json<PostStatusResponse>, ApiError> {
    let repo = ScheduledPostRepository::new(state.db.clone());
    let post = repo
        .find_by_id(id)
        .await?
        .ok_or_else(|| not_found("Post not found"))?;

    Ok(Json(post.into()))
}

/// List posts for operator views
#[utoipa::path(
    get,
    path = "/posts",
    security(("bearer_auth" = [])),
    params(
        ("user_id" = Option<Uuid>, Query, description = "Filter by owning user"),
        ("organization_id" = Option<Uuid>, Query, description = "Filter by owning organization"),
        ("status" = Option<String>, Query, description = "Filter by lifecycle state"),
        ("limit" = Option<u64>, Query, description = "Maximum number of posts (default 50, max 100)")
    ),
    responses(
        (status = 200, description = "Matching posts", body = PostsResponse),
        (status = 400, description = "Invalid query parameters", body = ApiError)
    ),
    tag = "posts"
)]
pub async fn list_posts(
    State(state): State<AppState>,
    _operator_auth: OperatorAuth,
    Query(params): Query<ListPostsQuery>,
) -> Result<Json<PostsResponse>, ApiError> {
    let limit = params.limit.unwrap_or(50);
    if limit > MAX_LIST_LIMIT {
        return Err(validation_error(
            "Invalid limit",
            serde_json::json!({ "limit": format!("Maximum allowed limit is {}", MAX_LIST_LIMIT) }),
        ));
    }

    let repo = ScheduledPostRepository::new(state.db.clone());
    let posts = repo
        .list(params.user_id, params.organization_id, params.status, limit)
        .await?;

    Ok(Json(PostsResponse {
        posts: posts.into_iter().map(Into::into).collect(),
    }))
}

/// Cancel a scheduled post
///
/// Idempotent: cancelling an already-terminal post is a no-op. A post
/// mid-publish cannot be cancelled; cancellation only prevents future
/// attempts.
#[utoipa::path(
    delete,
    path = "/posts/{id}",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Post identifier")),
    responses(
        (status = 200, description = "Post cancelled or already terminal", body = PostStatusResponse),
        (status = 404, description = "Unknown post", body = ApiError),
        (status = 409, description = "Post is mid-publish", body = ApiError)
    ),
    tag = "posts"
)]
pub async fn cancel_post(
    State(state): State<AppState>,
    _operator_auth: OperatorAuth,
    Path(id): Path<Uuid>,
) -> Result<Json<PostStatusResponse>, ApiError> {
    let repo = ScheduledPostRepository::new(state.db.clone());

    repo.find_by_id(id)
        .await?
        .ok_or_else(|| not_found("Post not found"))?;

    if repo.cancel_if_scheduled(id).await? {
        // The pending claim will now fail; drop the delayed job so the
        // worker never even tries.
        state.queue.cancel(id).await?;
        tracing::info!(post_id = %id, "Post cancelled");
    }

    let post = repo
        .find_by_id(id)
        .await?
        .ok_or_else(|| not_found("Post not found"))?;

    if post.status == PostStatus::Publishing {
        return Err(conflict("Post is being published and cannot be cancelled"));
    }
    // Terminal states fall through: cancel is an idempotent no-op there.

    Ok(Json(post.into()))
}

/// Move a scheduled post to a new due instant
#[utoipa::path(
    post,
    path = "/posts/{id}/reschedule",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Post identifier")),
    request_body = ReschedulePostRequest,
    responses(
        (status = 200, description = "Post rescheduled", body = PostStatusResponse),
        (status = 404, description = "Unknown post", body = ApiError),
        (status = 409, description = "Post is no longer scheduled", body = ApiError)
    ),
    tag = "posts"
)]
pub async fn reschedule_post(
    State(state): State<AppState>,
    _operator_auth: OperatorAuth,
    Path(id): Path<Uuid>,
    Json(request): Json<ReschedulePostRequest>,
) -> Result<Json<PostStatusResponse>, ApiError> {
    if request.scheduled_at_ms <= 0 {
        return Err(validation_error(
            "Invalid schedule instant",
            serde_json::json!({ "scheduled_at_ms": "Must be a positive epoch-millis instant" }),
        ));
    }

    let repo = ScheduledPostRepository::new(state.db.clone());

    repo.find_by_id(id)
        .await?
        .ok_or_else(|| not_found("Post not found"))?;

    let moved = repo
        .reschedule_if_scheduled(
            id,
            request.scheduled_at_ms,
            request.display_datetime,
            request.display_timezone,
        )
        .await?;

    if !moved {
        return Err(conflict("Post is no longer scheduled"));
    }

    state
        .queue
        .schedule_best_effort(id, request.scheduled_at_ms)
        .await;

    tracing::info!(
        post_id = %id,
        scheduled_at_ms = request.scheduled_at_ms,
        "Post rescheduled"
    );

    let post = repo
        .find_by_id(id)
        .await?
        .ok_or_else(|| not_found("Post not found"))?;
    Ok(Json(post.into()))
}
