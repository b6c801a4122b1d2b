//! # Scan API Handler
//!
//! The cron-equivalent entry point: the hosting environment hits this on
//! a timer to run one due-post sweep. It sits behind the same operator
//! bearer guard as everything else so it cannot be triggered publicly.

use axum::{extract::State, response::Json};

use crate::auth::OperatorAuth;
use crate::error::ApiError;
use crate::scanner::SweepStats;
use crate::server::AppState;

/// Run one due-post sweep immediately
#[utoipa::path(
    post,
    path = "/internal/scan",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Sweep completed", body = SweepStats),
        (status = 401, description = "Missing or invalid bearer token", body = ApiError),
        (status = 500, description = "Sweep failed", body = ApiError)
    ),
    tag = "internal"
)]
pub async fn run_scan(
    State(state): State<AppState>,
    _operator_auth: OperatorAuth,
) -> Result<Json<SweepStats>, ApiError> {
    let stats = state.scanner.sweep().await?;
    tracing::info!(
        due_seen = stats.due_seen,
        published = stats.published,
        retried = stats.retried,
        failed = stats.failed,
        "Manual scan completed"
    );
    Ok(Json(stats))
}
