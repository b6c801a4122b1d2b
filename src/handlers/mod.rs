//! # API Handlers
//!
//! This module contains all the HTTP endpoint handlers for the
//! publishing service.

use crate::models::ServiceInfo;
use axum::response::Json;

pub mod posts;
pub mod scan;

/// Root handler that returns basic service information
#[utoipa::path(
    get,
    path = "/",
    responses(
        (status = 200, description = "Service information", body = ServiceInfo)
    ),
    tag = "root"
)]
pub async fn root() -> Json<ServiceInfo> {
    Json(ServiceInfo::default())
}
