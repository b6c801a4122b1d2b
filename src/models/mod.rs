//! # Data Models
//!
//! This module contains all the data models used throughout the
//! publishing service.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub mod account;
pub mod dispatch_job;
pub mod scheduled_post;

pub use account::Entity as Account;
pub use dispatch_job::Entity as DispatchJob;
pub use scheduled_post::Entity as ScheduledPost;

/// Basic service information response
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ServiceInfo {
    /// The name of the service
    pub service: String,
    /// The version of the service
    pub version: String,
}

impl Default for ServiceInfo {
    fn default() -> Self {
        Self {
            service: "publisher".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}
