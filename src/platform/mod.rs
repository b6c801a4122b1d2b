//! Publish platform integration.
//!
//! Wraps the external platform's three-step publish protocol (create
//! container, poll status, publish container) behind a single
//! [`PublishApi::publish`] call. Only the Instagram-style graph protocol
//! is modeled; other platforms are out of scope.

pub mod caption;
pub mod error;
pub mod extract;
pub mod graph;

pub use error::PublishError;
pub use graph::GraphPublishClient;

use async_trait::async_trait;
use url::Url;

use crate::accounts::Credential;
use crate::models::scheduled_post::PostSubtype;

/// One fully resolved publish request: the asset is already a fetchable
/// URL and the caption already carries its hashtags.
#[derive(Debug, Clone)]
pub struct PublishRequest {
    pub asset_url: Url,
    pub caption: String,
    pub subtype: PostSubtype,
}

/// Contract for the external publish platform.
#[async_trait]
pub trait PublishApi: Send + Sync {
    /// Publish an asset and return the platform media id.
    async fn publish(
        &self,
        request: &PublishRequest,
        credential: &Credential,
    ) -> Result<String, PublishError>;
}
