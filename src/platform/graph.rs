//! Graph-style publish client.
//!
//! Implements the platform's three-step publish protocol over HTTP:
//!
//! 1. `POST /{platform_user_id}/media` creates a media container from an
//!    asset URL and caption; subtypes alter the field set.
//! 2. `GET /{container_id}?fields=status_code` is polled at a fixed
//!    interval, bounded, until the container leaves `IN_PROGRESS`.
//! 3. `POST /{platform_user_id}/media_publish` publishes the container
//!    and yields the final media id.
//!
//! All requests authenticate with the account's bearer token.

use serde_json::{Value, json};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::accounts::Credential;
use crate::config::{AppConfig, PublishConfig};
use crate::models::scheduled_post::PostSubtype;
use crate::platform::{PublishApi, PublishRequest, error::PublishError, extract::extract_str};

/// Candidate id fields on the container-create response.
const CONTAINER_ID_FIELDS: &[&str] = &["id", "container_id", "media.id"];
/// Candidate status fields on the status response.
const STATUS_FIELDS: &[&str] = &["status_code", "status"];
/// Candidate id fields on the publish response.
const MEDIA_ID_FIELDS: &[&str] = &["id", "media_id", "post_id"];

const STATUS_IN_PROGRESS: &str = "IN_PROGRESS";
const STATUS_ERROR: &str = "ERROR";

/// Graph API client configuration
#[derive(Debug, Clone)]
pub struct GraphClientConfig {
    pub base_url: String,
    pub poll_interval: Duration,
    pub max_poll_attempts: u32,
}

impl GraphClientConfig {
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self::from_parts(&config.platform_api_base, &config.publish)
    }

    pub fn from_parts(base_url: &str, publish: &PublishConfig) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            poll_interval: Duration::from_millis(publish.poll_interval_ms),
            max_poll_attempts: publish.max_poll_attempts,
        }
    }
}

/// Publish client against the platform's graph API.
pub struct GraphPublishClient {
    http: reqwest::Client,
    config: GraphClientConfig,
}

impl GraphPublishClient {
    pub fn new(config: GraphClientConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    /// Step 1: create a media container, returning its opaque id.
    pub async fn create_container(
        &self,
        request: &PublishRequest,
        credential: &Credential,
    ) -> Result<String, PublishError> {
        let url = format!(
            "{}/{}/media",
            self.config.base_url, credential.platform_user_id
        );
        let body = container_fields(request);

        let response = self.post_json(&url, &body, credential).await?;

        extract_str(&response, CONTAINER_ID_FIELDS).ok_or_else(|| {
            warn!(response = %response, "Container response carried no recognizable id");
            PublishError::ContainerCreationFailed
        })
    }

    /// Step 2: poll container status until it leaves `IN_PROGRESS`.
    ///
    /// Transient polling errors are logged and retried within the same
    /// bound; they never consume the orchestrator's retry budget.
    pub async fn poll_until_ready(
        &self,
        container_id: &str,
        credential: &Credential,
    ) -> Result<(), PublishError> {
        let url = format!(
            "{}/{}?fields=status_code",
            self.config.base_url, container_id
        );

        for poll in 1..=self.config.max_poll_attempts {
            match self.get_json(&url, credential).await {
                Ok(response) => {
                    let status = extract_str(&response, STATUS_FIELDS)
                        .unwrap_or_else(|| STATUS_IN_PROGRESS.to_string());
                    debug!(container_id = %container_id, status = %status, poll, "Container status");

                    match status.as_str() {
                        STATUS_IN_PROGRESS => {}
                        STATUS_ERROR => return Err(PublishError::ContainerRejected),
                        _ => return Ok(()),
                    }
                }
                Err(err) => {
                    warn!(
                        container_id = %container_id,
                        poll,
                        error = %err,
                        "Status poll failed; retrying within bound"
                    );
                }
            }

            if poll < self.config.max_poll_attempts {
                tokio::time::sleep(self.config.poll_interval).await;
            }
        }

        Err(PublishError::PublishTimeout {
            polls: self.config.max_poll_attempts,
        })
    }

    /// Step 3: publish a ready container, returning the media id.
    pub async fn publish_container(
        &self,
        container_id: &str,
        credential: &Credential,
    ) -> Result<String, PublishError> {
        let url = format!(
            "{}/{}/media_publish",
            self.config.base_url, credential.platform_user_id
        );
        let body = json!({ "creation_id": container_id });

        let response = self.post_json(&url, &body, credential).await?;

        extract_str(&response, MEDIA_ID_FIELDS).ok_or_else(|| {
            warn!(response = %response, "Publish response carried no recognizable media id");
            PublishError::PublishRejected
        })
    }

    async fn post_json(
        &self,
        url: &str,
        body: &Value,
        credential: &Credential,
    ) -> Result<Value, PublishError> {
        let response = self
            .http
            .post(url)
            .bearer_auth(&credential.access_token)
            .json(body)
            .send()
            .await?;
        Self::read_json(response).await
    }

    async fn get_json(&self, url: &str, credential: &Credential) -> Result<Value, PublishError> {
        let response = self
            .http
            .get(url)
            .bearer_auth(&credential.access_token)
            .send()
            .await?;
        Self::read_json(response).await
    }

    async fn read_json(response: reqwest::Response) -> Result<Value, PublishError> {
        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse().ok());
            let body = response.text().await.unwrap_or_default();
            return Err(PublishError::from_status(status.as_u16(), body, retry_after));
        }
        Ok(response.json().await?)
    }
}

/// Container-create fields for each content subtype.
fn container_fields(request: &PublishRequest) -> Value {
    match request.subtype {
        PostSubtype::Photo => json!({
            "image_url": request.asset_url.as_str(),
            "caption": request.caption,
        }),
        PostSubtype::Reel => json!({
            "video_url": request.asset_url.as_str(),
            "media_type": "REELS",
            "caption": request.caption,
        }),
        // Stories carry no caption on this platform.
        PostSubtype::Story => json!({
            "image_url": request.asset_url.as_str(),
            "media_type": "STORIES",
        }),
    }
}

#[async_trait::async_trait]
impl PublishApi for GraphPublishClient {
    async fn publish(
        &self,
        request: &PublishRequest,
        credential: &Credential,
    ) -> Result<String, PublishError> {
        let container_id = self.create_container(request, credential).await?;
        info!(container_id = %container_id, subtype = ?request.subtype, "Created media container");

        self.poll_until_ready(&container_id, credential).await?;

        let media_id = self.publish_container(&container_id, credential).await?;
        info!(container_id = %container_id, media_id = %media_id, "Published container");

        Ok(media_id)
    }
}
