//! Publish protocol error types.
//!
//! Every variant here is a per-attempt failure at the orchestrator level:
//! all of them consume one unit of the post's retry budget and their
//! rendering is persisted on the post for operator visibility. No
//! transient/permanent distinction is made at the budget level.

use thiserror::Error;

/// Errors from the three-step publish protocol.
#[derive(Debug, Error)]
pub enum PublishError {
    /// The container-create response carried no recognizable id field.
    #[error("platform returned no container id")]
    ContainerCreationFailed,

    /// The platform refused the media; the container is unusable.
    #[error("platform rejected the media container")]
    ContainerRejected,

    /// The container never left IN_PROGRESS within the polling bound.
    #[error("container status polling timed out after {polls} polls")]
    PublishTimeout { polls: u32 },

    /// The publish call returned no media id.
    #[error("platform returned no media id on publish")]
    PublishRejected,

    /// Platform rate limit (HTTP 429).
    #[error("platform rate limit hit{}", retry_after.map(|s| format!(" (retry after {}s)", s)).unwrap_or_default())]
    RateLimited { retry_after: Option<u64> },

    /// Credential rejected (HTTP 401).
    #[error("platform rejected the credential")]
    AuthFailed,

    /// Any other upstream HTTP error.
    #[error("platform API error {status}: {body}")]
    Api { status: u16, body: String },

    /// Transport-level failure reaching the platform.
    #[error("platform request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

impl PublishError {
    /// Classify a non-success upstream response.
    pub fn from_status(status: u16, body: String, retry_after: Option<u64>) -> Self {
        match status {
            429 => PublishError::RateLimited { retry_after },
            401 => PublishError::AuthFailed,
            _ => PublishError::Api { status, body },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_classification() {
        assert!(matches!(
            PublishError::from_status(429, String::new(), Some(30)),
            PublishError::RateLimited {
                retry_after: Some(30)
            }
        ));
        assert!(matches!(
            PublishError::from_status(401, String::new(), None),
            PublishError::AuthFailed
        ));
        assert!(matches!(
            PublishError::from_status(500, "oops".to_string(), None),
            PublishError::Api { status: 500, .. }
        ));
    }

    #[test]
    fn rate_limited_renders_retry_hint() {
        let rendered = PublishError::RateLimited {
            retry_after: Some(60),
        }
        .to_string();
        assert!(rendered.contains("60s"));
    }
}
