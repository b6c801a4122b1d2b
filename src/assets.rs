//! Asset resolution.
//!
//! Guarantees any asset reference handed to the publish protocol client is
//! a fetchable HTTP URL. References are either passed through (already
//! http/https) or decoded from an inline data URI and uploaded to durable
//! storage. Calling resolve twice on the same inline payload stores two
//! copies; the store is not expected to deduplicate.

use std::sync::Arc;

use base64::Engine;
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::storage::{BlobStore, StorageError};

/// Errors from asset resolution; each consumes one publish attempt.
#[derive(Debug, Error)]
pub enum AssetError {
    #[error("unsupported asset format: {0}")]
    UnsupportedFormat(String),
    #[error("asset URL is invalid: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("inline payload is not valid base64: {0}")]
    Decode(#[from] base64::DecodeError),
    #[error("asset upload failed: {0}")]
    Upload(#[from] StorageError),
}

/// Parsed shape of an asset reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetRef {
    /// Already a fetchable http(s) URL.
    Http(Url),
    /// Inline base64 payload with a media-type tag.
    Inline { mime_type: String, payload: String },
}

impl AssetRef {
    /// Parse a raw reference string into one of the supported shapes.
    pub fn parse(raw: &str) -> Result<Self, AssetError> {
        let trimmed = raw.trim();

        if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
            return Ok(AssetRef::Http(Url::parse(trimmed)?));
        }

        if let Some(rest) = trimmed.strip_prefix("data:") {
            // data:<mime>;base64,<payload>
            if let Some((header, payload)) = rest.split_once(',') {
                if let Some(mime_type) = header.strip_suffix(";base64") {
                    return Ok(AssetRef::Inline {
                        mime_type: mime_type.to_string(),
                        payload: payload.to_string(),
                    });
                }
            }
            return Err(AssetError::UnsupportedFormat(
                "data URI without base64 encoding".to_string(),
            ));
        }

        Err(AssetError::UnsupportedFormat(preview(trimmed)))
    }
}

fn preview(raw: &str) -> String {
    if raw.chars().count() > 40 {
        let truncated: String = raw.chars().take(40).collect();
        format!("{}...", truncated)
    } else {
        raw.to_string()
    }
}

/// Resolves asset references to fetchable HTTP URLs, uploading inline
/// payloads on demand.
#[derive(Clone)]
pub struct AssetResolver {
    store: Arc<dyn BlobStore>,
}

impl AssetResolver {
    pub fn new(store: Arc<dyn BlobStore>) -> Self {
        Self { store }
    }

    /// Resolve a raw reference to an HTTP URL, uploading inline payloads.
    pub async fn resolve(&self, raw: &str) -> Result<Url, AssetError> {
        match AssetRef::parse(raw)? {
            AssetRef::Http(url) => Ok(url),
            AssetRef::Inline { mime_type, payload } => {
                let bytes = base64::engine::general_purpose::STANDARD.decode(payload.as_bytes())?;
                debug!(
                    mime_type = %mime_type,
                    size = bytes.len(),
                    "Uploading inline asset payload"
                );
                Ok(self.store.upload(bytes, &mime_type).await?)
            }
        }
    }
}
