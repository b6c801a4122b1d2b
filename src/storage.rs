//! Durable blob storage client.
//!
//! The publish platform only accepts fetchable HTTP URLs, so inline
//! payloads are uploaded here first. The store is an external
//! collaborator; this module carries only its contract and a thin
//! reqwest-backed client against a public-read object host.

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::debug;
use url::Url;

/// Errors from blob storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("upload failed with status {status}: {body}")]
    UploadRejected { status: u16, body: String },
    #[error("storage request failed: {0}")]
    Network(#[from] reqwest::Error),
    #[error("invalid storage URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

/// Contract for durable, public-read object storage.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Upload bytes under a content-derived key and return the public URL.
    async fn upload(&self, bytes: Vec<u8>, mime_type: &str) -> Result<Url, StorageError>;
}

/// Blob store client that PUTs objects to a public-read HTTP host.
pub struct HttpBlobStore {
    http: reqwest::Client,
    base_url: String,
}

impl HttpBlobStore {
    pub fn new(base_url: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Object key derived from the content hash, so re-uploads of the
    /// same bytes land on the same URL.
    fn object_key(bytes: &[u8], mime_type: &str) -> String {
        let digest = hex::encode(Sha256::digest(bytes));
        format!("{}.{}", digest, extension_for(mime_type))
    }
}

fn extension_for(mime_type: &str) -> &str {
    match mime_type {
        "image/jpeg" | "image/jpg" => "jpg",
        "image/png" => "png",
        "image/gif" => "gif",
        "image/webp" => "webp",
        "video/mp4" => "mp4",
        "video/quicktime" => "mov",
        _ => "bin",
    }
}

#[async_trait]
impl BlobStore for HttpBlobStore {
    async fn upload(&self, bytes: Vec<u8>, mime_type: &str) -> Result<Url, StorageError> {
        let key = Self::object_key(&bytes, mime_type);
        let target = format!("{}/{}", self.base_url, key);

        let response = self
            .http
            .put(&target)
            .header("content-type", mime_type)
            .body(bytes)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StorageError::UploadRejected {
                status: status.as_u16(),
                body,
            });
        }

        debug!(key = %key, "Uploaded asset to blob store");
        Ok(Url::parse(&target)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_key_is_content_addressed() {
        let key_a = HttpBlobStore::object_key(b"same bytes", "image/png");
        let key_b = HttpBlobStore::object_key(b"same bytes", "image/png");
        let key_c = HttpBlobStore::object_key(b"other bytes", "image/png");

        assert_eq!(key_a, key_b);
        assert_ne!(key_a, key_c);
        assert!(key_a.ends_with(".png"));
    }

    #[test]
    fn unknown_mime_falls_back_to_bin() {
        assert_eq!(extension_for("application/x-thing"), "bin");
        assert_eq!(extension_for("video/mp4"), "mp4");
    }
}
