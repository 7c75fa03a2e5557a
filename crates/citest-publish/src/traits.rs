use std::path::Path;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("upload of {key} failed: {reason}")]
    Upload { key: String, reason: String },
    #[error("blob store unavailable: {0}")]
    Unavailable(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadOptions {
    pub content_type: String,
    pub acl: String,
    pub cache_control: String,
}

impl UploadOptions {
    pub fn public(content_type: impl Into<String>) -> Self {
        Self {
            content_type: content_type.into(),
            acl: "public-read".into(),
            cache_control: "no-cache".into(),
        }
    }
}

/// Object storage capability. Shared read-mostly handle, safe to call from any thread.
pub trait BlobStore: Send + Sync {
    fn upload(&self, local_path: &Path, bucket: &str, key: &str, options: &UploadOptions) -> Result<(), PublishError>;
}
