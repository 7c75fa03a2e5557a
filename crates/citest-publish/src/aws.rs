use std::path::Path;
use std::process::Command;

use tracing::debug;

use crate::traits::{BlobStore, PublishError, UploadOptions};

/// Uploads with `aws s3 cp`. Credentials are passed through the child's
/// environment only, never on the command line.
#[derive(Clone)]
pub struct AwsCliBlobStore {
    pub binary: String,
    pub region: String,
    pub endpoint_url: Option<String>,
    access_key: String,
    secret_key: String,
}

impl AwsCliBlobStore {
    pub fn new(region: impl Into<String>, endpoint_url: Option<String>, access_key: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            binary: "aws".into(),
            region: region.into(),
            endpoint_url,
            access_key: access_key.into(),
            secret_key: secret_key.into(),
        }
    }

    pub fn cp_args(&self, local_path: &Path, bucket: &str, key: &str, options: &UploadOptions) -> Vec<String> {
        let mut args = vec![
            "s3".to_string(),
            "cp".into(),
            local_path.display().to_string(),
            format!("s3://{bucket}/{key}"),
            "--acl".into(),
            options.acl.clone(),
            "--content-type".into(),
            options.content_type.clone(),
            "--cache-control".into(),
            options.cache_control.clone(),
            "--region".into(),
            self.region.clone(),
            "--only-show-errors".into(),
        ];
        if let Some(endpoint) = &self.endpoint_url {
            args.push("--endpoint-url".into());
            args.push(endpoint.clone());
        }
        args
    }
}

impl std::fmt::Debug for AwsCliBlobStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AwsCliBlobStore")
            .field("binary", &self.binary)
            .field("region", &self.region)
            .field("endpoint_url", &self.endpoint_url)
            .finish_non_exhaustive()
    }
}

impl BlobStore for AwsCliBlobStore {
    fn upload(&self, local_path: &Path, bucket: &str, key: &str, options: &UploadOptions) -> Result<(), PublishError> {
        let args = self.cp_args(local_path, bucket, key, options);
        debug!(?args, "uploading");
        let out = Command::new(&self.binary)
            .args(&args)
            .env("AWS_ACCESS_KEY_ID", &self.access_key)
            .env("AWS_SECRET_ACCESS_KEY", &self.secret_key)
            .output()
            .map_err(|e| PublishError::Unavailable(format!("{}: {e}", self.binary)))?;
        if !out.status.success() {
            return Err(PublishError::Upload {
                key: key.into(),
                reason: String::from_utf8_lossy(&out.stderr).trim().to_string(),
            });
        }
        Ok(())
    }
}
