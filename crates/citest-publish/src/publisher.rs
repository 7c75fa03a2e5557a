use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::traits::{BlobStore, PublishError, UploadOptions};

pub fn content_type_for(name: &str) -> &'static str {
    let lower = name.to_lowercase();
    let ext = lower.rsplit('.').next().unwrap_or_default();
    match ext {
        "html" => "text/html",
        "svg" => "image/svg+xml",
        "png" => "image/png",
        "md" => "text/markdown",
        "yml" | "yaml" => "text/yaml",
        "json" => "application/json",
        "log" | "txt" => "text/plain",
        _ => "application/octet-stream",
    }
}

#[derive(Clone, Debug)]
pub struct PublishTarget {
    pub bucket: String,
    pub image: String,
    pub meta_tag: String,
    pub release_tag: String,
}

impl PublishTarget {
    /// Pinned prefix first, then the release alias.
    pub fn prefixes(&self) -> [String; 2] {
        [
            format!("{}/{}", self.image, self.meta_tag),
            format!("{}/{}", self.image, self.release_tag),
        ]
    }
}

/// Uploads a finished output directory under both the pinned and the alias prefix.
pub struct Publisher<'a> {
    store: &'a dyn BlobStore,
    target: PublishTarget,
}

impl<'a> Publisher<'a> {
    pub fn new(store: &'a dyn BlobStore, target: PublishTarget) -> Self {
        Self { store, target }
    }

    fn upload_both(&self, path: &Path) -> Result<(), PublishError> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| PublishError::Upload { key: path.display().to_string(), reason: "not a file".into() })?;
        let options = UploadOptions::public(content_type_for(&name));
        for prefix in self.target.prefixes() {
            let key = format!("{prefix}/{name}");
            self.store.upload(path, &self.target.bucket, &key, &options)?;
        }
        Ok(())
    }

    /// Upload `files`, `index.html` first. Returns the number of objects written.
    pub fn publish(&self, files: &[PathBuf]) -> Result<usize, PublishError> {
        let mut ordered: Vec<&PathBuf> = files.iter().collect();
        ordered.sort_by_key(|p| p.file_name().map(|n| n != "index.html").unwrap_or(true));
        for path in &ordered {
            self.upload_both(path)?;
        }
        let count = ordered.len() * 2;
        info!(bucket = %self.target.bucket, objects = count, "report published");
        Ok(count)
    }

    /// Like [`publish`](Self::publish), but on failure tries to upload the
    /// diagnostic log before returning the original error.
    pub fn publish_with_diagnostics(&self, files: &[PathBuf], diagnostic_log: Option<&Path>) -> Result<usize, PublishError> {
        match self.publish(files) {
            Ok(n) => Ok(n),
            Err(e) => {
                if let Some(log) = diagnostic_log.filter(|p| p.is_file()) {
                    if let Err(le) = self.upload_both(log) {
                        warn!("diagnostic log upload failed: {le}");
                    }
                }
                Err(e)
            }
        }
    }
}
