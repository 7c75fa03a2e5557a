use std::path::{Path, PathBuf};

use crate::traits::{BlobStore, PublishError, UploadOptions};

/// Mirrors uploads into `{root}/{bucket}/{key}`. Used for dry runs.
#[derive(Clone, Debug)]
pub struct DirBlobStore {
    pub root: PathBuf,
}

impl DirBlobStore {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }
}

impl BlobStore for DirBlobStore {
    fn upload(&self, local_path: &Path, bucket: &str, key: &str, _options: &UploadOptions) -> Result<(), PublishError> {
        if key.split('/').any(|c| c == "..") {
            return Err(PublishError::Upload { key: key.into(), reason: "key escapes bucket".into() });
        }
        let dest = self.root.join(bucket).join(key);
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::copy(local_path, &dest)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn copies_under_bucket_and_key() {
        let src = tempdir().unwrap();
        let dst = tempdir().unwrap();
        let f = src.path().join("badge.svg");
        std::fs::write(&f, "<svg/>").unwrap();

        let store = DirBlobStore::new(dst.path().to_path_buf());
        store.upload(&f, "ci", "img/latest/badge.svg", &UploadOptions::public("image/svg+xml")).unwrap();
        assert!(dst.path().join("ci/img/latest/badge.svg").is_file());
        assert!(store.upload(&f, "ci", "../x", &UploadOptions::public("x")).is_err());
    }
}
