use std::collections::HashSet;
use std::path::Path;
use std::sync::Mutex;

use crate::traits::{BlobStore, PublishError, UploadOptions};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Upload {
    pub bucket: String,
    pub key: String,
    pub options: UploadOptions,
    pub bytes: Vec<u8>,
}

/// In-memory blob store for tests. Keys listed in `fail_keys` are rejected.
#[derive(Default)]
pub struct InMemoryBlobStore {
    inner: Mutex<Vec<Upload>>,
    fail_keys: HashSet<String>,
}

impl InMemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on(keys: &[&str]) -> Self {
        Self { inner: Mutex::default(), fail_keys: keys.iter().map(|k| k.to_string()).collect() }
    }

    pub fn uploads(&self) -> Vec<Upload> {
        self.inner.lock().unwrap().clone()
    }

    pub fn keys(&self) -> Vec<String> {
        self.uploads().into_iter().map(|u| u.key).collect()
    }
}

impl BlobStore for InMemoryBlobStore {
    fn upload(&self, local_path: &Path, bucket: &str, key: &str, options: &UploadOptions) -> Result<(), PublishError> {
        if self.fail_keys.contains(key) {
            return Err(PublishError::Upload { key: key.into(), reason: "rejected".into() });
        }
        let bytes = std::fs::read(local_path)?;
        self.inner.lock().unwrap().push(Upload {
            bucket: bucket.into(),
            key: key.into(),
            options: options.clone(),
            bytes,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn records_uploads_and_rejects_listed_keys() {
        let dir = tempdir().unwrap();
        let f = dir.path().join("a.txt");
        std::fs::write(&f, "hello").unwrap();

        let store = InMemoryBlobStore::failing_on(&["img/latest/a.txt"]);
        store.upload(&f, "b", "img/1.0/a.txt", &UploadOptions::public("text/plain")).unwrap();
        assert!(store.upload(&f, "b", "img/latest/a.txt", &UploadOptions::public("text/plain")).is_err());

        let uploads = store.uploads();
        assert_eq!(uploads.len(), 1);
        assert_eq!(uploads[0].bytes, b"hello");
        assert_eq!(uploads[0].options.acl, "public-read");
    }
}
