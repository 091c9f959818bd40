use std::{
    collections::HashMap,
    fs,
    path::{Component, Path, PathBuf},
};

use parking_lot::Mutex;

use super::StorageError;

/// Bucket/key object store holding published models.
pub trait ModelStore: Send + Sync {
    /// Whether an object exists under `key`.
    fn exists(&self, bucket: &str, key: &str) -> Result<bool, StorageError>;

    /// Fetches the bytes stored under `key`.
    fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StorageError>;

    /// Uploads a local file, overwriting any object under `key`.
    fn upload_file(&self, from: &Path, bucket: &str, key: &str) -> Result<(), StorageError>;
}

fn check_key(key: &str) -> Result<(), StorageError> {
    let path = Path::new(key);
    let valid = !key.is_empty()
        && path
            .components()
            .all(|component| matches!(component, Component::Normal(_)));
    if valid {
        Ok(())
    } else {
        Err(StorageError::InvalidKey(key.to_string()))
    }
}

/// Store backed by a local directory: `<root>/<bucket>/<key>`.
#[derive(Debug, Clone)]
pub struct LocalBucketStore {
    root: PathBuf,
}

impl LocalBucketStore {
    /// Creates a store rooted at `root`. Directories are created on upload.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Filesystem location of an object.
    pub fn object_path(&self, bucket: &str, key: &str) -> Result<PathBuf, StorageError> {
        check_key(bucket)?;
        check_key(key)?;
        Ok(self.root.join(bucket).join(key))
    }
}

impl ModelStore for LocalBucketStore {
    fn exists(&self, bucket: &str, key: &str) -> Result<bool, StorageError> {
        Ok(self.object_path(bucket, key)?.is_file())
    }

    fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.object_path(bucket, key)?;
        if !path.is_file() {
            return Err(StorageError::NotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            });
        }
        fs::read(&path).map_err(|source| StorageError::Io { path, source })
    }

    fn upload_file(&self, from: &Path, bucket: &str, key: &str) -> Result<(), StorageError> {
        let target = self.object_path(bucket, key)?;
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|source| StorageError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        fs::copy(from, &target).map_err(|source| StorageError::Io {
            path: from.to_path_buf(),
            source,
        })?;
        Ok(())
    }
}

/// In-memory store that counts uploads.
#[derive(Debug, Default)]
pub struct MemoryModelStore {
    objects: Mutex<HashMap<(String, String), Vec<u8>>>,
    uploads: Mutex<usize>,
}

impl MemoryModelStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds an object without counting it as an upload.
    pub fn insert(&self, bucket: &str, key: &str, bytes: Vec<u8>) {
        self.objects
            .lock()
            .insert((bucket.to_string(), key.to_string()), bytes);
    }

    /// Number of `upload_file` calls that succeeded.
    #[must_use]
    pub fn upload_count(&self) -> usize {
        *self.uploads.lock()
    }
}

impl ModelStore for MemoryModelStore {
    fn exists(&self, bucket: &str, key: &str) -> Result<bool, StorageError> {
        Ok(self
            .objects
            .lock()
            .contains_key(&(bucket.to_string(), key.to_string())))
    }

    fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StorageError> {
        self.objects
            .lock()
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
            .ok_or_else(|| StorageError::NotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            })
    }

    fn upload_file(&self, from: &Path, bucket: &str, key: &str) -> Result<(), StorageError> {
        check_key(key)?;
        let bytes = fs::read(from).map_err(|source| StorageError::Io {
            path: from.to_path_buf(),
            source,
        })?;
        self.insert(bucket, key, bytes);
        *self.uploads.lock() += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn local_store_uploads_and_fetches() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("model.json");
        fs::write(&source, b"{}").unwrap();
        let store = LocalBucketStore::new(dir.path().join("store"));
        assert!(!store.exists("usvisa-model2024", "model-registry/model.json").unwrap());
        store
            .upload_file(&source, "usvisa-model2024", "model-registry/model.json")
            .unwrap();
        assert!(store.exists("usvisa-model2024", "model-registry/model.json").unwrap());
        assert_eq!(
            store.get_object("usvisa-model2024", "model-registry/model.json").unwrap(),
            b"{}"
        );
        assert!(dir
            .path()
            .join("store/usvisa-model2024/model-registry/model.json")
            .is_file());
    }

    #[test]
    fn local_store_rejects_escaping_keys() {
        let store = LocalBucketStore::new("store");
        assert!(matches!(
            store.exists("bucket", "../outside.json"),
            Err(StorageError::InvalidKey(_))
        ));
        assert!(matches!(
            store.get_object("bucket", "missing.json"),
            Err(StorageError::NotFound { .. })
        ));
    }

    #[test]
    fn memory_store_counts_uploads() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("model.json");
        fs::write(&source, b"model").unwrap();
        let store = MemoryModelStore::new();
        store.insert("b", "seeded", Vec::new());
        assert_eq!(store.upload_count(), 0);
        store.upload_file(&source, "b", "k").unwrap();
        store.upload_file(&source, "b", "k").unwrap();
        assert_eq!(store.upload_count(), 2);
        assert_eq!(store.get_object("b", "k").unwrap(), b"model");
    }
}
