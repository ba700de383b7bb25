//! Durable object store backed by a local directory tree.
//!
//! Objects live under `{root}/objects/{key}` and their metadata under
//! `{root}/meta/{key}.json`. Writes go to a temporary file in the target
//! directory and are renamed into place, so readers never observe a partially
//! written object.

use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use log::debug;
use tokio::fs;
use uuid::Uuid;

use super::{
    validate_relative_path, ObjectLookup, ObjectMetadata, ObjectStore, ObjectSummary,
    StorageError,
};

const OBJECTS_DIR: &str = "objects";
const META_DIR: &str = "meta";
const PARTIAL_PREFIX: &str = ".stratum-partial-";

/// Object store rooted at a local directory.
#[derive(Debug, Clone)]
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    /// Opens (creating if needed) a store rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let root = root.into();
        for dir in [OBJECTS_DIR, META_DIR] {
            std::fs::create_dir_all(root.join(dir)).map_err(|e| StorageError::Unavailable {
                reason: format!("cannot create store directory {}: {e}", root.display()),
            })?;
        }
        Ok(Self { root })
    }

    /// Root directory of the store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn objects_root(&self) -> PathBuf {
        self.root.join(OBJECTS_DIR)
    }

    fn object_path(&self, key: &str) -> Result<PathBuf, StorageError> {
        validate_relative_path(key.trim_end_matches('/'))?;
        Ok(self.objects_root().join(key))
    }

    fn meta_path(&self, key: &str) -> PathBuf {
        self.root.join(META_DIR).join(format!("{key}.json"))
    }

    fn ensure_reachable(&self) -> Result<(), StorageError> {
        if self.objects_root().is_dir() {
            Ok(())
        } else {
            Err(StorageError::Unavailable {
                reason: format!("store root {} is missing", self.root.display()),
            })
        }
    }

    fn key_for(&self, path: &Path) -> Option<String> {
        let relative = path.strip_prefix(self.objects_root()).ok()?;
        let parts: Vec<String> = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        Some(parts.join("/"))
    }

    async fn walk(&self, start: PathBuf) -> std::io::Result<Vec<(PathBuf, u64)>> {
        let mut pending = vec![start];
        let mut files = Vec::new();

        while let Some(dir) = pending.pop() {
            let mut entries = match fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(e),
            };

            while let Some(entry) = entries.next_entry().await? {
                let file_type = entry.file_type().await?;
                if file_type.is_dir() {
                    pending.push(entry.path());
                } else if file_type.is_file() {
                    if entry.file_name().to_string_lossy().starts_with(PARTIAL_PREFIX) {
                        continue;
                    }
                    let size = entry.metadata().await?.len();
                    files.push((entry.path(), size));
                }
            }
        }

        Ok(files)
    }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    async fn put_object(
        &self,
        key: &str,
        body: Vec<u8>,
        metadata: &ObjectMetadata,
    ) -> Result<(), StorageError> {
        self.ensure_reachable()?;
        let path = self.object_path(key)?;
        let upload_err = |reason: String| StorageError::Upload {
            key: key.to_string(),
            reason,
        };

        if key.ends_with('/') {
            // Directory marker: nothing to store beyond the directory itself.
            return fs::create_dir_all(&path)
                .await
                .map_err(|e| upload_err(e.to_string()));
        }

        let parent = path
            .parent()
            .ok_or_else(|| upload_err("object has no parent directory".to_string()))?;
        fs::create_dir_all(parent)
            .await
            .map_err(|e| upload_err(e.to_string()))?;

        let partial = parent.join(format!("{PARTIAL_PREFIX}{}", Uuid::new_v4()));
        fs::write(&partial, &body)
            .await
            .map_err(|e| upload_err(e.to_string()))?;
        if let Err(e) = fs::rename(&partial, &path).await {
            let _ = fs::remove_file(&partial).await;
            return Err(upload_err(e.to_string()));
        }

        let meta_path = self.meta_path(key);
        if let Some(meta_parent) = meta_path.parent() {
            fs::create_dir_all(meta_parent)
                .await
                .map_err(|e| upload_err(e.to_string()))?;
        }
        let meta = serde_json::to_vec_pretty(metadata).map_err(|e| upload_err(e.to_string()))?;
        fs::write(&meta_path, meta)
            .await
            .map_err(|e| upload_err(e.to_string()))?;

        debug!("Stored {key} at {}", path.display());
        Ok(())
    }

    async fn get_object(&self, key: &str) -> ObjectLookup {
        if let Err(e) = self.ensure_reachable() {
            return ObjectLookup::StoreUnavailable(e.to_string());
        }
        let path = match self.object_path(key) {
            Ok(path) => path,
            Err(e) => return ObjectLookup::StoreUnavailable(e.to_string()),
        };

        match fs::read(&path).await {
            Ok(bytes) => ObjectLookup::Found(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => ObjectLookup::Empty,
            Err(_) if path.is_dir() => ObjectLookup::Empty,
            Err(e) => ObjectLookup::StoreUnavailable(format!("cannot read {key}: {e}")),
        }
    }

    async fn list_objects(&self, prefix: &str) -> Result<Vec<ObjectSummary>, StorageError> {
        self.ensure_reachable()?;

        // Walk only the deepest directory the prefix fully names.
        let base = match prefix.rfind('/') {
            Some(idx) => self.object_path(&prefix[..=idx])?,
            None => self.objects_root(),
        };

        let files = self.walk(base).await.map_err(|e| StorageError::List {
            prefix: prefix.to_string(),
            reason: e.to_string(),
        })?;

        let mut objects: Vec<ObjectSummary> = files
            .into_iter()
            .filter_map(|(path, size)| {
                let key = self.key_for(&path)?;
                key.starts_with(prefix).then_some(ObjectSummary { key, size })
            })
            .collect();
        objects.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(objects)
    }

    async fn delete_object(&self, key: &str) -> Result<(), StorageError> {
        self.ensure_reachable()?;
        let path = self.object_path(key)?;

        for target in [path, self.meta_path(key)] {
            match fs::remove_file(&target).await {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(StorageError::Delete {
                        key: key.to_string(),
                        reason: e.to_string(),
                    });
                }
            }
        }
        Ok(())
    }
}
