//! Object store gateway for plan sources and Terraform state.
//!
//! The gateway is the only component that talks to blob storage. Backends
//! implement the small [`ObjectStore`] trait (put/get/list/delete by key);
//! [`ObjectStoreGateway`] layers the prefix-oriented contract on top:
//!
//! - [`ObjectStoreGateway::upload`] writes a [`FileSet`] under a prefix, every
//!   object tagged with [`ObjectMetadata::text`] (plain text, AES256 at rest)
//! - [`ObjectStoreGateway::download_all`] reads every real object under a
//!   prefix, skipping zero-byte directory markers, and returns an empty set
//!   when there is nothing there
//! - [`ObjectStoreGateway::lookup`] addresses one object and distinguishes
//!   [`ObjectLookup::Empty`] from [`ObjectLookup::StoreUnavailable`]
//!
//! ```text
//! {prefix}/
//!   main.tf
//!   variables.tf
//!   outputs.tf
//!   terraform.tfstate      # present only after a successful apply
//! ```

use std::{
    collections::BTreeMap,
    path::{Component, Path},
    sync::Arc,
};

use async_trait::async_trait;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod fs;
pub mod memory;

pub use fs::FsObjectStore;
pub use memory::MemoryObjectStore;

/// Errors raised by object store backends and the gateway.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to upload '{key}': {reason}")]
    Upload { key: String, reason: String },
    #[error("Failed to download '{key}': {reason}")]
    Download { key: String, reason: String },
    #[error("Failed to list objects under '{prefix}': {reason}")]
    List { prefix: String, reason: String },
    #[error("Failed to delete '{key}': {reason}")]
    Delete { key: String, reason: String },
    #[error("Object store unavailable: {reason}")]
    Unavailable { reason: String },
    #[error("Invalid object path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },
}

/// Metadata stored alongside every object.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ObjectMetadata {
    pub content_type: String,
    pub server_side_encryption: String,
}

impl ObjectMetadata {
    /// Plain text content, encrypted at rest.
    pub fn text() -> Self {
        Self {
            content_type: "text/plain".to_string(),
            server_side_encryption: "AES256".to_string(),
        }
    }
}

/// A listed object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectSummary {
    pub key: String,
    pub size: u64,
}

/// Result of addressing a single object by key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObjectLookup {
    /// No object exists at the key
    Empty,
    /// The object's bytes
    Found(Vec<u8>),
    /// The store could not be reached; presence is unknown
    StoreUnavailable(String),
}

/// Minimal blob storage backend.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Write one object, replacing any previous content at `key`.
    async fn put_object(
        &self,
        key: &str,
        body: Vec<u8>,
        metadata: &ObjectMetadata,
    ) -> Result<(), StorageError>;

    /// Read one object.
    async fn get_object(&self, key: &str) -> ObjectLookup;

    /// List every object whose key starts with `prefix`.
    async fn list_objects(&self, prefix: &str) -> Result<Vec<ObjectSummary>, StorageError>;

    /// Remove one object. Removing a missing key is not an error.
    async fn delete_object(&self, key: &str) -> Result<(), StorageError>;
}

/// Relative path → file content for one plan version.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileSet(BTreeMap<String, Vec<u8>>);

impl FileSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a file, replacing any previous content at `path`.
    pub fn insert(&mut self, path: impl Into<String>, content: impl Into<Vec<u8>>) {
        self.0.insert(path.into(), content.into());
    }

    /// Builder-style [`FileSet::insert`].
    pub fn with_file(mut self, path: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        self.insert(path, content);
        self
    }

    pub fn get(&self, path: &str) -> Option<&[u8]> {
        self.0.get(path).map(Vec::as_slice)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.0.contains_key(path)
    }

    pub fn remove(&mut self, path: &str) -> Option<Vec<u8>> {
        self.0.remove(path)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Whether the set holds at least one Terraform configuration file.
    pub fn has_terraform_source(&self) -> bool {
        self.paths().any(|p| p.ends_with(".tf") || p.ends_with(".tf.json"))
    }
}

impl From<BTreeMap<String, Vec<u8>>> for FileSet {
    fn from(files: BTreeMap<String, Vec<u8>>) -> Self {
        Self(files)
    }
}

impl FromIterator<(String, Vec<u8>)> for FileSet {
    fn from_iter<I: IntoIterator<Item = (String, Vec<u8>)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Rejects paths that could escape a prefix or sandbox.
pub fn validate_relative_path(path: &str) -> Result<(), StorageError> {
    let invalid = |reason: &str| StorageError::InvalidPath {
        path: path.to_string(),
        reason: reason.to_string(),
    };

    if path.is_empty() {
        return Err(invalid("path is empty"));
    }
    if path.contains('\\') {
        return Err(invalid("backslashes are not allowed"));
    }
    for component in Path::new(path).components() {
        match component {
            Component::Normal(_) => {}
            Component::CurDir => return Err(invalid("'.' components are not allowed")),
            Component::ParentDir => return Err(invalid("'..' components are not allowed")),
            Component::RootDir | Component::Prefix(_) => {
                return Err(invalid("path must be relative"));
            }
        }
    }
    Ok(())
}

/// Normalizes a prefix to end with exactly one `/`.
pub fn normalize_prefix(prefix: &str) -> String {
    format!("{}/", prefix.trim_end_matches('/'))
}

/// Prefix-oriented access to an [`ObjectStore`].
#[derive(Clone)]
pub struct ObjectStoreGateway {
    store: Arc<dyn ObjectStore>,
}

impl ObjectStoreGateway {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    /// Writes each file under `prefix/relative_path`.
    ///
    /// Stops at the first failed write; objects written before it stay in
    /// place.
    pub async fn upload(&self, prefix: &str, files: &FileSet) -> Result<(), StorageError> {
        let prefix = normalize_prefix(prefix);
        let metadata = ObjectMetadata::text();

        for (path, content) in files.iter() {
            validate_relative_path(path)?;
            let key = format!("{prefix}{path}");
            debug!("Uploading {key} ({} bytes)", content.len());
            self.store
                .put_object(&key, content.to_vec(), &metadata)
                .await?;
        }

        info!("Uploaded {} files under {prefix}", files.len());
        Ok(())
    }

    /// Downloads every real object under `prefix`, keyed by relative path.
    pub async fn download_all(&self, prefix: &str) -> Result<FileSet, StorageError> {
        let prefix = normalize_prefix(prefix);
        let objects = self.store.list_objects(&prefix).await?;
        let mut files = FileSet::new();

        for object in objects {
            let Some(relative) = object.key.strip_prefix(&prefix) else {
                continue;
            };
            if relative.is_empty() || relative.ends_with('/') {
                debug!("Skipping directory marker {} ({} bytes)", object.key, object.size);
                continue;
            }

            match self.store.get_object(&object.key).await {
                ObjectLookup::Found(bytes) => files.insert(relative, bytes),
                ObjectLookup::Empty => {
                    warn!("Object {} disappeared between list and get", object.key);
                }
                ObjectLookup::StoreUnavailable(reason) => {
                    return Err(StorageError::Download {
                        key: object.key,
                        reason,
                    });
                }
            }
        }

        if files.is_empty() {
            info!("No objects found under {prefix}");
        } else {
            info!("Downloaded {} files from {prefix}", files.len());
        }
        Ok(files)
    }

    /// Looks up a single object at `prefix/name`.
    pub async fn lookup(&self, prefix: &str, name: &str) -> ObjectLookup {
        let key = format!("{}{name}", normalize_prefix(prefix));
        self.store.get_object(&key).await
    }

    /// Removes a single object at `prefix/name`.
    pub async fn remove(&self, prefix: &str, name: &str) -> Result<(), StorageError> {
        let key = format!("{}{name}", normalize_prefix(prefix));
        self.store.delete_object(&key).await
    }

    /// Removes every object under `prefix`. Returns how many were removed.
    pub async fn clear(&self, prefix: &str) -> Result<usize, StorageError> {
        let prefix = normalize_prefix(prefix);
        let objects = self.store.list_objects(&prefix).await?;
        for object in &objects {
            self.store.delete_object(&object.key).await?;
        }
        if !objects.is_empty() {
            info!("Removed {} leftover objects under {prefix}", objects.len());
        }
        Ok(objects.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gateway() -> (Arc<MemoryObjectStore>, ObjectStoreGateway) {
        let store = Arc::new(MemoryObjectStore::new());
        let gateway = ObjectStoreGateway::new(store.clone());
        (store, gateway)
    }

    #[test]
    fn test_validate_relative_path() {
        assert!(validate_relative_path("main.tf").is_ok());
        assert!(validate_relative_path("modules/net/main.tf").is_ok());
        assert!(validate_relative_path("").is_err());
        assert!(validate_relative_path("/etc/passwd").is_err());
        assert!(validate_relative_path("../main.tf").is_err());
        assert!(validate_relative_path("modules/../../x").is_err());
        assert!(validate_relative_path("a\\b.tf").is_err());
    }

    #[test]
    fn test_normalize_prefix() {
        assert_eq!(normalize_prefix("u/p/v1"), "u/p/v1/");
        assert_eq!(normalize_prefix("u/p/v1/"), "u/p/v1/");
        assert_eq!(normalize_prefix("u/p/v1//"), "u/p/v1/");
    }

    #[test]
    fn test_file_set_detects_terraform_source() {
        let files = FileSet::new().with_file("README.md", "hi");
        assert!(!files.has_terraform_source());
        let files = files.with_file("main.tf", "terraform {}");
        assert!(files.has_terraform_source());
    }

    #[tokio::test]
    async fn test_upload_writes_text_objects_with_encryption() {
        let (store, gateway) = gateway();
        let files = FileSet::new()
            .with_file("main.tf", "resource \"null_resource\" \"a\" {}")
            .with_file("modules/net/main.tf", "variable \"cidr\" {}");

        gateway
            .upload("alice/p1/v1", &files)
            .await
            .expect("Failed to upload");

        let metadata = store
            .metadata("alice/p1/v1/modules/net/main.tf")
            .expect("Object should exist");
        assert_eq!(metadata, ObjectMetadata::text());
        assert_eq!(metadata.server_side_encryption, "AES256");
        assert_eq!(store.keys().len(), 2);
    }

    #[tokio::test]
    async fn test_upload_rejects_escaping_paths() {
        let (store, gateway) = gateway();
        let files = FileSet::new().with_file("../other/main.tf", "x");

        let result = gateway.upload("alice/p1/v1/", &files).await;
        assert!(matches!(result, Err(StorageError::InvalidPath { .. })));
        assert!(store.keys().is_empty());
    }

    #[tokio::test]
    async fn test_download_all_skips_directory_markers() {
        let (store, gateway) = gateway();
        store
            .put_object("alice/p1/v1/", Vec::new(), &ObjectMetadata::text())
            .await
            .unwrap();
        store
            .put_object("alice/p1/v1/main.tf", b"x".to_vec(), &ObjectMetadata::text())
            .await
            .unwrap();
        store
            .put_object("alice/p1/v10/main.tf", b"y".to_vec(), &ObjectMetadata::text())
            .await
            .unwrap();

        let files = gateway.download_all("alice/p1/v1/").await.unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files.get("main.tf"), Some(&b"x"[..]));
    }

    #[tokio::test]
    async fn test_clear_removes_only_the_prefix() {
        let (store, gateway) = gateway();
        let files = FileSet::new()
            .with_file("main.tf", "x")
            .with_file("modules/net/main.tf", "y");
        gateway.upload("alice/p1/v2/", &files).await.unwrap();
        gateway.upload("alice/p1/v1/", &files).await.unwrap();

        assert_eq!(gateway.clear("alice/p1/v2").await.unwrap(), 2);
        assert_eq!(
            store.keys(),
            vec!["alice/p1/v1/main.tf", "alice/p1/v1/modules/net/main.tf"]
        );
        assert_eq!(gateway.clear("alice/p1/v2/").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_download_all_empty_prefix_is_not_an_error() {
        let (_store, gateway) = gateway();
        let files = gateway.download_all("nobody/nothing/v1/").await.unwrap();
        assert!(files.is_empty());
    }

    #[tokio::test]
    async fn test_download_all_reports_unreachable_store() {
        let (store, gateway) = gateway();
        gateway
            .upload("alice/p1/v1/", &FileSet::new().with_file("main.tf", "x"))
            .await
            .unwrap();
        store.set_online(false);

        let result = gateway.download_all("alice/p1/v1/").await;
        assert!(matches!(result, Err(StorageError::Unavailable { .. })));
    }

    #[tokio::test]
    async fn test_lookup_distinguishes_empty_from_unavailable() {
        let (store, gateway) = gateway();
        assert_eq!(
            gateway.lookup("alice/p1/v1/", "terraform.tfstate").await,
            ObjectLookup::Empty
        );

        gateway
            .upload(
                "alice/p1/v1/",
                &FileSet::new().with_file("terraform.tfstate", "{}"),
            )
            .await
            .unwrap();
        assert_eq!(
            gateway.lookup("alice/p1/v1/", "terraform.tfstate").await,
            ObjectLookup::Found(b"{}".to_vec())
        );

        store.set_online(false);
        assert!(matches!(
            gateway.lookup("alice/p1/v1/", "terraform.tfstate").await,
            ObjectLookup::StoreUnavailable(_)
        ));
    }
}
