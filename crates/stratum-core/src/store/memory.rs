//! In-memory object store with fault injection.

use std::{
    collections::BTreeMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        Mutex, RwLock,
    },
};

use async_trait::async_trait;

use super::{ObjectLookup, ObjectMetadata, ObjectStore, ObjectSummary, StorageError};

#[derive(Debug, Clone)]
struct StoredObject {
    body: Vec<u8>,
    metadata: ObjectMetadata,
}

/// Object store kept in process memory.
///
/// Can be switched offline to simulate an unreachable store, and can be told
/// to reject uploads of particular file names.
#[derive(Debug)]
pub struct MemoryObjectStore {
    objects: RwLock<BTreeMap<String, StoredObject>>,
    online: AtomicBool,
    rejected_names: Mutex<Vec<String>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self {
            objects: RwLock::new(BTreeMap::new()),
            online: AtomicBool::new(true),
            rejected_names: Mutex::new(Vec::new()),
        }
    }

    /// Switch the store between reachable and unreachable.
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    /// Make every upload whose key ends in `/{name}` fail.
    pub fn reject_uploads_named(&self, name: impl Into<String>) {
        self.rejected_names
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(name.into());
    }

    /// All stored keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        self.objects
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .keys()
            .cloned()
            .collect()
    }

    /// Metadata recorded for `key`.
    pub fn metadata(&self, key: &str) -> Option<ObjectMetadata> {
        self.objects
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .map(|o| o.metadata.clone())
    }

    fn check_online(&self) -> Result<(), StorageError> {
        if self.online.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StorageError::Unavailable {
                reason: "memory store is offline".to_string(),
            })
        }
    }

    fn is_rejected(&self, key: &str) -> bool {
        self.rejected_names
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .any(|name| key.ends_with(&format!("/{name}")))
    }
}

impl Default for MemoryObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put_object(
        &self,
        key: &str,
        body: Vec<u8>,
        metadata: &ObjectMetadata,
    ) -> Result<(), StorageError> {
        self.check_online()?;
        if self.is_rejected(key) {
            return Err(StorageError::Upload {
                key: key.to_string(),
                reason: "upload rejected by store".to_string(),
            });
        }

        self.objects
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(
                key.to_string(),
                StoredObject {
                    body,
                    metadata: metadata.clone(),
                },
            );
        Ok(())
    }

    async fn get_object(&self, key: &str) -> ObjectLookup {
        if let Err(e) = self.check_online() {
            return ObjectLookup::StoreUnavailable(e.to_string());
        }

        match self
            .objects
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
        {
            Some(object) => ObjectLookup::Found(object.body.clone()),
            None => ObjectLookup::Empty,
        }
    }

    async fn list_objects(&self, prefix: &str) -> Result<Vec<ObjectSummary>, StorageError> {
        self.check_online()?;

        Ok(self
            .objects
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, object)| ObjectSummary {
                key: key.clone(),
                size: object.body.len() as u64,
            })
            .collect())
    }

    async fn delete_object(&self, key: &str) -> Result<(), StorageError> {
        self.check_online()?;
        self.objects
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(key);
        Ok(())
    }
}
