// In-process backend: the same contracts as the managed service, kept in
// memory. Used by the terminal client and by the tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use log::debug;
use once_cell::sync::OnceCell;
use uuid::Uuid;

use crate::backend::{path, BlobStorage, PushMessaging, Services};
use crate::error::{BackendError, BackendResult};

pub mod auth;
pub mod store;

pub use auth::MemoryAuth;
pub use store::MemoryStore;

/// Source of "now" in epoch milliseconds, used for server timestamps and
/// push keys.
pub type Clock = Arc<dyn Fn() -> i64 + Send + Sync>;

pub fn system_clock() -> Clock {
    Arc::new(|| chrono::Utc::now().timestamp_millis())
}

struct StoredObject {
    bytes: Vec<u8>,
    content_type: String,
    token: String,
}

pub struct MemoryBlobStorage {
    bucket: String,
    objects: Mutex<HashMap<String, StoredObject>>,
}

impl MemoryBlobStorage {
    pub fn new(bucket: &str) -> Self {
        MemoryBlobStorage {
            bucket: bucket.to_string(),
            objects: Mutex::new(HashMap::new()),
        }
    }

    /// Stored bytes and content type, if the object exists.
    pub fn object(&self, path: &str) -> Option<(Vec<u8>, String)> {
        let key = path::normalize(path).ok()?;
        let objects = self.objects.lock().unwrap_or_else(|p| p.into_inner());
        objects
            .get(&key)
            .map(|o| (o.bytes.clone(), o.content_type.clone()))
    }
}

#[async_trait]
impl BlobStorage for MemoryBlobStorage {
    async fn put(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> BackendResult<()> {
        let key = path::normalize(path)?;
        if key.is_empty() {
            return Err(BackendError::InvalidPath(path.to_string()));
        }
        debug!("Storing {} bytes ({}) at {}", bytes.len(), content_type, key);

        let mut objects = self.objects.lock().unwrap_or_else(|p| p.into_inner());
        objects.insert(
            key,
            StoredObject {
                bytes,
                content_type: content_type.to_string(),
                token: Uuid::new_v4().to_string(),
            },
        );
        Ok(())
    }

    async fn download_url(&self, path: &str) -> BackendResult<String> {
        let key = path::normalize(path)?;
        let objects = self.objects.lock().unwrap_or_else(|p| p.into_inner());
        let object = objects
            .get(&key)
            .ok_or_else(|| BackendError::ObjectNotFound(key.clone()))?;
        Ok(format!("memory://{}/{}?token={}", self.bucket, key, object.token))
    }
}

#[derive(Default)]
pub struct MemoryMessaging {
    token: OnceCell<String>,
}

#[async_trait]
impl PushMessaging for MemoryMessaging {
    async fn token(&self) -> BackendResult<String> {
        Ok(self
            .token
            .get_or_init(|| Uuid::new_v4().simple().to_string())
            .clone())
    }
}

/// All four collaborators backed by memory, sharing one clock.
#[derive(Clone)]
pub struct MemoryBackend {
    pub auth: Arc<MemoryAuth>,
    pub store: Arc<MemoryStore>,
    pub storage: Arc<MemoryBlobStorage>,
    pub messaging: Arc<MemoryMessaging>,
}

impl MemoryBackend {
    pub fn new(bucket: &str) -> Self {
        Self::with_clock(bucket, system_clock())
    }

    pub fn with_clock(bucket: &str, clock: Clock) -> Self {
        MemoryBackend {
            auth: Arc::new(MemoryAuth::new()),
            store: Arc::new(MemoryStore::new(clock)),
            storage: Arc::new(MemoryBlobStorage::new(bucket)),
            messaging: Arc::new(MemoryMessaging::default()),
        }
    }

    pub fn services(&self) -> Services {
        Services {
            auth: self.auth.clone(),
            store: self.store.clone(),
            storage: self.storage.clone(),
            messaging: self.messaging.clone(),
        }
    }
}
