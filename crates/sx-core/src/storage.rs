//! Storage backend abstraction for object storage (GCS, local, memory).
//!
//! Provisioning checkpoints are small JSON documents, so the contract here is
//! the subset of object storage semantics the state store needs: whole-object
//! reads, create-only writes and unconditional overwrites.
//!
//! The version token is an opaque `String`; GCS generations and local/memory
//! `ETag`s both fit.

use async_trait::async_trait;
use bytes::Bytes;
use object_store::ObjectStore;
use object_store::path::Path;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::error::{Error, Result};

/// Precondition for conditional writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WritePrecondition {
    /// Write only if object does not exist.
    DoesNotExist,
    /// Write unconditionally.
    None,
}

/// Result of a conditional write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteResult {
    /// Write succeeded, returns new version token.
    Success {
        /// The new version token after the write.
        version: String,
    },
    /// Precondition failed (the object already exists).
    PreconditionFailed,
}

/// Storage backend trait for object storage.
///
/// Every successful `put` must be durable when the future resolves; callers
/// treat a returned `Success` as a committed checkpoint.
#[async_trait]
pub trait StorageBackend: Send + Sync + 'static {
    /// Reads entire object.
    ///
    /// Returns `Error::NotFound` if object doesn't exist.
    async fn get(&self, path: &str) -> Result<Bytes>;

    /// Writes with optional precondition.
    ///
    /// Returns `WriteResult::PreconditionFailed` if precondition not met.
    /// Never returns error for precondition failure - that's a normal result.
    async fn put(
        &self,
        path: &str,
        data: Bytes,
        precondition: WritePrecondition,
    ) -> Result<WriteResult>;
}

/// In-memory storage backend for testing.
///
/// Thread-safe via `RwLock`. Not suitable for production.
#[derive(Debug, Default, Clone)]
pub struct MemoryBackend {
    objects: Arc<RwLock<HashMap<String, StoredObject>>>,
}

#[derive(Debug, Clone)]
struct StoredObject {
    data: Bytes,
    version: i64,
}

impl MemoryBackend {
    /// Creates a new empty memory backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn poisoned() -> Error {
        Error::Internal {
            message: "lock poisoned".into(),
        }
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    async fn get(&self, path: &str) -> Result<Bytes> {
        let objects = self.objects.read().map_err(|_| Self::poisoned())?;

        objects
            .get(path)
            .map(|o| o.data.clone())
            .ok_or_else(|| Error::NotFound(format!("object not found: {path}")))
    }

    async fn put(
        &self,
        path: &str,
        data: Bytes,
        precondition: WritePrecondition,
    ) -> Result<WriteResult> {
        let mut objects = self.objects.write().map_err(|_| Self::poisoned())?;

        let current = objects.get(path);
        if precondition == WritePrecondition::DoesNotExist && current.is_some() {
            return Ok(WriteResult::PreconditionFailed);
        }

        let new_version = current.map_or(1, |o| o.version + 1);
        objects.insert(
            path.to_string(),
            StoredObject {
                data,
                version: new_version,
            },
        );
        drop(objects);

        Ok(WriteResult::Success {
            version: new_version.to_string(),
        })
    }
}

/// Storage backend over the `object_store` crate.
///
/// Supported URLs:
/// - `gs://bucket[/prefix]` (credentials from the environment)
/// - `file:///absolute/dir`
/// - `memory://`
pub struct ObjectStoreBackend {
    store: Arc<dyn ObjectStore>,
    prefix: String,
}

impl std::fmt::Debug for ObjectStoreBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectStoreBackend")
            .field("store", &self.store.to_string())
            .field("prefix", &self.prefix)
            .finish()
    }
}

impl ObjectStoreBackend {
    /// Builds a backend from a storage URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is malformed, uses an unsupported scheme,
    /// or the underlying store cannot be configured.
    pub fn from_url(url: &str) -> Result<Self> {
        let parsed = url::Url::parse(url)
            .map_err(|e| Error::InvalidInput(format!("invalid storage URL '{url}': {e}")))?;
        let prefix = parsed.path().trim_matches('/').to_string();

        let store: Arc<dyn ObjectStore> = match parsed.scheme() {
            "gs" => {
                let bucket = parsed.host_str().ok_or_else(|| {
                    Error::InvalidInput(format!("storage URL '{url}' is missing a bucket"))
                })?;
                let gcs = object_store::gcp::GoogleCloudStorageBuilder::from_env()
                    .with_bucket_name(bucket)
                    .build()
                    .map_err(|e| Error::storage_with_source("failed to configure GCS", e))?;
                Arc::new(gcs)
            }
            "file" => {
                let root = parsed.path();
                std::fs::create_dir_all(root).map_err(|e| {
                    Error::storage_with_source(format!("failed to create {root}"), e)
                })?;
                let local = object_store::local::LocalFileSystem::new_with_prefix(root)
                    .map_err(|e| Error::storage_with_source("failed to open local store", e))?;
                return Ok(Self {
                    store: Arc::new(local),
                    prefix: String::new(),
                });
            }
            "memory" => Arc::new(object_store::memory::InMemory::new()),
            other => {
                return Err(Error::InvalidInput(format!(
                    "unsupported storage scheme '{other}' (expected gs, file or memory)"
                )));
            }
        };

        Ok(Self { store, prefix })
    }

    /// Wraps an existing `object_store` implementation.
    #[must_use]
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self {
            store,
            prefix: String::new(),
        }
    }

    fn location(&self, path: &str) -> Path {
        if self.prefix.is_empty() {
            Path::from(path)
        } else {
            Path::from(format!("{}/{}", self.prefix, path.trim_start_matches('/')))
        }
    }
}

#[async_trait]
impl StorageBackend for ObjectStoreBackend {
    async fn get(&self, path: &str) -> Result<Bytes> {
        let location = self.location(path);
        let result = match self.store.get(&location).await {
            Ok(result) => result,
            Err(object_store::Error::NotFound { .. }) => {
                return Err(Error::NotFound(format!("object not found: {path}")));
            }
            Err(e) => return Err(Error::storage_with_source(format!("get {path} failed"), e)),
        };
        result
            .bytes()
            .await
            .map_err(|e| Error::storage_with_source(format!("read {path} failed"), e))
    }

    async fn put(
        &self,
        path: &str,
        data: Bytes,
        precondition: WritePrecondition,
    ) -> Result<WriteResult> {
        let mode = match precondition {
            WritePrecondition::DoesNotExist => object_store::PutMode::Create,
            WritePrecondition::None => object_store::PutMode::Overwrite,
        };
        let options = object_store::PutOptions {
            mode,
            ..Default::default()
        };

        match self
            .store
            .put_opts(&self.location(path), data.into(), options)
            .await
        {
            Ok(result) => Ok(WriteResult::Success {
                version: result.version.or(result.e_tag).unwrap_or_default(),
            }),
            Err(
                object_store::Error::AlreadyExists { .. } | object_store::Error::Precondition { .. },
            ) => Ok(WriteResult::PreconditionFailed),
            Err(e) => Err(Error::storage_with_source(format!("put {path} failed"), e)),
        }
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_backend_roundtrip() {
        let backend = MemoryBackend::new();
        let data = Bytes::from("hello world");

        let result = backend
            .put("test/file.txt", data.clone(), WritePrecondition::None)
            .await
            .expect("put should succeed");
        assert!(matches!(result, WriteResult::Success { ref version } if version == "1"));

        let retrieved = backend
            .get("test/file.txt")
            .await
            .expect("get should succeed");
        assert_eq!(retrieved, data);
    }

    #[tokio::test]
    async fn test_missing_object_is_not_found() {
        let backend = MemoryBackend::new();
        let err = backend.get("nope.json").await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn test_precondition_does_not_exist() {
        let backend = MemoryBackend::new();

        let result = backend
            .put("new.txt", Bytes::from("data"), WritePrecondition::DoesNotExist)
            .await
            .expect("should succeed");
        assert!(matches!(result, WriteResult::Success { .. }));

        let result = backend
            .put("new.txt", Bytes::from("data2"), WritePrecondition::DoesNotExist)
            .await
            .expect("should succeed");
        assert_eq!(result, WriteResult::PreconditionFailed);
        assert_eq!(backend.get("new.txt").await.unwrap(), Bytes::from("data"));
    }

    #[tokio::test]
    async fn test_overwrite_bumps_version() {
        let backend = MemoryBackend::new();
        backend
            .put("v.txt", Bytes::from("1"), WritePrecondition::None)
            .await
            .unwrap();
        let result = backend
            .put("v.txt", Bytes::from("2"), WritePrecondition::None)
            .await
            .unwrap();
        assert_eq!(
            result,
            WriteResult::Success {
                version: "2".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_object_store_backend_memory_scheme() {
        let backend = ObjectStoreBackend::from_url("memory://").expect("memory store");

        let created = backend
            .put("x/state.json", Bytes::from("{}"), WritePrecondition::DoesNotExist)
            .await
            .unwrap();
        assert!(matches!(created, WriteResult::Success { .. }));

        let again = backend
            .put("x/state.json", Bytes::from("{}"), WritePrecondition::DoesNotExist)
            .await
            .unwrap();
        assert_eq!(again, WriteResult::PreconditionFailed);

        assert_eq!(
            backend.get("x/state.json").await.unwrap(),
            Bytes::from("{}")
        );
        assert!(matches!(
            backend.get("x/missing.json").await,
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_object_store_backend_rejects_unknown_scheme() {
        assert!(ObjectStoreBackend::from_url("ftp://example.com/x").is_err());
        assert!(ObjectStoreBackend::from_url("not a url").is_err());
    }
}
