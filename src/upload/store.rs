//! Remote object store abstraction.
//!
//! [`RemoteStore`] is the seam the dispatcher talks to. The production
//! implementation wraps an `object_store` backend (S3, a local directory, or
//! memory) and classifies its errors into transient and fatal outcomes.

use crate::error::UploadError;
use anyhow::{Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use object_store::aws::AmazonS3Builder;
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use object_store::path::Path as ObjectPath;
use object_store::{ObjectStore, PutMode, PutOptions, PutPayload};
use std::fs;
use std::path::Path;
use std::sync::Arc;

/// Append-only destination for uploaded files
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Store `payload` under `key`. An existing object is never replaced;
    /// the put fails with [`UploadError::AlreadyExists`] instead.
    async fn put(&self, key: &str, payload: Bytes) -> Result<(), UploadError>;

    /// Human-readable location of `key`, e.g. `s3://bucket/key`
    fn url(&self, key: &str) -> String;
}

/// [`RemoteStore`] backed by an `object_store` implementation
#[derive(Debug, Clone)]
pub struct ObjectStoreRemote {
    inner: Arc<dyn ObjectStore>,
    root: String,
}

impl ObjectStoreRemote {
    /// Wrap an existing store; `root` is only used for display
    pub fn new(inner: Arc<dyn ObjectStore>, root: impl Into<String>) -> Self {
        Self {
            inner,
            root: root.into(),
        }
    }

    /// S3 bucket, configured from the standard `AWS_*` environment variables
    pub fn s3(bucket: &str) -> Result<Self> {
        let store = AmazonS3Builder::from_env()
            .with_bucket_name(bucket)
            .build()
            .with_context(|| format!("Failed to configure S3 bucket {}", bucket))?;
        Ok(Self::new(Arc::new(store), format!("s3://{}", bucket)))
    }

    /// Local directory, created if missing
    pub fn local(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create output directory {}", dir.display()))?;
        let store = LocalFileSystem::new_with_prefix(dir)
            .with_context(|| format!("Failed to open output directory {}", dir.display()))?;
        Ok(Self::new(Arc::new(store), dir.display().to_string()))
    }

    /// Process-local store, discarded on exit
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemory::new()), "memory://")
    }

    pub fn inner(&self) -> &Arc<dyn ObjectStore> {
        &self.inner
    }
}

#[async_trait]
impl RemoteStore for ObjectStoreRemote {
    async fn put(&self, key: &str, payload: Bytes) -> Result<(), UploadError> {
        let location = ObjectPath::parse(key).map_err(|e| UploadError::Fatal {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        let opts = PutOptions {
            mode: PutMode::Create,
            ..Default::default()
        };
        self.inner
            .put_opts(&location, PutPayload::from(payload), opts)
            .await
            .map(|_| ())
            .map_err(|e| classify_error(key, e))
    }

    fn url(&self, key: &str) -> String {
        format!("{}/{}", self.root.trim_end_matches('/'), key)
    }
}

/// Sort an `object_store` error into retryable vs. terminal
pub fn classify_error(key: &str, err: object_store::Error) -> UploadError {
    use object_store::Error as E;

    if matches!(err, E::AlreadyExists { .. }) {
        return UploadError::AlreadyExists {
            key: key.to_string(),
        };
    }
    let fatal = matches!(
        err,
        E::PermissionDenied { .. }
            | E::Unauthenticated { .. }
            | E::NotFound { .. }
            | E::InvalidPath { .. }
            | E::NotSupported { .. }
            | E::NotImplemented
            | E::UnknownConfigurationKey { .. }
            | E::Precondition { .. }
    );
    let key = key.to_string();
    let message = err.to_string();
    if fatal {
        UploadError::Fatal { key, message }
    } else {
        UploadError::Transient { key, message }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generic_errors_are_transient() {
        let err = object_store::Error::Generic {
            store: "S3",
            source: "connection reset".into(),
        };
        assert!(classify_error("users/a.parquet", err).is_transient());
    }

    #[test]
    fn test_existing_object_is_not_transient() {
        let err = object_store::Error::AlreadyExists {
            path: "users/a.parquet".to_string(),
            source: "exists".into(),
        };
        let classified = classify_error("users/a.parquet", err);
        assert!(matches!(classified, UploadError::AlreadyExists { .. }));
        assert!(!classified.is_transient());
    }

    #[test]
    fn test_second_put_to_same_key_keeps_first_body() {
        let store = ObjectStoreRemote::in_memory();
        let rt = tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap();

        let body = rt.block_on(async {
            store
                .put("users/t.parquet", Bytes::from_static(b"ids 1..=100"))
                .await
                .unwrap();
            let err = store
                .put("users/t.parquet", Bytes::from_static(b"ids 101..=110"))
                .await
                .unwrap_err();
            assert!(matches!(err, UploadError::AlreadyExists { .. }));
            store
                .inner()
                .get(&ObjectPath::from("users/t.parquet"))
                .await
                .unwrap()
                .bytes()
                .await
                .unwrap()
        });
        assert_eq!(&body[..], b"ids 1..=100");
    }

    #[test]
    fn test_permission_denied_is_fatal() {
        let err = object_store::Error::PermissionDenied {
            path: "users/a.parquet".to_string(),
            source: "access denied".into(),
        };
        let classified = classify_error("users/a.parquet", err);
        assert!(matches!(classified, UploadError::Fatal { .. }));
        assert_eq!(classified.key(), "users/a.parquet");
    }

    #[test]
    fn test_url_joins_root_and_key() {
        let store = ObjectStoreRemote::in_memory();
        assert_eq!(store.url("users/1.parquet"), "memory://users/1.parquet");
    }
}
