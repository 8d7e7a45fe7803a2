//! Upload dispatcher: stage chunks as Parquet and ship them to a remote store.
//!
//! Each [`FileChunk`] is serialized into a scoped temporary file, read into
//! memory and `put` under `[prefix/]<table>/<timestamp>[_part_NNN].parquet`.
//! Chunks of one table are started in part order and run concurrently up to
//! [`UploadConfig::concurrency`]. Transient store errors are retried with
//! exponential backoff. Keys are written create-only; an existing key on a
//! retry counts as delivered. The first terminal failure aborts the table and
//! drops every in-flight sibling, which removes their staged files.

mod store;

pub use store::{ObjectStoreRemote, RemoteStore};

use crate::chunker::FileChunk;
use crate::error::UploadError;
use crate::parquet::{Compression, ParquetWriter, PARQUET_EXTENSION};
use bytes::Bytes;
use futures_util::stream::{self, StreamExt};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempPath;
use tokio::runtime::{Builder, Runtime};

pub const DEFAULT_CONCURRENCY: usize = 4;
pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_millis(200);

/// Dispatcher settings
#[derive(Debug, Clone)]
pub struct UploadConfig {
    /// Maximum chunks in flight per table
    pub concurrency: usize,
    /// Retries per chunk after the first transient failure
    pub max_retries: u32,
    /// Delay before the first retry; doubled on each subsequent one
    pub retry_backoff: Duration,
    /// Optional key prefix in front of the table directory
    pub key_prefix: Option<String>,
    /// Where staged Parquet files are written (system temp dir if `None`)
    pub staging_dir: Option<PathBuf>,
    pub compression: Compression,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_backoff: DEFAULT_RETRY_BACKOFF,
            key_prefix: None,
            staging_dir: None,
            compression: Compression::default(),
        }
    }
}

/// A file that reached the remote store
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadedObject {
    pub key: String,
    pub url: String,
    pub sequence_index: Option<u32>,
    pub rows: usize,
    pub bytes: u64,
}

/// Remote key for a chunk: `[prefix/]<table>/<file_name>.parquet`
pub fn object_key(prefix: Option<&str>, table: &str, file_name: &str) -> String {
    let mut key = String::new();
    if let Some(prefix) = prefix.map(|p| p.trim_matches('/')).filter(|p| !p.is_empty()) {
        key.push_str(prefix);
        key.push('/');
    }
    key.push_str(table);
    key.push('/');
    key.push_str(file_name);
    key.push('.');
    key.push_str(PARQUET_EXTENSION);
    key
}

/// Serializes and uploads the chunks of one table at a time
pub struct UploadDispatcher {
    store: Arc<dyn RemoteStore>,
    writer: ParquetWriter,
    config: UploadConfig,
    runtime: Runtime,
}

impl UploadDispatcher {
    pub fn new(store: Arc<dyn RemoteStore>, config: UploadConfig) -> anyhow::Result<Self> {
        let runtime = Builder::new_current_thread().enable_all().build()?;
        let writer = ParquetWriter::new()
            .with_staging_dir(config.staging_dir.clone())
            .with_compression(config.compression);
        Ok(Self {
            store,
            writer,
            config,
            runtime,
        })
    }

    pub fn config(&self) -> &UploadConfig {
        &self.config
    }

    pub fn writer(&self) -> &ParquetWriter {
        &self.writer
    }

    /// Remote key a chunk will be stored under
    pub fn key_for(&self, chunk: &FileChunk<'_>, timestamp: &str) -> String {
        object_key(
            self.config.key_prefix.as_deref(),
            chunk.table.name(),
            &chunk.file_name(timestamp),
        )
    }

    /// Write `chunk` to a temporary Parquet file, removed when the path drops.
    pub fn serialize(&self, chunk: &FileChunk<'_>) -> Result<TempPath, UploadError> {
        self.writer
            .stage(chunk.table, chunk.rows)
            .map_err(|e| UploadError::Stage {
                key: format!("{}/{}", chunk.table, chunk.sequence_index.unwrap_or(1)),
                message: format!("{:#}", e),
            })
    }

    /// Send a staged file to `<table_prefix>/<file_name>.parquet`, with
    /// retries. Returns the remote key.
    pub fn upload(
        &self,
        local_path: &Path,
        table_prefix: &str,
        file_name: &str,
    ) -> Result<String, UploadError> {
        let key = object_key(self.config.key_prefix.as_deref(), table_prefix, file_name);
        self.runtime.block_on(async {
            let payload = read_payload(&key, local_path).await?;
            self.put_with_retry(&key, payload).await
        })?;
        Ok(key)
    }

    /// Upload every chunk of one table; returns objects in part order.
    pub fn upload_table(
        &self,
        chunks: &[FileChunk<'_>],
        timestamp: &str,
    ) -> Result<Vec<UploadedObject>, UploadError> {
        self.upload_table_with_progress(chunks, timestamp, &|_: u64| {})
    }

    /// Like [`upload_table`](Self::upload_table), reporting uploaded bytes
    /// after each finished chunk.
    pub fn upload_table_with_progress(
        &self,
        chunks: &[FileChunk<'_>],
        timestamp: &str,
        progress: &dyn Fn(u64),
    ) -> Result<Vec<UploadedObject>, UploadError> {
        let concurrency = self.config.concurrency.max(1);

        self.runtime.block_on(async {
            let mut pending = stream::iter(chunks)
                .map(|chunk| self.dispatch_chunk(chunk, timestamp))
                .buffer_unordered(concurrency);

            let mut uploaded = Vec::with_capacity(chunks.len());
            let mut total_bytes = 0u64;
            while let Some(result) = pending.next().await {
                // Returning drops `pending`, cancelling in-flight siblings.
                let object = result?;
                total_bytes += object.bytes;
                progress(total_bytes);
                uploaded.push(object);
            }

            uploaded.sort_by_key(|o| o.sequence_index);
            Ok::<_, UploadError>(uploaded)
        })
    }

    async fn dispatch_chunk(
        &self,
        chunk: &FileChunk<'_>,
        timestamp: &str,
    ) -> Result<UploadedObject, UploadError> {
        let key = self.key_for(chunk, timestamp);
        let staged = self.serialize(chunk).map_err(|e| match e {
            UploadError::Stage { message, .. } => UploadError::Stage {
                key: key.clone(),
                message,
            },
            other => other,
        })?;

        let payload = read_payload(&key, &staged).await?;
        let bytes = payload.len() as u64;
        self.put_with_retry(&key, payload).await?;
        drop(staged);

        Ok(UploadedObject {
            url: self.store.url(&key),
            key,
            sequence_index: chunk.sequence_index,
            rows: chunk.rows.len(),
            bytes,
        })
    }

    async fn put_with_retry(&self, key: &str, payload: Bytes) -> Result<(), UploadError> {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match self.store.put(key, payload.clone()).await {
                Ok(()) => return Ok(()),
                // An earlier attempt reported as transient may have landed.
                Err(UploadError::AlreadyExists { .. }) if attempt > 1 => return Ok(()),
                Err(e) if e.is_transient() && attempt <= self.config.max_retries => {
                    let delay = self.config.retry_backoff * 2u32.saturating_pow(attempt - 1);
                    tokio::time::sleep(delay).await;
                }
                Err(UploadError::Transient { key, message }) => {
                    return Err(UploadError::RetriesExhausted {
                        key,
                        attempts: attempt,
                        message,
                    })
                }
                Err(e) => return Err(e),
            }
        }
    }
}

async fn read_payload(key: &str, path: &Path) -> Result<Bytes, UploadError> {
    tokio::fs::read(path)
        .await
        .map(Bytes::from)
        .map_err(|e| UploadError::Stage {
            key: key.to_string(),
            message: format!("failed to read {}: {}", path.display(), e),
        })
}
