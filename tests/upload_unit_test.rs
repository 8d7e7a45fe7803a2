//! Unit tests for the upload dispatcher

use async_trait::async_trait;
use bytes::Bytes;
use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use synth_records::{FakeRecordSource, ParentRefs, Record, RecordSource, TableKind};
use synthgen::chunker::FileChunk;
use synthgen::error::UploadError;
use synthgen::upload::{ObjectStoreRemote, RemoteStore, UploadConfig, UploadDispatcher};
use tempfile::TempDir;

/// Records every successful put; optionally fails some keys
#[derive(Default)]
struct RecordingStore {
    puts: Mutex<Vec<(String, usize)>>,
    attempts: AtomicUsize,
    /// Keys containing this fragment fail with a transient error this many times
    flaky: Option<(&'static str, usize)>,
    /// Keys containing this fragment fail fatally
    fatal: Option<&'static str>,
    /// Keys containing this fragment land on the first attempt but report a
    /// transient error; later attempts see the existing object
    lost_ack: Option<&'static str>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

#[async_trait]
impl RemoteStore for RecordingStore {
    async fn put(&self, key: &str, payload: Bytes) -> Result<(), UploadError> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(20)).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if let Some(fragment) = self.fatal {
            if key.contains(fragment) {
                return Err(UploadError::Fatal {
                    key: key.to_string(),
                    message: "access denied".to_string(),
                });
            }
        }
        if let Some(fragment) = self.lost_ack {
            if key.contains(fragment) {
                let mut puts = self.puts.lock().unwrap();
                if puts.iter().any(|(existing, _)| existing == key) {
                    return Err(UploadError::AlreadyExists {
                        key: key.to_string(),
                    });
                }
                puts.push((key.to_string(), payload.len()));
                return Err(UploadError::Transient {
                    key: key.to_string(),
                    message: "connection reset".to_string(),
                });
            }
        }
        if let Some((fragment, failures)) = self.flaky {
            if key.contains(fragment) && attempt <= failures {
                return Err(UploadError::Transient {
                    key: key.to_string(),
                    message: "503 slow down".to_string(),
                });
            }
        }
        self.puts
            .lock()
            .unwrap()
            .push((key.to_string(), payload.len()));
        Ok(())
    }

    fn url(&self, key: &str) -> String {
        format!("test://{}", key)
    }
}

fn users(n: u64) -> Vec<Record> {
    let ids: Vec<u64> = (1..=n).collect();
    FakeRecordSource::new(3).generate(TableKind::Users, &ids, &ParentRefs::new())
}

fn split_evenly(rows: &[Record], parts: usize) -> Vec<FileChunk<'_>> {
    let size = rows.len().div_ceil(parts);
    rows.chunks(size)
        .enumerate()
        .map(|(i, group)| FileChunk {
            table: TableKind::Users,
            sequence_index: Some(i as u32 + 1),
            rows: group,
            estimated_byte_size: None,
        })
        .collect()
}

fn config(staging: &TempDir) -> UploadConfig {
    UploadConfig {
        retry_backoff: Duration::from_millis(1),
        staging_dir: Some(staging.path().to_path_buf()),
        ..UploadConfig::default()
    }
}

fn staged_files(staging: &TempDir) -> usize {
    fs::read_dir(staging.path()).unwrap().count()
}

#[test]
fn test_uploads_every_chunk_in_part_order() {
    let staging = TempDir::new().unwrap();
    let store = Arc::new(RecordingStore::default());
    let dispatcher = UploadDispatcher::new(store.clone(), config(&staging)).unwrap();

    let rows = users(90);
    let chunks = split_evenly(&rows, 3);
    let objects = dispatcher.upload_table(&chunks, "20250530143000").unwrap();

    let keys: Vec<&str> = objects.iter().map(|o| o.key.as_str()).collect();
    assert_eq!(
        keys,
        vec![
            "users/20250530143000_part_001.parquet",
            "users/20250530143000_part_002.parquet",
            "users/20250530143000_part_003.parquet",
        ]
    );
    assert_eq!(objects.iter().map(|o| o.rows).sum::<usize>(), 90);
    assert!(objects.iter().all(|o| o.bytes > 0));
    assert_eq!(objects[0].url, "test://users/20250530143000_part_001.parquet");
    assert_eq!(store.puts.lock().unwrap().len(), 3);
    assert_eq!(staged_files(&staging), 0);
}

#[test]
fn test_concurrency_is_bounded() {
    let staging = TempDir::new().unwrap();
    let store = Arc::new(RecordingStore::default());
    let dispatcher = UploadDispatcher::new(
        store.clone(),
        UploadConfig {
            concurrency: 2,
            ..config(&staging)
        },
    )
    .unwrap();

    let rows = users(60);
    let chunks = split_evenly(&rows, 6);
    dispatcher.upload_table(&chunks, "t").unwrap();

    assert_eq!(store.max_in_flight.load(Ordering::SeqCst), 2);
    assert_eq!(store.puts.lock().unwrap().len(), 6);
}

#[test]
fn test_transient_failures_are_retried() {
    let staging = TempDir::new().unwrap();
    let store = Arc::new(RecordingStore {
        flaky: Some(("users/", 2)),
        ..RecordingStore::default()
    });
    let dispatcher = UploadDispatcher::new(
        store.clone(),
        UploadConfig {
            concurrency: 1,
            ..config(&staging)
        },
    )
    .unwrap();

    let rows = users(10);
    let chunks = split_evenly(&rows, 1);
    let objects = dispatcher.upload_table(&chunks, "t").unwrap();

    assert_eq!(objects.len(), 1);
    assert_eq!(store.attempts.load(Ordering::SeqCst), 3);
}

#[test]
fn test_retries_exhausted_after_bound() {
    let staging = TempDir::new().unwrap();
    let store = Arc::new(RecordingStore {
        flaky: Some(("users/", usize::MAX)),
        ..RecordingStore::default()
    });
    let dispatcher = UploadDispatcher::new(
        store.clone(),
        UploadConfig {
            concurrency: 1,
            max_retries: 2,
            ..config(&staging)
        },
    )
    .unwrap();

    let rows = users(10);
    let chunks = split_evenly(&rows, 1);
    let err = dispatcher.upload_table(&chunks, "t").unwrap_err();

    assert!(matches!(err, UploadError::RetriesExhausted { attempts: 3, .. }));
    assert_eq!(err.key(), "users/t_part_001.parquet");
    assert_eq!(store.attempts.load(Ordering::SeqCst), 3);
    assert_eq!(staged_files(&staging), 0);
}

#[test]
fn test_fatal_failure_is_not_retried_and_cleans_up() {
    let staging = TempDir::new().unwrap();
    let store = Arc::new(RecordingStore {
        fatal: Some("_part_002"),
        ..RecordingStore::default()
    });
    let dispatcher = UploadDispatcher::new(store.clone(), config(&staging)).unwrap();

    let rows = users(40);
    let chunks = split_evenly(&rows, 4);
    let err = dispatcher.upload_table(&chunks, "t").unwrap_err();

    assert!(matches!(err, UploadError::Fatal { .. }));
    assert!(err.key().ends_with("_part_002.parquet"));
    assert!(store
        .puts
        .lock()
        .unwrap()
        .iter()
        .all(|(key, _)| !key.contains("_part_002")));
    assert_eq!(staged_files(&staging), 0);
}

#[test]
fn test_serialize_then_upload_separately() {
    let staging = TempDir::new().unwrap();
    let store = Arc::new(RecordingStore::default());
    let dispatcher = UploadDispatcher::new(store.clone(), config(&staging)).unwrap();

    let rows = users(5);
    let chunk = FileChunk {
        table: TableKind::Users,
        sequence_index: None,
        rows: &rows,
        estimated_byte_size: None,
    };
    let staged = dispatcher.serialize(&chunk).unwrap();
    assert!(staged.exists());
    assert_eq!(staged_files(&staging), 1);

    let key = dispatcher.upload(&staged, "users", "20250530143000").unwrap();
    assert_eq!(key, "users/20250530143000.parquet");
    let puts = store.puts.lock().unwrap().clone();
    assert_eq!(puts.len(), 1);
    assert_eq!(puts[0].0, key);
    assert_eq!(puts[0].1 as u64, fs::metadata(&staged).unwrap().len());

    drop(staged);
    assert_eq!(staged_files(&staging), 0);
}

#[test]
fn test_local_directory_store_writes_keys_as_paths() {
    let staging = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    let store = Arc::new(ObjectStoreRemote::local(out.path()).unwrap());
    let dispatcher = UploadDispatcher::new(
        store,
        UploadConfig {
            key_prefix: Some("raw".to_string()),
            ..config(&staging)
        },
    )
    .unwrap();

    let rows = users(20);
    let chunks = split_evenly(&rows, 2);
    let objects = dispatcher.upload_table(&chunks, "20250530143000").unwrap();

    for object in &objects {
        let path = out.path().join(&object.key);
        assert!(path.exists(), "missing {}", path.display());
        assert_eq!(fs::metadata(&path).unwrap().len(), object.bytes);
    }
    assert!(out
        .path()
        .join("raw/users/20250530143000_part_002.parquet")
        .exists());
}

#[test]
fn test_existing_key_on_retry_counts_as_uploaded() {
    let staging = TempDir::new().unwrap();
    let store = Arc::new(RecordingStore {
        lost_ack: Some("users/"),
        ..RecordingStore::default()
    });
    let dispatcher = UploadDispatcher::new(
        store.clone(),
        UploadConfig {
            concurrency: 1,
            ..config(&staging)
        },
    )
    .unwrap();

    let rows = users(10);
    let chunks = split_evenly(&rows, 1);
    let objects = dispatcher.upload_table(&chunks, "t").unwrap();

    assert_eq!(objects.len(), 1);
    assert_eq!(store.attempts.load(Ordering::SeqCst), 2);
    assert_eq!(store.puts.lock().unwrap().len(), 1);
    assert_eq!(staged_files(&staging), 0);
}

#[test]
fn test_existing_object_is_never_overwritten() {
    let staging = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    let store = Arc::new(ObjectStoreRemote::local(out.path()).unwrap());
    let dispatcher = UploadDispatcher::new(store, config(&staging)).unwrap();

    let first = users(20);
    let chunks = split_evenly(&first, 1);
    let objects = dispatcher.upload_table(&chunks, "20250530143000").unwrap();
    let path = out.path().join(&objects[0].key);
    let original = fs::read(&path).unwrap();

    let second = users(5);
    let chunks = split_evenly(&second, 1);
    let err = dispatcher
        .upload_table(&chunks, "20250530143000")
        .unwrap_err();

    assert!(matches!(err, UploadError::AlreadyExists { .. }));
    assert_eq!(err.key(), "users/20250530143000_part_001.parquet");
    assert_eq!(fs::read(&path).unwrap(), original);
    assert_eq!(staged_files(&staging), 0);
}

#[test]
fn test_staged_file_is_parquet() {
    let staging = TempDir::new().unwrap();
    let dispatcher =
        UploadDispatcher::new(Arc::new(RecordingStore::default()), config(&staging)).unwrap();

    let rows = users(3);
    let chunk = FileChunk {
        table: TableKind::Users,
        sequence_index: None,
        rows: &rows,
        estimated_byte_size: None,
    };
    let staged = dispatcher.serialize(&chunk).unwrap();
    let bytes = fs::read(&staged).unwrap();

    assert!(bytes.starts_with(b"PAR1"));
    assert!(bytes.ends_with(b"PAR1"));
}
