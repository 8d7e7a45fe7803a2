//! Identity ledger: durable per-table id state shared across runs.
//!
//! The ledger is the single source of truth for "what comes next" (`last_id`)
//! and "what can be referenced" (`existing_ids`). It is loaded once per run,
//! mutated only through [`IdentityLedger::commit`] after a table's uploads all
//! succeed, and written back with an atomic replace.
//!
//! On-disk format (JSON):
//!
//! ```json
//! {
//!   "users": { "last_id": 3, "existing_ids": [1, 2, 3] },
//!   "orders": { "last_id": 0, "existing_ids": [] }
//! }
//! ```
//!
//! Entries that only carry `last_id` (the compact format written by older
//! generators) are read as `existing_ids = 1..=last_id`.

use crate::error::LedgerError;
use ahash::AHashSet;
use rand::seq::IteratorRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use synth_records::TableKind;

/// Default ledger file name, relative to the working directory
pub const DEFAULT_LEDGER_FILE: &str = "metadata.json";

/// Per-table identity state
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TableLedgerEntry {
    pub last_id: u64,
    pub existing_ids: BTreeSet<u64>,
}

/// Stored shape of an entry; `existing_ids` is optional for compact files
#[derive(Debug, Deserialize)]
struct StoredEntry {
    #[serde(default)]
    last_id: u64,
    #[serde(default)]
    existing_ids: Option<Vec<u64>>,
}

impl TableLedgerEntry {
    /// Number of referenceable ids
    pub fn len(&self) -> usize {
        self.existing_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.existing_ids.is_empty()
    }

    fn from_stored(stored: StoredEntry) -> Result<Self, String> {
        let existing_ids: BTreeSet<u64> = match stored.existing_ids {
            Some(ids) => ids.into_iter().collect(),
            None => (1..=stored.last_id).collect(),
        };
        let max = existing_ids.last().copied().unwrap_or(0);
        if stored.last_id < max {
            return Err(format!(
                "last_id {} is below the largest existing id {}",
                stored.last_id, max
            ));
        }
        Ok(Self {
            last_id: stored.last_id,
            existing_ids,
        })
    }
}

/// In-memory ledger bound to its backing file
#[derive(Debug)]
pub struct IdentityLedger {
    path: PathBuf,
    entries: BTreeMap<String, TableLedgerEntry>,
    committed: AHashSet<String>,
}

impl IdentityLedger {
    /// Load the ledger at `path`, or start empty if the file does not exist.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, LedgerError> {
        let path = path.into();
        let mut entries = if path.exists() {
            read_entries(&path)?
        } else {
            BTreeMap::new()
        };

        for table in TableKind::ALL {
            entries.entry(table.name().to_string()).or_default();
        }

        Ok(Self {
            path,
            entries,
            committed: AHashSet::new(),
        })
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All entries, keyed by table name
    pub fn entries(&self) -> &BTreeMap<String, TableLedgerEntry> {
        &self.entries
    }

    pub fn entry(&self, table: &str) -> Option<&TableLedgerEntry> {
        self.entries.get(table)
    }

    /// `count` consecutive ids after the table's `last_id`. Does not mutate.
    pub fn next_ids(&self, table: &str, count: usize) -> Result<Vec<u64>, LedgerError> {
        let last_id = self.entries.get(table).map(|e| e.last_id).unwrap_or(0);
        let end = u64::try_from(count)
            .ok()
            .and_then(|count| last_id.checked_add(count))
            .ok_or_else(|| LedgerError::IdSpaceExhausted {
                table: table.to_string(),
                last_id,
                count,
            })?;
        Ok((last_id..end).map(|id| id + 1).collect())
    }

    /// Up to `count` distinct ids drawn uniformly from `parent`'s existing ids,
    /// in ascending order.
    pub fn sample_existing_ids<R: Rng + ?Sized>(
        &self,
        parent: &str,
        count: usize,
        rng: &mut R,
    ) -> Result<Vec<u64>, LedgerError> {
        let entry = self
            .entries
            .get(parent)
            .filter(|e| !e.is_empty())
            .ok_or_else(|| LedgerError::NoReferenceableParent {
                parent: parent.to_string(),
            })?;

        let mut ids = if count >= entry.len() {
            entry.existing_ids.iter().copied().collect()
        } else {
            entry.existing_ids.iter().copied().choose_multiple(rng, count)
        };
        ids.sort_unstable();
        Ok(ids)
    }

    /// Record `ids` as existing for `table` and advance `last_id`.
    ///
    /// Allowed once per table per ledger session; all ids must be new.
    pub fn commit(&mut self, table: &str, ids: &[u64]) -> Result<(), LedgerError> {
        if self.committed.contains(table) {
            return Err(LedgerError::AlreadyCommitted {
                table: table.to_string(),
            });
        }

        let entry = self.entries.entry(table.to_string()).or_default();
        if let Some(&id) = ids.iter().find(|id| entry.existing_ids.contains(id)) {
            return Err(LedgerError::IdCollision {
                table: table.to_string(),
                id,
            });
        }

        entry.existing_ids.extend(ids.iter().copied());
        if let Some(&max) = ids.iter().max() {
            entry.last_id = entry.last_id.max(max);
        }
        self.committed.insert(table.to_string());
        Ok(())
    }

    /// Whether `commit` already ran for `table` in this session
    pub fn is_committed(&self, table: &str) -> bool {
        self.committed.contains(table)
    }

    /// Write the whole ledger to disk, replacing the previous file atomically.
    pub fn persist(&self) -> Result<(), LedgerError> {
        let io_err = |action, source| LedgerError::Io {
            action,
            path: self.path.clone(),
            source,
        };

        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir).map_err(|e| io_err("create directory for", e))?;

        let mut tmp = tempfile::Builder::new()
            .prefix(".ledger-")
            .suffix(".json.tmp")
            .tempfile_in(&dir)
            .map_err(|e| io_err("create temp file for", e))?;

        {
            let mut writer = BufWriter::new(tmp.as_file_mut());
            serde_json::to_writer_pretty(&mut writer, &self.entries)
                .map_err(|e| io_err("serialize", e.into()))?;
            writer.write_all(b"\n").map_err(|e| io_err("write", e))?;
            writer.flush().map_err(|e| io_err("write", e))?;
        }
        tmp.as_file().sync_all().map_err(|e| io_err("sync", e))?;
        tmp.persist(&self.path)
            .map_err(|e| io_err("replace", e.error))?;
        Ok(())
    }
}

fn read_entries(path: &Path) -> Result<BTreeMap<String, TableLedgerEntry>, LedgerError> {
    let corrupt = |reason: String| LedgerError::CorruptState {
        path: path.to_path_buf(),
        reason,
    };

    let file = File::open(path).map_err(|source| LedgerError::Io {
        action: "open",
        path: path.to_path_buf(),
        source,
    })?;
    let stored: BTreeMap<String, StoredEntry> =
        serde_json::from_reader(BufReader::new(file)).map_err(|e| corrupt(e.to_string()))?;

    stored
        .into_iter()
        .map(|(table, entry)| {
            TableLedgerEntry::from_stored(entry)
                .map(|entry| (table.clone(), entry))
                .map_err(|reason| corrupt(format!("table '{}': {}", table, reason)))
        })
        .collect()
}
