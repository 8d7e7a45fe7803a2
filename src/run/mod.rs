//! Run orchestrator.
//!
//! Drives each requested table through
//! `PENDING → IDS_RESERVED → ROWS_GENERATED → CHUNKED → UPLOADING → COMMITTED`,
//! one table at a time, against a single [`IdentityLedger`]. A table that
//! fails moves to `FAILED` with the state it failed in; nothing is committed
//! for it and later tables still run.

pub mod config;

use crate::chunker::{Chunker, ChunkerConfig, FileChunk, SizeProbe};
use crate::error::{LedgerError, TableError};
use crate::ledger::IdentityLedger;
use crate::progress;
use crate::upload::{UploadDispatcher, UploadedObject};
use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use std::fmt;
use synth_records::{record_id, ParentRefs, Record, RecordSource, TableKind};

pub use config::RunYamlConfig;

/// Format of the per-run timestamp used in object names
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

/// Timestamp string shared by every file of a run
pub fn run_timestamp(now: DateTime<Utc>) -> String {
    now.format(TIMESTAMP_FORMAT).to_string()
}

/// Per-table lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TableState {
    Pending,
    IdsReserved,
    RowsGenerated,
    Chunked,
    Uploading,
    Committed,
    Failed,
}

impl fmt::Display for TableState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TableState::Pending => "PENDING",
            TableState::IdsReserved => "IDS_RESERVED",
            TableState::RowsGenerated => "ROWS_GENERATED",
            TableState::Chunked => "CHUNKED",
            TableState::Uploading => "UPLOADING",
            TableState::Committed => "COMMITTED",
            TableState::Failed => "FAILED",
        };
        f.pad(s)
    }
}

/// One (table, row count) pair to generate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableRequest {
    pub table: TableKind,
    pub rows: usize,
    /// File size ceiling; `None` writes the whole table as one file
    pub ceiling_bytes: Option<u64>,
}

impl TableRequest {
    pub fn new(table: TableKind, rows: usize) -> Self {
        Self {
            table,
            rows,
            ceiling_bytes: None,
        }
    }

    pub fn with_ceiling(mut self, ceiling_bytes: Option<u64>) -> Self {
        self.ceiling_bytes = ceiling_bytes;
        self
    }
}

/// Orchestrator settings
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub requests: Vec<TableRequest>,
    /// Shared by every object name in the run
    pub timestamp: String,
    /// Seeds parent id sampling
    pub seed: u64,
    /// Sampling settings; the ceiling comes from each [`TableRequest`]
    pub chunker: ChunkerConfig,
    /// Generate and chunk only; no uploads, no ledger writes
    pub dry_run: bool,
    pub verbose: bool,
    pub progress: bool,
}

impl RunConfig {
    pub fn new(requests: Vec<TableRequest>, timestamp: impl Into<String>) -> Self {
        Self {
            requests,
            timestamp: timestamp.into(),
            seed: 0,
            chunker: ChunkerConfig::default(),
            dry_run: false,
            verbose: false,
            progress: false,
        }
    }
}

/// Final status of one table
#[derive(Debug, Clone, Serialize)]
pub struct TableOutcome {
    pub table: TableKind,
    pub state: TableState,
    /// State the table was in when it failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_in: Option<TableState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub requested_rows: usize,
    /// First and last id generated for this table
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_range: Option<(u64, u64)>,
    pub objects: Vec<UploadedObject>,
}

impl TableOutcome {
    fn pending(request: &TableRequest) -> Self {
        Self {
            table: request.table,
            state: TableState::Pending,
            failed_in: None,
            reason: None,
            requested_rows: request.rows,
            id_range: None,
            objects: Vec::new(),
        }
    }

    pub fn is_committed(&self) -> bool {
        self.state == TableState::Committed
    }
}

/// Result of a whole run
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub timestamp: String,
    pub dry_run: bool,
    pub tables: Vec<TableOutcome>,
}

impl RunReport {
    /// Every requested table reached `COMMITTED`
    pub fn all_committed(&self) -> bool {
        self.tables.iter().all(TableOutcome::is_committed)
    }

    pub fn failed(&self) -> impl Iterator<Item = &TableOutcome> {
        self.tables
            .iter()
            .filter(|t| t.state == TableState::Failed)
    }

    /// Exit criterion: all committed, or for a dry run, nothing failed
    pub fn is_success(&self) -> bool {
        if self.dry_run {
            self.failed().next().is_none()
        } else {
            self.all_committed()
        }
    }

    pub fn outcome(&self, table: TableKind) -> Option<&TableOutcome> {
        self.tables.iter().find(|t| t.table == table)
    }
}

/// Sequences ledger, record source, chunker and dispatcher for a run
pub struct Runner<'a, S: RecordSource + ?Sized> {
    ledger: &'a mut IdentityLedger,
    source: &'a mut S,
    dispatcher: &'a UploadDispatcher,
    probe: &'a dyn SizeProbe,
    config: RunConfig,
}

impl<'a, S: RecordSource + ?Sized> Runner<'a, S> {
    /// Sizes chunks with the dispatcher's own Parquet writer.
    pub fn new(
        ledger: &'a mut IdentityLedger,
        source: &'a mut S,
        dispatcher: &'a UploadDispatcher,
        config: RunConfig,
    ) -> Self {
        Self {
            ledger,
            source,
            probe: dispatcher.writer(),
            dispatcher,
            config,
        }
    }

    pub fn with_probe(mut self, probe: &'a dyn SizeProbe) -> Self {
        self.probe = probe;
        self
    }

    /// Process every request in order and report per-table outcomes.
    pub fn run(mut self) -> RunReport {
        let mut rng = StdRng::seed_from_u64(self.config.seed);
        let requests = self.config.requests.clone();
        let mut tables = Vec::with_capacity(requests.len());

        for request in &requests {
            let mut outcome = TableOutcome::pending(request);
            if let Err(e) = self.run_table(request, &mut outcome, &mut rng) {
                if self.config.verbose || self.config.progress {
                    eprintln!("  {} failed in {}: {}", request.table, outcome.state, e);
                }
                outcome.failed_in = Some(outcome.state);
                outcome.state = TableState::Failed;
                outcome.reason = Some(e.to_string());
            }
            tables.push(outcome);
        }

        RunReport {
            timestamp: self.config.timestamp.clone(),
            dry_run: self.config.dry_run,
            tables,
        }
    }

    fn run_table(
        &mut self,
        request: &TableRequest,
        outcome: &mut TableOutcome,
        rng: &mut StdRng,
    ) -> Result<(), TableError> {
        let table = request.table;
        let name = table.name();
        let verbose = self.config.verbose;

        // PENDING → IDS_RESERVED
        let ids = self.ledger.next_ids(name, request.rows)?;
        let mut parent_refs = ParentRefs::new();
        for parent in table.parents() {
            let sampled = self
                .ledger
                .sample_existing_ids(parent.name(), request.rows, rng)
                .map_err(|source| match source {
                    LedgerError::NoReferenceableParent { .. } => {
                        TableError::NoReferenceableParent {
                            table: name.to_string(),
                            source,
                        }
                    }
                    other => TableError::Ledger(other),
                })?;
            parent_refs.insert(*parent, sampled);
        }
        outcome.id_range = ids.first().zip(ids.last()).map(|(a, b)| (*a, *b));
        outcome.state = TableState::IdsReserved;
        if verbose {
            eprintln!(
                "{}: reserved {} ids starting at {}",
                name,
                ids.len(),
                ids.first().copied().unwrap_or(0)
            );
        }

        // IDS_RESERVED → ROWS_GENERATED
        let rows = self.source.generate(table, &ids, &parent_refs);
        if rows.len() != ids.len() {
            return Err(TableError::RowCountMismatch {
                table: name.to_string(),
                expected: ids.len(),
                actual: rows.len(),
            });
        }
        if batch_ids(&rows) != ids {
            return Err(TableError::IdMismatch {
                table: name.to_string(),
            });
        }
        outcome.state = TableState::RowsGenerated;

        // ROWS_GENERATED → CHUNKED
        let chunker_config = ChunkerConfig {
            ceiling_bytes: request.ceiling_bytes,
            ..self.config.chunker
        };
        let chunks = Chunker::new(self.probe, chunker_config)
            .split(table, &rows)
            .map_err(|e| TableError::Chunking {
                table: name.to_string(),
                message: format!("{:#}", e),
            })?;
        outcome.state = TableState::Chunked;
        if verbose {
            eprintln!("{}: {} rows in {} file(s)", name, rows.len(), chunks.len());
        }

        if self.config.dry_run {
            outcome.objects = self.planned_objects(&chunks);
            return Ok(());
        }

        // CHUNKED → UPLOADING → COMMITTED
        outcome.state = TableState::Uploading;
        outcome.objects = self.upload(name, &chunks)?;

        self.ledger.commit(name, &ids)?;
        self.ledger.persist()?;
        outcome.state = TableState::Committed;
        if verbose {
            eprintln!("{}: committed, last_id now {}", name, ids.last().copied().unwrap_or(0));
        }
        Ok(())
    }

    fn upload(
        &self,
        table: &str,
        chunks: &[FileChunk<'_>],
    ) -> Result<Vec<UploadedObject>, TableError> {
        let timestamp = &self.config.timestamp;
        if !self.config.progress {
            return Ok(self.dispatcher.upload_table(chunks, timestamp)?);
        }

        let estimate: u64 = chunks.iter().filter_map(|c| c.estimated_byte_size).sum();
        let pb = progress::upload_bar(table, estimate);
        let pb_clone = pb.clone();
        let result = self
            .dispatcher
            .upload_table_with_progress(chunks, timestamp, &move |bytes: u64| {
                pb_clone.set_position(bytes)
            });
        match &result {
            Ok(objects) => {
                let total = objects.iter().map(|o| o.bytes).sum();
                progress::finish(&pb, total, "done");
            }
            Err(_) => pb.abandon_with_message("failed"),
        }
        Ok(result?)
    }

    fn planned_objects(&self, chunks: &[FileChunk<'_>]) -> Vec<UploadedObject> {
        chunks
            .iter()
            .map(|chunk| {
                let key = self.dispatcher.key_for(chunk, &self.config.timestamp);
                UploadedObject {
                    url: key.clone(),
                    key,
                    sequence_index: chunk.sequence_index,
                    rows: chunk.rows.len(),
                    bytes: chunk.estimated_byte_size.unwrap_or(0),
                }
            })
            .collect()
    }
}

/// Ids carried by `rows`, in row order
pub fn batch_ids(rows: &[Record]) -> Vec<u64> {
    rows.iter().filter_map(record_id).collect()
}
