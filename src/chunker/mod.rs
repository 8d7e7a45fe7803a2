//! Size-estimating chunker.
//!
//! Splits a generated batch into consecutive, file-sized groups without
//! serializing the whole batch up front: a prefix sample is serialized, the
//! bytes-per-row it yields is extrapolated, and the batch is cut into groups
//! of `floor(ceiling / bytes_per_row)` rows (never fewer than one).
//!
//! The ceiling is soft. Compression ratios are only known after the real
//! file is written, so a chunk can land somewhat above the limit, and a
//! single row larger than the ceiling still gets its own chunk.

use anyhow::Result;
use synth_records::{Record, TableKind};

/// Upper bound on sampled rows
pub const DEFAULT_SAMPLE_ROWS: usize = 500;
/// Fraction of the batch to sample when that is smaller than the bound
pub const DEFAULT_SAMPLE_FRACTION: f64 = 0.10;
/// Batches at or below this size are always measured exactly
pub const MIN_SAMPLE_ROWS: usize = 100;

/// Bytes in one (decimal) megabyte, as used by `--file-size-limit`
pub const BYTES_PER_MB: u64 = 1_000_000;

/// Measures the serialized size of a set of rows
pub trait SizeProbe {
    fn measure(&self, table: TableKind, rows: &[Record]) -> Result<u64>;
}

/// Chunker settings
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChunkerConfig {
    /// Target maximum bytes per file; `None` means one file per table
    pub ceiling_bytes: Option<u64>,
    pub sample_rows: usize,
    pub sample_fraction: f64,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            ceiling_bytes: None,
            sample_rows: DEFAULT_SAMPLE_ROWS,
            sample_fraction: DEFAULT_SAMPLE_FRACTION,
        }
    }
}

impl ChunkerConfig {
    /// Config with a ceiling given in megabytes
    pub fn with_limit_mb(limit_mb: Option<u64>) -> Self {
        Self {
            ceiling_bytes: limit_mb.map(|mb| mb.saturating_mul(BYTES_PER_MB)),
            ..Self::default()
        }
    }

    /// Number of leading rows to serialize for a batch of `len` rows
    pub fn effective_sample_size(&self, len: usize) -> usize {
        let fraction = (len as f64 * self.sample_fraction).ceil() as usize;
        self.sample_rows.min(fraction.max(MIN_SAMPLE_ROWS))
    }
}

/// One contiguous slice of a batch, destined for one remote file
#[derive(Debug, Clone, PartialEq)]
pub struct FileChunk<'a> {
    pub table: TableKind,
    /// 1-based part index; `None` when the batch fits in a single file
    pub sequence_index: Option<u32>,
    pub rows: &'a [Record],
    /// Estimated serialized size; `None` when nothing was measured
    pub estimated_byte_size: Option<u64>,
}

impl FileChunk<'_> {
    /// File stem for this chunk within a run
    pub fn file_name(&self, timestamp: &str) -> String {
        chunk_file_name(timestamp, self.sequence_index)
    }
}

/// `"<ts>"` for a single file, `"<ts>_part_NNN"` for multi-part output
pub fn chunk_file_name(timestamp: &str, sequence_index: Option<u32>) -> String {
    match sequence_index {
        Some(index) => format!("{}_part_{:03}", timestamp, index),
        None => timestamp.to_string(),
    }
}

/// How a batch is going to be split
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChunkPlan {
    pub rows_per_chunk: usize,
    pub bytes_per_row: f64,
    /// Rows actually serialized to derive `bytes_per_row`
    pub measured_rows: usize,
    /// Whether the whole batch was measured rather than a sample
    pub exact: bool,
}

/// Splits batches according to a [`ChunkerConfig`]
pub struct Chunker<'p, P: SizeProbe + ?Sized> {
    probe: &'p P,
    config: ChunkerConfig,
}

impl<'p, P: SizeProbe + ?Sized> Chunker<'p, P> {
    pub fn new(probe: &'p P, config: ChunkerConfig) -> Self {
        Self { probe, config }
    }

    pub fn config(&self) -> &ChunkerConfig {
        &self.config
    }

    /// Decide rows-per-chunk for `rows`; `None` when no ceiling is configured.
    pub fn plan(&self, table: TableKind, rows: &[Record]) -> Result<Option<ChunkPlan>> {
        let Some(ceiling) = self.config.ceiling_bytes else {
            return Ok(None);
        };
        if rows.is_empty() {
            return Ok(None);
        }

        let sample_size = self.config.effective_sample_size(rows.len());
        let exact = rows.len() <= sample_size;
        let measured_rows = if exact { rows.len() } else { sample_size };
        let measured_bytes = self.probe.measure(table, &rows[..measured_rows])?;
        let bytes_per_row = measured_bytes as f64 / measured_rows as f64;

        let rows_per_chunk = if exact && measured_bytes <= ceiling {
            rows.len()
        } else {
            rows_per_chunk(ceiling, bytes_per_row, rows.len())
        };

        Ok(Some(ChunkPlan {
            rows_per_chunk,
            bytes_per_row,
            measured_rows,
            exact,
        }))
    }

    /// Partition `rows` into order-preserving chunks.
    pub fn split<'a>(&self, table: TableKind, rows: &'a [Record]) -> Result<Vec<FileChunk<'a>>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let plan = match self.plan(table, rows)? {
            Some(plan) => plan,
            None => {
                return Ok(vec![FileChunk {
                    table,
                    sequence_index: None,
                    rows,
                    estimated_byte_size: None,
                }])
            }
        };

        let groups: Vec<&'a [Record]> = rows.chunks(plan.rows_per_chunk).collect();
        let multi = groups.len() > 1;
        Ok(groups
            .into_iter()
            .enumerate()
            .map(|(i, group)| FileChunk {
                table,
                sequence_index: multi.then(|| i as u32 + 1),
                rows: group,
                estimated_byte_size: Some((plan.bytes_per_row * group.len() as f64).round() as u64),
            })
            .collect())
    }
}

/// `floor(ceiling / bytes_per_row)`, at least 1 and at most `total_rows`
fn rows_per_chunk(ceiling: u64, bytes_per_row: f64, total_rows: usize) -> usize {
    if bytes_per_row <= 0.0 {
        return total_rows.max(1);
    }
    let rows = (ceiling as f64 / bytes_per_row).floor();
    if rows >= total_rows as f64 {
        total_rows.max(1)
    } else {
        (rows as usize).max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rows_per_chunk_floor() {
        assert_eq!(rows_per_chunk(5_000_000, 600.0, 10_000), 8333);
        assert_eq!(rows_per_chunk(1_000, 5_000.0, 10), 1);
        assert_eq!(rows_per_chunk(1_000, 0.0, 10), 10);
        assert_eq!(rows_per_chunk(1_000_000, 10.0, 50), 50);
    }

    #[test]
    fn test_effective_sample_size() {
        let config = ChunkerConfig::default();
        assert_eq!(config.effective_sample_size(50), MIN_SAMPLE_ROWS);
        assert_eq!(config.effective_sample_size(2_000), 200);
        assert_eq!(config.effective_sample_size(1_000_000), DEFAULT_SAMPLE_ROWS);
    }

    #[test]
    fn test_chunk_file_names() {
        assert_eq!(chunk_file_name("202505301430", None), "202505301430");
        assert_eq!(
            chunk_file_name("202505301430", Some(2)),
            "202505301430_part_002"
        );
        assert_eq!(
            chunk_file_name("202505301430", Some(1234)),
            "202505301430_part_1234"
        );
    }

    #[test]
    fn test_limit_mb_is_decimal() {
        let config = ChunkerConfig::with_limit_mb(Some(5));
        assert_eq!(config.ceiling_bytes, Some(5_000_000));
        assert_eq!(ChunkerConfig::with_limit_mb(None).ceiling_bytes, None);
    }
}
