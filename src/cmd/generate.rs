//! Generate command CLI handler.

use crate::chunker::{ChunkerConfig, BYTES_PER_MB};
use crate::ledger::{IdentityLedger, DEFAULT_LEDGER_FILE};
use crate::parquet::Compression;
use crate::run::{self, RunConfig, RunReport, RunYamlConfig, Runner, TableRequest, TableState};
use crate::upload::{ObjectStoreRemote, RemoteStore, UploadConfig, UploadDispatcher};
use anyhow::Context;
use chrono::Utc;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use synth_records::{FakeRecordSource, TableKind};

/// Everything the `generate` subcommand accepts
#[derive(Debug, Clone, Default)]
pub struct GenerateOptions {
    pub tables: Option<String>,
    pub rows: Option<usize>,
    pub bucket: Option<String>,
    pub local_dir: Option<PathBuf>,
    pub memory: bool,
    pub file_size_limit: Option<u64>,
    pub ledger: Option<PathBuf>,
    pub prefix: Option<String>,
    pub concurrency: Option<usize>,
    pub max_retries: Option<u32>,
    pub compression: Option<String>,
    pub seed: Option<u64>,
    pub config: Option<PathBuf>,
    pub dry_run: bool,
    pub progress: bool,
    pub verbose: bool,
    pub json: bool,
}

/// Where uploaded objects go
#[derive(Debug, Clone, PartialEq, Eq)]
enum Destination {
    S3(String),
    Local(PathBuf),
    Memory,
}

pub fn run(opts: GenerateOptions) -> anyhow::Result<()> {
    let yaml = match &opts.config {
        Some(path) => RunYamlConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => RunYamlConfig::default(),
    };

    let tables = resolve_tables(opts.tables.as_deref(), &yaml)?;
    let requests = resolve_requests(&tables, opts.rows, opts.file_size_limit, &yaml)?;
    let destination = resolve_destination(&opts, &yaml)?;
    let upload_config = resolve_upload_config(&opts, &yaml)?;

    let ledger_path = opts
        .ledger
        .clone()
        .or_else(|| yaml.ledger.clone())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_LEDGER_FILE));
    // A corrupt ledger aborts before any table runs.
    let mut ledger = IdentityLedger::load(&ledger_path)?;

    let seed = opts.seed.or(yaml.seed).unwrap_or_else(rand::random);
    let timestamp = run::run_timestamp(Utc::now());

    if opts.verbose {
        eprintln!("Ledger: {}", ledger_path.display());
        eprintln!("Destination: {:?}", destination);
        eprintln!("Seed: {}", seed);
        eprintln!("Run timestamp: {}", timestamp);
    }

    let store: Arc<dyn RemoteStore> = match &destination {
        Destination::S3(bucket) => Arc::new(ObjectStoreRemote::s3(bucket)?),
        Destination::Local(dir) => Arc::new(ObjectStoreRemote::local(dir)?),
        Destination::Memory => Arc::new(ObjectStoreRemote::in_memory()),
    };
    let dispatcher = UploadDispatcher::new(store, upload_config)
        .context("Failed to start upload runtime")?;

    let mut source = FakeRecordSource::new(seed);
    let config = RunConfig {
        seed,
        chunker: ChunkerConfig::default(),
        dry_run: opts.dry_run,
        verbose: opts.verbose,
        progress: opts.progress && !opts.json,
        ..RunConfig::new(requests, timestamp)
    };

    let start_time = Instant::now();
    let report = Runner::new(&mut ledger, &mut source, &dispatcher, config).run();
    let elapsed = start_time.elapsed();

    if opts.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report, elapsed, opts.verbose);
    }

    if !report.is_success() {
        let failed = report.failed().count();
        anyhow::bail!(
            "{} of {} table(s) failed",
            failed,
            report.tables.len()
        );
    }
    Ok(())
}

/// Requested tables in order; unknown names are an error.
fn resolve_tables(tables: Option<&str>, yaml: &RunYamlConfig) -> anyhow::Result<Vec<TableKind>> {
    let mut resolved = Vec::new();
    match tables {
        Some(list) => {
            for name in list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
                let table = name
                    .parse::<TableKind>()
                    .map_err(|e| anyhow::anyhow!("{}", e))?;
                if !resolved.contains(&table) {
                    resolved.push(table);
                }
            }
        }
        None => {
            for name in yaml.tables.keys() {
                name.parse::<TableKind>()
                    .map_err(|e| anyhow::anyhow!("In config: {}", e))?;
            }
            resolved.extend(
                TableKind::ALL
                    .into_iter()
                    .filter(|t| yaml.get_table_config(t.name()).is_some()),
            );
        }
    }

    if resolved.is_empty() {
        anyhow::bail!("Must specify --tables or list tables in --config");
    }
    Ok(resolved)
}

fn resolve_requests(
    tables: &[TableKind],
    rows: Option<usize>,
    file_size_limit: Option<u64>,
    yaml: &RunYamlConfig,
) -> anyhow::Result<Vec<TableRequest>> {
    tables
        .iter()
        .map(|&table| {
            let rows = rows
                .or_else(|| yaml.get_rows(table.name()))
                .ok_or_else(|| anyhow::anyhow!("Must specify --rows (or rows for {} in --config)", table))?;
            if rows == 0 {
                anyhow::bail!("--rows must be greater than 0");
            }

            let limit_mb = file_size_limit.or_else(|| yaml.get_file_size_limit(table.name()));
            if limit_mb == Some(0) {
                anyhow::bail!("--file-size-limit must be greater than 0");
            }

            Ok(TableRequest::new(table, rows)
                .with_ceiling(limit_mb.map(|mb| mb.saturating_mul(BYTES_PER_MB))))
        })
        .collect()
}

fn resolve_destination(
    opts: &GenerateOptions,
    yaml: &RunYamlConfig,
) -> anyhow::Result<Destination> {
    if opts.memory {
        return Ok(Destination::Memory);
    }
    if let Some(bucket) = &opts.bucket {
        return Ok(Destination::S3(bucket.clone()));
    }
    if let Some(dir) = &opts.local_dir {
        return Ok(Destination::Local(dir.clone()));
    }
    if let Some(bucket) = &yaml.upload.bucket {
        return Ok(Destination::S3(bucket.clone()));
    }
    if let Some(dir) = &yaml.upload.local_dir {
        return Ok(Destination::Local(dir.clone()));
    }
    if opts.dry_run {
        return Ok(Destination::Memory);
    }
    anyhow::bail!("Must specify a destination: --bucket, --local-dir, or --memory")
}

fn resolve_upload_config(
    opts: &GenerateOptions,
    yaml: &RunYamlConfig,
) -> anyhow::Result<UploadConfig> {
    let defaults = UploadConfig::default();
    let upload = &yaml.upload;

    let concurrency = opts
        .concurrency
        .or(upload.concurrency)
        .unwrap_or(defaults.concurrency);
    if concurrency == 0 {
        anyhow::bail!("--concurrency must be greater than 0");
    }

    let compression = match opts.compression.as_ref().or(upload.compression.as_ref()) {
        Some(c) => c
            .parse::<Compression>()
            .map_err(|e| anyhow::anyhow!("{}", e))?,
        None => defaults.compression,
    };

    Ok(UploadConfig {
        concurrency,
        max_retries: opts
            .max_retries
            .or(upload.max_retries)
            .unwrap_or(defaults.max_retries),
        retry_backoff: upload
            .retry_backoff_ms
            .map(Duration::from_millis)
            .unwrap_or(defaults.retry_backoff),
        key_prefix: opts.prefix.clone().or_else(|| upload.prefix.clone()),
        staging_dir: upload.staging_dir.clone(),
        compression,
    })
}

fn print_report(report: &RunReport, elapsed: Duration, verbose: bool) {
    if report.dry_run {
        println!("\n✓ Dry run completed!");
    } else if report.all_committed() {
        println!("\n✓ Generation completed successfully!");
    } else {
        println!("\n✗ Generation finished with failures");
    }

    println!("\nTables:");
    for outcome in &report.tables {
        let ids = outcome
            .id_range
            .map(|(first, last)| format!("ids {}..{}", first, last))
            .unwrap_or_default();
        match outcome.state {
            TableState::Failed => println!(
                "  {:<10} FAILED in {}: {}",
                outcome.table,
                outcome.failed_in.map(|s| s.to_string()).unwrap_or_default(),
                outcome.reason.as_deref().unwrap_or("unknown error")
            ),
            state => println!(
                "  {:<10} {} {} rows, {} file(s) {}",
                outcome.table,
                state,
                outcome.requested_rows,
                outcome.objects.len(),
                ids
            ),
        }

        if verbose || report.dry_run {
            for object in &outcome.objects {
                println!("    - {} ({} rows, {} bytes)", object.url, object.rows, object.bytes);
            }
        }
    }

    println!("\nRun timestamp: {}", report.timestamp);
    println!("Elapsed time: {:.3?}", elapsed);
}
