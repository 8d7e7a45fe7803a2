//! Ledger command CLI handler.

use crate::ledger::{IdentityLedger, DEFAULT_LEDGER_FILE};
use serde::Serialize;
use std::path::PathBuf;

#[derive(Serialize)]
struct LedgerJsonOutput {
    ledger: String,
    exists: bool,
    tables: Vec<LedgerTableSummary>,
}

#[derive(Serialize)]
struct LedgerTableSummary {
    table: String,
    last_id: u64,
    existing: usize,
    /// Ids at or below `last_id` that are not live
    gaps: u64,
}

pub fn run(ledger: Option<PathBuf>, json: bool) -> anyhow::Result<()> {
    let path = ledger.unwrap_or_else(|| PathBuf::from(DEFAULT_LEDGER_FILE));
    let exists = path.exists();
    let ledger = IdentityLedger::load(&path)?;

    let tables: Vec<LedgerTableSummary> = ledger
        .entries()
        .iter()
        .map(|(table, entry)| LedgerTableSummary {
            table: table.clone(),
            last_id: entry.last_id,
            existing: entry.len(),
            gaps: entry.last_id.saturating_sub(entry.len() as u64),
        })
        .collect();

    if json {
        let output = LedgerJsonOutput {
            ledger: path.display().to_string(),
            exists,
            tables,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("Ledger: {}", path.display());
    if !exists {
        println!("  (no ledger file yet, all tables start at id 1)");
    }
    println!();
    println!("  {:<12} {:>12} {:>12}", "TABLE", "LAST_ID", "EXISTING");
    for summary in &tables {
        println!(
            "  {:<12} {:>12} {:>12}",
            summary.table, summary.last_id, summary.existing
        );
        if summary.gaps > 0 {
            println!("  {:<12} {} id(s) below last_id are not live", "", summary.gaps);
        }
    }

    Ok(())
}
