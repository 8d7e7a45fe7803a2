mod generate;
mod ledger;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use std::io;
use std::path::PathBuf;

pub use generate::GenerateOptions;

#[derive(Parser)]
#[command(name = "synthgen")]
#[command(version)]
#[command(
    about = "Generate incremental synthetic users/products/orders data as Parquet files",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Generate rows for one or more tables and upload them as Parquet
    Generate {
        /// Tables to generate, in order (comma-separated: users, products, orders)
        #[arg(short, long)]
        tables: Option<String>,

        /// Rows to generate per table
        #[arg(short, long)]
        rows: Option<usize>,

        /// Destination S3 bucket (credentials from AWS_* environment variables)
        #[arg(short, long, conflicts_with_all = ["local_dir", "memory"])]
        bucket: Option<String>,

        /// Write objects to a local directory instead of S3
        #[arg(long, conflicts_with = "memory")]
        local_dir: Option<PathBuf>,

        /// Upload to a throwaway in-memory store (for trying things out)
        #[arg(long)]
        memory: bool,

        /// Maximum size per file in MB; larger tables are split into parts
        #[arg(short = 'l', long)]
        file_size_limit: Option<u64>,

        /// Ledger file holding id state between runs
        #[arg(long)]
        ledger: Option<PathBuf>,

        /// Key prefix in front of the table directory
        #[arg(long)]
        prefix: Option<String>,

        /// Concurrent uploads per table
        #[arg(long)]
        concurrency: Option<usize>,

        /// Retries per file after a transient upload failure
        #[arg(long)]
        max_retries: Option<u32>,

        /// Parquet compression: snappy, zstd, or none
        #[arg(long)]
        compression: Option<String>,

        /// Random seed for reproducible data
        #[arg(long)]
        seed: Option<u64>,

        /// YAML config file with defaults and per-table settings
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Generate and plan files without uploading or touching the ledger
        #[arg(long)]
        dry_run: bool,

        /// Show progress during upload
        #[arg(short, long)]
        progress: bool,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,

        /// Output the run report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the id state recorded in the ledger
    Ledger {
        /// Ledger file to read
        #[arg(long)]
        ledger: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Generate shell completion scripts
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

pub fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Generate {
            tables,
            rows,
            bucket,
            local_dir,
            memory,
            file_size_limit,
            ledger,
            prefix,
            concurrency,
            max_retries,
            compression,
            seed,
            config,
            dry_run,
            progress,
            verbose,
            json,
        } => generate::run(GenerateOptions {
            tables,
            rows,
            bucket,
            local_dir,
            memory,
            file_size_limit,
            ledger,
            prefix,
            concurrency,
            max_retries,
            compression,
            seed,
            config,
            dry_run,
            progress,
            verbose,
            json,
        }),
        Commands::Ledger { ledger, json } => ledger::run(ledger, json),
        Commands::Completions { shell } => {
            generate(shell, &mut Cli::command(), "synthgen", &mut io::stdout());
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_destinations_conflict() {
        let result = Cli::try_parse_from([
            "synthgen", "generate", "--bucket", "b", "--memory",
        ]);
        assert!(result.is_err());
    }
}
