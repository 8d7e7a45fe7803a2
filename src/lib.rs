// Allow dead code for items that are part of the public API but only used in tests
#![allow(dead_code)]

pub mod chunker;
pub mod error;
pub mod ledger;
pub mod parquet;
pub mod progress;
pub mod run;
pub mod upload;
