//! YAML configuration for the generate command.
//!
//! Every field is optional; CLI flags take precedence over the file.
//!
//! ```yaml
//! default:
//!   rows: 1000
//!   file_size_limit_mb: 5
//! tables:
//!   orders:
//!     rows: 5000
//! upload:
//!   bucket: analytics-raw
//!   prefix: synthetic
//!   concurrency: 8
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Settings applied to every table unless overridden
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DefaultConfig {
    pub rows: Option<usize>,
    pub file_size_limit_mb: Option<u64>,
}

/// Per-table overrides
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TableConfig {
    pub rows: Option<usize>,
    pub file_size_limit_mb: Option<u64>,
}

/// Destination and transfer settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadSection {
    pub bucket: Option<String>,
    pub local_dir: Option<PathBuf>,
    pub prefix: Option<String>,
    pub concurrency: Option<usize>,
    pub max_retries: Option<u32>,
    pub retry_backoff_ms: Option<u64>,
    /// snappy, zstd or none
    pub compression: Option<String>,
    pub staging_dir: Option<PathBuf>,
}

/// Complete YAML configuration for the generate command
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RunYamlConfig {
    pub default: DefaultConfig,
    pub tables: HashMap<String, TableConfig>,
    pub upload: UploadSection,
    pub ledger: Option<PathBuf>,
    pub seed: Option<u64>,
}

impl RunYamlConfig {
    /// Load configuration from a YAML file
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: RunYamlConfig = serde_yaml_ng::from_str(&content)?;
        Ok(config)
    }

    /// Get configuration for a specific table (case-insensitive)
    pub fn get_table_config(&self, table_name: &str) -> Option<&TableConfig> {
        self.tables.get(table_name).or_else(|| {
            let lower = table_name.to_lowercase();
            self.tables
                .iter()
                .find(|(k, _)| k.to_lowercase() == lower)
                .map(|(_, v)| v)
        })
    }

    /// Row count for a table (table-specific or default)
    pub fn get_rows(&self, table_name: &str) -> Option<usize> {
        self.get_table_config(table_name)
            .and_then(|c| c.rows)
            .or(self.default.rows)
    }

    /// File size ceiling in MB for a table (table-specific or default)
    pub fn get_file_size_limit(&self, table_name: &str) -> Option<u64> {
        self.get_table_config(table_name)
            .and_then(|c| c.file_size_limit_mb)
            .or(self.default.file_size_limit_mb)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let yaml = r#"
default:
  rows: 1000
  file_size_limit_mb: 5
tables:
  Orders:
    rows: 5000
upload:
  bucket: analytics-raw
  concurrency: 8
  compression: zstd
seed: 7
"#;
        let config: RunYamlConfig = serde_yaml_ng::from_str(yaml).unwrap();
        assert_eq!(config.get_rows("orders"), Some(5000));
        assert_eq!(config.get_rows("users"), Some(1000));
        assert_eq!(config.get_file_size_limit("orders"), Some(5));
        assert_eq!(config.upload.bucket.as_deref(), Some("analytics-raw"));
        assert_eq!(config.upload.concurrency, Some(8));
        assert_eq!(config.seed, Some(7));
    }

    #[test]
    fn test_empty_config_has_no_overrides() {
        let config: RunYamlConfig = serde_yaml_ng::from_str("{}").unwrap();
        assert_eq!(config.get_rows("users"), None);
        assert!(config.upload.bucket.is_none());
        assert!(config.ledger.is_none());
    }
}
