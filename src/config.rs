//! Runtime configuration from environment variables.

use crate::ingest::DEFAULT_BATCH_SIZE;
use std::env;

/// Configuration shared by the loader and report binaries.
///
/// Loaded from environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to the SQLite database file.
    pub db_path: String,

    /// Directory scanned for CSV files to ingest.
    pub data_dir: String,

    /// Rows per bulk insert.
    pub batch_size: usize,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `MERCHFLOW_DB_PATH` (default: data/merchflow.db)
    /// - `MERCHFLOW_DATA_DIR` (default: data)
    /// - `MERCHFLOW_BATCH_SIZE` (default: 5000)
    pub fn from_env() -> Self {
        Self {
            db_path: env::var("MERCHFLOW_DB_PATH")
                .unwrap_or_else(|_| "data/merchflow.db".to_string()),

            data_dir: env::var("MERCHFLOW_DATA_DIR").unwrap_or_else(|_| "data".to_string()),

            batch_size: env::var("MERCHFLOW_BATCH_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_BATCH_SIZE),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Defaults and overrides live in one test because env vars are
    // process-global and the harness runs tests in parallel.
    #[test]
    fn test_config_from_env() {
        env::remove_var("MERCHFLOW_DB_PATH");
        env::remove_var("MERCHFLOW_DATA_DIR");
        env::remove_var("MERCHFLOW_BATCH_SIZE");

        let config = Config::from_env();
        assert_eq!(config.db_path, "data/merchflow.db");
        assert_eq!(config.data_dir, "data");
        assert_eq!(config.batch_size, 5000);

        env::set_var("MERCHFLOW_DB_PATH", "/tmp/test.db");
        env::set_var("MERCHFLOW_DATA_DIR", "/tmp/csv");
        env::set_var("MERCHFLOW_BATCH_SIZE", "250");

        let config = Config::from_env();
        assert_eq!(config.db_path, "/tmp/test.db");
        assert_eq!(config.data_dir, "/tmp/csv");
        assert_eq!(config.batch_size, 250);

        env::remove_var("MERCHFLOW_DB_PATH");
        env::remove_var("MERCHFLOW_DATA_DIR");
        env::remove_var("MERCHFLOW_BATCH_SIZE");
    }
}
