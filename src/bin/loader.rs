//! Loader binary - CSV import into the merchant activity store.
//!
//! ## Usage
//!
//! ```bash
//! cargo run --release --bin loader -- --data-dir data --batch-size 5000
//! ```
//!
//! ## Environment Variables
//!
//! - MERCHFLOW_DB_PATH - SQLite database path (default: data/merchflow.db)
//! - MERCHFLOW_DATA_DIR - Directory of CSV files (default: data)
//! - MERCHFLOW_BATCH_SIZE - Rows per bulk insert (default: 5000)
//! - RUST_LOG - Logging level (optional, default: info)
//!
//! Command-line flags override the environment: `--db`, `--data-dir`,
//! `--batch-size`.

use merchflow::{ingest_dir, Config, Store};
use std::env;
use std::path::Path;

fn flag_value(args: &[String], flag: &str) -> Option<String> {
    args.iter()
        .position(|arg| arg == flag)
        .and_then(|idx| args.get(idx + 1))
        .cloned()
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();

    dotenv::dotenv().ok();

    let mut config = Config::from_env();
    let args: Vec<String> = env::args().collect();
    if let Some(db) = flag_value(&args, "--db") {
        config.db_path = db;
    }
    if let Some(dir) = flag_value(&args, "--data-dir") {
        config.data_dir = dir;
    }
    if let Some(batch) = flag_value(&args, "--batch-size") {
        config.batch_size = batch.parse()?;
    }

    log::info!("Database: {}", config.db_path);
    log::info!("Data directory: {}", config.data_dir);
    log::info!("Batch size: {}", config.batch_size);

    let mut store = Store::open(&config.db_path)?;
    match ingest_dir(&mut store, Path::new(&config.data_dir), config.batch_size) {
        Ok(summary) => {
            log::info!(
                "Done: {} imported, {} skipped ({} file(s))",
                summary.imported,
                summary.skipped,
                summary.files
            );
            Ok(())
        }
        Err(e) => {
            log::error!("Import failed, all changes rolled back: {}", e);
            Err(e.into())
        }
    }
}
