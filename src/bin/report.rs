//! Report binary - runs the five aggregate queries and prints JSON.
//!
//! Stands in for the HTTP layer during development: each top-level key of
//! the emitted object corresponds to one analytics endpoint.
//!
//! ## Usage
//!
//! ```bash
//! cargo run --release --bin report -- --db data/merchflow.db
//! ```

use merchflow::{analytics, Config, Store};
use serde_json::json;
use std::env;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();

    dotenv::dotenv().ok();

    let mut config = Config::from_env();
    let args: Vec<String> = env::args().collect();
    if let Some(idx) = args.iter().position(|arg| arg == "--db") {
        if let Some(db) = args.get(idx + 1) {
            config.db_path = db.clone();
        }
    }

    let store = Store::open(&config.db_path)?;
    log::info!(
        "Reporting over {} stored records in {}",
        store.record_count()?,
        config.db_path
    );

    let report = json!({
        "top_merchant": analytics::top_merchant(&store)?,
        "monthly_active_merchants": analytics::monthly_active_merchants(&store)?,
        "product_adoption": analytics::product_adoption(&store)?,
        "kyc_funnel": analytics::kyc_funnel(&store)?,
        "failure_rates": analytics::failure_rates(&store)?,
    });

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
