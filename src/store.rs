//! SQLite-backed record store.
//!
//! One table keyed by `event_id`, written exclusively by the ingestion
//! pipeline and read by the aggregation queries. Schema bootstrap is
//! idempotent (`IF NOT EXISTS` everywhere) so opening an existing
//! database is safe.

use crate::model::Record;
use rusqlite::{params, Connection, Transaction};
use std::path::Path;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS merchant_activities (
    event_id        TEXT PRIMARY KEY,
    merchant_id     TEXT NOT NULL,
    event_timestamp INTEGER,
    product         TEXT NOT NULL,
    event_type      TEXT NOT NULL,
    amount_minor    INTEGER NOT NULL CHECK (amount_minor >= 0),
    status          TEXT NOT NULL,
    channel         TEXT NOT NULL,
    region          TEXT NOT NULL,
    merchant_tier   TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_activities_merchant_status
    ON merchant_activities (merchant_id, status);
CREATE INDEX IF NOT EXISTS idx_activities_product_status
    ON merchant_activities (product, status);
CREATE INDEX IF NOT EXISTS idx_activities_timestamp
    ON merchant_activities (event_timestamp);
"#;

/// Handle to the merchant activity database.
pub struct Store {
    conn: Connection,
}

impl Store {
    /// Open (or create) the database at `path` and bootstrap the schema.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, rusqlite::Error> {
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    /// In-memory database with the same schema. Used by tests.
    pub fn open_in_memory() -> Result<Self, rusqlite::Error> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    /// Begin a write transaction. Dropping the transaction without
    /// committing rolls back every insert made through it.
    pub fn transaction(&mut self) -> Result<Transaction<'_>, rusqlite::Error> {
        self.conn.transaction()
    }

    /// Total number of stored records.
    pub fn record_count(&self) -> Result<i64, rusqlite::Error> {
        self.conn
            .query_row("SELECT COUNT(*) FROM merchant_activities", [], |row| {
                row.get(0)
            })
    }

    pub(crate) fn conn(&self) -> &Connection {
        &self.conn
    }
}

/// Bulk-insert a batch with conflict-skip semantics: a duplicate
/// `event_id` is silently dropped, never an error and never an overwrite.
pub fn insert_batch(tx: &Transaction<'_>, batch: &[Record]) -> Result<(), rusqlite::Error> {
    let mut stmt = tx.prepare_cached(
        "INSERT OR IGNORE INTO merchant_activities (
            event_id, merchant_id, event_timestamp, product, event_type,
            amount_minor, status, channel, region, merchant_tier
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
    )?;
    for record in batch {
        stmt.execute(params![
            record.event_id.to_string(),
            record.merchant_id,
            record.event_timestamp,
            record.product.as_str(),
            record.event_type,
            record.amount_minor,
            record.status.as_str(),
            record.channel.as_str(),
            record.region,
            record.merchant_tier.as_str(),
        ])?;
    }
    Ok(())
}
