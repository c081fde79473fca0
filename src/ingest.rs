//! CSV ingestion pipeline.
//!
//! Reads every `.csv` file in a directory (lexicographic order), cleans
//! and validates each row into a [`Record`], and bulk-inserts in batches
//! with conflict-skip semantics. The whole multi-file run executes inside
//! one transaction: a structural failure in any file (missing directory,
//! missing header columns, I/O or storage error) rolls back every insert
//! from the run. Malformed data rows are never fatal; they are counted
//! as skips and processing continues.

use crate::model::{
    parse_amount_minor, parse_event_timestamp, Channel, MerchantTier, Product, Record, Status,
    REGION_UNKNOWN,
};
use crate::store::{self, Store};
use csv::StringRecord;
use rusqlite::Transaction;
use std::collections::HashMap;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

/// Columns every source file must declare in its header row. Order is
/// irrelevant and unknown extra columns are ignored.
pub const REQUIRED_COLUMNS: [&str; 10] = [
    "event_id",
    "merchant_id",
    "event_timestamp",
    "product",
    "event_type",
    "amount",
    "status",
    "channel",
    "region",
    "merchant_tier",
];

/// Default bulk-insert batch size.
pub const DEFAULT_BATCH_SIZE: usize = 5000;

/// Row-level skip warnings logged per file before going quiet.
const MAX_ROW_WARNINGS: usize = 10;

#[derive(Debug)]
pub enum IngestError {
    /// Ingestion target is missing or not a directory. Raised before any
    /// work begins.
    Configuration(String),
    /// A file's header row is missing required columns. Fatal for the run.
    Schema { file: String, missing: Vec<String> },
    Io(std::io::Error),
    Csv(csv::Error),
    Storage(rusqlite::Error),
}

impl std::fmt::Display for IngestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IngestError::Configuration(msg) => write!(f, "Configuration error: {}", msg),
            IngestError::Schema { file, missing } => {
                write!(f, "Missing required columns in {}: {:?}", file, missing)
            }
            IngestError::Io(e) => write!(f, "I/O error: {}", e),
            IngestError::Csv(e) => write!(f, "CSV error: {}", e),
            IngestError::Storage(e) => write!(f, "Storage error: {}", e),
        }
    }
}

impl std::error::Error for IngestError {}

impl From<std::io::Error> for IngestError {
    fn from(err: std::io::Error) -> Self {
        IngestError::Io(err)
    }
}

impl From<csv::Error> for IngestError {
    fn from(err: csv::Error) -> Self {
        IngestError::Csv(err)
    }
}

impl From<rusqlite::Error> for IngestError {
    fn from(err: rusqlite::Error) -> Self {
        IngestError::Storage(err)
    }
}

/// Totals for one completed ingestion run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestSummary {
    pub files: usize,
    pub imported: usize,
    pub skipped: usize,
}

/// Ingest every CSV file under `data_dir` into the store.
///
/// All files run inside a single transaction; on any error the
/// transaction is dropped uncommitted and the store is left exactly as it
/// was before the run.
pub fn ingest_dir(
    store: &mut Store,
    data_dir: &Path,
    batch_size: usize,
) -> Result<IngestSummary, IngestError> {
    if !data_dir.exists() {
        return Err(IngestError::Configuration(format!(
            "data directory does not exist: {}",
            data_dir.display()
        )));
    }
    if !data_dir.is_dir() {
        return Err(IngestError::Configuration(format!(
            "path is not a directory: {}",
            data_dir.display()
        )));
    }

    let csv_files = list_csv_files(data_dir)?;
    if csv_files.is_empty() {
        log::warn!("No CSV files found in {}", data_dir.display());
        return Ok(IngestSummary::default());
    }

    log::info!(
        "Starting import from {} ({} file(s))",
        data_dir.display(),
        csv_files.len()
    );

    let tx = store.transaction()?;
    let mut summary = IngestSummary {
        files: csv_files.len(),
        ..IngestSummary::default()
    };

    for file in &csv_files {
        // Any error here returns early, dropping `tx` and rolling back
        // everything imported so far, including prior files.
        let (imported, skipped) = ingest_file(&tx, file, batch_size)?;
        summary.imported += imported;
        summary.skipped += skipped;
        log::info!(
            "Loaded {}: {} records imported, {} skipped",
            file_name(file),
            imported,
            skipped
        );
    }

    tx.commit()?;
    log::info!(
        "Import complete: {} imported, {} skipped across {} file(s)",
        summary.imported,
        summary.skipped,
        summary.files
    );
    Ok(summary)
}

/// Ingest one CSV file inside an existing transaction.
///
/// Returns `(imported, skipped)` row counts. Header problems abort the
/// file (and therefore the run); bad data rows only bump `skipped`.
pub fn ingest_file(
    tx: &Transaction<'_>,
    path: &Path,
    batch_size: usize,
) -> Result<(usize, usize), IngestError> {
    let file = File::open(path)?;
    ingest_reader(tx, file, &file_name(path), batch_size)
}

fn ingest_reader<R: std::io::Read>(
    tx: &Transaction<'_>,
    input: R,
    label: &str,
    batch_size: usize,
) -> Result<(usize, usize), IngestError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(input);

    let headers = reader.headers()?.clone();
    let header_map = build_header_map(&headers);

    let missing: Vec<String> = REQUIRED_COLUMNS
        .iter()
        .filter(|col| !header_map.contains_key(**col))
        .map(|col| col.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(IngestError::Schema {
            file: label.to_string(),
            missing,
        });
    }

    let mut batch: Vec<Record> = Vec::with_capacity(batch_size);
    let mut imported = 0usize;
    let mut skipped = 0usize;

    for (idx, result) in reader.records().enumerate() {
        // Data rows are 1-indexed after the header line.
        let line = idx + 2;
        let record = match result {
            Ok(record) => record,
            Err(e) => {
                let message = e.to_string();
                match e.into_kind() {
                    // A file that stops being readable mid-run is a
                    // structural failure, not a bad row: abort so the
                    // whole run rolls back.
                    csv::ErrorKind::Io(io_err) => return Err(IngestError::Io(io_err)),
                    _ => {
                        skipped += 1;
                        if skipped <= MAX_ROW_WARNINGS {
                            log::warn!("Skipping row {} in {}: {}", line, label, message);
                        }
                        continue;
                    }
                }
            }
        };

        match record_from_row(&record, &header_map) {
            Some(cleaned) => {
                batch.push(cleaned);
                if batch.len() >= batch_size {
                    store::insert_batch(tx, &batch)?;
                    imported += batch.len();
                    batch.clear();
                }
            }
            None => {
                skipped += 1;
                if skipped <= MAX_ROW_WARNINGS {
                    log::warn!("Skipping malformed row {} in {}", line, label);
                }
            }
        }
    }

    if !batch.is_empty() {
        store::insert_batch(tx, &batch)?;
        imported += batch.len();
    }

    Ok((imported, skipped))
}

/// Build a [`Record`] from one CSV row, or `None` when the row must be
/// skipped (empty required field, bad UUID, unknown product or status).
/// Optional fields fall back to their sentinels and a bad timestamp or
/// amount degrades to `None` / `0.00` without invalidating the row.
pub fn record_from_row(
    record: &StringRecord,
    header_map: &HashMap<String, usize>,
) -> Option<Record> {
    let event_id = uuid::Uuid::parse_str(get_required(record, header_map, "event_id")?).ok()?;
    let merchant_id = get_required(record, header_map, "merchant_id")?.to_string();
    let product = Product::parse(get_required(record, header_map, "product")?)?;
    let event_type = get_required(record, header_map, "event_type")?.to_ascii_uppercase();
    let status = Status::parse(get_required(record, header_map, "status")?)?;

    let event_timestamp =
        get_optional(record, header_map, "event_timestamp").and_then(parse_event_timestamp);
    let amount_minor = get_optional(record, header_map, "amount")
        .map(parse_amount_minor)
        .unwrap_or(0);
    let channel = get_optional(record, header_map, "channel")
        .map(Channel::parse)
        .unwrap_or(Channel::Unknown);
    let region = get_optional(record, header_map, "region")
        .map(str::to_string)
        .unwrap_or_else(|| REGION_UNKNOWN.to_string());
    let merchant_tier = get_optional(record, header_map, "merchant_tier")
        .map(MerchantTier::parse)
        .unwrap_or(MerchantTier::Starter);

    Some(Record {
        event_id,
        merchant_id,
        event_timestamp,
        product,
        event_type,
        amount_minor,
        status,
        channel,
        region,
        merchant_tier,
    })
}

fn list_csv_files(dir: &Path) -> Result<Vec<PathBuf>, std::io::Error> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_file()
                && path
                    .extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"))
        })
        .collect();
    files.sort();
    Ok(files)
}

fn build_header_map(headers: &StringRecord) -> HashMap<String, usize> {
    headers
        .iter()
        .enumerate()
        .map(|(idx, name)| (normalize_header_name(name), idx))
        .collect()
}

fn normalize_header_name(name: &str) -> String {
    // Excel-style UTF-8 exports can prefix the first header with a BOM;
    // without stripping it the schema check would report a missing column.
    name.trim().trim_start_matches('\u{feff}').to_ascii_lowercase()
}

fn get_required<'a>(
    record: &'a StringRecord,
    header_map: &HashMap<String, usize>,
    name: &str,
) -> Option<&'a str> {
    let idx = header_map.get(name)?;
    record.get(*idx).map(str::trim).filter(|s| !s.is_empty())
}

fn get_optional<'a>(
    record: &'a StringRecord,
    header_map: &HashMap<String, usize>,
    name: &str,
) -> Option<&'a str> {
    get_required(record, header_map, name)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{self, Read};

    fn header_map_for(columns: &[&str]) -> (StringRecord, HashMap<String, usize>) {
        let headers = StringRecord::from(columns.to_vec());
        let map = build_header_map(&headers);
        (headers, map)
    }

    fn full_row(values: &[&str]) -> (StringRecord, HashMap<String, usize>) {
        let (_, map) = header_map_for(&REQUIRED_COLUMNS);
        (StringRecord::from(values.to_vec()), map)
    }

    const VALID_UUID: &str = "d1f3b2a0-5c4e-4b6f-8a7d-9e0c1b2a3d4e";

    #[test]
    fn valid_row_is_cleaned_and_normalized() {
        let (row, map) = full_row(&[
            VALID_UUID,
            " MRC-001234 ",
            "2024-03-15T10:30:00Z",
            "pos",
            "card_transaction",
            "1500.505",
            "success",
            "app",
            " Lagos ",
            "verified",
        ]);
        let record = record_from_row(&row, &map).unwrap();
        assert_eq!(record.merchant_id, "MRC-001234");
        assert_eq!(record.product, Product::Pos);
        assert_eq!(record.event_type, "CARD_TRANSACTION");
        assert_eq!(record.amount_minor, 150_051);
        assert_eq!(record.status, Status::Success);
        assert_eq!(record.channel, Channel::App);
        assert_eq!(record.region, "Lagos");
        assert_eq!(record.merchant_tier, MerchantTier::Verified);
        assert!(record.event_timestamp.is_some());
    }

    #[test]
    fn missing_required_field_skips_row() {
        let (row, map) = full_row(&[
            VALID_UUID,
            "",
            "2024-03-15T10:30:00Z",
            "POS",
            "CARD_TRANSACTION",
            "100",
            "SUCCESS",
            "APP",
            "LAGOS",
            "VERIFIED",
        ]);
        assert!(record_from_row(&row, &map).is_none());
    }

    #[test]
    fn bad_uuid_skips_row() {
        let (row, map) = full_row(&[
            "not-a-uuid",
            "MRC-001234",
            "",
            "POS",
            "CARD_TRANSACTION",
            "100",
            "SUCCESS",
            "APP",
            "LAGOS",
            "VERIFIED",
        ]);
        assert!(record_from_row(&row, &map).is_none());
    }

    #[test]
    fn unknown_product_or_status_skips_row() {
        let (row, map) = full_row(&[
            VALID_UUID,
            "MRC-001234",
            "",
            "CRYPTO",
            "CARD_TRANSACTION",
            "100",
            "SUCCESS",
            "APP",
            "LAGOS",
            "VERIFIED",
        ]);
        assert!(record_from_row(&row, &map).is_none());

        let (row, map) = full_row(&[
            VALID_UUID,
            "MRC-001234",
            "",
            "POS",
            "CARD_TRANSACTION",
            "100",
            "CANCELLED",
            "APP",
            "LAGOS",
            "VERIFIED",
        ]);
        assert!(record_from_row(&row, &map).is_none());
    }

    #[test]
    fn optional_fields_fall_back() {
        let (row, map) = full_row(&[
            VALID_UUID,
            "MRC-001234",
            "garbage-timestamp",
            "KYC",
            "TIER_UPGRADE",
            "-50.00",
            "SUCCESS",
            "",
            "",
            "",
        ]);
        let record = record_from_row(&row, &map).unwrap();
        // Bad timestamp and negative amount degrade instead of skipping.
        assert_eq!(record.event_timestamp, None);
        assert_eq!(record.amount_minor, 0);
        assert_eq!(record.channel, Channel::Unknown);
        assert_eq!(record.region, REGION_UNKNOWN);
        assert_eq!(record.merchant_tier, MerchantTier::Starter);
    }

    /// Yields its chunks one `read` call at a time, then fails as if the
    /// underlying file vanished mid-run.
    struct FlakyReader {
        chunks: std::vec::IntoIter<Vec<u8>>,
    }

    impl Read for FlakyReader {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.chunks.next() {
                Some(chunk) => {
                    buf[..chunk.len()].copy_from_slice(&chunk);
                    Ok(chunk.len())
                }
                None => Err(io::Error::new(io::ErrorKind::BrokenPipe, "device went away")),
            }
        }
    }

    #[test]
    fn io_failure_mid_read_aborts_and_rolls_back() {
        let mut store = Store::open_in_memory().unwrap();
        let header = format!("{}\n", REQUIRED_COLUMNS.join(","));
        let row = format!(
            "{},MRC-000001,2024-03-15T10:30:00Z,POS,CARD_TRANSACTION,100.00,SUCCESS,POS,LAGOS,VERIFIED\n",
            VALID_UUID
        );
        let reader = FlakyReader {
            chunks: vec![header.into_bytes(), row.into_bytes()].into_iter(),
        };

        {
            let tx = store.transaction().unwrap();
            let err = ingest_reader(&tx, reader, "events.csv", 1).unwrap_err();
            assert!(matches!(err, IngestError::Io(_)));
            // Transaction dropped without commit.
        }
        // The valid row inserted before the failure must not survive.
        assert_eq!(store.record_count().unwrap(), 0);
    }

    #[test]
    fn invalid_utf8_row_is_skipped_not_fatal() {
        let mut store = Store::open_in_memory().unwrap();
        let mut data = format!("{}\n", REQUIRED_COLUMNS.join(",")).into_bytes();
        data.extend_from_slice(b"\xff\xfe,MRC-000001,,POS,X,1,SUCCESS,,,\n");
        data.extend(
            format!(
                "{},MRC-000002,,POS,CARD_TRANSACTION,100.00,SUCCESS,POS,LAGOS,VERIFIED\n",
                VALID_UUID
            )
            .into_bytes(),
        );

        let tx = store.transaction().unwrap();
        let (imported, skipped) =
            ingest_reader(&tx, io::Cursor::new(data), "events.csv", 10).unwrap();
        tx.commit().unwrap();

        assert_eq!(imported, 1);
        assert_eq!(skipped, 1);
        assert_eq!(store.record_count().unwrap(), 1);
    }

    #[test]
    fn header_map_tolerates_bom_and_case() {
        let (_, map) = header_map_for(&["\u{feff}Event_ID", "MERCHANT_id", "extra"]);
        assert!(map.contains_key("event_id"));
        assert!(map.contains_key("merchant_id"));
        assert!(map.contains_key("extra"));
    }
}
