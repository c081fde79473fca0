//! Canonical record model for merchant activity events.
//!
//! Every component works against the cleaning and normalization rules
//! defined here:
//! - string fields are trimmed before use
//! - `product`, `event_type` and `status` are upper-cased after trimming
//! - an empty required field invalidates the row; an empty optional field
//!   falls back to its sentinel value
//! - amounts never go negative and always carry exactly 2 decimal places

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;
use std::str::FromStr;
use uuid::Uuid;

/// KYC funnel stage: merchant submitted verification documents.
pub const KYC_DOCUMENT_SUBMITTED: &str = "DOCUMENT_SUBMITTED";
/// KYC funnel stage: verification completed.
pub const KYC_VERIFICATION_COMPLETED: &str = "VERIFICATION_COMPLETED";
/// KYC funnel stage: merchant tier upgraded.
pub const KYC_TIER_UPGRADE: &str = "TIER_UPGRADE";

/// Product categories merchants transact on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Product {
    Pos,
    Airtime,
    Bills,
    CardPayment,
    Savings,
    Moniebook,
    Kyc,
}

impl Product {
    pub const ALL: [Product; 7] = [
        Product::Pos,
        Product::Airtime,
        Product::Bills,
        Product::CardPayment,
        Product::Savings,
        Product::Moniebook,
        Product::Kyc,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Product::Pos => "POS",
            Product::Airtime => "AIRTIME",
            Product::Bills => "BILLS",
            Product::CardPayment => "CARD_PAYMENT",
            Product::Savings => "SAVINGS",
            Product::Moniebook => "MONIEBOOK",
            Product::Kyc => "KYC",
        }
    }

    /// Case-insensitive parse of a trimmed product name.
    pub fn parse(raw: &str) -> Option<Product> {
        let cleaned = raw.trim().to_ascii_uppercase();
        Product::ALL
            .into_iter()
            .find(|p| p.as_str() == cleaned)
    }
}

/// Outcome of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Status {
    Success,
    Failed,
    Pending,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Success => "SUCCESS",
            Status::Failed => "FAILED",
            Status::Pending => "PENDING",
        }
    }

    pub fn parse(raw: &str) -> Option<Status> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "SUCCESS" => Some(Status::Success),
            "FAILED" => Some(Status::Failed),
            "PENDING" => Some(Status::Pending),
            _ => None,
        }
    }
}

/// Channel the event came in through. `Unknown` is the fallback when the
/// source column is absent or carries an unrecognized value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Channel {
    Pos,
    App,
    Ussd,
    Web,
    Offline,
    Unknown,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Pos => "POS",
            Channel::App => "APP",
            Channel::Ussd => "USSD",
            Channel::Web => "WEB",
            Channel::Offline => "OFFLINE",
            Channel::Unknown => "UNKNOWN",
        }
    }

    /// Never fails; anything unrecognized maps to `Unknown`.
    pub fn parse(raw: &str) -> Channel {
        match raw.trim().to_ascii_uppercase().as_str() {
            "POS" => Channel::Pos,
            "APP" => Channel::App,
            "USSD" => Channel::Ussd,
            "WEB" => Channel::Web,
            "OFFLINE" => Channel::Offline,
            _ => Channel::Unknown,
        }
    }
}

/// Merchant KYC tier. `Starter` is the fallback for absent or
/// unrecognized values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MerchantTier {
    Starter,
    Verified,
    Premium,
}

impl MerchantTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            MerchantTier::Starter => "STARTER",
            MerchantTier::Verified => "VERIFIED",
            MerchantTier::Premium => "PREMIUM",
        }
    }

    /// Never fails; anything unrecognized maps to `Starter`.
    pub fn parse(raw: &str) -> MerchantTier {
        match raw.trim().to_ascii_uppercase().as_str() {
            "VERIFIED" => MerchantTier::Verified,
            "PREMIUM" => MerchantTier::Premium,
            _ => MerchantTier::Starter,
        }
    }
}

/// One merchant activity event, fully cleaned and normalized.
///
/// Records are created only by the ingestion pipeline and never mutated
/// after insert. `amount_minor` holds the amount in minor currency units
/// (kobo) so database sums stay exact; [`minor_to_decimal`] converts back
/// to a 2-decimal amount at the reporting boundary.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub event_id: Uuid,
    pub merchant_id: String,
    /// Unix seconds, UTC. `None` when the source value was missing or
    /// unparsable; such records are excluded from time-bucketed queries.
    pub event_timestamp: Option<i64>,
    pub product: Product,
    pub event_type: String,
    pub amount_minor: i64,
    pub status: Status,
    pub channel: Channel,
    pub region: String,
    pub merchant_tier: MerchantTier,
}

/// Fallback region when the source column is empty.
pub const REGION_UNKNOWN: &str = "UNKNOWN";

/// Parse a raw amount string into non-negative minor units.
///
/// Empty input means `0.00`. Parse failures and negative values also
/// normalize to zero. The value is rounded half-up to 2 decimal places
/// before conversion, so `"12.345"` becomes `1235` minor units. This
/// never fails.
pub fn parse_amount_minor(raw: &str) -> i64 {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return 0;
    }
    let Ok(value) = Decimal::from_str(trimmed) else {
        return 0;
    };
    if value < Decimal::ZERO {
        return 0;
    }
    let rounded = value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    // checked_mul: a value near Decimal::MAX cannot scale to minor units
    // and must degrade to zero, not panic mid-run.
    rounded
        .checked_mul(Decimal::ONE_HUNDRED)
        .and_then(|minor| minor.to_i64())
        .unwrap_or(0)
}

/// Convert stored minor units back into a 2-decimal amount.
pub fn minor_to_decimal(minor: i64) -> Decimal {
    Decimal::new(minor, 2)
}

/// Parse an event timestamp into Unix seconds (UTC).
///
/// Accepts RFC 3339 plus the naive `YYYY-MM-DD HH:MM:SS` /
/// `YYYY-MM-DDTHH:MM:SS` layouts (assumed UTC, fractional seconds
/// tolerated) and bare dates. Empty or unparsable input yields `None`;
/// the record itself stays valid.
pub fn parse_event_timestamp(raw: &str) -> Option<i64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.timestamp());
    }
    for fmt in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, fmt) {
            return Some(naive.and_utc().timestamp());
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Some(date.and_hms_opt(0, 0, 0)?.and_utc().timestamp());
    }
    None
}
