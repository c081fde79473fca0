//! Aggregation queries over the record store.
//!
//! Five independent, stateless, read-only computations. Each one owns its
//! exact filter, grouping, ordering and rounding contract; none of them
//! ever mutates the store.

use crate::model::{
    minor_to_decimal, Product, Status, KYC_DOCUMENT_SUBMITTED, KYC_TIER_UPGRADE,
    KYC_VERIFICATION_COMPLETED,
};
use crate::store::Store;
use rusqlite::OptionalExtension;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;
use std::collections::BTreeMap;

/// Merchant with the highest total SUCCESS volume.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopMerchant {
    pub merchant_id: String,
    /// Exact 2-decimal total, reconstructed from the minor-unit sum.
    pub total_volume: Decimal,
}

/// Unique merchant count for one product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductAdoption {
    pub product: String,
    pub merchants: i64,
}

/// Distinct-merchant counts for the three KYC funnel stages. The stages
/// are independent: a merchant counted under `tier_upgrades` need not
/// appear under `documents_submitted`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct KycFunnel {
    pub documents_submitted: i64,
    pub verifications_completed: i64,
    pub tier_upgrades: i64,
}

/// Failure percentage for one product, PENDING excluded.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailureRate {
    pub product: String,
    /// `FAILED / (FAILED + SUCCESS) * 100`, rounded to 1 decimal place.
    pub failure_rate: f64,
}

/// Merchant with the highest summed SUCCESS amount, or `None` when the
/// store holds no SUCCESS records at all. Ties break toward the
/// lexicographically smallest `merchant_id`.
pub fn top_merchant(store: &Store) -> Result<Option<TopMerchant>, rusqlite::Error> {
    let mut stmt = store.conn().prepare(
        "SELECT merchant_id, SUM(amount_minor) AS total
         FROM merchant_activities
         WHERE status = ?1
         GROUP BY merchant_id
         ORDER BY total DESC, merchant_id ASC
         LIMIT 1",
    )?;
    let row = stmt
        .query_row([Status::Success.as_str()], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })
        .optional()?;
    Ok(row.map(|(merchant_id, total)| TopMerchant {
        merchant_id,
        total_volume: minor_to_decimal(total),
    }))
}

/// Distinct merchants with at least one SUCCESS event per calendar month
/// (UTC), keyed `YYYY-MM` in ascending order. Records without a timestamp
/// are excluded; months with no qualifying records do not appear.
pub fn monthly_active_merchants(store: &Store) -> Result<BTreeMap<String, i64>, rusqlite::Error> {
    let mut stmt = store.conn().prepare(
        "SELECT strftime('%Y-%m', event_timestamp, 'unixepoch') AS month,
                COUNT(DISTINCT merchant_id)
         FROM merchant_activities
         WHERE status = ?1 AND event_timestamp IS NOT NULL
         GROUP BY month
         ORDER BY month ASC",
    )?;
    let rows = stmt.query_map([Status::Success.as_str()], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
    })?;

    let mut result = BTreeMap::new();
    for row in rows {
        let (month, merchants) = row?;
        result.insert(month, merchants);
    }
    Ok(result)
}

/// Distinct merchants per product regardless of status, sorted by count
/// descending (product name ascending on ties).
pub fn product_adoption(store: &Store) -> Result<Vec<ProductAdoption>, rusqlite::Error> {
    let mut stmt = store.conn().prepare(
        "SELECT product, COUNT(DISTINCT merchant_id) AS merchants
         FROM merchant_activities
         GROUP BY product
         ORDER BY merchants DESC, product ASC",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok(ProductAdoption {
            product: row.get(0)?,
            merchants: row.get(1)?,
        })
    })?;
    rows.collect()
}

/// KYC conversion funnel over SUCCESS events of the KYC product.
pub fn kyc_funnel(store: &Store) -> Result<KycFunnel, rusqlite::Error> {
    Ok(KycFunnel {
        documents_submitted: kyc_stage_count(store, KYC_DOCUMENT_SUBMITTED)?,
        verifications_completed: kyc_stage_count(store, KYC_VERIFICATION_COMPLETED)?,
        tier_upgrades: kyc_stage_count(store, KYC_TIER_UPGRADE)?,
    })
}

fn kyc_stage_count(store: &Store, event_type: &str) -> Result<i64, rusqlite::Error> {
    store.conn().query_row(
        "SELECT COUNT(DISTINCT merchant_id)
         FROM merchant_activities
         WHERE product = ?1 AND status = ?2 AND event_type = ?3",
        [Product::Kyc.as_str(), Status::Success.as_str(), event_type],
        |row| row.get(0),
    )
}

/// Failure rate per product, sorted descending (product name ascending on
/// ties). Only SUCCESS and FAILED records participate; a product with
/// nothing but PENDING records is absent from the result.
pub fn failure_rates(store: &Store) -> Result<Vec<FailureRate>, rusqlite::Error> {
    let mut stmt = store.conn().prepare(
        "SELECT product,
                SUM(CASE WHEN status = ?1 THEN 1 ELSE 0 END) AS failed,
                COUNT(*) AS total
         FROM merchant_activities
         WHERE status != ?2
         GROUP BY product",
    )?;
    let rows = stmt.query_map(
        [Status::Failed.as_str(), Status::Pending.as_str()],
        |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, i64>(2)?,
            ))
        },
    )?;

    let mut result = Vec::new();
    for row in rows {
        let (product, failed, total) = row?;
        if total == 0 {
            continue;
        }
        result.push(FailureRate {
            product,
            failure_rate: failure_percentage(failed, total),
        });
    }
    result.sort_by(|a, b| {
        b.failure_rate
            .partial_cmp(&a.failure_rate)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.product.cmp(&b.product))
    });
    Ok(result)
}

/// `failed / total * 100` rounded half-away to 1 decimal place. Computed
/// in `Decimal` so exact halves like 33.35 round up instead of being lost
/// to binary-float representation. Caller guarantees `total > 0`.
fn failure_percentage(failed: i64, total: i64) -> f64 {
    let rate = Decimal::from(failed) / Decimal::from(total) * Decimal::ONE_HUNDRED;
    rate.round_dp_with_strategy(1, RoundingStrategy::MidpointAwayFromZero)
        .to_f64()
        .unwrap_or(0.0)
}
