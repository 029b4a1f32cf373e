//! Synthetic bulk orders.
//!
//! Bulk ids have the shape `Bulk-<cage>-<batch instant in µs>-<index>`, which
//! keeps them distinct within a batch and from scanned barcodes. They are not
//! re-validated against the ledger.

use chrono::{DateTime, Utc};

use crate::error::LedgerError;
use crate::types::{CageName, OrderId, OrderRecord};

/// Largest batch a single bulk request may generate.
pub const MAX_BULK_COUNT: usize = 10_000;

/// Id of the `index`-th order in a batch created at `batch_instant`.
pub fn bulk_order_id(cage: &CageName, batch_instant: &DateTime<Utc>, index: usize) -> OrderId {
    OrderId(format!(
        "Bulk-{}-{}-{}",
        cage,
        batch_instant.timestamp_micros(),
        index
    ))
}

/// Generate `count` in-cage orders for `cage`, each stamped when it is built.
///
/// `count` must be in `1..=MAX_BULK_COUNT`.
pub fn generate_bulk(cage: &CageName, count: i64) -> Result<Vec<OrderRecord>, LedgerError> {
    build_batch(cage, count, Utc::now(), Utc::now)
}

/// [`generate_bulk`] with every record stamped at `now`.
pub fn generate_bulk_at(
    cage: &CageName,
    count: i64,
    now: DateTime<Utc>,
) -> Result<Vec<OrderRecord>, LedgerError> {
    build_batch(cage, count, now, || now)
}

fn build_batch(
    cage: &CageName,
    count: i64,
    batch_instant: DateTime<Utc>,
    mut stamp: impl FnMut() -> DateTime<Utc>,
) -> Result<Vec<OrderRecord>, LedgerError> {
    let size = usize::try_from(count)
        .ok()
        .filter(|n| (1..=MAX_BULK_COUNT).contains(n))
        .ok_or(LedgerError::InvalidCount { count })?;

    Ok((0..size)
        .map(|index| {
            OrderRecord::in_cage(
                bulk_order_id(cage, &batch_instant, index),
                Some(cage.clone()),
                stamp(),
            )
        })
        .collect())
}
