//! Rendering shared by the command modules: operator-facing error text,
//! the order table, and JSON payloads.

use anyhow::Result;
use chrono::{DateTime, Local, Utc};
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use cagetrack_core::{CageCounts, LedgerError, OrderRecord};
use cagetrack_sync::SyncError;

/// Local wall-clock rendering used for every timestamp shown to the operator.
pub fn local_time(at: &DateTime<Utc>) -> String {
    at.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string()
}

/// The message printed after `error:` for a failed command.
pub fn operator_message(err: &anyhow::Error) -> String {
    for cause in err.chain() {
        if let Some(sync) = cause.downcast_ref::<SyncError>() {
            if sync.is_permission_denied() {
                return "the shared record store refused the write (permission denied); \
                        check access to the store file"
                    .to_string();
            }
        }
        if let Some(LedgerError::DuplicateOrder {
            id,
            cage,
            created_at,
            status,
        }) = cause.downcast_ref::<LedgerError>()
        {
            let cage = cage.as_ref().map_or("no cage", |c| c.as_str());
            return format!(
                "order {id} is already in {cage} ({status}, scanned {})",
                local_time(created_at)
            );
        }
    }
    format!("{err:#}")
}

// ---------------------------------------------------------------------------
// Orders
// ---------------------------------------------------------------------------

#[derive(Tabled)]
struct OrderRow {
    #[tabled(rename = "order")]
    id: String,
    #[tabled(rename = "cage")]
    cage: String,
    #[tabled(rename = "scanned")]
    scanned: String,
    #[tabled(rename = "status")]
    status: String,
    #[tabled(rename = "created at (key)")]
    created_at: String,
}

pub fn print_orders(records: &[OrderRecord]) {
    if records.is_empty() {
        println!("No orders.");
        return;
    }
    let rows: Vec<OrderRow> = records
        .iter()
        .map(|r| OrderRow {
            id: r.id.to_string(),
            cage: r.cage_label().to_string(),
            scanned: local_time(&r.created_at),
            status: r.status.to_string(),
            created_at: r.created_at.to_rfc3339(),
        })
        .collect();
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");
}

// ---------------------------------------------------------------------------
// Counts
// ---------------------------------------------------------------------------

#[derive(Tabled)]
struct CountRow {
    #[tabled(rename = "cage")]
    cage: String,
    #[tabled(rename = "in cage")]
    in_cage: usize,
}

pub fn print_counts(counts: &CageCounts) {
    let rows: Vec<CountRow> = counts
        .iter()
        .map(|c| CountRow {
            cage: c.cage.to_string(),
            in_cage: c.in_cage,
        })
        .collect();
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");
    println!("Total in cage: {}", counts.total());
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
