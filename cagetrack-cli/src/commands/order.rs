//! `cagetrack order add | delete | list`

use anyhow::Result;
use chrono::{DateTime, Local, NaiveDate, Utc};
use clap::{Args, Subcommand};
use colored::Colorize;

use cagetrack_core::filter::filter_by_date_in;
use cagetrack_core::{DateRange, OrderId, OrderRecord};

use crate::output;
use crate::session::Session;

use super::require_confirmation;

/// Scan, delete, and list orders.
#[derive(Subcommand, Debug)]
pub enum OrderCommand {
    /// Record a scanned order in a cage.
    Add(AddArgs),

    /// Delete one order by id and creation time.
    Delete(DeleteArgs),

    /// List orders, optionally limited to a date range (local days, inclusive).
    List(ListArgs),
}

#[derive(Args, Debug)]
pub struct AddArgs {
    /// Order id as scanned; surrounding whitespace is ignored.
    pub id: String,

    /// Cage to record the order in. Defaults to the first registered cage.
    #[arg(long, short = 'c')]
    pub cage: Option<String>,
}

#[derive(Args, Debug)]
pub struct DeleteArgs {
    pub id: String,

    /// Creation time of the record (RFC 3339, as shown by `order list`).
    #[arg(long = "created-at", value_name = "RFC3339")]
    pub created_at: DateTime<Utc>,

    /// Confirm the deletion.
    #[arg(long)]
    pub yes: bool,
}

#[derive(Args, Debug)]
pub struct ListArgs {
    /// First day to include (YYYY-MM-DD).
    #[arg(long)]
    pub start: Option<NaiveDate>,

    /// Last day to include (YYYY-MM-DD).
    #[arg(long)]
    pub end: Option<NaiveDate>,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

pub fn run(cmd: OrderCommand) -> Result<()> {
    match cmd {
        OrderCommand::Add(args) => add(args),
        OrderCommand::Delete(args) => delete(args),
        OrderCommand::List(args) => list(args),
    }
}

fn add(args: AddArgs) -> Result<()> {
    let mut session = Session::open()?;
    let cage = session.select_cage(args.cage.as_deref())?;
    let record = session.add_order(&args.id, cage)?;
    println!(
        "{} Scanned {} into {}",
        "✓".green(),
        record.id.to_string().bold(),
        record.cage_label()
    );
    Ok(())
}

fn delete(args: DeleteArgs) -> Result<()> {
    require_confirmation(args.yes, &format!("delete order {}", args.id))?;
    let mut session = Session::open()?;
    let removed = session.delete_order(&OrderId::from(args.id.trim()), &args.created_at)?;
    println!(
        "{} Deleted {} ({}, scanned {})",
        "✓".green(),
        removed.id,
        removed.cage_label(),
        output::local_time(&removed.created_at)
    );
    Ok(())
}

fn list(args: ListArgs) -> Result<()> {
    let session = Session::open()?;
    let records = session.records();
    let range = DateRange::new(args.start, args.end);
    let selected: Vec<OrderRecord> = filter_by_date_in(&records, range, &Local)
        .into_iter()
        .cloned()
        .collect();

    if args.json {
        return output::print_json(&selected);
    }
    output::print_orders(&selected);
    Ok(())
}
