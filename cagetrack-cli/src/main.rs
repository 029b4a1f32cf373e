//! Cagetrack: order-to-cage tracking CLI.
//!
//! # Usage
//!
//! ```text
//! cagetrack order add <ID> [--cage <CAGE>]
//! cagetrack order delete <ID> --created-at <RFC3339> --yes
//! cagetrack order list [--start YYYY-MM-DD] [--end YYYY-MM-DD] [--json]
//! cagetrack bulk <CAGE> <COUNT>
//! cagetrack retire <CAGE> --yes
//! cagetrack reset-all --yes
//! cagetrack cage list | add <NAME> | rename <OLD> <NEW> | reset --yes
//! cagetrack counts [--json]
//! cagetrack export [--start ..] [--end ..] [--format csv|json|xlsx] [--out DIR]
//! cagetrack watch
//! ```

mod commands;
mod output;
mod session;

use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;

use commands::{
    bulk::BulkArgs, cage::CageCommand, counts::CountsArgs, export::ExportArgs,
    order::OrderCommand, reset::ResetAllArgs, retire::RetireArgs, watch::WatchArgs,
};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "cagetrack",
    version,
    about = "Track orders scanned into holding cages",
    long_about = None,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Scan, list, and delete individual orders.
    Order {
        #[command(subcommand)]
        command: OrderCommand,
    },

    /// Add N synthetic in-cage orders to a cage.
    Bulk(BulkArgs),

    /// Mark every in-cage order of a cage as completed.
    Retire(RetireArgs),

    /// Delete every order.
    ResetAll(ResetAllArgs),

    /// Manage the cage registry.
    Cage {
        #[command(subcommand)]
        command: CageCommand,
    },

    /// Show in-cage counts per registered cage.
    Counts(CountsArgs),

    /// Write orders to a CSV or JSON sheet.
    Export(ExportArgs),

    /// Follow the shared record store and print counts on every change.
    Watch(WatchArgs),
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::debug!(error = ?err, "command failed");
            eprintln!("{} {}", "error:".red().bold(), output::operator_message(&err));
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Order { command } => commands::order::run(command),
        Commands::Bulk(args) => args.run(),
        Commands::Retire(args) => args.run(),
        Commands::ResetAll(args) => args.run(),
        Commands::Cage { command } => commands::cage::run(command),
        Commands::Counts(args) => args.run(),
        Commands::Export(args) => args.run(),
        Commands::Watch(args) => args.run(),
    }
}

/// Logs go to stderr; `RUST_LOG` overrides the default `warn` level.
fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
