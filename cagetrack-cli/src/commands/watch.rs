//! `cagetrack watch`

use anyhow::Result;
use clap::Args;
use colored::Colorize;

use crate::output;
use crate::session::Session;

/// Follow the shared record store until Ctrl-C.
#[derive(Args, Debug)]
pub struct WatchArgs {}

impl WatchArgs {
    pub fn run(self) -> Result<()> {
        let session = Session::open()?;
        session.watch(|generation, counts, last_error| {
            println!("{}", format!("snapshot #{generation}").dimmed());
            if let Some(err) = last_error {
                println!("{} last store error: {err}", "!".yellow());
            }
            output::print_counts(counts);
        })
    }
}
