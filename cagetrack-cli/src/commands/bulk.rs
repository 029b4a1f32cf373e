//! `cagetrack bulk <cage> <count>`

use anyhow::{anyhow, Result};
use clap::Args;
use colored::Colorize;

use cagetrack_core::CageName;

use crate::session::Session;

/// Add synthetic in-cage orders to a registered cage.
#[derive(Args, Debug)]
pub struct BulkArgs {
    /// Registered cage to fill.
    pub cage: String,

    /// Number of orders to generate (1 to 10000).
    #[arg(allow_negative_numbers = true)]
    pub count: i64,
}

impl BulkArgs {
    pub fn run(self) -> Result<()> {
        let mut session = Session::open()?;
        let cage = self.cage.trim();
        if !session.registry().contains(cage) {
            return Err(anyhow!(
                "cage '{cage}' is not registered (see `cagetrack cage list`)"
            ));
        }

        let batch = session.generate_bulk(&CageName::from(cage), self.count)?;
        println!(
            "{} Added {} orders to {}",
            "✓".green(),
            batch.len(),
            cage.bold()
        );
        Ok(())
    }
}
