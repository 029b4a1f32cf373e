//! `cagetrack reset-all --yes`

use anyhow::Result;
use clap::Args;
use colored::Colorize;

use crate::session::Session;

use super::require_confirmation;

/// Delete every order record.
#[derive(Args, Debug)]
pub struct ResetAllArgs {
    /// Confirm deleting all orders.
    #[arg(long)]
    pub yes: bool,
}

impl ResetAllArgs {
    pub fn run(self) -> Result<()> {
        require_confirmation(self.yes, "delete all orders")?;
        let mut session = Session::open()?;
        let removed = session.reset_all()?;
        println!("{} Deleted {} order(s)", "✓".green(), removed);
        Ok(())
    }
}
