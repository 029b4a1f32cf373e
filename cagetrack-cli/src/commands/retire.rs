//! `cagetrack retire <cage> --yes`

use anyhow::Result;
use clap::Args;
use colored::Colorize;

use crate::session::Session;

use super::require_confirmation;

/// Mark every in-cage order of a cage as completed.
#[derive(Args, Debug)]
pub struct RetireArgs {
    pub cage: String,

    /// Confirm the reset.
    #[arg(long)]
    pub yes: bool,
}

impl RetireArgs {
    pub fn run(self) -> Result<()> {
        require_confirmation(self.yes, &format!("reset cage {}", self.cage))?;
        let mut session = Session::open()?;
        let retired = session.retire_cage(self.cage.trim())?;
        println!(
            "{} Completed {} order(s) in {}",
            "✓".green(),
            retired,
            self.cage.trim().bold()
        );
        Ok(())
    }
}
