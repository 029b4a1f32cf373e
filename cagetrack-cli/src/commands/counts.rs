//! `cagetrack counts [--json]`

use anyhow::Result;
use clap::Args;

use crate::output;
use crate::session::Session;

#[derive(Args, Debug)]
pub struct CountsArgs {
    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

impl CountsArgs {
    pub fn run(self) -> Result<()> {
        let session = Session::open()?;
        let counts = session.counts();
        if self.json {
            return output::print_json(&counts);
        }
        output::print_counts(&counts);
        Ok(())
    }
}
