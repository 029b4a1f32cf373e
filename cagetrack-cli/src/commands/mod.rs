pub mod bulk;
pub mod cage;
pub mod counts;
pub mod export;
pub mod order;
pub mod reset;
pub mod retire;
pub mod watch;

use anyhow::{anyhow, Result};

/// Destructive commands run only when `--yes` was passed.
pub(crate) fn require_confirmation(yes: bool, action: &str) -> Result<()> {
    if yes {
        Ok(())
    } else {
        Err(anyhow!("refusing to {action} without --yes"))
    }
}
