//! `cagetrack cage list | add | rename | reset`

use anyhow::Result;
use clap::{Args, Subcommand};
use colored::Colorize;

use crate::session::Session;

use super::require_confirmation;

/// Manage the cage registry.
#[derive(Subcommand, Debug)]
pub enum CageCommand {
    /// List registered cages in display order, then cages only records still reference.
    List,

    /// Register a new cage at the end of the list.
    Add(AddArgs),

    /// Rename a cage and move its orders to the new name.
    Rename(RenameArgs),

    /// Restore the default cage list. Orders are left as they are.
    Reset(ResetArgs),
}

#[derive(Args, Debug)]
pub struct AddArgs {
    pub name: String,
}

#[derive(Args, Debug)]
pub struct RenameArgs {
    pub old: String,
    pub new: String,
}

#[derive(Args, Debug)]
pub struct ResetArgs {
    /// Confirm the reset.
    #[arg(long)]
    pub yes: bool,
}

pub fn run(cmd: CageCommand) -> Result<()> {
    match cmd {
        CageCommand::List => list(),
        CageCommand::Add(args) => add(args),
        CageCommand::Rename(args) => rename(args),
        CageCommand::Reset(args) => reset(args),
    }
}

fn list() -> Result<()> {
    let session = Session::open()?;
    for cage in session.registry().cages() {
        println!("{cage}");
    }
    let orphaned = session.orphaned_cages();
    if !orphaned.is_empty() {
        println!();
        println!("{}", "Not registered (still referenced by orders):".yellow());
        for cage in orphaned {
            println!("  {cage}");
        }
    }
    Ok(())
}

fn add(args: AddArgs) -> Result<()> {
    let mut session = Session::open()?;
    let cage = session.add_cage(&args.name)?;
    println!("{} Added cage {}", "✓".green(), cage.to_string().bold());
    Ok(())
}

fn rename(args: RenameArgs) -> Result<()> {
    let mut session = Session::open()?;
    let rename = session.rename_cage(&args.old, &args.new)?;
    println!(
        "{} Renamed {} to {} ({} order(s) updated)",
        "✓".green(),
        rename.from,
        rename.to.to_string().bold(),
        rename.records_updated
    );
    Ok(())
}

fn reset(args: ResetArgs) -> Result<()> {
    require_confirmation(args.yes, "reset the cage list")?;
    let mut session = Session::open()?;
    let orphaned = session.reset_cages()?;
    println!(
        "{} Restored {} default cages",
        "✓".green(),
        session.registry().len()
    );
    if !orphaned.is_empty() {
        let names: Vec<String> = orphaned.iter().map(ToString::to_string).collect();
        println!(
            "{} orders still reference unregistered cages: {}",
            "!".yellow(),
            names.join(", ")
        );
    }
    Ok(())
}
