//! `cagetrack export [--start ..] [--end ..] [--format csv|json] [--out DIR]`

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use clap::Args;
use colored::Colorize;

use cagetrack_core::filter::filter_by_date_in;
use cagetrack_core::{DateRange, OrderRecord};
use cagetrack_export::{all_hint, export_records, filtered_hint, ExporterSlot, SheetFormat};

use crate::session::Session;

/// Write orders to a sheet file.
#[derive(Args, Debug)]
pub struct ExportArgs {
    /// First day to include (YYYY-MM-DD).
    #[arg(long)]
    pub start: Option<NaiveDate>,

    /// Last day to include (YYYY-MM-DD).
    #[arg(long)]
    pub end: Option<NaiveDate>,

    /// Sheet format: csv | json | xlsx.
    #[arg(long, default_value_t = SheetFormat::Csv)]
    pub format: SheetFormat,

    /// Directory to write into. Defaults to `export_dir` or ~/.cagetrack/exports.
    #[arg(long)]
    pub out: Option<PathBuf>,
}

impl ExportArgs {
    pub fn run(self) -> Result<()> {
        let session = Session::open()?;
        let dir = self
            .out
            .clone()
            .unwrap_or_else(|| session.config().export_dir_at(session.home()));
        let slot = ExporterSlot::resolve(self.format, &dir);

        let records = session.records();
        let range = DateRange::new(self.start, self.end);
        let (selected, hint): (Vec<OrderRecord>, String) = if range.is_unbounded() {
            (records, all_hint(Local::now().date_naive()))
        } else {
            let selected = filter_by_date_in(&records, range, &Local)
                .into_iter()
                .cloned()
                .collect();
            (selected, filtered_hint(&range))
        };

        let path = export_records(&slot, &selected, &hint)
            .with_context(|| format!("{} export failed", self.format))?;
        tracing::info!(path = %path.display(), rows = selected.len(), "sheet written");
        println!(
            "{} Exported {} order(s) to {}",
            "✓".green(),
            selected.len(),
            path.display()
        );
        Ok(())
    }
}
