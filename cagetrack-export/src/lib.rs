//! # cagetrack-export
//!
//! Sheet exporters: turn a sequence of order records into a CSV, JSON or
//! Excel file.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::path::Path;
//! use cagetrack_export::{export_records, filtered_hint, ExporterSlot, SheetFormat};
//! use cagetrack_core::{DateRange, OrderRecord};
//!
//! fn export(records: &[OrderRecord]) {
//!     let slot = ExporterSlot::resolve(SheetFormat::Csv, Path::new("/tmp/exports"));
//!     let hint = filtered_hint(&DateRange::default());
//!     match export_records(&slot, records, &hint) {
//!         Ok(path) => println!("wrote {}", path.display()),
//!         Err(err) => eprintln!("{err}"),
//!     }
//! }
//! ```

pub mod error;
pub mod exporter;
pub mod row;

pub use error::ExportError;
pub use exporter::{
    all_hint, export_records, filtered_hint, CsvSheetExporter, ExporterSlot, JsonSheetExporter,
    SheetExporter, SheetFormat, XlsxSheetExporter,
};
pub use row::SheetRow;
