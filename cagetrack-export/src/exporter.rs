//! Sheet exporters and the exporter slot.
//!
//! | Format | File                | Content                                   |
//! |--------|---------------------|-------------------------------------------|
//! | CSV    | `<hint>.csv`        | header `id,cage,createdAt,status` + rows  |
//! | JSON   | `<hint>.json`       | array of row objects                      |
//! | XLSX   | `<hint>.xlsx`       | one `Orders` worksheet, bold header row   |
//!
//! All write `<file>.tmp` in the export directory and rename it into place.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::NaiveDate;
use rust_xlsxwriter::{Format, Workbook, XlsxError};
use serde::{Deserialize, Serialize};

use cagetrack_core::{DateRange, OrderRecord};

use crate::error::{io_err, ExportError};
use crate::row::{SheetRow, HEADER};

// ---------------------------------------------------------------------------
// SheetFormat
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SheetFormat {
    #[default]
    Csv,
    Json,
    Xlsx,
}

impl SheetFormat {
    pub fn all() -> &'static [SheetFormat] {
        &[SheetFormat::Csv, SheetFormat::Json, SheetFormat::Xlsx]
    }

    pub fn extension(&self) -> &'static str {
        match self {
            SheetFormat::Csv => "csv",
            SheetFormat::Json => "json",
            SheetFormat::Xlsx => "xlsx",
        }
    }
}

impl fmt::Display for SheetFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for SheetFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(SheetFormat::Csv),
            "json" => Ok(SheetFormat::Json),
            "xlsx" => Ok(SheetFormat::Xlsx),
            other => Err(format!(
                "unknown sheet format '{other}' (expected csv, json or xlsx)"
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// SheetExporter
// ---------------------------------------------------------------------------

pub trait SheetExporter: Send + Sync {
    fn format(&self) -> SheetFormat;

    /// Write `records` to a file named after `filename_hint` and return its path.
    fn export(&self, records: &[OrderRecord], filename_hint: &str) -> Result<PathBuf, ExportError>;
}

#[derive(Debug, Clone)]
pub struct CsvSheetExporter {
    dir: PathBuf,
}

impl CsvSheetExporter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// CSV text for `records`, one line per record after the header.
    pub fn render(records: &[OrderRecord]) -> String {
        let mut out = HEADER.join(",");
        out.push('\n');
        for record in records {
            let row = SheetRow::from_record(record);
            let line: Vec<String> = row.cells().iter().map(|c| csv_escape(c)).collect();
            out.push_str(&line.join(","));
            out.push('\n');
        }
        out
    }
}

impl SheetExporter for CsvSheetExporter {
    fn format(&self) -> SheetFormat {
        SheetFormat::Csv
    }

    fn export(&self, records: &[OrderRecord], filename_hint: &str) -> Result<PathBuf, ExportError> {
        write_sheet(&self.dir, filename_hint, self.format(), &Self::render(records))
    }
}

#[derive(Debug, Clone)]
pub struct JsonSheetExporter {
    dir: PathBuf,
}

impl JsonSheetExporter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl SheetExporter for JsonSheetExporter {
    fn format(&self) -> SheetFormat {
        SheetFormat::Json
    }

    fn export(&self, records: &[OrderRecord], filename_hint: &str) -> Result<PathBuf, ExportError> {
        let rows: Vec<SheetRow> = records.iter().map(SheetRow::from_record).collect();
        let json = serde_json::to_string_pretty(&rows)?;
        write_sheet(&self.dir, filename_hint, self.format(), &json)
    }
}

/// Excel workbook with a single `Orders` worksheet.
#[derive(Debug, Clone)]
pub struct XlsxSheetExporter {
    dir: PathBuf,
}

impl XlsxSheetExporter {
    pub const SHEET_NAME: &'static str = "Orders";

    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn workbook(records: &[OrderRecord]) -> Result<Workbook, XlsxError> {
        let mut workbook = Workbook::new();
        let bold = Format::new().set_bold();
        let sheet = workbook.add_worksheet();
        sheet.set_name(Self::SHEET_NAME)?;

        for (col, title) in (0u16..).zip(HEADER) {
            sheet.write_string_with_format(0, col, title, &bold)?;
        }
        for (row, record) in (1u32..).zip(records) {
            let sheet_row = SheetRow::from_record(record);
            for (col, cell) in (0u16..).zip(sheet_row.cells()) {
                sheet.write_string(row, col, cell)?;
            }
        }
        Ok(workbook)
    }
}

impl SheetExporter for XlsxSheetExporter {
    fn format(&self) -> SheetFormat {
        SheetFormat::Xlsx
    }

    fn export(&self, records: &[OrderRecord], filename_hint: &str) -> Result<PathBuf, ExportError> {
        let path = sheet_path(&self.dir, filename_hint, self.format());
        let tmp = path.with_extension("xlsx.tmp");
        let xlsx_err = |source| ExportError::Xlsx {
            path: path.clone(),
            source,
        };
        let mut workbook = Self::workbook(records).map_err(xlsx_err)?;
        workbook.save(&tmp).map_err(xlsx_err)?;
        std::fs::rename(&tmp, &path).map_err(|e| io_err(&path, e))?;
        Ok(path)
    }
}

// ---------------------------------------------------------------------------
// ExporterSlot
// ---------------------------------------------------------------------------

/// Exporter resolved once at startup, with an explicit ready or failed state.
pub enum ExporterSlot {
    Ready(Box<dyn SheetExporter>),
    Failed { reason: String },
}

impl ExporterSlot {
    /// Create `dir` if needed and build the exporter for `format`.
    pub fn resolve(format: SheetFormat, dir: &Path) -> Self {
        if let Err(err) = std::fs::create_dir_all(dir) {
            return ExporterSlot::Failed {
                reason: format!("cannot create export directory {}: {err}", dir.display()),
            };
        }
        if !dir.is_dir() {
            return ExporterSlot::Failed {
                reason: format!("export path {} is not a directory", dir.display()),
            };
        }
        let exporter: Box<dyn SheetExporter> = match format {
            SheetFormat::Csv => Box::new(CsvSheetExporter::new(dir)),
            SheetFormat::Json => Box::new(JsonSheetExporter::new(dir)),
            SheetFormat::Xlsx => Box::new(XlsxSheetExporter::new(dir)),
        };
        ExporterSlot::Ready(exporter)
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, ExporterSlot::Ready(_))
    }

    pub fn exporter(&self) -> Result<&dyn SheetExporter, ExportError> {
        match self {
            ExporterSlot::Ready(exporter) => Ok(exporter.as_ref()),
            ExporterSlot::Failed { reason } => Err(ExportError::Unavailable {
                reason: reason.clone(),
            }),
        }
    }
}

impl fmt::Debug for ExporterSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExporterSlot::Ready(exporter) => f
                .debug_tuple("Ready")
                .field(&exporter.format())
                .finish(),
            ExporterSlot::Failed { reason } => {
                f.debug_struct("Failed").field("reason", reason).finish()
            }
        }
    }
}

/// Export through `slot`, refusing an empty sequence before the exporter
/// is called.
pub fn export_records(
    slot: &ExporterSlot,
    records: &[OrderRecord],
    filename_hint: &str,
) -> Result<PathBuf, ExportError> {
    let exporter = slot.exporter()?;
    if records.is_empty() {
        return Err(ExportError::NothingToExport);
    }
    exporter.export(records, filename_hint)
}

// ---------------------------------------------------------------------------
// Filename hints
// ---------------------------------------------------------------------------

/// `cagetrack_orders_filtered_<start>_to_<end>`; open bounds read `start`/`end`.
pub fn filtered_hint(range: &DateRange) -> String {
    let start = range
        .start
        .map_or_else(|| "start".to_string(), |d| d.to_string());
    let end = range.end.map_or_else(|| "end".to_string(), |d| d.to_string());
    format!("cagetrack_orders_filtered_{start}_to_{end}")
}

/// `cagetrack_orders_all_<YYYY-MM-DD>`.
pub fn all_hint(today: NaiveDate) -> String {
    format!("cagetrack_orders_all_{}", today.format("%Y-%m-%d"))
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

fn csv_escape(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') || value.contains('\r') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn file_stem(hint: &str) -> String {
    let stem: String = hint
        .trim()
        .chars()
        .map(|c| if matches!(c, '/' | '\\' | ':') { '_' } else { c })
        .collect();
    if stem.is_empty() {
        "cagetrack_orders".to_string()
    } else {
        stem
    }
}

fn sheet_path(dir: &Path, filename_hint: &str, format: SheetFormat) -> PathBuf {
    dir.join(format!("{}.{}", file_stem(filename_hint), format.extension()))
}

fn write_sheet(
    dir: &Path,
    filename_hint: &str,
    format: SheetFormat,
    contents: &str,
) -> Result<PathBuf, ExportError> {
    let path = sheet_path(dir, filename_hint, format);
    let tmp = path.with_extension(format!("{}.tmp", format.extension()));
    std::fs::write(&tmp, contents).map_err(|e| io_err(&tmp, e))?;
    std::fs::rename(&tmp, &path).map_err(|e| io_err(&path, e))?;
    Ok(path)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
