//! Error types for cagetrack-export.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise from sheet export.
#[derive(Debug, Error)]
pub enum ExportError {
    /// The record sequence was empty; the exporter was not called.
    #[error("nothing to export")]
    NothingToExport,

    /// The exporter could not be set up.
    #[error("sheet exporter unavailable: {reason}")]
    Unavailable { reason: String },

    /// Filesystem error while writing the sheet.
    #[error("export I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Workbook build or save error (XLSX sheets).
    #[error("xlsx write error at {path}: {source}")]
    Xlsx {
        path: PathBuf,
        #[source]
        source: rust_xlsxwriter::XlsxError,
    },

    /// JSON serialization error (JSON sheets).
    #[error("sheet serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience constructor for [`ExportError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> ExportError {
    ExportError::Io {
        path: path.into(),
        source,
    }
}
