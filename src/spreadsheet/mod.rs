//! # Spreadsheet Reading
//!
//! Loads worksheets of Excel workbooks into an in-memory [`Sheet`] grid
//! addressed by 1-based `(row, col)` positions.
pub mod cell;
pub(crate) mod excel;
pub mod reference;
pub mod sheet;
pub mod xlsx;

use crate::error::ExporterError;
use crate::spreadsheet::sheet::Sheet;
use crate::spreadsheet::xlsx::XlsxSpreadsheet;
use std::path::Path;
use thiserror::Error;

/// Errors raised while opening or reading a workbook.
#[derive(Error, Debug)]
pub enum SpreadsheetError {
    #[error("Cannot open '{0}' as a workbook: {1}")]
    FormatError(String, String),

    #[error("Unsupported workbook format '{0}'")]
    UnsupportedFormatError(String),

    #[error("Missing part '{0}' in workbook")]
    FileError(String),

    #[error("Workbook '{0}' contains no sheet")]
    SpreadsheetEmptyError(String),

    #[error("Sheet '{1}' not found in '{0}'")]
    SheetNotFoundError(String, String),

    #[error("Invalid shared string index '{1}' in '{0}'")]
    SharedStringError(String, String),
}

/// A workbook whose sheets can be read by name.
pub trait Spreadsheet {
    /// Returns the file name of the workbook.
    fn name(&self) -> String;

    /// Returns the sheet names in workbook order.
    fn sheet_names(&self) -> Vec<String>;

    /// Reads the named sheet into memory.
    fn read_sheet(&mut self, sheet_name: &str) -> Result<Sheet, ExporterError>;
}

/// Opens a workbook, choosing the reader from the file extension.
pub fn open_spreadsheet<P: AsRef<Path>>(path: P) -> Result<Box<dyn Spreadsheet>, ExporterError> {
    let path = path.as_ref();
    let extension = path
        .extension()
        .map(|extension| extension.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    match extension.as_str() {
        "xlsx" | "xlsm" => Ok(Box::new(XlsxSpreadsheet::open(path)?)),
        _ => Err(SpreadsheetError::UnsupportedFormatError(path.to_string_lossy().to_string()))?,
    }
}
