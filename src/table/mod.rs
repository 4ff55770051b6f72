//! # Table Extraction
//!
//! Matches a table's [`TypeNode`] tree against the header rows of its sheet and
//! reads the data rows below into JSON values.
pub mod extract;
pub mod layout;

pub use extract::ExtractionResult;
pub use extract::Extractor;
pub use layout::build_layout_tree;
pub use layout::check_layout;
pub use layout::transition;
pub use layout::LayoutNode;
pub use layout::Transition;

use crate::error::ExporterError;
use crate::schema::ParseType;
use crate::schema::TypeNode;
use crate::spreadsheet::sheet::Sheet;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum LayoutError {
    #[error("Field '{path}' has no header column")]
    LayoutMismatch { path: String },

    #[error("Header cell {reference} at depth {depth} cannot nest under depth {parent_depth}")]
    HeaderDepth {
        reference: String,
        depth: usize,
        parent_depth: usize,
    },
}

/// A data cell that cannot be coerced to its field's type.
#[derive(Error, Debug)]
#[error("Cannot read cell {reference} of sheet '{sheet}' in '{file}' as {expected}: {message}")]
pub struct CellParseError {
    pub file: String,
    pub sheet: String,
    pub reference: String,
    pub value: String,
    pub expected: ParseType,
    pub message: String,
}

/// Extracts every row record of `sheet` as described by the table root.
///
/// Header rows are `1..=root.max_depth()`; every field must have a header column
/// before any data row is read. An empty table is `[]`.
pub fn extract_table(sheet: &Sheet, root: &TypeNode) -> Result<Value, ExporterError> {
    let header_row_count = root.max_depth();
    let layout = build_layout_tree(sheet, header_row_count)?;
    debug!(
        sheet = sheet.name.as_str(),
        header_row_count,
        fields = root.field_count(),
        columns = layout.col_end,
        "Built layout tree"
    );
    check_layout(root, &layout)?;

    let rows = Extractor::new(sheet).extract_table(root, &layout, header_row_count)?;
    debug!(sheet = sheet.name.as_str(), rows = rows.len(), "Extracted rows");
    Ok(Value::Array(rows))
}
