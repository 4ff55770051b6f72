use crate::spreadsheet::cell::Cell;
use std::collections::HashMap;

/// A worksheet loaded into memory as a sparse grid of non-empty cells.
#[derive(Debug, Default)]
pub struct Sheet {
    /// Source file name
    pub file_name: String,
    /// Sheet name
    pub name: String,
    /// Cells in document order
    pub(crate) cells: Vec<Cell>,
    /// Maps `(row, col)` to the position in `cells`
    indexes: HashMap<(usize, usize), usize>,
    /// Highest row holding a cell, 0 for an empty sheet
    max_row: usize,
    /// Highest column holding a cell, 0 for an empty sheet
    max_col: usize,
}

impl Sheet {
    pub fn new(file_name: &str, name: &str) -> Self {
        Self {
            file_name: file_name.to_owned(),
            name: name.to_owned(),
            ..Default::default()
        }
    }

    /// Adds a cell, replacing any earlier cell at the same position.
    pub fn push(&mut self, cell: Cell) {
        self.max_row = self.max_row.max(cell.row);
        self.max_col = self.max_col.max(cell.col);
        let position = (cell.row, cell.col);
        match self.indexes.get(&position) {
            Some(&index) => self.cells[index] = cell,
            None => {
                self.indexes.insert(position, self.cells.len());
                self.cells.push(cell);
            }
        }
    }

    /// Gets the cell at a 1-based position.
    pub fn get(&self, row: usize, col: usize) -> Option<&Cell> {
        self.indexes.get(&(row, col)).map(|&index| &self.cells[index])
    }

    /// Returns true when the position holds no cell or a blank one.
    pub fn is_blank(&self, row: usize, col: usize) -> bool {
        self.get(row, col).map(Cell::is_blank).unwrap_or(true)
    }

    /// Returns true when every cell of `row` in the inclusive column span is blank.
    pub fn is_blank_row(&self, row: usize, col_start: usize, col_end: usize) -> bool {
        (col_start..=col_end).all(|col| self.is_blank(row, col))
    }

    /// Gets the trimmed text of a cell, empty for blank positions.
    pub fn text(&self, row: usize, col: usize) -> String {
        self.get(row, col)
            .filter(|cell| !cell.is_blank())
            .map(|cell| cell.to_string().trim().to_owned())
            .unwrap_or_default()
    }

    pub fn max_row(&self) -> usize {
        self.max_row
    }

    pub fn max_col(&self) -> usize {
        self.max_col
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

#[cfg(test)]
impl Sheet {
    /// Builds a sheet from text rows starting at A1; numeric text becomes a number cell
    /// and empty text leaves the position blank.
    pub(crate) fn from_rows(rows: &[&[&str]]) -> Sheet {
        use crate::spreadsheet::cell::CellType;

        let mut sheet = Sheet::new("Test.xlsx", "Data");
        for (row, values) in rows.iter().enumerate() {
            for (col, value) in values.iter().enumerate() {
                if value.is_empty() {
                    continue;
                }
                let kind = if value.parse::<f64>().is_ok() {
                    CellType::Number
                } else {
                    CellType::InlineString
                };
                sheet.push(Cell::new(row + 1, col + 1, kind, *value));
            }
        }
        sheet
    }
}
