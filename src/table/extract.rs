use crate::error::ExporterError;
use crate::schema::ParseType;
use crate::schema::TypeKind;
use crate::schema::TypeNode;
use crate::spreadsheet::cell::Cell;
use crate::spreadsheet::cell::CellType;
use crate::spreadsheet::sheet::Sheet;
use crate::table::CellParseError;
use crate::table::LayoutNode;
use serde_json::Map;
use serde_json::Value;

/// An object read from a row span, and the last row the span covered.
#[derive(Debug, PartialEq)]
pub struct ExtractionResult {
    /// `None` when no field produced a value
    pub value: Option<Map<String, Value>>,
    pub row_end: usize,
}

/// Reads values from the data rows of one sheet.
pub struct Extractor<'a> {
    sheet: &'a Sheet,
}

impl<'a> Extractor<'a> {
    pub fn new(sheet: &'a Sheet) -> Self {
        Self { sheet }
    }

    /// Reads the row records of a table whose header occupies `header_row_count` rows.
    pub fn extract_table(&self, root: &TypeNode, layout: &LayoutNode, header_row_count: usize) -> Result<Vec<Value>, ExporterError> {
        let row_start = header_row_count + 1;
        let row_max = self.sheet.max_row().max(row_start);
        self.extract_array(root, layout, row_start, row_max)
    }

    /// Reads consecutive objects from `row_start` through `row_end`.
    ///
    /// A row blank across the whole column range yields nothing and is skipped;
    /// otherwise an object is read and the cursor moves past its span.
    pub fn extract_array(
        &self,
        type_node: &TypeNode,
        layout: &LayoutNode,
        row_start: usize,
        row_end: usize,
    ) -> Result<Vec<Value>, ExporterError> {
        let mut values = Vec::new();
        let mut row = row_start;
        while row <= row_end {
            if self.sheet.is_blank_row(row, layout.col_start, layout.col_end) {
                row += 1;
                continue;
            }
            let result = self.extract_object(type_node, layout, row, row_end)?;
            if let Some(object) = result.value {
                values.push(Value::Object(object));
            }
            row = result.row_end + 1;
        }
        Ok(values)
    }

    /// Reads one object starting at `row_start`.
    ///
    /// The object's span ends before the next row in which any of its single-valued
    /// fields has a value in its first column, or at `row_max`. Array fields are read
    /// over the whole span. Header columns that are not fields are ignored.
    pub fn extract_object(
        &self,
        type_node: &TypeNode,
        layout: &LayoutNode,
        row_start: usize,
        row_max: usize,
    ) -> Result<ExtractionResult, ExporterError> {
        let fields: Vec<(&TypeNode, &LayoutNode)> = layout
            .members
            .iter()
            .filter_map(|child| type_node.member(&child.name).map(|member| (member, child)))
            .collect();

        let mut row_end = row_max;
        for (_, child) in fields.iter().filter(|(member, _)| !member.is_array) {
            if let Some(next) = ((row_start + 1)..=row_end).find(|&row| !self.sheet.is_blank(row, child.col_start)) {
                row_end = next - 1;
            }
        }

        let mut object = Map::new();
        for (member, child) in fields {
            let value = match &member.kind {
                TypeKind::Leaf(parse_type) if member.is_array => {
                    let values = self.read_column(*parse_type, child.col_start, row_start, row_end)?;
                    (!values.is_empty()).then_some(Value::Array(values))
                }
                TypeKind::Leaf(parse_type) => self
                    .sheet
                    .get(row_start, child.col_start)
                    .filter(|cell| !cell.is_blank())
                    .map(|cell| self.coerce(cell, *parse_type))
                    .transpose()?,
                TypeKind::Composite(_) if member.is_array => {
                    let values = self.extract_array(member, child, row_start, row_end)?;
                    (!values.is_empty()).then_some(Value::Array(values))
                }
                TypeKind::Composite(_) => self
                    .extract_object(member, child, row_start, row_end)?
                    .value
                    .map(Value::Object),
            };

            // Same-named array columns accumulate; single values overwrite.
            match value {
                Some(Value::Array(values)) if member.is_array => match object.get_mut(&member.name) {
                    Some(Value::Array(existing)) => existing.extend(values),
                    _ => {
                        object.insert(member.name.to_owned(), Value::Array(values));
                    }
                },
                Some(value) => {
                    object.insert(member.name.to_owned(), value);
                }
                None => (),
            }
        }

        Ok(ExtractionResult {
            value: (!object.is_empty()).then_some(object),
            row_end,
        })
    }

    /// Reads the non-blank cells of a column in row order.
    fn read_column(&self, parse_type: ParseType, col: usize, row_start: usize, row_end: usize) -> Result<Vec<Value>, ExporterError> {
        (row_start..=row_end)
            .filter_map(|row| self.sheet.get(row, col))
            .filter(|cell| !cell.is_blank())
            .map(|cell| self.coerce(cell, parse_type))
            .collect()
    }

    fn coerce(&self, cell: &Cell, parse_type: ParseType) -> Result<Value, ExporterError> {
        let value = if cell.kind == CellType::Error {
            Err(format!("cell holds the error value '{}'", cell.value))
        } else {
            match parse_type {
                ParseType::Int => cell.to_int().map(Value::from),
                ParseType::Float => cell.to_float().map(Value::from),
                ParseType::Bool => cell.to_bool().map(Value::Bool),
                ParseType::String => Ok(Value::String(cell.to_string())),
            }
        };
        value.map_err(|message| {
            CellParseError {
                file: self.sheet.file_name.to_owned(),
                sheet: self.sheet.name.to_owned(),
                reference: cell.reference(),
                value: cell.value.to_owned(),
                expected: parse_type,
                message,
            }
            .into()
        })
    }
}
