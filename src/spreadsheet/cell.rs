use crate::spreadsheet::reference::to_reference;
use chrono::Duration;
use chrono::NaiveDate;
use std::fmt::Display;

/// Types of cell data in spreadsheet files.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub enum CellType {
    #[default]
    Empty,
    /// Boolean values, stored as `1`/`0`
    Boolean,
    /// Numeric values
    Number,
    /// Date/time values stored as numbers from 1900 epoch
    NumberDateTime1900,
    /// Date values stored as numbers from 1900 epoch
    NumberDate1900,
    /// Time values stored as numbers from 1900 epoch
    NumberTime1900,
    /// Date/time values stored as numbers from 1904 epoch
    NumberDateTime1904,
    /// Date values stored as numbers from 1904 epoch
    NumberDate1904,
    /// Time values stored as numbers from 1904 epoch
    NumberTime1904,
    /// ISO 8601 date/time strings
    IsoDateTime,
    /// Inline string values
    InlineString,
    /// Shared string table references
    SharedString,
    /// Error values
    Error,
}

impl CellType {
    /// Parses built-in Excel number format IDs to determine cell type.
    pub(crate) fn parse_builtin_number_format_id(id: &str, is_1904: bool) -> Option<Self> {
        match id {
            "22" => Some(if is_1904 { Self::NumberDateTime1904 } else { Self::NumberDateTime1900 }),
            "14" | "15" | "16" | "17" => Some(if is_1904 { Self::NumberDate1904 } else { Self::NumberDate1900 }),
            "18" | "19" | "20" | "21" | "45" | "46" | "47" => Some(if is_1904 { Self::NumberTime1904 } else { Self::NumberTime1900 }),
            _ => None,
        }
    }

    /// Parses custom number format strings to determine cell type.
    /// Date and time tokens inside quotes, escapes and `[...]` sections are ignored.
    pub(crate) fn parse_custom_number_format(format: &str, is_1904: bool) -> Self {
        let mut is_escaped = false;
        let mut is_literal = false;
        let mut is_bracket = false;
        let mut is_date = false;
        let mut is_time = false;
        for character in format.chars() {
            match character {
                _ if is_escaped => is_escaped = false,
                '_' | '\\' if !is_literal => is_escaped = true,

                '"' if is_literal => is_literal = false,
                '"' if !is_bracket => is_literal = true,

                ']' if is_bracket => is_bracket = false,
                '[' if !is_literal => is_bracket = true,
                _ if is_literal || is_bracket => (),

                'Y' | 'y' | 'D' | 'd' => is_date = true,
                'H' | 'h' | 'S' | 's' => is_time = true,
                _ => (),
            }
        }

        match (is_date, is_time, is_1904) {
            (true, true, false) => Self::NumberDateTime1900,
            (true, true, true) => Self::NumberDateTime1904,
            (true, false, false) => Self::NumberDate1900,
            (true, false, true) => Self::NumberDate1904,
            (false, true, false) => Self::NumberTime1900,
            (false, true, true) => Self::NumberTime1904,
            (false, false, _) => Self::Number,
        }
    }

    /// Returns true for every kind whose value is a number, including date-formatted ones.
    pub fn is_number(&self) -> bool {
        matches!(
            self,
            Self::Number
                | Self::NumberDateTime1900
                | Self::NumberDate1900
                | Self::NumberTime1900
                | Self::NumberDateTime1904
                | Self::NumberDate1904
                | Self::NumberTime1904
        )
    }

    /// Returns true for text kinds.
    pub fn is_text(&self) -> bool {
        matches!(self, Self::InlineString | Self::SharedString)
    }
}

/// A single cell of a sheet with position, type, and raw value.
#[derive(Clone, Debug, PartialEq)]
pub struct Cell {
    /// Row number (1-based)
    pub row: usize,
    /// Column number (1-based)
    pub col: usize,
    /// Cell data type
    pub kind: CellType,
    /// Cell value as stored in the workbook (booleans as `1`/`0`, numbers as written)
    pub value: String,
}

impl Cell {
    pub fn new(row: usize, col: usize, kind: CellType, value: impl Into<String>) -> Self {
        Cell {
            row,
            col,
            kind,
            value: value.into(),
        }
    }

    /// Returns the A1-style reference of the cell (e.g., "B2").
    pub fn reference(&self) -> String {
        to_reference(self.row, self.col)
    }

    /// A cell is blank when it has no kind or an empty value.
    pub fn is_blank(&self) -> bool {
        self.kind == CellType::Empty || self.value.is_empty()
    }

    /// Converts the cell to an integer.
    ///
    /// Numbers lose their fractional part, booleans become `1`/`0`, and text must
    /// hold an integer literal.
    pub fn to_int(&self) -> Result<i64, String> {
        match self.kind {
            CellType::Boolean => Ok(if self.value == "1" { 1 } else { 0 }),
            kind if kind.is_number() => {
                if let Ok(integer) = self.value.parse::<i64>() {
                    return Ok(integer);
                }
                let number = self.to_float()?.trunc();
                if number >= i64::MIN as f64 && number <= i64::MAX as f64 {
                    Ok(number as i64)
                } else {
                    Err(format!("number '{}' is out of integer range", self.value))
                }
            }
            kind if kind.is_text() => self
                .value
                .trim()
                .parse::<i64>()
                .map_err(|_| format!("parse '{}' to integer failed", self.value)),
            _ => Err(format!("parse '{}' to integer failed", self.value)),
        }
    }

    /// Converts the cell to a finite floating point number.
    pub fn to_float(&self) -> Result<f64, String> {
        let number = match self.kind {
            CellType::Boolean => Ok(if self.value == "1" { 1.0 } else { 0.0 }),
            kind if kind.is_number() || kind.is_text() => self
                .value
                .trim()
                .parse::<f64>()
                .map_err(|_| format!("parse '{}' to number failed", self.value)),
            _ => Err(format!("parse '{}' to number failed", self.value)),
        }?;
        if number.is_finite() {
            Ok(number)
        } else {
            Err(format!("number '{}' is not finite", self.value))
        }
    }

    /// Converts the cell to a boolean.
    ///
    /// Accepts native boolean cells and the text `true`/`false` in any letter case.
    pub fn to_bool(&self) -> Result<bool, String> {
        match self.kind {
            CellType::Boolean => Ok(self.value == "1"),
            kind if kind.is_text() => {
                let text = self.value.trim();
                if text.eq_ignore_ascii_case("true") {
                    Ok(true)
                } else if text.eq_ignore_ascii_case("false") {
                    Ok(false)
                } else {
                    Err(format!("parse '{}' to boolean failed, expected true or false", self.value))
                }
            }
            _ => Err(format!("parse '{}' to boolean failed, expected true or false", self.value)),
        }
    }
}

impl Display for Cell {
    /// Writes the cell as text: booleans as `true`/`false`, date-formatted numbers in ISO
    /// form, everything else as stored.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let formatted = match self.kind {
            CellType::Boolean => Some(if self.value == "1" { "true" } else { "false" }.to_owned()),
            CellType::NumberDateTime1900 => to_datetime_string(&self.value, false),
            CellType::NumberDateTime1904 => to_datetime_string(&self.value, true),
            CellType::NumberDate1900 => to_date_string(&self.value, false),
            CellType::NumberDate1904 => to_date_string(&self.value, true),
            CellType::NumberTime1900 | CellType::NumberTime1904 => to_time_string(&self.value),
            CellType::IsoDateTime => Some(self.value.replace('T', " ")),
            _ => None,
        };
        match formatted {
            Some(value) => write!(f, "{}", value),
            None => write!(f, "{}", self.value),
        }
    }
}

/// Converts an Excel serial day number to an ISO date string.
/// Serial days before 60 skip the Lotus 1-2-3 phantom 1900-02-29.
fn to_date_string(value: &str, is_1904: bool) -> Option<String> {
    let days = value.parse::<f64>().ok()?.trunc() as i64;
    let offset = if is_1904 {
        1462
    } else if days < 60 {
        1
    } else {
        0
    };
    let date = NaiveDate::from_ymd_opt(1899, 12, 30)?.checked_add_signed(Duration::days(days + offset))?;
    Some(date.format("%Y-%m-%d").to_string())
}

/// Converts the fractional day of an Excel serial number to an ISO time string.
fn to_time_string(value: &str) -> Option<String> {
    let factor = value.parse::<f64>().ok()?.fract();
    let mut total = (factor * 86_400_000f64).round() as i64;
    let milliseconds = total % 1_000;
    total /= 1_000;
    let seconds = total % 60;
    total /= 60;
    let minutes = total % 60;
    let hours = total / 60;
    if milliseconds > 0 {
        Some(format!("{hours:02}:{minutes:02}:{seconds:02}.{milliseconds:03}"))
    } else {
        Some(format!("{hours:02}:{minutes:02}:{seconds:02}"))
    }
}

/// Converts an Excel serial date-time number to an ISO date-time string.
fn to_datetime_string(value: &str, is_1904: bool) -> Option<String> {
    let date = to_date_string(value, is_1904)?;
    let time = to_time_string(value)?;
    Some(format!("{date} {time}"))
}
