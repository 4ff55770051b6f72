use crate::error::ExporterError;
use crate::helpers::reader::UnifiedReader;
use crate::helpers::xml::XmlNodeHelper;
use crate::helpers::zip::ZipHelper;
use crate::match_xml_events;
use crate::spreadsheet::cell::Cell;
use crate::spreadsheet::cell::CellType;
use crate::spreadsheet::excel;
use crate::spreadsheet::excel::load_relationships;
use crate::spreadsheet::reference::parse_reference;
use crate::spreadsheet::sheet::Sheet;
use crate::spreadsheet::Spreadsheet;
use crate::spreadsheet::SpreadsheetError;
use quick_xml::events::Event;
use quick_xml::name::QName;
use std::collections::HashMap;
use std::path::Path;
use zip::ZipArchive;

const TAG_CUSTOM_FORMATS: QName = QName(b"numFmts");
const TAG_CUSTOM_FORMAT: QName = QName(b"numFmt");
const TAG_FORMAT_INDEXES: QName = QName(b"cellXfs");
const TAG_FORMAT_INDEX: QName = QName(b"xf");
const TAG_SHARED_STRING_ITEM: QName = QName(b"si");
const TAG_WORKBOOK_PROPERTIES: QName = QName(b"workbookPr");
const TAG_SHEET: QName = QName(b"sheet");
const TAG_ROW: QName = QName(b"row");
const TAG_CELL: QName = QName(b"c");
const TAG_INLINE_STRING: QName = QName(b"is");
const TAG_VALUE: QName = QName(b"v");

/// An Excel 2007+ workbook (`.xlsx`, `.xlsm`).
pub struct XlsxSpreadsheet {
    /// File name of the workbook
    name: String,
    zip: ZipArchive<UnifiedReader>,
    /// Cell type per style index
    number_formats: Vec<CellType>,
    /// `(sheet name, part path)` pairs
    sheets: Vec<(String, String)>,
    /// Shared string table, loaded by the first sheet that needs it
    shared_strings: Option<Vec<String>>,
}

impl XlsxSpreadsheet {
    /// Opens a workbook from disk.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<XlsxSpreadsheet, ExporterError> {
        let name = path.as_ref().to_string_lossy().to_string();
        let reader = UnifiedReader::open(&path)
            .map_err(|error| SpreadsheetError::FormatError(name.to_owned(), error.to_string()))?;
        Self::with_reader(name, reader)
    }

    /// Opens a workbook held in memory; `name` is used in error messages.
    pub fn from_bytes(name: &str, bytes: Vec<u8>) -> Result<XlsxSpreadsheet, ExporterError> {
        Self::with_reader(name.to_owned(), UnifiedReader::from_bytes(bytes))
    }

    fn with_reader(name: String, reader: UnifiedReader) -> Result<XlsxSpreadsheet, ExporterError> {
        let workbook = excel::open(&name, reader, load_workbook, load_number_formats)?;
        Ok(XlsxSpreadsheet {
            name,
            zip: workbook.zip,
            number_formats: workbook.number_formats,
            sheets: workbook.sheets,
            shared_strings: None,
        })
    }

    /// Loads the shared string table once; a workbook without one has an empty table.
    fn load_shared_strings(&mut self) -> Result<&[String], ExporterError> {
        if self.shared_strings.is_none() {
            let mut shared_strings = Vec::<String>::new();
            if let Some(mut reader) = self.zip.xml_reader("xl/sharedStrings.xml")? {
                match_xml_events!(reader => {
                    Event::Start(event) if event.name() == TAG_SHARED_STRING_ITEM => {
                        shared_strings.push(reader.read_text(TAG_SHARED_STRING_ITEM, false)?);
                    }
                });
            }
            self.shared_strings = Some(shared_strings);
        }
        Ok(self.shared_strings.as_deref().unwrap_or_default())
    }
}

impl Spreadsheet for XlsxSpreadsheet {
    fn name(&self) -> String {
        self.name.to_owned()
    }

    fn sheet_names(&self) -> Vec<String> {
        self.sheets.iter().map(|(name, _)| name.to_owned()).collect()
    }

    /// Reads every non-empty cell of a worksheet.
    ///
    /// Rows and cells without an `r` attribute continue from the previous position.
    /// Shared string cells are resolved to their text.
    fn read_sheet(&mut self, sheet_name: &str) -> Result<Sheet, ExporterError> {
        let zip_path = self.sheets
            .iter()
            .find(|(name, _)| name == sheet_name)
            .map(|(_, path)| path.to_owned())
            .ok_or_else(|| SpreadsheetError::SheetNotFoundError(self.name.to_owned(), sheet_name.to_owned()))?;

        let mut sheet = Sheet::new(&self.name, sheet_name);
        let mut has_shared_strings = false;
        let mut row = 0usize;
        let mut col = 0usize;
        let mut kind = CellType::default();
        let mut value = String::new();
        {
            let mut reader = self.zip.xml_reader(&zip_path)?
                .ok_or_else(|| SpreadsheetError::FileError(zip_path.to_owned()))?;
            match_xml_events!(reader => {
                Event::Start(event) if event.name() == TAG_ROW => {
                    row = event.get_attribute_value("r")?
                        .and_then(|r| r.parse::<usize>().ok())
                        .unwrap_or(row + 1);
                    col = 0;
                }
                Event::Start(event) if event.name() == TAG_CELL => {
                    (row, col) = event.get_attribute_value("r")?
                        .and_then(|reference| parse_reference(&reference))
                        .unwrap_or((row.max(1), col + 1));
                    kind = event.get_attribute_value("t")?.map(|t| {
                        match t.as_ref() {
                            "inlineStr" | "str" => CellType::InlineString,
                            "s" => CellType::SharedString,
                            "d" => CellType::IsoDateTime,
                            "b" => CellType::Boolean,
                            "e" => CellType::Error,
                            _ => CellType::Number,
                        }
                    }).unwrap_or(CellType::Number);
                    if let Some(format_id) = event.get_attribute_value("s")? {
                        if kind == CellType::Number && !format_id.is_empty() {
                            let index = format_id.parse::<usize>()?;
                            kind = self.number_formats.get(index).copied().unwrap_or(CellType::Number);
                        }
                    }
                    value.clear();
                }
                Event::Start(event) if event.name() == TAG_INLINE_STRING => {
                    value = reader.read_text(TAG_INLINE_STRING, false)?;
                }
                Event::Start(event) if event.name() == TAG_VALUE => {
                    value = reader.read_text(TAG_VALUE, true)?;
                }
                Event::End(event) if !value.is_empty() && event.name() == TAG_CELL => {
                    has_shared_strings |= kind == CellType::SharedString;
                    sheet.push(Cell::new(row, col, kind, value.to_owned()));
                    value.clear();
                }
            });
        }

        if has_shared_strings {
            let file_name = self.name.to_owned();
            let shared_strings = self.load_shared_strings()?;
            for cell in sheet.cells.iter_mut().filter(|cell| cell.kind == CellType::SharedString) {
                let text = cell.value
                    .parse::<usize>()
                    .ok()
                    .and_then(|index| shared_strings.get(index))
                    .ok_or_else(|| SpreadsheetError::SharedStringError(file_name.to_owned(), cell.value.to_owned()))?;
                cell.value = text.to_owned();
            }
        }
        Ok(sheet)
    }
}

/// Reads the sheet list from `workbook.xml` and the 1904 date system flag.
fn load_workbook(zip: &mut ZipArchive<UnifiedReader>) -> Result<(Vec<(String, String)>, bool), ExporterError> {
    let relationships = load_relationships(zip, "xl/_rels/workbook.xml.rels")?;
    let mut reader = zip.xml_reader("xl/workbook.xml")?
        .ok_or_else(|| SpreadsheetError::FileError("xl/workbook.xml".to_string()))?;
    let mut sheets: Vec<(String, String)> = Vec::new();
    let mut is_1904 = false;
    match_xml_events!(reader => {
        Event::Start(event) if event.name() == TAG_SHEET => {
            let name = event.get_attribute_value("name")?;
            let id = event.get_attribute_value("id")?;
            if let Some((name, id)) = name.zip(id) {
                if let Some(path) = relationships.get(&*id) {
                    sheets.push((name.to_string(), path.to_owned()));
                }
            }
        }
        Event::Start(event) if event.name() == TAG_WORKBOOK_PROPERTIES => {
            is_1904 = event.get_attribute_value("date1904")?
                .map(|value| value.eq("1") || value.eq("true"))
                .unwrap_or(false);
        }
    });
    Ok((sheets, is_1904))
}

/// Reads custom number formats and the per-style format ids from `styles.xml`.
fn load_number_formats(zip: &mut ZipArchive<UnifiedReader>, is_1904: bool) -> Result<Vec<CellType>, ExporterError> {
    let mut reader = match zip.xml_reader("xl/styles.xml")? {
        Some(reader) => reader,
        None => return Ok(Vec::new()),
    };

    let mut custom_formats_context = false;
    let mut custom_formats = HashMap::<String, CellType>::new();
    let mut format_indexes_context = false;
    let mut format_indexes = Vec::<String>::new();

    match_xml_events!(reader => {
        Event::Start(event) if event.name() == TAG_CUSTOM_FORMATS => custom_formats_context = true,
        Event::End(event) if event.name() == TAG_CUSTOM_FORMATS => custom_formats_context = false,
        Event::Start(event) if custom_formats_context && event.name() == TAG_CUSTOM_FORMAT => {
            let id = event.get_attribute_value("numFmtId")?;
            let format = event.get_attribute_value("formatCode")?;
            if let Some((id, format)) = id.zip(format) {
                custom_formats.insert(id.to_string(), CellType::parse_custom_number_format(&format, is_1904));
            }
        }
        Event::Start(event) if event.name() == TAG_FORMAT_INDEXES => format_indexes_context = true,
        Event::End(event) if event.name() == TAG_FORMAT_INDEXES => format_indexes_context = false,
        Event::Start(event) if format_indexes_context && event.name() == TAG_FORMAT_INDEX => {
            format_indexes.push(event.get_attribute_value("numFmtId")?.unwrap_or_default().to_string());
        }
    });

    Ok(excel::resolve_number_formats(&format_indexes, &custom_formats, is_1904))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::io::Write;
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    const WORKBOOK: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">
<workbookPr date1904="false"/>
<sheets><sheet name="Data" sheetId="1" r:id="rId1"/><sheet name="Notes" sheetId="2" r:id="rId2"/></sheets>
</workbook>"#;

    const RELATIONSHIPS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/>
<Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="/xl/worksheets/sheet2.xml"/>
<Relationship Id="rId3" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/>
</Relationships>"#;

    const STYLES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
<numFmts count="1"><numFmt numFmtId="164" formatCode="yyyy/mm/dd"/></numFmts>
<cellXfs count="2"><xf numFmtId="0"/><xf numFmtId="164"/></cellXfs>
</styleSheet>"#;

    const SHARED_STRINGS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<sst xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" count="2" uniqueCount="2">
<si><t>name</t></si><si><r><t>Sword</t></r><r><t xml:space="preserve"> of Dawn</t></r></si>
</sst>"#;

    const SHEET1: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData>
<row r="1"><c r="A1" t="inlineStr"><is><t>id</t></is></c><c r="B1" t="s"><v>0</v></c><c r="C1" t="inlineStr"><is><t>since</t></is></c></row>
<row r="3"><c r="A3"><v>101</v></c><c r="B3" t="s"><v>1</v></c><c r="C3" s="1"><v>45292</v></c><c r="D3" t="b"><v>1</v></c><c r="E3"/></row>
</sheetData></worksheet>"#;

    const SHEET2: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData>
<row><c t="inlineStr"><is><t>a</t></is></c><c><v>2</v></c></row>
<row><c t="str"><f>A1</f><v>a</v></c></row>
</sheetData></worksheet>"#;

    fn workbook(parts: &[(&str, &str)]) -> Vec<u8> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        for (name, content) in parts {
            writer.start_file(*name, SimpleFileOptions::default()).unwrap();
            writer.write_all(content.as_bytes()).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    fn sample() -> XlsxSpreadsheet {
        let bytes = workbook(&[
            ("xl/workbook.xml", WORKBOOK),
            ("xl/_rels/workbook.xml.rels", RELATIONSHIPS),
            ("xl/styles.xml", STYLES),
            ("xl/sharedStrings.xml", SHARED_STRINGS),
            ("xl/worksheets/sheet1.xml", SHEET1),
            ("xl/worksheets/sheet2.xml", SHEET2),
        ]);
        XlsxSpreadsheet::from_bytes("Sample.xlsx", bytes).unwrap()
    }

    #[test]
    fn lists_sheets_in_workbook_order() {
        let spreadsheet = sample();
        assert_eq!(spreadsheet.name(), "Sample.xlsx");
        assert_eq!(spreadsheet.sheet_names(), vec!["Data", "Notes"]);
    }

    #[test]
    fn reads_cells_with_types() {
        let mut spreadsheet = sample();
        let sheet = spreadsheet.read_sheet("Data").unwrap();
        assert_eq!(sheet.max_row(), 3);
        assert_eq!(sheet.max_col(), 4);
        assert_eq!(sheet.text(1, 1), "id");
        assert_eq!(sheet.text(1, 2), "name");
        assert_eq!(sheet.get(3, 1).map(|cell| cell.kind), Some(CellType::Number));
        assert_eq!(sheet.text(3, 2), "Sword of Dawn");
        assert_eq!(sheet.get(3, 3).map(|cell| cell.kind), Some(CellType::NumberDate1900));
        assert_eq!(sheet.text(3, 3), "2024-01-01");
        assert_eq!(sheet.get(3, 4).map(|cell| cell.to_bool()), Some(Ok(true)));
        assert!(sheet.get(3, 5).is_none());
        assert!(sheet.is_blank_row(2, 1, 4));
    }

    #[test]
    fn positions_without_references_continue_from_previous_cell() {
        let mut spreadsheet = sample();
        let sheet = spreadsheet.read_sheet("Notes").unwrap();
        assert_eq!(sheet.text(1, 1), "a");
        assert_eq!(sheet.get(1, 2).map(|cell| cell.value.as_str()), Some("2"));
        assert_eq!(sheet.get(2, 1).map(|cell| cell.kind), Some(CellType::InlineString));
    }

    #[test]
    fn unknown_sheet_is_an_error() {
        let mut spreadsheet = sample();
        let error = spreadsheet.read_sheet("Missing").unwrap_err();
        assert!(matches!(
            error,
            ExporterError::SpreadsheetError(SpreadsheetError::SheetNotFoundError(_, _))
        ));
    }

    #[test]
    fn workbook_without_sheets_is_empty() {
        let bytes = workbook(&[
            ("xl/workbook.xml", "<workbook><sheets/></workbook>"),
            ("xl/_rels/workbook.xml.rels", "<Relationships/>"),
        ]);
        let error = XlsxSpreadsheet::from_bytes("Empty.xlsx", bytes).err().unwrap();
        assert!(matches!(
            error,
            ExporterError::SpreadsheetError(SpreadsheetError::SpreadsheetEmptyError(_))
        ));
    }

    #[test]
    fn bytes_that_are_not_a_zip_are_rejected() {
        let error = XlsxSpreadsheet::from_bytes("Broken.xlsx", b"not a workbook".to_vec()).err().unwrap();
        assert!(matches!(
            error,
            ExporterError::SpreadsheetError(SpreadsheetError::FormatError(_, _))
        ));
    }
}
