//! Office Open XML container helpers shared by the workbook readers.
use crate::error::ExporterError;
use crate::helpers::reader::UnifiedReader;
use crate::helpers::xml::XmlNodeHelper;
use crate::helpers::zip::ZipHelper;
use crate::match_xml_events;
use crate::spreadsheet::cell::CellType;
use crate::spreadsheet::SpreadsheetError;
use quick_xml::events::Event;
use std::collections::HashMap;
use zip::ZipArchive;

const TAG_RELATIONSHIP: &[u8] = b"Relationship";

/// Workbook parts resolved while opening a file.
pub(super) struct Workbook {
    pub(super) zip: ZipArchive<UnifiedReader>,
    /// Cell type per style index
    pub(super) number_formats: Vec<CellType>,
    /// `(sheet name, part path)` in workbook order
    pub(super) sheets: Vec<(String, String)>,
}

/// Opens the container, loads the sheet list and the number formats.
///
/// Fails with [`SpreadsheetError::SpreadsheetEmptyError`] when the workbook lists no sheet.
pub(super) fn open<W, F>(
    file_name: &str,
    reader: UnifiedReader,
    load_workbook: W,
    load_number_formats: F,
) -> Result<Workbook, ExporterError>
where
    W: Fn(&mut ZipArchive<UnifiedReader>) -> Result<(Vec<(String, String)>, bool), ExporterError>,
    F: Fn(&mut ZipArchive<UnifiedReader>, bool) -> Result<Vec<CellType>, ExporterError>,
{
    let mut zip = ZipArchive::new(reader)
        .map_err(|error| SpreadsheetError::FormatError(file_name.to_owned(), error.to_string()))?;
    let (sheets, is_1904) = load_workbook(&mut zip)?;
    if sheets.is_empty() {
        Err(SpreadsheetError::SpreadsheetEmptyError(file_name.to_owned()))?
    }

    let number_formats = load_number_formats(&mut zip, is_1904)?;
    Ok(Workbook {
        zip,
        number_formats,
        sheets,
    })
}

/// Maps relationship ids to worksheet part paths.
pub(super) fn load_relationships(zip: &mut ZipArchive<UnifiedReader>, path: &str) -> Result<HashMap<String, String>, ExporterError> {
    let mut reader = zip.xml_reader(path)?
        .ok_or_else(|| SpreadsheetError::FileError(path.to_string()))?;
    let mut relationships: HashMap<String, String> = HashMap::new();
    match_xml_events!(reader => {
        Event::Start(event) if event.local_name().as_ref() == TAG_RELATIONSHIP => {
            let id = event.get_attribute_value("Id")?;
            let kind = event.get_attribute_value("Type")?;
            let target = event.get_attribute_value("Target")?;
            if kind.map(|it| it.ends_with("/worksheet")).unwrap_or(true) {
                if let Some((id, target)) = id.zip(target) {
                    relationships.insert(id.to_string(), to_zip_path(&target));
                }
            }
        }
    });
    Ok(relationships)
}

/// Resolves each style's number format to a cell type, custom formats first.
pub(super) fn resolve_number_formats(format_indexes: &[String], custom_formats: &HashMap<String, CellType>, is_1904: bool) -> Vec<CellType> {
    format_indexes
        .iter()
        .map(|id| {
            custom_formats
                .get(id)
                .copied()
                .or_else(|| CellType::parse_builtin_number_format_id(id, is_1904))
                .unwrap_or(CellType::Number)
        })
        .collect()
}

/// Normalizes a relationship target to a path inside the archive.
pub(super) fn to_zip_path(path: &str) -> String {
    if let Some(path) = path.strip_prefix('/') {
        path.to_string()
    } else if path.starts_with("xl/") {
        path.to_string()
    } else {
        format!("xl/{path}")
    }
}
