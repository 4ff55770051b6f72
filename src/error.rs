use thiserror::Error;

/// Main error type for the exporter.
/// Aggregates errors from the standard library, dependencies, and internal modules.
#[derive(Error, Debug)]
pub enum ExporterError {
    #[error("{0}")]
    WithContextError(String),

    // Standard library errors
    #[error("{0}")]
    IoError(#[from] std::io::Error),

    #[error("{0}")]
    ParseIntError(#[from] std::num::ParseIntError),

    // Third-party library errors
    #[error("{0}")]
    JsonError(#[from] serde_json::Error),

    #[error("{0}")]
    PatternError(#[from] glob::PatternError),

    #[error("{0}")]
    GlobError(#[from] glob::GlobError),

    #[error("{0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("{0}")]
    XmlError(#[from] quick_xml::Error),

    #[error("{0}")]
    XmlEncodingError(#[from] quick_xml::encoding::EncodingError),

    #[error("{0}")]
    XmlAttributeError(#[from] quick_xml::events::attributes::AttrError),

    // Helper module errors
    #[error("{0}")]
    XmlHelperError(#[from] crate::helpers::xml::XmlError),

    // Spreadsheet module errors
    #[error("{0}")]
    SpreadsheetError(#[from] crate::spreadsheet::SpreadsheetError),

    // Schema module errors
    #[error("{0}")]
    SchemaError(#[from] crate::schema::SchemaError),

    #[error("{0}")]
    UnsupportedSchemaError(#[from] crate::schema::UnsupportedSchemaError),

    // Table module errors
    #[error("{0}")]
    LayoutError(#[from] crate::table::LayoutError),

    #[error("{0}")]
    CellParseError(#[from] crate::table::CellParseError),

    #[error("{0}")]
    ValidationError(#[from] crate::validate::ValidationError),

    // Driver errors
    #[error("{0}")]
    ConfigError(#[from] crate::config::ConfigError),

    #[error("{0}")]
    ExportError(#[from] crate::exporter::ExportError),
}

pub(crate) trait ResultMessage {
    fn with_prefix(self, message: &str) -> Self;
}

impl<T> ResultMessage for Result<T, ExporterError> {
    fn with_prefix(self, message: &str) -> Self {
        self.map_err(|e| ExporterError::WithContextError(format!("{}: {}", message, e)))
    }
}
