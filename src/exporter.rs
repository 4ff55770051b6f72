//! # Batch Export
//!
//! Exports every workbook of the configured directory to a JSON file and every
//! schema document to a C# file. A table that fails is logged and skipped so the
//! remaining tables still get exported; files whose content did not change are
//! left untouched.

use crate::codegen::CodeEmitter;
use crate::config::Config;
use crate::error::ExporterError;
use crate::error::ResultMessage;
use crate::schema::build_table_root;
use crate::schema::SchemaResolver;
use crate::spreadsheet::open_spreadsheet;
use crate::table::extract_table;
use crate::validate::SchemaValidator;
use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use serde_json::Serializer;
use serde_json::Value;
use std::fs;
use std::path::Path;
use std::path::PathBuf;
use thiserror::Error;
use tracing::debug;
use tracing::error;
use tracing::info;

/// Suffix of schema document file names; the rest is the table name.
pub const SCHEMA_SUFFIX: &str = ".schema.json";

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("{failed} of {total} tables failed to export")]
    TablesFailed { failed: usize, total: usize },
}

/// Outcome of writing one output file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WriteStatus {
    Written,
    Skipped,
}

/// Counts of one export run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ExportSummary {
    pub written: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl ExportSummary {
    pub fn total(&self) -> usize {
        self.written + self.skipped + self.failed
    }

    fn record(&mut self, result: &Result<WriteStatus, ExporterError>) {
        match result {
            Ok(WriteStatus::Written) => self.written += 1,
            Ok(WriteStatus::Skipped) => self.skipped += 1,
            Err(_) => self.failed += 1,
        }
    }

    /// Turns a run with failed tables into an error.
    pub fn into_result(self) -> Result<ExportSummary, ExporterError> {
        if self.failed == 0 {
            Ok(self)
        } else {
            Err(ExportError::TablesFailed {
                failed: self.failed,
                total: self.total(),
            })?
        }
    }
}

pub struct Exporter {
    config: Config,
    resolver: SchemaResolver,
    emitter: CodeEmitter,
}

impl Exporter {
    pub fn new(config: Config) -> Self {
        let resolver = SchemaResolver::new(&config.schema_dir_path);
        let emitter = CodeEmitter::new(&config.code_prefix);
        Self {
            config,
            resolver,
            emitter,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Workbooks matching the file pattern, without editor lock files (`~` prefix), sorted.
    pub fn workbooks(&self) -> Result<Vec<PathBuf>, ExporterError> {
        list_files(&self.config.excel_dir_path, &self.config.file_pattern)
    }

    /// Schema documents of the schema directory, sorted.
    pub fn schema_documents(&self) -> Result<Vec<String>, ExporterError> {
        let documents = list_files(&self.config.schema_dir_path, &format!("*{SCHEMA_SUFFIX}"))?
            .iter()
            .filter_map(|path| path.file_name())
            .map(|name| name.to_string_lossy().to_string())
            .collect();
        Ok(documents)
    }

    /// Exports every workbook; fails with [`ExportError::TablesFailed`] if any table failed.
    pub fn export_data(&self) -> Result<ExportSummary, ExporterError> {
        let mut summary = ExportSummary::default();
        for workbook in self.workbooks()? {
            let result = self.export_table(&workbook);
            if let Err(e) = &result {
                error!(workbook = %workbook.display(), "{}", e);
            }
            summary.record(&result);
        }
        info!(
            written = summary.written,
            skipped = summary.skipped,
            failed = summary.failed,
            "Exported data"
        );
        summary.into_result()
    }

    /// Exports one workbook to `<json_dir>/<Table>.json`.
    ///
    /// The table name is the workbook's file stem and its schema is `<Table>.schema.json`.
    pub fn export_table(&self, workbook: &Path) -> Result<WriteStatus, ExporterError> {
        let table = file_stem(workbook);
        let value = self.extract(workbook)?;
        let text = to_json_text(&value)?;
        let output = self.config.json_dir_path.join(format!("{table}.json"));
        write_if_changed(&output, &text)
    }

    /// Reads and validates the table of one workbook.
    pub fn extract(&self, workbook: &Path) -> Result<Value, ExporterError> {
        let table = file_stem(workbook);
        let document = format!("{table}{SCHEMA_SUFFIX}");
        let schema = self.resolver.document(&document)?;
        let root = build_table_root(&self.resolver, &document, &schema)?;
        debug!(table = table.as_str(), fields = root.field_count(), "Built type tree");

        let mut spreadsheet = open_spreadsheet(workbook)?;
        let sheet = spreadsheet.read_sheet(&self.config.data_sheet_name)?;
        let value = extract_table(&sheet, &root)?;

        let inlined = self.resolver.inline(&document, &schema)?;
        SchemaValidator::new(&table, &inlined)?.validate(&value)?;
        Ok(value)
    }

    /// Writes the C# declarations of every schema document to the code directory.
    pub fn export_code(&self) -> Result<ExportSummary, ExporterError> {
        let code_dir = self.config.code_dir()?;
        let mut summary = ExportSummary::default();
        for document in self.schema_documents()? {
            let result = match self.emitter.emit_document(&self.resolver, &document) {
                Ok(Some(file)) => write_if_changed(&code_dir.join(&file.name), &file.to_code()),
                Ok(None) => {
                    debug!(document = document.as_str(), "Nothing to generate");
                    continue;
                }
                Err(e) => Err(e),
            };
            if let Err(e) = &result {
                error!(document = document.as_str(), "{}", e);
            }
            summary.record(&result);
        }
        info!(
            written = summary.written,
            skipped = summary.skipped,
            failed = summary.failed,
            "Generated code"
        );
        summary.into_result()
    }
}

/// Serializes `value` with four-space indentation.
pub fn to_json_text(value: &Value) -> Result<String, ExporterError> {
    let mut buffer = Vec::new();
    let formatter = PrettyFormatter::with_indent(b"    ");
    let mut serializer = Serializer::with_formatter(&mut buffer, formatter);
    value.serialize(&mut serializer)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

/// Writes `contents` unless the file already holds exactly that text.
pub fn write_if_changed(path: &Path, contents: &str) -> Result<WriteStatus, ExporterError> {
    let file = path.display().to_string();
    if let Ok(existing) = fs::read(path) {
        if existing == contents.as_bytes() {
            info!(file = file.as_str(), "Skipped");
            return Ok(WriteStatus::Skipped);
        }
    }

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(ExporterError::from)
            .with_prefix(&format!("Cannot create directory '{}'", parent.display()))?;
    }
    fs::write(path, contents)
        .map_err(ExporterError::from)
        .with_prefix(&format!("Cannot write '{file}'"))?;
    info!(file = file.as_str(), "Written");
    Ok(WriteStatus::Written)
}

fn list_files(dir: &Path, pattern: &str) -> Result<Vec<PathBuf>, ExporterError> {
    let pattern = format!("{}/{}", glob::Pattern::escape(&dir.to_string_lossy()), pattern);
    let mut files = Vec::new();
    for entry in glob::glob(&pattern)? {
        let path = entry?;
        let is_lock_file = path
            .file_name()
            .map(|name| name.to_string_lossy().starts_with('~'))
            .unwrap_or(false);
        if path.is_file() && !is_lock_file {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().to_string())
        .unwrap_or_default()
}
