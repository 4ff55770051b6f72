//! Exporter configuration loaded from a JSON file.

use crate::error::ExporterError;
use serde::Deserialize;
use serde::Serialize;
use std::fs;
use std::path::Path;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Cannot read config file '{path}': {message}")]
    ReadError { path: String, message: String },

    #[error("Invalid config file '{path}': {message}")]
    ParseError { path: String, message: String },

    #[error("Config field '{field}' is required for this command")]
    MissingField { field: &'static str },
}

/// Directories and naming options of one export run.
///
/// Relative directories are resolved against the directory holding the config file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    pub schema_dir_path: PathBuf,
    pub excel_dir_path: PathBuf,
    pub json_dir_path: PathBuf,

    /// Only needed to generate code
    #[serde(default)]
    pub code_dir_path: Option<PathBuf>,

    /// Prepended to generated type and file names
    #[serde(default)]
    pub code_prefix: String,

    #[serde(default = "default_data_sheet_name")]
    pub data_sheet_name: String,

    /// Glob matched against workbook file names
    #[serde(default = "default_file_pattern")]
    pub file_pattern: String,
}

fn default_data_sheet_name() -> String {
    "Data".to_owned()
}

fn default_file_pattern() -> String {
    "*.xlsx".to_owned()
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Config, ExporterError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        let base_dir = path.parent().unwrap_or_else(|| Path::new(""));
        Config::parse(&text, base_dir).map_err(|e| match e {
            ExporterError::ConfigError(ConfigError::ParseError { message, .. }) => ConfigError::ParseError {
                path: path.display().to_string(),
                message,
            }
            .into(),
            other => other,
        })
    }

    /// Parses config text, resolving relative directories against `base_dir`.
    pub fn parse(text: &str, base_dir: &Path) -> Result<Config, ExporterError> {
        let mut config: Config = serde_json::from_str(text).map_err(|e| ConfigError::ParseError {
            path: String::new(),
            message: e.to_string(),
        })?;
        config.schema_dir_path = resolve(base_dir, &config.schema_dir_path);
        config.excel_dir_path = resolve(base_dir, &config.excel_dir_path);
        config.json_dir_path = resolve(base_dir, &config.json_dir_path);
        config.code_dir_path = config.code_dir_path.as_ref().map(|dir| resolve(base_dir, dir));
        Ok(config)
    }

    pub fn code_dir(&self) -> Result<&Path, ExporterError> {
        match &self.code_dir_path {
            Some(dir) => Ok(dir.as_path()),
            None => Err(ConfigError::MissingField { field: "code_dir_path" })?,
        }
    }
}

fn resolve(base_dir: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_dir.join(path)
    }
}
