//! # Rusty Exporter
//!
//! Exports spreadsheet tables to JSON documents shaped by a JSON schema, and
//! renders the same schemas as C# type declarations.
//!
//! ## Features
//!
//! - **Schema driven**: each table `<Table>.xlsx` is described by `<Table>.schema.json`;
//!   `$ref` may point into other schema documents
//! - **Hierarchical headers**: nested objects span several header rows, one row per
//!   nesting level
//! - **Multi-row records**: arrays continue over the rows below a record, so a record
//!   owns every row up to the next one
//! - **Validation**: extracted tables are checked against their schema before writing
//! - **Incremental output**: files are only rewritten when their content changed
//! - **Code generation**: `class`, `struct` and `enum` declarations mirroring the JSON
//!
//! ## Header layout
//!
//! ```text
//! | id | rewards        | tags |
//! |    | itemId | count |      |
//! | a1 | 100    | 1     | x    |
//! |    | 101    | 2     | y    |
//! | a2 | 200    | 5     | z    |
//! ```
//!
//! exports as
//!
//! ```json
//! [
//!     { "id": "a1", "rewards": [{ "itemId": 100, "count": 1 }, { "itemId": 101, "count": 2 }], "tags": ["x", "y"] },
//!     { "id": "a2", "rewards": [{ "itemId": 200, "count": 5 }], "tags": ["z"] }
//! ]
//! ```
pub mod codegen;
pub mod config;
pub mod error;
pub mod exporter;
mod helpers;
pub mod schema;
pub mod spreadsheet;
pub mod table;
pub mod validate;

pub use config::Config;
pub use error::ExporterError;
pub use exporter::ExportSummary;
pub use exporter::Exporter;
pub use exporter::WriteStatus;
pub use table::extract_table;
