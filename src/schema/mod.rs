//! # JSON Schema Handling
//!
//! Resolves `$ref` indirection across schema documents and turns a table's
//! schema into the [`TypeNode`] tree that drives extraction and code emission.
pub mod resolver;
pub mod type_tree;

pub use resolver::display_name;
pub use resolver::ResolvedSchema;
pub use resolver::SchemaCache;
pub use resolver::SchemaResolver;
pub use type_tree::build_table_root;
pub use type_tree::build_type_node;
pub use type_tree::ParseType;
pub use type_tree::TypeKind;
pub use type_tree::TypeNode;

use thiserror::Error;

/// Name of the synthetic node standing for a table's row set.
pub const ROOT_NAME: &str = "_root";

/// Malformed or unresolvable schema documents.
#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("Cannot read schema document '{document}': {message}")]
    DocumentError { document: String, message: String },

    #[error("Invalid schema document '{document}': {message}")]
    InvalidDocument { document: String, message: String },

    #[error("Invalid reference '{reference}'")]
    InvalidReference { reference: String },

    #[error("Reference '{reference}' points to a missing node '{segment}'")]
    MissingPath { reference: String, segment: String },

    #[error("Circular reference: {}", chain.join(" -> "))]
    CircularReference { chain: Vec<String> },
}

/// Schemas that are valid JSON Schema but cannot describe a table.
#[derive(Error, Debug)]
pub enum UnsupportedSchemaError {
    #[error("Field '{path}' is an array of arrays")]
    NestedArray { path: String },

    #[error("Field '{path}' has unsupported type '{kind}'")]
    UnknownKind { path: String, kind: String },

    #[error("Field '{path}' is an object without properties")]
    EmptyObject { path: String },

    #[error("Table schema must be an object or an array of objects, found '{kind}'")]
    InvalidTableRoot { kind: String },
}
