//! # C# Code Generation
//!
//! Renders type trees as C# `class`, `struct` and `enum` declarations that
//! mirror the exported JSON.
pub mod block;

pub use block::CodeBlock;
pub use block::CodeFile;
pub use block::EnumMember;
pub use block::ObjectMember;

use crate::error::ExporterError;
use crate::schema::build_table_root;
use crate::schema::build_type_node;
use crate::schema::display_name;
use crate::schema::ParseType;
use crate::schema::SchemaResolver;
use crate::schema::TypeKind;
use crate::schema::TypeNode;
use serde_json::Value;

/// Names types `<prefix><Name>` and lays them out one file per schema document.
pub struct CodeEmitter {
    prefix: String,
}

impl CodeEmitter {
    pub fn new(prefix: &str) -> Self {
        Self {
            prefix: prefix.to_owned(),
        }
    }

    pub fn type_name(&self, name: &str) -> String {
        format!("{}{}", self.prefix, capitalize(name))
    }

    pub fn file_name(&self, stem: &str) -> String {
        format!("{}{}.generated.cs", self.prefix, capitalize(stem))
    }

    /// Declarations of a table's row type and its anonymous nested types, nested first.
    pub fn emit_table(&self, table_name: &str, root: &TypeNode) -> CodeFile {
        let mut blocks = Vec::new();
        self.push_object(&self.type_name(table_name), root, &mut blocks);
        CodeFile {
            name: self.file_name(table_name),
            blocks,
        }
    }

    /// Declarations of the `definitions` of a schema document, `None` if it defines
    /// no object or enum.
    pub fn emit_definitions(&self, resolver: &SchemaResolver, document: &str) -> Result<Option<CodeFile>, ExporterError> {
        let root = resolver.document(document)?;
        let mut blocks = Vec::new();
        if let Some(definitions) = root.get("definitions").and_then(Value::as_object) {
            for (name, schema) in definitions {
                let node = build_type_node(resolver, name, document, schema)?;
                match &node.kind {
                    TypeKind::Leaf(ParseType::String) if !node.is_array && !node.enum_values.is_empty() => {
                        blocks.push(CodeBlock::Enum {
                            name: self.type_name(name),
                            comment: node.description.to_owned(),
                            members: node
                                .enum_values
                                .iter()
                                .map(|value| EnumMember {
                                    name: value.to_owned(),
                                    comment: None,
                                })
                                .collect(),
                        });
                    }
                    TypeKind::Composite(_) if !node.is_array => {
                        self.push_object(&self.type_name(name), &node, &mut blocks);
                    }
                    _ => (),
                }
            }
        }

        Ok((!blocks.is_empty()).then(|| CodeFile {
            name: self.file_name(&display_name(document)),
            blocks,
        }))
    }

    /// Everything a schema document declares: its definitions, then its table row type
    /// when the document describes a table.
    pub fn emit_document(&self, resolver: &SchemaResolver, document: &str) -> Result<Option<CodeFile>, ExporterError> {
        let stem = display_name(document);
        let mut blocks = self
            .emit_definitions(resolver, document)?
            .map(|file| file.blocks)
            .unwrap_or_default();

        let root = resolver.document(document)?;
        if is_table_schema(&root) {
            let type_root = build_table_root(resolver, document, &root)?;
            blocks.extend(self.emit_table(&stem, &type_root).blocks);
        }

        Ok((!blocks.is_empty()).then(|| CodeFile {
            name: self.file_name(&stem),
            blocks,
        }))
    }

    /// Pushes the blocks of anonymous nested objects, then the object itself.
    fn push_object(&self, name: &str, node: &TypeNode, blocks: &mut Vec<CodeBlock>) {
        let mut members = Vec::with_capacity(node.members().len());
        for member in node.members() {
            let type_name = match (&member.kind, &member.type_name) {
                (TypeKind::Composite(_), Some(type_name)) => self.type_name(type_name),
                (TypeKind::Composite(_), None) => {
                    let nested = format!("{}_{}", name, capitalize(&member.name));
                    self.push_object(&nested, member, blocks);
                    nested
                }
                (TypeKind::Leaf(ParseType::String), Some(type_name)) if !member.enum_values.is_empty() => {
                    self.type_name(type_name)
                }
                (TypeKind::Leaf(parse_type), _) => primitive(*parse_type).to_owned(),
            };
            members.push(ObjectMember {
                name: member.name.to_owned(),
                type_name,
                is_array: member.is_array,
                comment: member.description.to_owned(),
            });
        }
        blocks.push(CodeBlock::Object {
            name: name.to_owned(),
            comment: node.description.to_owned(),
            is_struct: node.is_struct,
            members,
        });
    }
}

fn primitive(parse_type: ParseType) -> &'static str {
    match parse_type {
        ParseType::Int => "int",
        ParseType::Float => "float",
        ParseType::Bool => "bool",
        ParseType::String => "string",
    }
}

fn capitalize(name: &str) -> String {
    let mut characters = name.chars();
    match characters.next() {
        Some(first) => first.to_uppercase().chain(characters).collect(),
        None => String::new(),
    }
}

fn is_table_schema(document: &Value) -> bool {
    ["type", "properties", "items", "$ref"]
        .iter()
        .any(|keyword| document.get(keyword).is_some())
}
