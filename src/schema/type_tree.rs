use crate::error::ExporterError;
use crate::schema::display_name;
use crate::schema::ResolvedSchema;
use crate::schema::SchemaError;
use crate::schema::SchemaResolver;
use crate::schema::UnsupportedSchemaError;
use crate::schema::ROOT_NAME;
use serde_json::Value;
use std::fmt::Display;

/// Scalar type a leaf field's cells are coerced to.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ParseType {
    Int,
    Float,
    Bool,
    String,
}

impl ParseType {
    fn from_kind(kind: &str) -> Option<Self> {
        match kind {
            "integer" => Some(Self::Int),
            "number" => Some(Self::Float),
            "boolean" => Some(Self::Bool),
            "string" => Some(Self::String),
            _ => None,
        }
    }
}

impl Display for ParseType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Int => "integer",
            Self::Float => "number",
            Self::Bool => "boolean",
            Self::String => "string",
        };
        write!(f, "{}", name)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum TypeKind {
    Leaf(ParseType),
    /// Fields in declaration order
    Composite(Vec<TypeNode>),
}

/// One schema-declared field, or the row set of a table for the root.
#[derive(Clone, Debug, PartialEq)]
pub struct TypeNode {
    pub name: String,
    pub is_array: bool,
    pub kind: TypeKind,
    pub description: Option<String>,
    /// Display name of the definition reached through `$ref`
    pub type_name: Option<String>,
    /// Set by the `x-struct` extension keyword
    pub is_struct: bool,
    /// String members of `enum`
    pub enum_values: Vec<String>,
}

impl TypeNode {
    pub fn leaf(name: &str, parse_type: ParseType, is_array: bool) -> Self {
        Self::with_kind(name, TypeKind::Leaf(parse_type), is_array)
    }

    pub fn composite(name: &str, members: Vec<TypeNode>, is_array: bool) -> Self {
        Self::with_kind(name, TypeKind::Composite(members), is_array)
    }

    fn with_kind(name: &str, kind: TypeKind, is_array: bool) -> Self {
        Self {
            name: name.to_owned(),
            is_array,
            kind,
            description: None,
            type_name: None,
            is_struct: false,
            enum_values: Vec::new(),
        }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self.kind, TypeKind::Leaf(_))
    }

    /// `None` for composites.
    pub fn parse_type(&self) -> Option<ParseType> {
        match self.kind {
            TypeKind::Leaf(parse_type) => Some(parse_type),
            TypeKind::Composite(_) => None,
        }
    }

    /// Children in declaration order, empty for leaves.
    pub fn members(&self) -> &[TypeNode] {
        match &self.kind {
            TypeKind::Leaf(_) => &[],
            TypeKind::Composite(members) => members,
        }
    }

    pub fn member(&self, name: &str) -> Option<&TypeNode> {
        self.members().iter().find(|member| member.name == name)
    }

    /// Number of header rows needed to lay this node's descendants out; 0 for a leaf.
    pub fn max_depth(&self) -> usize {
        match &self.kind {
            TypeKind::Leaf(_) => 0,
            TypeKind::Composite(members) => 1 + members.iter().map(TypeNode::max_depth).max().unwrap_or(0),
        }
    }

    /// Number of descendant nodes, leaves and composites alike.
    pub fn field_count(&self) -> usize {
        self.members().iter().map(|member| 1 + member.field_count()).sum()
    }
}

/// Builds the root node of a table from its top-level schema.
///
/// The root is always an array of row objects named `_root`: a top-level array of
/// objects is used as is and a top-level object is taken as the row schema.
pub fn build_table_root(resolver: &SchemaResolver, document: &str, schema: &Value) -> Result<TypeNode, ExporterError> {
    let mut builder = TypeTreeBuilder {
        resolver,
        active: Vec::new(),
    };
    let resolved = resolver.resolve(document, schema)?;
    let row = match schema_kind(&resolved.schema).as_deref() {
        Some("object") => resolved,
        Some("array") => {
            let items = resolved.schema.get("items").cloned().unwrap_or(Value::Bool(true));
            let items = resolver.resolve(&resolved.document, &items)?;
            match schema_kind(&items.schema).as_deref() {
                Some("object") => items,
                kind => Err(UnsupportedSchemaError::InvalidTableRoot {
                    kind: format!("array of {}", kind.unwrap_or("unknown")),
                })?,
            }
        }
        kind => Err(UnsupportedSchemaError::InvalidTableRoot {
            kind: kind.unwrap_or("unknown").to_owned(),
        })?,
    };
    let mut root = builder.build_object(ROOT_NAME, &row, "")?;
    root.is_array = true;
    root.description = description(&row.schema).or_else(|| description(schema));
    Ok(root)
}

/// Builds the node of one named schema, e.g. an entry of a document's `definitions`.
pub fn build_type_node(resolver: &SchemaResolver, name: &str, document: &str, schema: &Value) -> Result<TypeNode, ExporterError> {
    let mut builder = TypeTreeBuilder {
        resolver,
        active: Vec::new(),
    };
    builder.build_node(name, document, schema, name)
}

/// Recursive descent over resolved schema nodes.
///
/// `active` holds the reference keys of the nodes being built, so a type that
/// contains itself is reported instead of expanding forever.
struct TypeTreeBuilder<'a> {
    resolver: &'a SchemaResolver,
    active: Vec<String>,
}

impl TypeTreeBuilder<'_> {
    fn build_node(&mut self, name: &str, document: &str, schema: &Value, path: &str) -> Result<TypeNode, ExporterError> {
        let resolved = self.resolver.resolve(document, schema)?;
        if let Some(key) = resolved.chain.iter().find(|key| self.active.contains(key)) {
            let mut chain = self.active.to_owned();
            chain.push(key.to_owned());
            Err(SchemaError::CircularReference { chain })?
        }

        let depth = self.active.len();
        self.active.extend(resolved.chain.iter().cloned());
        let node = self.build_resolved(name, &resolved, path);
        self.active.truncate(depth);
        node
    }

    fn build_resolved(&mut self, name: &str, resolved: &ResolvedSchema, path: &str) -> Result<TypeNode, ExporterError> {
        let schema = &resolved.schema;
        let mut node = match schema_kind(schema).as_deref() {
            // The node carries the element's type name; a `$ref` naming the array itself is not kept.
            Some("array") => {
                let items = schema.get("items").cloned().unwrap_or(Value::Bool(true));
                let mut element = self.build_node(name, &resolved.document, &items, path)?;
                if element.is_array {
                    Err(UnsupportedSchemaError::NestedArray { path: path.to_owned() })?
                }
                element.is_array = true;
                if let Some(description) = description(schema) {
                    element.description = Some(description);
                }
                return Ok(element);
            }
            Some("object") => self.build_object(name, resolved, path)?,
            Some(kind) => match ParseType::from_kind(kind) {
                Some(parse_type) => TypeNode::leaf(name, parse_type, false),
                None => Err(UnsupportedSchemaError::UnknownKind {
                    path: path.to_owned(),
                    kind: kind.to_owned(),
                })?,
            },
            None => Err(UnsupportedSchemaError::UnknownKind {
                path: path.to_owned(),
                kind: "untyped".to_owned(),
            })?,
        };
        node.description = description(schema);
        node.type_name = resolved.reference.as_deref().map(display_name);
        node.enum_values = schema
            .get("enum")
            .and_then(Value::as_array)
            .map(|values| values.iter().filter_map(Value::as_str).map(str::to_owned).collect())
            .unwrap_or_default();
        Ok(node)
    }

    fn build_object(&mut self, name: &str, resolved: &ResolvedSchema, path: &str) -> Result<TypeNode, ExporterError> {
        let properties = resolved
            .schema
            .get("properties")
            .and_then(Value::as_object)
            .filter(|properties| !properties.is_empty())
            .ok_or_else(|| UnsupportedSchemaError::EmptyObject {
                path: display_path(path),
            })?;

        let mut members = Vec::with_capacity(properties.len());
        for (field, schema) in properties {
            let field_path = join_path(path, field);
            members.push(self.build_node(field, &resolved.document, schema, &field_path)?);
        }
        let mut node = TypeNode::composite(name, members, false);
        node.is_struct = resolved.schema.get("x-struct").and_then(Value::as_bool).unwrap_or(false);
        Ok(node)
    }
}

/// The declared kind of a schema node. A list of types yields its first non-null
/// member; an untyped node is an object or array when it has `properties` or `items`.
pub(crate) fn schema_kind(schema: &Value) -> Option<String> {
    match schema.get("type") {
        Some(Value::String(kind)) => Some(kind.to_owned()),
        Some(Value::Array(kinds)) => kinds
            .iter()
            .filter_map(Value::as_str)
            .find(|kind| *kind != "null")
            .map(str::to_owned),
        _ if schema.get("properties").is_some() => Some("object".to_owned()),
        _ if schema.get("items").is_some() => Some("array".to_owned()),
        _ => None,
    }
}

fn description(schema: &Value) -> Option<String> {
    schema.get("description").and_then(Value::as_str).map(str::to_owned)
}

/// Dotted field path, e.g. `rewards.condition.firstClear`.
pub(crate) fn join_path(path: &str, name: &str) -> String {
    if path.is_empty() {
        name.to_owned()
    } else {
        format!("{path}.{name}")
    }
}

fn display_path(path: &str) -> String {
    if path.is_empty() {
        ROOT_NAME.to_owned()
    } else {
        path.to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn build(schema: Value) -> Result<TypeNode, ExporterError> {
        let resolver = SchemaResolver::new("schemas");
        resolver.register("Table.schema.json", schema.clone()).unwrap();
        build_table_root(&resolver, "Table.schema.json", &schema)
    }

    fn complex() -> Value {
        json!({
            "type": "array",
            "items": {
                "type": "object",
                "properties": {
                    "id": { "type": "string", "description": "Stage id" },
                    "level": { "type": "integer" },
                    "rate": { "type": "number" },
                    "hidden": { "type": "boolean" },
                    "tags": { "type": "array", "items": { "type": "string" } },
                    "rewards": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {
                                "item": { "type": "string" },
                                "condition": {
                                    "type": "object",
                                    "x-struct": true,
                                    "properties": {
                                        "firstClear": { "type": "boolean" },
                                        "stars": { "type": ["integer", "null"] }
                                    }
                                }
                            }
                        }
                    },
                    "day": { "$ref": "#/definitions/dayOfWeek" }
                }
            },
            "definitions": {
                "dayOfWeek": { "type": "string", "enum": ["Monday", "Sunday"] }
            }
        })
    }

    #[test]
    fn builds_ordered_tree() {
        let root = build(complex()).unwrap();
        assert_eq!(root.name, "_root");
        assert!(root.is_array);
        let names: Vec<&str> = root.members().iter().map(|member| member.name.as_str()).collect();
        assert_eq!(names, vec!["id", "level", "rate", "hidden", "tags", "rewards", "day"]);

        assert_eq!(root.member("level").and_then(TypeNode::parse_type), Some(ParseType::Int));
        assert_eq!(root.member("rate").and_then(TypeNode::parse_type), Some(ParseType::Float));
        assert_eq!(root.member("hidden").and_then(TypeNode::parse_type), Some(ParseType::Bool));

        let tags = root.member("tags").unwrap();
        assert!(tags.is_array);
        assert_eq!(tags.kind, TypeKind::Leaf(ParseType::String));

        let rewards = root.member("rewards").unwrap();
        assert!(rewards.is_array);
        assert!(!rewards.is_leaf());
        let condition = rewards.member("condition").unwrap();
        assert!(!condition.is_array);
        assert!(condition.is_struct);
        assert_eq!(condition.member("stars").and_then(TypeNode::parse_type), Some(ParseType::Int));
    }

    #[test]
    fn keeps_code_metadata() {
        let root = build(complex()).unwrap();
        assert_eq!(root.member("id").unwrap().description.as_deref(), Some("Stage id"));
        let day = root.member("day").unwrap();
        assert_eq!(day.type_name.as_deref(), Some("dayOfWeek"));
        assert_eq!(day.enum_values, vec!["Monday".to_owned(), "Sunday".to_owned()]);
        assert_eq!(root.member("rewards").unwrap().type_name, None);
    }

    #[test]
    fn depth_and_field_count() {
        let root = build(complex()).unwrap();
        assert_eq!(root.max_depth(), 3);
        // 7 top-level fields, 2 reward fields, 2 condition fields
        assert_eq!(root.field_count(), 11);
        assert_eq!(TypeNode::leaf("x", ParseType::Int, false).max_depth(), 0);
    }

    #[test]
    fn object_root_is_row_schema() {
        let root = build(json!({
            "type": "object",
            "properties": { "id": { "type": "integer" } }
        }))
        .unwrap();
        assert!(root.is_array);
        assert_eq!(root.members(), &[TypeNode::leaf("id", ParseType::Int, false)]);
        assert_eq!(root.max_depth(), 1);
    }

    #[test]
    fn scalar_roots_are_rejected() {
        for schema in [
            json!({ "type": "string" }),
            json!({ "type": "array", "items": { "type": "integer" } }),
        ] {
            let error = build(schema).unwrap_err();
            assert!(matches!(
                error,
                ExporterError::UnsupportedSchemaError(UnsupportedSchemaError::InvalidTableRoot { .. })
            ));
        }
    }

    #[test]
    fn nested_arrays_are_rejected() {
        let error = build(json!({
            "type": "object",
            "properties": {
                "grid": { "type": "array", "items": { "type": "array", "items": { "type": "integer" } } }
            }
        }))
        .unwrap_err();
        assert!(matches!(
            error,
            ExporterError::UnsupportedSchemaError(UnsupportedSchemaError::NestedArray { ref path }) if path == "grid"
        ));
    }

    #[test]
    fn unknown_kinds_are_rejected_with_path() {
        let error = build(json!({
            "type": "object",
            "properties": {
                "outer": { "type": "object", "properties": { "nothing": { "type": "null" } } }
            }
        }))
        .unwrap_err();
        assert!(matches!(
            error,
            ExporterError::UnsupportedSchemaError(UnsupportedSchemaError::UnknownKind { ref path, .. }) if path == "outer.nothing"
        ));
    }

    #[test]
    fn empty_objects_are_rejected() {
        let error = build(json!({
            "type": "object",
            "properties": { "meta": { "type": "object", "properties": {} } }
        }))
        .unwrap_err();
        assert!(matches!(
            error,
            ExporterError::UnsupportedSchemaError(UnsupportedSchemaError::EmptyObject { ref path }) if path == "meta"
        ));
    }

    #[test]
    fn recursive_types_are_circular() {
        let error = build(json!({
            "type": "object",
            "properties": {
                "node": { "$ref": "#/definitions/node" }
            },
            "definitions": {
                "node": {
                    "type": "object",
                    "properties": {
                        "value": { "type": "integer" },
                        "next": { "$ref": "#/definitions/node" }
                    }
                }
            }
        }))
        .unwrap_err();
        assert!(matches!(error, ExporterError::SchemaError(SchemaError::CircularReference { .. })));
    }

    #[test]
    fn shared_definition_used_twice_is_not_circular() {
        let root = build(json!({
            "type": "object",
            "properties": {
                "start": { "$ref": "#/definitions/time" },
                "end": { "$ref": "#/definitions/time" }
            },
            "definitions": {
                "time": { "type": "object", "properties": { "hour": { "type": "integer" } } }
            }
        }))
        .unwrap();
        assert_eq!(root.field_count(), 4);
        assert_eq!(root.member("end").unwrap().type_name.as_deref(), Some("time"));
    }

    #[test]
    fn referenced_arrays_take_the_element_type_name() {
        let schema = json!({
            "type": "object",
            "properties": {
                "rewards": { "$ref": "#/definitions/rewardList" },
                "tags": { "$ref": "#/definitions/tagList" }
            },
            "definitions": {
                "rewardList": { "type": "array", "items": { "$ref": "#/definitions/reward" } },
                "reward": { "type": "object", "properties": { "item": { "type": "string" } } },
                "tagList": { "type": "array", "items": { "type": "string" } }
            }
        });
        let root = build(schema).unwrap();
        let rewards = root.member("rewards").unwrap();
        assert!(rewards.is_array);
        assert_eq!(rewards.type_name.as_deref(), Some("reward"));
        let tags = root.member("tags").unwrap();
        assert!(tags.is_array);
        assert_eq!(tags.type_name, None);
    }
}
