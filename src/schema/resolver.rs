use crate::error::ExporterError;
use crate::schema::SchemaError;
use regex::Regex;
use serde_json::Map;
use serde_json::Value;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::LazyLock;
use std::sync::Mutex;
use std::sync::PoisonError;
use tracing::debug;

/// Path segments that structure a schema document rather than name a type.
const STRUCTURAL_SEGMENTS: [&str; 4] = ["definitions", "$defs", "properties", "items"];

/// `<document>#<pointer>`
static REFERENCE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([^#]*)(?:#(/.*)?)?$").expect("Hardcode regex pattern"));

/// Keywords whose values are data, never subschemas.
const LITERAL_KEYWORDS: [&str; 7] = ["enum", "const", "default", "examples", "required", "type", "description"];

/// Schema documents loaded so far, keyed by document name.
#[derive(Debug, Default)]
pub struct SchemaCache {
    documents: Mutex<HashMap<String, Arc<Value>>>,
}

impl SchemaCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached document, or loads it with `load` and caches it.
    /// Lookup, load and insert happen under one lock.
    pub fn get_or_load<F>(&self, document: &str, load: F) -> Result<Arc<Value>, ExporterError>
    where
        F: FnOnce() -> Result<Value, ExporterError>,
    {
        let mut documents = self.documents.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(value) = documents.get(document) {
            return Ok(Arc::clone(value));
        }
        let value = Arc::new(load()?);
        documents.insert(document.to_owned(), Arc::clone(&value));
        Ok(value)
    }

    /// Stores a document under `document`, replacing any cached one.
    pub fn insert(&self, document: &str, value: Value) {
        let mut documents = self.documents.lock().unwrap_or_else(PoisonError::into_inner);
        documents.insert(document.to_owned(), Arc::new(value));
    }

    pub fn len(&self) -> usize {
        self.documents.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A schema node with every leading `$ref` followed.
#[derive(Clone, Debug, PartialEq)]
pub struct ResolvedSchema {
    /// Document the node lives in; relative references inside it resolve against this one
    pub document: String,
    pub schema: Value,
    /// The last reference followed, `None` if the node was inline
    pub reference: Option<String>,
    /// Visited `document#path` keys, in order
    pub chain: Vec<String>,
}

/// Resolves `$ref` indirection against the documents of one schema directory.
pub struct SchemaResolver {
    schema_dir: PathBuf,
    cache: SchemaCache,
}

impl SchemaResolver {
    pub fn new<P: AsRef<Path>>(schema_dir: P) -> Self {
        Self {
            schema_dir: schema_dir.as_ref().to_path_buf(),
            cache: SchemaCache::new(),
        }
    }

    pub fn schema_dir(&self) -> &Path {
        &self.schema_dir
    }

    pub fn cache(&self) -> &SchemaCache {
        &self.cache
    }

    /// Returns the schema document named `document`, loading it from the schema directory
    /// on first use.
    pub fn document(&self, document: &str) -> Result<Arc<Value>, ExporterError> {
        self.cache.get_or_load(document, || self.load_document(document))
    }

    /// Adds an in-memory document after checking its shape.
    pub fn register(&self, document: &str, value: Value) -> Result<(), ExporterError> {
        check_shape(document, &value, "")?;
        self.cache.insert(document, value);
        Ok(())
    }

    fn load_document(&self, document: &str) -> Result<Value, ExporterError> {
        let path = self.schema_dir.join(document);
        let text = fs::read_to_string(&path).map_err(|error| SchemaError::DocumentError {
            document: document.to_owned(),
            message: error.to_string(),
        })?;
        let value: Value = serde_json::from_str(&text).map_err(|error| SchemaError::DocumentError {
            document: document.to_owned(),
            message: error.to_string(),
        })?;
        check_shape(document, &value, "")?;
        debug!(document, "Loaded schema document");
        Ok(value)
    }

    /// Follows `$ref` until `node` is concrete.
    ///
    /// A reference is `<document>#<pointer>`; an empty document part means the document
    /// the reference appears in. Revisiting a `document#pointer` key is a circular reference.
    pub fn resolve(&self, document: &str, node: &Value) -> Result<ResolvedSchema, ExporterError> {
        let mut resolved = ResolvedSchema {
            document: document.to_owned(),
            schema: node.clone(),
            reference: None,
            chain: Vec::new(),
        };
        while let Some(reference) = resolved.schema.get("$ref").map(reference_text) {
            let reference = reference?;
            let (target, pointer) = split_reference(&reference)?;
            let target = if target.is_empty() { resolved.document.to_owned() } else { target };
            let key = format!("{target}#{pointer}");
            if resolved.chain.contains(&key) {
                resolved.chain.push(key);
                return Err(SchemaError::CircularReference { chain: resolved.chain }.into());
            }
            resolved.chain.push(key);

            let root = self.document(&target)?;
            resolved.schema = lookup(&root, &pointer, &reference)?.clone();
            resolved.document = target;
            resolved.reference = Some(reference);
        }
        Ok(resolved)
    }

    /// Returns a copy of `node` with every `$ref` replaced by its target, recursively.
    /// `definitions` sections are dropped since nothing refers to them any more.
    pub fn inline(&self, document: &str, node: &Value) -> Result<Value, ExporterError> {
        self.inline_node(document, node, &mut Vec::new())
    }

    fn inline_node(&self, document: &str, node: &Value, active: &mut Vec<String>) -> Result<Value, ExporterError> {
        let resolved = self.resolve(document, node)?;
        if let Some(key) = resolved.chain.iter().find(|key| active.contains(key)) {
            let mut chain = active.to_owned();
            chain.push(key.to_owned());
            Err(SchemaError::CircularReference { chain })?
        }

        let depth = active.len();
        active.extend(resolved.chain.iter().cloned());
        let document = resolved.document.as_str();
        let inlined = match &resolved.schema {
            Value::Object(object) => {
                let mut inlined = Map::new();
                for (keyword, value) in object {
                    let value = match (keyword.as_str(), value) {
                        ("definitions" | "$defs", _) => continue,
                        (keyword, value) if LITERAL_KEYWORDS.contains(&keyword) => value.clone(),
                        ("properties" | "patternProperties", Value::Object(children)) => {
                            let mut properties = Map::new();
                            for (name, child) in children {
                                properties.insert(name.to_owned(), self.inline_node(document, child, active)?);
                            }
                            Value::Object(properties)
                        }
                        (_, Value::Object(_)) => self.inline_node(document, value, active)?,
                        (_, Value::Array(items)) => Value::Array(
                            items
                                .iter()
                                .map(|item| match item {
                                    Value::Object(_) => self.inline_node(document, item, active),
                                    _ => Ok(item.clone()),
                                })
                                .collect::<Result<Vec<_>, _>>()?,
                        ),
                        (_, value) => value.clone(),
                    };
                    inlined.insert(keyword.to_owned(), value);
                }
                Value::Object(inlined)
            }
            other => other.clone(),
        };
        active.truncate(depth);
        Ok(inlined)
    }
}

fn reference_text(reference: &Value) -> Result<String, ExporterError> {
    match reference.as_str() {
        Some(text) => Ok(text.to_owned()),
        None => Err(SchemaError::InvalidReference { reference: reference.to_string() })?,
    }
}

/// Splits `<document>#<pointer>` into its parts; the pointer is empty or starts with `/`.
fn split_reference(reference: &str) -> Result<(String, String), SchemaError> {
    let captures = REFERENCE_PATTERN.captures(reference).ok_or_else(|| SchemaError::InvalidReference {
        reference: reference.to_owned(),
    })?;
    let document = captures.get(1).map(|m| m.as_str().to_owned()).unwrap_or_default();
    let pointer = captures.get(2).map(|m| m.as_str().to_owned()).unwrap_or_default();
    if document.is_empty() && pointer.is_empty() && !reference.starts_with('#') {
        Err(SchemaError::InvalidReference { reference: reference.to_owned() })?
    }
    Ok((document, pointer))
}

/// Walks a JSON pointer through objects and arrays.
fn lookup<'a>(root: &'a Value, pointer: &str, reference: &str) -> Result<&'a Value, SchemaError> {
    let mut node = root;
    for segment in pointer.split('/').skip(1) {
        let segment = segment.replace("~1", "/").replace("~0", "~");
        let next = match node {
            Value::Object(object) => object.get(&segment),
            Value::Array(items) => segment.parse::<usize>().ok().and_then(|index| items.get(index)),
            _ => None,
        };
        node = next.ok_or_else(|| SchemaError::MissingPath {
            reference: reference.to_owned(),
            segment: segment.to_owned(),
        })?;
    }
    Ok(node)
}

/// Checks the keywords the resolver and the type tree rely on.
fn check_shape(document: &str, schema: &Value, pointer: &str) -> Result<(), SchemaError> {
    let invalid = |message: String| SchemaError::InvalidDocument {
        document: document.to_owned(),
        message,
    };
    let location = if pointer.is_empty() { "document root" } else { pointer };

    let object = match schema {
        Value::Object(object) => object,
        Value::Bool(_) if !pointer.is_empty() => return Ok(()),
        _ => return Err(invalid(format!("{location} must be an object"))),
    };

    if let Some(kind) = object.get("type") {
        let is_valid = match kind {
            Value::String(_) => true,
            Value::Array(kinds) => kinds.iter().all(Value::is_string),
            _ => false,
        };
        if !is_valid {
            return Err(invalid(format!("'type' at {location} must be a string or an array of strings")));
        }
    }

    for keyword in ["properties", "definitions", "$defs"] {
        if let Some(children) = object.get(keyword) {
            let children = children
                .as_object()
                .ok_or_else(|| invalid(format!("'{keyword}' at {location} must be an object")))?;
            for (name, child) in children {
                check_shape(document, child, &format!("{pointer}/{keyword}/{name}"))?;
            }
        }
    }

    match object.get("items") {
        Some(items @ Value::Object(_)) => check_shape(document, items, &format!("{pointer}/items"))?,
        Some(Value::Bool(_)) | None => (),
        Some(_) => return Err(invalid(format!("'items' at {location} must be an object or a boolean"))),
    }
    Ok(())
}

/// Name of the type a reference points to: the last pointer segment that is not
/// `definitions`, `properties` or `items`, or the document name without extensions.
pub fn display_name(reference: &str) -> String {
    let (document, pointer) = reference.split_once('#').unwrap_or((reference, ""));
    pointer
        .split('/')
        .filter(|segment| !segment.is_empty() && !STRUCTURAL_SEGMENTS.contains(segment))
        .filter(|segment| segment.parse::<usize>().is_err())
        .last()
        .map(|segment| segment.replace("~1", "/").replace("~0", "~"))
        .unwrap_or_else(|| {
            let file_name = document.rsplit('/').next().unwrap_or(document);
            file_name.split('.').next().unwrap_or_default().to_owned()
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn resolver() -> SchemaResolver {
        let resolver = SchemaResolver::new("schemas");
        resolver
            .register(
                "Common.schema.json",
                json!({
                    "definitions": {
                        "dayOfWeek": { "type": "string", "enum": ["Monday", "Tuesday"] },
                        "weekday": { "$ref": "#/definitions/dayOfWeek" },
                        "openTime": {
                            "type": "object",
                            "properties": {
                                "day": { "$ref": "#/definitions/dayOfWeek" },
                                "hour": { "type": "integer" }
                            }
                        }
                    }
                }),
            )
            .unwrap();
        resolver
            .register(
                "Shop.schema.json",
                json!({
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "id": { "type": "string" },
                            "day": { "$ref": "Common.schema.json#/definitions/weekday" },
                            "open": { "$ref": "Common.schema.json#/definitions/openTime" },
                            "slot": { "$ref": "#/definitions/slot" }
                        }
                    },
                    "definitions": {
                        "slot": { "type": "integer" }
                    }
                }),
            )
            .unwrap();
        resolver
    }

    #[test]
    fn references_are_split_at_hash() {
        assert_eq!(split_reference("#/definitions/a").unwrap(), ("".to_owned(), "/definitions/a".to_owned()));
        assert_eq!(split_reference("Other.json#/a/b").unwrap(), ("Other.json".to_owned(), "/a/b".to_owned()));
        assert_eq!(split_reference("Other.json").unwrap(), ("Other.json".to_owned(), "".to_owned()));
        assert_eq!(split_reference("#").unwrap(), ("".to_owned(), "".to_owned()));
        assert!(split_reference("Other.json#a").is_err());
        assert!(split_reference("").is_err());
    }

    #[test]
    fn resolves_local_and_cross_document_references() {
        let resolver = resolver();
        let shop = resolver.document("Shop.schema.json").unwrap();
        let properties = &shop["items"]["properties"];

        let slot = resolver.resolve("Shop.schema.json", &properties["slot"]).unwrap();
        assert_eq!(slot.schema, json!({ "type": "integer" }));
        assert_eq!(slot.document, "Shop.schema.json");

        let day = resolver.resolve("Shop.schema.json", &properties["day"]).unwrap();
        assert_eq!(day.schema["enum"], json!(["Monday", "Tuesday"]));
        assert_eq!(day.document, "Common.schema.json");
        assert_eq!(day.reference.as_deref(), Some("#/definitions/dayOfWeek"));
        assert_eq!(
            day.chain,
            vec![
                "Common.schema.json#/definitions/weekday".to_owned(),
                "Common.schema.json#/definitions/dayOfWeek".to_owned(),
            ]
        );
    }

    #[test]
    fn same_reference_resolves_identically_from_any_document() {
        let resolver = resolver();
        let node = json!({ "$ref": "Common.schema.json#/definitions/dayOfWeek" });
        let from_shop = resolver.resolve("Shop.schema.json", &node).unwrap();
        let from_common = resolver.resolve("Common.schema.json", &node).unwrap();
        assert_eq!(from_shop.schema, from_common.schema);
    }

    #[test]
    fn inline_node_is_returned_as_is() {
        let resolver = resolver();
        let node = json!({ "type": "boolean" });
        let resolved = resolver.resolve("Shop.schema.json", &node).unwrap();
        assert_eq!(resolved.schema, node);
        assert_eq!(resolved.reference, None);
        assert!(resolved.chain.is_empty());
    }

    #[test]
    fn missing_path_segment_is_reported() {
        let resolver = resolver();
        let node = json!({ "$ref": "Common.schema.json#/definitions/month" });
        let error = resolver.resolve("Shop.schema.json", &node).unwrap_err();
        assert!(matches!(
            error,
            ExporterError::SchemaError(SchemaError::MissingPath { ref segment, .. }) if segment == "month"
        ));
    }

    #[test]
    fn missing_document_is_reported() {
        let resolver = resolver();
        let node = json!({ "$ref": "Nowhere.schema.json#/definitions/a" });
        let error = resolver.resolve("Shop.schema.json", &node).unwrap_err();
        assert!(matches!(error, ExporterError::SchemaError(SchemaError::DocumentError { .. })));
    }

    #[test]
    fn non_string_reference_is_invalid() {
        let resolver = resolver();
        let error = resolver.resolve("Shop.schema.json", &json!({ "$ref": 3 })).unwrap_err();
        assert!(matches!(error, ExporterError::SchemaError(SchemaError::InvalidReference { .. })));
    }

    #[test]
    fn circular_references_fail_fast() {
        let resolver = SchemaResolver::new("schemas");
        resolver
            .register(
                "Loop.schema.json",
                json!({
                    "definitions": {
                        "a": { "$ref": "#/definitions/b" },
                        "b": { "$ref": "#/definitions/a" }
                    }
                }),
            )
            .unwrap();
        let error = resolver
            .resolve("Loop.schema.json", &json!({ "$ref": "#/definitions/a" }))
            .unwrap_err();
        match error {
            ExporterError::SchemaError(SchemaError::CircularReference { chain }) => {
                assert_eq!(chain.first(), chain.last());
                assert_eq!(chain.len(), 3);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn json_pointer_escapes_and_array_indexes() {
        let resolver = SchemaResolver::new("schemas");
        resolver
            .register(
                "Odd.schema.json",
                json!({
                    "definitions": {
                        "a/b": { "type": "integer" },
                        "c~d": { "type": "number" },
                        "list": { "anyOf": [{ "type": "string" }, { "type": "boolean" }] }
                    }
                }),
            )
            .unwrap();
        let resolve = |reference: &str| {
            resolver
                .resolve("Odd.schema.json", &json!({ "$ref": reference }))
                .unwrap()
                .schema
        };
        assert_eq!(resolve("#/definitions/a~1b"), json!({ "type": "integer" }));
        assert_eq!(resolve("#/definitions/c~0d"), json!({ "type": "number" }));
        assert_eq!(resolve("#/definitions/list/anyOf/1"), json!({ "type": "boolean" }));
    }

    #[test]
    fn shape_errors_are_rejected() {
        let resolver = SchemaResolver::new("schemas");
        assert!(resolver.register("A.schema.json", json!([])).is_err());
        assert!(resolver.register("B.schema.json", json!({ "type": 3 })).is_err());
        assert!(resolver.register("C.schema.json", json!({ "properties": [] })).is_err());
        assert!(resolver.register("D.schema.json", json!({ "items": "x" })).is_err());
        assert!(resolver
            .register("E.schema.json", json!({ "properties": { "a": { "type": ["string", 1] } } }))
            .is_err());
        assert!(resolver
            .register("F.schema.json", json!({ "type": ["string", "null"], "items": true }))
            .is_ok());
    }

    #[test]
    fn inline_replaces_every_reference() {
        let resolver = resolver();
        let shop = resolver.document("Shop.schema.json").unwrap();
        let inlined = resolver.inline("Shop.schema.json", &shop).unwrap();
        assert_eq!(
            inlined,
            json!({
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "id": { "type": "string" },
                        "day": { "type": "string", "enum": ["Monday", "Tuesday"] },
                        "open": {
                            "type": "object",
                            "properties": {
                                "day": { "type": "string", "enum": ["Monday", "Tuesday"] },
                                "hour": { "type": "integer" }
                            }
                        },
                        "slot": { "type": "integer" }
                    }
                }
            })
        );
    }

    #[test]
    fn inline_detects_recursive_types() {
        let resolver = SchemaResolver::new("schemas");
        resolver
            .register(
                "Tree.schema.json",
                json!({
                    "type": "object",
                    "properties": { "child": { "$ref": "#" } }
                }),
            )
            .unwrap();
        let tree = resolver.document("Tree.schema.json").unwrap();
        let error = resolver.inline("Tree.schema.json", &json!({ "$ref": "#" })).unwrap_err();
        assert!(matches!(error, ExporterError::SchemaError(SchemaError::CircularReference { .. })));
        assert!(resolver.inline("Tree.schema.json", &tree).is_err());
    }

    #[test]
    fn documents_load_once_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("Item.schema.json"), r#"{"type": "object", "properties": {"id": {"type": "integer"}}}"#).unwrap();
        let resolver = SchemaResolver::new(dir.path());
        let first = resolver.document("Item.schema.json").unwrap();
        fs::write(dir.path().join("Item.schema.json"), "not json").unwrap();
        let second = resolver.document("Item.schema.json").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(resolver.cache().len(), 1);

        fs::write(dir.path().join("Broken.schema.json"), "not json").unwrap();
        assert!(resolver.document("Broken.schema.json").is_err());
        assert_eq!(resolver.cache().len(), 1);
    }

    #[test]
    fn display_names() {
        assert_eq!(display_name("Common.schema.json#/definitions/dayOfWeek"), "dayOfWeek");
        assert_eq!(display_name("#/definitions/openTime/properties/day"), "day");
        assert_eq!(display_name("#/definitions/reward/items"), "reward");
        assert_eq!(display_name("Common.schema.json"), "Common");
        assert_eq!(display_name("shared/Common.schema.json#"), "Common");
    }
}
