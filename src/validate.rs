//! # Schema Validation
//!
//! Checks extracted tables against their JSON schema (draft 7) with the
//! `jsonschema` crate. Schemas handed in here are already inlined, so no
//! reference is retrieved while validating.

use crate::error::ExporterError;
use crate::schema::type_tree::schema_kind;
use jsonschema::Validator;
use serde_json::json;
use serde_json::Value;
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Table '{table}' does not match its schema:\n{}", format_violations(violations))]
    ValidationFailed { table: String, violations: Vec<Violation> },

    #[error("Cannot compile schema of table '{table}': {reason}")]
    ValidatorBuildError { table: String, reason: String },
}

/// One place where a value breaks its schema.
#[derive(Clone, Debug, PartialEq)]
pub struct Violation {
    /// JSON pointer into the extracted value
    pub instance_path: String,
    /// JSON pointer to the failing schema keyword
    pub schema_path: String,
    pub message: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.instance_path.is_empty() {
            write!(f, "  (root): {}", self.message)
        } else {
            write!(f, "  {}: {}", self.instance_path, self.message)
        }
    }
}

fn format_violations(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(Violation::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Schema for a table's row set: an object schema describes one row and is wrapped
/// in an array, an array schema is used as is.
pub fn row_set_schema(schema: &Value) -> Value {
    if schema_kind(schema).as_deref() == Some("object") {
        json!({ "type": "array", "items": schema })
    } else {
        schema.clone()
    }
}

/// A compiled validator for one table.
pub struct SchemaValidator {
    table: String,
    validator: Validator,
}

impl SchemaValidator {
    /// Compiles `schema` (inlined, row or row set) for `table`.
    pub fn new(table: &str, schema: &Value) -> Result<SchemaValidator, ExporterError> {
        let mut options = jsonschema::options();
        options.with_draft(jsonschema::Draft::Draft7);
        let validator = options.build(&row_set_schema(schema)).map_err(|error| ValidationError::ValidatorBuildError {
            table: table.to_owned(),
            reason: error.to_string(),
        })?;
        Ok(SchemaValidator {
            table: table.to_owned(),
            validator,
        })
    }

    /// Reports every violation of `value`, not only the first.
    pub fn validate(&self, value: &Value) -> Result<(), ExporterError> {
        let violations: Vec<Violation> = self
            .validator
            .iter_errors(value)
            .map(|error| Violation {
                instance_path: error.instance_path.to_string(),
                schema_path: error.schema_path.to_string(),
                message: error.to_string(),
            })
            .collect();

        if violations.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::ValidationFailed {
                table: self.table.to_owned(),
                violations,
            })?
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn row_schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "id": { "type": "string" },
                "level": { "type": "integer", "minimum": 1 },
                "day": { "type": "string", "enum": ["Monday", "Sunday"] }
            },
            "required": ["id"]
        })
    }

    #[test]
    fn object_schema_is_wrapped_as_row_set() {
        assert_eq!(row_set_schema(&row_schema())["type"], json!("array"));
        assert_eq!(row_set_schema(&row_schema())["items"], row_schema());
        let array = json!({ "type": "array", "items": row_schema() });
        assert_eq!(row_set_schema(&array), array);
    }

    #[test]
    fn nullable_object_schema_is_a_row() {
        let schema = json!({
            "type": ["object", "null"],
            "properties": { "id": { "type": "string" } }
        });
        assert_eq!(row_set_schema(&schema)["type"], json!("array"));
        let validator = SchemaValidator::new("Stage", &schema).unwrap();
        assert!(validator.validate(&json!([{ "id": "a" }])).is_ok());
        let untyped = json!({ "properties": { "id": { "type": "string" } } });
        assert_eq!(row_set_schema(&untyped)["items"], untyped);
    }

    #[test]
    fn conforming_rows_pass() {
        let validator = SchemaValidator::new("Stage", &row_schema()).unwrap();
        let rows = json!([{ "id": "a", "level": 2, "day": "Monday" }, { "id": "b" }]);
        assert!(validator.validate(&rows).is_ok());
        assert!(validator.validate(&json!([])).is_ok());
    }

    #[test]
    fn every_violation_is_reported_with_paths() {
        let validator = SchemaValidator::new("Stage", &row_schema()).unwrap();
        let rows = json!([{ "id": "a", "level": 0 }, { "day": "Friday" }]);
        match validator.validate(&rows).unwrap_err() {
            ExporterError::ValidationError(ValidationError::ValidationFailed { table, violations }) => {
                assert_eq!(table, "Stage");
                let paths: Vec<&str> = violations.iter().map(|violation| violation.instance_path.as_str()).collect();
                assert!(paths.contains(&"/0/level"));
                assert!(paths.contains(&"/1/day"));
                assert!(paths.contains(&"/1"));
                assert!(violations
                    .iter()
                    .any(|violation| violation.schema_path.ends_with("/minimum")));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn invalid_schema_fails_to_compile() {
        let error = SchemaValidator::new("Broken", &json!({ "type": "array", "minItems": "two" })).err().unwrap();
        assert!(matches!(
            error,
            ExporterError::ValidationError(ValidationError::ValidatorBuildError { .. })
        ));
    }
}
