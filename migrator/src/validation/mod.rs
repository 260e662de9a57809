//! JSON Schema validation of the configuration sources.
//!
//! Schema definitions and the replacement table are checked against
//! embedded layouts before typed deserialization, so operators get every
//! violation of a hand-edited file at once instead of the first serde error.
//!
//! # Embedded Schemas
//!
//! Layouts are embedded at compile time from the `schemas/` directory:
//! - `schema-definitions.json`
//! - `replacements.json`

use serde_json::Value;

const SCHEMA_DEFINITIONS_LAYOUT: &str = include_str!("../../schemas/schema-definitions.json");
const REPLACEMENTS_LAYOUT: &str = include_str!("../../schemas/replacements.json");

/// Validate a JSON value against a JSON Schema.
///
/// # Returns
/// * `Ok(())` when valid
/// * `Err(Vec<String>)` with one message per violation
///
/// # Example
/// ```ignore
/// use serde_json::json;
/// use cpqmig::validation::validate;
///
/// let schema = json!({ "type": "object", "required": ["name"] });
/// assert!(validate(&schema, &json!({ "name": "x" })).is_ok());
/// assert!(validate(&schema, &json!({})).is_err());
/// ```
pub fn validate(schema: &Value, data: &Value) -> Result<(), Vec<String>> {
    let validator = jsonschema::draft7::new(schema)
        .map_err(|e| vec![format!("Invalid layout: {}", e)])?;

    let errors: Vec<String> = validator
        .iter_errors(data)
        .map(|e| e.to_string())
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Validate a schema definitions document.
pub fn validate_schema_definitions(data: &Value) -> Result<(), Vec<String>> {
    validate(&embedded(SCHEMA_DEFINITIONS_LAYOUT)?, data)
}

/// Validate a replacement table document.
pub fn validate_replacements(data: &Value) -> Result<(), Vec<String>> {
    validate(&embedded(REPLACEMENTS_LAYOUT)?, data)
}

fn embedded(layout: &str) -> Result<Value, Vec<String>> {
    serde_json::from_str(layout).map_err(|e| vec![format!("Embedded layout is not JSON: {}", e)])
}
