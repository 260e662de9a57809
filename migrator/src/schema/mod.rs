//! Schema registry - named column layouts loaded once at start-up.
//!
//! A schema definitions document maps each schema name to its declared
//! columns and row rules:
//!
//! ```json
//! {
//!   "CPQMIGPN": {
//!     "columns": ["CODIGO", "DESCRIPCION", "FECALTA", "*"],
//!     "skip_rows": [1],
//!     "header_row": 2,
//!     "numeric_date_columns": ["FECALTA"]
//!   },
//!   "CPQMIGCL": ["CLIENTE", "NOMBRE"]
//! }
//! ```
//!
//! A trailing `"*"` lets files carry extra columns after the declared ones.
//! The legacy keys `columnas`, `filas_omitir`, `fechas_numericas` and
//! `fila_nombres_columna` are accepted as aliases.

pub mod matcher;

use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::error::{ConfigError, ConfigResult};
use crate::logs::log_warning;
use crate::validation::validate_schema_definitions;

pub use matcher::{check_header, HeaderCheck, MatchOutcome, SchemaMatcher, PREFIX_LEN};

/// Sentinel that marks a wildcard schema.
pub const WILDCARD: &str = "*";

/// Schema entry as written in the definitions document.
#[derive(Debug, Clone, Deserialize)]
pub struct SchemaSpec {
    #[serde(alias = "columnas")]
    pub columns: Vec<String>,
    #[serde(default, alias = "filas_omitir")]
    pub skip_rows: Vec<usize>,
    #[serde(default = "default_header_row", alias = "fila_nombres_columna")]
    pub header_row: usize,
    #[serde(default, alias = "fechas_numericas")]
    pub numeric_date_columns: Vec<String>,
}

fn default_header_row() -> usize {
    1
}

impl SchemaSpec {
    /// Spec with only declared columns and default row rules.
    pub fn with_columns<S: AsRef<str>>(columns: &[S]) -> Self {
        Self {
            columns: columns.iter().map(|c| c.as_ref().to_string()).collect(),
            skip_rows: Vec::new(),
            header_row: default_header_row(),
            numeric_date_columns: Vec::new(),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SchemaEntry {
    Columns(Vec<String>),
    Spec(SchemaSpec),
}

impl From<SchemaEntry> for SchemaSpec {
    fn from(entry: SchemaEntry) -> Self {
        match entry {
            SchemaEntry::Columns(columns) => SchemaSpec::with_columns(&columns),
            SchemaEntry::Spec(spec) => spec,
        }
    }
}

/// A validated, immutable schema.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaDefinition {
    name: String,
    columns: Vec<String>,
    wildcard: bool,
    skip_rows: Vec<usize>,
    header_row: usize,
    numeric_date_columns: Vec<String>,
}

impl SchemaDefinition {
    /// Validate and normalize a spec.
    ///
    /// Column names are trimmed with inner whitespace collapsed and keep
    /// their declared spelling; lookups ignore case. The wildcard token may
    /// only appear once, as the last column.
    pub fn new(name: impl Into<String>, spec: SchemaSpec) -> ConfigResult<Self> {
        let name = name.into().trim().to_string();
        let invalid = |message: String| ConfigError::InvalidSchema {
            schema: name.clone(),
            message,
        };

        if name.is_empty() {
            return Err(invalid("schema name is empty".to_string()));
        }

        let mut columns: Vec<String> = spec.columns.iter().map(|c| normalize_name(c)).collect();
        let wildcard = columns.last().map(String::as_str) == Some(WILDCARD);
        if wildcard {
            columns.pop();
        }
        if let Some(pos) = columns.iter().position(|c| c == WILDCARD) {
            return Err(invalid(format!(
                "wildcard '*' must be the last column (found at position {})",
                pos + 1
            )));
        }
        if columns.is_empty() {
            return Err(invalid("no columns declared".to_string()));
        }
        if let Some(empty) = columns.iter().position(String::is_empty) {
            return Err(invalid(format!("column {} has an empty name", empty + 1)));
        }

        if spec.header_row == 0 {
            return Err(invalid("header row numbering starts at 1".to_string()));
        }
        let mut skip_rows = Vec::with_capacity(spec.skip_rows.len());
        for row in spec.skip_rows {
            if row == 0 {
                return Err(invalid("skip row numbering starts at 1".to_string()));
            }
            if row == spec.header_row {
                return Err(invalid(format!("header row {} is also listed as a skip row", row)));
            }
            if !skip_rows.contains(&row) {
                skip_rows.push(row);
            }
        }

        let mut numeric_date_columns: Vec<String> = Vec::new();
        for column in spec.numeric_date_columns.iter().map(|c| normalize_name(c)) {
            let key = column_key(&column);
            if !numeric_date_columns.iter().any(|c| column_key(c) == key) {
                numeric_date_columns.push(column);
            }
        }
        for column in &numeric_date_columns {
            let key = column_key(column);
            let declared = columns.iter().any(|c| column_key(c) == key);
            if !declared && !wildcard {
                return Err(invalid(format!("date column '{}' is not declared", column)));
            }
            if !declared {
                log_warning(format!(
                    "Schema '{}': date column '{}' is not declared, it only applies to extra columns",
                    name, column
                ));
            }
        }

        Ok(Self {
            name,
            columns,
            wildcard,
            skip_rows,
            header_row: spec.header_row,
            numeric_date_columns,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared columns, without the wildcard token.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Number of columns a file must at least have.
    pub fn required_count(&self) -> usize {
        self.columns.len()
    }

    /// Whether extra trailing columns are accepted.
    pub fn wildcard(&self) -> bool {
        self.wildcard
    }

    /// 1-based rows to remove, in original numbering.
    pub fn skip_rows(&self) -> &[usize] {
        &self.skip_rows
    }

    /// 1-based row holding the column names.
    pub fn header_row(&self) -> usize {
        self.header_row
    }

    pub fn numeric_date_columns(&self) -> &[String] {
        &self.numeric_date_columns
    }

    /// Whether `column` is a date column, ignoring case and spacing.
    pub fn is_date_column(&self, column: &str) -> bool {
        let key = column_key(column);
        self.numeric_date_columns.iter().any(|c| column_key(c) == key)
    }
}

/// Trim and collapse runs of whitespace.
pub fn normalize_name(name: &str) -> String {
    name.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Comparison key of a column name: normalized and upper-cased.
pub fn column_key(name: &str) -> String {
    normalize_name(name).to_uppercase()
}

/// Registry of schemas in declaration order.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    schemas: Vec<SchemaDefinition>,
    by_name: HashMap<String, usize>,
}

impl SchemaRegistry {
    /// Build from already validated definitions. Names must be unique,
    /// ignoring case, since file names are matched case-insensitively.
    pub fn new(schemas: Vec<SchemaDefinition>) -> ConfigResult<Self> {
        let mut by_name = HashMap::with_capacity(schemas.len());
        for (idx, schema) in schemas.iter().enumerate() {
            if by_name.insert(schema.name.to_uppercase(), idx).is_some() {
                return Err(ConfigError::InvalidSchema {
                    schema: schema.name.clone(),
                    message: "declared more than once".to_string(),
                });
            }
        }
        Ok(Self { schemas, by_name })
    }

    /// Load a definitions document from disk.
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&path.display().to_string(), &content)
    }

    /// Parse a definitions document. `origin` names the source in errors.
    pub fn from_json_str(origin: &str, content: &str) -> ConfigResult<Self> {
        let json_error = |e: serde_json::Error| ConfigError::Json {
            path: origin.to_string(),
            message: e.to_string(),
        };

        let document: Value = serde_json::from_str(content).map_err(json_error)?;
        validate_schema_definitions(&document).map_err(|errors| ConfigError::Layout {
            path: origin.to_string(),
            errors,
        })?;

        let entries: Map<String, Value> = serde_json::from_value(document).map_err(json_error)?;
        let mut schemas = Vec::with_capacity(entries.len());
        for (name, value) in entries {
            let entry: SchemaEntry = serde_json::from_value(value).map_err(json_error)?;
            schemas.push(SchemaDefinition::new(name, entry.into())?);
        }
        Self::new(schemas)
    }

    /// Get a schema by name (case-insensitive).
    pub fn get(&self, name: &str) -> Option<&SchemaDefinition> {
        self.by_name
            .get(&name.trim().to_uppercase())
            .map(|idx| &self.schemas[*idx])
    }

    /// Schemas in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &SchemaDefinition> {
        self.schemas.iter()
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }

    /// Schema names in declaration order.
    pub fn names(&self) -> Vec<&str> {
        self.schemas.iter().map(|s| s.name()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const DEFINITIONS: &str = r#"{
        "CPQMIGPN": {
            "columnas": ["CODIGO", "  FECHA   ALTA ", "*"],
            "filas_omitir": [1, 1],
            "fila_nombres_columna": 2,
            "fechas_numericas": ["FECHA ALTA"]
        },
        "CPQMIGCL": ["CLIENTE", "NOMBRE"]
    }"#;

    #[test]
    fn test_load_definitions_in_order() {
        let registry = SchemaRegistry::from_json_str("test", DEFINITIONS).unwrap();
        assert_eq!(registry.names(), vec!["CPQMIGPN", "CPQMIGCL"]);

        let pn = registry.get("cpqmigpn").unwrap();
        assert!(pn.wildcard());
        assert_eq!(pn.columns(), &["CODIGO".to_string(), "FECHA ALTA".to_string()]);
        assert_eq!(pn.skip_rows(), &[1]);
        assert_eq!(pn.header_row(), 2);
        assert!(pn.is_date_column("FECHA  ALTA"));

        let cl = registry.get("CPQMIGCL").unwrap();
        assert!(!cl.wildcard());
        assert_eq!(cl.header_row(), 1);
        assert!(cl.skip_rows().is_empty());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("schemas.json");
        std::fs::write(&path, DEFINITIONS).unwrap();
        assert_eq!(SchemaRegistry::load(&path).unwrap().len(), 2);
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let err = SchemaRegistry::load("/nonexistent/schemas.json").unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_wildcard_must_be_last() {
        let spec = SchemaSpec::with_columns(&["A", "*", "B"]);
        let err = SchemaDefinition::new("X", spec).unwrap_err();
        assert!(err.to_string().contains("last column"));
    }

    #[test]
    fn test_layout_violation_is_reported() {
        let err = SchemaRegistry::from_json_str("test", r#"{"X": {"columnas": "A"}}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Layout { .. }));

        let err = SchemaRegistry::from_json_str("test", "{not json").unwrap_err();
        assert!(matches!(err, ConfigError::Json { .. }));
    }

    #[test]
    fn test_undeclared_date_column_without_wildcard() {
        let mut spec = SchemaSpec::with_columns(&["A", "B"]);
        spec.numeric_date_columns = vec!["C".into()];
        assert!(SchemaDefinition::new("X", spec).is_err());
    }

    #[test]
    fn test_date_columns_ignore_case() {
        let mut spec = SchemaSpec::with_columns(&["FECHA_ALTA", "NOMBRE"]);
        spec.numeric_date_columns = vec!["fecha_alta".into(), "FECHA_ALTA".into()];
        let schema = SchemaDefinition::new("X", spec).unwrap();
        assert_eq!(schema.numeric_date_columns().len(), 1);
        assert!(schema.is_date_column("Fecha_Alta"));
        assert!(!schema.is_date_column("NOMBRE"));
        assert_eq!(schema.columns()[0], "FECHA_ALTA");
    }

    #[test]
    fn test_header_row_cannot_be_skipped() {
        let mut spec = SchemaSpec::with_columns(&["A"]);
        spec.skip_rows = vec![1];
        assert!(SchemaDefinition::new("X", spec).is_err());
    }

    #[test]
    fn test_duplicate_names_ignoring_case() {
        let a = SchemaDefinition::new("cpq", SchemaSpec::with_columns(&["A"])).unwrap();
        let b = SchemaDefinition::new("CPQ", SchemaSpec::with_columns(&["B"])).unwrap();
        assert!(SchemaRegistry::new(vec![a, b]).is_err());
    }

    #[test]
    fn test_example_configuration_loads() {
        let registry = SchemaRegistry::from_json_str(
            "schemas.example.json",
            include_str!("../../../config/schemas.example.json"),
        )
        .unwrap();
        assert_eq!(registry.names(), vec!["CPQMIGPN", "CPQMIGCL", "CPQMIGEX"]);
        let pn = registry.get("cpqmigpn").unwrap();
        assert_eq!(pn.header_row(), 2);
        assert!(pn.is_date_column("FECHA_BAJA"));
        assert!(registry.get("CPQMIGEX").unwrap().wildcard());

        let replacements = crate::replace::ReplacementTable::from_json_str(
            "replacements.example.json",
            include_str!("../../../config/replacements.example.json"),
        )
        .unwrap();
        assert_eq!(replacements.apply("Nº 5 €").0, "No 5 EUR");
    }
}
