//! Schema loading from a JSON file.
//!
//! The file is a JSON object mapping table names to their columns:
//!
//! ```json
//! {
//!     "dbo.Customer": { "cid": "int", "cname": "nvarchar(50)" }
//! }
//! ```
//!
//! Column order in the file is preserved; the analyzer relies on it to pair
//! `SELECT *` expansions and column-less inserts positionally. Type strings
//! are carried through but otherwise opaque.

use anyhow::{Context, Result};
use indexmap::IndexMap;
use procscope_core::{ColumnSchema, SchemaMetadata, SchemaTable};
use std::path::Path;

type SchemaFile = IndexMap<String, IndexMap<String, String>>;

/// Load schema metadata from a JSON file.
pub fn load_schema(path: &Path) -> Result<SchemaMetadata> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read schema file: {}", path.display()))?;

    parse_schema(&content)
        .with_context(|| format!("Failed to parse schema file: {}", path.display()))
}

fn parse_schema(content: &str) -> Result<SchemaMetadata> {
    let parsed: SchemaFile = serde_json::from_str(content)?;

    Ok(SchemaMetadata {
        tables: parsed
            .into_iter()
            .map(|(name, columns)| SchemaTable {
                name,
                columns: columns
                    .into_iter()
                    .map(|(name, data_type)| ColumnSchema {
                        name,
                        data_type: Some(data_type),
                    })
                    .collect(),
            })
            .collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_schema_preserves_column_order() {
        let json = r#"{
            "dbo.Customer": { "cid": "int", "cname": "nvarchar(50)", "created": "datetime" }
        }"#;

        let schema = parse_schema(json).unwrap();
        assert_eq!(schema.tables.len(), 1);

        let names: Vec<_> = schema.tables[0]
            .columns
            .iter()
            .map(|c| c.name.as_str())
            .collect();
        assert_eq!(names, vec!["cid", "cname", "created"]);
    }

    #[test]
    fn test_parse_multiple_tables() {
        let json = r#"{
            "dbo.Src": { "a": "int", "b": "int" },
            "dbo.Dst": { "a": "int", "b": "int" }
        }"#;

        let schema = parse_schema(json).unwrap();
        assert_eq!(schema.tables.len(), 2);
        assert_eq!(schema.tables[0].name, "dbo.Src");
    }

    #[test]
    fn test_parse_invalid_schema_fails() {
        let result = parse_schema("[1, 2, 3]");
        assert!(result.is_err());
    }
}
