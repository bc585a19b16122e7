//! Request types for the lineage analysis API.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A request to analyze a T-SQL script for column-level data lineage.
///
/// This is the main entry point for the analysis API. It accepts the script
/// along with optional schema metadata used to expand `SELECT *` and to infer
/// target columns for `INSERT` statements without a column list.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AnalyzeRequest {
    /// The T-SQL script to analyze (UTF-8 string, multi-statement supported)
    pub sql: String,

    /// Optional source name (file path or script identifier) for diagnostics
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_name: Option<String>,

    /// Optional analysis options
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<AnalysisOptions>,

    /// Optional schema metadata for permanent tables
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<SchemaMetadata>,
}

/// Options controlling report assembly.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default)]
pub struct AnalysisOptions {
    /// Collect per-MERGE descriptors in the report (default true)
    #[serde(default)]
    pub include_merge_patterns: Option<bool>,

    /// Collect temp-table descriptors in the report (default true)
    #[serde(default)]
    pub include_temp_table_patterns: Option<bool>,
}

/// Schema metadata for permanent-table column resolution.
///
/// When provided, allows the analyzer to expand wildcards and infer omitted
/// INSERT column lists. Without it the analyzer still runs; precision degrades
/// only where the script relies on `SELECT *` or column-less inserts.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default)]
pub struct SchemaMetadata {
    /// Known permanent tables, column order preserved
    #[serde(default)]
    pub tables: Vec<SchemaTable>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SchemaTable {
    /// Table name, optionally schema-qualified (e.g. `dbo.Customer`)
    pub name: String,
    #[serde(default)]
    pub columns: Vec<ColumnSchema>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ColumnSchema {
    pub name: String,
    /// Opaque type string; carried for round-tripping, ignored by lineage
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_type: Option<String>,
}
