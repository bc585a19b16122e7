//! Response types for the lineage analysis API.
//!
//! The serialized key names of [`ProcedureAnalysis`] are an external
//! contract; internal field names differ where the contract demands it
//! (`input_tables` serializes as `source_tables`, and so on).

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::common::{Issue, IssueCount, Severity, Summary};

/// The result of analyzing a T-SQL script.
///
/// Contains the resolved lineage report, all diagnostics encountered during
/// analysis, and summary statistics.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AnalyzeResult {
    /// The resolved lineage report
    pub analysis: ProcedureAnalysis,

    /// All diagnostics encountered during analysis
    pub issues: Vec<Issue>,

    /// Summary statistics
    pub summary: Summary,
}

impl AnalyzeResult {
    /// Create an error result with a single issue.
    pub fn from_error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            analysis: ProcedureAnalysis {
                analysis_timestamp: Utc::now(),
                ..ProcedureAnalysis::default()
            },
            issues: vec![Issue::error(code, message)],
            summary: Summary {
                statement_count: 0,
                fragment_count: 0,
                issue_count: IssueCount {
                    errors: 1,
                    warnings: 0,
                    infos: 0,
                },
                has_errors: true,
            },
        }
    }

    /// Recompute the summary issue counts from the collected issues.
    pub(crate) fn count_issues(issues: &[Issue]) -> IssueCount {
        IssueCount {
            errors: issues
                .iter()
                .filter(|i| i.severity == Severity::Error)
                .count(),
            warnings: issues
                .iter()
                .filter(|i| i.severity == Severity::Warning)
                .count(),
            infos: issues
                .iter()
                .filter(|i| i.severity == Severity::Info)
                .count(),
        }
    }
}

/// The column-level lineage report for one analyzed script.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ProcedureAnalysis {
    /// Name of the outermost procedure declaration, or empty for loose scripts
    pub procedure_name: String,

    /// Permanent tables that feed at least one resolved lineage, sorted
    #[serde(rename = "source_tables")]
    pub input_tables: Vec<String>,

    /// Permanent tables targeted by at least one DML statement, sorted
    #[serde(rename = "target_tables")]
    pub output_tables: Vec<String>,

    /// Resolved permanent-to-permanent column lineages, sorted by
    /// (target table, target column, source table, source column)
    #[serde(rename = "column_lineages")]
    pub final_lineages: Vec<ColumnLineage>,

    /// One descriptor per MERGE statement encountered
    pub merge_patterns: Vec<MergePattern>,

    /// One descriptor per temp table defined by the script
    pub temp_table_patterns: Vec<TempTablePattern>,

    /// When the analysis ran (ISO-8601 UTC)
    pub analysis_timestamp: DateTime<Utc>,
}

impl Default for ProcedureAnalysis {
    fn default() -> Self {
        Self {
            procedure_name: String::new(),
            input_tables: Vec::new(),
            output_tables: Vec::new(),
            final_lineages: Vec::new(),
            merge_patterns: Vec::new(),
            temp_table_patterns: Vec::new(),
            analysis_timestamp: DateTime::<Utc>::UNIX_EPOCH,
        }
    }
}

/// One resolved source-to-target column edge.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema)]
pub struct ColumnLineage {
    pub source_table: String,
    pub source_column: String,
    pub target_table: String,
    pub target_column: String,
}

impl ColumnLineage {
    pub fn new(
        source_table: impl Into<String>,
        source_column: impl Into<String>,
        target_table: impl Into<String>,
        target_column: impl Into<String>,
    ) -> Self {
        Self {
            source_table: source_table.into(),
            source_column: source_column.into(),
            target_table: target_table.into(),
            target_column: target_column.into(),
        }
    }

    /// Report ordering: target first, then source.
    pub(crate) fn report_key(&self) -> (&str, &str, &str, &str) {
        (
            &self.target_table,
            &self.target_column,
            &self.source_table,
            &self.source_column,
        )
    }
}

/// Descriptor for one MERGE statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct MergePattern {
    /// Canonical USING source (table name, or subquery alias for derived sources)
    pub source_table: String,
    pub target_table: String,
    /// Target-side columns referenced in the ON predicate
    #[serde(default)]
    pub join_columns: Vec<String>,
    /// Columns assigned by WHEN MATCHED UPDATE
    #[serde(default)]
    pub update_columns: Vec<String>,
    /// Columns named by WHEN NOT MATCHED INSERT
    #[serde(default)]
    pub insert_columns: Vec<String>,
}

/// Descriptor for one temp table defined by the script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct TempTablePattern {
    /// Temp table name (with the `#` prefix)
    pub name: String,
    /// How the table was defined: `CREATE_TABLE` or `SELECT_INTO`
    pub source_pattern: String,
    /// Column list in declaration order (empty when unknown)
    #[serde(default)]
    pub columns: Vec<String>,
    /// True when the script both writes and reads the table
    pub is_intermediate: bool,
}
