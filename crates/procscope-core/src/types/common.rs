//! Diagnostic types shared between request and response.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A diagnostic encountered during analysis (error, warning, or info).
///
/// Diagnostics never abort analysis: the engine degrades to missing lineage
/// rather than wrong lineage and reports what it skipped here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Issue {
    /// Severity level
    pub severity: Severity,

    /// Machine-readable issue code
    pub code: String,

    /// Human-readable message
    pub message: String,

    /// Optional: which statement index this issue relates to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub statement_index: Option<usize>,
}

impl Issue {
    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            code: code.into(),
            message: message.into(),
            statement_index: None,
        }
    }

    pub fn warning(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            code: code.into(),
            message: message.into(),
            statement_index: None,
        }
    }

    pub fn info(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Info,
            code: code.into(),
            message: message.into(),
            statement_index: None,
        }
    }

    pub fn with_statement(mut self, index: usize) -> Self {
        self.statement_index = Some(index);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

/// Summary statistics for an analysis run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Default)]
pub struct Summary {
    /// Total number of statements analyzed
    pub statement_count: usize,

    /// Total number of lineage fragments recorded before resolution
    pub fragment_count: usize,

    /// Issue counts by severity
    pub issue_count: IssueCount,

    /// Quick check: true if any errors were encountered
    pub has_errors: bool,
}

/// Counts of issues by severity level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Default)]
pub struct IssueCount {
    /// Number of error-level issues
    pub errors: usize,
    /// Number of warning-level issues
    pub warnings: usize,
    /// Number of info-level issues
    pub infos: usize,
}

/// Machine-readable issue codes.
pub mod issue_codes {
    pub const PARSE_ERROR: &str = "PARSE_ERROR";
    pub const UNSUPPORTED_SYNTAX: &str = "UNSUPPORTED_SYNTAX";
    pub const AMBIGUOUS_EXPANSION: &str = "AMBIGUOUS_EXPANSION";
    pub const UNRESOLVED_REFERENCE: &str = "UNRESOLVED_REFERENCE";
    pub const UNKNOWN_COLUMN: &str = "UNKNOWN_COLUMN";
    pub const COLUMN_COUNT_MISMATCH: &str = "COLUMN_COUNT_MISMATCH";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issue_creation() {
        let issue = Issue::warning(issue_codes::AMBIGUOUS_EXPANSION, "SELECT * without schema")
            .with_statement(2);

        assert_eq!(issue.severity, Severity::Warning);
        assert_eq!(issue.code, "AMBIGUOUS_EXPANSION");
        assert_eq!(issue.statement_index, Some(2));
    }
}
