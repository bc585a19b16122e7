pub mod analyzer;
pub mod error;
pub mod parser;
pub mod types;

// Re-export main types and functions
pub use analyzer::{analyze, ColumnRef, TableKind};
pub use error::ParseError;
pub use parser::parse_sql;

// Re-export types explicitly
pub use types::{
    // Issue codes
    issue_codes,
    // Request types
    AnalysisOptions,
    AnalyzeRequest,
    // Response types
    AnalyzeResult,
    ColumnLineage,
    ColumnSchema,
    Issue,
    IssueCount,
    MergePattern,
    ProcedureAnalysis,
    SchemaMetadata,
    SchemaTable,
    Severity,
    Summary,
    TempTablePattern,
};
