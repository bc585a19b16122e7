//! Public request, response, and diagnostic types.

mod common;
mod request;
mod response;

pub use common::{issue_codes, Issue, IssueCount, Severity, Summary};
pub use request::{AnalysisOptions, AnalyzeRequest, ColumnSchema, SchemaMetadata, SchemaTable};
pub use response::{
    AnalyzeResult, ColumnLineage, MergePattern, ProcedureAnalysis, TempTablePattern,
};
