//! JSON output formatting.

use procscope_core::AnalyzeResult;

/// Format the lineage report as JSON.
///
/// Serializes the report itself, not the surrounding diagnostics; the JSON
/// key names are the tool's external contract.
pub fn format_json(result: &AnalyzeResult, compact: bool) -> String {
    if compact {
        serde_json::to_string(&result.analysis).expect("serialization cannot fail")
    } else {
        serde_json::to_string_pretty(&result.analysis).expect("serialization cannot fail")
    }
}
