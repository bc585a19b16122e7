//! The lineage engine: statement traversal, scope management, fragment
//! accumulation, and resolution into the final report.

mod column;
mod expression;
mod from_clause;
mod graph;
mod query;
mod schema_registry;
mod scope;
mod statements;

pub use column::{ColumnRef, TableKind};

use crate::parser::parse_sql;
use crate::types::{
    issue_codes, AnalyzeRequest, AnalyzeResult, Issue, MergePattern, ProcedureAnalysis, Summary,
    TempTablePattern,
};
use chrono::Utc;
use graph::LineageGraph;
use schema_registry::{normalize_qualified_name, SchemaRegistry};
use scope::ScopeStack;
use std::collections::{BTreeSet, HashSet};
#[cfg(feature = "tracing")]
use tracing::debug;

/// Main entry point for script analysis.
pub fn analyze(request: &AnalyzeRequest) -> AnalyzeResult {
    let mut analyzer = Analyzer::new(request);
    analyzer.run()
}

/// A temp table defined by the script, in definition order.
#[derive(Debug)]
struct TempDefinition {
    name: String,
    source_pattern: &'static str,
    columns: Vec<String>,
}

/// Internal analyzer state. One instance per call; nothing is shared.
pub(crate) struct Analyzer<'a> {
    request: &'a AnalyzeRequest,
    pub(crate) schema: SchemaRegistry,
    pub(crate) scopes: ScopeStack,
    pub(crate) graph: LineageGraph,
    issues: Vec<Issue>,
    procedure_name: String,
    /// Permanent tables targeted by at least one DML statement
    output_tables: BTreeSet<String>,
    merge_patterns: Vec<MergePattern>,
    temp_definitions: Vec<TempDefinition>,
    temp_reads: HashSet<String>,
    /// Index of the statement currently being processed, for diagnostics
    current_statement: usize,
    statement_count: usize,
}

impl<'a> Analyzer<'a> {
    fn new(request: &'a AnalyzeRequest) -> Self {
        Self {
            request,
            schema: SchemaRegistry::from_metadata(request.schema.as_ref()),
            scopes: ScopeStack::new(),
            graph: LineageGraph::new(),
            issues: Vec::new(),
            procedure_name: String::new(),
            output_tables: BTreeSet::new(),
            merge_patterns: Vec::new(),
            temp_definitions: Vec::new(),
            temp_reads: HashSet::new(),
            current_statement: 0,
            statement_count: 0,
        }
    }

    fn run(&mut self) -> AnalyzeResult {
        let statements = match parse_sql(&self.request.sql) {
            Ok(statements) => statements,
            Err(e) => {
                let message = match &self.request.source_name {
                    Some(name) => format!("{name}: {e}"),
                    None => e.to_string(),
                };
                return AnalyzeResult::from_error(issue_codes::PARSE_ERROR, message);
            }
        };

        #[cfg(feature = "tracing")]
        debug!(statements = statements.len(), "parsed script");

        for statement in &statements {
            self.process_statement(statement);
        }

        self.build_result()
    }

    fn build_result(&mut self) -> AnalyzeResult {
        let final_lineages = self.graph.resolve();

        let input_tables: BTreeSet<String> = final_lineages
            .iter()
            .map(|l| l.source_table.clone())
            .collect();

        let analysis = ProcedureAnalysis {
            procedure_name: std::mem::take(&mut self.procedure_name),
            input_tables: input_tables.into_iter().collect(),
            output_tables: self.output_tables.iter().cloned().collect(),
            final_lineages,
            merge_patterns: if self.include_merge_patterns() {
                std::mem::take(&mut self.merge_patterns)
            } else {
                Vec::new()
            },
            temp_table_patterns: if self.include_temp_table_patterns() {
                self.temp_definitions
                    .iter()
                    .map(|def| TempTablePattern {
                        name: def.name.clone(),
                        source_pattern: def.source_pattern.to_string(),
                        columns: def.columns.clone(),
                        is_intermediate: self.temp_reads.contains(&def.name),
                    })
                    .collect()
            } else {
                Vec::new()
            },
            analysis_timestamp: Utc::now(),
        };

        let issue_count = AnalyzeResult::count_issues(&self.issues);
        let summary = Summary {
            statement_count: self.statement_count,
            fragment_count: self.graph.len(),
            has_errors: issue_count.errors > 0,
            issue_count,
        };

        AnalyzeResult {
            analysis,
            issues: std::mem::take(&mut self.issues),
            summary,
        }
    }

    fn include_merge_patterns(&self) -> bool {
        self.request
            .options
            .as_ref()
            .and_then(|o| o.include_merge_patterns)
            .unwrap_or(true)
    }

    fn include_temp_table_patterns(&self) -> bool {
        self.request
            .options
            .as_ref()
            .and_then(|o| o.include_temp_table_patterns)
            .unwrap_or(true)
    }

    // --- scoped acquisition -------------------------------------------------

    /// Run `f` inside a fresh alias scope; the pop is unconditional on every
    /// normal exit path of `f`.
    pub(crate) fn with_alias_scope<T>(&mut self, f: impl FnOnce(&mut Self) -> T) -> T {
        self.scopes.push_alias_scope();
        let result = f(self);
        self.scopes.pop_alias_scope();
        result
    }

    /// Run `f` inside a fresh CTE scope.
    pub(crate) fn with_cte_scope<T>(&mut self, f: impl FnOnce(&mut Self) -> T) -> T {
        self.scopes.push_cte_scope();
        let result = f(self);
        self.scopes.pop_cte_scope();
        result
    }

    // --- diagnostics --------------------------------------------------------

    pub(crate) fn warn(&mut self, code: &str, message: impl Into<String>) {
        let index = self.current_statement;
        self.issues
            .push(Issue::warning(code, message).with_statement(index));
    }

    pub(crate) fn note(&mut self, code: &str, message: impl Into<String>) {
        let index = self.current_statement;
        self.issues
            .push(Issue::info(code, message).with_statement(index));
    }

    // --- temp-table bookkeeping --------------------------------------------

    /// Record the defining statement of a temp table. The first definition
    /// wins for reporting purposes, even across a DROP and re-create.
    pub(crate) fn record_temp_definition(
        &mut self,
        name: &str,
        source_pattern: &'static str,
        columns: Vec<String>,
    ) {
        if !self.temp_definitions.iter().any(|d| d.name == name) {
            self.temp_definitions.push(TempDefinition {
                name: name.to_string(),
                source_pattern,
                columns,
            });
        }
    }

    pub(crate) fn note_temp_read(&mut self, canonical: &str) {
        if canonical.starts_with('#') {
            self.temp_reads.insert(canonical.to_string());
        }
    }

    pub(crate) fn record_output_table(&mut self, canonical: &str, kind: TableKind) {
        if kind == TableKind::Permanent {
            self.output_tables.insert(canonical.to_string());
        }
    }

    pub(crate) fn record_merge_pattern(&mut self, pattern: MergePattern) {
        self.merge_patterns.push(pattern);
    }

    pub(crate) fn set_procedure_name(&mut self, name: &str) {
        if self.procedure_name.is_empty() {
            self.procedure_name = normalize_qualified_name(name);
        }
    }

    pub(crate) fn begin_statement(&mut self) {
        self.current_statement = self.statement_count;
        self.statement_count += 1;
    }
}
