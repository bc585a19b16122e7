//! Source-column extraction over scalar expressions.
//!
//! Walks an expression tree and returns the set of `(table, column)` leaves
//! it depends on, resolving qualifiers through the active alias scopes.
//! Ambiguity policy: record-and-drop. An unqualified column that cannot be
//! attributed to exactly one relation produces a diagnostic, not a guess.

use super::column::{ColumnRef, TableKind};
use super::schema_registry::normalize_qualified_name;
use super::Analyzer;
use crate::types::issue_codes;
use sqlparser::ast::{
    self, Expr, FunctionArg, FunctionArgExpr, Ident, Query, SelectItem, SetExpr,
};

impl Analyzer<'_> {
    /// All source columns a scalar expression depends on.
    pub(crate) fn extract_sources(&mut self, expr: &Expr) -> Vec<ColumnRef> {
        let mut refs = Vec::new();
        self.collect_sources(expr, &mut refs);
        refs
    }

    fn collect_sources(&mut self, expr: &Expr, refs: &mut Vec<ColumnRef>) {
        match expr {
            Expr::Identifier(ident) => {
                self.resolve_unqualified(ident, refs);
            }
            Expr::CompoundIdentifier(parts) => {
                self.resolve_qualified(parts, refs);
            }
            Expr::BinaryOp { left, right, .. } => {
                self.collect_sources(left, refs);
                self.collect_sources(right, refs);
            }
            Expr::UnaryOp { expr, .. } => {
                self.collect_sources(expr, refs);
            }
            Expr::Function(func) => match &func.args {
                ast::FunctionArguments::List(arg_list) => {
                    for arg in &arg_list.args {
                        match arg {
                            FunctionArg::Unnamed(FunctionArgExpr::Expr(e)) => {
                                self.collect_sources(e, refs);
                            }
                            FunctionArg::Named { arg, .. } => {
                                if let FunctionArgExpr::Expr(e) = arg {
                                    self.collect_sources(e, refs);
                                }
                            }
                            _ => {}
                        }
                    }
                }
                ast::FunctionArguments::Subquery(query) => {
                    refs.extend(self.extract_subquery_sources(query));
                }
                ast::FunctionArguments::None => {}
            },
            Expr::Case {
                operand,
                conditions,
                else_result,
                ..
            } => {
                if let Some(op) = operand {
                    self.collect_sources(op, refs);
                }
                for case_when in conditions {
                    self.collect_sources(&case_when.condition, refs);
                    self.collect_sources(&case_when.result, refs);
                }
                if let Some(el) = else_result {
                    self.collect_sources(el, refs);
                }
            }
            Expr::Cast { expr, .. } => {
                self.collect_sources(expr, refs);
            }
            Expr::Convert { expr, .. } => {
                self.collect_sources(expr, refs);
            }
            Expr::Collate { expr, .. } => {
                self.collect_sources(expr, refs);
            }
            Expr::Nested(inner) => {
                self.collect_sources(inner, refs);
            }
            Expr::Subquery(query) => {
                refs.extend(self.extract_subquery_sources(query));
            }
            Expr::InSubquery { expr, .. } => {
                // Membership predicates gate rows; they do not feed values.
                self.collect_sources(expr, refs);
            }
            Expr::Exists { .. } => {}
            Expr::InList { expr, list, .. } => {
                self.collect_sources(expr, refs);
                for item in list {
                    self.collect_sources(item, refs);
                }
            }
            Expr::Between {
                expr, low, high, ..
            } => {
                self.collect_sources(expr, refs);
                self.collect_sources(low, refs);
                self.collect_sources(high, refs);
            }
            Expr::IsNull(e) | Expr::IsNotNull(e) => {
                self.collect_sources(e, refs);
            }
            Expr::IsFalse(e) | Expr::IsNotFalse(e) | Expr::IsTrue(e) | Expr::IsNotTrue(e) => {
                self.collect_sources(e, refs);
            }
            Expr::Like { expr, pattern, .. } | Expr::ILike { expr, pattern, .. } => {
                self.collect_sources(expr, refs);
                self.collect_sources(pattern, refs);
            }
            Expr::Tuple(exprs) => {
                for e in exprs {
                    self.collect_sources(e, refs);
                }
            }
            Expr::Extract { expr, .. } => {
                self.collect_sources(expr, refs);
            }
            Expr::Substring { expr, .. } => {
                self.collect_sources(expr, refs);
            }
            _ => {
                // Literals and exotic node kinds reference no columns.
            }
        }
    }

    /// `col` with no qualifier. Attributed only when ownership is certain:
    /// a single relation in scope, or exactly one schema-known owner.
    fn resolve_unqualified(&mut self, ident: &Ident, refs: &mut Vec<ColumnRef>) {
        // T-SQL variables look like identifiers but never name columns.
        if ident.value.starts_with('@') {
            return;
        }
        let column = ident.value.to_lowercase();

        let relations = self.scopes.relations_in_scope().to_vec();
        if relations.len() == 1 {
            let table = &relations[0];
            let kind = self.scopes.classify(table);
            self.validate_column(table, &column, kind);
            refs.push(ColumnRef::new(table, &column, kind));
            return;
        }

        let owners: Vec<&String> = relations
            .iter()
            .filter(|table| {
                self.scopes
                    .columns_of_relation(table)
                    .or_else(|| self.schema.columns_of(table))
                    .is_some_and(|cols| cols.iter().any(|c| c == &column))
            })
            .collect();

        if let [owner] = owners[..] {
            let kind = self.scopes.classify(owner);
            refs.push(ColumnRef::new(owner, &column, kind));
            return;
        }

        self.note(
            issue_codes::UNRESOLVED_REFERENCE,
            format!("Column '{column}' could not be attributed to a single table"),
        );
    }

    /// `alias.col`, `table.col`, or `schema.table.col`. The leading prefix
    /// resolves through the alias scopes; an unresolved prefix is carried
    /// verbatim and tagged, so it can never reach the final report.
    fn resolve_qualified(&mut self, parts: &[Ident], refs: &mut Vec<ColumnRef>) {
        let Some((last, qualifier_parts)) = parts.split_last() else {
            return;
        };
        if qualifier_parts.is_empty() {
            self.resolve_unqualified(last, refs);
            return;
        }

        let column = last.value.to_lowercase();
        let qualifier = qualifier_parts
            .iter()
            .map(|p| p.value.to_lowercase())
            .collect::<Vec<_>>()
            .join(".");

        match self.scopes.resolve_alias(&qualifier) {
            Some(table) => {
                let table = table.to_string();
                let kind = self.scopes.classify(&table);
                self.validate_column(&table, &column, kind);
                refs.push(ColumnRef::new(&table, &column, kind));
            }
            None => {
                refs.push(ColumnRef::new(&qualifier, &column, TableKind::Unresolved));
                self.note(
                    issue_codes::UNRESOLVED_REFERENCE,
                    format!("Alias '{qualifier}' is not bound in any active scope"),
                );
            }
        }
    }

    /// Scalar subquery: its projection's sources flow to whatever consumes
    /// the subquery's value. Processed with a pushed alias scope, so outer
    /// aliases stay visible for correlated references.
    fn extract_subquery_sources(&mut self, query: &Query) -> Vec<ColumnRef> {
        match &*query.body {
            SetExpr::Select(select) => self.with_alias_scope(|this| {
                for table_with_joins in &select.from {
                    this.resolve_table_with_joins(table_with_joins);
                }

                let mut refs = Vec::new();
                for item in &select.projection {
                    match item {
                        SelectItem::UnnamedExpr(expr)
                        | SelectItem::ExprWithAlias { expr, .. } => {
                            this.collect_sources(expr, &mut refs);
                        }
                        SelectItem::QualifiedWildcard(kind, _) => {
                            let qualifier = kind.to_string();
                            for (table, column) in this.expand_wildcard(Some(&qualifier)) {
                                let kind = this.scopes.classify(&table);
                                refs.push(ColumnRef::new(&table, &column, kind));
                            }
                        }
                        SelectItem::Wildcard(_) => {
                            for (table, column) in this.expand_wildcard(None) {
                                let kind = this.scopes.classify(&table);
                                refs.push(ColumnRef::new(&table, &column, kind));
                            }
                        }
                    }
                }
                refs
            }),
            SetExpr::Query(inner) => self.extract_subquery_sources(inner),
            _ => Vec::new(),
        }
    }

    /// Flag references to columns the registry knows are absent. Only fires
    /// for permanent tables with a known, non-empty column list.
    pub(crate) fn validate_column(&mut self, table: &str, column: &str, kind: TableKind) {
        if kind != TableKind::Permanent {
            return;
        }
        let missing = self
            .schema
            .columns_of(table)
            .is_some_and(|columns| !columns.is_empty() && !columns.iter().any(|c| c == column));
        if missing {
            let message = format!("Column '{column}' not found in table '{table}'");
            self.warn(issue_codes::UNKNOWN_COLUMN, message);
        }
    }

    /// Walk WHERE/HAVING expressions for diagnostics without contributing
    /// fragments. Extraction already validates as it resolves.
    pub(crate) fn check_filter_expression(&mut self, expr: &Expr) {
        let _ = self.extract_sources(expr);
    }
}

/// Output name for an unaliased select element, mirroring how the engine
/// names CTE and derived-table columns.
pub(crate) fn derive_output_name(expr: &Expr, index: usize) -> String {
    match expr {
        Expr::Identifier(ident) => ident.value.to_lowercase(),
        Expr::CompoundIdentifier(parts) => parts
            .last()
            .map(|i| i.value.to_lowercase())
            .unwrap_or_else(|| format!("col_{index}")),
        Expr::Function(func) => normalize_qualified_name(&func.name.to_string()),
        _ => format!("col_{index}"),
    }
}
