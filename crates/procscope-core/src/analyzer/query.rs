//! Query traversal: CTE registration, positional select-to-target pairing,
//! wildcard expansion, and `SELECT ... INTO`.

use super::column::{ColumnRef, TableKind};
use super::expression::derive_output_name;
use super::schema_registry::normalize_qualified_name;
use super::Analyzer;
use crate::types::issue_codes;
use sqlparser::ast::{Query, Select, SelectItem, SetExpr, Values};

/// Where the rows of a query land: a table, CTE, or synthetic derived name,
/// plus the target column list when one is pinned.
///
/// `columns: None` means "pair each select element with its own output name"
/// (the inference rule for CTEs, derived tables, and inserts whose target
/// columns cannot be discovered).
#[derive(Debug, Clone)]
pub(crate) struct TargetSpec {
    pub(crate) table: String,
    pub(crate) kind: TableKind,
    pub(crate) columns: Option<Vec<String>>,
}

impl TargetSpec {
    fn with_columns(&self, columns: Vec<String>) -> Self {
        Self {
            table: self.table.clone(),
            kind: self.kind,
            columns: Some(columns),
        }
    }

    fn column_ref(&self, column: &str) -> ColumnRef {
        ColumnRef::new(&self.table, column, self.kind)
    }
}

impl Analyzer<'_> {
    /// Process a query whose rows land in `target`.
    ///
    /// Returns the target column names that were paired, in select order;
    /// callers inferring a column list (CTEs, derived tables) read it back.
    pub(crate) fn process_query(
        &mut self,
        query: &Query,
        target: Option<&TargetSpec>,
    ) -> Vec<String> {
        if query.with.is_some() {
            self.with_cte_scope(|this| {
                this.register_ctes(query);
                this.process_set_expr(&query.body, target)
            })
        } else {
            self.process_set_expr(&query.body, target)
        }
    }

    /// Register and analyze every CTE of a `WITH` block, in declaration
    /// order. Each CTE is bound *before* its body is processed so that
    /// self-referential (recursive) CTEs resolve to themselves.
    fn register_ctes(&mut self, query: &Query) {
        let Some(with) = &query.with else {
            return;
        };

        for cte in &with.cte_tables {
            let name = cte.alias.name.value.to_lowercase();
            let explicit: Vec<String> = cte
                .alias
                .columns
                .iter()
                .map(|c| c.name.value.to_lowercase())
                .collect();

            if explicit.is_empty() {
                // Bind with an empty list first so the body can refer to the
                // CTE by name, then rebind with the discovered output list.
                self.scopes.bind_cte(name.clone(), Vec::new());
                let spec = TargetSpec {
                    table: name.clone(),
                    kind: TableKind::Cte,
                    columns: None,
                };
                let produced = self.process_query(&cte.query, Some(&spec));
                self.scopes.bind_cte(name, produced);
            } else {
                self.scopes.bind_cte(name.clone(), explicit.clone());
                let spec = TargetSpec {
                    table: name,
                    kind: TableKind::Cte,
                    columns: Some(explicit),
                };
                self.process_query(&cte.query, Some(&spec));
            }
        }
    }

    pub(crate) fn process_set_expr(
        &mut self,
        body: &SetExpr,
        target: Option<&TargetSpec>,
    ) -> Vec<String> {
        match body {
            SetExpr::Select(select) => self.process_select(select, target),
            SetExpr::Query(query) => self.process_query(query, target),
            SetExpr::SetOperation { left, right, .. } => {
                let produced = self.process_set_expr(left, target);

                // Every branch of a set operation feeds the same target
                // columns. When pairing by name, later branches pair against
                // the first branch's output list.
                match target {
                    Some(spec) if spec.columns.is_none() && !produced.is_empty() => {
                        let pinned = spec.with_columns(produced.clone());
                        self.process_set_expr(right, Some(&pinned));
                    }
                    _ => {
                        self.process_set_expr(right, target);
                    }
                }
                produced
            }
            SetExpr::Values(values) => {
                self.process_values(values, target);
                target
                    .and_then(|t| t.columns.clone())
                    .unwrap_or_default()
            }
            // T-SQL `WITH ... INSERT` surfaces as a query whose body is a
            // nested INSERT; delegate with the CTE scope still active.
            SetExpr::Insert(statement) => {
                self.process_statement(statement);
                Vec::new()
            }
            _ => Vec::new(),
        }
    }

    /// Pair the projection of one SELECT with its target columns.
    fn process_select(&mut self, select: &Select, target: Option<&TargetSpec>) -> Vec<String> {
        self.with_alias_scope(|this| {
            for table_with_joins in &select.from {
                this.resolve_table_with_joins(table_with_joins);
            }

            // SELECT ... INTO is an implicit CREATE TABLE plus INSERT...SELECT:
            // the created table's columns are the select's output names.
            let into_spec = select.into.as_ref().map(|into| {
                let table = normalize_qualified_name(&into.name.to_string());
                let kind = this.scopes.classify(&table);
                this.record_output_table(&table, kind);
                TargetSpec {
                    table,
                    kind,
                    columns: None,
                }
            });
            let effective = into_spec.as_ref().or(target);

            let produced = this.pair_projection(select, effective);

            if let Some(spec) = &into_spec {
                this.finish_select_into(spec, &produced);
            }

            if let Some(filter) = &select.selection {
                this.check_filter_expression(filter);
            }
            if let Some(having) = &select.having {
                this.check_filter_expression(having);
            }

            produced
        })
    }

    fn pair_projection(&mut self, select: &Select, target: Option<&TargetSpec>) -> Vec<String> {
        let pinned = target.and_then(|t| t.columns.clone());
        let mut produced: Vec<String> = Vec::new();
        // Running output position; wildcards advance it once per expanded column.
        let mut index = 0usize;

        for item in &select.projection {
            match item {
                SelectItem::UnnamedExpr(expr) => {
                    let name = derive_output_name(expr, index);
                    let sources = self.extract_sources(expr);
                    self.emit_output(&name, sources, index, target, &pinned, &mut produced);
                    index += 1;
                }
                SelectItem::ExprWithAlias { expr, alias } => {
                    let name = alias.value.to_lowercase();
                    let sources = self.extract_sources(expr);
                    self.emit_output(&name, sources, index, target, &pinned, &mut produced);
                    index += 1;
                }
                SelectItem::QualifiedWildcard(kind, _) => {
                    let qualifier = kind.to_string();
                    for (table, column) in self.expand_wildcard(Some(&qualifier)) {
                        let source_kind = self.scopes.classify(&table);
                        let source = ColumnRef::new(&table, &column, source_kind);
                        self.emit_output(
                            &column,
                            vec![source],
                            index,
                            target,
                            &pinned,
                            &mut produced,
                        );
                        index += 1;
                    }
                }
                SelectItem::Wildcard(_) => {
                    for (table, column) in self.expand_wildcard(None) {
                        let source_kind = self.scopes.classify(&table);
                        let source = ColumnRef::new(&table, &column, source_kind);
                        self.emit_output(
                            &column,
                            vec![source],
                            index,
                            target,
                            &pinned,
                            &mut produced,
                        );
                        index += 1;
                    }
                }
            }
        }

        if let Some(columns) = &pinned {
            if index > columns.len() {
                self.warn(
                    issue_codes::COLUMN_COUNT_MISMATCH,
                    format!(
                        "select list produces {index} columns but the target has {}; extras dropped",
                        columns.len()
                    ),
                );
            } else if index < columns.len() {
                self.note(
                    issue_codes::COLUMN_COUNT_MISMATCH,
                    format!(
                        "select list produces {index} columns but the target has {}; remaining targets are unmapped",
                        columns.len()
                    ),
                );
            }
        }

        produced
    }

    /// Emit fragments for one output position and record the column it
    /// landed in. Positions beyond a pinned target column list are dropped.
    fn emit_output(
        &mut self,
        output_name: &str,
        sources: Vec<ColumnRef>,
        index: usize,
        target: Option<&TargetSpec>,
        pinned: &Option<Vec<String>>,
        produced: &mut Vec<String>,
    ) {
        let target_column = match pinned {
            Some(columns) => match columns.get(index) {
                Some(column) => column.clone(),
                None => return,
            },
            None => output_name.to_string(),
        };

        if let Some(spec) = target {
            let target_ref = spec.column_ref(&target_column);
            for source in sources {
                self.graph.add_fragment(source, target_ref.clone());
            }
        }

        produced.push(target_column);
    }

    /// Resolve a wildcard into `(table, column)` pairs against the current
    /// scopes. Relations whose column list is unknown expand to nothing and
    /// leave a diagnostic instead.
    pub(crate) fn expand_wildcard(&mut self, qualifier: Option<&str>) -> Vec<(String, String)> {
        let tables: Vec<String> = match qualifier {
            Some(qualifier) => {
                let normalized = normalize_qualified_name(qualifier);
                match self.scopes.resolve_alias(&normalized) {
                    Some(table) => vec![table.to_string()],
                    None => {
                        self.note(
                            issue_codes::UNRESOLVED_REFERENCE,
                            format!("Wildcard qualifier '{normalized}' is not bound in any active scope"),
                        );
                        Vec::new()
                    }
                }
            }
            None => self.scopes.relations_in_scope().to_vec(),
        };

        let mut expanded = Vec::new();
        for table in tables {
            let columns: Option<Vec<String>> = self
                .scopes
                .columns_of_relation(&table)
                .or_else(|| self.schema.columns_of(&table))
                .map(<[String]>::to_vec);

            match columns {
                Some(columns) if !columns.is_empty() => {
                    for column in columns {
                        expanded.push((table.clone(), column));
                    }
                }
                _ => {
                    self.note(
                        issue_codes::AMBIGUOUS_EXPANSION,
                        format!("SELECT * from '{table}': column list unknown without schema metadata"),
                    );
                }
            }
        }
        expanded
    }

    /// Pair each VALUES row expression with the corresponding target column.
    /// Expressions without column references seed literals and contribute no
    /// fragment.
    fn process_values(&mut self, values: &Values, target: Option<&TargetSpec>) {
        let Some(spec) = target else {
            return;
        };
        let Some(columns) = spec.columns.clone() else {
            self.note(
                issue_codes::AMBIGUOUS_EXPANSION,
                format!(
                    "INSERT into '{}' without a discoverable column list; VALUES not paired",
                    spec.table
                ),
            );
            return;
        };

        for row in &values.rows {
            if row.len() > columns.len() {
                self.warn(
                    issue_codes::COLUMN_COUNT_MISMATCH,
                    format!(
                        "VALUES row has {} expressions but the target has {} columns",
                        row.len(),
                        columns.len()
                    ),
                );
            }
            for (column, expr) in columns.iter().zip(row) {
                let sources = self.extract_sources(expr);
                let target_ref = spec.column_ref(column);
                for source in sources {
                    self.graph.add_fragment(source, target_ref.clone());
                }
            }
        }
    }

    /// Complete an implicit `SELECT ... INTO` definition once the produced
    /// column list is known.
    fn finish_select_into(&mut self, spec: &TargetSpec, produced: &[String]) {
        if spec.kind == TableKind::Temp {
            self.scopes
                .define_temp(spec.table.clone(), produced.to_vec());
            self.record_temp_definition(&spec.table, "SELECT_INTO", produced.to_vec());
        } else {
            self.schema.register_implied(&spec.table, produced.to_vec());
        }
    }
}
