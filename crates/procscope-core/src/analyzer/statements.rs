//! Statement-level processing: dispatch plus one processor per DML shape.

use super::column::ColumnRef;
use super::query::TargetSpec;
use super::schema_registry::normalize_qualified_name;
use super::Analyzer;
use crate::types::{issue_codes, MergePattern};
use sqlparser::ast::{
    self, Assignment, AssignmentTarget, Expr, FromTable, IfStatement, MergeAction, MergeClause,
    MergeInsertKind, ObjectName, Statement, TableFactor, TableWithJoins, UpdateTableFromKind,
};

impl Analyzer<'_> {
    pub(crate) fn process_statement(&mut self, statement: &Statement) {
        self.begin_statement();

        match statement {
            Statement::CreateProcedure { name, body, .. } => {
                self.set_procedure_name(&name.to_string());
                for inner in body.statements() {
                    self.process_statement(inner);
                }
            }
            Statement::Query(query) => {
                // A bare query still matters: WITH blocks wrapping an INSERT
                // arrive here, and SELECT ... INTO defines tables.
                self.process_query(query, None);
            }
            Statement::Insert(insert) => self.process_insert(insert),
            Statement::Update {
                table,
                assignments,
                from,
                selection,
                ..
            } => self.process_update(table, assignments, from, selection),
            Statement::Merge {
                table,
                source,
                on,
                clauses,
                ..
            } => self.process_merge(table, source, on, clauses),
            Statement::CreateTable(create) => self.process_create_table(create),
            Statement::Delete(delete) => self.process_delete(delete),
            Statement::Drop {
                object_type, names, ..
            } => self.process_drop(object_type, names),
            Statement::If(if_statement) => self.process_if(if_statement),
            // Recognized control-flow and session statements with no lineage.
            Statement::Declare { .. }
            | Statement::Set(_)
            | Statement::While(_)
            | Statement::Truncate { .. }
            | Statement::StartTransaction { .. }
            | Statement::Commit { .. }
            | Statement::Rollback { .. }
            | Statement::Use(_) => {}
            _ => {
                self.warn(
                    issue_codes::UNSUPPORTED_SYNTAX,
                    "Statement type not supported for lineage analysis",
                );
            }
        }
    }

    fn process_if(&mut self, if_statement: &IfStatement) {
        for inner in if_statement.if_block.conditional_statements.statements() {
            self.process_statement(inner);
        }
        for block in &if_statement.elseif_blocks {
            for inner in block.conditional_statements.statements() {
                self.process_statement(inner);
            }
        }
        if let Some(block) = &if_statement.else_block {
            for inner in block.conditional_statements.statements() {
                self.process_statement(inner);
            }
        }
    }

    fn process_insert(&mut self, insert: &ast::Insert) {
        let target = normalize_qualified_name(&insert.table.to_string());
        let kind = self.scopes.classify(&target);
        self.record_output_table(&target, kind);

        // Target column list, by priority: explicit INSERT(col, ...), then
        // temp/CTE/derived bindings, then the schema registry. When all fail,
        // the select pairs by its own output names.
        let explicit: Vec<String> = insert
            .columns
            .iter()
            .map(|c| c.value.to_lowercase())
            .collect();
        let columns = if !explicit.is_empty() {
            Some(explicit)
        } else {
            self.scopes
                .columns_of_relation(&target)
                .map(<[String]>::to_vec)
                .or_else(|| self.schema.columns_of(&target).map(<[String]>::to_vec))
        };

        let spec = TargetSpec {
            table: target,
            kind,
            columns,
        };
        if let Some(source) = &insert.source {
            self.process_query(source, Some(&spec));
        }
    }

    fn process_update(
        &mut self,
        table: &TableWithJoins,
        assignments: &[Assignment],
        from: &Option<UpdateTableFromKind>,
        selection: &Option<Expr>,
    ) {
        self.with_alias_scope(|this| {
            // FROM first: in T-SQL the update target is often an alias that
            // only the FROM clause defines (UPDATE t SET ... FROM dbo.X t).
            if let Some(from_kind) = from {
                let tables = match from_kind {
                    UpdateTableFromKind::BeforeSet(tables)
                    | UpdateTableFromKind::AfterSet(tables) => tables,
                };
                for table_with_joins in tables {
                    this.resolve_table_with_joins(table_with_joins);
                }
            }
            for join in &table.joins {
                this.resolve_table_factor(&join.relation);
            }

            let raw = match &table.relation {
                TableFactor::Table { name, alias, .. } => {
                    let canonical = normalize_qualified_name(&name.to_string());
                    if let Some(alias) = alias {
                        this.scopes.register_relation(canonical.clone());
                        this.scopes
                            .bind_alias(alias.name.value.to_lowercase(), canonical.clone());
                    }
                    canonical
                }
                _ => {
                    this.warn(
                        issue_codes::UNSUPPORTED_SYNTAX,
                        "UPDATE target is not a plain table reference",
                    );
                    return;
                }
            };

            let target = match this.scopes.resolve_alias(&raw) {
                Some(resolved) => resolved.to_string(),
                None => {
                    // Plain UPDATE dbo.Tgt: make the target resolvable from
                    // the SET and WHERE expressions.
                    this.scopes.register_relation(raw.clone());
                    if let Some((_, bare)) = raw.rsplit_once('.') {
                        this.scopes.bind_alias(bare.to_string(), raw.clone());
                    }
                    this.scopes.bind_alias(raw.clone(), raw.clone());
                    raw
                }
            };

            let kind = this.scopes.classify(&target);
            this.record_output_table(&target, kind);

            for assignment in assignments {
                let sources = this.extract_sources(&assignment.value);
                for column in assignment_target_columns(&assignment.target) {
                    let target_ref = ColumnRef::new(&target, &column, kind);
                    for source in &sources {
                        this.graph.add_fragment(source.clone(), target_ref.clone());
                    }
                }
            }

            if let Some(filter) = selection {
                this.check_filter_expression(filter);
            }
        });
    }

    fn process_merge(
        &mut self,
        table: &TableFactor,
        source: &TableFactor,
        on: &Expr,
        clauses: &[MergeClause],
    ) {
        self.with_alias_scope(|this| {
            let target = match table {
                TableFactor::Table { name, alias, .. } => {
                    let canonical = normalize_qualified_name(&name.to_string());
                    this.scopes.register_relation(canonical.clone());
                    match alias {
                        Some(alias) => this
                            .scopes
                            .bind_alias(alias.name.value.to_lowercase(), canonical.clone()),
                        None => {
                            if let Some((_, bare)) = canonical.rsplit_once('.') {
                                this.scopes.bind_alias(bare.to_string(), canonical.clone());
                            }
                            this.scopes.bind_alias(canonical.clone(), canonical.clone());
                        }
                    }
                    canonical
                }
                _ => {
                    this.warn(
                        issue_codes::UNSUPPORTED_SYNTAX,
                        "MERGE target is not a plain table reference",
                    );
                    return;
                }
            };
            let target_kind = this.scopes.classify(&target);
            this.record_output_table(&target, target_kind);

            // USING source: named tables register an alias; a derived
            // subquery becomes a synthetic relation whose columns carry the
            // subquery's lineage onward.
            let source_label = match source {
                TableFactor::Table { name, .. } => {
                    normalize_qualified_name(&name.to_string())
                }
                TableFactor::Derived {
                    alias: Some(alias), ..
                } => alias.name.value.to_lowercase(),
                _ => String::new(),
            };
            this.resolve_table_factor(source);

            // Target-side columns of the ON predicate describe the join key.
            let mut join_columns: Vec<String> = Vec::new();
            for column_ref in this.extract_sources(on) {
                if column_ref.table == target && !join_columns.contains(&column_ref.column) {
                    join_columns.push(column_ref.column);
                }
            }

            let mut update_columns: Vec<String> = Vec::new();
            let mut insert_columns: Vec<String> = Vec::new();

            for clause in clauses {
                match &clause.action {
                    MergeAction::Update { assignments } => {
                        for assignment in assignments {
                            let sources = this.extract_sources(&assignment.value);
                            for column in assignment_target_columns(&assignment.target) {
                                let target_ref = ColumnRef::new(&target, &column, target_kind);
                                for source in &sources {
                                    this.graph
                                        .add_fragment(source.clone(), target_ref.clone());
                                }
                                if !update_columns.contains(&column) {
                                    update_columns.push(column);
                                }
                            }
                        }
                    }
                    MergeAction::Insert(insert_expr) => {
                        let mut columns: Vec<String> = insert_expr
                            .columns
                            .iter()
                            .map(|c| c.value.to_lowercase())
                            .collect();
                        if columns.is_empty() {
                            columns = this
                                .scopes
                                .columns_of_relation(&target)
                                .map(<[String]>::to_vec)
                                .or_else(|| {
                                    this.schema.columns_of(&target).map(<[String]>::to_vec)
                                })
                                .unwrap_or_default();
                            if columns.is_empty() {
                                this.note(
                                    issue_codes::AMBIGUOUS_EXPANSION,
                                    format!(
                                        "MERGE INSERT into '{target}' without a discoverable column list"
                                    ),
                                );
                            }
                        }
                        for column in &columns {
                            if !insert_columns.contains(column) {
                                insert_columns.push(column.clone());
                            }
                        }

                        if let MergeInsertKind::Values(values) = &insert_expr.kind {
                            for row in &values.rows {
                                if row.len() > columns.len() && !columns.is_empty() {
                                    this.warn(
                                        issue_codes::COLUMN_COUNT_MISMATCH,
                                        format!(
                                            "MERGE INSERT row has {} expressions but {} columns",
                                            row.len(),
                                            columns.len()
                                        ),
                                    );
                                }
                                for (column, value) in columns.iter().zip(row) {
                                    let sources = this.extract_sources(value);
                                    let target_ref =
                                        ColumnRef::new(&target, column, target_kind);
                                    for source in sources {
                                        this.graph.add_fragment(source, target_ref.clone());
                                    }
                                }
                            }
                        }
                    }
                    MergeAction::Delete => {}
                }

                if let Some(predicate) = &clause.predicate {
                    this.check_filter_expression(predicate);
                }
            }

            this.record_merge_pattern(MergePattern {
                source_table: source_label,
                target_table: target,
                join_columns,
                update_columns,
                insert_columns,
            });
        });
    }

    fn process_create_table(&mut self, create: &ast::CreateTable) {
        let name = normalize_qualified_name(&create.name.to_string());
        let declared: Vec<String> = create
            .columns
            .iter()
            .map(|c| c.name.value.to_lowercase())
            .collect();

        if let Some(query) = &create.query {
            // CREATE TABLE ... AS SELECT: not T-SQL proper, but cheap to
            // honor with the same implicit-definition path as SELECT INTO.
            let kind = self.scopes.classify(&name);
            self.record_output_table(&name, kind);
            let spec = TargetSpec {
                table: name.clone(),
                kind,
                columns: if declared.is_empty() {
                    None
                } else {
                    Some(declared.clone())
                },
            };
            let produced = self.process_query(query, Some(&spec));
            let columns = if declared.is_empty() { produced } else { declared };
            if name.starts_with('#') {
                self.scopes.define_temp(name.clone(), columns.clone());
                self.record_temp_definition(&name, "CREATE_TABLE", columns);
            } else {
                self.schema.register_implied(&name, columns);
            }
            return;
        }

        if name.starts_with('#') {
            self.scopes.define_temp(name.clone(), declared.clone());
            self.record_temp_definition(&name, "CREATE_TABLE", declared);
        } else {
            self.schema.register_implied(&name, declared);
        }
    }

    fn process_delete(&mut self, delete: &ast::Delete) {
        let from_tables = match &delete.from {
            FromTable::WithFromKeyword(tables) | FromTable::WithoutKeyword(tables) => tables,
        };

        self.with_alias_scope(|this| {
            for table_with_joins in from_tables {
                this.resolve_table_with_joins(table_with_joins);
            }
            if let Some(using) = &delete.using {
                for table_with_joins in using {
                    this.resolve_table_with_joins(table_with_joins);
                }
            }

            // DELETE removes rows; it writes no columns, so it contributes no
            // fragments, but its permanent target is still an output table.
            let mut targets: Vec<String> = Vec::new();
            if delete.tables.is_empty() {
                if let Some(first) = from_tables.first() {
                    if let TableFactor::Table { name, .. } = &first.relation {
                        targets.push(normalize_qualified_name(&name.to_string()));
                    }
                }
            } else {
                for name in &delete.tables {
                    let raw = normalize_qualified_name(&name.to_string());
                    let resolved = this
                        .scopes
                        .resolve_alias(&raw)
                        .map(str::to_string)
                        .unwrap_or(raw);
                    targets.push(resolved);
                }
            }

            for target in targets {
                let kind = this.scopes.classify(&target);
                this.record_output_table(&target, kind);
            }

            if let Some(filter) = &delete.selection {
                this.check_filter_expression(filter);
            }
        });
    }

    fn process_drop(&mut self, object_type: &ast::ObjectType, names: &[ObjectName]) {
        if !matches!(object_type, ast::ObjectType::Table | ast::ObjectType::View) {
            return;
        }
        for name in names {
            let canonical = normalize_qualified_name(&name.to_string());
            if canonical.starts_with('#') {
                self.scopes.remove_temp(&canonical);
            } else {
                self.schema.remove_implied(&canonical);
            }
        }
    }
}

/// Column name(s) assigned by one SET clause, with any alias or table
/// qualifier stripped (`T.v = ...` assigns `v`).
fn assignment_target_columns(target: &AssignmentTarget) -> Vec<String> {
    match target {
        AssignmentTarget::ColumnName(name) => last_identifier(name).into_iter().collect(),
        AssignmentTarget::Tuple(names) => {
            names.iter().filter_map(last_identifier).collect()
        }
    }
}

fn last_identifier(name: &ObjectName) -> Option<String> {
    super::schema_registry::split_qualified_identifiers(&name.to_string())
        .last()
        .map(|part| normalize_qualified_name(part))
}
