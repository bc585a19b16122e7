//! FROM-clause resolution: populates the current alias scope.

use super::column::TableKind;
use super::query::TargetSpec;
use super::schema_registry::normalize_qualified_name;
use super::Analyzer;
use crate::types::issue_codes;
use sqlparser::ast::{TableFactor, TableWithJoins};

impl Analyzer<'_> {
    pub(crate) fn resolve_table_with_joins(&mut self, table_with_joins: &TableWithJoins) {
        self.resolve_table_factor(&table_with_joins.relation);
        for join in &table_with_joins.joins {
            self.resolve_table_factor(&join.relation);
        }
    }

    /// Register one relation of a FROM tree into the current alias scope.
    ///
    /// - Named reference: bound under its explicit alias, or under its full
    ///   name plus its bare final segment (`FROM dbo.Customer` answers to
    ///   both `dbo.Customer.cid` and `Customer.cid`).
    /// - Derived table: the inner query is analyzed into a synthetic relation
    ///   named after the alias, which then acts as an intermediate node.
    /// - Anything else is ignored without error.
    pub(crate) fn resolve_table_factor(&mut self, factor: &TableFactor) {
        match factor {
            TableFactor::Table { name, alias, .. } => {
                let canonical = normalize_qualified_name(&name.to_string());
                self.note_temp_read(&canonical);

                if self.scopes.classify(&canonical) == TableKind::Permanent
                    && self.schema.has_imported()
                    && !self.schema.table_exists(&canonical)
                {
                    self.note(
                        issue_codes::UNRESOLVED_REFERENCE,
                        format!("Table '{canonical}' is not present in the provided schema"),
                    );
                }

                self.scopes.register_relation(canonical.clone());

                match alias {
                    Some(alias) => {
                        self.scopes
                            .bind_alias(alias.name.value.to_lowercase(), canonical);
                    }
                    None => {
                        if let Some((_, bare)) = canonical.rsplit_once('.') {
                            self.scopes.bind_alias(bare.to_string(), canonical.clone());
                        }
                        self.scopes.bind_alias(canonical.clone(), canonical);
                    }
                }
            }
            TableFactor::Derived {
                subquery, alias, ..
            } => match alias {
                Some(alias) => {
                    let name = alias.name.value.to_lowercase();
                    let explicit: Vec<String> = alias
                        .columns
                        .iter()
                        .map(|c| c.name.value.to_lowercase())
                        .collect();

                    let spec = TargetSpec {
                        table: name.clone(),
                        kind: TableKind::Derived,
                        columns: if explicit.is_empty() {
                            None
                        } else {
                            Some(explicit.clone())
                        },
                    };
                    let produced = self.process_query(subquery, Some(&spec));

                    let columns = if explicit.is_empty() { produced } else { explicit };
                    self.scopes.bind_derived(name, columns);
                }
                // A derived table without an alias is not valid T-SQL; walk
                // it for diagnostics but bind nothing.
                None => {
                    self.process_query(subquery, None);
                }
            },
            TableFactor::NestedJoin {
                table_with_joins, ..
            } => {
                self.resolve_table_with_joins(table_with_joins);
            }
            _ => {}
        }
    }
}
