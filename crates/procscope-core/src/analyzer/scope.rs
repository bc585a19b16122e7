//! Nested symbol environments for alias, CTE, and temp-table resolution.
//!
//! Alias and CTE scopes are lexical stacks with innermost-first lookup. The
//! temp-table map is deliberately flat: in T-SQL a `#table` outlives the
//! statement that created it until dropped, so its schema is visible to every
//! later statement in the script.

use super::column::TableKind;
use std::collections::HashMap;

/// One lexical alias environment: a query or DML statement.
#[derive(Debug, Default)]
struct AliasScope {
    /// alias (or bare table name) -> canonical relation name
    aliases: HashMap<String, String>,
    /// derived-table alias -> inferred output columns
    derived: HashMap<String, Vec<String>>,
    /// canonical relation names in FROM order, for unqualified `*` expansion
    relations: Vec<String>,
}

/// The full environment stack owned by one analyzer instance.
///
/// All names entering this structure must already be canonicalized
/// (lowercased, quotes stripped); the stack performs no normalization.
#[derive(Debug, Default)]
pub(crate) struct ScopeStack {
    alias_scopes: Vec<AliasScope>,
    cte_scopes: Vec<HashMap<String, Vec<String>>>,
    temp_tables: HashMap<String, Vec<String>>,
}

impl ScopeStack {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    // --- alias scopes ---

    pub(crate) fn push_alias_scope(&mut self) {
        self.alias_scopes.push(AliasScope::default());
    }

    pub(crate) fn pop_alias_scope(&mut self) {
        self.alias_scopes
            .pop()
            .expect("popped an empty alias scope stack");
    }

    fn current_alias_scope(&mut self) -> &mut AliasScope {
        self.alias_scopes
            .last_mut()
            .expect("no alias scope active")
    }

    /// Bind `alias -> table` in the innermost scope.
    pub(crate) fn bind_alias(&mut self, alias: String, table: String) {
        self.current_alias_scope().aliases.insert(alias, table);
    }

    /// Record a relation as present in the innermost scope's FROM clause.
    pub(crate) fn register_relation(&mut self, canonical: String) {
        let scope = self.current_alias_scope();
        if !scope.relations.contains(&canonical) {
            scope.relations.push(canonical);
        }
    }

    /// Bind a derived-table alias with its inferred output columns.
    ///
    /// The alias maps to itself so lookups return the synthetic name, and the
    /// alias joins the relation list for unqualified `*` expansion.
    pub(crate) fn bind_derived(&mut self, alias: String, columns: Vec<String>) {
        let scope = self.current_alias_scope();
        scope.aliases.insert(alias.clone(), alias.clone());
        scope.derived.insert(alias.clone(), columns);
        if !scope.relations.contains(&alias) {
            scope.relations.push(alias);
        }
    }

    /// Flattened lookup, innermost scope outward.
    pub(crate) fn resolve_alias(&self, alias: &str) -> Option<&str> {
        self.alias_scopes
            .iter()
            .rev()
            .find_map(|scope| scope.aliases.get(alias).map(String::as_str))
    }

    fn derived_columns(&self, name: &str) -> Option<&[String]> {
        self.alias_scopes
            .iter()
            .rev()
            .find_map(|scope| scope.derived.get(name).map(Vec::as_slice))
    }

    fn is_derived(&self, name: &str) -> bool {
        self.alias_scopes
            .iter()
            .rev()
            .any(|scope| scope.derived.contains_key(name))
    }

    /// Relations present in the innermost scope, in FROM order.
    pub(crate) fn relations_in_scope(&self) -> &[String] {
        self.alias_scopes
            .last()
            .map(|scope| scope.relations.as_slice())
            .unwrap_or(&[])
    }

    // --- CTE scopes ---

    pub(crate) fn push_cte_scope(&mut self) {
        self.cte_scopes.push(HashMap::new());
    }

    pub(crate) fn pop_cte_scope(&mut self) {
        self.cte_scopes
            .pop()
            .expect("popped an empty CTE scope stack");
    }

    /// Bind a CTE name in the innermost `WITH` scope.
    pub(crate) fn bind_cte(&mut self, name: String, columns: Vec<String>) {
        self.cte_scopes
            .last_mut()
            .expect("no CTE scope active")
            .insert(name, columns);
    }

    pub(crate) fn is_cte(&self, name: &str) -> bool {
        self.cte_scopes.iter().rev().any(|s| s.contains_key(name))
    }

    pub(crate) fn cte_columns(&self, name: &str) -> Option<&[String]> {
        self.cte_scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(name).map(Vec::as_slice))
    }

    // --- temp tables (flat, script-wide) ---

    pub(crate) fn define_temp(&mut self, name: String, columns: Vec<String>) {
        self.temp_tables.insert(name, columns);
    }

    pub(crate) fn remove_temp(&mut self, name: &str) {
        self.temp_tables.remove(name);
    }

    pub(crate) fn columns_of_temp(&self, name: &str) -> Option<&[String]> {
        self.temp_tables.get(name).map(Vec::as_slice)
    }

    // --- classification ---

    /// Classify a canonical relation name against the scopes active now.
    pub(crate) fn classify(&self, table: &str) -> TableKind {
        if table.starts_with('#') {
            TableKind::Temp
        } else if self.is_cte(table) {
            TableKind::Cte
        } else if self.is_derived(table) {
            TableKind::Derived
        } else {
            TableKind::Permanent
        }
    }

    /// Columns of a relation as visible from the current scopes, consulting
    /// temp schemas, CTE bindings, and derived-table bindings in that order.
    pub(crate) fn columns_of_relation(&self, table: &str) -> Option<&[String]> {
        self.columns_of_temp(table)
            .or_else(|| self.cte_columns(table))
            .or_else(|| self.derived_columns(table))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alias_resolution_innermost_first() {
        let mut scopes = ScopeStack::new();
        scopes.push_alias_scope();
        scopes.bind_alias("c".into(), "dbo.customer".into());
        scopes.push_alias_scope();
        scopes.bind_alias("c".into(), "dbo.contact".into());

        assert_eq!(scopes.resolve_alias("c"), Some("dbo.contact"));
        scopes.pop_alias_scope();
        assert_eq!(scopes.resolve_alias("c"), Some("dbo.customer"));
        scopes.pop_alias_scope();
        assert_eq!(scopes.resolve_alias("c"), None);
    }

    #[test]
    fn test_outer_aliases_visible_from_inner_scope() {
        let mut scopes = ScopeStack::new();
        scopes.push_alias_scope();
        scopes.bind_alias("o".into(), "dbo.orders".into());
        scopes.push_alias_scope();

        // correlated subquery sees the outer alias
        assert_eq!(scopes.resolve_alias("o"), Some("dbo.orders"));
    }

    #[test]
    #[should_panic(expected = "popped an empty alias scope stack")]
    fn test_pop_empty_alias_scope_panics() {
        let mut scopes = ScopeStack::new();
        scopes.pop_alias_scope();
    }

    #[test]
    fn test_cte_scoping() {
        let mut scopes = ScopeStack::new();
        scopes.push_cte_scope();
        scopes.bind_cte("recent".into(), vec!["id".into()]);

        assert!(scopes.is_cte("recent"));
        assert_eq!(scopes.cte_columns("recent"), Some(&["id".to_string()][..]));

        scopes.pop_cte_scope();
        assert!(!scopes.is_cte("recent"));
    }

    #[test]
    fn test_temp_tables_survive_scope_pops() {
        let mut scopes = ScopeStack::new();
        scopes.push_alias_scope();
        scopes.define_temp("#t".into(), vec!["id".into(), "name".into()]);
        scopes.pop_alias_scope();

        assert_eq!(scopes.columns_of_temp("#t").map(<[String]>::len), Some(2));
    }

    #[test]
    fn test_classification() {
        let mut scopes = ScopeStack::new();
        scopes.push_cte_scope();
        scopes.bind_cte("a".into(), vec![]);
        scopes.push_alias_scope();
        scopes.bind_derived("sub".into(), vec!["v".into()]);

        assert_eq!(scopes.classify("#t"), TableKind::Temp);
        assert_eq!(scopes.classify("a"), TableKind::Cte);
        assert_eq!(scopes.classify("sub"), TableKind::Derived);
        assert_eq!(scopes.classify("dbo.customer"), TableKind::Permanent);
    }

    #[test]
    fn test_relations_registered_in_from_order() {
        let mut scopes = ScopeStack::new();
        scopes.push_alias_scope();
        scopes.register_relation("dbo.a".into());
        scopes.register_relation("dbo.b".into());
        scopes.register_relation("dbo.a".into());

        assert_eq!(scopes.relations_in_scope(), &["dbo.a", "dbo.b"]);
    }
}
