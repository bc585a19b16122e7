//! Read-mostly registry of permanent-table schemas.
//!
//! Two layers: *imported* entries come from the caller's [`SchemaMetadata`]
//! and never change; *implied* entries are captured from `CREATE TABLE`
//! statements in the script itself and can be removed again by `DROP TABLE`.
//! Imported entries always win on lookup.

use crate::types::SchemaMetadata;
use std::collections::HashMap;

#[derive(Debug, Default)]
pub(crate) struct SchemaRegistry {
    imported: HashMap<String, Vec<String>>,
    implied: HashMap<String, Vec<String>>,
    /// bare table name -> canonical key, only where unambiguous
    short_names: HashMap<String, Option<String>>,
}

impl SchemaRegistry {
    pub(crate) fn from_metadata(metadata: Option<&SchemaMetadata>) -> Self {
        let mut registry = Self::default();

        if let Some(metadata) = metadata {
            for table in &metadata.tables {
                let canonical = normalize_qualified_name(&table.name);
                let columns = table
                    .columns
                    .iter()
                    .map(|c| c.name.to_lowercase())
                    .collect();
                registry.index_short_name(&canonical);
                registry.imported.insert(canonical, columns);
            }
        }

        registry
    }

    /// Index `dbo.customer` under `customer` as well, unless another table
    /// already claims that bare name (then the short name is ambiguous and
    /// resolves to nothing).
    fn index_short_name(&mut self, canonical: &str) {
        if let Some((_, bare)) = canonical.rsplit_once('.') {
            self.short_names
                .entry(bare.to_string())
                .and_modify(|existing| {
                    if existing.as_deref() != Some(canonical) {
                        *existing = None;
                    }
                })
                .or_insert_with(|| Some(canonical.to_string()));
        }
    }

    fn resolve_key(&self, name: &str) -> String {
        let normalized = normalize_qualified_name(name);
        if self.imported.contains_key(&normalized) || self.implied.contains_key(&normalized) {
            return normalized;
        }
        if !normalized.contains('.') {
            if let Some(Some(canonical)) = self.short_names.get(&normalized) {
                return canonical.clone();
            }
        }
        normalized
    }

    pub(crate) fn table_exists(&self, name: &str) -> bool {
        let key = self.resolve_key(name);
        self.imported.contains_key(&key) || self.implied.contains_key(&key)
    }

    /// True when the caller supplied any schema metadata at all. Unknown-table
    /// diagnostics are only meaningful then.
    pub(crate) fn has_imported(&self) -> bool {
        !self.imported.is_empty()
    }

    /// Ordered column list for a table, or `None` when unknown.
    pub(crate) fn columns_of(&self, name: &str) -> Option<&[String]> {
        let key = self.resolve_key(name);
        self.imported
            .get(&key)
            .or_else(|| self.implied.get(&key))
            .map(Vec::as_slice)
    }

    /// Capture a schema observed in the script itself. Imported entries are
    /// never overwritten.
    pub(crate) fn register_implied(&mut self, name: &str, columns: Vec<String>) {
        let canonical = normalize_qualified_name(name);
        if self.imported.contains_key(&canonical) {
            return;
        }
        self.index_short_name(&canonical);
        self.implied.insert(canonical, columns);
    }

    pub(crate) fn remove_implied(&mut self, name: &str) {
        let canonical = normalize_qualified_name(name);
        self.implied.remove(&canonical);
    }
}

/// Canonicalize a possibly-qualified, possibly-quoted table name:
/// split on dots outside quotes, strip `[...]`, `"..."`, and backtick quoting,
/// lowercase each part, rejoin with dots.
pub(crate) fn normalize_qualified_name(name: &str) -> String {
    split_qualified_identifiers(name)
        .into_iter()
        .map(|part| strip_quotes(&part).to_lowercase())
        .collect::<Vec<_>>()
        .join(".")
}

/// Split a qualified name on dots, respecting `[...]`, `"..."`, `'...'`, and
/// backtick quoting.
pub(crate) fn split_qualified_identifiers(name: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut chars = name.chars().peekable();
    let mut active_quote: Option<char> = None;

    while let Some(ch) = chars.next() {
        if let Some(q) = active_quote {
            current.push(ch);
            if ch == q {
                if matches!(q, '"' | '\'' | '`') {
                    if let Some(next) = chars.peek() {
                        if *next == q {
                            current.push(chars.next().unwrap());
                            continue;
                        }
                    }
                }
                active_quote = None;
            }
            continue;
        }

        match ch {
            '"' | '\'' | '`' => {
                active_quote = Some(ch);
                current.push(ch);
            }
            '[' => {
                active_quote = Some(']');
                current.push(ch);
            }
            '.' => {
                if !current.is_empty() {
                    parts.push(current.trim().to_string());
                    current.clear();
                }
            }
            _ => current.push(ch),
        }
    }

    if !current.is_empty() {
        parts.push(current.trim().to_string());
    }

    if parts.is_empty() && !name.is_empty() {
        vec![name.trim().to_string()]
    } else {
        parts
    }
}

fn strip_quotes(part: &str) -> &str {
    let trimmed = part.trim();
    if trimmed.len() < 2 {
        return trimmed;
    }
    let first = trimmed.chars().next().unwrap();
    let last = trimmed.chars().last().unwrap();
    match (first, last) {
        ('[', ']') | ('"', '"') | ('`', '`') | ('\'', '\'') => &trimmed[1..trimmed.len() - 1],
        _ => trimmed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ColumnSchema, SchemaTable};

    fn metadata(tables: &[(&str, &[&str])]) -> SchemaMetadata {
        SchemaMetadata {
            tables: tables
                .iter()
                .map(|(name, columns)| SchemaTable {
                    name: name.to_string(),
                    columns: columns
                        .iter()
                        .map(|c| ColumnSchema {
                            name: c.to_string(),
                            data_type: None,
                        })
                        .collect(),
                })
                .collect(),
        }
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let meta = metadata(&[("dbo.Customer", &["CId", "CName"])]);
        let registry = SchemaRegistry::from_metadata(Some(&meta));

        assert!(registry.table_exists("DBO.CUSTOMER"));
        assert_eq!(
            registry.columns_of("dbo.customer"),
            Some(&["cid".to_string(), "cname".to_string()][..])
        );
    }

    #[test]
    fn test_bare_name_resolves_when_unambiguous() {
        let meta = metadata(&[("dbo.Customer", &["cid"]), ("dbo.Orders", &["oid"])]);
        let registry = SchemaRegistry::from_metadata(Some(&meta));

        assert!(registry.table_exists("Customer"));
        assert_eq!(registry.columns_of("orders"), Some(&["oid".to_string()][..]));
    }

    #[test]
    fn test_bare_name_ambiguity_resolves_to_nothing() {
        let meta = metadata(&[("dbo.Customer", &["a"]), ("audit.Customer", &["b"])]);
        let registry = SchemaRegistry::from_metadata(Some(&meta));

        assert!(!registry.table_exists("Customer"));
        assert_eq!(registry.columns_of("customer"), None);
    }

    #[test]
    fn test_implied_never_overrides_imported() {
        let meta = metadata(&[("dbo.Customer", &["cid"])]);
        let mut registry = SchemaRegistry::from_metadata(Some(&meta));

        registry.register_implied("dbo.Customer", vec!["other".into()]);
        assert_eq!(registry.columns_of("dbo.Customer"), Some(&["cid".to_string()][..]));
    }

    #[test]
    fn test_drop_removes_implied_only() {
        let meta = metadata(&[("dbo.Customer", &["cid"])]);
        let mut registry = SchemaRegistry::from_metadata(Some(&meta));
        registry.register_implied("dbo.Staging", vec!["sid".into()]);

        registry.remove_implied("dbo.Staging");
        registry.remove_implied("dbo.Customer");

        assert!(!registry.table_exists("dbo.Staging"));
        assert!(registry.table_exists("dbo.Customer"));
    }

    #[test]
    fn test_missing_registry_degrades() {
        let registry = SchemaRegistry::from_metadata(None);
        assert!(!registry.table_exists("dbo.Customer"));
        assert_eq!(registry.columns_of("dbo.Customer"), None);
    }

    #[test]
    fn test_normalize_qualified_name() {
        assert_eq!(normalize_qualified_name("[dbo].[Customer]"), "dbo.customer");
        assert_eq!(normalize_qualified_name("DBO.Orders"), "dbo.orders");
        assert_eq!(normalize_qualified_name("#Staging"), "#staging");
        assert_eq!(normalize_qualified_name("\"Weird.Name\""), "weird.name");
    }
}
