//! Case-insensitive identifier model for table and column references.

use std::fmt;

/// Classification of the relation a column belongs to.
///
/// Recorded on the reference at creation time, against the scopes active at
/// that moment: a CTE name classifies as [`TableKind::Cte`] only while its
/// `WITH` block is in scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TableKind {
    /// A durable table: neither temp, CTE, nor derived
    Permanent,
    /// A `#`-prefixed temporary table
    Temp,
    /// A common table expression bound in the active `WITH` scope
    Cte,
    /// A derived-table (subquery) alias
    Derived,
    /// An alias that resolved to nothing; kept for diagnostics only
    Unresolved,
}

impl TableKind {
    /// Intermediate nodes are eliminated during resolution; only permanent
    /// columns survive into the final report.
    pub fn is_intermediate(self) -> bool {
        !matches!(self, TableKind::Permanent)
    }
}

/// An immutable, case-insensitive reference to one column of one relation.
///
/// Both parts are lowercased at construction, so derived equality and hashing
/// are case-insensitive by construction. The table part is always a resolved
/// relation name, never an alias; unresolved aliases are carried verbatim but
/// tagged [`TableKind::Unresolved`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ColumnRef {
    pub table: String,
    pub column: String,
    pub kind: TableKind,
}

impl ColumnRef {
    pub fn new(table: &str, column: &str, kind: TableKind) -> Self {
        Self {
            table: table.to_lowercase(),
            column: column.to_lowercase(),
            kind,
        }
    }

    /// Temp tables are recognized purely by spelling.
    pub fn is_temp(&self) -> bool {
        self.table.starts_with('#')
    }

    pub fn is_intermediate(&self) -> bool {
        self.kind.is_intermediate()
    }
}

impl fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}].[{}]", self.table, self.column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_construction_lowercases() {
        let col = ColumnRef::new("dbo.Customer", "CName", TableKind::Permanent);
        assert_eq!(col.table, "dbo.customer");
        assert_eq!(col.column, "cname");
    }

    #[test]
    fn test_case_insensitive_equality() {
        let a = ColumnRef::new("DBO.ORDERS", "Total", TableKind::Permanent);
        let b = ColumnRef::new("dbo.orders", "total", TableKind::Permanent);
        assert_eq!(a, b);

        use std::collections::HashSet;
        let set: HashSet<_> = [a, b].into_iter().collect();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_kind_distinguishes_nodes() {
        let cte = ColumnRef::new("x", "id", TableKind::Cte);
        let table = ColumnRef::new("x", "id", TableKind::Permanent);
        assert_ne!(cte, table);
    }

    #[test]
    fn test_is_temp() {
        assert!(ColumnRef::new("#staging", "id", TableKind::Temp).is_temp());
        assert!(!ColumnRef::new("dbo.staging", "id", TableKind::Permanent).is_temp());
    }

    #[test]
    fn test_display_rendering() {
        let col = ColumnRef::new("dbo.Report", "RId", TableKind::Permanent);
        assert_eq!(col.to_string(), "[dbo.report].[rid]");
    }

    #[test]
    fn test_intermediate_classification() {
        assert!(TableKind::Temp.is_intermediate());
        assert!(TableKind::Cte.is_intermediate());
        assert!(TableKind::Derived.is_intermediate());
        assert!(TableKind::Unresolved.is_intermediate());
        assert!(!TableKind::Permanent.is_intermediate());
    }
}
