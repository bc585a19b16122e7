//! Fragment accumulation and end-to-end lineage resolution.
//!
//! Fragments form a directed multigraph in which temp/CTE/derived columns may
//! appear on either side. Resolution walks the reverse graph from each
//! permanent target, expanding intermediate nodes and collecting permanent
//! sources. The graph may be cyclic (recursive CTEs, pathological SQL); the
//! walk carries a per-invocation visited set, so cycles terminate and
//! contribute no spurious sources.

use super::column::{ColumnRef, TableKind};
use crate::types::ColumnLineage;
use std::collections::{HashMap, HashSet};

/// One directed edge `source column -> target column`, contributed by a
/// single DML clause. Appended once, never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct LineageFragment {
    pub(crate) source: ColumnRef,
    pub(crate) target: ColumnRef,
}

#[derive(Debug, Default)]
pub(crate) struct LineageGraph {
    fragments: Vec<LineageFragment>,
}

impl LineageGraph {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn add_fragment(&mut self, source: ColumnRef, target: ColumnRef) {
        self.fragments.push(LineageFragment { source, target });
    }

    pub(crate) fn len(&self) -> usize {
        self.fragments.len()
    }

    /// Resolve every permanent target to its set of permanent ancestors.
    ///
    /// Total: always terminates, never fails, returns an empty list when no
    /// permanent-to-permanent path exists. Output is sorted by
    /// (target table, target column, source table, source column).
    pub(crate) fn resolve(&self) -> Vec<ColumnLineage> {
        let reverse = self.reverse_index();

        let mut resolved: HashSet<ColumnLineage> = HashSet::new();
        for target in reverse.keys() {
            if target.kind != TableKind::Permanent {
                continue;
            }

            let mut visited: HashSet<&ColumnRef> = HashSet::new();
            let mut sources: HashSet<&ColumnRef> = HashSet::new();
            collect_permanent_sources(target, &reverse, &mut visited, &mut sources);

            for source in sources {
                resolved.insert(ColumnLineage::new(
                    source.table.clone(),
                    source.column.clone(),
                    target.table.clone(),
                    target.column.clone(),
                ));
            }
        }

        let mut lineages: Vec<ColumnLineage> = resolved.into_iter().collect();
        lineages.sort_by(|a, b| a.report_key().cmp(&b.report_key()));
        lineages
    }

    /// Index fragments as `target -> [sources]`.
    fn reverse_index(&self) -> HashMap<&ColumnRef, Vec<&ColumnRef>> {
        let mut reverse: HashMap<&ColumnRef, Vec<&ColumnRef>> = HashMap::new();
        for fragment in &self.fragments {
            reverse
                .entry(&fragment.target)
                .or_default()
                .push(&fragment.source);
        }
        reverse
    }
}

/// Depth-first walk over the reverse graph. Permanent predecessors are
/// collected without expansion (the permanent-to-permanent short circuit);
/// intermediate predecessors are expanded unless already visited on this
/// invocation. Unresolved nodes have no predecessors and drop out.
fn collect_permanent_sources<'a>(
    node: &'a ColumnRef,
    reverse: &HashMap<&'a ColumnRef, Vec<&'a ColumnRef>>,
    visited: &mut HashSet<&'a ColumnRef>,
    sources: &mut HashSet<&'a ColumnRef>,
) {
    let Some(predecessors) = reverse.get(node) else {
        return;
    };

    for pred in predecessors {
        if pred.kind == TableKind::Permanent {
            sources.insert(pred);
        } else if visited.insert(pred) {
            collect_permanent_sources(pred, reverse, visited, sources);
        }
    }
}
