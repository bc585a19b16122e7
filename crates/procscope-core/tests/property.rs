use procscope_core::{analyze, AnalyzeRequest, ColumnLineage};
use proptest::prelude::*;

fn run(sql: String) -> procscope_core::AnalyzeResult {
    analyze(&AnalyzeRequest {
        sql,
        source_name: None,
        options: None,
        schema: None,
    })
}

/// Identifier fragments are prefixed so random draws can never collide with
/// T-SQL keywords.
fn ident(prefix: &str, stem: &str) -> String {
    format!("{prefix}_{stem}")
}

proptest! {
    /// A single INSERT..SELECT through an alias always yields exactly one
    /// permanent-to-permanent lineage, whatever the names involved.
    #[test]
    fn single_hop_insert_always_resolves(
        source in "[a-z]{1,8}",
        target in "[a-z]{1,8}",
        source_col in "[a-z]{1,8}",
        target_col in "[a-z]{1,8}",
        alias in "[a-z]{1,4}",
    ) {
        let sql = format!(
            "INSERT INTO dbo.{tgt}({tc}) SELECT {a}.{sc} FROM dbo.{src} AS {a};",
            tgt = ident("t", &target),
            tc = ident("c", &target_col),
            a = ident("a", &alias),
            sc = ident("c", &source_col),
            src = ident("s", &source),
        );

        let result = run(sql);

        prop_assert!(!result.summary.has_errors, "issues: {:?}", result.issues);
        prop_assert_eq!(
            result.analysis.final_lineages,
            vec![ColumnLineage::new(
                format!("dbo.{}", ident("s", &source)),
                ident("c", &source_col),
                format!("dbo.{}", ident("t", &target)),
                ident("c", &target_col),
            )]
        );
    }

    /// Chains of temp-table hops of any length collapse to the same single
    /// end-to-end lineage.
    #[test]
    fn temp_chains_collapse(depth in 1usize..6) {
        let mut sql = String::from("INSERT INTO #h0(x) SELECT s.x FROM dbo.Origin s;\n");
        for i in 1..depth {
            sql.push_str(&format!(
                "INSERT INTO #h{i}(x) SELECT x FROM #h{prev};\n",
                prev = i - 1
            ));
        }
        sql.push_str(&format!(
            "INSERT INTO dbo.Final(x) SELECT x FROM #h{last};\n",
            last = depth - 1
        ));

        let result = run(sql);

        prop_assert!(!result.summary.has_errors);
        prop_assert_eq!(
            result.analysis.final_lineages,
            vec![ColumnLineage::new("dbo.origin", "x", "dbo.final", "x")]
        );
    }

    /// Injecting a cycle between two temp tables never changes the resolved
    /// permanent-to-permanent set, and resolution always terminates.
    #[test]
    fn cycles_never_add_sources(extra_hops in 0usize..4) {
        let mut base = String::from(
            "INSERT INTO #b(x) SELECT s.x FROM dbo.Origin s;\n\
             INSERT INTO dbo.Final(x) SELECT x FROM #b;\n",
        );
        let baseline = run(base.clone());

        base.push_str("INSERT INTO #a(x) SELECT x FROM #b;\n");
        base.push_str("INSERT INTO #b(x) SELECT x FROM #a;\n");
        for i in 0..extra_hops {
            base.push_str(&format!("INSERT INTO #c{i}(x) SELECT x FROM #b;\n"));
            base.push_str(&format!("INSERT INTO #b(x) SELECT x FROM #c{i};\n"));
        }
        let cyclic = run(base);

        prop_assert_eq!(
            baseline.analysis.final_lineages,
            cyclic.analysis.final_lineages
        );
    }

    /// Invariant: no resolved lineage ever names a temp table on either side.
    #[test]
    fn report_never_contains_temp_nodes(
        cols in proptest::collection::vec("[a-z]{1,6}", 1..4),
    ) {
        let column_list = cols
            .iter()
            .enumerate()
            .map(|(i, c)| ident(&format!("c{i}"), c))
            .collect::<Vec<_>>();
        let select_list = column_list
            .iter()
            .map(|c| format!("s.{c}"))
            .collect::<Vec<_>>()
            .join(", ");

        let sql = format!(
            "INSERT INTO #stage({list}) SELECT {select_list} FROM dbo.Input s;\n\
             INSERT INTO dbo.Output({list}) SELECT {list} FROM #stage;\n",
            list = column_list.join(", "),
        );

        let result = run(sql);

        prop_assert!(!result.summary.has_errors);
        prop_assert_eq!(result.analysis.final_lineages.len(), column_list.len());
        for lineage in &result.analysis.final_lineages {
            prop_assert!(!lineage.source_table.starts_with('#'));
            prop_assert!(!lineage.target_table.starts_with('#'));
            prop_assert_eq!(lineage.source_table.as_str(), "dbo.input");
            prop_assert_eq!(lineage.target_table.as_str(), "dbo.output");
        }
    }

    /// Running the analyzer twice over the same script yields identical
    /// reports once the wall-clock timestamp is pinned.
    #[test]
    fn analysis_is_deterministic(
        table in "[a-z]{1,8}",
        col_a in "[a-z]{1,6}",
        col_b in "[a-z]{1,6}",
    ) {
        let sql = format!(
            "CREATE TABLE #w ({a} int, {b} int);\n\
             INSERT INTO #w({a}, {b}) SELECT s.{a}, s.{b} FROM dbo.{t} s;\n\
             INSERT INTO dbo.Sink({a}, {b}) SELECT {a}, {b} FROM #w;\n",
            a = ident("p", &col_a),
            b = ident("q", &col_b),
            t = ident("s", &table),
        );

        let mut first = run(sql.clone());
        let mut second = run(sql);
        first.analysis.analysis_timestamp = second.analysis.analysis_timestamp;

        prop_assert_eq!(first.analysis, second.analysis);
        prop_assert_eq!(first.issues, second.issues);
    }
}
