//! Human-readable text output formatting.

use is_terminal::IsTerminal;
use owo_colors::OwoColorize;
use procscope_core::AnalyzeResult;
use std::fmt::Write;

/// Format the analysis result as human-readable text with optional colors.
pub fn format_table(result: &AnalyzeResult, use_colors: bool) -> String {
    let colored = use_colors && std::io::stdout().is_terminal();
    let mut out = String::new();

    write_header(&mut out, result, colored);
    write_summary(&mut out, result, colored);
    write_tables(&mut out, result, colored);
    write_lineages(&mut out, result, colored);

    out
}

fn write_header(out: &mut String, result: &AnalyzeResult, colored: bool) {
    let name = &result.analysis.procedure_name;
    let title = if name.is_empty() {
        "Procscope Analysis".to_string()
    } else {
        format!("Procscope Analysis: {name}")
    };
    let line = "═".repeat(50);

    if colored {
        writeln!(out, "{}", title.bold()).unwrap();
        writeln!(out, "{}", line.dimmed()).unwrap();
    } else {
        writeln!(out, "{title}").unwrap();
        writeln!(out, "{line}").unwrap();
    }
}

fn write_summary(out: &mut String, result: &AnalyzeResult, colored: bool) {
    let summary = &result.summary;
    let stats = format!(
        "Summary: {} statements | {} fragments | {} lineages",
        summary.statement_count,
        summary.fragment_count,
        result.analysis.final_lineages.len()
    );

    if colored {
        writeln!(out, "{}", stats.cyan()).unwrap();
    } else {
        writeln!(out, "{stats}").unwrap();
    }
    writeln!(out).unwrap();
}

fn write_tables(out: &mut String, result: &AnalyzeResult, colored: bool) {
    let analysis = &result.analysis;

    if !analysis.input_tables.is_empty() {
        write_section(out, "Source tables:", colored);
        for table in &analysis.input_tables {
            writeln!(out, "  {table}").unwrap();
        }
        writeln!(out).unwrap();
    }

    if !analysis.output_tables.is_empty() {
        write_section(out, "Target tables:", colored);
        for table in &analysis.output_tables {
            writeln!(out, "  {table}").unwrap();
        }
        writeln!(out).unwrap();
    }

    if !analysis.temp_table_patterns.is_empty() {
        write_section(out, "Temp tables:", colored);
        for temp in &analysis.temp_table_patterns {
            let role = if temp.is_intermediate {
                "intermediate"
            } else {
                "unread"
            };
            writeln!(out, "  {} ({}, {})", temp.name, temp.source_pattern, role).unwrap();
        }
        writeln!(out).unwrap();
    }
}

fn write_lineages(out: &mut String, result: &AnalyzeResult, colored: bool) {
    let lineages = &result.analysis.final_lineages;
    if lineages.is_empty() {
        writeln!(out, "No column lineages resolved.").unwrap();
        return;
    }

    write_section(out, "Column lineage:", colored);
    for lineage in lineages {
        writeln!(
            out,
            "  {}.{} <- {}.{}",
            lineage.target_table, lineage.target_column, lineage.source_table, lineage.source_column
        )
        .unwrap();
    }
}

fn write_section(out: &mut String, title: &str, colored: bool) {
    if colored {
        writeln!(out, "{}", title.bold()).unwrap();
    } else {
        writeln!(out, "{title}").unwrap();
    }
}
