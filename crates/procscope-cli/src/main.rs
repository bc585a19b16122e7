//! procscope CLI - T-SQL column-level lineage analyzer

mod cli;
mod input;
mod output;
mod schema;

use anyhow::{Context, Result};
use clap::Parser;
use procscope_core::{analyze, AnalyzeRequest, Severity};
use std::fs;
use std::process::ExitCode;

use cli::{Args, OutputFormat};
use output::{format_json, format_table};

fn main() -> ExitCode {
    match run() {
        Ok(has_errors) => {
            if has_errors {
                ExitCode::from(1)
            } else {
                ExitCode::SUCCESS
            }
        }
        Err(e) => {
            eprintln!("procscope: error: {e:#}");
            ExitCode::from(66)
        }
    }
}

fn run() -> Result<bool> {
    let args = Args::parse();

    let sql = input::read_script(&args.file)?;

    let schema = args
        .schema
        .as_deref()
        .map(schema::load_schema)
        .transpose()?;

    let request = AnalyzeRequest {
        sql,
        source_name: Some(args.file.display().to_string()),
        options: None,
        schema,
    };

    let result = analyze(&request);

    // Colors are further gated on stdout being a terminal.
    let output_str = match args.format {
        OutputFormat::Json => format_json(&result, args.compact),
        OutputFormat::Table => format_table(&result, args.output.is_none()),
    };

    match &args.output {
        Some(path) => {
            fs::write(path, output_str)
                .with_context(|| format!("Failed to write output to {}", path.display()))?;
        }
        None => println!("{output_str}"),
    }

    if !args.quiet {
        print_issues_to_stderr(&result);
    }

    Ok(result.summary.has_errors)
}

fn print_issues_to_stderr(result: &procscope_core::AnalyzeResult) {
    for issue in &result.issues {
        let severity = match issue.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Info => "note",
        };
        match issue.statement_index {
            Some(index) => {
                eprintln!("{severity}: [{}] statement {index}: {}", issue.code, issue.message)
            }
            None => eprintln!("{severity}: [{}] {}", issue.code, issue.message),
        }
    }
}
