//! Thin wrapper around `sqlparser` configured for T-SQL.

use crate::error::ParseError;
use sqlparser::ast::Statement;
use sqlparser::dialect::MsSqlDialect;
use sqlparser::parser::Parser;

/// Parse a T-SQL script into a list of statements.
///
/// `GO` batch separators are blanked out before parsing: they are a tool
/// convention rather than T-SQL, and the parser does not treat them as
/// statement terminators. Lines are replaced rather than removed so error
/// positions still point at the original source.
pub fn parse_sql(sql: &str) -> Result<Vec<Statement>, ParseError> {
    let sanitized = strip_batch_separators(sql);
    Parser::parse_sql(&MsSqlDialect {}, &sanitized).map_err(ParseError::from)
}

fn strip_batch_separators(sql: &str) -> String {
    sql.lines()
        .map(|line| if is_batch_separator(line) { ";" } else { line })
        .collect::<Vec<_>>()
        .join("\n")
}

/// "GO" or "GO <count>" alone on a line.
fn is_batch_separator(line: &str) -> bool {
    let upper = line.trim().to_ascii_uppercase();
    if upper == "GO" {
        return true;
    }
    match upper.strip_prefix("GO ") {
        Some(rest) => {
            let rest = rest.trim();
            !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit())
        }
        None => false,
    }
}
