//! Input handling for script files.

use anyhow::{Context, Result};
use std::path::Path;

/// Read the T-SQL script to analyze.
pub fn read_script(path: &Path) -> Result<String> {
    std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read file: {}", path.display()))
}
