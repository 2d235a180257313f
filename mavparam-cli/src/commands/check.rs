//! Offline parameter file validation.

use anyhow::{Context, Result};
use console::style;
use mavparam::{ParameterReader, ParameterRecord};
use std::path::Path;

/// Check command implementation.
///
/// Prints each record's wire type and bit pattern to stdout; the first bad
/// line fails the command.
pub(crate) fn cmd_check(file: &Path, json: bool) -> Result<()> {
    let reader = ParameterReader::open(file)
        .with_context(|| format!("Failed to open parameter file {}", file.display()))?;

    let records = reader
        .collect::<mavparam::Result<Vec<ParameterRecord>>>()
        .with_context(|| format!("Invalid parameter file {}", file.display()))?;

    if json {
        let output = serde_json::json!({
            "ok": true,
            "data": {
                "file": file.display().to_string(),
                "parameters": records,
            }
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    let width = records.iter().map(|r| r.name.len()).max().unwrap_or(0);
    for record in &records {
        println!(
            "{:<width$}  {:<6}  {}  {}",
            record.name, record.kind, record.value, record.raw
        );
    }

    eprintln!(
        "{} {} parameter(s) OK",
        style("✓").green(),
        records.len()
    );
    Ok(())
}
