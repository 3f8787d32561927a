use anyhow::{Context, Result};
use std::path::Path;

use super::types::LedgerExport;

/// Generate JSON report
pub fn generate(export: &LedgerExport, output: Option<&Path>) -> Result<()> {
    let json = serde_json::to_string_pretty(export)?;

    if let Some(path) = output {
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write report: {}", path.display()))?;
        println!("JSON report saved to: {}", path.display());
    } else {
        println!("{}", json);
    }

    Ok(())
}
