pub mod json;
pub mod steps;
pub mod types;

use anyhow::{Context, Result};
use std::path::Path;

pub use types::LedgerExport;

/// Write an export in the requested format
pub fn write_report(export: &LedgerExport, format: &str, output: Option<&Path>) -> Result<()> {
    match format {
        "json" => json::generate(export, output),
        "steps" => steps::generate(export, output),
        _ => anyhow::bail!("Unknown format: {}", format),
    }
}

/// Generate a report from a saved JSON export
pub fn generate_report(export_path: &Path, format: &str, output: Option<&Path>) -> Result<()> {
    let content = std::fs::read_to_string(export_path)
        .with_context(|| format!("Failed to read export: {}", export_path.display()))?;
    let export: LedgerExport = serde_json::from_str(&content)
        .with_context(|| format!("Invalid export: {}", export_path.display()))?;

    write_report(&export, format, output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{Action, ActionRecord, ArtifactKind, Ledger};
    use crate::locator::{Locator, Strategy};

    #[test]
    fn test_export_survives_disk_and_renders() {
        let mut ledger = Ledger::new();
        let step = ledger.push(ActionRecord::for_element(
            &Locator::css("#agree", Strategy::Id),
            None,
            10,
            Action::Checkbox { value: false },
        ));
        ledger.link_artifact(step, ArtifactKind::Screenshot, "shots/1.png").unwrap();

        let dir = tempfile::tempdir().unwrap();
        let saved = dir.path().join("ledger.json");
        let listing = dir.path().join("steps.txt");
        write_report(&LedgerExport::new(&ledger, Some("terms".to_string())), "json", Some(&saved)).unwrap();

        let raw = std::fs::read_to_string(&saved).unwrap();
        assert!(raw.contains("\"type\": \"Checkbox\""));
        assert!(raw.contains("\"selectorKind\": \"css\""));

        generate_report(&saved, "steps", Some(&listing)).unwrap();
        assert_eq!(
            std::fs::read_to_string(&listing).unwrap(),
            "Step 1 - Checkbox | Value: \"false\"\n"
        );

        let export: LedgerExport = serde_json::from_str(&raw).unwrap();
        assert_eq!(export.artifacts[&1][&ArtifactKind::Screenshot], "shots/1.png");
        assert!(generate_report(&saved, "html", None).is_err());
    }
}
