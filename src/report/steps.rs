//! Plain step listing, one line per record:
//! `Step 3 - Input | Value: "alice"`

use anyhow::{Context, Result};
use std::fmt::Write as _;
use std::path::Path;

use super::types::LedgerExport;
use crate::ledger::{Action, ActionRecord};

fn line(record: &ActionRecord) -> String {
    let mut line = format!("Step {} - {}", record.step, record.action.name());
    match &record.action {
        Action::Click => {}
        Action::DragAndDrop {
            source_selector,
            target_selector,
            ..
        } => {
            let _ = write!(line, " | From: {:?} | To: {:?}", source_selector, target_selector);
        }
        action => {
            if let Some(value) = action.display_value() {
                let _ = write!(line, " | Value: {:?}", value);
            }
        }
    }
    line
}

pub fn render(records: &[ActionRecord]) -> String {
    records.iter().map(|r| line(r) + "\n").collect()
}

/// Generate the step listing
pub fn generate(export: &LedgerExport, output: Option<&Path>) -> Result<()> {
    let listing = render(&export.records);

    if let Some(path) = output {
        std::fs::write(path, &listing)
            .with_context(|| format!("Failed to write report: {}", path.display()))?;
        println!("Step listing saved to: {}", path.display());
    } else {
        print!("{}", listing);
    }

    Ok(())
}
