use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::capture::FileTransfer;
use crate::ledger::{ActionRecord, ArtifactKind, Ledger};

/// Ledger snapshot handed to export tooling
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerExport {
    pub session_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub generated_at: String,
    pub total_steps: usize,
    pub records: Vec<ActionRecord>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub artifacts: BTreeMap<usize, BTreeMap<ArtifactKind, String>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub file_transfers: Vec<FileTransfer>,
}

impl LedgerExport {
    pub fn new(ledger: &Ledger, name: Option<String>) -> Self {
        Self {
            session_id: uuid::Uuid::new_v4().to_string(),
            name,
            generated_at: chrono::Local::now().to_rfc3339(),
            total_steps: ledger.len(),
            records: ledger.records().to_vec(),
            artifacts: ledger.artifacts().clone(),
            file_transfers: Vec::new(),
        }
    }
}
