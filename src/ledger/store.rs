use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use super::record::ActionRecord;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum LedgerError {
    #[error("No record at step {0}")]
    UnknownStep(usize),
}

/// Failure crossing the capture → ledger boundary
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DeliveryError {
    #[error("Ledger unreachable: {0}")]
    Unreachable(String),

    #[error(transparent)]
    Rejected(#[from] LedgerError),
}

/// Capture artifacts keyed by step
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ArtifactKind {
    Html,
    Screenshot,
}

/// What the capture side needs from the ledger
///
/// The ledger may live in another execution context, so every mutation can
/// fail to be delivered.
pub trait LedgerPort {
    /// Append a record and return its step
    fn append(&mut self, record: ActionRecord) -> Result<usize, DeliveryError>;

    /// Remove earlier field-value records for a selector
    fn supersede(&mut self, selector: &str) -> Result<(), DeliveryError>;

    /// Delete a step (and its paired marker), renumbering the rest
    fn delete(&mut self, step: usize) -> Result<Vec<ActionRecord>, DeliveryError>;

    fn last_record(&self) -> Option<ActionRecord>;

    fn clear(&mut self) -> Result<(), DeliveryError>;
}

/// Ordered, step-numbered action history
#[derive(Debug, Clone, Default)]
pub struct Ledger {
    records: Vec<ActionRecord>,
    artifacts: BTreeMap<usize, BTreeMap<ArtifactKind, String>>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> &[ActionRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, step: usize) -> Option<&ActionRecord> {
        step.checked_sub(1).and_then(|i| self.records.get(i))
    }

    /// Append a record, assigning the next step
    pub fn push(&mut self, mut record: ActionRecord) -> usize {
        record.step = self.records.len() + 1;
        debug!(
            "Step {} - {} {}",
            record.step,
            record.action.name(),
            record.selector
        );
        self.records.push(record);
        self.records.len()
    }

    /// Delete a step; deleting either session marker deletes its pair.
    /// Returns the removed records.
    pub fn remove(&mut self, step: usize) -> Result<Vec<ActionRecord>, LedgerError> {
        let record = self.get(step).ok_or(LedgerError::UnknownStep(step))?;

        let doomed: Vec<usize> = match record.action.recording_id() {
            Some(recording_id) => {
                let recording_id = recording_id.to_string();
                self.records
                    .iter()
                    .filter(|r| r.action.recording_id() == Some(recording_id.as_str()))
                    .map(|r| r.step)
                    .collect()
            }
            None => vec![step],
        };

        Ok(self.remove_steps(&doomed))
    }

    fn remove_steps(&mut self, doomed: &[usize]) -> Vec<ActionRecord> {
        if doomed.is_empty() {
            return Vec::new();
        }

        let (removed, kept): (Vec<ActionRecord>, Vec<ActionRecord>) = std::mem::take(&mut self.records)
            .into_iter()
            .partition(|r| doomed.contains(&r.step));

        let mut artifacts = BTreeMap::new();
        for (new_index, mut record) in kept.into_iter().enumerate() {
            let new_step = new_index + 1;
            if let Some(linked) = self.artifacts.remove(&record.step) {
                artifacts.insert(new_step, linked);
            }
            record.step = new_step;
            self.records.push(record);
        }
        self.artifacts = artifacts;

        info!("Deleted step(s) {:?}, {} remaining", doomed, self.records.len());
        removed
    }

    /// Remove every Input/Checkbox/Radio record for a selector
    pub fn remove_field_values(&mut self, selector: &str) -> Vec<ActionRecord> {
        let doomed: Vec<usize> = self
            .records
            .iter()
            .filter(|r| r.selector == selector && r.action.is_field_value())
            .map(|r| r.step)
            .collect();
        self.remove_steps(&doomed)
    }

    /// Key a capture artifact to an existing step
    pub fn link_artifact(
        &mut self,
        step: usize,
        kind: ArtifactKind,
        reference: impl Into<String>,
    ) -> Result<(), LedgerError> {
        if self.get(step).is_none() {
            return Err(LedgerError::UnknownStep(step));
        }
        self.artifacts
            .entry(step)
            .or_default()
            .insert(kind, reference.into());
        Ok(())
    }

    pub fn artifact(&self, step: usize, kind: ArtifactKind) -> Option<&str> {
        self.artifacts
            .get(&step)
            .and_then(|linked| linked.get(&kind))
            .map(String::as_str)
    }

    pub fn artifacts(&self) -> &BTreeMap<usize, BTreeMap<ArtifactKind, String>> {
        &self.artifacts
    }

    pub fn reset(&mut self) {
        self.records.clear();
        self.artifacts.clear();
    }
}

impl LedgerPort for Ledger {
    fn append(&mut self, record: ActionRecord) -> Result<usize, DeliveryError> {
        Ok(self.push(record))
    }

    fn supersede(&mut self, selector: &str) -> Result<(), DeliveryError> {
        self.remove_field_values(selector);
        Ok(())
    }

    fn delete(&mut self, step: usize) -> Result<Vec<ActionRecord>, DeliveryError> {
        Ok(self.remove(step)?)
    }

    fn last_record(&self) -> Option<ActionRecord> {
        self.records.last().cloned()
    }

    fn clear(&mut self) -> Result<(), DeliveryError> {
        self.reset();
        Ok(())
    }
}
