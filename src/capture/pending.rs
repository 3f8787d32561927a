use std::collections::BTreeMap;

use super::scheduler::TaskId;
use crate::ledger::{Action, ActionRecord, ElementSnapshot};
use crate::locator::Locator;

/// A field value waiting to be committed
#[derive(Debug, Clone, PartialEq)]
pub struct PendingEntry {
    pub locator: Locator,
    pub element: Option<ElementSnapshot>,
    pub action: Action,
    /// Time of the latest update
    pub timestamp: u64,
    /// Debounce timer; `None` for values committed on focus loss
    pub timer: Option<TaskId>,
}

impl PendingEntry {
    pub fn selector(&self) -> &str {
        &self.locator.value
    }

    /// Key used for dedupe: the action payload without its timestamp
    pub fn value_key(&self) -> String {
        format!(
            "{}:{}",
            self.action.name(),
            self.action.display_value().unwrap_or_default()
        )
    }

    pub fn into_record(self) -> ActionRecord {
        ActionRecord::for_element(&self.locator, self.element, self.timestamp, self.action)
    }
}

/// Latest uncommitted value per selector; iteration is in selector order
#[derive(Debug, Default)]
pub struct PendingBuffer {
    entries: BTreeMap<String, PendingEntry>,
}

impl PendingBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the entry for the selector; returns the timer it carried
    pub fn upsert(&mut self, entry: PendingEntry) -> Option<TaskId> {
        self.entries
            .insert(entry.selector().to_string(), entry)
            .and_then(|old| old.timer)
    }

    pub fn get(&self, selector: &str) -> Option<&PendingEntry> {
        self.entries.get(selector)
    }

    pub fn take(&mut self, selector: &str) -> Option<PendingEntry> {
        self.entries.remove(selector)
    }

    /// Remove every entry, in selector order
    pub fn drain(&mut self) -> Vec<PendingEntry> {
        std::mem::take(&mut self.entries).into_values().collect()
    }

    /// Put back an entry whose delivery failed, unless a newer value arrived
    pub fn restore(&mut self, mut entry: PendingEntry) {
        entry.timer = None;
        self.entries
            .entry(entry.selector().to_string())
            .or_insert(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
