//! Structural observation
//!
//! Newly inserted interactive elements are collected into bounded,
//! locator-deduplicated batches and handed to subscribers after a quiet
//! period. Nothing here touches the ledger.

use log::debug;
use std::collections::{HashSet, VecDeque};

use super::scheduler::{Scheduler, Task, TaskId};
use crate::dom::{normalize_space, semantics, Document, NodeId};
use crate::locator::{Locator, Synthesizer};
use crate::utils::config::SynthesizerConfig;

const LABEL_MAX_CHARS: usize = 60;

/// Delivered locators remembered for deduplication, oldest evicted first
const SEEN_CAPACITY: usize = 1024;

/// A newly available UI affordance
#[derive(Debug, Clone, PartialEq)]
pub struct Affordance {
    pub locator: Locator,
    pub tag: String,
    pub label: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Callback = Box<dyn FnMut(&[Affordance])>;

pub struct StructureWatcher {
    batch_cap: usize,
    debounce_ms: u64,
    subscribers: Vec<(SubscriptionId, Callback)>,
    queue: Vec<Affordance>,
    seen: HashSet<String>,
    seen_order: VecDeque<String>,
    timer: Option<TaskId>,
    next_id: u64,
}

impl StructureWatcher {
    pub fn new(batch_cap: usize, debounce_ms: u64) -> Self {
        Self {
            batch_cap,
            debounce_ms,
            subscribers: Vec::new(),
            queue: Vec::new(),
            seen: HashSet::new(),
            seen_order: VecDeque::new(),
            timer: None,
            next_id: 0,
        }
    }

    pub fn subscribe(&mut self, callback: impl FnMut(&[Affordance]) + 'static) -> SubscriptionId {
        self.next_id += 1;
        let id = SubscriptionId(self.next_id);
        self.subscribers.push((id, Box::new(callback)));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(s, _)| *s != id);
        self.subscribers.len() != before
    }

    /// Queue interactive elements from inserted subtrees and (re)arm the debounce
    pub fn on_nodes_inserted(
        &mut self,
        doc: &Document,
        nodes: &[NodeId],
        config: &SynthesizerConfig,
        now_ms: u64,
        scheduler: &mut Scheduler,
    ) {
        if self.subscribers.is_empty() {
            return;
        }

        let synth = Synthesizer::new(doc, config);
        let mut dropped = 0usize;

        for root in nodes {
            let Some(root) = doc.element_of(*root) else {
                continue;
            };
            let candidates = std::iter::once(root).chain(doc.descendants(root));
            for node in candidates.filter(|n| semantics::is_interactive(doc, *n)) {
                let locator = synth.synthesize(node);
                if locator.is_weak()
                    || self.seen.contains(&locator.value)
                    || self.queue.iter().any(|a| a.locator.value == locator.value)
                {
                    continue;
                }
                // Left unseen so a later insertion can still surface it
                if self.queue.len() >= self.batch_cap {
                    dropped += 1;
                    continue;
                }
                self.queue.push(Affordance {
                    tag: doc.tag(node).to_string(),
                    label: label_of(doc, node),
                    locator,
                });
            }
        }

        if dropped > 0 {
            debug!("Structure batch full, dropped {} affordance(s)", dropped);
        }

        if !self.queue.is_empty() {
            if let Some(old) = self.timer.take() {
                scheduler.cancel(old);
            }
            self.timer = Some(scheduler.schedule(now_ms + self.debounce_ms, Task::FlushStructure));
        }
    }

    /// Deliver the queued batch to every subscriber
    pub fn flush(&mut self) -> usize {
        self.timer = None;
        let batch = std::mem::take(&mut self.queue);
        if batch.is_empty() {
            return 0;
        }
        debug!("Delivering {} new affordance(s)", batch.len());
        for (_, callback) in self.subscribers.iter_mut() {
            callback(&batch);
        }
        for affordance in &batch {
            self.remember(&affordance.locator.value);
        }
        batch.len()
    }

    fn remember(&mut self, value: &str) {
        if !self.seen.insert(value.to_string()) {
            return;
        }
        self.seen_order.push_back(value.to_string());
        while self.seen_order.len() > SEEN_CAPACITY {
            if let Some(oldest) = self.seen_order.pop_front() {
                self.seen.remove(&oldest);
            }
        }
    }

    pub fn seen_len(&self) -> usize {
        self.seen.len()
    }

    pub fn reset(&mut self) {
        self.queue.clear();
        self.seen.clear();
        self.seen_order.clear();
        self.timer = None;
    }
}

fn label_of(doc: &Document, node: NodeId) -> Option<String> {
    let label = doc
        .non_empty_attr(node, "aria-label")
        .map(str::to_string)
        .or_else(|| doc.non_empty_attr(node, "title").map(str::to_string))
        .unwrap_or_else(|| doc.normalized_text(node));
    let label = normalize_space(&label);
    if label.is_empty() {
        None
    } else {
        Some(label.chars().take(LABEL_MAX_CHARS).collect())
    }
}
