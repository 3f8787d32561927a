//! Interaction capture state machine
//!
//! Normalizes raw pointer, keyboard and form signals into ledger records:
//! - Clicks go to the nearest clickable ancestor, with a retry chain for weak locators
//! - Text is buffered per selector; autocomplete inputs commit after a quiet
//!   period, plain inputs on focus loss
//! - IME composition suppresses interim input until composition ends
//! - Clicks, Enter/Tab, selects and drags flush every buffered value first

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::dialog::looks_like_delete_confirmation;
use super::events::{CaptureEvent, ControlChange, EventKind, SelectedFile};
use super::pending::{PendingBuffer, PendingEntry};
use super::scheduler::{Scheduler, Task};
use crate::dom::semantics::{self, ControlKind};
use crate::dom::{Document, NodeId};
use crate::ledger::{Action, ActionRecord, DialogKind, ElementSnapshot, LedgerPort};
use crate::locator::{Locator, Synthesizer};
use crate::utils::config::CaptureConfig;

/// A file accepted by an upload, waiting for out-of-band transfer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileTransfer {
    pub selector: String,
    pub name: String,
    pub size: u64,
}

pub struct CaptureMachine {
    config: CaptureConfig,
    pending: PendingBuffer,
    composing: bool,
    /// Last committed (value key, timestamp) per selector
    last_commits: HashMap<String, (String, u64)>,
    last_hover: Option<String>,
    file_transfers: Vec<FileTransfer>,
}

impl CaptureMachine {
    pub fn new(config: CaptureConfig) -> Self {
        Self {
            config,
            pending: PendingBuffer::new(),
            composing: false,
            last_commits: HashMap::new(),
            last_hover: None,
            file_transfers: Vec::new(),
        }
    }

    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }

    pub fn pending(&self) -> &PendingBuffer {
        &self.pending
    }

    pub fn is_composing(&self) -> bool {
        self.composing
    }

    /// Handle a non-drag event
    pub fn handle<P: LedgerPort>(
        &mut self,
        doc: &Document,
        event: &CaptureEvent,
        ledger: &mut P,
        scheduler: &mut Scheduler,
    ) {
        let ts = event.timestamp_ms;
        let target = event.target.and_then(|t| doc.element_of(t));

        match &event.kind {
            EventKind::Click => {
                if let Some(node) = target {
                    self.on_click(doc, node, ts, ledger, scheduler);
                }
            }
            EventKind::Input {
                value,
                is_composing,
            } => {
                if self.composing || *is_composing {
                    debug!("Ignoring interim input during composition");
                } else if let Some(node) = target {
                    self.buffer_text(doc, node, ts, value, scheduler);
                }
            }
            EventKind::CompositionStart => self.composing = true,
            EventKind::CompositionEnd { value } => {
                self.composing = false;
                if let Some(node) = target {
                    self.buffer_text(doc, node, ts, value, scheduler);
                }
            }
            EventKind::KeyDown { key } => {
                if matches!(key.as_str(), "Enter" | "Tab") && !self.composing {
                    self.flush_all(ledger, scheduler);
                }
            }
            EventKind::FocusOut { value } => {
                if let Some(node) = target {
                    self.on_focus_out(doc, node, ts, value.as_deref(), ledger, scheduler);
                }
            }
            EventKind::Change(change) => {
                if let Some(node) = target {
                    self.on_change(doc, node, ts, change, ledger, scheduler);
                }
            }
            EventKind::Hover { dwell_ms } => {
                if let Some(node) = target {
                    self.on_hover(doc, node, ts, *dwell_ms, ledger);
                }
            }
            EventKind::Dialog {
                kind,
                message,
                accepted,
                response,
            } => self.on_dialog(
                doc,
                ts,
                *kind,
                message,
                *accepted,
                response.clone(),
                ledger,
                scheduler,
            ),
            EventKind::Download { url, file_name } => {
                let record = ActionRecord::page_level(
                    ts,
                    Action::Download {
                        url: url.clone(),
                        file_name: file_name.clone(),
                    },
                );
                self.append_after_flush(record, ledger, scheduler);
            }
            _ => {}
        }
    }

    fn locate(&self, doc: &Document, node: NodeId) -> Locator {
        Synthesizer::new(doc, &self.config.synthesizer).synthesize(node)
    }

    fn on_click<P: LedgerPort>(
        &mut self,
        doc: &Document,
        node: NodeId,
        ts: u64,
        ledger: &mut P,
        scheduler: &mut Scheduler,
    ) {
        self.flush_all(ledger, scheduler);

        if is_change_driven(doc, node) {
            debug!("Click on <{}> is recorded by its change signal", doc.tag(node));
            return;
        }

        let Some((locator, clicked)) = self.click_locator(doc, node) else {
            debug!("Dropping click on <{}>: no acceptable locator", doc.tag(node));
            return;
        };

        let record = ActionRecord::for_element(
            &locator,
            Some(ElementSnapshot::capture(doc, clicked)),
            ts,
            Action::Click,
        );
        self.append(ledger, record);
    }

    /// Clickable ancestor, then closest anchor, then absolute path
    fn click_locator(&self, doc: &Document, raw: NodeId) -> Option<(Locator, NodeId)> {
        let synth = Synthesizer::new(doc, &self.config.synthesizer);
        let ancestor = semantics::clickable_ancestor(doc, raw).unwrap_or(raw);

        let primary = synth.synthesize(ancestor);
        if !primary.is_weak() {
            return Some((primary, ancestor));
        }
        debug!("Weak click locator {}, retrying", primary.value);

        if let Some(anchor) = semantics::closest_anchor(doc, raw) {
            let locator = synth.synthesize(anchor);
            if !locator.is_weak() {
                return Some((locator, anchor));
            }
        }

        let absolute = synth.synthesize_absolute(ancestor);
        (!absolute.is_weak()).then_some((absolute, ancestor))
    }

    fn buffer_text(
        &mut self,
        doc: &Document,
        node: NodeId,
        ts: u64,
        value: &str,
        scheduler: &mut Scheduler,
    ) {
        if !semantics::is_text_control(doc, node) {
            return;
        }

        let locator = self.locate(doc, node);
        let timer = semantics::is_autocomplete(doc, node).then(|| {
            scheduler.schedule(
                ts + self.config.input_debounce_ms,
                Task::CommitPending {
                    selector: locator.value.clone(),
                },
            )
        });

        let entry = PendingEntry {
            locator,
            element: Some(ElementSnapshot::capture(doc, node)),
            action: Action::Input {
                value: value.to_string(),
            },
            timestamp: ts,
            timer,
        };
        if let Some(old) = self.pending.upsert(entry) {
            scheduler.cancel(old);
        }
    }

    fn on_focus_out<P: LedgerPort>(
        &mut self,
        doc: &Document,
        node: NodeId,
        ts: u64,
        value: Option<&str>,
        ledger: &mut P,
        scheduler: &mut Scheduler,
    ) {
        self.composing = false;
        let selector = self.locate(doc, node).value;

        // Only fields that were actually edited are committed
        if self.pending.get(&selector).is_none() {
            return;
        }
        if let Some(value) = value {
            self.buffer_text(doc, node, ts, value, scheduler);
        }
        self.commit_selector(&selector, ledger, scheduler);
    }

    fn on_change<P: LedgerPort>(
        &mut self,
        doc: &Document,
        node: NodeId,
        ts: u64,
        change: &ControlChange,
        ledger: &mut P,
        scheduler: &mut Scheduler,
    ) {
        let locator = self.locate(doc, node);
        let element = Some(ElementSnapshot::capture(doc, node));

        match change {
            ControlChange::Selected { value, label } => {
                self.flush_all(ledger, scheduler);
                let action = Action::Select {
                    value: value.clone(),
                    label: label.clone(),
                };
                self.append(ledger, ActionRecord::for_element(&locator, element, ts, action));
            }
            ControlChange::Toggled { checked } => {
                let action = if semantics::control_kind(doc, node) == ControlKind::Radio {
                    Action::Radio {
                        value: *checked,
                        group: doc.non_empty_attr(node, "name").map(str::to_string),
                        option_value: doc.non_empty_attr(node, "value").map(str::to_string),
                    }
                } else {
                    Action::Checkbox { value: *checked }
                };
                let timer = scheduler.schedule(
                    ts + self.config.input_debounce_ms,
                    Task::CommitPending {
                        selector: locator.value.clone(),
                    },
                );
                let entry = PendingEntry {
                    locator,
                    element,
                    action,
                    timestamp: ts,
                    timer: Some(timer),
                };
                if let Some(old) = self.pending.upsert(entry) {
                    scheduler.cancel(old);
                }
            }
            ControlChange::Slider {
                value,
                min,
                max,
                step,
            } => {
                self.flush_all(ledger, scheduler);
                let action = Action::Slider {
                    value: *value,
                    min: *min,
                    max: *max,
                    step_size: *step,
                };
                self.append(ledger, ActionRecord::for_element(&locator, element, ts, action));
            }
            ControlChange::Files(files) => {
                let accepted = self.accept_files(files);
                if accepted.is_empty() {
                    return;
                }
                self.flush_all(ledger, scheduler);
                self.file_transfers
                    .extend(accepted.iter().map(|f| FileTransfer {
                        selector: locator.value.clone(),
                        name: f.name.clone(),
                        size: f.size,
                    }));
                let action = Action::Upload {
                    file_names: accepted.into_iter().map(|f| f.name).collect(),
                };
                self.append(ledger, ActionRecord::for_element(&locator, element, ts, action));
            }
        }
    }

    fn accept_files(&self, files: &[SelectedFile]) -> Vec<SelectedFile> {
        let mut accepted: Vec<SelectedFile> = Vec::new();
        for file in files {
            if accepted.len() >= self.config.max_upload_files {
                warn!(
                    "Upload limited to {} files, skipping {}",
                    self.config.max_upload_files, file.name
                );
                continue;
            }
            if file.size > self.config.max_upload_bytes {
                warn!(
                    "Skipping {} ({} bytes > {} byte limit)",
                    file.name, file.size, self.config.max_upload_bytes
                );
                continue;
            }
            accepted.push(file.clone());
        }
        accepted
    }

    fn on_hover<P: LedgerPort>(
        &mut self,
        doc: &Document,
        node: NodeId,
        ts: u64,
        dwell_ms: u64,
        ledger: &mut P,
    ) {
        if dwell_ms < self.config.hover_dwell_ms {
            return;
        }
        let Some(hovered) = semantics::clickable_ancestor(doc, node) else {
            return;
        };

        let locator = self.locate(doc, hovered);
        if locator.is_weak() || self.last_hover.as_deref() == Some(locator.value.as_str()) {
            return;
        }

        let action = Action::Hover {
            value: format!("Hovered on <{}>", doc.tag(hovered)),
        };
        let record = ActionRecord::for_element(
            &locator,
            Some(ElementSnapshot::capture(doc, hovered)),
            ts,
            action,
        );
        if self.append(ledger, record).is_some() {
            self.last_hover = Some(locator.value);
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn on_dialog<P: LedgerPort>(
        &mut self,
        doc: &Document,
        ts: u64,
        kind: DialogKind,
        message: &str,
        accepted: bool,
        response: Option<String>,
        ledger: &mut P,
        scheduler: &mut Scheduler,
    ) {
        self.flush_all(ledger, scheduler);

        if self.config.prune_click_before_delete_dialog && looks_like_delete_confirmation(message)
        {
            self.prune_vanished_click(doc, ledger);
        }

        let action = Action::Dialog {
            dialog_kind: kind,
            message: message.to_string(),
            accepted,
            response,
        };
        self.append(ledger, ActionRecord::page_level(ts, action));
    }

    /// Drop the preceding click if its element is gone from the document
    fn prune_vanished_click<P: LedgerPort>(&mut self, doc: &Document, ledger: &mut P) {
        let Some(last) = ledger.last_record() else {
            return;
        };
        if last.action != Action::Click || last.selector.is_empty() {
            return;
        }

        let vanished = doc
            .resolve_str(&last.selector, last.selector_kind)
            .map(|nodes| nodes.is_empty())
            .unwrap_or(false);
        if !vanished {
            return;
        }

        info!(
            "Pruning step {} (click on {}) before delete confirmation",
            last.step, last.selector
        );
        if let Err(e) = ledger.delete(last.step) {
            warn!("Failed to prune step {}: {}", last.step, e);
        }
    }

    /// Commit one buffered value (debounce timer fired or field lost focus)
    pub fn commit_selector<P: LedgerPort>(
        &mut self,
        selector: &str,
        ledger: &mut P,
        scheduler: &mut Scheduler,
    ) {
        if let Some(entry) = self.pending.take(selector) {
            if let Some(timer) = entry.timer {
                scheduler.cancel(timer);
            }
            self.commit(entry, ledger);
        }
    }

    /// Commit every buffered value in selector order
    pub fn flush_all<P: LedgerPort>(&mut self, ledger: &mut P, scheduler: &mut Scheduler) {
        for entry in self.pending.drain() {
            if let Some(timer) = entry.timer {
                scheduler.cancel(timer);
            }
            self.commit(entry, ledger);
        }
    }

    fn commit<P: LedgerPort>(&mut self, entry: PendingEntry, ledger: &mut P) -> bool {
        let selector = entry.selector().to_string();
        let key = entry.value_key();

        if let Some((last_key, at)) = self.last_commits.get(&selector) {
            if *last_key == key
                && entry.timestamp.saturating_sub(*at) <= self.config.dedupe_window_ms
            {
                debug!("Suppressed duplicate commit for {}", selector);
                return true;
            }
        }

        if let Err(e) = ledger.supersede(&selector) {
            warn!("Failed to commit {}: {}; keeping it buffered", selector, e);
            self.pending.restore(entry);
            return false;
        }

        let timestamp = entry.timestamp;
        match ledger.append(entry.clone().into_record()) {
            Ok(_) => {
                self.last_commits.insert(selector, (key, timestamp));
                self.last_hover = None;
                true
            }
            Err(e) => {
                warn!("Failed to commit {}: {}; keeping it buffered", selector, e);
                self.pending.restore(entry);
                false
            }
        }
    }

    /// Append a finished record after flushing buffered values
    pub fn append_after_flush<P: LedgerPort>(
        &mut self,
        record: ActionRecord,
        ledger: &mut P,
        scheduler: &mut Scheduler,
    ) -> Option<usize> {
        self.flush_all(ledger, scheduler);
        self.append(ledger, record)
    }

    fn append<P: LedgerPort>(&mut self, ledger: &mut P, record: ActionRecord) -> Option<usize> {
        let is_hover = matches!(record.action, Action::Hover { .. });
        let name = record.action.name();
        match ledger.append(record) {
            Ok(step) => {
                if !is_hover {
                    self.last_hover = None;
                }
                Some(step)
            }
            Err(e) => {
                warn!("Failed to deliver {} record: {}", name, e);
                None
            }
        }
    }

    pub fn drain_file_transfers(&mut self) -> Vec<FileTransfer> {
        std::mem::take(&mut self.file_transfers)
    }

    pub fn reset(&mut self) {
        self.pending.clear();
        self.composing = false;
        self.last_commits.clear();
        self.last_hover = None;
        self.file_transfers.clear();
    }
}

/// Controls whose click is followed by a `change` that records it
fn is_change_driven(doc: &Document, node: NodeId) -> bool {
    let toggles = |n: NodeId| {
        matches!(
            semantics::control_kind(doc, n),
            ControlKind::Checkbox | ControlKind::Radio
        )
    };

    match semantics::control_kind(doc, node) {
        ControlKind::Checkbox
        | ControlKind::Radio
        | ControlKind::Select
        | ControlKind::Range
        | ControlKind::File => return true,
        _ => {}
    }

    match doc.tag(node) {
        "option" => true,
        "label" => {
            let by_for = doc
                .non_empty_attr(node, "for")
                .and_then(|id| doc.elements().find(|e| doc.attr(*e, "id") == Some(id)));
            by_for
                .into_iter()
                .chain(doc.descendants(node))
                .any(toggles)
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{DeliveryError, Ledger};

    struct Rig {
        doc: Document,
        machine: CaptureMachine,
        ledger: Ledger,
        scheduler: Scheduler,
    }

    impl Rig {
        fn new(body: &str) -> Self {
            Self::with_config(body, CaptureConfig::default())
        }

        fn with_config(body: &str, config: CaptureConfig) -> Self {
            Self {
                doc: Document::parse(&format!("<html><body>{}</body></html>", body)).unwrap(),
                machine: CaptureMachine::new(config),
                ledger: Ledger::new(),
                scheduler: Scheduler::new(),
            }
        }

        fn node(&self, selector: &str) -> NodeId {
            self.doc.find(selector).unwrap().unwrap()
        }

        fn fire(&mut self, ts: u64, selector: Option<&str>, kind: EventKind) {
            self.advance(ts);
            let target = selector.map(|s| self.node(s));
            let event = CaptureEvent::new(ts, target, kind);
            self.machine
                .handle(&self.doc, &event, &mut self.ledger, &mut self.scheduler);
        }

        fn advance(&mut self, now: u64) {
            for task in self.scheduler.take_due(now) {
                if let Task::CommitPending { selector } = task {
                    self.machine
                        .commit_selector(&selector, &mut self.ledger, &mut self.scheduler);
                }
            }
        }

        fn summary(&self) -> Vec<(usize, String, String, Option<String>)> {
            self.ledger
                .records()
                .iter()
                .map(|r| {
                    (
                        r.step,
                        r.action.name().to_string(),
                        r.selector.clone(),
                        r.action.display_value(),
                    )
                })
                .collect()
        }
    }

    fn input(value: &str) -> EventKind {
        EventKind::Input {
            value: value.to_string(),
            is_composing: false,
        }
    }

    fn toggled(checked: bool) -> EventKind {
        EventKind::Change(ControlChange::Toggled { checked })
    }

    #[test]
    fn test_rapid_checkbox_toggles_collapse_to_final_state() {
        let mut rig = Rig::new(r#"<input type="checkbox" id="agree"><label for="agree">I agree</label>"#);
        rig.fire(0, Some("#agree"), toggled(true));
        rig.fire(100, Some("#agree"), toggled(false));
        rig.fire(200, Some("#agree"), toggled(true));
        rig.fire(300, Some("#agree"), toggled(false));
        rig.advance(2000);

        assert_eq!(rig.ledger.len(), 1);
        let record = &rig.ledger.records()[0];
        assert_eq!(record.selector, "#agree");
        assert_eq!(record.action, Action::Checkbox { value: false });
    }

    #[test]
    fn test_autocomplete_typing_commits_once() {
        let mut rig = Rig::new(r#"<input id="user" role="combobox" aria-autocomplete="list">"#);
        for (i, prefix) in ["a", "al", "ali", "alic", "alice"].iter().enumerate() {
            rig.fire(i as u64 * 120, Some("#user"), input(prefix));
        }
        rig.advance(600);
        assert!(rig.ledger.is_empty(), "debounce window restarts on each keystroke");
        rig.advance(900);

        assert_eq!(
            rig.summary(),
            vec![(1, "Input".to_string(), "#user".to_string(), Some("alice".to_string()))]
        );
    }

    #[test]
    fn test_plain_text_commits_on_focus_loss_only() {
        let mut rig = Rig::new(r#"<input id="name"><input id="untouched">"#);
        rig.fire(0, Some("#name"), input("B"));
        rig.fire(50, Some("#name"), input("Bo"));
        rig.advance(5000);
        assert!(rig.ledger.is_empty());

        rig.fire(5100, Some("#name"), EventKind::FocusOut { value: Some("Bob".to_string()) });
        rig.fire(5200, Some("#untouched"), EventKind::FocusOut { value: Some(String::new()) });

        assert_eq!(
            rig.summary(),
            vec![(1, "Input".to_string(), "#name".to_string(), Some("Bob".to_string()))]
        );
    }

    #[test]
    fn test_click_flushes_pending_input_first() {
        let mut rig = Rig::new(r#"<input id="q" aria-autocomplete="list"><button id="go">Go</button>"#);
        rig.fire(0, Some("#q"), input("rust"));
        rig.fire(50, Some("#go"), EventKind::Click);

        let summary = rig.summary();
        assert_eq!(summary[0].1, "Input");
        assert_eq!(summary[0].2, "#q");
        assert_eq!(summary[1].1, "Click");
        assert_eq!(summary[1].2, "#go");
        assert!(rig.machine.pending().is_empty());
        assert_eq!(rig.scheduler.next_due(), None);
    }

    #[test]
    fn test_enter_flushes_in_selector_order() {
        let mut rig = Rig::new(r#"<input id="b"><input id="a">"#);
        rig.fire(0, Some("#b"), input("2"));
        rig.fire(10, Some("#a"), input("1"));
        rig.fire(20, None, EventKind::KeyDown { key: "Enter".to_string() });

        let selectors: Vec<String> = rig.summary().into_iter().map(|s| s.2).collect();
        assert_eq!(selectors, vec!["#a", "#b"]);
    }

    #[test]
    fn test_composition_emits_single_value() {
        let mut rig = Rig::new(r#"<input id="city">"#);
        rig.fire(0, Some("#city"), EventKind::CompositionStart);
        rig.fire(10, Some("#city"), input("h"));
        rig.fire(20, Some("#city"), EventKind::Input { value: "hà".to_string(), is_composing: true });
        rig.fire(30, None, EventKind::KeyDown { key: "Enter".to_string() });
        assert!(rig.ledger.is_empty());
        assert!(rig.machine.pending().is_empty());

        rig.fire(40, Some("#city"), EventKind::CompositionEnd { value: "Hà Nội".to_string() });
        rig.fire(50, Some("#city"), EventKind::FocusOut { value: None });

        assert_eq!(
            rig.summary(),
            vec![(1, "Input".to_string(), "#city".to_string(), Some("Hà Nội".to_string()))]
        );
    }

    #[test]
    fn test_duplicate_commit_inside_window_is_suppressed() {
        let mut rig = Rig::new(r#"<input id="code"><button id="ok">OK</button>"#);
        rig.fire(0, Some("#code"), input("42"));
        rig.fire(10, Some("#ok"), EventKind::Click);
        rig.fire(20, Some("#code"), input("42"));
        rig.fire(30, Some("#code"), EventKind::FocusOut { value: None });

        let kinds: Vec<String> = rig.summary().into_iter().map(|s| s.1).collect();
        assert_eq!(kinds, vec!["Input", "Click"]);
    }

    #[test]
    fn test_recommit_supersedes_earlier_value() {
        let mut config = CaptureConfig::default();
        config.dedupe_window_ms = 0;
        let mut rig = Rig::with_config(r#"<input id="name"><button id="ok">OK</button>"#, config);
        rig.fire(0, Some("#name"), input("al"));
        rig.fire(10, Some("#ok"), EventKind::Click);
        rig.fire(20, Some("#name"), input("alice"));
        rig.fire(30, Some("#name"), EventKind::FocusOut { value: None });

        assert_eq!(
            rig.summary(),
            vec![
                (1, "Click".to_string(), "#ok".to_string(), None),
                (2, "Input".to_string(), "#name".to_string(), Some("alice".to_string())),
            ]
        );
    }

    #[test]
    fn test_select_radio_and_slider() {
        let mut rig = Rig::new(
            r#"<select id="country"><option value="vn">Viet Nam</option></select>
               <input type="radio" name="size" value="m" id="size-m">
               <input type="range" id="volume">"#,
        );
        rig.fire(0, Some("#size-m"), toggled(true));
        rig.fire(10, Some("#country"), EventKind::Change(ControlChange::Selected {
            value: "vn".to_string(),
            label: Some("Viet Nam".to_string()),
        }));
        rig.fire(20, Some("#volume"), EventKind::Change(ControlChange::Slider {
            value: 30.0,
            min: 0.0,
            max: 100.0,
            step: 5.0,
        }));

        let records = rig.ledger.records();
        assert_eq!(
            records[0].action,
            Action::Radio {
                value: true,
                group: Some("size".to_string()),
                option_value: Some("m".to_string()),
            }
        );
        assert_eq!(records[1].action.name(), "Select");
        assert_eq!(
            records[2].action,
            Action::Slider { value: 30.0, min: 0.0, max: 100.0, step_size: 5.0 }
        );
    }

    #[test]
    fn test_clicks_on_toggles_are_left_to_change() {
        let mut rig = Rig::new(r#"<input type="checkbox" id="agree"><label for="agree">Agree</label>"#);
        rig.fire(0, Some("#agree"), EventKind::Click);
        rig.fire(5, Some("label"), EventKind::Click);
        assert!(rig.ledger.is_empty());
    }

    #[test]
    fn test_icon_click_records_button() {
        let mut rig = Rig::new(r#"<button id="trash"><i class="fa fa-trash"></i></button>"#);
        rig.fire(0, Some("i"), EventKind::Click);
        let record = &rig.ledger.records()[0];
        assert_eq!(record.selector, "#trash");
        assert_eq!(record.element.as_ref().unwrap().tag, "button");
    }

    #[test]
    fn test_click_on_generated_id_records_link_ancestor() {
        let mut rig = Rig::new(
            r#"<nav><a href="/pricing"><div id="ember512">Pricing</div></a><a href="/blog"><div id="ember513">Blog</div></a></nav>"#,
        );
        rig.fire(0, Some("#ember512"), EventKind::Click);
        let record = &rig.ledger.records()[0];
        assert_eq!(record.selector, r#"a[href="/pricing"]"#);
        assert_eq!(record.element.as_ref().unwrap().tag, "a");
    }

    // `x-card$` cannot be expressed in CSS or XPath, so the card only gets
    // the weak bare-tag locator
    #[test]
    fn test_weak_click_locator_retries_with_anchor() {
        let mut rig = Rig::new(
            r#"<a href="/docs/guide"><x-card$ tabindex="0"><span class="caption">Guide</span></x-card$></a>"#,
        );
        let card = rig.doc.elements().find(|n| rig.doc.tag(*n) == "x-card$").unwrap();
        let synth = Synthesizer::new(&rig.doc, &rig.machine.config().synthesizer);
        assert!(synth.synthesize(card).is_weak());

        rig.fire(0, Some("span.caption"), EventKind::Click);
        assert_eq!(rig.ledger.len(), 1);
        let record = &rig.ledger.records()[0];
        assert_eq!(record.selector, r#"a[href="/docs/guide"]"#);
        assert_eq!(record.element.as_ref().unwrap().tag, "a");
    }

    #[test]
    fn test_click_is_dropped_when_every_locator_is_weak() {
        let mut rig = Rig::new(
            r#"<div><x-card$ tabindex="0"><span class="caption">Guide</span></x-card$></div>"#,
        );
        rig.fire(0, Some("span.caption"), EventKind::Click);
        assert!(rig.ledger.is_empty());
    }

    #[test]
    fn test_upload_limits_and_transfers() {
        let mut config = CaptureConfig::default();
        config.max_upload_files = 2;
        config.max_upload_bytes = 1000;
        let mut rig = Rig::with_config(r#"<input type="file" id="docs" multiple>"#, config);

        let files = vec![
            SelectedFile { name: "a.txt".to_string(), size: 10 },
            SelectedFile { name: "huge.bin".to_string(), size: 5000 },
            SelectedFile { name: "b.txt".to_string(), size: 20 },
            SelectedFile { name: "c.txt".to_string(), size: 30 },
        ];
        rig.fire(0, Some("#docs"), EventKind::Change(ControlChange::Files(files)));

        assert_eq!(
            rig.ledger.records()[0].action,
            Action::Upload { file_names: vec!["a.txt".to_string(), "b.txt".to_string()] }
        );
        let transfers = rig.machine.drain_file_transfers();
        assert_eq!(transfers.len(), 2);
        assert_eq!(transfers[0].selector, "#docs");
        assert!(rig.machine.drain_file_transfers().is_empty());
    }

    #[test]
    fn test_hover_dwell_and_collapse() {
        let mut rig = Rig::new(r#"<button id="menu">Menu</button><p id="text">x</p>"#);
        rig.fire(0, Some("#menu"), EventKind::Hover { dwell_ms: 200 });
        rig.fire(10, Some("#menu"), EventKind::Hover { dwell_ms: 800 });
        rig.fire(20, Some("#menu"), EventKind::Hover { dwell_ms: 900 });
        rig.fire(30, Some("#text"), EventKind::Hover { dwell_ms: 900 });
        rig.fire(40, Some("#menu"), EventKind::Click);
        rig.fire(50, Some("#menu"), EventKind::Hover { dwell_ms: 900 });

        let summary = rig.summary();
        assert_eq!(summary.len(), 3);
        assert_eq!(summary[0].3.as_deref(), Some("Hovered on <button>"));
        assert_eq!(summary[1].1, "Click");
        assert_eq!(summary[2].1, "Hover");
    }

    #[test]
    fn test_delete_dialog_prunes_vanished_click_when_enabled() {
        let body = r#"<ul><li><button id="remove-7">x</button></li></ul>"#;
        let dialog = EventKind::Dialog {
            kind: DialogKind::Confirm,
            message: "Delete this row?".to_string(),
            accepted: true,
            response: None,
        };

        for (enabled, expected) in [(false, vec!["Click", "Dialog"]), (true, vec!["Dialog"])] {
            let mut config = CaptureConfig::default();
            config.prune_click_before_delete_dialog = enabled;
            let mut rig = Rig::with_config(body, config);
            rig.fire(0, Some("#remove-7"), EventKind::Click);

            rig.doc = Document::parse("<html><body><ul></ul></body></html>").unwrap();
            rig.fire(10, None, dialog.clone());

            let kinds: Vec<String> = rig.summary().into_iter().map(|s| s.1).collect();
            assert_eq!(kinds, expected);
            assert_eq!(rig.ledger.records().last().unwrap().selector, "");
        }
    }

    /// A ledger that rejects the first `failures` deliveries
    struct FlakyLedger {
        inner: Ledger,
        failures: usize,
    }

    impl LedgerPort for FlakyLedger {
        fn append(&mut self, record: ActionRecord) -> Result<usize, DeliveryError> {
            if self.failures > 0 {
                self.failures -= 1;
                return Err(DeliveryError::Unreachable("worker restarting".to_string()));
            }
            self.inner.append(record)
        }

        fn supersede(&mut self, selector: &str) -> Result<(), DeliveryError> {
            self.inner.supersede(selector)
        }

        fn delete(&mut self, step: usize) -> Result<Vec<ActionRecord>, DeliveryError> {
            self.inner.delete(step)
        }

        fn last_record(&self) -> Option<ActionRecord> {
            self.inner.last_record()
        }

        fn clear(&mut self) -> Result<(), DeliveryError> {
            self.inner.clear()
        }
    }

    #[test]
    fn test_failed_commit_stays_buffered_until_next_flush() {
        let doc = Document::parse(r#"<html><body><input id="q"></body></html>"#).unwrap();
        let q = doc.find("#q").unwrap().unwrap();
        let mut machine = CaptureMachine::new(CaptureConfig::default());
        let mut ledger = FlakyLedger { inner: Ledger::new(), failures: 1 };
        let mut scheduler = Scheduler::new();

        machine.handle(&doc, &CaptureEvent::new(0, Some(q), input("hello")), &mut ledger, &mut scheduler);
        let enter = CaptureEvent::page(10, EventKind::KeyDown { key: "Enter".to_string() });
        machine.handle(&doc, &enter, &mut ledger, &mut scheduler);
        assert!(ledger.inner.is_empty());
        assert_eq!(machine.pending().len(), 1);

        machine.flush_all(&mut ledger, &mut scheduler);
        assert_eq!(ledger.inner.len(), 1);
        assert!(machine.pending().is_empty());
    }
}
