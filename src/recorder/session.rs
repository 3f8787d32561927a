//! Recording session
//!
//! The session-scoped context that owns every piece of capture state and
//! routes host events, timers and frames to it. Nothing is global: a host
//! creates a session with [`RecordingSession::start`], feeds it, and reads
//! the ledger back.

use log::{debug, info};
use uuid::Uuid;

use crate::capture::{
    Affordance, CaptureEvent, CaptureMachine, EventKind, FileTransfer, Scheduler,
    StructureWatcher, SubscriptionId, Task,
};
use crate::dom::Document;
use crate::drag::{DragEngine, DragOutcome};
use crate::ledger::{Action, ActionRecord, DeliveryError, Ledger, LedgerPort, MarkerKind};
use crate::utils::config::CaptureConfig;

pub struct RecordingSession<P: LedgerPort = Ledger> {
    config: CaptureConfig,
    capture: CaptureMachine,
    drag: DragEngine,
    watcher: StructureWatcher,
    scheduler: Scheduler,
    ledger: P,
    /// Id shared by the open start marker and its future end marker
    recording_id: Option<String>,
}

impl RecordingSession<Ledger> {
    /// Start a session backed by an in-process ledger
    pub fn start(config: CaptureConfig) -> Self {
        Self::with_port(config, Ledger::new())
    }
}

impl<P: LedgerPort> RecordingSession<P> {
    /// Start a session that delivers records through `ledger`
    pub fn with_port(config: CaptureConfig, ledger: P) -> Self {
        info!(
            "Recording session started (debounce {}ms, dedupe {}ms)",
            config.input_debounce_ms, config.dedupe_window_ms
        );
        Self {
            capture: CaptureMachine::new(config.clone()),
            drag: DragEngine::new(config.drag.clone(), config.synthesizer.clone()),
            watcher: StructureWatcher::new(config.structure_batch_cap, config.structure_debounce_ms),
            scheduler: Scheduler::new(),
            ledger,
            recording_id: None,
            config,
        }
    }

    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }

    pub fn ledger(&self) -> &P {
        &self.ledger
    }

    pub fn ledger_mut(&mut self) -> &mut P {
        &mut self.ledger
    }

    pub fn into_ledger(self) -> P {
        self.ledger
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn capture(&self) -> &CaptureMachine {
        &self.capture
    }

    /// Feed one host event together with the snapshot it refers to
    pub fn handle(&mut self, doc: &Document, event: &CaptureEvent) {
        let ts = event.timestamp_ms;
        // Timers that expired before this event run first
        self.advance(doc, ts);

        match &event.kind {
            EventKind::PointerDown { .. }
            | EventKind::PointerMove { .. }
            | EventKind::PointerUp { .. }
            | EventKind::DragStart { .. }
            | EventKind::DragEnter { .. }
            | EventKind::DragOver { .. }
            | EventKind::Drop { .. }
            | EventKind::DragEnd { .. } => {
                if let Some(outcome) = self.drag.handle(doc, event, &mut self.scheduler) {
                    self.commit_drag(outcome);
                }
            }
            EventKind::Click | EventKind::Hover { .. } if self.drag.suppresses_pointer(ts) => {
                debug!("Suppressed pointer echo of a drag at {}ms", ts);
            }
            EventKind::NodesInserted { nodes } => {
                self.watcher.on_nodes_inserted(
                    doc,
                    nodes,
                    &self.config.synthesizer,
                    ts,
                    &mut self.scheduler,
                );
            }
            _ => self
                .capture
                .handle(doc, event, &mut self.ledger, &mut self.scheduler),
        }
    }

    /// Move the clock to `now_ms` and run every timer that came due
    pub fn advance(&mut self, _doc: &Document, now_ms: u64) {
        for task in self.scheduler.take_due(now_ms) {
            match task {
                Task::CommitPending { selector } => {
                    self.capture
                        .commit_selector(&selector, &mut self.ledger, &mut self.scheduler);
                }
                Task::FlushStructure => {
                    self.watcher.flush();
                }
                Task::RefineDrop { .. } => {}
            }
        }
    }

    /// Deliver one animation frame
    pub fn animation_frame(&mut self, doc: &Document) {
        for task in self.scheduler.take_frame() {
            if let Task::RefineDrop {
                gesture,
                frames_remaining,
            } = task
            {
                if let Some(outcome) =
                    self.drag
                        .on_frame(doc, gesture, frames_remaining, &mut self.scheduler)
                {
                    self.commit_drag(outcome);
                }
            }
        }
    }

    fn commit_drag(&mut self, outcome: DragOutcome) {
        self.capture.append_after_flush(
            outcome.into_record(),
            &mut self.ledger,
            &mut self.scheduler,
        );
    }

    /// Commit every buffered value, in selector order
    pub fn flush_pending_inputs(&mut self) {
        self.capture.flush_all(&mut self.ledger, &mut self.scheduler);
    }

    pub fn delete(&mut self, step: usize) -> Result<Vec<ActionRecord>, DeliveryError> {
        self.ledger.delete(step)
    }

    /// Append a start marker; returns its recording id
    pub fn mark_session_start(&mut self, ts: u64) -> Result<String, DeliveryError> {
        self.flush_pending_inputs();
        let recording_id = Uuid::new_v4().to_string();
        self.ledger.append(ActionRecord::page_level(
            ts,
            Action::SessionMarker {
                marker: MarkerKind::Start,
                recording_id: recording_id.clone(),
            },
        ))?;
        self.recording_id = Some(recording_id.clone());
        Ok(recording_id)
    }

    /// Close the open marker pair; `None` when no start marker is open
    pub fn mark_session_end(&mut self, ts: u64) -> Result<Option<usize>, DeliveryError> {
        let Some(recording_id) = self.recording_id.clone() else {
            return Ok(None);
        };
        self.flush_pending_inputs();
        let step = self.ledger.append(ActionRecord::page_level(
            ts,
            Action::SessionMarker {
                marker: MarkerKind::End,
                recording_id,
            },
        ))?;
        self.recording_id = None;
        Ok(Some(step))
    }

    pub fn subscribe_structure(
        &mut self,
        callback: impl FnMut(&[Affordance]) + 'static,
    ) -> SubscriptionId {
        self.watcher.subscribe(callback)
    }

    pub fn unsubscribe_structure(&mut self, id: SubscriptionId) -> bool {
        self.watcher.unsubscribe(id)
    }

    pub fn drain_file_transfers(&mut self) -> Vec<FileTransfer> {
        self.capture.drain_file_transfers()
    }

    /// Drop all capture state and clear the ledger
    pub fn reset(&mut self) -> Result<(), DeliveryError> {
        self.capture.reset();
        self.drag.reset();
        self.watcher.reset();
        self.scheduler.clear();
        self.recording_id = None;
        self.ledger.clear()?;
        info!("Recording session reset");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::ControlChange;
    use crate::drag::targets::tests::BOARD;
    use crate::ledger::ContainerKind;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn doc(body: &str) -> Document {
        Document::parse(&format!("<html><body>{}</body></html>", body)).unwrap()
    }

    fn fire(session: &mut RecordingSession, doc: &Document, ts: u64, selector: Option<&str>, kind: EventKind) {
        let target = selector.map(|s| doc.find(s).unwrap().unwrap());
        session.handle(doc, &CaptureEvent::new(ts, target, kind));
    }

    fn kinds(session: &RecordingSession) -> Vec<&'static str> {
        session.ledger().records().iter().map(|r| r.action.name()).collect()
    }

    fn steps(session: &RecordingSession) -> Vec<usize> {
        session.ledger().records().iter().map(|r| r.step).collect()
    }

    #[test]
    fn test_checkbox_toggles_settle_to_one_record() {
        let page = doc(r#"<input type="checkbox" id="agree">"#);
        let mut session = RecordingSession::start(CaptureConfig::default());
        for (i, checked) in [true, false, true, false].into_iter().enumerate() {
            fire(&mut session, &page, i as u64 * 90, Some("#agree"),
                EventKind::Change(ControlChange::Toggled { checked }));
        }
        session.advance(&page, 5_000);

        let records = session.ledger().records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].selector, "#agree");
        assert_eq!(records[0].action, Action::Checkbox { value: false });
    }

    #[test]
    fn test_autocomplete_word_is_one_input() {
        let page = doc(r#"<input id="assignee" aria-autocomplete="list">"#);
        let mut session = RecordingSession::start(CaptureConfig::default());
        let mut typed = String::new();
        for (i, c) in "alice".chars().enumerate() {
            typed.push(c);
            fire(&mut session, &page, i as u64 * 80, Some("#assignee"),
                EventKind::Input { value: typed.clone(), is_composing: false });
        }
        session.advance(&page, 10_000);

        let records = session.ledger().records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].action, Action::Input { value: "alice".to_string() });
    }

    #[test]
    fn test_input_precedes_the_click_that_finalized_it() {
        let page = doc(r#"<input id="email"><button id="submit">Send</button>"#);
        let mut session = RecordingSession::start(CaptureConfig::default());
        fire(&mut session, &page, 0, Some("#email"),
            EventKind::Input { value: "a@b.c".to_string(), is_composing: false });
        fire(&mut session, &page, 100, Some("#submit"), EventKind::Click);

        let records = session.ledger().records();
        let input = records.iter().find(|r| r.selector == "#email").unwrap();
        let click = records.iter().find(|r| r.selector == "#submit").unwrap();
        assert!(input.step < click.step);
    }

    #[test]
    fn test_markers_pair_and_steps_stay_contiguous() {
        let page = doc(r#"<button id="a">A</button><button id="b">B</button>"#);
        let mut session = RecordingSession::start(CaptureConfig::default());

        fire(&mut session, &page, 0, Some("#a"), EventKind::Click);
        let recording_id = session.mark_session_start(10).unwrap();
        fire(&mut session, &page, 20, Some("#b"), EventKind::Click);
        assert_eq!(session.mark_session_end(30).unwrap(), Some(4));
        assert_eq!(session.mark_session_end(40).unwrap(), None);
        fire(&mut session, &page, 50, Some("#a"), EventKind::Click);
        assert_eq!(steps(&session), vec![1, 2, 3, 4, 5]);

        let end = &session.ledger().records()[3];
        assert_eq!(end.action.recording_id(), Some(recording_id.as_str()));

        let removed = session.delete(2).unwrap();
        assert_eq!(removed.len(), 2);
        assert_eq!(kinds(&session), vec!["Click", "Click", "Click"]);
        assert_eq!(steps(&session), vec![1, 2, 3]);
    }

    #[test]
    fn test_drag_to_column_flushes_input_and_swallows_echo_click() {
        let page = Document::parse(&BOARD.replace(
            r#"<div class="board""#,
            r#"<input id="note" data-bounds="[900,0][990,20]"><div class="board""#,
        ))
        .unwrap();
        let mut session = RecordingSession::start(CaptureConfig::default());

        fire(&mut session, &page, 0, Some("#note"),
            EventKind::Input { value: "moved".to_string(), is_composing: false });
        fire(&mut session, &page, 100, Some("li.card"), EventKind::PointerDown { x: 50.0, y: 75.0 });
        fire(&mut session, &page, 120, None, EventKind::PointerMove { x: 300.0, y: 200.0 });
        fire(&mut session, &page, 140, None, EventKind::PointerMove { x: 400.0, y: 300.0 });
        fire(&mut session, &page, 160, None, EventKind::PointerUp { x: 400.0, y: 300.0 });
        session.animation_frame(&page);
        session.animation_frame(&page);
        fire(&mut session, &page, 170, Some("div.column:nth-of-type(2)"), EventKind::Click);

        assert_eq!(kinds(&session), vec!["Input", "DragAndDrop"]);
        let drag = &session.ledger().records()[1];
        assert_eq!(drag.selector, "li.card:nth-of-type(1)");
        match &drag.action {
            Action::DragAndDrop { source_selector, target_selector, container_kind, .. } => {
                assert_eq!(target_selector, "div.column:nth-of-type(2)");
                assert_ne!(source_selector, target_selector);
                assert_eq!(*container_kind, ContainerKind::Column);
            }
            other => panic!("unexpected action {:?}", other),
        }
    }

    /// Delivers nothing while `down` is set
    #[derive(Default)]
    struct Outage {
        inner: Ledger,
        down: bool,
    }

    impl LedgerPort for Outage {
        fn append(&mut self, record: ActionRecord) -> Result<usize, DeliveryError> {
            if self.down {
                return Err(DeliveryError::Unreachable("background worker asleep".to_string()));
            }
            self.inner.append(record)
        }

        fn supersede(&mut self, selector: &str) -> Result<(), DeliveryError> {
            if self.down {
                return Err(DeliveryError::Unreachable("background worker asleep".to_string()));
            }
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
    fn test_values_survive_a_ledger_outage() {
        let page = doc(r#"<input id="city"><button id="go">Go</button>"#);
        let mut session = RecordingSession::with_port(
            CaptureConfig::default(),
            Outage { down: true, ..Default::default() },
        );
        let target = page.find("#city").unwrap();
        session.handle(&page, &CaptureEvent::new(0, target,
            EventKind::Input { value: "Hue".to_string(), is_composing: false }));
        session.flush_pending_inputs();
        assert!(session.ledger().inner.is_empty());
        assert_eq!(session.capture().pending().len(), 1);

        session.ledger_mut().down = false;
        let go = page.find("#go").unwrap();
        session.handle(&page, &CaptureEvent::new(50, go, EventKind::Click));

        let records = session.ledger().inner.records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].action, Action::Input { value: "Hue".to_string() });
        assert_eq!(records[1].action, Action::Click);
    }

    #[test]
    fn test_structure_subscribers_and_reset() {
        let page = doc(r#"<div id="toast"><button id="undo">Undo</button></div>"#);
        let mut session = RecordingSession::start(CaptureConfig::default());
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        session.subscribe_structure(move |batch| {
            sink.borrow_mut().extend(batch.iter().map(|a| a.locator.value.clone()))
        });

        let toast = page.find("#toast").unwrap().unwrap();
        fire(&mut session, &page, 0, None, EventKind::NodesInserted { nodes: vec![toast] });
        session.advance(&page, 1_000);
        assert_eq!(*seen.borrow(), vec!["#undo".to_string()]);
        assert!(session.ledger().is_empty());

        fire(&mut session, &page, 1_100, Some("#undo"), EventKind::Click);
        session.reset().unwrap();
        assert!(session.ledger().is_empty());
        assert_eq!(session.scheduler().next_due(), None);
    }
}
