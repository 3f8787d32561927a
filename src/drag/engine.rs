//! Drag gesture state machine
//!
//! Idle → Pressed → SourceArmed → Tracking → Committing → Idle. Native
//! drag events and synthetic pointer sequences drive the same states; the
//! drop is re-checked for a couple of animation frames before it is final,
//! because sortable libraries reflow after release.

use log::{debug, info};

use super::targets::{resolve_drop_target, DropTarget};
use crate::capture::{CaptureEvent, EventKind, Scheduler, Task};
use crate::dom::semantics;
use crate::dom::{Document, NodeId};
use crate::ledger::{Action, ActionRecord, ContainerKind, ElementSnapshot};
use crate::locator::{Locator, Synthesizer};
use crate::utils::config::{DragConfig, SynthesizerConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragPhase {
    Idle,
    /// Pointer is down on a draggable element, below the travel threshold
    Pressed,
    SourceArmed,
    Tracking,
    /// Released; waiting for layout to settle
    Committing,
}

/// A finished gesture, ready to become a ledger record
#[derive(Debug, Clone, PartialEq)]
pub struct DragOutcome {
    pub source: Locator,
    pub element: Option<ElementSnapshot>,
    pub target: Locator,
    pub container: Locator,
    pub container_kind: ContainerKind,
    pub timestamp: u64,
}

impl DragOutcome {
    pub fn into_record(self) -> ActionRecord {
        let action = Action::DragAndDrop {
            source_selector: self.source.value.clone(),
            target_selector: self.target.value,
            container_selector: self.container.value,
            container_kind: self.container_kind,
        };
        ActionRecord::for_element(&self.source, self.element, self.timestamp, action)
    }
}

#[derive(Debug, Clone)]
struct Gesture {
    id: u64,
    native: bool,
    origin: (f64, f64),
    threshold: f64,
    source: Locator,
    element: ElementSnapshot,
    last_hit: Option<DropTarget>,
    candidate: Option<DropTarget>,
    release: (f64, f64),
    released_at: u64,
    /// Set once the gesture produced (or discarded) its record
    completed: bool,
}

pub struct DragEngine {
    config: DragConfig,
    synthesizer: SynthesizerConfig,
    phase: DragPhase,
    gesture: Option<Gesture>,
    next_id: u64,
    suppress_until: Option<u64>,
}

impl DragEngine {
    pub fn new(config: DragConfig, synthesizer: SynthesizerConfig) -> Self {
        Self {
            config,
            synthesizer,
            phase: DragPhase::Idle,
            gesture: None,
            next_id: 0,
            suppress_until: None,
        }
    }

    pub fn phase(&self) -> DragPhase {
        self.phase
    }

    /// Whether clicks and hovers at `ts` belong to a drag rather than the user
    pub fn suppresses_pointer(&self, ts: u64) -> bool {
        matches!(
            self.phase,
            DragPhase::SourceArmed | DragPhase::Tracking | DragPhase::Committing
        ) || self.suppress_until.is_some_and(|until| ts <= until)
    }

    /// Feed a pointer or drag event; returns a gesture completed by it
    pub fn handle(
        &mut self,
        doc: &Document,
        event: &CaptureEvent,
        scheduler: &mut Scheduler,
    ) -> Option<DragOutcome> {
        let ts = event.timestamp_ms;
        let target = event.target.and_then(|t| doc.element_of(t));

        match event.kind {
            EventKind::PointerDown { x, y } => {
                if self.phase != DragPhase::Committing {
                    if let Some(node) = target {
                        self.press(doc, node, x, y);
                    }
                }
                None
            }
            EventKind::PointerMove { x, y } => {
                self.pointer_move(doc, x, y);
                None
            }
            EventKind::PointerUp { x, y } => self.pointer_up(doc, x, y, ts, scheduler),
            EventKind::DragStart { x, y } => {
                if let Some(node) = target {
                    self.native_start(doc, node, x, y);
                }
                None
            }
            EventKind::DragEnter { x, y } | EventKind::DragOver { x, y } => {
                if self.is_native_tracking() {
                    self.track(doc, x, y);
                }
                None
            }
            EventKind::Drop { x, y } => {
                if self.is_native_tracking() {
                    self.begin_commit(doc, x, y, ts, scheduler)
                } else {
                    None
                }
            }
            EventKind::DragEnd { .. } => self.native_end(ts),
            _ => None,
        }
    }

    fn is_native_tracking(&self) -> bool {
        matches!(self.phase, DragPhase::SourceArmed | DragPhase::Tracking)
            && self.gesture.as_ref().is_some_and(|g| g.native)
    }

    fn start_gesture(&mut self, doc: &Document, node: NodeId, x: f64, y: f64, native: bool) -> bool {
        let Some(source) = semantics::draggable_ancestor(doc, node) else {
            return false;
        };
        let locator = Synthesizer::new(doc, &self.synthesizer).synthesize_for_drag(source);
        if locator.is_weak() {
            debug!("Ignoring drag from <{}>: no usable locator", doc.tag(source));
            return false;
        }

        let threshold = if semantics::is_library_drag_item(doc, source) {
            self.config.library_threshold_px
        } else {
            self.config.threshold_px
        };

        self.next_id += 1;
        self.gesture = Some(Gesture {
            id: self.next_id,
            native,
            origin: (x, y),
            threshold,
            source: locator,
            element: ElementSnapshot::capture(doc, source),
            last_hit: None,
            candidate: None,
            release: (x, y),
            released_at: 0,
            completed: false,
        });
        true
    }

    fn press(&mut self, doc: &Document, node: NodeId, x: f64, y: f64) {
        self.phase = if self.start_gesture(doc, node, x, y, false) {
            DragPhase::Pressed
        } else {
            DragPhase::Idle
        };
    }

    fn native_start(&mut self, doc: &Document, node: NodeId, x: f64, y: f64) {
        if let Some(gesture) = &self.gesture {
            if !gesture.native && !gesture.completed {
                debug!("Native drag started, abandoning synthetic gesture");
            }
        }
        self.phase = if self.start_gesture(doc, node, x, y, true) {
            DragPhase::SourceArmed
        } else {
            DragPhase::Idle
        };
    }

    fn pointer_move(&mut self, doc: &Document, x: f64, y: f64) {
        let Some(gesture) = self.gesture.as_ref().filter(|g| !g.native) else {
            return;
        };
        match self.phase {
            DragPhase::Pressed => {
                let (ox, oy) = gesture.origin;
                if (x - ox).hypot(y - oy) >= gesture.threshold {
                    debug!("Synthetic drag armed on {}", gesture.source.value);
                    self.phase = DragPhase::SourceArmed;
                    self.track(doc, x, y);
                }
            }
            DragPhase::SourceArmed | DragPhase::Tracking => self.track(doc, x, y),
            _ => {}
        }
    }

    fn pointer_up(
        &mut self,
        doc: &Document,
        x: f64,
        y: f64,
        ts: u64,
        scheduler: &mut Scheduler,
    ) -> Option<DragOutcome> {
        let synthetic = self.gesture.as_ref().is_some_and(|g| !g.native);
        match self.phase {
            DragPhase::Pressed => {
                self.phase = DragPhase::Idle;
                None
            }
            DragPhase::SourceArmed | DragPhase::Tracking if synthetic => {
                self.begin_commit(doc, x, y, ts, scheduler)
            }
            _ => None,
        }
    }

    /// Re-resolve the best candidate under the pointer
    fn track(&mut self, doc: &Document, x: f64, y: f64) {
        let Some(gesture) = self.gesture.as_mut() else {
            return;
        };
        let synth = Synthesizer::new(doc, &self.synthesizer);
        if let Some(hit) = resolve_drop_target(doc, &synth, &self.config, &gesture.source, x, y) {
            gesture.last_hit = Some(hit);
        }
        self.phase = DragPhase::Tracking;
    }

    fn begin_commit(
        &mut self,
        doc: &Document,
        x: f64,
        y: f64,
        ts: u64,
        scheduler: &mut Scheduler,
    ) -> Option<DragOutcome> {
        let gesture = self.gesture.as_mut()?;
        let synth = Synthesizer::new(doc, &self.synthesizer);
        let candidate = resolve_drop_target(doc, &synth, &self.config, &gesture.source, x, y)
            .or_else(|| gesture.last_hit.clone());

        gesture.release = (x, y);
        gesture.released_at = ts;

        if candidate.is_none() {
            debug!("No drop target for {}, discarding gesture", gesture.source.value);
            return self.finish(None);
        }
        gesture.candidate = candidate;

        if self.config.refine_frames == 0 {
            return self.finish(Some(doc));
        }
        self.phase = DragPhase::Committing;
        scheduler.request_frame(Task::RefineDrop {
            gesture: gesture.id,
            frames_remaining: self.config.refine_frames,
        });
        None
    }

    /// One animation frame after release
    pub fn on_frame(
        &mut self,
        doc: &Document,
        gesture_id: u64,
        frames_remaining: u8,
        scheduler: &mut Scheduler,
    ) -> Option<DragOutcome> {
        let current = self.gesture.as_ref().map(|g| g.id);
        if self.phase != DragPhase::Committing || current != Some(gesture_id) {
            return None;
        }

        if frames_remaining > 1 {
            scheduler.request_frame(Task::RefineDrop {
                gesture: gesture_id,
                frames_remaining: frames_remaining - 1,
            });
            return None;
        }
        self.finish(Some(doc))
    }

    /// Refine against the settled layout (when given), then emit or discard
    fn finish(&mut self, settled: Option<&Document>) -> Option<DragOutcome> {
        let gesture = self.gesture.as_mut()?;
        self.phase = DragPhase::Idle;
        gesture.completed = true;
        self.suppress_until = Some(gesture.released_at + self.config.click_suppress_ms);

        let mut candidate = gesture.candidate.take()?;
        if let Some(doc) = settled {
            let synth = Synthesizer::new(doc, &self.synthesizer);
            let (x, y) = gesture.release;
            if let Some(refined) =
                resolve_drop_target(doc, &synth, &self.config, &gesture.source, x, y)
            {
                if !refined.target.same_target(&candidate.target) && refined.depth > candidate.depth {
                    debug!(
                        "Drop target refined from {} to {}",
                        candidate.target.value, refined.target.value
                    );
                    candidate = refined;
                }
            }
        }

        Self::outcome(gesture, candidate)
    }

    fn outcome(gesture: &Gesture, drop: DropTarget) -> Option<DragOutcome> {
        if drop.target.same_target(&gesture.source) {
            debug!("Drag of {} landed on itself, discarding", gesture.source.value);
            return None;
        }

        info!(
            "Drag {} → {} ({:?})",
            gesture.source.value, drop.target.value, drop.container_kind
        );
        Some(DragOutcome {
            source: gesture.source.clone(),
            element: Some(gesture.element.clone()),
            target: drop.target,
            container: drop.container,
            container_kind: drop.container_kind,
            timestamp: gesture.released_at,
        })
    }

    /// Native dragend: fall back to the last tracked hit if nothing committed
    fn native_end(&mut self, ts: u64) -> Option<DragOutcome> {
        let gesture = self.gesture.as_mut()?;
        if !gesture.native || gesture.completed || self.phase == DragPhase::Committing {
            return None;
        }

        self.phase = DragPhase::Idle;
        gesture.completed = true;
        gesture.released_at = ts;
        self.suppress_until = Some(ts + self.config.click_suppress_ms);

        match gesture.last_hit.take() {
            Some(hit) => {
                debug!("dragend without drop, using last tracked target");
                Self::outcome(gesture, hit)
            }
            None => None,
        }
    }

    pub fn reset(&mut self) {
        self.phase = DragPhase::Idle;
        self.gesture = None;
        self.suppress_until = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drag::targets::tests::BOARD;

    struct Rig {
        doc: Document,
        engine: DragEngine,
        scheduler: Scheduler,
        outcomes: Vec<DragOutcome>,
    }

    impl Rig {
        fn new() -> Self {
            Self {
                doc: Document::parse(BOARD).unwrap(),
                engine: DragEngine::new(DragConfig::default(), SynthesizerConfig::default()),
                scheduler: Scheduler::new(),
                outcomes: Vec::new(),
            }
        }

        fn fire(&mut self, ts: u64, selector: Option<&str>, kind: EventKind) {
            let target = selector.map(|s| self.doc.find(s).unwrap().unwrap());
            let event = CaptureEvent::new(ts, target, kind);
            if let Some(outcome) = self.engine.handle(&self.doc, &event, &mut self.scheduler) {
                self.outcomes.push(outcome);
            }
        }

        fn frame(&mut self) {
            for task in self.scheduler.take_frame() {
                if let Task::RefineDrop { gesture, frames_remaining } = task {
                    if let Some(outcome) =
                        self.engine
                            .on_frame(&self.doc, gesture, frames_remaining, &mut self.scheduler)
                    {
                        self.outcomes.push(outcome);
                    }
                }
            }
        }
    }

    const CARD_A: Option<&str> = Some("li.card");

    #[test]
    fn test_synthetic_drag_commits_after_two_frames() {
        let mut rig = Rig::new();
        rig.fire(0, CARD_A, EventKind::PointerDown { x: 50.0, y: 75.0 });
        rig.fire(10, None, EventKind::PointerMove { x: 52.0, y: 76.0 });
        assert_eq!(rig.engine.phase(), DragPhase::Pressed);
        rig.fire(20, None, EventKind::PointerMove { x: 200.0, y: 200.0 });
        rig.fire(30, None, EventKind::PointerMove { x: 400.0, y: 300.0 });
        assert_eq!(rig.engine.phase(), DragPhase::Tracking);
        rig.fire(40, None, EventKind::PointerUp { x: 400.0, y: 300.0 });
        assert_eq!(rig.engine.phase(), DragPhase::Committing);

        rig.frame();
        assert!(rig.outcomes.is_empty());
        rig.frame();

        assert_eq!(rig.outcomes.len(), 1);
        let outcome = &rig.outcomes[0];
        assert_eq!(outcome.source.value, "li.card:nth-of-type(1)");
        assert_eq!(outcome.target.value, "div.column:nth-of-type(2)");
        assert_eq!(outcome.container_kind, ContainerKind::Column);
        assert_eq!(rig.engine.phase(), DragPhase::Idle);

        assert!(rig.engine.suppresses_pointer(300));
        assert!(!rig.engine.suppresses_pointer(400));
    }

    #[test]
    fn test_press_without_travel_is_a_click() {
        let mut rig = Rig::new();
        rig.fire(0, CARD_A, EventKind::PointerDown { x: 50.0, y: 75.0 });
        rig.fire(10, None, EventKind::PointerMove { x: 53.0, y: 77.0 });
        rig.fire(20, None, EventKind::PointerUp { x: 53.0, y: 77.0 });

        assert_eq!(rig.engine.phase(), DragPhase::Idle);
        assert!(!rig.engine.suppresses_pointer(20));
        assert!(!rig.scheduler.has_frame_requests());
    }

    #[test]
    fn test_native_drop_then_dragend_records_once() {
        let mut rig = Rig::new();
        rig.fire(0, CARD_A, EventKind::DragStart { x: 50.0, y: 75.0 });
        rig.fire(10, None, EventKind::DragOver { x: 400.0, y: 300.0 });
        rig.fire(20, None, EventKind::Drop { x: 400.0, y: 300.0 });
        rig.fire(25, None, EventKind::DragEnd { x: 400.0, y: 300.0 });
        rig.frame();
        rig.frame();
        rig.fire(40, None, EventKind::DragEnd { x: 400.0, y: 300.0 });

        assert_eq!(rig.outcomes.len(), 1);
        assert_eq!(rig.outcomes[0].target.value, "div.column:nth-of-type(2)");
    }

    #[test]
    fn test_dragend_without_drop_uses_last_hit() {
        let mut rig = Rig::new();
        rig.fire(0, CARD_A, EventKind::DragStart { x: 50.0, y: 75.0 });
        rig.fire(10, None, EventKind::DragEnter { x: 400.0, y: 300.0 });
        rig.fire(20, None, EventKind::DragEnd { x: 900.0, y: 700.0 });

        assert_eq!(rig.outcomes.len(), 1);
        assert_eq!(rig.outcomes[0].target.value, "div.column:nth-of-type(2)");
        assert!(!rig.scheduler.has_frame_requests());
    }

    #[test]
    fn test_native_start_abandons_synthetic_gesture() {
        let mut rig = Rig::new();
        rig.fire(0, CARD_A, EventKind::PointerDown { x: 50.0, y: 75.0 });
        rig.fire(5, None, EventKind::PointerMove { x: 100.0, y: 120.0 });
        rig.fire(6, Some("li.card:nth-of-type(2)"), EventKind::DragStart { x: 100.0, y: 130.0 });
        rig.fire(10, None, EventKind::PointerUp { x: 400.0, y: 300.0 });
        assert!(!rig.scheduler.has_frame_requests());

        rig.fire(20, None, EventKind::Drop { x: 400.0, y: 300.0 });
        rig.frame();
        rig.frame();
        assert_eq!(rig.outcomes.len(), 1);
        assert_eq!(rig.outcomes[0].source.value, "li.card:nth-of-type(2)");
    }

    #[test]
    fn test_drop_outside_any_container_is_discarded() {
        let mut rig = Rig::new();
        rig.fire(0, CARD_A, EventKind::DragStart { x: 50.0, y: 75.0 });
        rig.fire(10, None, EventKind::Drop { x: 900.0, y: 700.0 });
        rig.fire(20, None, EventKind::DragEnd { x: 900.0, y: 700.0 });

        assert!(rig.outcomes.is_empty());
        assert_eq!(rig.engine.phase(), DragPhase::Idle);
    }

    #[test]
    fn test_refinement_prefers_deeper_settled_target() {
        let mut rig = Rig::new();
        rig.fire(0, CARD_A, EventKind::DragStart { x: 50.0, y: 75.0 });
        rig.fire(10, None, EventKind::Drop { x: 400.0, y: 300.0 });

        // The list reflows and a card lands under the release point
        rig.doc = Document::parse(&BOARD.replace(
            r#"<ul class="sortable-list" data-bounds="[360,50][640,590]"></ul>"#,
            r#"<ul class="sortable-list" data-bounds="[360,50][640,590]">
                 <li class="card done" draggable="true" data-bounds="[360,280][640,320]">Card Z</li>
               </ul>"#,
        ))
        .unwrap();
        rig.frame();
        rig.frame();

        assert_eq!(rig.outcomes.len(), 1);
        assert_eq!(rig.outcomes[0].target.value, "li.card.done");
        assert_eq!(rig.outcomes[0].container.value, "div.column:nth-of-type(2)");
    }
}
