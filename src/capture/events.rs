use serde::{Deserialize, Serialize};

use crate::dom::NodeId;
use crate::ledger::DialogKind;

/// A file picked in a file input
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectedFile {
    pub name: String,
    /// Size in bytes
    pub size: u64,
}

/// New value reported by a form control's `change` signal
#[derive(Debug, Clone, PartialEq)]
pub enum ControlChange {
    Selected {
        value: String,
        label: Option<String>,
    },
    Toggled {
        checked: bool,
    },
    Slider {
        value: f64,
        min: f64,
        max: f64,
        step: f64,
    },
    Files(Vec<SelectedFile>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum EventKind {
    Click,
    Input {
        value: String,
        is_composing: bool,
    },
    CompositionStart,
    CompositionEnd {
        value: String,
    },
    KeyDown {
        key: String,
    },
    FocusOut {
        value: Option<String>,
    },
    Change(ControlChange),
    Hover {
        dwell_ms: u64,
    },
    PointerDown {
        x: f64,
        y: f64,
    },
    PointerMove {
        x: f64,
        y: f64,
    },
    PointerUp {
        x: f64,
        y: f64,
    },
    DragStart {
        x: f64,
        y: f64,
    },
    DragEnter {
        x: f64,
        y: f64,
    },
    DragOver {
        x: f64,
        y: f64,
    },
    Drop {
        x: f64,
        y: f64,
    },
    DragEnd {
        x: f64,
        y: f64,
    },
    NodesInserted {
        nodes: Vec<NodeId>,
    },
    Dialog {
        kind: DialogKind,
        message: String,
        accepted: bool,
        response: Option<String>,
    },
    Download {
        url: String,
        file_name: Option<String>,
    },
}

/// A raw signal from the document runtime.
///
/// `target` indexes the snapshot handed over with the event and is only
/// valid for that call.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureEvent {
    pub timestamp_ms: u64,
    pub target: Option<NodeId>,
    pub kind: EventKind,
}

impl CaptureEvent {
    pub fn new(timestamp_ms: u64, target: Option<NodeId>, kind: EventKind) -> Self {
        Self {
            timestamp_ms,
            target,
            kind,
        }
    }

    /// An event without a target node (pointer moves, dialogs, downloads)
    pub fn page(timestamp_ms: u64, kind: EventKind) -> Self {
        Self::new(timestamp_ms, None, kind)
    }
}
