//! Replay scripts
//!
//! A YAML list of host events that drives a recording session offline.
//! Events name their target by selector; `snapshot` swaps the document the
//! following events refer to and `frame` delivers animation frames.
//!
//! ```yaml
//! - { type: input, at: 0, target: "#user", value: alice }
//! - { type: click, at: 900, target: "button[type=submit]" }
//! - { type: snapshot, path: after-login.html }
//! - { type: frame, count: 2 }
//! ```

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::Path;

use crate::capture::{CaptureEvent, ControlChange, EventKind, SelectedFile};
use crate::dom::{Document, NodeId};
use crate::ledger::DialogKind;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ScriptStep {
    Click {
        target: String,
    },
    Input {
        target: String,
        value: String,
        #[serde(default)]
        composing: bool,
    },
    CompositionStart {
        target: String,
    },
    CompositionEnd {
        target: String,
        value: String,
    },
    KeyDown {
        key: String,
        #[serde(default)]
        target: Option<String>,
    },
    FocusOut {
        target: String,
        #[serde(default)]
        value: Option<String>,
    },
    Select {
        target: String,
        value: String,
        #[serde(default)]
        label: Option<String>,
    },
    Toggle {
        target: String,
        checked: bool,
    },
    Slider {
        target: String,
        value: f64,
        min: f64,
        max: f64,
        #[serde(default = "default_slider_step")]
        step: f64,
    },
    Upload {
        target: String,
        files: Vec<SelectedFile>,
    },
    Hover {
        target: String,
        dwell: u64,
    },
    PointerDown {
        target: String,
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
        target: String,
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
    Inserted {
        targets: Vec<String>,
    },
    Dialog {
        kind: DialogKind,
        message: String,
        #[serde(default = "default_true")]
        accepted: bool,
        #[serde(default)]
        response: Option<String>,
    },
    Download {
        url: String,
        #[serde(default)]
        file_name: Option<String>,
    },
    /// Replace the current document with another snapshot
    Snapshot {
        path: String,
    },
    /// Deliver animation frames
    Frame {
        #[serde(default = "default_frame_count")]
        count: u32,
    },
    /// Only move the clock
    Wait,
}

fn default_slider_step() -> f64 {
    1.0
}

fn default_true() -> bool {
    true
}

fn default_frame_count() -> u32 {
    1
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ScriptEntry {
    /// Host clock in milliseconds; omitted entries keep the previous time
    #[serde(default)]
    pub at: Option<u64>,
    #[serde(flatten)]
    pub step: ScriptStep,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ReplayScript {
    pub name: Option<String>,
    /// Wrap the run in a pair of session markers
    pub session_markers: bool,
    pub steps: Vec<ScriptEntry>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ScriptFile {
    Steps(Vec<ScriptEntry>),
    Full {
        #[serde(default)]
        name: Option<String>,
        #[serde(default, rename = "sessionMarkers")]
        session_markers: bool,
        steps: Vec<ScriptEntry>,
    },
}

/// Parse a replay script file
pub fn parse_script_file(path: &Path) -> Result<ReplayScript> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read script: {}", path.display()))?;
    parse_script(&content).with_context(|| format!("Invalid script: {}", path.display()))
}

/// Parse script content: either a bare list of steps or a map with `steps`
pub fn parse_script(content: &str) -> Result<ReplayScript> {
    let file: ScriptFile =
        serde_yaml::from_str(content).context("Failed to parse YAML content")?;

    Ok(match file {
        ScriptFile::Steps(steps) => ReplayScript {
            steps,
            ..Default::default()
        },
        ScriptFile::Full {
            name,
            session_markers,
            steps,
        } => ReplayScript {
            name,
            session_markers,
            steps,
        },
    })
}

/// Load a document snapshot from disk
pub fn load_document(path: &Path) -> Result<Document> {
    let markup = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read document: {}", path.display()))?;
    Document::parse(&markup).with_context(|| format!("Failed to parse document: {}", path.display()))
}

fn node(doc: &Document, selector: &str) -> Result<NodeId> {
    match doc.find(selector)? {
        Some(node) => Ok(node),
        None => bail!("Selector matched nothing: {}", selector),
    }
}

impl ScriptStep {
    /// Build the host event for this step against the current document.
    /// Returns `None` for steps that are not events (snapshot, frame, wait).
    pub fn to_event(&self, doc: &Document, at: u64) -> Result<Option<CaptureEvent>> {
        let on = |selector: &str, kind: EventKind| -> Result<Option<CaptureEvent>> {
            Ok(Some(CaptureEvent::new(at, Some(node(doc, selector)?), kind)))
        };
        let page = |kind: EventKind| -> Result<Option<CaptureEvent>> {
            Ok(Some(CaptureEvent::page(at, kind)))
        };

        match self {
            ScriptStep::Click { target } => on(target, EventKind::Click),
            ScriptStep::Input {
                target,
                value,
                composing,
            } => on(
                target,
                EventKind::Input {
                    value: value.clone(),
                    is_composing: *composing,
                },
            ),
            ScriptStep::CompositionStart { target } => on(target, EventKind::CompositionStart),
            ScriptStep::CompositionEnd { target, value } => on(
                target,
                EventKind::CompositionEnd {
                    value: value.clone(),
                },
            ),
            ScriptStep::KeyDown { key, target } => {
                let kind = EventKind::KeyDown { key: key.clone() };
                match target {
                    Some(target) => on(target, kind),
                    None => page(kind),
                }
            }
            ScriptStep::FocusOut { target, value } => on(
                target,
                EventKind::FocusOut {
                    value: value.clone(),
                },
            ),
            ScriptStep::Select {
                target,
                value,
                label,
            } => on(
                target,
                EventKind::Change(ControlChange::Selected {
                    value: value.clone(),
                    label: label.clone(),
                }),
            ),
            ScriptStep::Toggle { target, checked } => on(
                target,
                EventKind::Change(ControlChange::Toggled { checked: *checked }),
            ),
            ScriptStep::Slider {
                target,
                value,
                min,
                max,
                step,
            } => on(
                target,
                EventKind::Change(ControlChange::Slider {
                    value: *value,
                    min: *min,
                    max: *max,
                    step: *step,
                }),
            ),
            ScriptStep::Upload { target, files } => on(
                target,
                EventKind::Change(ControlChange::Files(files.clone())),
            ),
            ScriptStep::Hover { target, dwell } => {
                on(target, EventKind::Hover { dwell_ms: *dwell })
            }
            ScriptStep::PointerDown { target, x, y } => {
                on(target, EventKind::PointerDown { x: *x, y: *y })
            }
            ScriptStep::PointerMove { x, y } => page(EventKind::PointerMove { x: *x, y: *y }),
            ScriptStep::PointerUp { x, y } => page(EventKind::PointerUp { x: *x, y: *y }),
            ScriptStep::DragStart { target, x, y } => {
                on(target, EventKind::DragStart { x: *x, y: *y })
            }
            ScriptStep::DragEnter { x, y } => page(EventKind::DragEnter { x: *x, y: *y }),
            ScriptStep::DragOver { x, y } => page(EventKind::DragOver { x: *x, y: *y }),
            ScriptStep::Drop { x, y } => page(EventKind::Drop { x: *x, y: *y }),
            ScriptStep::DragEnd { x, y } => page(EventKind::DragEnd { x: *x, y: *y }),
            ScriptStep::Inserted { targets } => {
                let nodes = targets
                    .iter()
                    .map(|t| node(doc, t))
                    .collect::<Result<Vec<_>>>()?;
                page(EventKind::NodesInserted { nodes })
            }
            ScriptStep::Dialog {
                kind,
                message,
                accepted,
                response,
            } => page(EventKind::Dialog {
                kind: *kind,
                message: message.clone(),
                accepted: *accepted,
                response: response.clone(),
            }),
            ScriptStep::Download { url, file_name } => page(EventKind::Download {
                url: url.clone(),
                file_name: file_name.clone(),
            }),
            ScriptStep::Snapshot { .. } | ScriptStep::Frame { .. } | ScriptStep::Wait => Ok(None),
        }
    }
}
