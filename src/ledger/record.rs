use serde::{Deserialize, Serialize};

use crate::dom::{Document, NodeId};
use crate::locator::{Locator, LocatorKind};

/// Lightweight identity of the element an action touched
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementSnapshot {
    pub tag: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,
}

impl ElementSnapshot {
    pub fn capture(doc: &Document, node: NodeId) -> Self {
        let owned = |name: &str| doc.non_empty_attr(node, name).map(str::to_string);
        Self {
            tag: doc.tag(node).to_string(),
            id: owned("id"),
            name: owned("name"),
            class_name: owned("class"),
        }
    }
}

/// How a drop container was recognised
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ContainerKind {
    DropZone,
    MultiItem,
    Column,
    List,
    Region,
    Generic,
    Raw,
    /// A distinct draggable item under the drop point
    Item,
}

impl ContainerKind {
    /// Ranking used when several containers sit under the drop point
    pub fn priority(&self) -> u8 {
        match self {
            ContainerKind::DropZone => 5,
            ContainerKind::MultiItem | ContainerKind::Column => 4,
            ContainerKind::List | ContainerKind::Region => 3,
            ContainerKind::Generic => 2,
            ContainerKind::Raw | ContainerKind::Item => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DialogKind {
    Alert,
    Confirm,
    Prompt,
    BeforeUnload,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MarkerKind {
    Start,
    End,
}

/// Action-specific payload of a ledger record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all_fields = "camelCase")]
pub enum Action {
    Click,
    Input {
        value: String,
    },
    Select {
        value: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        label: Option<String>,
    },
    Checkbox {
        value: bool,
    },
    Radio {
        value: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        group: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        option_value: Option<String>,
    },
    Upload {
        file_names: Vec<String>,
    },
    Slider {
        value: f64,
        min: f64,
        max: f64,
        /// Serialized as `stepSize`; `step` is the record's own position
        step_size: f64,
    },
    Hover {
        value: String,
    },
    DragAndDrop {
        source_selector: String,
        target_selector: String,
        container_selector: String,
        container_kind: ContainerKind,
    },
    Dialog {
        dialog_kind: DialogKind,
        message: String,
        accepted: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        response: Option<String>,
    },
    Download {
        url: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        file_name: Option<String>,
    },
    SessionMarker {
        marker: MarkerKind,
        recording_id: String,
    },
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Action::Click => "Click",
            Action::Input { .. } => "Input",
            Action::Select { .. } => "Select",
            Action::Checkbox { .. } => "Checkbox",
            Action::Radio { .. } => "Radio",
            Action::Upload { .. } => "Upload",
            Action::Slider { .. } => "Slider",
            Action::Hover { .. } => "Hover",
            Action::DragAndDrop { .. } => "DragAndDrop",
            Action::Dialog { .. } => "Dialog",
            Action::Download { .. } => "Download",
            Action::SessionMarker { .. } => "SessionMarker",
        }
    }

    /// Human-readable value, if the action carries one
    pub fn display_value(&self) -> Option<String> {
        match self {
            Action::Click => None,
            Action::Input { value } | Action::Select { value, .. } | Action::Hover { value } => {
                Some(value.clone())
            }
            Action::Checkbox { value } | Action::Radio { value, .. } => Some(value.to_string()),
            Action::Upload { file_names } => Some(file_names.join(", ")),
            Action::Slider { value, .. } => Some(value.to_string()),
            Action::DragAndDrop {
                target_selector, ..
            } => Some(target_selector.clone()),
            Action::Dialog { message, .. } => Some(message.clone()),
            Action::Download { url, .. } => Some(url.clone()),
            Action::SessionMarker { marker, .. } => Some(
                match marker {
                    MarkerKind::Start => "start",
                    MarkerKind::End => "end",
                }
                .to_string(),
            ),
        }
    }

    /// Field values that supersede each other per selector
    pub fn is_field_value(&self) -> bool {
        matches!(
            self,
            Action::Input { .. } | Action::Checkbox { .. } | Action::Radio { .. }
        )
    }

    pub fn recording_id(&self) -> Option<&str> {
        match self {
            Action::SessionMarker { recording_id, .. } => Some(recording_id.as_str()),
            _ => None,
        }
    }
}

/// One step of the action ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionRecord {
    /// 1-based, contiguous; assigned by the ledger
    pub step: usize,
    /// Host clock, milliseconds
    pub timestamp: u64,
    /// Empty for page-level actions (dialogs, downloads, markers)
    pub selector: String,
    pub selector_kind: LocatorKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub element: Option<ElementSnapshot>,
    #[serde(flatten)]
    pub action: Action,
}

impl ActionRecord {
    /// A record for an element-level action; the step is set on append
    pub fn for_element(
        locator: &Locator,
        element: Option<ElementSnapshot>,
        timestamp: u64,
        action: Action,
    ) -> Self {
        Self {
            step: 0,
            timestamp,
            selector: locator.value.clone(),
            selector_kind: locator.kind,
            element,
            action,
        }
    }

    /// A record not tied to any element
    pub fn page_level(timestamp: u64, action: Action) -> Self {
        Self {
            step: 0,
            timestamp,
            selector: String::new(),
            selector_kind: LocatorKind::Css,
            element: None,
            action,
        }
    }
}
