//! Element semantics shared by capture and drag resolution

use super::{Document, NodeId};

/// Leaf tags that are decoration inside a control rather than the control itself
const WRAPPER_LEAF_TAGS: &[&str] = &[
    "i", "svg", "path", "use", "g", "circle", "rect", "polygon", "line", "span", "em", "strong",
    "b", "small", "img",
];

const INTERACTIVE_ROLES: &[&str] = &[
    "button", "link", "combobox", "menuitem", "menuitemcheckbox", "menuitemradio", "tab",
    "checkbox", "radio", "option", "switch", "treeitem",
];

/// Attributes drag-and-drop libraries put on draggable items
pub const DRAG_ITEM_ATTRS: &[&str] = &[
    "data-rbd-draggable-id",
    "data-rfd-draggable-id",
    "data-sortable-id",
    "data-drag-id",
    "data-draggable",
];

/// Attributes drag-and-drop libraries put on drop containers
pub const DROP_ZONE_ATTRS: &[&str] = &[
    "data-rbd-droppable-id",
    "data-rfd-droppable-id",
    "data-droppable",
    "data-drop-zone",
    "dropzone",
];

const DRAG_ITEM_CLASS_MARKERS: &[&str] = &[
    "draggable",
    "sortable-item",
    "dnd-item",
    "drag-item",
    "kanban-item",
];

const AUTOCOMPLETE_CLASS_MARKERS: &[&str] = &[
    "autocomplete",
    "typeahead",
    "combobox",
    "select2-search__field",
    "tt-input",
];

const TEXT_INPUT_TYPES: &[&str] = &["text", "email", "password", "search", "tel", "url", "number"];

/// What a form control reports when its value changes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlKind {
    Select,
    Checkbox,
    Radio,
    Range,
    File,
    Text,
    Other,
}

fn input_type(doc: &Document, id: NodeId) -> String {
    doc.attr(id, "type")
        .map(|t| t.trim().to_lowercase())
        .unwrap_or_else(|| "text".to_string())
}

pub fn control_kind(doc: &Document, id: NodeId) -> ControlKind {
    match doc.tag(id) {
        "select" => ControlKind::Select,
        "textarea" => ControlKind::Text,
        "input" => match input_type(doc, id).as_str() {
            "checkbox" => ControlKind::Checkbox,
            "radio" => ControlKind::Radio,
            "range" => ControlKind::Range,
            "file" => ControlKind::File,
            t if TEXT_INPUT_TYPES.contains(&t) => ControlKind::Text,
            _ => ControlKind::Other,
        },
        _ if is_content_editable(doc, id) => ControlKind::Text,
        _ => ControlKind::Other,
    }
}

fn is_content_editable(doc: &Document, id: NodeId) -> bool {
    matches!(doc.attr(id, "contenteditable"), Some("") | Some("true"))
}

pub fn is_text_control(doc: &Document, id: NodeId) -> bool {
    control_kind(doc, id) == ControlKind::Text
}

/// Whether a click on this element is a meaningful action by itself
pub fn is_interactive(doc: &Document, id: NodeId) -> bool {
    if !doc.is_element(id) {
        return false;
    }

    match doc.tag(id) {
        "button" | "select" | "textarea" | "summary" | "option" => return true,
        "a" if doc.has_attr(id, "href") => return true,
        "input" if input_type(doc, id) != "hidden" => return true,
        _ => {}
    }

    if let Some(role) = doc.attr(id, "role") {
        if INTERACTIVE_ROLES.contains(&role.trim().to_lowercase().as_str()) {
            return true;
        }
    }

    if doc.has_attr(id, "onclick") {
        return true;
    }

    doc.attr(id, "tabindex")
        .and_then(|t| t.trim().parse::<i32>().ok())
        .is_some_and(|t| t >= 0)
}

/// Icon glyphs, vector shapes and inline spans that sit inside a control
pub fn is_wrapper_leaf(doc: &Document, id: NodeId) -> bool {
    WRAPPER_LEAF_TAGS.contains(&doc.tag(id)) && !is_interactive(doc, id)
}

/// Nearest interactive element, starting with `id` itself
pub fn clickable_ancestor(doc: &Document, id: NodeId) -> Option<NodeId> {
    doc.closest(id, |n| is_interactive(doc, n))
}

/// Nearest `<a href>` starting with `id` itself
pub fn closest_anchor(doc: &Document, id: NodeId) -> Option<NodeId> {
    doc.closest(id, |n| doc.tag(n) == "a" && doc.has_attr(n, "href"))
}

/// Marked draggable by a drag-and-drop library rather than natively
pub fn is_library_drag_item(doc: &Document, id: NodeId) -> bool {
    DRAG_ITEM_ATTRS.iter().any(|a| doc.has_attr(id, a))
        || doc
            .classes(id)
            .any(|c| DRAG_ITEM_CLASS_MARKERS.contains(&c.to_lowercase().as_str()))
}

pub fn is_draggable(doc: &Document, id: NodeId) -> bool {
    if doc.attr(id, "draggable") == Some("true") {
        return true;
    }
    let aria_draggable = doc
        .attr(id, "aria-roledescription")
        .is_some_and(|r| r.eq_ignore_ascii_case("draggable"))
        || doc.has_attr(id, "aria-grabbed");
    aria_draggable || is_library_drag_item(doc, id)
}

/// Nearest element with draggable semantics, starting with `id` itself
pub fn draggable_ancestor(doc: &Document, id: NodeId) -> Option<NodeId> {
    doc.closest(id, |n| is_draggable(doc, n))
}

pub fn is_drop_zone(doc: &Document, id: NodeId) -> bool {
    DROP_ZONE_ATTRS.iter().any(|a| doc.has_attr(id, a))
        || doc.classes(id).any(|c| {
            let c = c.to_lowercase();
            c == "droppable" || c == "dropzone" || c == "drop-zone"
        })
}

/// Inputs whose value is picked from a suggestion list while typing
pub fn is_autocomplete(doc: &Document, id: NodeId) -> bool {
    if !is_text_control(doc, id) {
        return false;
    }

    if matches!(
        doc.attr(id, "aria-autocomplete").map(str::to_lowercase).as_deref(),
        Some("list") | Some("both") | Some("inline")
    ) {
        return true;
    }
    if doc.attr(id, "aria-haspopup") == Some("listbox") || doc.has_attr(id, "list") {
        return true;
    }

    // The combobox role may sit on the input or on its immediate wrapper
    let combobox = std::iter::once(id)
        .chain(doc.ancestors(id).take(2))
        .any(|n| doc.attr(n, "role") == Some("combobox"));
    if combobox {
        return true;
    }

    if doc.classes(id).any(|c| {
        let c = c.to_lowercase();
        AUTOCOMPLETE_CLASS_MARKERS.iter().any(|m| c.contains(m))
    }) {
        return true;
    }

    is_width_collapsed(doc, id)
}

/// A near-zero-width input behind a visible wrapper (select2, chips inputs)
fn is_width_collapsed(doc: &Document, id: NodeId) -> bool {
    let Some(own) = doc.bounds(id) else {
        return false;
    };
    if own.width() > 2.0 {
        return false;
    }
    doc.parent(id)
        .and_then(|p| doc.bounds(p))
        .is_some_and(|b| b.width() > 20.0 && b.height() > 0.0)
}
