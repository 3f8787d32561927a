//! Drop target resolution
//!
//! Looks at the whole element stack under the release point, not just the
//! topmost element, and ranks container candidates by how likely they are to
//! be the intended drop surface.

use std::cmp::Reverse;

use crate::dom::semantics;
use crate::dom::{Document, NodeId};
use crate::ledger::ContainerKind;
use crate::locator::{Locator, Synthesizer};
use crate::utils::config::DragConfig;

/// Class fragments of drag feedback layers (ghosts, placeholders, mirrors)
const TRANSIENT_LAYER_MARKERS: &[&str] =
    &["ghost", "preview", "placeholder", "overlay", "mirror", "clone"];

/// State classes that only make the element itself transient
const TRANSIENT_STATE_MARKERS: &[&str] = &["dragging", "chosen"];

const COLUMN_MARKERS: &[&str] = &["column", "lane", "swimlane", "bucket"];
const LIST_ROLES: &[&str] = &["list", "listbox", "grid"];
const REGION_TAGS: &[&str] = &["section", "article", "aside", "main", "form", "fieldset"];
const REGION_ROLES: &[&str] = &["region", "tabpanel"];

/// A resolved drop: the container and the most specific distinct target in it
#[derive(Debug, Clone, PartialEq)]
pub struct DropTarget {
    pub container: Locator,
    pub container_kind: ContainerKind,
    pub target: Locator,
    /// Tree depth of the target element
    pub depth: usize,
}

fn class_contains(doc: &Document, node: NodeId, markers: &[&str]) -> bool {
    doc.classes(node).any(|c| {
        let c = c.to_lowercase();
        markers.iter().any(|m| c.contains(m))
    })
}

/// Drag feedback layers and hidden elements never receive drops
pub fn is_transient(doc: &Document, node: NodeId) -> bool {
    if class_contains(doc, node, TRANSIENT_STATE_MARKERS) {
        return true;
    }
    std::iter::once(node).chain(doc.ancestors(node)).any(|n| {
        doc.attr(n, "aria-hidden") == Some("true") || class_contains(doc, n, TRANSIENT_LAYER_MARKERS)
    })
}

fn is_column(doc: &Document, node: NodeId) -> bool {
    doc.has_attr(node, "data-column-id")
        || doc.classes(node).any(|c| {
            let c = c.to_lowercase();
            COLUMN_MARKERS
                .iter()
                .any(|m| c.split(['-', '_']).any(|part| part == *m))
        })
}

pub fn classify(doc: &Document, node: NodeId) -> ContainerKind {
    if semantics::is_drop_zone(doc, node) {
        return ContainerKind::DropZone;
    }

    let draggable_children = doc
        .element_children(node)
        .filter(|c| semantics::is_draggable(doc, *c))
        .count();
    if draggable_children >= 2 {
        return ContainerKind::MultiItem;
    }
    if is_column(doc, node) {
        return ContainerKind::Column;
    }

    let tag = doc.tag(node);
    let role = doc.attr(node, "role").unwrap_or_default();
    if matches!(tag, "ul" | "ol")
        || LIST_ROLES.contains(&role)
        || class_contains(doc, node, &["list"])
    {
        return ContainerKind::List;
    }
    if REGION_TAGS.contains(&tag) || REGION_ROLES.contains(&role) {
        return ContainerKind::Region;
    }
    if tag == "div" {
        return ContainerKind::Generic;
    }
    ContainerKind::Raw
}

/// Resolve the drop target under a point for a gesture started on `source`
pub fn resolve_drop_target(
    doc: &Document,
    synth: &Synthesizer<'_>,
    config: &DragConfig,
    source: &Locator,
    x: f64,
    y: f64,
) -> Option<DropTarget> {
    // The source may have moved since the gesture started
    let source_node = doc.resolve_unique(&source.value, source.kind);

    let stack: Vec<NodeId> = doc
        .elements_at(x, y)
        .into_iter()
        .filter(|n| {
            doc.depth(*n) >= config.min_target_depth
                && Some(*n) != source_node
                && !source_node.is_some_and(|s| doc.is_descendant_of(*n, s))
                && !is_transient(doc, *n)
        })
        .collect();

    let acceptable = |node: NodeId| {
        let locator = synth.synthesize_for_drag(node);
        (!locator.is_weak() && !locator.same_target(source)).then_some(locator)
    };

    // Stable sort keeps the topmost candidate first among equal priorities
    let mut ranked: Vec<(NodeId, ContainerKind)> =
        stack.iter().map(|n| (*n, classify(doc, *n))).collect();
    ranked.sort_by_key(|(_, kind)| Reverse(kind.priority()));
    let container = ranked
        .into_iter()
        .find_map(|(node, kind)| acceptable(node).map(|locator| (node, kind, locator)));

    let item = stack
        .iter()
        .copied()
        .filter(|n| semantics::is_draggable(doc, *n))
        .filter(|n| container.as_ref().map_or(true, |(c, _, _)| c != n))
        .find_map(|node| acceptable(node).map(|locator| (node, locator)));

    match (container, item) {
        (Some((_, kind, container)), Some((node, target))) => Some(DropTarget {
            container,
            container_kind: kind,
            target,
            depth: doc.depth(node),
        }),
        (Some((node, kind, container)), None) => Some(DropTarget {
            target: container.clone(),
            container,
            container_kind: kind,
            depth: doc.depth(node),
        }),
        (None, Some((node, target))) => Some(DropTarget {
            container: target.clone(),
            target,
            container_kind: ContainerKind::Item,
            depth: doc.depth(node),
        }),
        (None, None) => None,
    }
}
