//! Drag-oriented locator variant
//!
//! Drag-and-drop libraries stamp stable ids on items and containers; those
//! survive reordering far better than positions, so they are tried first.

use super::literal::css_string;
use super::{Locator, Strategy, Synthesizer};
use crate::dom::NodeId;

/// Library attributes, most specific first
pub const DRAG_LOCATOR_ATTRS: &[&str] = &[
    "data-rbd-draggable-id",
    "data-rfd-draggable-id",
    "data-rbd-droppable-id",
    "data-rfd-droppable-id",
    "data-sortable-id",
    "data-drag-id",
    "data-item-id",
    "data-column-id",
    "data-id",
];

impl Synthesizer<'_> {
    /// Synthesize a locator for a drag source or drop target
    pub fn synthesize_for_drag(&self, node: NodeId) -> Locator {
        let Some(element) = self.doc.element_of(node) else {
            return self.synthesize(node);
        };

        for attr in DRAG_LOCATOR_ATTRS {
            if let Some(value) = self.attr_value(element, attr) {
                let locator = Locator::css(
                    format!("[{}={}]", attr, css_string(value)),
                    Strategy::DragAttribute,
                );
                if self.is_unique(&locator, element) {
                    return self.finish(locator);
                }
            }
        }

        // Drag elements are already the semantic target; no leaf promotion
        self.cascade(element, element)
    }
}
