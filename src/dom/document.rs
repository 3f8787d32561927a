//! Document snapshot parsed from (X)HTML markup.
//!
//! The host hands a `Document` to every handler together with the event that
//! triggered it. `NodeId`s index into that snapshot only; anything that must
//! outlive a handler is carried as a locator string and re-resolved.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use regex::Regex;
use std::sync::LazyLock;

use super::css::CssSelector;
use super::xpath::XPathExpr;
use super::DomError;
use crate::locator::{Locator, LocatorKind};

/// Elements that never have children in HTML, even when written without `/>`
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

/// Attribute carrying layout geometry in a snapshot
pub const BOUNDS_ATTR: &str = "data-bounds";

static DECIMAL_ENTITY: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"&#(\d+);").unwrap());
static HEX_ENTITY: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"&#[xX]([0-9A-Fa-f]+);").unwrap());

/// Decode common HTML entities in a string
fn decode_html_entities(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }

    let mut result = s
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&nbsp;", "\u{00A0}");

    result = DECIMAL_ENTITY
        .replace_all(&result, |caps: &regex::Captures| {
            caps[1]
                .parse::<u32>()
                .ok()
                .and_then(char::from_u32)
                .map(|c| c.to_string())
                .unwrap_or_else(|| caps[0].to_string())
        })
        .to_string();

    result = HEX_ENTITY
        .replace_all(&result, |caps: &regex::Captures| {
            u32::from_str_radix(&caps[1], 16)
                .ok()
                .and_then(char::from_u32)
                .map(|c| c.to_string())
                .unwrap_or_else(|| caps[0].to_string())
        })
        .to_string();

    // Last so that "&amp;lt;" decodes to "&lt;" and not "<"
    result.replace("&amp;", "&")
}

/// Layout box of an element, in document pixels
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Bounds {
    pub left: f64,
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
}

impl Bounds {
    /// Get the center point of the bounds
    pub fn center(&self) -> (f64, f64) {
        ((self.left + self.right) / 2.0, (self.top + self.bottom) / 2.0)
    }

    pub fn width(&self) -> f64 {
        self.right - self.left
    }

    pub fn height(&self) -> f64 {
        self.bottom - self.top
    }

    /// Check if a point lies inside (edges inclusive)
    pub fn contains_point(&self, x: f64, y: f64) -> bool {
        x >= self.left && x <= self.right && y >= self.top && y <= self.bottom
    }

    /// Parse bounds from string like "[0,0][1080,1920]"
    pub fn from_string(s: &str) -> Option<Self> {
        let parts: Vec<&str> = s.trim().split("][").collect();
        if parts.len() != 2 {
            return None;
        }

        let left_top = parts[0].trim_start_matches('[');
        let right_bottom = parts[1].trim_end_matches(']');

        let lt: Vec<f64> = left_top
            .split(',')
            .filter_map(|s| s.trim().parse().ok())
            .collect();
        let rb: Vec<f64> = right_bottom
            .split(',')
            .filter_map(|s| s.trim().parse().ok())
            .collect();

        if lt.len() == 2 && rb.len() == 2 {
            Some(Bounds {
                left: lt[0],
                top: lt[1],
                right: rb[0],
                bottom: rb[1],
            })
        } else {
            None
        }
    }
}

/// Index of a node inside one `Document` snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

#[derive(Debug, Clone)]
pub(crate) enum NodeData {
    /// Synthetic parent of the root element
    Document,
    Element {
        tag: String,
        attrs: Vec<(String, String)>,
        bounds: Option<Bounds>,
    },
    Text(String),
}

#[derive(Debug, Clone)]
pub(crate) struct Node {
    pub(crate) data: NodeData,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
}

/// Owned snapshot of a document tree
#[derive(Debug, Clone)]
pub struct Document {
    pub(crate) nodes: Vec<Node>,
}

impl Document {
    /// Parse markup into a document snapshot
    pub fn parse(markup: &str) -> Result<Self, DomError> {
        let mut doc = Document {
            nodes: vec![Node {
                data: NodeData::Document,
                parent: None,
                children: Vec::new(),
            }],
        };

        let mut reader = Reader::from_str(markup);
        reader.trim_text(false);
        reader.check_end_names(false);

        // Open elements, innermost last
        let mut stack: Vec<NodeId> = vec![NodeId(0)];
        let mut buf = Vec::new();

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(ref e)) => {
                    let parent = *stack.last().unwrap_or(&NodeId(0));
                    let id = doc.push_element(parent, e);
                    if !VOID_ELEMENTS.contains(&doc.tag(id)) {
                        stack.push(id);
                    }
                }
                Ok(Event::Empty(ref e)) => {
                    let parent = *stack.last().unwrap_or(&NodeId(0));
                    doc.push_element(parent, e);
                }
                Ok(Event::End(ref e)) => {
                    let name = String::from_utf8_lossy(e.name().as_ref()).to_lowercase();
                    if VOID_ELEMENTS.contains(&name.as_str()) {
                        // </input> and friends close nothing
                    } else if let Some(pos) = stack.iter().rposition(|id| doc.tag(*id) == name) {
                        stack.truncate(pos.max(1));
                    }
                }
                Ok(Event::Text(ref e)) => {
                    let raw = String::from_utf8_lossy(e);
                    if !raw.is_empty() {
                        let parent = *stack.last().unwrap_or(&NodeId(0));
                        doc.push_node(parent, NodeData::Text(decode_html_entities(&raw)));
                    }
                }
                Ok(Event::CData(ref e)) => {
                    let parent = *stack.last().unwrap_or(&NodeId(0));
                    let text = String::from_utf8_lossy(e).to_string();
                    doc.push_node(parent, NodeData::Text(text));
                }
                Ok(Event::Eof) => break,
                Err(e) => {
                    return Err(DomError::Malformed {
                        position: reader.buffer_position(),
                        reason: e.to_string(),
                    });
                }
                _ => {}
            }
            buf.clear();
        }

        if doc.root_element().is_none() {
            return Err(DomError::Empty);
        }

        Ok(doc)
    }

    fn push_element(&mut self, parent: NodeId, start: &BytesStart) -> NodeId {
        let tag = String::from_utf8_lossy(start.name().as_ref()).to_lowercase();

        let mut attrs: Vec<(String, String)> = Vec::new();
        let mut bounds = None;
        for attr in start.html_attributes().filter_map(|a| a.ok()) {
            let key = String::from_utf8_lossy(attr.key.as_ref()).to_lowercase();
            let value = decode_html_entities(&String::from_utf8_lossy(&attr.value));
            if key == BOUNDS_ATTR {
                bounds = Bounds::from_string(&value);
            }
            if !attrs.iter().any(|(k, _)| *k == key) {
                attrs.push((key, value));
            }
        }

        self.push_node(parent, NodeData::Element { tag, attrs, bounds })
    }

    fn push_node(&mut self, parent: NodeId, data: NodeData) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            data,
            parent: Some(parent),
            children: Vec::new(),
        });
        self.nodes[parent.0].children.push(id);
        id
    }

    /// The document element (normally `<html>`)
    pub fn root_element(&self) -> Option<NodeId> {
        self.nodes[0]
            .children
            .iter()
            .copied()
            .find(|id| self.is_element(*id))
    }

    pub(crate) fn document_node(&self) -> NodeId {
        NodeId(0)
    }

    pub fn is_element(&self, id: NodeId) -> bool {
        matches!(
            self.nodes.get(id.0).map(|n| &n.data),
            Some(NodeData::Element { .. })
        )
    }

    /// Lowercase tag name; empty for non-element nodes
    pub fn tag(&self, id: NodeId) -> &str {
        match self.nodes.get(id.0).map(|n| &n.data) {
            Some(NodeData::Element { tag, .. }) => tag,
            _ => "",
        }
    }

    pub fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
        match self.nodes.get(id.0).map(|n| &n.data) {
            Some(NodeData::Element { attrs, .. }) => attrs
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.as_str()),
            _ => None,
        }
    }

    /// Attribute value, treating empty values as absent
    pub fn non_empty_attr(&self, id: NodeId, name: &str) -> Option<&str> {
        self.attr(id, name)
            .map(str::trim)
            .filter(|v| !v.is_empty())
    }

    pub fn has_attr(&self, id: NodeId, name: &str) -> bool {
        self.attr(id, name).is_some()
    }

    pub fn attrs(&self, id: NodeId) -> &[(String, String)] {
        match self.nodes.get(id.0).map(|n| &n.data) {
            Some(NodeData::Element { attrs, .. }) => attrs,
            _ => &[],
        }
    }

    pub fn classes(&self, id: NodeId) -> impl Iterator<Item = &str> {
        self.attr(id, "class").unwrap_or("").split_whitespace()
    }

    pub fn has_class(&self, id: NodeId, class: &str) -> bool {
        self.classes(id).any(|c| c == class)
    }

    pub fn bounds(&self, id: NodeId) -> Option<Bounds> {
        match self.nodes.get(id.0).map(|n| &n.data) {
            Some(NodeData::Element { bounds, .. }) => *bounds,
            _ => None,
        }
    }

    /// Parent element (the synthetic document node is never returned)
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes
            .get(id.0)
            .and_then(|n| n.parent)
            .filter(|p| self.is_element(*p))
    }

    pub(crate) fn raw_parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(id.0).and_then(|n| n.parent)
    }

    pub(crate) fn children(&self, id: NodeId) -> &[NodeId] {
        self.nodes
            .get(id.0)
            .map(|n| n.children.as_slice())
            .unwrap_or(&[])
    }

    pub fn element_children(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.children(id)
            .iter()
            .copied()
            .filter(move |c| self.is_element(*c))
    }

    /// Ancestor elements, nearest first
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.parent(id), move |p| self.parent(*p))
    }

    /// Nearest element (starting with `id` itself) that satisfies `pred`
    pub fn closest(&self, id: NodeId, pred: impl Fn(NodeId) -> bool) -> Option<NodeId> {
        std::iter::once(id)
            .chain(self.ancestors(id))
            .find(|n| self.is_element(*n) && pred(*n))
    }

    /// The element itself or, for text nodes, its parent element
    pub fn element_of(&self, id: NodeId) -> Option<NodeId> {
        if self.is_element(id) {
            Some(id)
        } else {
            self.parent(id)
        }
    }

    /// Number of elements from the root down to `id` (root element is 1)
    pub fn depth(&self, id: NodeId) -> usize {
        1 + self.ancestors(id).count()
    }

    pub fn is_descendant_of(&self, id: NodeId, ancestor: NodeId) -> bool {
        self.ancestors(id).any(|a| a == ancestor)
    }

    /// All elements in document order
    pub fn elements(&self) -> impl Iterator<Item = NodeId> + '_ {
        (0..self.nodes.len())
            .map(NodeId)
            .filter(move |id| self.is_element(*id))
    }

    /// Descendant elements of `id` in document order (excluding `id`)
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(id).iter().rev().copied().collect();
        while let Some(n) = stack.pop() {
            if self.is_element(n) {
                out.push(n);
                stack.extend(self.children(n).iter().rev().copied());
            }
        }
        out
    }

    /// Concatenated text of all descendant text nodes
    pub fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(id, &mut out);
        out
    }

    fn collect_text(&self, id: NodeId, out: &mut String) {
        match self.nodes.get(id.0).map(|n| &n.data) {
            Some(NodeData::Text(t)) => out.push_str(t),
            Some(NodeData::Element { tag, .. }) if tag == "script" || tag == "style" => {}
            Some(_) => {
                for child in self.children(id) {
                    self.collect_text(*child, out);
                }
            }
            None => {}
        }
    }

    /// Text content with whitespace collapsed, as XPath `normalize-space()` does
    pub fn normalized_text(&self, id: NodeId) -> String {
        normalize_space(&self.text_content(id))
    }

    /// 1-based position among element siblings with the same tag
    pub fn type_index(&self, id: NodeId) -> usize {
        let tag = self.tag(id);
        self.siblings_and_self(id)
            .filter(|s| self.tag(*s) == tag)
            .position(|s| s == id)
            .map(|p| p + 1)
            .unwrap_or(1)
    }

    /// 1-based position among all element siblings
    pub fn child_index(&self, id: NodeId) -> usize {
        self.siblings_and_self(id)
            .position(|s| s == id)
            .map(|p| p + 1)
            .unwrap_or(1)
    }

    /// Whether another element sibling shares this element's tag
    pub fn has_same_tag_sibling(&self, id: NodeId) -> bool {
        let tag = self.tag(id);
        self.siblings_and_self(id)
            .any(|s| s != id && self.tag(s) == tag)
    }

    fn siblings_and_self(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        let parent = self.raw_parent(id).unwrap_or(NodeId(0));
        self.children(parent)
            .iter()
            .copied()
            .filter(move |c| self.is_element(*c))
    }

    /// Full element stack under a point, topmost first.
    ///
    /// Deeper elements paint above their ancestors and later siblings above
    /// earlier ones, so the stack is ordered by depth, then reverse document order.
    pub fn elements_at(&self, x: f64, y: f64) -> Vec<NodeId> {
        let mut hits: Vec<(usize, NodeId)> = self
            .elements()
            .filter(|id| {
                self.bounds(*id)
                    .map(|b| b.contains_point(x, y))
                    .unwrap_or(false)
            })
            .map(|id| (self.depth(id), id))
            .collect();

        hits.sort_by(|a, b| b.0.cmp(&a.0).then(b.1.cmp(&a.1)));
        hits.into_iter().map(|(_, id)| id).collect()
    }

    /// Evaluate a CSS selector against the whole document
    pub fn query_css(&self, selector: &str) -> Result<Vec<NodeId>, DomError> {
        let parsed = CssSelector::parse(selector)?;
        Ok(self.elements().filter(|id| parsed.matches(self, *id)).collect())
    }

    /// Evaluate an XPath location path against the whole document
    pub fn query_xpath(&self, expr: &str) -> Result<Vec<NodeId>, DomError> {
        XPathExpr::parse(expr)?.select(self)
    }

    /// Evaluate a numeric XPath expression such as `count(//a[@href])`
    pub fn count_xpath(&self, expr: &str) -> Result<usize, DomError> {
        XPathExpr::parse(expr)?.count(self)
    }

    /// Find every node a locator currently matches
    pub fn resolve(&self, locator: &Locator) -> Result<Vec<NodeId>, DomError> {
        self.resolve_str(&locator.value, locator.kind)
    }

    pub fn resolve_str(&self, value: &str, kind: LocatorKind) -> Result<Vec<NodeId>, DomError> {
        match kind {
            LocatorKind::Css => self.query_css(value),
            LocatorKind::XPath => self.query_xpath(value),
        }
    }

    /// The single node a locator matches, if it matches exactly one
    pub fn resolve_unique(&self, value: &str, kind: LocatorKind) -> Option<NodeId> {
        match self.resolve_str(value, kind) {
            Ok(nodes) if nodes.len() == 1 => Some(nodes[0]),
            _ => None,
        }
    }

    /// Find the first element matching a selector, guessing its kind
    pub fn find(&self, selector: &str) -> Result<Option<NodeId>, DomError> {
        let kind = LocatorKind::guess(selector);
        Ok(self.resolve_str(selector, kind)?.into_iter().next())
    }
}

/// XPath `normalize-space()`: collapse runs of space, tab, CR and LF and trim.
/// Other whitespace such as NBSP is kept literally, as a browser does.
pub fn normalize_space(s: &str) -> String {
    s.split([' ', '\t', '\r', '\n'])
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<!DOCTYPE html>
<html><head><title>t</title></head>
<body>
  <form id="login">
    <input type="text" name="user">
    <input type="checkbox" id="agree" checked>
    <label for="agree">I agree &amp; accept</label>
    <br>
    <button class="btn primary" data-bounds="[10,10][110,40]"><span data-bounds="[20,15][60,35]">Sign&nbsp;in</span></button>
  </form>
</body></html>"#;

    #[test]
    fn test_parse_void_elements_do_not_nest() {
        let doc = Document::parse(PAGE).unwrap();
        let form = doc.find("#login").unwrap().unwrap();
        let tags: Vec<&str> = doc.element_children(form).map(|c| doc.tag(c)).collect();
        assert_eq!(tags, vec!["input", "input", "label", "br", "button"]);
    }

    #[test]
    fn test_parse_decodes_entities_and_valueless_attrs() {
        let doc = Document::parse(PAGE).unwrap();
        let label = doc.find("label").unwrap().unwrap();
        assert_eq!(doc.normalized_text(label), "I agree & accept");

        let agree = doc.find("#agree").unwrap().unwrap();
        assert!(doc.has_attr(agree, "checked"));

        let button = doc.find("button").unwrap().unwrap();
        assert_eq!(doc.normalized_text(button), "Sign\u{00A0}in");
    }

    #[test]
    fn test_mismatched_end_tag_recovers() {
        let doc = Document::parse("<html><body><div><p>one</div><div>two</div></body></html>")
            .unwrap();
        let divs = doc.query_css("body > div").unwrap();
        assert_eq!(divs.len(), 2);
    }

    #[test]
    fn test_elements_at_returns_topmost_first() {
        let doc = Document::parse(PAGE).unwrap();
        let stack = doc.elements_at(30.0, 20.0);
        let tags: Vec<&str> = stack.iter().map(|id| doc.tag(*id)).collect();
        assert_eq!(tags, vec!["span", "button"]);
        assert!(doc.elements_at(500.0, 500.0).is_empty());
    }

    #[test]
    fn test_sibling_positions() {
        let doc = Document::parse(PAGE).unwrap();
        let inputs = doc.query_css("input").unwrap();
        assert_eq!(doc.type_index(inputs[1]), 2);
        assert_eq!(doc.child_index(inputs[1]), 2);
        assert!(doc.has_same_tag_sibling(inputs[0]));
        let button = doc.find("button").unwrap().unwrap();
        assert!(!doc.has_same_tag_sibling(button));
        assert_eq!(doc.depth(button), 4);
    }

    #[test]
    fn test_bounds_from_string() {
        let b = Bounds::from_string("[0,0][1080,1920]").unwrap();
        assert_eq!(b.center(), (540.0, 960.0));
        assert!(Bounds::from_string("garbage").is_none());
    }

    #[test]
    fn test_empty_markup_is_rejected() {
        assert!(matches!(Document::parse("   "), Err(DomError::Empty)));
    }
}
