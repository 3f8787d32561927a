//! Locator synthesizer
//!
//! Turns an element of the current snapshot into a selector that is unique
//! right now and likely to keep pointing at the same element later.
//!
//! # Cascade
//! The first candidate that matches exactly the target element wins:
//! 1. **Identity**: stable `id`, `name`, test-id attribute, non-generic `role`, `title`
//! 2. **Anchor**: exact `href`, `href` tail, `title`, `aria-label`
//! 3. **Classes**: `tag.c1.c2`, then positional and id-scoped variants
//! 4. **Ancestor-descendant** XPath (only when the target was promoted from a leaf)
//! 5. **Text** XPath for text-bearing tags
//! 6. **Absolute** path from the root element
//! 7. Bare tag name, flagged weak

use log::{debug, error};
use regex::Regex;
use std::sync::LazyLock;

use super::literal::{css_ident, css_string, has_control_chars, xpath_literal};
use super::stability;
use super::{Confidence, Locator, Strategy};
use crate::dom::{semantics, Document, NodeId};
use crate::utils::config::SynthesizerConfig;

/// Tags whose visible text is a reasonable handle
const TEXT_TAGS: &[&str] = &[
    "a", "button", "label", "span", "p", "h1", "h2", "h3", "h4", "h5", "h6", "li", "td", "th",
    "option", "summary", "legend", "strong", "em", "b", "dt", "dd",
];

/// Trailing vector-graphic segments of a path expression
static VECTOR_TAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(/(svg|path|use|g|circle|rect|polygon|polyline|line|ellipse)(\[\d+\])?)+$")
        .unwrap()
});

pub struct Synthesizer<'a> {
    pub(super) doc: &'a Document,
    config: &'a SynthesizerConfig,
}

impl<'a> Synthesizer<'a> {
    pub fn new(doc: &'a Document, config: &'a SynthesizerConfig) -> Self {
        Self { doc, config }
    }

    /// Synthesize a locator for a node. Never fails: the last resort is a
    /// weak bare-tag locator.
    pub fn synthesize(&self, node: NodeId) -> Locator {
        let Some(original) = self.doc.element_of(node) else {
            return self.root_fallback();
        };

        let target = if semantics::is_wrapper_leaf(self.doc, original) {
            semantics::clickable_ancestor(self.doc, original).unwrap_or(original)
        } else {
            original
        };
        if target != original {
            debug!(
                "Promoted <{}> to interactive ancestor <{}>",
                self.doc.tag(original),
                self.doc.tag(target)
            );
        }

        self.cascade(target, original)
    }

    /// The absolute-path step on its own
    pub fn synthesize_absolute(&self, node: NodeId) -> Locator {
        let Some(element) = self.doc.element_of(node) else {
            return self.root_fallback();
        };
        match self.absolute(element) {
            Some(locator) => self.finish(locator),
            None => self.bare_tag(element),
        }
    }

    pub(super) fn cascade(&self, target: NodeId, original: NodeId) -> Locator {
        let promoted = target != original;

        let found = self
            .identity(target)
            .or_else(|| self.anchor(target))
            .or_else(|| self.class_combination(target))
            .or_else(|| {
                if promoted {
                    self.ancestor_descendant(target, original)
                } else {
                    None
                }
            })
            .or_else(|| self.text(target))
            .or_else(|| self.absolute(target));

        let locator = match found {
            Some(locator) => self.finish(locator),
            None => self.bare_tag(target),
        };
        debug!("Synthesized {} via {}", locator, locator.strategy.as_str());
        locator
    }

    /// Whether a locator matches exactly `node` and nothing else
    pub(super) fn is_unique(&self, locator: &Locator, node: NodeId) -> bool {
        matches!(self.doc.resolve(locator), Ok(nodes) if nodes == [node])
    }

    fn accept(&self, locator: Locator, node: NodeId) -> Option<Locator> {
        self.is_unique(&locator, node).then_some(locator)
    }

    /// Attribute value usable inside a selector
    pub(super) fn attr_value(&self, node: NodeId, name: &str) -> Option<&'a str> {
        self.doc
            .attr(node, name)
            .filter(|v| !v.trim().is_empty() && !has_control_chars(v))
    }

    fn attr_selector(
        &self,
        node: NodeId,
        tag: &str,
        attr: &str,
        strategy: Strategy,
    ) -> Option<Locator> {
        let value = self.attr_value(node, attr)?;
        let selector = format!("{}[{}={}]", tag, attr, css_string(value));
        self.accept(Locator::css(selector, strategy), node)
    }

    fn identity(&self, node: NodeId) -> Option<Locator> {
        let tag = self.doc.tag(node);

        if let Some(id) = self.attr_value(node, "id") {
            if stability::is_stable_id(id, self.config.max_id_length) {
                let selector = match css_ident(id) {
                    Some(ident) => format!("#{}", ident),
                    None => format!("[id={}]", css_string(id)),
                };
                if let Some(locator) = self.accept(Locator::css(selector, Strategy::Id), node) {
                    return Some(locator);
                }
            }
        }

        if let Some(locator) = self.attr_selector(node, tag, "name", Strategy::Name) {
            return Some(locator);
        }

        for attr in stability::TEST_ID_ATTRS {
            if let Some(locator) = self.attr_selector(node, "", attr, Strategy::TestId) {
                return Some(locator);
            }
        }

        if self
            .attr_value(node, "role")
            .is_some_and(|role| !stability::is_generic_role(role))
        {
            if let Some(locator) = self.attr_selector(node, tag, "role", Strategy::Role) {
                return Some(locator);
            }
        }

        self.attr_selector(node, tag, "title", Strategy::Title)
    }

    fn anchor(&self, node: NodeId) -> Option<Locator> {
        if self.doc.tag(node) != "a" {
            return None;
        }

        if let Some(href) = self.attr_value(node, "href") {
            let lower = href.trim().to_lowercase();
            if !lower.starts_with('#') && !lower.starts_with("javascript:") {
                let exact = Locator::css(format!("a[href={}]", css_string(href)), Strategy::Href);
                if let Some(locator) = self.accept(exact, node) {
                    return Some(locator);
                }

                let tail = href.rsplit('/').next().unwrap_or("");
                if !tail.is_empty() && tail != href {
                    let suffix = Locator::css(
                        format!("a[href$={}]", css_string(tail)),
                        Strategy::HrefSuffix,
                    );
                    if let Some(locator) = self.accept(suffix, node) {
                        return Some(locator);
                    }
                }
            }
        }

        self.attr_selector(node, "a", "title", Strategy::Title)
            .or_else(|| self.attr_selector(node, "a", "aria-label", Strategy::AriaLabel))
    }

    fn class_combination(&self, node: NodeId) -> Option<Locator> {
        let classes = stability::stable_classes(self.doc, node, self.config.max_classes);
        let class_part: String = classes
            .iter()
            .filter_map(|c| css_ident(c))
            .map(|c| format!(".{}", c))
            .collect();
        if class_part.is_empty() {
            return None;
        }

        let tag = self.doc.tag(node);
        let base = format!("{}{}", tag, class_part);
        if let Some(locator) = self.accept(Locator::css(base.clone(), Strategy::Classes), node) {
            return Some(locator);
        }

        let of_type = format!("{}:nth-of-type({})", base, self.doc.type_index(node));
        if let Some(locator) = self.accept(Locator::css(of_type.clone(), Strategy::Position), node)
        {
            return Some(locator);
        }

        // Positions on links and buttons shift whenever a sibling appears
        if !matches!(tag, "a" | "button") {
            let nth_child = format!("{}:nth-child({})", base, self.doc.child_index(node));
            if let Some(locator) = self.accept(Locator::css(nth_child, Strategy::Position), node) {
                return Some(locator);
            }
        }

        let scope = self.doc.ancestors(node).find_map(|a| {
            self.attr_value(a, "id")
                .filter(|id| stability::is_stable_id(id, self.config.max_id_length))
                .and_then(css_ident)
        })?;
        self.accept(
            Locator::css(format!("#{} {}", scope, base), Strategy::ScopedPosition),
            node,
        )
        .or_else(|| {
            self.accept(
                Locator::css(format!("#{} {}", scope, of_type), Strategy::ScopedPosition),
                node,
            )
        })
    }

    /// `//button[.//*[@title='Delete']]` style paths from the promoted leaf
    fn ancestor_descendant(&self, target: NodeId, original: NodeId) -> Option<Locator> {
        let tag = self.doc.tag(target);
        let chain = std::iter::once(original)
            .chain(self.doc.ancestors(original))
            .take_while(|n| *n != target);

        let mut predicates: Vec<String> = Vec::new();
        for node in chain {
            for attr in ["title", "aria-label"] {
                if let Some(value) = self.attr_value(node, attr) {
                    predicates.push(format!("@{}={}", attr, xpath_literal(value)));
                }
            }
            if let Some(icon) = stability::icon_marker(self.doc, node) {
                predicates.push(format!("contains(@class,{})", xpath_literal(&icon)));
            }
            if let Some(value) = self.attr_value(node, "data-icon") {
                predicates.push(format!("@data-icon={}", xpath_literal(value)));
            }
        }

        predicates.into_iter().find_map(|predicate| {
            let expr = format!("//{}[.//*[{}]]", tag, predicate);
            let count = self.doc.count_xpath(&format!("count({})", expr));
            (count == Ok(1)).then(|| Locator::xpath(expr, Strategy::AncestorDescendant))
        })
    }

    fn text(&self, node: NodeId) -> Option<Locator> {
        let tag = self.doc.tag(node);
        if !TEXT_TAGS.contains(&tag) {
            return None;
        }

        let text = self.doc.normalized_text(node);
        let len = text.chars().count();
        if len < self.config.min_text_length
            || len > self.config.max_text_length
            || has_control_chars(&text)
        {
            return None;
        }

        let expr = format!("//{}[normalize-space()={}]", tag, xpath_literal(&text));
        self.accept(Locator::xpath(expr, Strategy::Text), node)
    }

    fn absolute(&self, node: NodeId) -> Option<Locator> {
        let mut segments: Vec<String> = Vec::new();
        let mut current = Some(node);
        while let Some(n) = current {
            let tag = self.doc.tag(n);
            if self.doc.has_same_tag_sibling(n) {
                segments.push(format!("{}[{}]", tag, self.doc.type_index(n)));
            } else {
                segments.push(tag.to_string());
            }
            current = self.doc.parent(n);
        }
        segments.reverse();

        let expr = format!("/{}", segments.join("/"));
        self.accept(Locator::xpath(expr, Strategy::Absolute), node)
    }

    fn bare_tag(&self, node: NodeId) -> Locator {
        let tag = self.doc.tag(node);
        error!(
            "No unique locator for <{}>, falling back to the bare tag name",
            tag
        );
        let mut locator = Locator::css(tag, Strategy::BareTag);
        locator.confidence = Confidence::Weak;
        locator
    }

    fn root_fallback(&self) -> Locator {
        match self.doc.root_element() {
            Some(root) => self.bare_tag(root),
            None => {
                let mut locator = Locator::css("html", Strategy::BareTag);
                locator.confidence = Confidence::Weak;
                locator
            }
        }
    }

    /// Trim vector-graphic tails and flag fragile shapes
    pub(super) fn finish(&self, mut locator: Locator) -> Locator {
        if locator.kind == super::LocatorKind::XPath {
            if let Some(m) = VECTOR_TAIL.find(&locator.value) {
                if m.start() > 1 {
                    locator.value.truncate(m.start());
                }
            }
        }
        if stability::is_weak_selector(&locator.value) {
            locator.confidence = Confidence::Weak;
        }
        locator
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locator::LocatorKind;

    fn synth(html: &str, selector: &str) -> (Document, Locator) {
        let doc = Document::parse(html).unwrap();
        let node = doc.find(selector).unwrap().unwrap();
        let config = SynthesizerConfig::default();
        let locator = Synthesizer::new(&doc, &config).synthesize(node);
        (doc, locator)
    }

    fn page(body: &str) -> String {
        format!("<html><body>{}</body></html>", body)
    }

    #[test]
    fn test_stable_id_wins() {
        let (_, locator) = synth(&page(r#"<button id="save" name="s">Save</button>"#), "button");
        assert_eq!(locator.value, "#save");
        assert_eq!(locator.kind, LocatorKind::Css);
        assert_eq!(locator.strategy, Strategy::Id);
        assert!(!locator.is_weak());
    }

    #[test]
    fn test_non_identifier_id_uses_attribute_form() {
        let (_, locator) = synth(&page(r#"<div id="a.b">x</div>"#), "div");
        assert_eq!(locator.value, r#"[id="a.b"]"#);
    }

    #[test]
    fn test_generated_id_falls_through_to_name() {
        let (_, locator) = synth(
            &page(r#"<input id="ember123" name="email"><input name="password">"#),
            "input",
        );
        assert_eq!(locator.value, r#"input[name="email"]"#);
        assert_eq!(locator.strategy, Strategy::Name);
    }

    #[test]
    fn test_test_id_and_role() {
        let (_, locator) = synth(&page(r#"<div data-testid="panel">x</div>"#), "div");
        assert_eq!(locator.value, r#"[data-testid="panel"]"#);

        let (_, locator) = synth(
            &page(r#"<div role="presentation"><div role="tab">One</div></div>"#),
            "div div",
        );
        assert_eq!(locator.value, r#"div[role="tab"]"#);
    }

    #[test]
    fn test_anchor_href() {
        let (_, locator) = synth(
            &page(r#"<a href="/docs/guide.html">Guide</a><a href="/docs/api.html">API</a>"#),
            "a",
        );
        assert_eq!(locator.value, r#"a[href="/docs/guide.html"]"#);
        assert_eq!(locator.strategy, Strategy::Href);
    }

    #[test]
    fn test_fragment_links_skip_href() {
        let (_, locator) = synth(
            &page(r##"<a href="#" aria-label="Close">x</a><a href="#">y</a>"##),
            "a",
        );
        assert_eq!(locator.value, r#"a[aria-label="Close"]"#);
    }

    #[test]
    fn test_class_position() {
        let (_, locator) = synth(
            &page(r#"<ul><li class="card active">A</li><li class="card">B</li><li class="card">C</li></ul>"#),
            "li:nth-of-type(2)",
        );
        assert_eq!(locator.value, "li.card:nth-of-type(2)");
        assert_eq!(locator.strategy, Strategy::Position);
    }

    #[test]
    fn test_scoped_position() {
        let (_, locator) = synth(
            &page(
                r#"<ul id="l1"><li class="item">A</li><li class="item">B</li></ul>
                   <ul id="l2"><li class="item">A</li><li class="item">B</li></ul>"#,
            ),
            "#l2 li:nth-of-type(2)",
        );
        assert_eq!(locator.value, "#l2 li.item:nth-of-type(2)");
        assert_eq!(locator.strategy, Strategy::ScopedPosition);
    }

    #[test]
    fn test_icon_promotes_to_button_and_uses_descendant_xpath() {
        let (doc, locator) = synth(
            &page(
                r#"<div><button class="btn"><i class="fa fa-trash" title="Delete"></i></button></div>
                   <div><button class="btn"><i class="fa fa-pen" title="Edit"></i></button></div>"#,
            ),
            "i",
        );
        assert_eq!(locator.value, "//button[.//*[@title='Delete']]");
        assert_eq!(locator.strategy, Strategy::AncestorDescendant);
        let hits = doc.resolve(&locator).unwrap();
        assert_eq!(hits, doc.query_css("button").unwrap()[..1].to_vec());
    }

    #[test]
    fn test_text_xpath_with_both_quotes() {
        let (doc, locator) = synth(
            &page(r#"<div><button>It's "x"</button></div><div><button>Other</button></div>"#),
            "button",
        );
        assert_eq!(
            locator.value,
            r#"//button[normalize-space()=concat('It', "'", 's "x"')]"#
        );
        assert_eq!(doc.resolve(&locator).unwrap().len(), 1);
    }

    #[test]
    fn test_text_xpath_keeps_nbsp() {
        let (doc, locator) = synth(
            &page("<div><div><button>Sign&nbsp;in</button></div><div><button>Other</button></div></div>"),
            "button",
        );
        assert_eq!(locator.value, "//button[normalize-space()='Sign\u{00A0}in']");
        assert_eq!(locator.strategy, Strategy::Text);
        assert_eq!(doc.resolve(&locator).unwrap().len(), 1);
        assert!(doc
            .query_xpath("//button[normalize-space()='Sign in']")
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_absolute_path_indexes_only_ambiguous_segments() {
        let (_, locator) = synth(&page("<div><p></p><p></p></div>"), "p:nth-of-type(2)");
        assert_eq!(locator.value, "/html/body/div/p[2]");
        assert_eq!(locator.strategy, Strategy::Absolute);
        assert!(!locator.is_weak());
    }

    #[test]
    fn test_vector_tail_is_trimmed() {
        let (_, locator) = synth(&page("<div><svg></svg><svg></svg></div>"), "svg");
        assert_eq!(locator.value, "/html/body/div");
    }

    #[test]
    fn test_synthesize_absolute_entry_point() {
        let doc = Document::parse(&page(r#"<main><a id="home" href="/">Home</a></main>"#)).unwrap();
        let a = doc.find("a").unwrap().unwrap();
        let config = SynthesizerConfig::default();
        let locator = Synthesizer::new(&doc, &config).synthesize_absolute(a);
        assert_eq!(locator.value, "/html/body/main/a");
    }

    #[test]
    fn test_every_locator_is_unique_and_round_trips() {
        let html = page(
            r#"<header><nav><a href="/">Home</a><a href="/about">About</a><a href="/about">About us</a></nav></header>
               <form id="login">
                 <label for="user">User</label><input id="user" name="user">
                 <input type="password" name="pw"><input type="checkbox" id="agree">
                 <button class="btn primary"><span>Sign in</span></button>
                 <button class="btn"><svg><path d="M0"/></svg></button>
               </form>
               <ul><li>One</li><li>Two</li><li>Two</li></ul>
               <table><tr><td>1</td><td>1</td></tr></table>"#,
        );
        let doc = Document::parse(&html).unwrap();
        let config = SynthesizerConfig::default();
        let synth = Synthesizer::new(&doc, &config);

        for node in doc.elements() {
            let expected = if semantics::is_wrapper_leaf(&doc, node) {
                semantics::clickable_ancestor(&doc, node).unwrap_or(node)
            } else {
                node
            };
            let locator = synth.synthesize(node);
            if matches!(doc.tag(expected), "svg" | "path") {
                continue;
            }
            assert_eq!(
                doc.resolve(&locator).unwrap(),
                vec![expected],
                "{} for <{}>",
                locator.value,
                doc.tag(node)
            );
        }
    }
}
