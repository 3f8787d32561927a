//! Stability heuristics
//!
//! Decides which ids, classes and roles are worth building a selector on, and
//! which finished selectors are too fragile to accept.

use regex::Regex;
use std::sync::LazyLock;

use crate::dom::{Document, NodeId};

/// Attributes written by developers specifically for test automation
pub const TEST_ID_ATTRS: &[&str] = &["data-testid", "data-test-id", "data-test", "data-qa", "data-cy"];

/// Patterns that indicate framework-generated ids
static AUTO_GENERATED_ID_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"^\d+$").unwrap(),                                   // Numeric only
        Regex::new(r"^(ember|ext-gen|ext-comp|gwt-uid-|yui_|jquery|ui-id-)\d+").unwrap(),
        Regex::new(r"^react-").unwrap(),
        Regex::new(r"^:r[0-9a-z]+:$").unwrap(),                          // React useId
        Regex::new(r"^(mui|radix|headlessui|downshift|rc-tabs|reach)-").unwrap(),
        Regex::new(r"(?i)[0-9a-f]{8}-[0-9a-f]{4}").unwrap(),            // UUID pattern
        Regex::new(r"_\d{10,}").unwrap(),                                // Timestamp suffix
        Regex::new(r"\d{5,}").unwrap(),                                  // Long digit run
        Regex::new(r"^generated_").unwrap(),
    ]
});

/// State, utility and framework-hash classes
static UNSTABLE_CLASS_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"^(is|has)-").unwrap(),
        Regex::new(
            r"^(active|hover|hovered|focus|focused|selected|disabled|open|opened|show|shown|hidden|visible|checked|current|collapsed|expanded|loading|in|fade)$",
        )
        .unwrap(),
        Regex::new(r"^(css|sc|jsx|emotion|svelte|styled)-[a-zA-Z0-9]+").unwrap(),
        Regex::new(r"^(ng|v)-").unwrap(),
        Regex::new(r"__[a-zA-Z0-9_-]{5,}$").unwrap(), // CSS modules hash
        Regex::new(r"^_[a-zA-Z0-9]{5,}$").unwrap(),
        Regex::new(r"[:\[\]/!]").unwrap(),             // Tailwind variants and arbitrary values
        Regex::new(r"^-?[mp][trblxyse]?-\d").unwrap(),
        Regex::new(r"^(w|h|min-w|max-w|gap|space-[xy])-").unwrap(),
        Regex::new(r"^(flex|grid|block|inline|inline-block|relative|absolute|fixed|sticky|truncate)$")
            .unwrap(),
        Regex::new(r"\d{3,}").unwrap(),
    ]
});

/// Icon-set classes that name a specific glyph
static ICON_CLASS_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"^(fa|bi|glyphicon|mdi|ti|la|icon|lni|ri)-[a-z0-9-]+$").unwrap(),
        Regex::new(r"^(anticon|el-icon|ion|feather|lucide)-[a-z0-9-]+$").unwrap(),
    ]
});

/// Finished selector shapes that are unlikely to survive a re-render
static WEAK_SELECTOR_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"^[a-z][a-z0-9]*$").unwrap(),                               // Bare tag
        Regex::new(r"^[a-z][a-z0-9]*:nth-(of-type|child)\(\d+\)$").unwrap(),    // a:nth-of-type(2)
        Regex::new(r"^//[a-z][a-z0-9]*\[\d+\]$").unwrap(),                      // //a[2]
        Regex::new(r"^\(//[a-z][a-z0-9]*\)\[\d+\]$").unwrap(),                  // (//a)[2]
    ]
});

const GENERIC_ROLES: &[&str] = &[
    "presentation", "none", "generic", "group", "region", "document", "application", "main",
    "navigation", "banner", "contentinfo", "complementary", "list", "listitem", "img", "article",
];

pub fn is_stable_id(id: &str, max_len: usize) -> bool {
    let id = id.trim();
    !id.is_empty()
        && id.chars().count() <= max_len
        && !id.chars().any(char::is_whitespace)
        && !AUTO_GENERATED_ID_PATTERNS.iter().any(|p| p.is_match(id))
}

pub fn is_stable_class(class: &str) -> bool {
    !class.is_empty() && !UNSTABLE_CLASS_PATTERNS.iter().any(|p| p.is_match(class))
}

/// Stable classes of an element in source order, at most `max`
pub fn stable_classes(doc: &Document, id: NodeId, max: usize) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for class in doc.classes(id) {
        if out.len() >= max {
            break;
        }
        if is_stable_class(class) && !out.iter().any(|c| c == class) {
            out.push(class.to_string());
        }
    }
    out
}

pub fn is_generic_role(role: &str) -> bool {
    GENERIC_ROLES.contains(&role.trim().to_lowercase().as_str())
}

/// First class naming a specific icon glyph
pub fn icon_marker(doc: &Document, id: NodeId) -> Option<String> {
    doc.classes(id)
        .find(|c| ICON_CLASS_PATTERNS.iter().any(|p| p.is_match(c)))
        .map(str::to_string)
}

pub fn is_weak_selector(value: &str) -> bool {
    WEAK_SELECTOR_PATTERNS.iter().any(|p| p.is_match(value))
}
