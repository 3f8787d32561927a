//! Locator synthesis
//!
//! This module provides:
//! - The `Locator` value type (selector string plus syntax kind and confidence)
//! - Stability heuristics for ids, classes, roles and fragile selector shapes
//! - The synthesizer cascade and its drag-oriented variant

pub mod drag;
pub mod literal;
pub mod stability;
pub mod synthesizer;

pub use synthesizer::Synthesizer;

use serde::{Deserialize, Serialize};
use std::fmt;

/// Selector syntax
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LocatorKind {
    Css,
    XPath,
}

impl LocatorKind {
    /// Guess the syntax of a hand-written selector
    pub fn guess(selector: &str) -> Self {
        let s = selector.trim_start();
        if s.starts_with('/') || s.starts_with("(/") || s.starts_with("./") || s.starts_with("count(")
        {
            LocatorKind::XPath
        } else {
            LocatorKind::Css
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LocatorKind::Css => "css",
            LocatorKind::XPath => "xpath",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Confidence {
    Stable,
    Weak,
}

/// Which cascade step produced a locator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Id,
    Name,
    TestId,
    Role,
    Title,
    Href,
    HrefSuffix,
    AriaLabel,
    Classes,
    Position,
    ScopedPosition,
    AncestorDescendant,
    Text,
    Absolute,
    DragAttribute,
    BareTag,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Id => "id",
            Strategy::Name => "name",
            Strategy::TestId => "test-id",
            Strategy::Role => "role",
            Strategy::Title => "title",
            Strategy::Href => "href",
            Strategy::HrefSuffix => "href-suffix",
            Strategy::AriaLabel => "aria-label",
            Strategy::Classes => "classes",
            Strategy::Position => "position",
            Strategy::ScopedPosition => "scoped-position",
            Strategy::AncestorDescendant => "ancestor-descendant",
            Strategy::Text => "text",
            Strategy::Absolute => "absolute",
            Strategy::DragAttribute => "drag-attribute",
            Strategy::BareTag => "bare-tag",
        }
    }
}

/// A selector string that re-finds a node
#[derive(Debug, Clone, PartialEq)]
pub struct Locator {
    pub value: String,
    pub kind: LocatorKind,
    pub confidence: Confidence,
    pub strategy: Strategy,
}

impl Locator {
    pub fn css(value: impl Into<String>, strategy: Strategy) -> Self {
        Self {
            value: value.into(),
            kind: LocatorKind::Css,
            confidence: Confidence::Stable,
            strategy,
        }
    }

    pub fn xpath(value: impl Into<String>, strategy: Strategy) -> Self {
        Self {
            value: value.into(),
            kind: LocatorKind::XPath,
            confidence: Confidence::Stable,
            strategy,
        }
    }

    pub fn is_weak(&self) -> bool {
        self.confidence == Confidence::Weak
    }

    /// Same selector string and syntax
    pub fn same_target(&self, other: &Locator) -> bool {
        self.value == other.value && self.kind == other.kind
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.value, self.kind.as_str())
    }
}
