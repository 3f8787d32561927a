//! Document snapshot model
//!
//! This module provides:
//! - An owned document tree parsed from (X)HTML markup, with layout bounds
//! - A CSS selector subset and an XPath subset used to check locator uniqueness
//! - Element semantics shared by capture and drag resolution (interactive,
//!   draggable, control kinds)

pub mod css;
pub mod document;
pub mod semantics;
pub mod xpath;

pub use document::{normalize_space, Bounds, Document, NodeId};

use thiserror::Error;

/// Errors raised while parsing markup or evaluating selectors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DomError {
    #[error("Malformed markup at byte {position}: {reason}")]
    Malformed { position: usize, reason: String },

    #[error("Document has no root element")]
    Empty,

    #[error("Invalid CSS selector '{selector}': {reason}")]
    InvalidCss { selector: String, reason: String },

    #[error("Invalid XPath '{expr}': {reason}")]
    InvalidXPath { expr: String, reason: String },
}
