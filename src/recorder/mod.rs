//! Recorder module for turning a live interaction stream into a ledger
//!
//! This module provides:
//! - The session-scoped context that owns capture, drag and ledger state
//! - Offline replay of scripted event streams

pub mod replay;
pub mod session;

pub use replay::replay;
pub use session::RecordingSession;
