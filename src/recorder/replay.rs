//! Offline replay of a scripted event stream through a recording session

use anyhow::{Context, Result};
use log::{debug, info, warn};
use std::path::Path;

use super::session::RecordingSession;
use crate::dom::Document;
use crate::parser::script::{load_document, ReplayScript, ScriptStep};
use crate::utils::config::CaptureConfig;

/// Drive a fresh session with `script`, starting from `document`.
///
/// Snapshot paths are relative to `base_dir`. Every timer still pending at
/// the end of the script runs, and buffered values are flushed, so the
/// returned ledger is complete.
pub fn replay(
    document: Document,
    script: &ReplayScript,
    base_dir: &Path,
    config: CaptureConfig,
) -> Result<RecordingSession> {
    let mut session = RecordingSession::start(config);
    let mut doc = document;
    let mut clock = 0u64;

    if script.session_markers {
        session
            .mark_session_start(clock)
            .context("Failed to open session marker")?;
    }

    for (index, entry) in script.steps.iter().enumerate() {
        if let Some(at) = entry.at {
            if at < clock {
                warn!("Step {} goes back in time ({} < {}), keeping {}", index + 1, at, clock, clock);
            }
            clock = clock.max(at);
        }

        match &entry.step {
            ScriptStep::Snapshot { path } => {
                doc = load_document(&base_dir.join(path))
                    .with_context(|| format!("Step {}: snapshot", index + 1))?;
                debug!("Step {}: switched to snapshot {}", index + 1, path);
            }
            ScriptStep::Frame { count } => {
                for _ in 0..*count {
                    session.animation_frame(&doc);
                }
            }
            ScriptStep::Wait => session.advance(&doc, clock),
            step => {
                let event = step
                    .to_event(&doc, clock)
                    .with_context(|| format!("Step {}", index + 1))?;
                if let Some(event) = event {
                    session.handle(&doc, &event);
                }
            }
        }
    }

    session.advance(&doc, u64::MAX);
    session.flush_pending_inputs();

    if script.session_markers {
        session
            .mark_session_end(clock)
            .context("Failed to close session marker")?;
    }

    info!(
        "Replayed {} step(s) into {} record(s)",
        script.steps.len(),
        session.ledger().len()
    );
    Ok(session)
}
