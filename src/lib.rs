pub mod capture;
pub mod dom;
pub mod drag;
pub mod ledger;
pub mod locator;
pub mod parser;
pub mod recorder;
pub mod report;
pub mod utils;

// Re-export common items
pub use dom::Document;
pub use ledger::{ActionRecord, Ledger, LedgerPort};
pub use locator::{Locator, Synthesizer};
pub use recorder::{replay, RecordingSession};
pub use report::generate_report;
