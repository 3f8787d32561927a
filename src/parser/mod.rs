pub mod script;

pub use script::{load_document, parse_script, parse_script_file, ReplayScript, ScriptEntry, ScriptStep};
