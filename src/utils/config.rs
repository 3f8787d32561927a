use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Invalid value '{value}' for {name}")]
    InvalidEnv { name: String, value: String },
}

/// Capture configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CaptureConfig {
    /// Quiescence window before a buffered value is committed (ms)
    pub input_debounce_ms: u64,

    /// Identical (selector, value) commits inside this window are dropped (ms)
    pub dedupe_window_ms: u64,

    /// Minimum hover dwell before a hover is recorded (ms)
    pub hover_dwell_ms: u64,

    pub max_upload_files: usize,
    pub max_upload_bytes: u64,

    /// Drop a vanished click target when a delete confirmation follows it
    pub prune_click_before_delete_dialog: bool,

    /// Max affordances delivered per structural batch
    pub structure_batch_cap: usize,
    pub structure_debounce_ms: u64,

    pub synthesizer: SynthesizerConfig,
    pub drag: DragConfig,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            input_debounce_ms: 400,
            dedupe_window_ms: 1000,
            hover_dwell_ms: 600,
            max_upload_files: 10,
            max_upload_bytes: 10 * 1024 * 1024,
            prune_click_before_delete_dialog: false,
            structure_batch_cap: 50,
            structure_debounce_ms: 250,
            synthesizer: SynthesizerConfig::default(),
            drag: DragConfig::default(),
        }
    }
}

/// Bounds used by the locator synthesizer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SynthesizerConfig {
    /// Ids longer than this are treated as generated
    pub max_id_length: usize,
    pub min_text_length: usize,
    pub max_text_length: usize,
    /// Max classes combined into one `tag.class` selector
    pub max_classes: usize,
}

impl Default for SynthesizerConfig {
    fn default() -> Self {
        Self {
            max_id_length: 40,
            min_text_length: 2,
            max_text_length: 50,
            max_classes: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DragConfig {
    /// Pointer travel that turns a press into a synthetic drag (px)
    pub threshold_px: f64,
    /// Travel threshold for elements owned by a drag-and-drop library (px)
    pub library_threshold_px: f64,
    /// Drop targets shallower than this are ignored (html = 1, body = 2)
    pub min_target_depth: usize,
    /// Clicks and hovers right after a drop are its echo (ms)
    pub click_suppress_ms: u64,
    /// Animation frames to wait before a drop target is final
    pub refine_frames: u8,
}

impl Default for DragConfig {
    fn default() -> Self {
        Self {
            threshold_px: 8.0,
            library_threshold_px: 3.0,
            min_target_depth: 3,
            click_suppress_ms: 300,
            refine_frames: 2,
        }
    }
}

impl CaptureConfig {
    /// Load a YAML config file and apply `LUMI_*` environment overrides
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&content)?.with_env_overrides()
    }

    pub fn from_yaml_str(content: &str) -> Result<Self, ConfigError> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(content)?)
    }

    pub fn with_env_overrides(self) -> Result<Self, ConfigError> {
        self.with_overrides_from(|name| std::env::var(name).ok())
    }

    /// Apply overrides from any variable source
    pub fn with_overrides_from(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let targets: [(&str, &mut u64); 3] = [
            ("LUMI_INPUT_DEBOUNCE_MS", &mut self.input_debounce_ms),
            ("LUMI_DEDUPE_WINDOW_MS", &mut self.dedupe_window_ms),
            ("LUMI_HOVER_DWELL_MS", &mut self.hover_dwell_ms),
        ];

        for (name, slot) in targets {
            if let Some(value) = lookup(name) {
                *slot = value.trim().parse().map_err(|_| ConfigError::InvalidEnv {
                    name: name.to_string(),
                    value: value.clone(),
                })?;
            }
        }

        Ok(self)
    }
}
