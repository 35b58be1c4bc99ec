//! Configuration management for vocab-drill.
//!
//! Loads config from YAML files in standard locations. Every section falls
//! back to defaults for missing keys.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NarratorConfig {
    /// Voice id from the voice bank, e.g. `af_heart`.
    pub voice: String,
    /// Speaking rate in words per minute.
    pub rate: u32,
    pub volume: f32,
    pub model_path: String,
    pub voices_path: String,
    pub tokenizer_path: String,
}

impl Default for NarratorConfig {
    fn default() -> Self {
        Self {
            voice: "af_heart".into(),
            rate: 150,
            volume: 1.0,
            model_path: String::new(),
            voices_path: String::new(),
            tokenizer_path: String::new(),
        }
    }
}

impl NarratorConfig {
    pub fn model_path(&self) -> PathBuf {
        resolve_or(&self.model_path, "kokoro-v1.0.onnx")
    }

    pub fn voices_path(&self) -> PathBuf {
        resolve_or(&self.voices_path, "voices-v1.0.bin")
    }

    pub fn tokenizer_path(&self) -> PathBuf {
        resolve_or(&self.tokenizer_path, "tokenizer.json")
    }
}

/// Empty paths resolve to `file_name` in the working directory.
fn resolve_or(configured: &str, file_name: &str) -> PathBuf {
    if configured.is_empty() {
        std::env::current_dir().unwrap_or_default().join(file_name)
    } else {
        PathBuf::from(configured)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PracticeConfig {
    /// Length of one pause between repetitions of the current word.
    pub pause_ms: u64,
    /// Pauses after each utterance before the word is spoken again.
    pub pauses_per_cycle: u32,
    /// Word spoken by `sample` when nothing is selected. `None` stays silent.
    pub sample_fallback_word: Option<String>,
    /// Append a record to the practice history when a session ends.
    pub history: bool,
}

impl Default for PracticeConfig {
    fn default() -> Self {
        Self {
            pause_ms: 1000,
            pauses_per_cycle: 3,
            sample_fallback_word: None,
            history: true,
        }
    }
}

impl PracticeConfig {
    pub fn pause(&self) -> Duration {
        Duration::from_millis(self.pause_ms)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub narrator: NarratorConfig,
    pub practice: PracticeConfig,
}

impl Config {
    /// Load configuration from YAML file.
    ///
    /// Searches standard locations if no path is provided:
    /// 1. ./config.yaml
    /// 2. ~/.config/vocab-drill/config.yaml
    /// 3. /etc/vocab-drill/config.yaml
    pub fn load(path: Option<&Path>) -> Self {
        let resolved = path.map(PathBuf::from).or_else(|| {
            let candidates = [
                std::env::current_dir().ok().map(|d| d.join("config.yaml")),
                dirs::home_dir().map(|h| h.join(".config/vocab-drill/config.yaml")),
                Some(PathBuf::from("/etc/vocab-drill/config.yaml")),
            ];
            candidates.into_iter().flatten().find(|p| p.exists())
        });

        let Some(config_path) = resolved else {
            info!("No config file found, using defaults");
            return Self::default();
        };

        match std::fs::read_to_string(&config_path) {
            Ok(contents) => match Self::parse(&contents) {
                Ok(config) => {
                    info!("Loaded config from {}", config_path.display());
                    config
                }
                Err(e) => {
                    tracing::warn!("Failed to parse {}: {e}, using defaults", config_path.display());
                    Self::default()
                }
            },
            Err(e) => {
                tracing::warn!("Failed to read {}: {e}, using defaults", config_path.display());
                Self::default()
            }
        }
    }

    pub fn parse(yaml: &str) -> Result<Self, serde_yml::Error> {
        serde_yml::from_str(yaml)
    }
}
