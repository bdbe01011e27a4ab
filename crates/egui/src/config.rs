use hook_core::AudioConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub audio: AudioConfig,
    /// How long the intro splash stays up before fading out.
    pub intro_secs: f32,
    /// Overrides the durable storage file.
    pub storage_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            audio: AudioConfig::default(),
            intro_secs: 2.5,
            storage_path: None,
        }
    }
}

impl Config {
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("hook").join("config.toml"))
    }

    pub fn load() -> Self {
        match Self::config_path() {
            Some(path) => Self::load_from(&path),
            None => Self::default(),
        }
    }

    pub fn load_from(path: &Path) -> Self {
        let Ok(contents) = fs::read_to_string(path) else {
            return Self::default();
        };
        match toml::from_str(&contents) {
            Ok(config) => config,
            Err(err) => {
                tracing::warn!(path = %path.display(), "ignoring invalid config: {err}");
                Self::default()
            }
        }
    }

    pub fn storage_path(&self) -> Option<PathBuf> {
        self.storage_path
            .clone()
            .or_else(|| dirs::data_dir().map(|p| p.join("hook").join("storage.json")))
    }

    /// `None` when the intro is disabled.
    pub fn intro(&self) -> Option<Duration> {
        (self.intro_secs.is_finite() && self.intro_secs > 0.0)
            .then(|| Duration::from_secs_f32(self.intro_secs))
    }
}
