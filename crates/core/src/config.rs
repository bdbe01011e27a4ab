use std::path::PathBuf;
use std::time::Duration;

use hook_transport::{TrackId, TrackSpec};
use serde::{Deserialize, Serialize};

/// Whether play requests need a prior user gesture, like a browser's
/// autoplay rules for audible media.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AutoplayPolicy {
    Allowed,
    #[default]
    RequireGesture,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Directory track sources are resolved against.
    pub asset_root: PathBuf,
    pub jingle: TrackSpec,
    pub background: TrackSpec,
    pub waves: TrackSpec,
    pub readiness_fallback_ms: u64,
    pub home_paths: Vec<String>,
    pub autoplay: AutoplayPolicy,
    /// Resume the background theme from its saved position instead of 0.
    pub resume_background: bool,
    pub offset_persist_secs: u64,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            asset_root: PathBuf::from("."),
            jingle: TrackSpec::default_for(TrackId::Jingle),
            background: TrackSpec::default_for(TrackId::Background),
            waves: TrackSpec::default_for(TrackId::Waves),
            readiness_fallback_ms: 1500,
            home_paths: vec!["/".to_string(), "/index.html".to_string()],
            autoplay: AutoplayPolicy::default(),
            resume_background: false,
            offset_persist_secs: 4,
        }
    }
}

impl AudioConfig {
    /// The spec for `id`, with its identity forced to match the slot it was
    /// configured in.
    pub fn track(&self, id: TrackId) -> TrackSpec {
        let mut spec = match id {
            TrackId::Jingle => self.jingle.clone(),
            TrackId::Background => self.background.clone(),
            TrackId::Waves => self.waves.clone(),
        };
        spec.id = id;
        spec
    }

    pub fn readiness_fallback(&self) -> Duration {
        Duration::from_millis(self.readiness_fallback_ms)
    }

    pub fn offset_persist_interval(&self) -> Duration {
        Duration::from_secs(self.offset_persist_secs.max(1))
    }

    pub fn is_home_path(&self, path: &str) -> bool {
        let path = path.trim();
        if path.is_empty() {
            return true;
        }
        self.home_paths.iter().any(|home| home == path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AudioConfig::default();
        assert_eq!(config.readiness_fallback(), Duration::from_millis(1500));
        assert_eq!(config.autoplay, AutoplayPolicy::RequireGesture);
        assert!(!config.resume_background);
    }

    #[test]
    fn test_home_paths() {
        let config = AudioConfig::default();
        assert!(config.is_home_path("/"));
        assert!(config.is_home_path("/index.html"));
        assert!(config.is_home_path(""));
        assert!(!config.is_home_path("/services"));
    }

    #[test]
    fn test_track_identity_is_forced() {
        let mut config = AudioConfig::default();
        config.jingle.id = TrackId::Waves;
        assert_eq!(config.track(TrackId::Jingle).id, TrackId::Jingle);
    }

    #[test]
    fn test_partial_config_keeps_defaults() {
        let config: AudioConfig =
            serde_json::from_str(r#"{"autoplay":"allowed","readiness_fallback_ms":250}"#)
                .expect("deserialize");
        assert_eq!(config.autoplay, AutoplayPolicy::Allowed);
        assert_eq!(config.readiness_fallback_ms, 250);
        assert_eq!(config.waves, TrackSpec::default_for(TrackId::Waves));
    }
}
