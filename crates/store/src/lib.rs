mod file;
mod memory;

use hook_transport::TrackId;

pub use file::FileStore;
pub use memory::MemoryStore;

/// Durable key holding the mute flag as `"true"`/`"false"`.
pub const MUTED_KEY: &str = "bgMusicMuted";
/// Durable key holding the background theme's last position, in seconds.
pub const OFFSET_KEY: &str = "bgMusicTime";
pub const JINGLE_PLAYED_KEY: &str = "jingleOncePlayed";
pub const BACKGROUND_PLAYED_KEY: &str = "bgOncePlayed";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A string-to-string store with web storage semantics.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError>;
}

/// Session flag key for a one-shot track. The ambient loop has none.
pub fn played_key(track: TrackId) -> Option<&'static str> {
    match track {
        TrackId::Jingle => Some(JINGLE_PLAYED_KEY),
        TrackId::Background => Some(BACKGROUND_PLAYED_KEY),
        TrackId::Waves => None,
    }
}

/// Typed access to the mute flag, the background offset, and the per-session
/// played flags.
///
/// Writes never fail from the caller's point of view: a store that refuses a
/// write is logged and otherwise ignored, matching how the page treats a full
/// or disabled storage area.
pub struct Persistence {
    durable: Box<dyn KeyValueStore>,
    session: Box<dyn KeyValueStore>,
}

impl Persistence {
    pub fn new(durable: Box<dyn KeyValueStore>, session: Box<dyn KeyValueStore>) -> Self {
        Self { durable, session }
    }

    /// Both stores in memory. Handy for tests and for running without a
    /// data directory.
    pub fn in_memory() -> Self {
        Self::new(Box::new(MemoryStore::new()), Box::new(MemoryStore::new()))
    }

    pub fn read_muted(&self) -> bool {
        self.durable.get(MUTED_KEY).as_deref() == Some("true")
    }

    pub fn write_muted(&mut self, muted: bool) {
        let value = if muted { "true" } else { "false" };
        if let Err(e) = self.durable.set(MUTED_KEY, value) {
            tracing::warn!("failed to persist mute flag: {e}");
        }
    }

    /// Only call this once playback of `track` has actually been observed.
    pub fn mark_played(&mut self, track: TrackId) {
        let Some(key) = played_key(track) else {
            return;
        };
        if let Err(e) = self.session.set(key, "true") {
            tracing::warn!(%track, "failed to persist played flag: {e}");
        }
    }

    pub fn has_played(&self, track: TrackId) -> bool {
        played_key(track).is_some_and(|key| self.session.get(key).as_deref() == Some("true"))
    }

    pub fn read_offset(&self) -> Option<f64> {
        self.durable
            .get(OFFSET_KEY)?
            .parse::<f64>()
            .ok()
            .filter(|secs| secs.is_finite() && *secs >= 0.0)
    }

    pub fn write_offset(&mut self, seconds: f64) {
        if !seconds.is_finite() || seconds < 0.0 {
            return;
        }
        if let Err(e) = self.durable.set(OFFSET_KEY, &seconds.to_string()) {
            tracing::warn!("failed to persist playback offset: {e}");
        }
    }
}
