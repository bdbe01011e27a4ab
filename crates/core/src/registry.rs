use std::collections::BTreeMap;
use std::path::PathBuf;

use hook_transport::{TrackId, TrackSpec};

use crate::host::{AudioBackend, PageHost};

/// Where a track is in its per-page lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackPhase {
    Idle,
    /// Play requested, outcome not observed yet.
    Starting,
    Blocked,
    Playing,
    Ended,
    /// Source and fallback both errored; nothing more is attempted.
    Failed,
}

#[derive(Debug, Clone)]
pub struct AudioTrack {
    /// Source currently loaded into the element; the configured one until
    /// the fallback is swapped in.
    pub source: PathBuf,
    pub phase: TrackPhase,
    /// Set by the first play request, so a fallback reload knows to retry.
    pub wanted: bool,
    pub fallback_tried: bool,
}

impl AudioTrack {
    fn new(source: PathBuf) -> Self {
        Self {
            source,
            phase: TrackPhase::Idle,
            wanted: false,
            fallback_tried: false,
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self.phase, TrackPhase::Starting | TrackPhase::Playing)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MuteButton {
    pub hidden: bool,
}

/// Get-or-create access to the page's audio elements and mute button.
///
/// Lookups go through the backend and page, so a registry built on a page
/// that already holds the elements adopts them instead of adding more.
#[derive(Debug, Default)]
pub struct Registry {
    tracks: BTreeMap<TrackId, AudioTrack>,
    button: Option<MuteButton>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_create_track(
        &mut self,
        backend: &mut impl AudioBackend,
        spec: TrackSpec,
    ) -> &mut AudioTrack {
        let id = spec.id;
        self.tracks.entry(id).or_insert_with(|| {
            if backend.contains(id) {
                tracing::debug!(track = %id, "adopting existing audio element");
            } else {
                tracing::debug!(
                    track = %id,
                    source = %spec.source.display(),
                    "creating audio element"
                );
                backend.attach(&spec);
            }
            AudioTrack::new(spec.source)
        })
    }

    /// Creates the button hidden when `overlay_present`; the caller reveals
    /// it once the overlay is gone.
    pub fn get_or_create_mute_button(
        &mut self,
        page: &mut impl PageHost,
        overlay_present: bool,
    ) -> MuteButton {
        if let Some(button) = self.button {
            return button;
        }
        let button = if page.has_mute_button() {
            MuteButton { hidden: false }
        } else {
            page.create_mute_button(overlay_present);
            MuteButton {
                hidden: overlay_present,
            }
        };
        self.button = Some(button);
        button
    }

    pub fn reveal_mute_button(&mut self, page: &mut impl PageHost) {
        if let Some(button) = self.button.as_mut().filter(|b| b.hidden) {
            button.hidden = false;
            page.set_mute_button_visible(true);
        }
    }

    pub fn track(&self, id: TrackId) -> Option<&AudioTrack> {
        self.tracks.get(&id)
    }

    pub fn track_mut(&mut self, id: TrackId) -> Option<&mut AudioTrack> {
        self.tracks.get_mut(&id)
    }

    pub fn ids(&self) -> impl Iterator<Item = TrackId> + '_ {
        self.tracks.keys().copied()
    }

    pub fn all_failed(&self) -> bool {
        !self.tracks.is_empty()
            && self
                .tracks
                .values()
                .all(|track| track.phase == TrackPhase::Failed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::{FakeBackend, FakePage};

    #[test]
    fn test_track_created_once() {
        let mut backend = FakeBackend::new();
        let mut registry = Registry::new();

        for _ in 0..3 {
            registry.get_or_create_track(&mut backend, TrackSpec::default_for(TrackId::Waves));
        }

        assert_eq!(backend.attach_calls, 1);
        assert_eq!(registry.ids().collect::<Vec<_>>(), vec![TrackId::Waves]);
    }

    #[test]
    fn test_new_registry_adopts_existing_element() {
        let mut backend = FakeBackend::new();
        Registry::new().get_or_create_track(&mut backend, TrackSpec::default_for(TrackId::Jingle));
        Registry::new().get_or_create_track(&mut backend, TrackSpec::default_for(TrackId::Jingle));

        assert_eq!(backend.attach_calls, 1);
    }

    #[test]
    fn test_button_created_once_and_hidden_behind_overlay() {
        let mut page = FakePage::home_with_overlay();
        let mut registry = Registry::new();

        let first = registry.get_or_create_mute_button(&mut page, true);
        let second = registry.get_or_create_mute_button(&mut page, true);
        assert!(first.hidden);
        assert_eq!(first, second);
        assert_eq!(page.button_creations, 1);
        assert!(!page.button_visible);

        registry.reveal_mute_button(&mut page);
        assert!(page.button_visible);

        // a second registry on the same page finds the button
        let mut again = Registry::new();
        let adopted = again.get_or_create_mute_button(&mut page, false);
        assert!(!adopted.hidden);
        assert_eq!(page.button_creations, 1);
    }

    #[test]
    fn test_all_failed() {
        let mut backend = FakeBackend::new();
        let mut registry = Registry::new();
        assert!(!registry.all_failed());

        registry
            .get_or_create_track(&mut backend, TrackSpec::default_for(TrackId::Waves))
            .phase = TrackPhase::Failed;
        assert!(registry.all_failed());
    }
}
