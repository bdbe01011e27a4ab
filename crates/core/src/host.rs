//! The two seams the orchestrator drives: the audio elements and the page
//! around them. Both are implemented by the shell for real use and by
//! recording fakes in tests.

use std::path::Path;
use std::time::Duration;

use hook_transport::{TrackId, TrackSpec};

use crate::mute::ButtonStyle;

/// How much of a track is buffered, ordered like the media element states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ReadyState {
    HaveNothing,
    HaveMetadata,
    HaveCurrentData,
    HaveFutureData,
    HaveEnoughData,
}

impl ReadyState {
    /// Enough to start playback without waiting for a readiness signal.
    pub fn can_start(self) -> bool {
        self >= ReadyState::HaveCurrentData
    }
}

/// Result of a play request. Delivered later as an event, never returned
/// synchronously.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayOutcome {
    Started,
    /// The autoplay policy refused playback without a user gesture.
    Blocked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum GestureKind {
    PointerDown,
    TouchStart,
    Click,
    KeyDown,
}

impl GestureKind {
    pub const ALL: [GestureKind; 4] = [
        GestureKind::PointerDown,
        GestureKind::TouchStart,
        GestureKind::Click,
        GestureKind::KeyDown,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Timer {
    /// Runs startup even if no track ever reports it can play.
    ReadinessFallback,
    /// Periodic save of the background theme's position.
    PersistOffset,
}

/// Audio elements, addressed by track identity.
///
/// All calls are non-blocking. Play outcomes, readiness, end-of-track and
/// load errors come back later as [`crate::Event`]s.
pub trait AudioBackend {
    /// Whether an element for `track` already exists on the page.
    fn contains(&self, track: TrackId) -> bool;
    /// Create the element and start loading `spec.source`.
    fn attach(&mut self, spec: &TrackSpec);
    /// Point an existing element at a different source and reload it.
    fn set_source(&mut self, track: TrackId, source: &Path);
    fn ready_state(&self, track: TrackId) -> ReadyState;
    fn set_muted(&mut self, track: TrackId, muted: bool);
    fn is_muted(&self, track: TrackId) -> bool;
    fn seek(&mut self, track: TrackId, seconds: f64);
    fn current_time(&self, track: TrackId) -> f64;
    /// Known once the source has loaded.
    fn duration(&self, track: TrackId) -> Option<f64>;
    fn request_play(&mut self, track: TrackId);
    fn pause(&mut self, track: TrackId);
}

/// The page the orchestrator lives on: identity, overlay, the mute button,
/// gesture listeners and timers.
pub trait PageHost {
    fn path(&self) -> &str;
    fn has_intro_overlay(&self) -> bool;
    /// Start observing the overlay; its removal arrives as
    /// [`crate::Event::OverlayRemoved`].
    fn watch_overlay(&mut self);

    fn has_mute_button(&self) -> bool;
    fn create_mute_button(&mut self, hidden: bool);
    fn set_mute_button_visible(&mut self, visible: bool);
    fn style_mute_button(&mut self, style: ButtonStyle);

    fn add_gesture_listener(&mut self, kind: GestureKind);
    fn remove_gesture_listener(&mut self, kind: GestureKind);

    fn schedule(&mut self, timer: Timer, after: Duration);
    fn cancel(&mut self, timer: Timer);
}
