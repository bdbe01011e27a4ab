use hook_transport::TrackId;

use crate::host::{GestureKind, PlayOutcome, Timer};

/// Everything that can wake the orchestrator up.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// The intro overlay left the page.
    OverlayRemoved,
    /// A track buffered enough to start.
    CanPlay(TrackId),
    PlayOutcome {
        track: TrackId,
        outcome: PlayOutcome,
    },
    /// A one-shot track played to its end.
    Ended(TrackId),
    /// The track's current source failed to load or decode.
    Error { track: TrackId, message: String },
    Gesture(GestureKind),
    TimerFired(Timer),
    MuteClicked,
    /// The page's explicit "play the jingle" control.
    CallToAction,
}
