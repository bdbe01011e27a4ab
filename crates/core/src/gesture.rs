use std::collections::BTreeSet;

use hook_transport::TrackId;

use crate::host::{GestureKind, PageHost};

/// Tracks whose play was blocked, waiting for the first user gesture.
///
/// The listeners are added and removed as one set of four. `disarm` removes
/// them before the caller retries anything, so a second near-simultaneous
/// gesture finds nothing armed and is ignored.
#[derive(Debug, Default)]
pub struct GestureWait {
    blocked: BTreeSet<TrackId>,
    armed: bool,
}

impl GestureWait {
    pub fn insert(&mut self, track: TrackId, page: &mut impl PageHost) {
        self.blocked.insert(track);
        if !self.armed {
            self.armed = true;
            for kind in GestureKind::ALL {
                page.add_gesture_listener(kind);
            }
            tracing::debug!("waiting for a user gesture to start audio");
        }
    }

    pub fn remove(&mut self, track: TrackId) {
        self.blocked.remove(&track);
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    /// Remove every listener and hand back the tracks to retry. Returns
    /// `None` when not armed.
    pub fn disarm(&mut self, page: &mut impl PageHost) -> Option<BTreeSet<TrackId>> {
        if !self.armed {
            return None;
        }
        self.armed = false;
        for kind in GestureKind::ALL {
            page.remove_gesture_listener(kind);
        }
        Some(std::mem::take(&mut self.blocked))
    }

    /// Drop the listeners once nothing is left to resume.
    pub fn disarm_if_empty(&mut self, page: &mut impl PageHost) {
        if self.armed && self.blocked.is_empty() {
            self.disarm(page);
        }
    }
}
