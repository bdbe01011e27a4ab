//! Recording implementations of the host traits for tests.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::path::{Path, PathBuf};
use std::time::Duration;

use hook_transport::{TrackId, TrackSpec};

use crate::event::Event;
use crate::host::{AudioBackend, GestureKind, PageHost, PlayOutcome, ReadyState, Timer};
use crate::mute::ButtonStyle;

#[derive(Debug, Clone)]
pub struct FakeElement {
    pub source: PathBuf,
    pub ready: ReadyState,
    pub muted: bool,
    pub position: f64,
    pub duration: Option<f64>,
}

/// Backend whose play outcomes are queued as events. While `blocked` is set
/// every play request is refused, like a browser before any user activation.
#[derive(Debug)]
pub struct FakeBackend {
    pub elements: BTreeMap<TrackId, FakeElement>,
    pub attach_calls: usize,
    pub plays: Vec<TrackId>,
    pub seeks: Vec<(TrackId, f64)>,
    pub blocked: bool,
    /// Ready state given to newly attached elements.
    pub initial_ready: ReadyState,
    pub queue: VecDeque<Event>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self {
            elements: BTreeMap::new(),
            attach_calls: 0,
            plays: Vec::new(),
            seeks: Vec::new(),
            blocked: false,
            initial_ready: ReadyState::HaveEnoughData,
            queue: VecDeque::new(),
        }
    }

    pub fn blocked() -> Self {
        Self {
            blocked: true,
            ..Self::new()
        }
    }

    pub fn plays_of(&self, track: TrackId) -> usize {
        self.plays.iter().filter(|t| **t == track).count()
    }

    pub fn drain(&mut self) -> Vec<Event> {
        self.queue.drain(..).collect()
    }
}

impl AudioBackend for FakeBackend {
    fn contains(&self, track: TrackId) -> bool {
        self.elements.contains_key(&track)
    }

    fn attach(&mut self, spec: &TrackSpec) {
        self.attach_calls += 1;
        self.elements.insert(
            spec.id,
            FakeElement {
                source: spec.source.clone(),
                ready: self.initial_ready,
                muted: false,
                position: 0.0,
                duration: Some(30.0),
            },
        );
    }

    fn set_source(&mut self, track: TrackId, source: &Path) {
        if let Some(element) = self.elements.get_mut(&track) {
            element.source = source.to_path_buf();
            element.ready = ReadyState::HaveNothing;
        }
    }

    fn ready_state(&self, track: TrackId) -> ReadyState {
        self.elements
            .get(&track)
            .map_or(ReadyState::HaveNothing, |e| e.ready)
    }

    fn set_muted(&mut self, track: TrackId, muted: bool) {
        if let Some(element) = self.elements.get_mut(&track) {
            element.muted = muted;
        }
    }

    fn is_muted(&self, track: TrackId) -> bool {
        self.elements.get(&track).is_some_and(|e| e.muted)
    }

    fn seek(&mut self, track: TrackId, seconds: f64) {
        self.seeks.push((track, seconds));
        if let Some(element) = self.elements.get_mut(&track) {
            element.position = seconds;
        }
    }

    fn current_time(&self, track: TrackId) -> f64 {
        self.elements.get(&track).map_or(0.0, |e| e.position)
    }

    fn duration(&self, track: TrackId) -> Option<f64> {
        self.elements.get(&track).and_then(|e| e.duration)
    }

    fn request_play(&mut self, track: TrackId) {
        self.plays.push(track);
        let outcome = if self.blocked {
            PlayOutcome::Blocked
        } else {
            PlayOutcome::Started
        };
        self.queue.push_back(Event::PlayOutcome { track, outcome });
    }

    fn pause(&mut self, _track: TrackId) {}
}

#[derive(Debug)]
pub struct FakePage {
    pub path: String,
    pub overlay: bool,
    pub watching_overlay: bool,
    pub button_exists: bool,
    pub button_visible: bool,
    pub button_creations: usize,
    pub style: Option<ButtonStyle>,
    pub listeners: BTreeSet<GestureKind>,
    pub listener_adds: usize,
    pub listener_removes: usize,
    pub timers: BTreeMap<Timer, Duration>,
}

impl FakePage {
    pub fn at(path: &str) -> Self {
        Self {
            path: path.to_string(),
            overlay: false,
            watching_overlay: false,
            button_exists: false,
            button_visible: false,
            button_creations: 0,
            style: None,
            listeners: BTreeSet::new(),
            listener_adds: 0,
            listener_removes: 0,
            timers: BTreeMap::new(),
        }
    }

    pub fn home() -> Self {
        Self::at("/")
    }

    pub fn home_with_overlay() -> Self {
        Self {
            overlay: true,
            ..Self::home()
        }
    }

    /// Simulate the overlay finishing; the caller delivers the event.
    pub fn remove_overlay(&mut self) -> Option<Event> {
        self.overlay = false;
        self.watching_overlay.then_some(Event::OverlayRemoved)
    }
}

impl PageHost for FakePage {
    fn path(&self) -> &str {
        &self.path
    }

    fn has_intro_overlay(&self) -> bool {
        self.overlay
    }

    fn watch_overlay(&mut self) {
        self.watching_overlay = true;
    }

    fn has_mute_button(&self) -> bool {
        self.button_exists
    }

    fn create_mute_button(&mut self, hidden: bool) {
        self.button_exists = true;
        self.button_visible = !hidden;
        self.button_creations += 1;
    }

    fn set_mute_button_visible(&mut self, visible: bool) {
        self.button_visible = visible;
    }

    fn style_mute_button(&mut self, style: ButtonStyle) {
        self.style = Some(style);
    }

    fn add_gesture_listener(&mut self, kind: GestureKind) {
        self.listener_adds += 1;
        self.listeners.insert(kind);
    }

    fn remove_gesture_listener(&mut self, kind: GestureKind) {
        self.listener_removes += 1;
        self.listeners.remove(&kind);
    }

    fn schedule(&mut self, timer: Timer, after: Duration) {
        self.timers.insert(timer, after);
    }

    fn cancel(&mut self, timer: Timer) {
        self.timers.remove(&timer);
    }
}
