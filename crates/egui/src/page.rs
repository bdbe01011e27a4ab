use std::collections::{BTreeMap, BTreeSet};
use std::time::{Duration, Instant};

use hook_core::{ButtonStyle, Event, GestureKind, PageHost, Timer};

const OVERLAY_FADE: Duration = Duration::from_millis(800);

/// The intro splash: fully opaque for `hold`, then fading out.
#[derive(Debug, Clone, Copy)]
pub struct Overlay {
    shown_at: Instant,
    hold: Duration,
}

impl Overlay {
    pub fn new(shown_at: Instant, hold: Duration) -> Self {
        Self { shown_at, hold }
    }

    pub fn opacity(&self, now: Instant) -> f32 {
        let elapsed = now.saturating_duration_since(self.shown_at);
        let Some(fading) = elapsed.checked_sub(self.hold) else {
            return 1.0;
        };
        (1.0 - fading.as_secs_f32() / OVERLAY_FADE.as_secs_f32()).clamp(0.0, 1.0)
    }

    pub fn is_done(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.shown_at) >= self.hold + OVERLAY_FADE
    }
}

#[derive(Debug, Clone, Copy)]
pub struct MuteButtonState {
    pub visible: bool,
    pub style: ButtonStyle,
}

/// Chrome of the page currently shown by the shell.
#[derive(Debug)]
pub struct ShellPage {
    path: String,
    overlay: Option<Overlay>,
    watching_overlay: bool,
    button: Option<MuteButtonState>,
    listeners: BTreeSet<GestureKind>,
    timers: BTreeMap<Timer, Instant>,
}

impl ShellPage {
    pub fn new(path: impl Into<String>, overlay: Option<Overlay>) -> Self {
        Self {
            path: path.into(),
            overlay,
            watching_overlay: false,
            button: None,
            listeners: BTreeSet::new(),
            timers: BTreeMap::new(),
        }
    }

    pub fn overlay(&self) -> Option<&Overlay> {
        self.overlay.as_ref()
    }

    pub fn mute_button(&self) -> Option<MuteButtonState> {
        self.button
    }

    /// A user interaction; an event only if someone is listening for it.
    pub fn gesture(&self, kind: GestureKind) -> Option<Event> {
        self.listeners
            .contains(&kind)
            .then_some(Event::Gesture(kind))
    }

    /// Fire due timers and finish the overlay.
    pub fn tick(&mut self, now: Instant) -> Vec<Event> {
        let mut events = Vec::new();

        if self.overlay.is_some_and(|overlay| overlay.is_done(now)) {
            self.overlay = None;
            if self.watching_overlay {
                self.watching_overlay = false;
                events.push(Event::OverlayRemoved);
            }
        }

        let due: Vec<Timer> = self
            .timers
            .iter()
            .filter(|(_, at)| **at <= now)
            .map(|(timer, _)| *timer)
            .collect();
        for timer in due {
            self.timers.remove(&timer);
            events.push(Event::TimerFired(timer));
        }

        events
    }
}

impl PageHost for ShellPage {
    fn path(&self) -> &str {
        &self.path
    }

    fn has_intro_overlay(&self) -> bool {
        self.overlay.is_some()
    }

    fn watch_overlay(&mut self) {
        self.watching_overlay = true;
    }

    fn has_mute_button(&self) -> bool {
        self.button.is_some()
    }

    fn create_mute_button(&mut self, hidden: bool) {
        self.button = Some(MuteButtonState {
            visible: !hidden,
            style: ButtonStyle::UNMUTED,
        });
    }

    fn set_mute_button_visible(&mut self, visible: bool) {
        if let Some(button) = self.button.as_mut() {
            button.visible = visible;
        }
    }

    fn style_mute_button(&mut self, style: ButtonStyle) {
        if let Some(button) = self.button.as_mut() {
            button.style = style;
        }
    }

    fn add_gesture_listener(&mut self, kind: GestureKind) {
        self.listeners.insert(kind);
    }

    fn remove_gesture_listener(&mut self, kind: GestureKind) {
        self.listeners.remove(&kind);
    }

    fn schedule(&mut self, timer: Timer, after: Duration) {
        self.timers.insert(timer, Instant::now() + after);
    }

    fn cancel(&mut self, timer: Timer) {
        self.timers.remove(&timer);
    }
}
