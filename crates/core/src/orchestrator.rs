use std::collections::BTreeSet;

use hook_decode::fallback_source;
use hook_store::Persistence;
use hook_transport::TrackId;

use crate::config::AudioConfig;
use crate::event::Event;
use crate::gesture::GestureWait;
use crate::host::{AudioBackend, PageHost, PlayOutcome, Timer};
use crate::mute::ButtonStyle;
use crate::registry::{Registry, TrackPhase};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageKind {
    Home,
    Other,
}

impl PageKind {
    pub fn detect(page: &impl PageHost, config: &AudioConfig) -> Self {
        if page.has_intro_overlay() || config.is_home_path(page.path()) {
            PageKind::Home
        } else {
            PageKind::Other
        }
    }

    /// Tracks instantiated on a page of this kind.
    pub fn tracks(self) -> &'static [TrackId] {
        match self {
            PageKind::Home => &TrackId::ALL,
            PageKind::Other => &[TrackId::Waves],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Built, `init` not called yet.
    Created,
    AwaitingOverlay,
    AwaitingReadiness,
    Sequencing,
}

/// What an orchestrator hands back when its page goes away.
pub struct Parts<B, P> {
    pub backend: B,
    pub page: P,
    pub persistence: Persistence,
}

/// Background audio for one page load.
///
/// Owns the page's tracks and drives them from [`Event`]s: startup once the
/// overlay and readiness gates open, jingle-then-theme sequencing, the
/// gesture fallback for blocked autoplay, and the mute toggle.
pub struct Orchestrator<B, P> {
    backend: B,
    page: P,
    persistence: Persistence,
    config: AudioConfig,
    registry: Registry,
    kind: PageKind,
    stage: Stage,
    gesture: GestureWait,
    /// Requests whose refusal must not arm the gesture wait.
    best_effort: BTreeSet<TrackId>,
}

impl<B: AudioBackend, P: PageHost> Orchestrator<B, P> {
    pub fn new(backend: B, page: P, persistence: Persistence, config: AudioConfig) -> Self {
        let kind = PageKind::detect(&page, &config);
        Self {
            backend,
            page,
            persistence,
            config,
            registry: Registry::new(),
            kind,
            stage: Stage::Created,
            gesture: GestureWait::default(),
            best_effort: BTreeSet::new(),
        }
    }

    /// Page-ready entry point. Creates the button and this page's tracks,
    /// then either waits for the overlay or begins startup.
    pub fn init(&mut self) {
        if self.stage != Stage::Created {
            return;
        }

        let overlay = self.page.has_intro_overlay();
        self.registry.get_or_create_mute_button(&mut self.page, overlay);

        let muted = self.persistence.read_muted();
        for &id in self.kind.tracks() {
            let spec = self.config.track(id);
            self.registry.get_or_create_track(&mut self.backend, spec);
            self.backend.set_muted(id, muted);
        }
        self.page.style_mute_button(ButtonStyle::for_muted(muted));

        tracing::info!(page = self.page.path(), kind = ?self.kind, muted, "audio initialized");

        if overlay {
            self.stage = Stage::AwaitingOverlay;
            self.page.watch_overlay();
        } else {
            self.begin_startup();
        }
    }

    pub fn handle(&mut self, event: Event) {
        tracing::trace!(?event, stage = ?self.stage, "audio event");
        match event {
            Event::OverlayRemoved => {
                if self.stage == Stage::AwaitingOverlay {
                    self.registry.reveal_mute_button(&mut self.page);
                    self.begin_startup();
                }
            }
            Event::CanPlay(_) => {
                if self.stage == Stage::AwaitingReadiness {
                    self.page.cancel(Timer::ReadinessFallback);
                    self.run_startup();
                }
            }
            Event::TimerFired(Timer::ReadinessFallback) => {
                if self.stage == Stage::AwaitingReadiness {
                    tracing::debug!("readiness fallback fired");
                    self.run_startup();
                }
            }
            Event::TimerFired(Timer::PersistOffset) => self.persist_offset(true),
            Event::PlayOutcome { track, outcome } => self.on_outcome(track, outcome),
            Event::Ended(track) => self.on_ended(track),
            Event::Error { track, message } => self.on_error(track, &message),
            Event::Gesture(kind) => {
                let Some(retry) = self.gesture.disarm(&mut self.page) else {
                    return;
                };
                tracing::debug!(?kind, tracks = retry.len(), "gesture received, retrying playback");
                for track in retry {
                    if self.phase(track) == Some(TrackPhase::Blocked) {
                        self.request(track);
                    }
                }
            }
            Event::MuteClicked => self.toggle_mute(),
            Event::CallToAction => self.play_call_to_action(),
        }
    }

    /// Flip the persisted mute flag and apply it everywhere. Unmuting also
    /// nudges any track that should be playing but is not.
    pub fn toggle_mute(&mut self) {
        let muted = !self.persistence.read_muted();
        self.persistence.write_muted(muted);
        self.apply_muted(muted);
        tracing::info!(muted, "mute toggled");

        if muted || self.stage != Stage::Sequencing {
            return;
        }

        let mut resume = Vec::with_capacity(2);
        if !self.jingle_done() {
            resume.push(TrackId::Jingle);
        } else if !self.persistence.has_played(TrackId::Background) && !self.jingle_active() {
            resume.push(TrackId::Background);
        }
        resume.push(TrackId::Waves);

        for track in resume {
            let Some(entry) = self.registry.track_mut(track) else {
                continue;
            };
            if !matches!(entry.phase, TrackPhase::Idle | TrackPhase::Blocked) {
                continue;
            }
            entry.phase = TrackPhase::Starting;
            entry.wanted = true;
            self.best_effort.insert(track);
            self.backend.request_play(track);
        }
    }

    /// Force unmuted and restart the jingle from the top, regardless of the
    /// session flags.
    pub fn play_call_to_action(&mut self) {
        self.persistence.write_muted(false);
        self.apply_muted(false);

        let spec = self.config.track(TrackId::Jingle);
        let entry = self.registry.get_or_create_track(&mut self.backend, spec);
        if entry.phase == TrackPhase::Failed {
            return;
        }
        entry.phase = TrackPhase::Starting;
        entry.wanted = true;
        self.backend.set_muted(TrackId::Jingle, false);
        self.backend.seek(TrackId::Jingle, 0.0);
        self.best_effort.insert(TrackId::Jingle);
        self.backend.request_play(TrackId::Jingle);
        tracing::info!("jingle started from call to action");
    }

    /// Tear down for navigation or unload and hand back the parts.
    pub fn unload(mut self) -> Parts<B, P> {
        self.gesture.disarm(&mut self.page);
        self.page.cancel(Timer::ReadinessFallback);
        self.page.cancel(Timer::PersistOffset);
        self.persist_offset(false);
        let ids: Vec<TrackId> = self.registry.ids().collect();
        for id in ids {
            self.backend.pause(id);
        }
        Parts {
            backend: self.backend,
            page: self.page,
            persistence: self.persistence,
        }
    }

    fn begin_startup(&mut self) {
        self.stage = Stage::AwaitingReadiness;
        if self.all_ready() {
            self.run_startup();
        } else {
            tracing::debug!("audio not ready, deferring startup");
            self.page
                .schedule(Timer::ReadinessFallback, self.config.readiness_fallback());
        }
    }

    /// Failed tracks never become ready and are left out.
    fn all_ready(&self) -> bool {
        self.kind
            .tracks()
            .iter()
            .filter(|&&id| self.phase(id) != Some(TrackPhase::Failed))
            .all(|&id| self.backend.ready_state(id).can_start())
    }

    fn run_startup(&mut self) {
        self.stage = Stage::Sequencing;

        if self.kind == PageKind::Home {
            if !self.jingle_done() {
                self.request(TrackId::Jingle);
            } else if !self.persistence.has_played(TrackId::Background) {
                self.request(TrackId::Background);
            }
            self.page
                .schedule(Timer::PersistOffset, self.config.offset_persist_interval());
        }
        self.request(TrackId::Waves);
    }

    /// Sequencer play request: position reset (or resume for the theme when
    /// configured), mute re-applied, outcome awaited.
    fn request(&mut self, track: TrackId) {
        let start = self.start_position(track);
        let muted = self.persistence.read_muted();
        let Some(entry) = self.registry.track_mut(track) else {
            return;
        };
        if entry.phase == TrackPhase::Failed {
            return;
        }
        entry.phase = TrackPhase::Starting;
        entry.wanted = true;
        self.best_effort.remove(&track);

        self.backend.seek(track, start);
        self.backend.set_muted(track, muted);
        self.backend.request_play(track);
        tracing::debug!(%track, start, "play requested");
    }

    fn start_position(&self, track: TrackId) -> f64 {
        if track != TrackId::Background || !self.config.resume_background {
            return 0.0;
        }
        let Some(offset) = self.persistence.read_offset() else {
            return 0.0;
        };
        match self.backend.duration(track) {
            Some(duration) if duration > 0.0 => offset % duration,
            _ => offset,
        }
    }

    fn on_outcome(&mut self, track: TrackId, outcome: PlayOutcome) {
        let best_effort = self.best_effort.remove(&track);
        let Some(entry) = self.registry.track_mut(track) else {
            return;
        };
        if !matches!(entry.phase, TrackPhase::Starting | TrackPhase::Blocked) {
            return;
        }

        match outcome {
            PlayOutcome::Started => {
                entry.phase = TrackPhase::Playing;
                // Only a real start counts; a request alone could have been refused
                self.persistence.mark_played(track);
                self.gesture.remove(track);
                self.gesture.disarm_if_empty(&mut self.page);
                tracing::debug!(%track, "playing");
            }
            PlayOutcome::Blocked => {
                entry.phase = TrackPhase::Blocked;
                if best_effort {
                    tracing::debug!(%track, "best-effort play refused");
                } else {
                    tracing::debug!(%track, "autoplay blocked");
                    self.gesture.insert(track, &mut self.page);
                }
            }
        }
    }

    fn on_ended(&mut self, track: TrackId) {
        let Some(entry) = self.registry.track_mut(track) else {
            return;
        };
        entry.phase = TrackPhase::Ended;
        tracing::debug!(%track, "ended");

        if track == TrackId::Jingle {
            self.follow_jingle();
        }
    }

    /// Start the theme once the jingle is out of the way, if this session
    /// has not heard it yet.
    fn follow_jingle(&mut self) {
        let background_active = self
            .registry
            .track(TrackId::Background)
            .is_some_and(|track| track.is_active());
        if self.kind == PageKind::Home
            && self.stage == Stage::Sequencing
            && !background_active
            && !self.persistence.has_played(TrackId::Background)
        {
            self.request(TrackId::Background);
        }
    }

    fn on_error(&mut self, track: TrackId, message: &str) {
        let Some(entry) = self.registry.track_mut(track) else {
            return;
        };
        if entry.phase == TrackPhase::Failed {
            return;
        }

        if !entry.fallback_tried {
            entry.fallback_tried = true;
            if let Some(fallback) = fallback_source(&entry.source) {
                tracing::warn!(
                    %track,
                    fallback = %fallback.display(),
                    "audio failed to load ({message}), trying fallback source"
                );
                entry.source = fallback.clone();
                let retry = entry.wanted;
                self.backend.set_source(track, &fallback);
                if retry {
                    self.request(track);
                }
                return;
            }
        }

        tracing::warn!(%track, "audio failed to load ({message}), giving up");
        entry.phase = TrackPhase::Failed;
        self.gesture.remove(track);
        self.gesture.disarm_if_empty(&mut self.page);

        if self.registry.all_failed() {
            // Nothing can play; show the button as muted without persisting it
            self.page.style_mute_button(ButtonStyle::for_muted(true));
        }

        if self.stage == Stage::AwaitingReadiness && self.all_ready() {
            self.page.cancel(Timer::ReadinessFallback);
            self.run_startup();
        } else if track == TrackId::Jingle {
            self.follow_jingle();
        }
    }

    fn apply_muted(&mut self, muted: bool) {
        let ids: Vec<TrackId> = self.registry.ids().collect();
        for id in ids {
            self.backend.set_muted(id, muted);
        }
        self.page.style_mute_button(ButtonStyle::for_muted(muted));
    }

    /// Played this session, or unable to load: either way the theme may go.
    fn jingle_done(&self) -> bool {
        self.persistence.has_played(TrackId::Jingle)
            || self.phase(TrackId::Jingle) == Some(TrackPhase::Failed)
    }

    fn jingle_active(&self) -> bool {
        self.registry
            .track(TrackId::Jingle)
            .is_some_and(|track| track.is_active())
    }

    fn persist_offset(&mut self, reschedule: bool) {
        if self.phase(TrackId::Background) == Some(TrackPhase::Playing) {
            let position = self.backend.current_time(TrackId::Background);
            self.persistence.write_offset(position);
        }
        if reschedule && self.stage == Stage::Sequencing {
            self.page
                .schedule(Timer::PersistOffset, self.config.offset_persist_interval());
        }
    }

    pub fn phase(&self, track: TrackId) -> Option<TrackPhase> {
        self.registry.track(track).map(|t| t.phase)
    }

    pub fn muted(&self) -> bool {
        self.persistence.read_muted()
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn kind(&self) -> PageKind {
        self.kind
    }

    pub fn is_waiting_for_gesture(&self) -> bool {
        self.gesture.is_armed()
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn page(&self) -> &P {
        &self.page
    }

    pub fn page_mut(&mut self) -> &mut P {
        &mut self.page
    }

    pub fn persistence(&self) -> &Persistence {
        &self.persistence
    }
}
