use std::collections::{BTreeMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::mpsc;

use hook_engine::{AudioEngineHandle, VoiceLoad, VoiceSource};
use hook_transport::{AudioArc, Command, Status, TrackId, TrackSpec};
use thiserror::Error;

use crate::config::AutoplayPolicy;
use crate::event::Event;
use crate::host::{AudioBackend, PlayOutcome, ReadyState};

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("failed to load {}: {message}", path.display())]
    Decode { path: PathBuf, message: String },
    #[error(transparent)]
    Engine(#[from] anyhow::Error),
}

struct Element {
    spec: TrackSpec,
    source: PathBuf,
    ready: ReadyState,
    muted: bool,
    /// Loaded audio at the output rate.
    audio: Option<AudioArc>,
    position: u64,
    /// Load this element is waiting for; results with another one are stale.
    generation: u64,
}

struct LoadResult {
    track: TrackId,
    generation: u64,
    result: Result<AudioArc, BackendError>,
}

/// [`AudioBackend`] over the output engine.
///
/// Sources decode on the rayon pool and are handed to the callback once
/// resampled. Call [`EngineBackend::poll`] regularly to collect loads and
/// engine status as [`Event`]s.
pub struct EngineBackend {
    engine: AudioEngineHandle,
    asset_root: PathBuf,
    policy: AutoplayPolicy,
    /// Sticky once the user has interacted.
    activated: bool,
    elements: BTreeMap<TrackId, Element>,
    /// Backend-wide, so no two loads ever share a generation.
    last_generation: u64,
    loads_tx: mpsc::Sender<LoadResult>,
    loads_rx: mpsc::Receiver<LoadResult>,
    events: VecDeque<Event>,
}

impl EngineBackend {
    /// Open the default output device.
    pub fn start(
        asset_root: impl Into<PathBuf>,
        policy: AutoplayPolicy,
    ) -> Result<Self, BackendError> {
        let engine = hook_engine::start()?;
        Ok(Self::new(engine, asset_root, policy))
    }

    pub fn new(
        engine: AudioEngineHandle,
        asset_root: impl Into<PathBuf>,
        policy: AutoplayPolicy,
    ) -> Self {
        let (loads_tx, loads_rx) = mpsc::channel();
        Self {
            engine,
            asset_root: asset_root.into(),
            policy,
            activated: false,
            elements: BTreeMap::new(),
            last_generation: 0,
            loads_tx,
            loads_rx,
            events: VecDeque::new(),
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.engine.sample_rate
    }

    /// Record a user interaction. Later play requests are no longer refused.
    pub fn note_user_activation(&mut self) {
        if !self.activated {
            tracing::debug!("user activation recorded");
        }
        self.activated = true;
    }

    /// Drop every element, as a fresh page load would. User activation is
    /// kept.
    pub fn reset(&mut self) {
        let ids: Vec<TrackId> = self.elements.keys().copied().collect();
        for track in ids {
            self.send(Command::Unload { track });
        }
        self.elements.clear();
        self.events.clear();
        while self.engine.status.pop().is_ok() {}
        // whatever is still decoding carries a generation no element will match
        while self.loads_rx.try_recv().is_ok() {}
    }

    /// Drain finished loads and engine status into events.
    pub fn poll(&mut self) -> Vec<Event> {
        while let Ok(load) = self.loads_rx.try_recv() {
            self.finish_load(load);
        }

        while let Ok(status) = self.engine.status.pop() {
            self.events.push_back(match status {
                Status::Started(track) => Event::PlayOutcome {
                    track,
                    outcome: PlayOutcome::Started,
                },
                Status::Ended(track) => Event::Ended(track),
            });
        }

        for (track, element) in self.elements.iter_mut() {
            if element.audio.is_some() {
                element.position = self.engine.positions.get(*track);
            }
        }

        self.engine.collector.collect();
        self.events.drain(..).collect()
    }

    fn finish_load(&mut self, load: LoadResult) {
        let Some(element) = self.elements.get_mut(&load.track) else {
            return;
        };
        if element.generation != load.generation || element.audio.is_some() {
            tracing::trace!(track = %load.track, "dropping stale load");
            return;
        }

        match load.result {
            Ok(audio) => {
                tracing::debug!(track = %load.track, ?audio, "audio loaded");
                let source = self.engine.share(VoiceSource {
                    audio: audio.clone(),
                    looping: element.spec.loop_policy.is_looping(),
                    volume: element.spec.volume(),
                    rate: element.spec.playback_rate(),
                });
                if self
                    .engine
                    .voices
                    .push(VoiceLoad {
                        track: load.track,
                        source,
                    })
                    .is_err()
                {
                    tracing::warn!(track = %load.track, "voice queue full, dropping load");
                    return;
                }
                element.audio = Some(audio);
                element.ready = ReadyState::HaveEnoughData;
                self.events.push_back(Event::CanPlay(load.track));
            }
            Err(err) => {
                self.events.push_back(Event::Error {
                    track: load.track,
                    message: err.to_string(),
                });
            }
        }
    }

    fn spawn_load(&self, track: TrackId, source: PathBuf, generation: u64) {
        let tx = self.loads_tx.clone();
        let asset_root = self.asset_root.clone();
        let sample_rate = self.engine.sample_rate;
        rayon::spawn(move || {
            let result = hook_decode::decode_source(&source, &asset_root)
                .and_then(|audio| audio.resample(sample_rate))
                .map_err(|err| BackendError::Decode {
                    path: source,
                    message: format!("{err:#}"),
                });
            let _ = tx.send(LoadResult {
                track,
                generation,
                result,
            });
        });
    }

    fn send(&mut self, cmd: Command) {
        if self.engine.commands.push(cmd).is_err() {
            tracing::warn!(?cmd, "command queue full, dropping command");
        }
    }
}

impl AudioBackend for EngineBackend {
    fn contains(&self, track: TrackId) -> bool {
        self.elements.contains_key(&track)
    }

    fn attach(&mut self, spec: &TrackSpec) {
        self.last_generation += 1;
        let generation = self.last_generation;
        let element = Element {
            spec: spec.clone(),
            source: spec.source.clone(),
            ready: ReadyState::HaveNothing,
            muted: false,
            audio: None,
            position: 0,
            generation,
        };
        self.spawn_load(spec.id, element.source.clone(), generation);
        self.elements.insert(spec.id, element);
    }

    fn set_source(&mut self, track: TrackId, source: &Path) {
        let Some(element) = self.elements.get_mut(&track) else {
            return;
        };
        self.last_generation += 1;
        let generation = self.last_generation;
        element.generation = generation;
        element.source = source.to_path_buf();
        element.ready = ReadyState::HaveNothing;
        element.audio = None;
        element.position = 0;
        let muted = element.muted;

        self.send(Command::Unload { track });
        // the new voice starts from the element's mute state
        self.send(Command::SetMuted { track, muted });
        self.spawn_load(track, source.to_path_buf(), generation);
    }

    fn ready_state(&self, track: TrackId) -> ReadyState {
        self.elements
            .get(&track)
            .map_or(ReadyState::HaveNothing, |e| e.ready)
    }

    fn set_muted(&mut self, track: TrackId, muted: bool) {
        let Some(element) = self.elements.get_mut(&track) else {
            return;
        };
        element.muted = muted;
        self.send(Command::SetMuted { track, muted });
    }

    fn is_muted(&self, track: TrackId) -> bool {
        self.elements.get(&track).is_some_and(|e| e.muted)
    }

    fn seek(&mut self, track: TrackId, seconds: f64) {
        let sample_rate = self.engine.sample_rate;
        let Some(element) = self.elements.get_mut(&track) else {
            return;
        };
        let frame = match &element.audio {
            Some(audio) => audio.frame_at(seconds),
            None => seconds_to_frame(seconds, sample_rate),
        };
        element.position = frame;
        self.send(Command::Seek { track, frame });
    }

    fn current_time(&self, track: TrackId) -> f64 {
        self.elements
            .get(&track)
            .map_or(0.0, |e| e.position as f64 / self.engine.sample_rate as f64)
    }

    fn duration(&self, track: TrackId) -> Option<f64> {
        self.elements
            .get(&track)
            .and_then(|e| e.audio.as_ref())
            .map(AudioArc::duration_secs)
    }

    fn request_play(&mut self, track: TrackId) {
        if !self.elements.contains_key(&track) {
            return;
        }
        if self.policy == AutoplayPolicy::RequireGesture && !self.activated {
            self.events.push_back(Event::PlayOutcome {
                track,
                outcome: PlayOutcome::Blocked,
            });
            return;
        }
        self.send(Command::Play { track });
    }

    fn pause(&mut self, track: TrackId) {
        if self.elements.contains_key(&track) {
            self.send(Command::Pause { track });
        }
    }
}

/// Unbounded frame index for a position, before the length is known.
fn seconds_to_frame(seconds: f64, sample_rate: u32) -> u64 {
    if !seconds.is_finite() || seconds <= 0.0 {
        return 0;
    }
    (seconds * sample_rate as f64) as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use hook_engine::Renderer;
    use hook_transport::LoopPolicy;
    use std::thread;
    use std::time::{Duration, Instant};
    use tempfile::{TempDir, tempdir};

    const RATE: u32 = 8_000;

    fn write_wav(path: &Path, frames: usize) {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: RATE,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).expect("create wav");
        for i in 0..frames {
            writer
                .write_sample(((i % 80) as i16 - 40) * 300)
                .expect("write sample");
        }
        writer.finalize().expect("finalize");
    }

    /// A backend over a detached engine, with a `waves.wav` and a
    /// `jingle.wav` under the returned asset root.
    fn backend(policy: AutoplayPolicy) -> (EngineBackend, Renderer, TempDir) {
        let dir = tempdir().expect("tempdir");
        write_wav(&dir.path().join("waves.wav"), 1_600);
        write_wav(&dir.path().join("jingle.wav"), 400);
        let (engine, renderer) = hook_engine::detached(RATE, 2);
        (EngineBackend::new(engine, dir.path(), policy), renderer, dir)
    }

    fn spec(id: TrackId, source: &str) -> TrackSpec {
        TrackSpec {
            id,
            source: PathBuf::from(source),
            loop_policy: LoopPolicy::Once,
            volume: 1.0,
            playback_rate: None,
        }
    }

    fn render(renderer: &mut Renderer, frames: usize) {
        let mut buf = vec![0.0f32; frames * 2];
        renderer.render(&mut buf);
    }

    /// Poll until an event matching `done` shows up, returning everything seen.
    fn poll_until(
        backend: &mut EngineBackend,
        renderer: &mut Renderer,
        done: impl Fn(&Event) -> bool,
    ) -> Vec<Event> {
        let deadline = Instant::now() + Duration::from_secs(10);
        let mut seen = Vec::new();
        while Instant::now() < deadline {
            render(renderer, 64);
            let events = backend.poll();
            let found = events.iter().any(&done);
            seen.extend(events);
            if found {
                return seen;
            }
            thread::sleep(Duration::from_millis(5));
        }
        panic!("timed out, saw {seen:?}");
    }

    fn started(track: TrackId) -> Event {
        Event::PlayOutcome {
            track,
            outcome: PlayOutcome::Started,
        }
    }

    #[test]
    fn test_seconds_to_frame() {
        assert_eq!(seconds_to_frame(0.0, 48_000), 0);
        assert_eq!(seconds_to_frame(1.5, 48_000), 72_000);
        assert_eq!(seconds_to_frame(-3.0, 48_000), 0);
        assert_eq!(seconds_to_frame(f64::NAN, 48_000), 0);
    }

    #[test]
    fn test_decode_error_names_the_path() {
        let err = BackendError::Decode {
            path: PathBuf::from("public/waves.mp3"),
            message: "audio source not found".into(),
        };
        assert_eq!(
            err.to_string(),
            "failed to load public/waves.mp3: audio source not found"
        );
    }

    #[test]
    fn test_load_reports_can_play_and_duration() {
        let (mut backend, mut renderer, _dir) = backend(AutoplayPolicy::Allowed);
        backend.attach(&spec(TrackId::Waves, "waves.wav"));
        assert_eq!(backend.ready_state(TrackId::Waves), ReadyState::HaveNothing);

        poll_until(&mut backend, &mut renderer, |e| {
            *e == Event::CanPlay(TrackId::Waves)
        });
        assert_eq!(backend.ready_state(TrackId::Waves), ReadyState::HaveEnoughData);
        assert_eq!(backend.duration(TrackId::Waves), Some(0.2));
    }

    #[test]
    fn test_missing_source_reports_error() {
        let (mut backend, mut renderer, _dir) = backend(AutoplayPolicy::Allowed);
        backend.attach(&spec(TrackId::Background, "Theme.MP3"));

        let events = poll_until(&mut backend, &mut renderer, |e| {
            matches!(e, Event::Error { .. })
        });
        let Some(Event::Error { track, message }) = events.last() else {
            panic!("expected an error, got {events:?}");
        };
        assert_eq!(*track, TrackId::Background);
        assert!(message.contains("Theme.MP3"), "{message}");
        assert_eq!(backend.ready_state(TrackId::Background), ReadyState::HaveNothing);
    }

    #[test]
    fn test_play_refused_until_user_activation() {
        let (mut backend, mut renderer, _dir) = backend(AutoplayPolicy::RequireGesture);
        backend.attach(&spec(TrackId::Waves, "waves.wav"));
        poll_until(&mut backend, &mut renderer, |e| {
            *e == Event::CanPlay(TrackId::Waves)
        });

        backend.request_play(TrackId::Waves);
        assert_eq!(
            backend.poll(),
            vec![Event::PlayOutcome {
                track: TrackId::Waves,
                outcome: PlayOutcome::Blocked,
            }]
        );
        render(&mut renderer, 64);
        assert!(!renderer.mixer().is_playing(TrackId::Waves));

        backend.note_user_activation();
        backend.request_play(TrackId::Waves);
        poll_until(&mut backend, &mut renderer, |e| *e == started(TrackId::Waves));
        assert!(renderer.mixer().is_playing(TrackId::Waves));

        // activation survives navigation
        backend.reset();
        backend.attach(&spec(TrackId::Jingle, "jingle.wav"));
        backend.request_play(TrackId::Jingle);
        let events = poll_until(&mut backend, &mut renderer, |e| {
            *e == started(TrackId::Jingle)
        });
        assert!(!events.iter().any(|e| matches!(
            e,
            Event::PlayOutcome {
                outcome: PlayOutcome::Blocked,
                ..
            }
        )));
    }

    #[test]
    fn test_one_shot_reports_end() {
        let (mut backend, mut renderer, _dir) = backend(AutoplayPolicy::Allowed);
        backend.attach(&spec(TrackId::Jingle, "jingle.wav"));
        backend.request_play(TrackId::Jingle);

        let events = poll_until(&mut backend, &mut renderer, |e| {
            *e == Event::Ended(TrackId::Jingle)
        });
        let started_at = events
            .iter()
            .position(|e| *e == started(TrackId::Jingle))
            .expect("started");
        let ended_at = events
            .iter()
            .position(|e| *e == Event::Ended(TrackId::Jingle))
            .expect("ended");
        assert!(started_at < ended_at, "{events:?}");
    }

    #[test]
    fn test_reset_drops_loads_for_the_previous_page() {
        let (mut backend, mut renderer, _dir) = backend(AutoplayPolicy::Allowed);
        backend.attach(&spec(TrackId::Waves, "waves.wav"));
        let previous = backend.elements[&TrackId::Waves].generation;

        // navigate away before the decode lands
        backend.reset();
        backend.attach(&spec(TrackId::Waves, "waves.wav"));
        backend.finish_load(LoadResult {
            track: TrackId::Waves,
            generation: previous,
            result: Ok(AudioArc::new(vec![0.0; 16], RATE, 1)),
        });
        assert!(backend.events.is_empty());
        assert!(backend.elements[&TrackId::Waves].audio.is_none());

        poll_until(&mut backend, &mut renderer, |e| {
            *e == Event::CanPlay(TrackId::Waves)
        });
        backend.request_play(TrackId::Waves);
        poll_until(&mut backend, &mut renderer, |e| *e == started(TrackId::Waves));

        // a second result for the live generation changes nothing either
        let current = backend.elements[&TrackId::Waves].generation;
        backend.finish_load(LoadResult {
            track: TrackId::Waves,
            generation: current,
            result: Ok(AudioArc::new(vec![0.0; 16], RATE, 1)),
        });
        assert!(backend.events.is_empty());
        render(&mut renderer, 64);
        assert!(backend.poll().is_empty());
        assert!(renderer.mixer().is_playing(TrackId::Waves));
        assert_eq!(backend.duration(TrackId::Waves), Some(0.2));
    }

    #[test]
    fn test_source_change_outdates_pending_load() {
        let (mut backend, mut renderer, _dir) = backend(AutoplayPolicy::Allowed);
        backend.attach(&spec(TrackId::Jingle, "Jingle.WAV"));
        let first = backend.elements[&TrackId::Jingle].generation;
        backend.set_source(TrackId::Jingle, Path::new("jingle.wav"));
        assert_ne!(backend.elements[&TrackId::Jingle].generation, first);

        let events = poll_until(&mut backend, &mut renderer, |e| {
            *e == Event::CanPlay(TrackId::Jingle)
        });
        assert!(
            !events.iter().any(|e| matches!(e, Event::Error { .. })),
            "{events:?}"
        );
    }
}
