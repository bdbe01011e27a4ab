//! Voice mixing, kept free of any device so it can be driven from tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use basedrop::Shared;
use hook_transport::{AudioArc, Command, Status, TrackId};

/// Decoded audio plus the fixed playback parameters of one track.
#[derive(Debug)]
pub struct VoiceSource {
    /// Already resampled to the output rate.
    pub audio: AudioArc,
    pub looping: bool,
    pub volume: f32,
    pub rate: f32,
}

pub struct VoiceLoad {
    pub track: TrackId,
    pub source: Shared<VoiceSource>,
}

/// Latest read head of every voice, in source frames.
///
/// Written by the callback and read from the control thread. Only the newest
/// value matters, so each track gets one slot rather than a queue entry.
#[derive(Debug, Default)]
pub struct VoicePositions([AtomicU64; 3]);

impl VoicePositions {
    pub fn get(&self, track: TrackId) -> u64 {
        self.0[track.index()].load(Ordering::Relaxed)
    }

    fn set(&self, track: TrackId, frame: u64) {
        self.0[track.index()].store(frame, Ordering::Relaxed);
    }
}

struct Voice {
    source: Shared<VoiceSource>,
    /// Fractional read head, in source frames.
    position: f64,
    playing: bool,
    muted: bool,
    /// Whether `Started` has been reported for the current play command.
    announced: bool,
}

pub struct Mixer {
    voices: [Option<Voice>; 3],
    /// Commands that arrived before their voice was loaded.
    pending: [PendingState; 3],
    positions: Arc<VoicePositions>,
    output_channels: usize,
}

#[derive(Clone, Copy, Default)]
struct PendingState {
    play: bool,
    muted: bool,
    seek: Option<u64>,
}

impl Mixer {
    pub fn new(output_channels: usize, positions: Arc<VoicePositions>) -> Self {
        Self {
            voices: [None, None, None],
            pending: [PendingState::default(); 3],
            positions,
            output_channels: output_channels.max(1),
        }
    }

    /// Install decoded audio for a track. A fresh voice picks up the commands
    /// that arrived before it; an existing one keeps its play state and read
    /// head and only swaps the audio.
    pub fn load(&mut self, load: VoiceLoad) {
        let slot = load.track.index();
        let pending = std::mem::take(&mut self.pending[slot]);
        let voice = match self.voices[slot].take() {
            Some(current) => {
                let frames = load.source.audio.frames() as f64;
                Voice {
                    position: current.position.min(frames),
                    source: load.source,
                    ..current
                }
            }
            None => Voice {
                source: load.source,
                position: pending.seek.unwrap_or(0) as f64,
                playing: pending.play,
                muted: pending.muted,
                announced: false,
            },
        };
        self.positions.set(load.track, voice.position as u64);
        self.voices[slot] = Some(voice);
    }

    pub fn apply(&mut self, cmd: Command) {
        match cmd {
            Command::Play { track } => match self.voices[track.index()].as_mut() {
                Some(voice) => {
                    voice.playing = true;
                    voice.announced = false;
                }
                None => self.pending[track.index()].play = true,
            },
            Command::Pause { track } => match self.voices[track.index()].as_mut() {
                Some(voice) => voice.playing = false,
                None => self.pending[track.index()].play = false,
            },
            Command::Seek { track, frame } => match self.voices[track.index()].as_mut() {
                Some(voice) => {
                    let frames = voice.source.audio.frames() as u64;
                    voice.position = frame.min(frames) as f64;
                    self.positions.set(track, voice.position as u64);
                }
                None => self.pending[track.index()].seek = Some(frame),
            },
            Command::SetMuted { track, muted } => {
                match self.voices[track.index()].as_mut() {
                    Some(voice) => voice.muted = muted,
                    None => self.pending[track.index()].muted = muted,
                }
            }
            Command::Unload { track } => {
                self.voices[track.index()] = None;
                self.pending[track.index()] = PendingState::default();
                self.positions.set(track, 0);
            }
        }
    }

    pub fn is_playing(&self, track: TrackId) -> bool {
        self.voices[track.index()]
            .as_ref()
            .is_some_and(|voice| voice.playing)
    }

    pub fn position(&self, track: TrackId) -> Option<u64> {
        self.voices[track.index()]
            .as_ref()
            .map(|voice| voice.position as u64)
    }

    /// Mix one output frame into `out` (length = output channels), reporting
    /// lifecycle changes through `emit` and publishing read heads.
    pub fn next_frame(&mut self, out: &mut [f32], emit: &mut impl FnMut(Status)) {
        out.fill(0.0);

        for track in TrackId::ALL {
            let Some(voice) = self.voices[track.index()].as_mut() else {
                continue;
            };
            if !voice.playing {
                continue;
            }

            let audio = &voice.source.audio;
            let total_frames = audio.frames();
            if total_frames == 0 {
                voice.playing = false;
                emit(Status::Ended(track));
                continue;
            }

            if voice.position >= total_frames as f64 {
                if voice.source.looping {
                    voice.position %= total_frames as f64;
                } else {
                    voice.playing = false;
                    emit(Status::Ended(track));
                    continue;
                }
            }

            if !voice.announced {
                voice.announced = true;
                emit(Status::Started(track));
            }

            // Muted voices keep advancing, they just contribute nothing
            if !voice.muted {
                let src_channels = audio.channels() as usize;
                let frame_index = voice.position as usize;
                let gain = voice.source.volume;
                let samples = audio.samples();
                for (ch, mix_sample) in out.iter_mut().enumerate() {
                    let idx = frame_index * src_channels + ch % src_channels;
                    if let Some(sample) = samples.get(idx) {
                        *mix_sample += sample * gain;
                    }
                }
            }

            voice.position += voice.source.rate as f64;
            self.positions.set(track, voice.position as u64);
        }

        debug_assert_eq!(out.len(), self.output_channels);
    }
}
