use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};
use serde::{Deserialize, Serialize};

/// Identity of one of the page's fixed audio tracks.
///
/// The set is closed: the orchestrator never plays anything outside of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackId {
    /// Intro jingle, played once per session on the home page.
    Jingle,
    /// Background theme, played once per session after the jingle.
    Background,
    /// Ambient waves, looped on every page.
    Waves,
}

impl TrackId {
    pub const ALL: [TrackId; 3] = [TrackId::Jingle, TrackId::Background, TrackId::Waves];

    /// Stable slot index, used by the engine to address voices without hashing.
    #[inline]
    pub fn index(self) -> usize {
        match self {
            TrackId::Jingle => 0,
            TrackId::Background => 1,
            TrackId::Waves => 2,
        }
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TrackId::Jingle => "jingle",
            TrackId::Background => "background",
            TrackId::Waves => "waves",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoopPolicy {
    Once,
    Forever,
}

impl LoopPolicy {
    pub fn is_looping(self) -> bool {
        matches!(self, LoopPolicy::Forever)
    }
}

/// Static description of a track: where it comes from and how it plays.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackSpec {
    pub id: TrackId,
    pub source: PathBuf,
    pub loop_policy: LoopPolicy,
    /// Linear gain, clamped to 0.0..=1.0 by [`TrackSpec::volume`].
    pub volume: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub playback_rate: Option<f32>,
}

impl TrackSpec {
    /// The built-in spec for each track.
    pub fn default_for(id: TrackId) -> Self {
        let (source, loop_policy, volume) = match id {
            TrackId::Jingle => ("public/jingle.mp3", LoopPolicy::Once, 0.9),
            TrackId::Background => ("public/pirate_theme.mp3", LoopPolicy::Once, 0.5),
            TrackId::Waves => ("public/waves.mp3", LoopPolicy::Forever, 0.22),
        };
        Self {
            id,
            source: PathBuf::from(source),
            loop_policy,
            volume,
            playback_rate: None,
        }
    }

    pub fn volume(&self) -> f32 {
        self.volume.clamp(0.0, 1.0)
    }

    pub fn playback_rate(&self) -> f32 {
        match self.playback_rate {
            Some(rate) if rate.is_finite() && rate > 0.0 => rate,
            _ => 1.0,
        }
    }
}

/// Commands sent from the control thread to the audio callback.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    Play { track: TrackId },
    Pause { track: TrackId },
    /// Move the voice's read head, in source frames.
    Seek { track: TrackId, frame: u64 },
    SetMuted { track: TrackId, muted: bool },
    Unload { track: TrackId },
}

/// Lifecycle observations reported back from the audio callback.
///
/// At most one `Started` and one `Ended` per play command, so the queue stays
/// bounded by what the control thread asked for. Read heads are published
/// separately.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Status {
    /// The voice rendered its first frame after a play command.
    Started(TrackId),
    /// A one-shot voice ran past its last frame.
    Ended(TrackId),
}

/// Shared, immutable audio sample data.
///
/// Cloning only bumps the reference count, so a decoded track can be handed
/// to the engine while the loader keeps its own copy.
#[derive(Clone)]
pub struct AudioArc {
    /// Interleaved samples, `[L, R, L, R, ...]` for stereo.
    samples: Arc<[f32]>,
    sample_rate: u32,
    channels: u16,
}

impl AudioArc {
    /// # Panics
    ///
    /// Panics if `channels` is 0 or if `samples.len()` is not divisible by `channels`.
    pub fn new(samples: Vec<f32>, sample_rate: u32, channels: u16) -> Self {
        assert!(channels > 0, "channels must be greater than 0");
        assert_eq!(
            samples.len() % channels as usize,
            0,
            "samples.len() must be divisible by channels"
        );
        Self {
            samples: Arc::from(samples),
            sample_rate,
            channels,
        }
    }

    #[inline]
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn samples_arc(&self) -> &Arc<[f32]> {
        &self.samples
    }

    #[inline]
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    #[inline]
    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Number of frames (samples per channel).
    #[inline]
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels as usize
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration_secs(&self) -> f64 {
        self.frames() as f64 / self.sample_rate as f64
    }

    /// Frame index for a position in seconds, wrapped into the buffer.
    ///
    /// Non-finite or negative positions map to frame 0.
    pub fn frame_at(&self, seconds: f64) -> u64 {
        let frames = self.frames() as u64;
        if frames == 0 || !seconds.is_finite() || seconds <= 0.0 {
            return 0;
        }
        ((seconds * self.sample_rate as f64) as u64) % frames
    }

    /// Resample this audio to a target sample rate.
    ///
    /// If the audio is already at the target rate, returns a cheap clone.
    pub fn resample(&self, target_sample_rate: u32) -> anyhow::Result<Self> {
        if self.sample_rate == target_sample_rate {
            return Ok(self.clone());
        }

        resample_audio_arc(self, target_sample_rate)
    }
}

impl fmt::Debug for AudioArc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AudioArc")
            .field("frames", &self.frames())
            .field("sample_rate", &self.sample_rate)
            .field("channels", &self.channels)
            .field("duration_secs", &self.duration_secs())
            .finish()
    }
}

/// Resample an `AudioArc` to a target sample rate with sinc interpolation.
pub fn resample_audio_arc(audio: &AudioArc, target_sample_rate: u32) -> anyhow::Result<AudioArc> {
    if audio.sample_rate == target_sample_rate {
        return Ok(audio.clone());
    }
    if audio.is_empty() {
        return Ok(AudioArc::new(Vec::new(), target_sample_rate, audio.channels));
    }

    let channels = audio.channels as usize;
    let input_frames = audio.frames();
    let resample_ratio = target_sample_rate as f64 / audio.sample_rate as f64;

    // rubato wants one Vec per channel
    let mut input_channels = vec![Vec::with_capacity(input_frames); channels];
    for frame in audio.samples().chunks_exact(channels) {
        for (ch, sample) in frame.iter().enumerate() {
            input_channels[ch].push(*sample);
        }
    }

    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };

    let mut resampler =
        SincFixedIn::<f32>::new(resample_ratio, 2.0, params, input_frames, channels)?;
    let output_channels = resampler.process(&input_channels, None)?;

    let output_frames = output_channels[0].len();
    let mut output_samples = Vec::with_capacity(output_frames * channels);
    for frame_idx in 0..output_frames {
        for channel in &output_channels {
            output_samples.push(channel[frame_idx]);
        }
    }

    Ok(AudioArc::new(
        output_samples,
        target_sample_rate,
        audio.channels,
    ))
}
