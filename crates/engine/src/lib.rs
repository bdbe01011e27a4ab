mod mixer;

use std::sync::Arc;

use basedrop::{Collector, Handle, Shared};
use cpal::{
    FromSample, SizedSample,
    traits::{DeviceTrait, HostTrait, StreamTrait},
};
use hook_transport::{Command, Status};

pub use mixer::{Mixer, VoiceLoad, VoicePositions, VoiceSource};

pub type SharedVoice = Shared<VoiceSource>;

pub struct AudioEngineHandle {
    pub commands: rtrb::Producer<Command>,
    /// Started/Ended only; read heads are in `positions`.
    pub status: rtrb::Consumer<Status>,
    pub voices: rtrb::Producer<VoiceLoad>,
    pub positions: Arc<VoicePositions>,
    pub collector: Collector,
    pub handle: Handle,
    pub sample_rate: u32,
    /// `None` for a detached engine.
    _stream: Option<cpal::Stream>,
}

impl AudioEngineHandle {
    /// Wrap decoded audio so it can cross into the callback and be dropped
    /// back on this side.
    pub fn share(&self, source: VoiceSource) -> SharedVoice {
        Shared::new(&self.handle, source)
    }
}

/// The callback's end of the engine rings.
pub struct Renderer {
    mixer: Mixer,
    commands: rtrb::Consumer<Command>,
    voices: rtrb::Consumer<VoiceLoad>,
    status: rtrb::Producer<Status>,
    output_channels: usize,
    frame_buf: Vec<f32>,
}

impl Renderer {
    /// Apply queued commands and loads, then fill `data` with interleaved
    /// frames.
    pub fn render<T>(&mut self, data: &mut [T])
    where
        T: SizedSample + FromSample<f32>,
    {
        // Commands before loads, so an Unload never removes a voice that
        // arrived in the same period
        while let Ok(cmd) = self.commands.pop() {
            self.mixer.apply(cmd);
        }
        while let Ok(load) = self.voices.pop() {
            self.mixer.load(load);
        }

        let status_tx = &mut self.status;
        for frame in data.chunks_mut(self.output_channels) {
            self.mixer.next_frame(&mut self.frame_buf, &mut |status| {
                let _ = status_tx.push(status);
            });
            for (sample, mixed) in frame.iter_mut().zip(self.frame_buf.iter()) {
                *sample = T::from_sample(*mixed);
            }
        }
    }

    pub fn mixer(&self) -> &Mixer {
        &self.mixer
    }
}

/// Wire up the engine without an output device. The caller drives the
/// returned [`Renderer`] itself.
pub fn detached(sample_rate: u32, output_channels: usize) -> (AudioEngineHandle, Renderer) {
    let output_channels = output_channels.max(1);
    let collector = Collector::new();
    let handle = collector.handle();
    let positions = Arc::new(VoicePositions::default());

    let (command_tx, command_rx) = rtrb::RingBuffer::<Command>::new(64);
    let (status_tx, status_rx) = rtrb::RingBuffer::<Status>::new(256);
    let (voices_tx, voices_rx) = rtrb::RingBuffer::<VoiceLoad>::new(8);

    let renderer = Renderer {
        mixer: Mixer::new(output_channels, positions.clone()),
        commands: command_rx,
        voices: voices_rx,
        status: status_tx,
        output_channels,
        frame_buf: vec![0.0; output_channels],
    };

    let engine = AudioEngineHandle {
        commands: command_tx,
        status: status_rx,
        voices: voices_tx,
        positions,
        collector,
        handle,
        sample_rate,
        _stream: None,
    };

    (engine, renderer)
}

pub fn start() -> anyhow::Result<AudioEngineHandle> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| anyhow::anyhow!("no output device found"))?;

    let config = device.default_output_config()?;
    let sample_rate = config.sample_rate().0;
    let (mut engine, renderer) = detached(sample_rate, config.channels() as usize);

    let stream = match config.sample_format() {
        cpal::SampleFormat::F32 => build_stream::<f32>(&device, &config.into(), renderer)?,
        cpal::SampleFormat::I16 => build_stream::<i16>(&device, &config.into(), renderer)?,
        sample_format => anyhow::bail!("unsupported sample format '{sample_format}'"),
    };

    stream.play()?;
    tracing::info!(sample_rate, "audio output started");

    engine._stream = Some(stream);
    Ok(engine)
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    mut renderer: Renderer,
) -> anyhow::Result<cpal::Stream>
where
    T: SizedSample + FromSample<f32>,
{
    let stream = device.build_output_stream(
        config,
        move |data: &mut [T], _: &cpal::OutputCallbackInfo| renderer.render(data),
        |err| tracing::error!("stream error: {err}"),
        None,
    )?;

    Ok(stream)
}
