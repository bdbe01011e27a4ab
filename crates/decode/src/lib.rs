use std::fs::File;
use std::path::{Path, PathBuf};

use anyhow::Context;
use hook_transport::AudioArc;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

/// Resolve a track source against the asset root.
/// Accepts paths that exist as given (absolute, or relative to the working
/// directory) or paths relative to `asset_root`.
pub fn resolve_source(path: &Path, asset_root: &Path) -> Option<PathBuf> {
    if path.exists() {
        return Some(path.to_path_buf());
    }

    let with_root = asset_root.join(path);
    if with_root.exists() {
        return Some(with_root);
    }

    None
}

/// The single alternative source tried after a load error: the same path with
/// its extension lowercased (`Theme.MP3` -> `Theme.mp3`).
///
/// Returns `None` when there is no extension or it is already lowercase, since
/// retrying the identical path cannot succeed.
pub fn fallback_source(path: &Path) -> Option<PathBuf> {
    let ext = path.extension()?.to_str()?;
    let lower = ext.to_ascii_lowercase();
    if lower == ext {
        return None;
    }
    Some(path.with_extension(lower))
}

/// Decode a track source, resolving it against `asset_root` first.
pub fn decode_source(path: &Path, asset_root: &Path) -> anyhow::Result<AudioArc> {
    let resolved = resolve_source(path, asset_root)
        .ok_or_else(|| anyhow::anyhow!("audio source not found: {}", path.display()))?;
    decode_file(&resolved)
}

pub fn decode_file(path: &Path) -> anyhow::Result<AudioArc> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .with_context(|| format!("probing {}", path.display()))?;

    let mut format = probed.format;

    let track = format
        .default_track()
        .ok_or_else(|| anyhow::anyhow!("no default track in {}", path.display()))?;

    let sample_rate = track.codec_params.sample_rate.unwrap_or(44100);
    let mut channels = track.codec_params.channels.map(|c| c.count()).unwrap_or(2) as u16;
    let track_id = track.id;

    let mut decoder =
        symphonia::default::get_codecs().make(&track.codec_params, &DecoderOptions::default())?;

    let mut samples = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(e) => return Err(e.into()),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            // A corrupt frame in the middle of an mp3 is common; skip it.
            Err(SymphoniaError::DecodeError(_)) => continue,
            Err(e) => return Err(e.into()),
        };
        let spec = *decoded.spec();
        channels = spec.channels.count() as u16;
        let duration = decoded.capacity() as u64;

        let mut sample_buf = SampleBuffer::<f32>::new(duration, spec);
        sample_buf.copy_interleaved_ref(decoded);
        samples.extend_from_slice(sample_buf.samples());
    }

    if channels == 0 {
        anyhow::bail!("{} reports zero channels", path.display());
    }
    // Keep whole frames only
    samples.truncate(samples.len() - samples.len() % channels as usize);

    Ok(AudioArc::new(samples, sample_rate, channels))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn write_wav(path: &Path, channels: u16, sample_rate: u32, frames: usize) {
        let spec = hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).expect("create wav");
        for i in 0..frames {
            let value = ((i % 100) as i16 - 50) * 200;
            for _ in 0..channels {
                writer.write_sample(value).expect("write sample");
            }
        }
        writer.finalize().expect("finalize");
    }

    #[test]
    fn test_fallback_source_lowercases_extension() {
        assert_eq!(
            fallback_source(Path::new("public/Theme.MP3")),
            Some(PathBuf::from("public/Theme.mp3"))
        );
        assert_eq!(
            fallback_source(Path::new("waves.Wav")),
            Some(PathBuf::from("waves.wav"))
        );
    }

    #[test]
    fn test_fallback_source_none_when_nothing_changes() {
        assert_eq!(fallback_source(Path::new("public/theme.mp3")), None);
        assert_eq!(fallback_source(Path::new("public/theme")), None);
    }

    #[test]
    fn test_decode_wav() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("jingle.wav");
        write_wav(&path, 2, 22050, 2205);

        let audio = decode_file(&path).expect("decode");
        assert_eq!(audio.channels(), 2);
        assert_eq!(audio.sample_rate(), 22050);
        assert_eq!(audio.frames(), 2205);
    }

    #[test]
    fn test_decode_source_resolves_against_root() {
        let dir = tempdir().expect("tempdir");
        std::fs::create_dir_all(dir.path().join("public")).expect("mkdir");
        write_wav(&dir.path().join("public/waves.wav"), 1, 8000, 800);

        let audio =
            decode_source(Path::new("public/waves.wav"), dir.path()).expect("decode via root");
        assert_eq!(audio.channels(), 1);
        assert_eq!(audio.frames(), 800);
    }

    #[test]
    fn test_decode_missing_source_errors() {
        let dir = tempdir().expect("tempdir");
        let err = decode_source(Path::new("public/nope.mp3"), dir.path()).unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn test_decode_garbage_errors() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("broken.wav");
        std::fs::write(&path, b"definitely not audio").expect("write");
        assert!(decode_file(&path).is_err());
    }
}
