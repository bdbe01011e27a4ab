use std::path::PathBuf;
use std::time::Duration;

use hook_engine::{VoiceLoad, VoiceSource};
use hook_transport::{Command, Status, TrackId};

fn main() -> anyhow::Result<()> {
    let path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("public/jingle.mp3"));

    let mut engine = hook_engine::start()?;
    let audio = hook_decode::decode_file(&path)?.resample(engine.sample_rate)?;
    println!("Loaded {}: {audio:?}", path.display());

    let source = engine.share(VoiceSource {
        audio,
        looping: false,
        volume: 0.9,
        rate: 1.0,
    });
    let track = TrackId::Jingle;
    if engine.voices.push(VoiceLoad { track, source }).is_err()
        || engine.commands.push(Command::Play { track }).is_err()
    {
        anyhow::bail!("engine queues full");
    }

    loop {
        while let Ok(status) = engine.status.pop() {
            match status {
                Status::Started(_) => println!("started"),
                Status::Ended(_) => {
                    println!("ended");
                    return Ok(());
                }
            }
        }
        let frame = engine.positions.get(track);
        println!("position: {:.2}s", frame as f64 / engine.sample_rate as f64);
        engine.collector.collect();
        std::thread::sleep(Duration::from_millis(100));
    }
}
