//! # Decode Pipeline Example
//!
//! Encodes a short stereo tone into a container file, then decodes it on the
//! background scheduler while a consumer thread drains blocks the way a mixer
//! callback would.
//!
//! Run with: `cargo run --example decode_demo --package core-decode -- [buffered|streamed]`

use core_decode::{
    DecodeScheduler, DecoderConfig, FileDecoder, FileEncoder, SchedulerConfig, SourceMode,
};
use core_runtime::events::EventBus;
use core_runtime::logging::{init_logging, LogFormat, LogLevel, LoggingConfig};
use std::env;
use std::thread;
use std::time::Duration;
use tracing::{error, info};

const SAMPLE_RATE: u32 = 48_000;

fn tone(seconds: f32) -> Vec<f32> {
    let frames = (SAMPLE_RATE as f32 * seconds) as usize;
    let mut samples = Vec::with_capacity(frames * 2);
    for i in 0..frames {
        let t = i as f32 / SAMPLE_RATE as f32;
        samples.push((2.0 * std::f32::consts::PI * 440.0 * t).sin() * 0.3);
        samples.push((2.0 * std::f32::consts::PI * 660.0 * t).sin() * 0.3);
    }
    samples
}

fn main() {
    let config = LoggingConfig::default()
        .with_format(LogFormat::Compact)
        .with_level(LogLevel::Debug);
    if let Err(e) = init_logging(config) {
        eprintln!("Failed to initialize logging: {}", e);
        return;
    }

    let mode = match env::args().nth(1).as_deref() {
        Some("streamed") => SourceMode::Streamed,
        _ => SourceMode::Buffered,
    };

    if let Err(e) = run(mode) {
        error!("Demo failed: {}", e);
    }
}

fn run(mode: SourceMode) -> core_decode::Result<()> {
    let dir = env::temp_dir().join("decode-demo");
    std::fs::create_dir_all(&dir)?;
    let path = dir.join("tone.zs");

    let input = tone(1.0);
    FileEncoder::new(2)?.write_to_path(&input, &path)?;
    info!(path = %path.display(), samples = input.len(), "Wrote tone");

    let bus = EventBus::new(64);
    let mut events = bus.subscribe();
    let scheduler = DecodeScheduler::new(SchedulerConfig::default())?.with_event_bus(bus);

    let (decoder, mut blocks) = FileDecoder::open(
        &path,
        mode,
        DecoderConfig::low_latency(),
        core_decode::default_factory(),
        &scheduler,
    )?;

    let mixer = thread::spawn(move || {
        let mut frames = 0usize;
        let mut peak = 0.0f32;
        loop {
            match blocks.pop() {
                Some(block) => {
                    frames += block.frame_count();
                    peak = block.samples().iter().fold(peak, |p, s| p.max(s.abs()));
                }
                None if blocks.is_end_of_stream() || blocks.is_abandoned() => break,
                None => thread::sleep(Duration::from_millis(1)),
            }
        }
        (frames, peak)
    });

    // Keep requesting work until the source runs dry.
    while !decoder.is_end_of_stream() {
        decoder.schedule_decode()?;
        thread::sleep(Duration::from_millis(2));
    }

    let (frames, peak) = mixer.join().unwrap_or((0, 0.0));
    let stats = decoder.stats();
    info!(
        frames,
        peak,
        blocks = stats.blocks_produced,
        deferred = stats.deferred_steps,
        soft_errors = stats.soft_errors,
        "Decode finished"
    );

    drop(decoder);
    while let Ok(event) = events.try_recv() {
        info!(severity = ?event.severity(), "{}", event.description());
    }
    Ok(())
}
