//! Disburser - stereo all-pass scatter effect
//!
//! Captures from one device, runs the engine in the output callback and
//! polls the spectrum on this thread at the display rate.

mod cli;

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use clap::Parser;
use crossbeam_channel::Receiver;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use disburser_core::{
    AudioDevice, AudioEngine, AudioStream, DeviceType, EngineConfig, Event, SharedParams,
    SpectrumAnalyzer,
};

use cli::Args;

fn main() -> anyhow::Result<()> {
    // Initialize tracing for logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("disburser=info,disburser_core=info")),
        )
        .init();

    let args = Args::parse();

    if args.list_devices {
        return list_devices();
    }

    let config = args.engine_config()?;
    let run_duration = args.run_duration()?;
    info!(
        scatter = config.params.scatter,
        cutoff = config.params.cutoff,
        smash = config.params.smash,
        "Starting Disburser"
    );

    let params = Arc::new(SharedParams::new());
    config.params.apply_to(&params);

    let (engine, analyzer) = AudioEngine::new(
        Arc::clone(&params),
        config.stream.sample_rate as f32,
        config.stream.buffer_size as usize,
    )
    .context("Failed to prepare audio engine")?;

    let input = AudioDevice::open(DeviceType::Input, args.input.as_deref())
        .context("Failed to open capture device")?;
    let output = AudioDevice::open(DeviceType::Output, args.output.as_deref())
        .context("Failed to open output device")?;

    let (event_sender, events) = crossbeam_channel::bounded(256);
    let mut stream = AudioStream::new(&config, &input, &output, engine, event_sender)
        .context("Failed to start audio stream")?;

    // A duration too long to add to the clock just runs until killed
    let deadline = run_duration.and_then(|d| Instant::now().checked_add(d));
    run_display(&config, &stream, analyzer, &events, deadline);

    stream.stop();
    drain_events(&events, &mut 0);
    info!("Disburser stopped");
    Ok(())
}

fn list_devices() -> anyhow::Result<()> {
    for device in AudioDevice::enumerate_all()? {
        println!(
            "{:<6} {}{} ({} ch, {:?} Hz)",
            match device.device_type {
                DeviceType::Input => "input",
                DeviceType::Output => "output",
            },
            device.name,
            if device.is_default { " [default]" } else { "" },
            device.max_channels,
            device.sample_rates,
        );
    }
    Ok(())
}

/// Poll the spectrum at the display rate until the deadline, if any
fn run_display(
    config: &EngineConfig,
    stream: &AudioStream,
    mut analyzer: SpectrumAnalyzer,
    events: &Receiver<Event>,
    deadline: Option<Instant>,
) {
    let fps = config.display_fps.max(1);
    let frame = Duration::from_secs(1) / fps;
    let mut underruns = 0u64;
    let mut frame_count = 0u64;

    while deadline.map_or(true, |d| Instant::now() < d) {
        std::thread::sleep(frame);
        frame_count += 1;

        analyzer.compute_spectrum();
        let bands = analyzer.smoothed_bands();
        let (left, right) = stream.get_peaks();

        if tracing::enabled!(tracing::Level::DEBUG) {
            for event in [
                Event::LevelUpdate { left, right },
                Event::SpectrumUpdate {
                    bins: bands.to_vec(),
                },
            ] {
                if let Ok(json) = serde_json::to_string(&event) {
                    debug!("{}", json);
                }
            }
        }

        // Once a second is plenty for the log
        if frame_count % u64::from(fps) == 0 {
            let peak = analyzer.peak_bin();
            info!(
                dominant_hz = analyzer.bin_frequency(peak).round(),
                engaged = stream.is_engaged(),
                scatter = stream.params().snapshot().scatter,
                peak_l = left,
                peak_r = right,
                "Spectrum"
            );
        }

        drain_events(events, &mut underruns);
    }

    if underruns > 0 {
        warn!(underruns, "Buffer underruns during run");
    }
}

fn drain_events(events: &Receiver<Event>, underruns: &mut u64) {
    for event in events.try_iter() {
        match event {
            Event::Started => info!("Audio stream running"),
            Event::Stopped => info!("Audio stream stopped"),
            Event::Error { message } => error!("Audio stream error: {}", message),
            Event::BufferUnderrun => *underruns += 1,
            Event::Engaged(engaged) => debug!(engaged, "Cascade engaged state changed"),
            Event::LevelUpdate { .. } | Event::SpectrumUpdate { .. } => {}
        }
    }
}
