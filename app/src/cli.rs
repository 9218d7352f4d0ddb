//! Command-line argument parsing.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;

use disburser_core::EngineConfig;

/// Command line arguments
#[derive(Parser, Debug)]
#[command(name = "disburser")]
#[command(about = "Stereo all-pass scatter effect between two audio devices", long_about = None)]
pub struct Args {
    /// JSON engine configuration to start from
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Number of all-pass stages (even, 0 to 64)
    #[arg(long, value_name = "STAGES")]
    pub scatter: Option<f32>,

    /// All-pass center frequency (20 to 20000)
    #[arg(long, value_name = "HZ")]
    pub cutoff: Option<f32>,

    /// All-pass Q (0.71 to 10, in 0.1 steps)
    #[arg(long, value_name = "Q")]
    pub smash: Option<f32>,

    /// Stop after this many seconds (runs until killed otherwise)
    #[arg(long, value_name = "SECONDS")]
    pub seconds: Option<f32>,

    /// Spectrum refresh rate
    #[arg(long, value_name = "FPS")]
    pub fps: Option<u32>,

    /// Stream sample rate
    #[arg(long, value_name = "HZ")]
    pub sample_rate: Option<u32>,

    /// Stream buffer size in frames
    #[arg(long, value_name = "FRAMES")]
    pub buffer_size: Option<u32>,

    /// Capture device name (system default if omitted)
    #[arg(long, value_name = "NAME")]
    pub input: Option<String>,

    /// Output device name (system default if omitted)
    #[arg(long, value_name = "NAME")]
    pub output: Option<String>,

    /// Print available devices and exit
    #[arg(long)]
    pub list_devices: bool,
}

impl Args {
    /// Load the configuration file, if any, and apply flag overrides
    pub fn engine_config(&self) -> anyhow::Result<EngineConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let json = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read config {}", path.display()))?;
                EngineConfig::from_json(&json)
                    .with_context(|| format!("Invalid config {}", path.display()))?
            }
            None => EngineConfig::default(),
        };
        self.apply_overrides(&mut config);
        Ok(config)
    }

    /// How long to run, or `None` to run until killed
    pub fn run_duration(&self) -> anyhow::Result<Option<Duration>> {
        self.seconds
            .map(|s| {
                Duration::try_from_secs_f32(s.max(0.0))
                    .with_context(|| format!("Invalid --seconds value: {}", s))
            })
            .transpose()
    }

    fn apply_overrides(&self, config: &mut EngineConfig) {
        if let Some(scatter) = self.scatter {
            config.params.scatter = scatter;
        }
        if let Some(cutoff) = self.cutoff {
            config.params.cutoff = cutoff;
        }
        if let Some(smash) = self.smash {
            config.params.smash = smash;
        }
        if let Some(fps) = self.fps {
            config.display_fps = fps;
        }
        if let Some(sample_rate) = self.sample_rate {
            config.stream.sample_rate = sample_rate;
        }
        if let Some(buffer_size) = self.buffer_size {
            config.stream.buffer_size = buffer_size;
        }
    }
}
