//! Engine and Stream Configuration

use serde::{Deserialize, Serialize};

use disburser_dsp::{ParamId, SharedParams};

use crate::error::EngineResult;

/// Audio stream configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamConfig {
    /// Sample rate in Hz (e.g., 44100, 48000, 96000)
    pub sample_rate: u32,

    /// Number of audio channels; the engine only accepts 2
    pub channels: u16,

    /// Buffer size in frames (lower = less latency, higher = more stability)
    pub buffer_size: u32,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48000,
            channels: 2,
            buffer_size: 512,
        }
    }
}

impl StreamConfig {
    /// Calculate latency in milliseconds for this configuration
    pub fn latency_ms(&self) -> f32 {
        (self.buffer_size as f32 / self.sample_rate as f32) * 1000.0
    }

    /// Number of processing blocks the stabilizer window spans, in milliseconds
    pub fn stabilizer_settle_ms(&self) -> f32 {
        self.latency_ms() * disburser_dsp::STABILIZER_WINDOW as f32
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.sample_rate < 8000 || self.sample_rate > 192000 {
            return Err(format!("Invalid sample rate: {}", self.sample_rate));
        }
        if self.channels == 0 || self.channels > 8 {
            return Err(format!("Invalid channel count: {}", self.channels));
        }
        if self.buffer_size < 32 || self.buffer_size > 8192 {
            return Err(format!("Invalid buffer size: {}", self.buffer_size));
        }
        Ok(())
    }
}

/// Initial control values
///
/// Values are clamped and snapped when applied, like any other write to the
/// parameter store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParameterConfig {
    pub scatter: f32,
    pub cutoff: f32,
    pub smash: f32,
}

impl Default for ParameterConfig {
    fn default() -> Self {
        Self {
            scatter: ParamId::Scatter.range().default,
            cutoff: ParamId::Cutoff.range().default,
            smash: ParamId::Smash.range().default,
        }
    }
}

impl ParameterConfig {
    /// Write these values into a parameter store
    pub fn apply_to(&self, params: &SharedParams) {
        params.set(ParamId::Scatter, self.scatter);
        params.set(ParamId::Cutoff, self.cutoff);
        params.set(ParamId::Smash, self.smash);
    }

    /// Capture the current values of a parameter store
    pub fn from_params(params: &SharedParams) -> Self {
        Self {
            scatter: params.get(ParamId::Scatter),
            cutoff: params.get(ParamId::Cutoff),
            smash: params.get(ParamId::Smash),
        }
    }
}

/// Overall engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Stream configuration
    pub stream: StreamConfig,

    /// Capture-to-output ring buffer capacity in frames (should be multiple of buffer_size)
    pub ring_buffer_frames: usize,

    /// Spectrum refresh rate for the display side
    #[serde(default = "default_display_fps")]
    pub display_fps: u32,

    /// Control values to start from
    #[serde(default)]
    pub params: ParameterConfig,
}

fn default_display_fps() -> u32 {
    24
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            stream: StreamConfig::default(),
            // 4 buffers worth of ring buffer capacity
            ring_buffer_frames: 512 * 4,
            display_fps: default_display_fps(),
            params: ParameterConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Create config optimized for low latency
    pub fn low_latency() -> Self {
        Self {
            stream: StreamConfig {
                sample_rate: 48000,
                channels: 2,
                buffer_size: 128, // ~2.6ms latency
            },
            ring_buffer_frames: 128 * 8,
            ..Self::default()
        }
    }

    /// Create config optimized for stability
    pub fn stable() -> Self {
        Self {
            stream: StreamConfig {
                sample_rate: 48000,
                channels: 2,
                buffer_size: 1024, // ~21ms latency
            },
            ring_buffer_frames: 1024 * 4,
            ..Self::default()
        }
    }

    /// Parse a configuration from JSON
    pub fn from_json(json: &str) -> EngineResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Serialize this configuration as pretty JSON
    pub fn to_json(&self) -> EngineResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
