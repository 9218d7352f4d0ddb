//! Disburser Core - Audio Engine
//!
//! This crate hosts the scatter effect, including:
//! - The per-instance `AudioEngine` that gates and runs the all-pass cascade
//! - Audio device enumeration and stream management (via CPAL)
//! - Lock-free communication between the audio callback and the control side
//! - JSON configuration for streams and initial control values
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Control / Display Thread                 │
//! │  SharedParams ◀──set──  host   ──poll 24 Hz──▶ Analyzer    │
//! └─────────────────────────────────────────────────────────────┘
//!        │ atomics                 ▲ events          ▲ atomics
//!        ▼                         │ crossbeam       │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Audio Thread                           │
//! │   Capture ──rtrb──▶ AudioEngine ──▶ Output                 │
//! │              (Zero allocation in this path)                 │
//! └─────────────────────────────────────────────────────────────┘
//! ```

mod config;
mod device;
mod engine;
mod error;
mod message;
mod stream;

pub use config::{EngineConfig, ParameterConfig, StreamConfig};
pub use device::{AudioDevice, DeviceType};
pub use engine::AudioEngine;
pub use error::{EngineError, EngineResult};
pub use message::Event;
pub use stream::{check_config, stereo_peaks, AudioStream, SharedState, STREAM_CHANNELS};

// Re-export DSP types for convenience
pub use disburser_dsp::{
    ParamId, ParamSnapshot, SharedParams, SpectrumAnalyzer, FFT_SIZE, NUM_BANDS, SPECTRUM_BINS,
};
