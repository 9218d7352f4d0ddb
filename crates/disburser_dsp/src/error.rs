//! DSP Error Types

use thiserror::Error;

/// Errors that can occur during DSP setup
///
/// None of these are produced on the audio thread: the per-block path
/// is infallible and falls back to the last good state instead.
#[derive(Error, Debug)]
pub enum DspError {
    #[error("Invalid all-pass coefficients for cutoff {frequency}Hz (Q {q}) at sample rate {sample_rate}Hz")]
    InvalidCoefficients {
        frequency: f32,
        q: f32,
        sample_rate: f32,
    },

    #[error("Sample rate must be positive, got {0}")]
    InvalidSampleRate(f32),

    #[error("Block size must be at least one frame, got {0}")]
    InvalidBlockSize(usize),
}
