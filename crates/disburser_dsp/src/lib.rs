//! Disburser DSP - Digital Signal Processing Module
//!
//! This crate provides the signal path for Disburser, including:
//! - The scatter/cutoff/smash parameter store
//! - A 64-slot stereo all-pass cascade built from BiQuad sections
//! - A stabilizer that holds the cascade off while the stage count moves
//! - A lock-free spectral feed from the audio thread to a display FFT
//!
//! # Architecture
//!
//! The DSP chain follows a strict "no allocation in audio callback" rule.
//! Everything the audio thread touches is sized up front; the active stage
//! count selects a prefix of a fixed array instead of resizing anything.

mod cascade;
mod error;
mod params;
mod spectrum;
mod stabilizer;

pub use cascade::{AllPassCascade, COEFF_REFRESH_INTERVAL, MAX_STAGES};
pub use error::DspError;
pub use params::{ParamId, ParamRange, ParamSnapshot, SharedParams, Taper, MAX_SCATTER};
pub use spectrum::{
    spectral_feed, SpectralFeed, SpectrumAnalyzer, FFT_SIZE, NUM_BANDS, SPECTRUM_BINS,
};
pub use stabilizer::{ScatterStabilizer, STABILIZER_WINDOW};

// Coefficient type used by `AllPassCascade::process_with`
pub use biquad::Coefficients;
