//! Spectral Feed
//!
//! Hands time-domain samples from the audio thread to an FFT running on the
//! display thread.
//!
//! # Architecture
//!
//! [`spectral_feed`] creates two halves over one shared circular history:
//! - [`SpectralFeed`] (audio thread) mixes each stereo frame to mono and
//!   writes it at the write cursor. Never blocks, never allocates.
//! - [`SpectrumAnalyzer`] (display thread) reads the most recent
//!   `FFT_SIZE` samples oldest-first, applies a Hann window and transforms.
//!
//! Neither half is `Clone`, so there is exactly one writer and one reader.
//! Samples are stored as `f32` bits in atomics. The reader can observe a
//! window that the writer is partway through overwriting; for a display
//! that only shows up as a momentary smear.

use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;

use rustfft::{num_complex::Complex, Fft, FftPlanner};

/// FFT size (must be power of 2)
/// 2048 samples at 48kHz = ~42ms window, ~23Hz resolution
pub const FFT_SIZE: usize = 2048;

/// Number of linear magnitude bins returned by `compute_spectrum`
pub const SPECTRUM_BINS: usize = FFT_SIZE / 2;

/// Number of logarithmically spaced display bands
pub const NUM_BANDS: usize = 32;

/// Smoothing factor for band decay (0.0 = instant, 1.0 = no decay)
const BAND_DECAY: f32 = 0.7;

/// Attack factor for band rise (higher = faster response to new peaks)
const BAND_ATTACK: f32 = 0.5;

/// Display floor in dB; anything quieter shows as empty
const FLOOR_DB: f32 = -60.0;

/// Hann window coefficient
/// Hann window reduces spectral leakage in FFT analysis
fn hann_window(n: usize, size: usize) -> f32 {
    0.5 * (1.0 - (2.0 * std::f32::consts::PI * n as f32 / (size - 1) as f32).cos())
}

/// Pre-computed Hann window lookup table
struct HannWindow {
    coeffs: Box<[f32]>,
    /// Sum of the coefficients divided by the window length
    coherent_gain: f32,
}

impl HannWindow {
    fn new() -> Self {
        let coeffs: Box<[f32]> = (0..FFT_SIZE).map(|i| hann_window(i, FFT_SIZE)).collect();
        let coherent_gain = coeffs.iter().sum::<f32>() / FFT_SIZE as f32;
        Self {
            coeffs,
            coherent_gain,
        }
    }

    #[inline]
    fn apply(&self, sample: f32, index: usize) -> f32 {
        sample * self.coeffs[index]
    }
}

/// Circular sample history shared by both halves
struct History {
    samples: Box<[AtomicU32]>,
    /// Next slot the producer will write; only the producer stores to it
    write_pos: AtomicUsize,
    sample_rate_bits: AtomicU32,
}

impl History {
    fn new(sample_rate: f32) -> Self {
        Self {
            samples: (0..FFT_SIZE).map(|_| AtomicU32::new(0.0_f32.to_bits())).collect(),
            write_pos: AtomicUsize::new(0),
            sample_rate_bits: AtomicU32::new(sample_rate.to_bits()),
        }
    }

    fn sample_rate(&self) -> f32 {
        f32::from_bits(self.sample_rate_bits.load(Ordering::Relaxed))
    }
}

/// Create a connected producer/consumer pair
pub fn spectral_feed(sample_rate: f32) -> (SpectralFeed, SpectrumAnalyzer) {
    let history = Arc::new(History::new(sample_rate));
    let feed = SpectralFeed {
        history: Arc::clone(&history),
        write_pos: 0,
    };
    (feed, SpectrumAnalyzer::new(history))
}

/// Producer half, owned by the audio thread
pub struct SpectralFeed {
    history: Arc<History>,
    /// Local copy of the cursor; published after each push
    write_pos: usize,
}

impl SpectralFeed {
    /// Push a block of stereo frames
    ///
    /// # Real-time Safety
    /// This function is designed for audio callbacks:
    /// - No allocations
    /// - No locks (relaxed atomic stores, one release store per call)
    /// - O(n) in the block length
    #[inline]
    pub fn push(&mut self, left: &[f32], right: &[f32]) {
        debug_assert_eq!(left.len(), right.len(), "Channel buffers must be same length");

        let mut pos = self.write_pos;
        for (l, r) in left.iter().zip(right.iter()) {
            // Mix to mono (average of L+R)
            let mono = (l + r) * 0.5;
            self.history.samples[pos].store(mono.to_bits(), Ordering::Relaxed);
            pos = (pos + 1) % FFT_SIZE;
        }
        self.write_pos = pos;
        // Release: a reader that sees this cursor also sees the samples above
        self.history.write_pos.store(pos, Ordering::Release);
    }

    /// Push a single stereo frame
    #[inline]
    pub fn push_frame(&mut self, left: f32, right: f32) {
        self.push(&[left], &[right]);
    }

    /// Zero the history and rewind the cursor
    pub fn clear(&mut self) {
        for slot in self.history.samples.iter() {
            slot.store(0.0_f32.to_bits(), Ordering::Relaxed);
        }
        self.write_pos = 0;
        self.history.write_pos.store(0, Ordering::Release);
    }

    /// Tell the consumer which sample rate the history is recorded at
    pub fn set_sample_rate(&self, sample_rate: f32) {
        self.history
            .sample_rate_bits
            .store(sample_rate.to_bits(), Ordering::Relaxed);
    }
}

/// Consumer half, owned by the display thread
///
/// Every call to [`compute_spectrum`](Self::compute_spectrum) works from the
/// history as it is at that moment; nothing carries over between calls.
pub struct SpectrumAnalyzer {
    history: Arc<History>,
    window: HannWindow,
    /// FFT plan (reused for efficiency)
    fft: Arc<dyn Fft<f32>>,
    buffer: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
    magnitudes: Vec<f32>,
    /// Band values with attack/decay applied, for meter-style display
    smoothed: [f32; NUM_BANDS],
}

impl SpectrumAnalyzer {
    fn new(history: Arc<History>) -> Self {
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(FFT_SIZE);
        let scratch_len = fft.get_inplace_scratch_len();

        Self {
            history,
            window: HannWindow::new(),
            fft,
            buffer: vec![Complex::new(0.0, 0.0); FFT_SIZE],
            scratch: vec![Complex::new(0.0, 0.0); scratch_len],
            magnitudes: vec![0.0; SPECTRUM_BINS],
            smoothed: [0.0; NUM_BANDS],
        }
    }

    /// Copy the most recent `out.len()` samples (at most `FFT_SIZE`), oldest first
    pub fn copy_history(&self, out: &mut [f32]) {
        let count = out.len().min(FFT_SIZE);
        let write_pos = self.history.write_pos.load(Ordering::Acquire);
        let read_pos = write_pos + FFT_SIZE - count;
        for (i, sample) in out.iter_mut().take(count).enumerate() {
            let index = (read_pos + i) % FFT_SIZE;
            *sample = f32::from_bits(self.history.samples[index].load(Ordering::Relaxed));
        }
    }

    /// Window and transform the latest history
    ///
    /// Returns `SPECTRUM_BINS` linear magnitudes (DC up to just below
    /// Nyquist), scaled so a full-scale sine reads about 1.0 at its bin.
    pub fn compute_spectrum(&mut self) -> &[f32] {
        let read_pos = self.history.write_pos.load(Ordering::Acquire);
        for (i, slot) in self.buffer.iter_mut().enumerate() {
            // Read from ring buffer in correct order (oldest first)
            let index = (read_pos + i) % FFT_SIZE;
            let sample = f32::from_bits(self.history.samples[index].load(Ordering::Relaxed));
            *slot = Complex::new(self.window.apply(sample, i), 0.0);
        }

        self.fft.process_with_scratch(&mut self.buffer, &mut self.scratch);

        // Single-sided spectrum: double the energy, undo the window's gain
        let scale = 2.0 / (FFT_SIZE as f32 * self.window.coherent_gain);
        for (magnitude, bin) in self.magnitudes.iter_mut().zip(self.buffer.iter()) {
            *magnitude = bin.norm() * scale;
        }

        &self.magnitudes
    }

    /// Magnitudes from the last `compute_spectrum` call
    pub fn magnitudes(&self) -> &[f32] {
        &self.magnitudes
    }

    /// Index of the loudest bin in the last spectrum, ignoring DC
    pub fn peak_bin(&self) -> usize {
        self.magnitudes
            .iter()
            .enumerate()
            .skip(1)
            .fold((0, 0.0_f32), |(best, best_mag), (i, &mag)| {
                if mag > best_mag {
                    (i, mag)
                } else {
                    (best, best_mag)
                }
            })
            .0
    }

    /// Center frequency of a bin at the feed's current sample rate
    pub fn bin_frequency(&self, bin: usize) -> f32 {
        bin as f32 * self.history.sample_rate() / FFT_SIZE as f32
    }

    /// Reduce the last spectrum to logarithmically spaced display bands
    ///
    /// Each band is 0.0 to 1.0, mapping -60 dB to 0 dB.
    pub fn display_bands(&self) -> [f32; NUM_BANDS] {
        let mut bands = [0.0; NUM_BANDS];
        compute_log_bands(&self.magnitudes, &mut bands);
        bands
    }

    /// Display bands with asymmetric attack/decay applied
    ///
    /// Unlike `compute_spectrum`, this carries state between calls: call it
    /// once per display frame.
    pub fn smoothed_bands(&mut self) -> [f32; NUM_BANDS] {
        let raw = self.display_bands();
        for (current, &target) in self.smoothed.iter_mut().zip(raw.iter()) {
            if target > *current {
                // Attack: fast response to new peaks
                *current += (target - *current) * BAND_ATTACK;
            } else {
                // Decay: smooth falloff
                *current = *current * BAND_DECAY + target * (1.0 - BAND_DECAY);
            }
        }
        self.smoothed
    }

    /// Clear the display smoothing state
    pub fn reset_smoothing(&mut self) {
        self.smoothed = [0.0; NUM_BANDS];
    }
}

/// Map linear FFT bins to logarithmic bands that better match human
/// perception of pitch
fn compute_log_bands(magnitudes: &[f32], bands: &mut [f32; NUM_BANDS]) {
    let nyquist = magnitudes.len();
    if nyquist < 2 {
        *bands = [0.0; NUM_BANDS];
        return;
    }

    let min_bin = 1; // Skip DC
    let log_min = (min_bin as f32).ln();
    let log_max = (nyquist as f32).ln();
    let log_step = (log_max - log_min) / NUM_BANDS as f32;

    for (i, band) in bands.iter_mut().enumerate() {
        let log_start = log_min + i as f32 * log_step;
        let log_end = log_min + (i + 1) as f32 * log_step;
        let bin_start = (log_start.exp() as usize).min(nyquist - 1);
        let bin_end = (log_end.exp() as usize).min(nyquist - 1);
        let end_idx = (bin_end + 1).min(nyquist);

        let (sum, count): (f32, usize) = magnitudes[bin_start..end_idx]
            .iter()
            .fold((0.0, 0), |(s, c), &mag| (s + mag, c + 1));
        let avg_mag = if count > 0 { sum / count as f32 } else { 0.0 };

        let db = 20.0 * avg_mag.max(1e-10).log10();
        *band = ((db - FLOOR_DB) / -FLOOR_DB).clamp(0.0, 1.0);
    }
}
