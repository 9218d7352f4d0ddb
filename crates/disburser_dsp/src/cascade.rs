//! All-Pass Scatter Cascade
//!
//! A fixed bank of 64 second-order all-pass sections. Stages are interleaved by
//! channel: even slots filter the left channel, odd slots the right, so a
//! scatter count of `n` runs `n / 2` stages in series on each side.
//!
//! Coefficients come from the RBJ (Robert Bristow-Johnson) Audio EQ Cookbook
//! all-pass, via the `biquad` crate. Every stage shares one coefficient set.

use std::ops::Range;

use biquad::{Biquad, Coefficients, DirectForm2Transposed, ToHertz, Type};

use crate::error::DspError;
use crate::params::MAX_SCATTER;

/// Number of stage slots (left and right interleaved)
pub const MAX_STAGES: usize = MAX_SCATTER;

/// Stage coefficients are only rewritten on sample indices that are a
/// multiple of this within a block
pub const COEFF_REFRESH_INTERVAL: usize = 100;

/// Highest design frequency as a fraction of the sample rate.
/// `biquad` rejects anything at or above Nyquist.
const MAX_CUTOFF_RATIO: f32 = 0.499;

/// Coefficients that pass the input through unchanged
const IDENTITY: Coefficients<f32> = Coefficients {
    a1: 0.0,
    a2: 0.0,
    b0: 1.0,
    b1: 0.0,
    b2: 0.0,
};

/// The scatter cascade
///
/// Holds the filter state for every slot whether or not it is active.
/// Designed for real-time use: no allocations in `process()`.
pub struct AllPassCascade {
    // DirectForm2Transposed: better numerical stability than DF1
    stages: [DirectForm2Transposed<f32>; MAX_STAGES],
    sample_rate: f32,
    /// Last successfully designed coefficient set
    latched: Coefficients<f32>,
}

impl AllPassCascade {
    /// Create a cascade for the given sample rate
    ///
    /// Stages start as pass-through until the first block latches real
    /// coefficients.
    pub fn new(sample_rate: f32) -> Self {
        Self {
            stages: core::array::from_fn(|_| DirectForm2Transposed::<f32>::new(IDENTITY)),
            sample_rate,
            latched: IDENTITY,
        }
    }

    /// Change the sample rate and clear all filter state
    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
        self.latched = IDENTITY;
        for stage in self.stages.iter_mut() {
            stage.update_coefficients(IDENTITY);
        }
        self.reset();
    }

    /// Design the shared all-pass coefficient set
    pub fn design(&self, cutoff_hz: f32, q: f32) -> Result<Coefficients<f32>, DspError> {
        Coefficients::<f32>::from_params(
            Type::AllPass,
            self.sample_rate.hz(),
            cutoff_hz.hz(),
            q,
        )
        .map_err(|_| DspError::InvalidCoefficients {
            frequency: cutoff_hz,
            q,
            sample_rate: self.sample_rate,
        })
    }

    /// Run one block through the first `scatter` slots
    ///
    /// One coefficient set is designed per block from `cutoff_hz` and `q`.
    /// The cutoff is pulled just below Nyquist first; if the design still
    /// fails the previously latched coefficients stay in use.
    ///
    /// # Real-time Safety
    /// No allocations, no locks. O(samples * scatter).
    pub fn process(
        &mut self,
        left: &mut [f32],
        right: &mut [f32],
        scatter: usize,
        cutoff_hz: f32,
        q: f32,
    ) {
        let cutoff_hz = cutoff_hz.min(self.sample_rate * MAX_CUTOFF_RATIO);
        if let Ok(coeffs) = self.design(cutoff_hz, q) {
            self.latched = coeffs;
        }
        let coeffs = self.latched;
        self.process_with(left, right, scatter, |_| coeffs);
    }

    /// Run one block, asking `target` for the coefficients at each refresh
    /// point (sample 0, 100, 200, ...)
    ///
    /// Between refresh points every active stage keeps the coefficients
    /// latched at the last one.
    ///
    /// # Panics
    /// Panics if `scatter` is odd or above 64, or if the buffers have
    /// different lengths (debug builds only)
    pub fn process_with<F>(
        &mut self,
        left: &mut [f32],
        right: &mut [f32],
        scatter: usize,
        mut target: F,
    ) where
        F: FnMut(usize) -> Coefficients<f32>,
    {
        debug_assert_eq!(left.len(), right.len(), "Channel buffers must be same length");
        debug_assert!(
            scatter % 2 == 0 && scatter <= MAX_STAGES,
            "Scatter must be even and at most {}, got {}",
            MAX_STAGES,
            scatter
        );

        let active = scatter.min(MAX_STAGES) & !1;
        if active == 0 {
            return;
        }
        let active_stages = &mut self.stages[..active];

        for (index, (l, r)) in left.iter_mut().zip(right.iter_mut()).enumerate() {
            if index % COEFF_REFRESH_INTERVAL == 0 {
                let coeffs = target(index);
                for stage in active_stages.iter_mut() {
                    stage.update_coefficients(coeffs);
                }
            }

            let mut sample_l = *l;
            let mut sample_r = *r;
            for pair in active_stages.chunks_exact_mut(2) {
                sample_l = pair[0].run(sample_l);
                sample_r = pair[1].run(sample_r);
            }
            *l = sample_l;
            *r = sample_r;
        }
    }

    /// Clear the delay lines of a range of slots
    ///
    /// Used when the active prefix grows so re-activated slots do not
    /// resume from stale state.
    pub fn reset_stages(&mut self, slots: Range<usize>) {
        let end = slots.end.min(MAX_STAGES);
        let start = slots.start.min(end);
        for stage in &mut self.stages[start..end] {
            stage.reset_state();
        }
    }

    /// Clear every slot's delay line
    pub fn reset(&mut self) {
        self.reset_stages(0..MAX_STAGES);
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    /// Coefficients the last `process` call designed (or kept)
    pub fn latched(&self) -> Coefficients<f32> {
        self.latched
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Deterministic white noise in [-1, 1)
    struct Noise(u32);

    impl Noise {
        fn next(&mut self) -> f32 {
            // xorshift32
            self.0 ^= self.0 << 13;
            self.0 ^= self.0 >> 17;
            self.0 ^= self.0 << 5;
            (self.0 as f32 / u32::MAX as f32) * 2.0 - 1.0
        }
    }

    fn noise_block(seed: u32, len: usize) -> (Vec<f32>, Vec<f32>) {
        let mut noise = Noise(seed);
        let left = (0..len).map(|_| noise.next()).collect();
        let right = (0..len).map(|_| noise.next()).collect();
        (left, right)
    }

    #[test]
    fn test_zero_scatter_is_bit_identical() {
        let mut cascade = AllPassCascade::new(48000.0);
        let (mut left, mut right) = noise_block(7, 1024);
        let (dry_l, dry_r) = (left.clone(), right.clone());

        cascade.process(&mut left, &mut right, 0, 1000.0, 1.0);

        assert_eq!(left, dry_l);
        assert_eq!(right, dry_r);
    }

    #[test]
    fn test_active_scatter_changes_signal() {
        let mut cascade = AllPassCascade::new(48000.0);
        let (mut left, mut right) = noise_block(11, 1024);
        let (dry_l, dry_r) = (left.clone(), right.clone());

        cascade.process(&mut left, &mut right, 4, 1000.0, 1.0);

        assert_ne!(left, dry_l);
        assert_ne!(right, dry_r);
    }

    #[test]
    fn test_channels_use_separate_stages() {
        // Same input on both sides must give the same output on both sides:
        // each side has its own, identically configured, stages.
        let mut cascade = AllPassCascade::new(48000.0);
        let (mut left, _) = noise_block(3, 512);
        let mut right = left.clone();

        cascade.process(&mut left, &mut right, 8, 2500.0, 3.0);

        assert_eq!(left, right);
    }

    #[test]
    fn test_more_stages_is_a_longer_chain() {
        // Two pairs in series equals running one pair, then another fresh pair
        let mut two_pairs = AllPassCascade::new(48000.0);
        let mut first = AllPassCascade::new(48000.0);
        let mut second = AllPassCascade::new(48000.0);

        let (mut left_a, mut right_a) = noise_block(5, 300);
        let (mut left_b, mut right_b) = (left_a.clone(), right_a.clone());

        two_pairs.process(&mut left_a, &mut right_a, 4, 800.0, 2.0);
        first.process(&mut left_b, &mut right_b, 2, 800.0, 2.0);
        second.process(&mut left_b, &mut right_b, 2, 800.0, 2.0);

        for (a, b) in left_a.iter().zip(&left_b) {
            assert!((a - b).abs() < 1e-6);
        }
        for (a, b) in right_a.iter().zip(&right_b) {
            assert!((a - b).abs() < 1e-6);
        }
    }

    #[test]
    fn test_allpass_preserves_sine_amplitude() {
        let sample_rate = 48000.0;
        let mut cascade = AllPassCascade::new(sample_rate);
        let freq = 440.0;

        let mut left: Vec<f32> = (0..48000)
            .map(|i| (2.0 * std::f32::consts::PI * freq * i as f32 / sample_rate).sin() * 0.5)
            .collect();
        let mut right = left.clone();

        cascade.process(&mut left, &mut right, 16, 1000.0, 0.71);

        // Skip the settling transient, then the peak should match the input
        let peak = left[24000..].iter().fold(0.0_f32, |m, s| m.max(s.abs()));
        assert!((peak - 0.5).abs() < 0.01, "All-pass should keep amplitude: {}", peak);
    }

    #[test]
    fn test_max_scatter_stays_finite_on_white_noise() {
        let sample_rate = 48000.0;
        let block = 512;
        let total = sample_rate as usize * 10;

        for &(cutoff, q) in &[(20.0, 0.71), (20.0, 10.0), (20000.0, 0.71), (20000.0, 10.0), (200.0, 5.0)] {
            let mut cascade = AllPassCascade::new(sample_rate);
            let mut noise = Noise(0x9E37_79B9);
            let mut left = vec![0.0_f32; block];
            let mut right = vec![0.0_f32; block];

            let mut processed = 0;
            while processed < total {
                for (l, r) in left.iter_mut().zip(right.iter_mut()) {
                    *l = noise.next();
                    *r = noise.next();
                }
                cascade.process(&mut left, &mut right, MAX_STAGES, cutoff, q);
                assert!(
                    left.iter().chain(right.iter()).all(|s| s.is_finite()),
                    "Non-finite output at cutoff {} Q {} after {} samples",
                    cutoff,
                    q,
                    processed
                );
                processed += block;
            }
        }
    }

    #[test]
    fn test_coefficients_latch_on_refresh_boundaries() {
        let sample_rate = 48000.0;
        let reference = AllPassCascade::new(sample_rate);
        let coeffs_a = reference.design(500.0, 1.0).unwrap();
        let coeffs_b = reference.design(5000.0, 4.0).unwrap();

        let (left, right) = noise_block(21, 300);

        // Constant A for the whole block
        let mut steady = AllPassCascade::new(sample_rate);
        let (mut steady_l, mut steady_r) = (left.clone(), right.clone());
        steady.process_with(&mut steady_l, &mut steady_r, 6, |_| coeffs_a);

        // A target that moves to B at sample 50, inside the first span
        let mut injected = AllPassCascade::new(sample_rate);
        let (mut injected_l, mut injected_r) = (left.clone(), right.clone());
        injected.process_with(&mut injected_l, &mut injected_r, 6, |index| {
            if index < 50 {
                coeffs_a
            } else {
                coeffs_b
            }
        });

        // First span is unaffected by the mid-span change
        assert_eq!(&injected_l[..COEFF_REFRESH_INTERVAL], &steady_l[..COEFF_REFRESH_INTERVAL]);
        assert_eq!(&injected_r[..COEFF_REFRESH_INTERVAL], &steady_r[..COEFF_REFRESH_INTERVAL]);

        // From the next boundary on, B is in effect
        assert_ne!(&injected_l[COEFF_REFRESH_INTERVAL..], &steady_l[COEFF_REFRESH_INTERVAL..]);
    }

    #[test]
    fn test_target_only_sampled_at_refresh_points() {
        let mut cascade = AllPassCascade::new(48000.0);
        let coeffs = cascade.design(1000.0, 1.0).unwrap();
        let (mut left, mut right) = noise_block(2, 350);

        let mut asked = Vec::new();
        cascade.process_with(&mut left, &mut right, 2, |index| {
            asked.push(index);
            coeffs
        });

        assert_eq!(asked, vec![0, 100, 200, 300]);
    }

    #[test]
    fn test_design_rejects_cutoff_above_nyquist() {
        let cascade = AllPassCascade::new(32000.0);
        assert!(cascade.design(20000.0, 1.0).is_err());
        assert!(cascade.design(1000.0, 1.0).is_ok());
    }

    #[test]
    fn test_process_clamps_cutoff_below_nyquist() {
        // 20 kHz is above Nyquist at 32 kHz; processing must still be finite
        let mut cascade = AllPassCascade::new(32000.0);
        let (mut left, mut right) = noise_block(9, 512);

        cascade.process(&mut left, &mut right, 8, 20000.0, 1.0);

        assert!(left.iter().chain(right.iter()).all(|s| s.is_finite()));
        assert!(cascade.latched().b0 != 1.0, "Clamped cutoff should still design");
    }

    #[test]
    fn test_reset_clears_state() {
        let mut cascade = AllPassCascade::new(48000.0);
        let (left, right) = noise_block(4, 256);

        let (mut first_l, mut first_r) = (left.clone(), right.clone());
        cascade.process(&mut first_l, &mut first_r, 4, 1000.0, 1.0);

        cascade.reset();

        let (mut second_l, mut second_r) = (left.clone(), right.clone());
        cascade.process(&mut second_l, &mut second_r, 4, 1000.0, 1.0);

        assert_eq!(first_l, second_l);
        assert_eq!(first_r, second_r);
    }

    #[test]
    fn test_set_sample_rate() {
        let mut cascade = AllPassCascade::new(44100.0);
        assert_eq!(cascade.sample_rate(), 44100.0);

        cascade.set_sample_rate(96000.0);
        assert_eq!(cascade.sample_rate(), 96000.0);
    }
}
