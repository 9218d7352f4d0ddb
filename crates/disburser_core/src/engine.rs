//! Audio Engine - Block Orchestration
//!
//! The AudioEngine owns one effect instance's signal path and is called once
//! per audio block by whatever hosts it.
//!
//! # Block Flow
//!
//! ```text
//!   SharedParams ──snapshot──▶ ScatterStabilizer ──stable?──┐
//!                                                           ▼
//!   block ──────────────────────────────▶ AllPassCascade (in place, or skipped)
//!                                                           │
//!                                                           ▼
//!                                               SpectralFeed::push (always)
//! ```
//!
//! The feed receives the block after the cascade, so the display shows the
//! wet signal whenever the cascade ran.

use std::sync::Arc;

use tracing::{debug, info};

use disburser_dsp::{
    spectral_feed, AllPassCascade, DspError, ParamSnapshot, ScatterStabilizer, SharedParams,
    SpectralFeed, SpectrumAnalyzer, MAX_STAGES,
};

/// One instance of the scatter effect
///
/// All mutable state lives here; there are no process-wide singletons, so
/// several engines can run side by side.
pub struct AudioEngine {
    /// Control values, written by the control side
    params: Arc<SharedParams>,
    stabilizer: ScatterStabilizer,
    cascade: AllPassCascade,
    /// Producer half of the spectrum pipeline
    feed: SpectralFeed,
    sample_rate: f32,
    max_block_size: usize,
    /// De-interleave buffers, sized by `prepare`
    scratch_left: Vec<f32>,
    scratch_right: Vec<f32>,
    /// Stage count used by the last block the cascade ran on
    applied_scatter: usize,
    /// Whether the cascade ran on the last block
    engaged: bool,
}

impl AudioEngine {
    /// Create a prepared engine and the display side of its spectrum feed
    ///
    /// The engine is ready to `process` as soon as this returns.
    pub fn new(
        params: Arc<SharedParams>,
        sample_rate: f32,
        max_block_size: usize,
    ) -> Result<(Self, SpectrumAnalyzer), DspError> {
        validate(sample_rate, max_block_size)?;

        let (feed, analyzer) = spectral_feed(sample_rate);
        let mut engine = Self {
            params,
            stabilizer: ScatterStabilizer::new(),
            cascade: AllPassCascade::new(sample_rate),
            feed,
            sample_rate,
            max_block_size,
            scratch_left: Vec::new(),
            scratch_right: Vec::new(),
            applied_scatter: 0,
            engaged: false,
        };
        engine.prepare(sample_rate, max_block_size)?;

        debug!("Audio engine created");
        Ok((engine, analyzer))
    }

    /// Size and reset everything for a sample rate and maximum block size
    ///
    /// Call whenever either changes. Each call fully resets filter state,
    /// the stabilizer window and the spectrum history. Allocates; never call
    /// from the audio callback.
    pub fn prepare(&mut self, sample_rate: f32, max_block_size: usize) -> Result<(), DspError> {
        validate(sample_rate, max_block_size)?;

        self.sample_rate = sample_rate;
        self.max_block_size = max_block_size;
        self.cascade.set_sample_rate(sample_rate);
        self.stabilizer.reset();
        self.feed.clear();
        self.feed.set_sample_rate(sample_rate);

        self.scratch_left.clear();
        self.scratch_left.resize(max_block_size, 0.0);
        self.scratch_right.clear();
        self.scratch_right.resize(max_block_size, 0.0);

        self.applied_scatter = 0;
        self.engaged = false;

        info!(sample_rate, max_block_size, "Audio engine prepared");
        Ok(())
    }

    /// Process one block of planar stereo audio in place
    ///
    /// # Real-time Safety
    /// No allocations, no locks, no logging.
    #[inline]
    pub fn process(&mut self, left: &mut [f32], right: &mut [f32]) {
        let snapshot = self.params.snapshot();
        self.process_with_snapshot(left, right, snapshot);
    }

    /// Process one block with explicit control values
    pub fn process_with_snapshot(
        &mut self,
        left: &mut [f32],
        right: &mut [f32],
        snapshot: ParamSnapshot,
    ) {
        debug_assert_eq!(left.len(), right.len(), "Channel buffers must be same length");

        self.engaged = self.stabilizer.evaluate(snapshot.scatter);
        if self.engaged {
            let scatter = snapshot.scatter.clamp(0, MAX_STAGES as i32) as usize;
            if scatter > self.applied_scatter {
                // Slots joining the chain start from silence, not stale state
                self.cascade.reset_stages(self.applied_scatter..scatter);
            }
            self.applied_scatter = scatter;
            self.cascade
                .process(left, right, scatter, snapshot.cutoff_hz, snapshot.smash_q);
        }

        self.feed.push(left, right);
    }

    /// Process an interleaved stereo buffer in place
    ///
    /// Buffer format: [L0, R0, L1, R1, L2, R2, ...]
    ///
    /// Buffers longer than the prepared block size are handled as several
    /// consecutive blocks.
    pub fn process_interleaved(&mut self, buffer: &mut [f32]) {
        debug_assert_eq!(buffer.len() % 2, 0, "Interleaved stereo needs whole frames");

        // Rust pattern: take the scratch buffers out so `self` can be
        // borrowed mutably while they are in use; no allocation happens
        let mut left = std::mem::take(&mut self.scratch_left);
        let mut right = std::mem::take(&mut self.scratch_right);

        for chunk in buffer.chunks_mut(self.max_block_size * 2) {
            let frames = chunk.len() / 2;
            let (l, r) = (&mut left[..frames], &mut right[..frames]);

            for (i, frame) in chunk.chunks_exact(2).enumerate() {
                l[i] = frame[0];
                r[i] = frame[1];
            }

            self.process(l, r);

            for (i, frame) in chunk.chunks_exact_mut(2).enumerate() {
                frame[0] = l[i];
                frame[1] = r[i];
            }
        }

        self.scratch_left = left;
        self.scratch_right = right;
    }

    /// Whether the cascade ran on the most recent block
    pub fn is_engaged(&self) -> bool {
        self.engaged
    }

    /// Truncated mean of the stabilizer window
    pub fn scatter_mean(&self) -> Option<i32> {
        self.stabilizer.mean()
    }

    pub fn params(&self) -> &Arc<SharedParams> {
        &self.params
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    pub fn max_block_size(&self) -> usize {
        self.max_block_size
    }

    /// Clear filter state, the stabilizer window and the spectrum history
    /// without changing the sample rate or block size
    pub fn reset(&mut self) {
        self.cascade.reset();
        self.stabilizer.reset();
        self.feed.clear();
        self.applied_scatter = 0;
        self.engaged = false;
    }
}

fn validate(sample_rate: f32, max_block_size: usize) -> Result<(), DspError> {
    if !(sample_rate.is_finite() && sample_rate > 0.0) {
        return Err(DspError::InvalidSampleRate(sample_rate));
    }
    if max_block_size == 0 {
        return Err(DspError::InvalidBlockSize(max_block_size));
    }
    Ok(())
}
