//! Scatter / Cutoff / Smash Parameters
//!
//! The three user-facing controls and the lock-free store the control side
//! writes and the audio thread reads once per block.
//!
//! Values are clamped and snapped to their legal steps when written, so the
//! engine can take a [`ParamSnapshot`] at face value without re-validating.

use std::sync::atomic::{AtomicU32, Ordering};

/// Maximum number of active all-pass stages (left + right interleaved)
pub const MAX_SCATTER: usize = 64;

/// Identity of each control
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamId {
    Scatter,
    Cutoff,
    Smash,
}

impl ParamId {
    pub const ALL: [ParamId; 3] = [ParamId::Scatter, ParamId::Cutoff, ParamId::Smash];

    /// Stable identifier used by the parameter store
    pub fn id(self) -> &'static str {
        match self {
            ParamId::Scatter => "scatter",
            ParamId::Cutoff => "cutoff",
            ParamId::Smash => "smash",
        }
    }

    /// Display name
    pub fn name(self) -> &'static str {
        match self {
            ParamId::Scatter => "Scatter",
            ParamId::Cutoff => "Cutoff",
            ParamId::Smash => "Smash",
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.id() == id)
    }

    pub fn range(self) -> ParamRange {
        match self {
            ParamId::Scatter => ParamRange {
                min: 0.0,
                max: MAX_SCATTER as f32,
                default: 0.0,
                step: Some(2.0),
                taper: Taper::Linear,
            },
            ParamId::Cutoff => ParamRange {
                min: 20.0,
                max: 20000.0,
                default: 200.0,
                step: None,
                taper: Taper::Frequency,
            },
            ParamId::Smash => ParamRange {
                min: 0.71,
                max: 10.0,
                default: 0.71,
                step: Some(0.1),
                taper: Taper::Linear,
            },
        }
    }

    fn index(self) -> usize {
        match self {
            ParamId::Scatter => 0,
            ParamId::Cutoff => 1,
            ParamId::Smash => 2,
        }
    }
}

/// How a normalized control position maps onto the plain value
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Taper {
    Linear,
    /// `min + (2^(10x) - 1) * (max - min) / 1023`, i.e. ten octaves of travel
    /// across the control, with the display-friendly rounding of frequencies.
    Frequency,
}

/// Bounds, step and taper of one parameter
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamRange {
    pub min: f32,
    pub max: f32,
    pub default: f32,
    pub step: Option<f32>,
    pub taper: Taper,
}

impl ParamRange {
    /// Clamp into range and snap to the nearest legal value
    pub fn snap(&self, value: f32) -> f32 {
        if !value.is_finite() {
            return self.default;
        }
        let value = value.clamp(self.min, self.max);

        let snapped = match (self.step, self.taper) {
            (Some(step), _) => self.min + step * ((value - self.min) / step + 0.5).floor(),
            (None, Taper::Frequency) => {
                if value > 3000.0 {
                    100.0 * (value / 100.0).round()
                } else if value > 1000.0 {
                    10.0 * (value / 10.0).round()
                } else {
                    value.round()
                }
            }
            (None, Taper::Linear) => value,
        };

        snapped.clamp(self.min, self.max)
    }

    /// Map a plain value to the control position in `[0, 1]`
    pub fn to_normalized(&self, value: f32) -> f32 {
        let value = value.clamp(self.min, self.max);
        let span = self.max - self.min;
        let normalized = match self.taper {
            Taper::Linear => (value - self.min) / span,
            Taper::Frequency => ((value - self.min) * 1023.0 / span + 1.0).log2() / 10.0,
        };
        normalized.clamp(0.0, 1.0)
    }

    /// Map a control position in `[0, 1]` to a plain (unsnapped) value
    pub fn from_normalized(&self, normalized: f32) -> f32 {
        let normalized = normalized.clamp(0.0, 1.0);
        let span = self.max - self.min;
        match self.taper {
            Taper::Linear => self.min + normalized * span,
            Taper::Frequency => self.min + ((normalized * 10.0).exp2() - 1.0) * span / 1023.0,
        }
    }
}

/// Values read by the engine at the start of a block
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamSnapshot {
    /// Active stage count, even, in `[0, 64]`
    pub scatter: i32,
    pub cutoff_hz: f32,
    pub smash_q: f32,
}

impl Default for ParamSnapshot {
    fn default() -> Self {
        Self {
            scatter: ParamId::Scatter.range().default as i32,
            cutoff_hz: ParamId::Cutoff.range().default,
            smash_q: ParamId::Smash.range().default,
        }
    }
}

/// Lock-free parameter store shared between the control side and the engine
///
/// Each value lives in an `AtomicU32` holding `f32` bits.
/// Rust pattern: AtomicF32 doesn't exist, so we use bit-casting
pub struct SharedParams {
    values: [AtomicU32; 3],
}

impl SharedParams {
    /// Create a store holding every parameter's default
    pub fn new() -> Self {
        Self {
            values: ParamId::ALL.map(|p| AtomicU32::new(p.range().default.to_bits())),
        }
    }

    /// Set a plain value; it is clamped and snapped before it is stored
    pub fn set(&self, param: ParamId, value: f32) {
        let snapped = param.range().snap(value);
        self.values[param.index()].store(snapped.to_bits(), Ordering::Relaxed);
    }

    /// Set a value from a control position in `[0, 1]`
    pub fn set_normalized(&self, param: ParamId, normalized: f32) {
        let range = param.range();
        self.set(param, range.from_normalized(normalized));
    }

    pub fn get(&self, param: ParamId) -> f32 {
        f32::from_bits(self.values[param.index()].load(Ordering::Relaxed))
    }

    pub fn get_normalized(&self, param: ParamId) -> f32 {
        param.range().to_normalized(self.get(param))
    }

    /// Look a value up by its store identifier (`"scatter"`, `"cutoff"`, `"smash"`)
    pub fn get_by_id(&self, id: &str) -> Option<f32> {
        ParamId::from_id(id).map(|p| self.get(p))
    }

    pub fn set_by_id(&self, id: &str, value: f32) -> bool {
        match ParamId::from_id(id) {
            Some(param) => {
                self.set(param, value);
                true
            }
            None => false,
        }
    }

    /// Read all three values for one block
    ///
    /// # Real-time Safety
    /// Three relaxed atomic loads. No allocation, no locks.
    #[inline]
    pub fn snapshot(&self) -> ParamSnapshot {
        ParamSnapshot {
            // Stored values are already snapped to even integers
            scatter: self.get(ParamId::Scatter) as i32,
            cutoff_hz: self.get(ParamId::Cutoff),
            smash_q: self.get(ParamId::Smash),
        }
    }

    /// Restore every parameter to its default
    pub fn reset(&self) {
        for param in ParamId::ALL {
            self.set(param, param.range().default);
        }
    }
}

impl Default for SharedParams {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let params = SharedParams::new();
        assert_eq!(params.get(ParamId::Scatter), 0.0);
        assert_eq!(params.get(ParamId::Cutoff), 200.0);
        assert_eq!(params.get(ParamId::Smash), 0.71);
        assert_eq!(params.snapshot(), ParamSnapshot::default());
    }

    #[test]
    fn test_scatter_snaps_to_even_steps() {
        let params = SharedParams::new();

        params.set(ParamId::Scatter, 5.2);
        assert_eq!(params.snapshot().scatter, 6);

        params.set(ParamId::Scatter, 4.9);
        assert_eq!(params.snapshot().scatter, 4);

        params.set(ParamId::Scatter, 100.0);
        assert_eq!(params.snapshot().scatter, 64);

        params.set(ParamId::Scatter, -3.0);
        assert_eq!(params.snapshot().scatter, 0);
    }

    #[test]
    fn test_smash_steps_from_minimum() {
        let range = ParamId::Smash.range();
        assert!((range.snap(1.0) - 1.01).abs() < 1e-4);
        assert!((range.snap(0.75) - 0.71).abs() < 1e-4);
        assert_eq!(range.snap(50.0), 10.0);
        assert_eq!(range.snap(0.0), 0.71);
    }

    #[test]
    fn test_cutoff_rounding_bands() {
        let range = ParamId::Cutoff.range();
        assert_eq!(range.snap(440.4), 440.0);
        assert_eq!(range.snap(1234.0), 1230.0);
        assert_eq!(range.snap(4567.0), 4600.0);
        assert_eq!(range.snap(5.0), 20.0);
        assert_eq!(range.snap(f32::NAN), 200.0);
    }

    #[test]
    fn test_cutoff_taper_endpoints() {
        let range = ParamId::Cutoff.range();
        assert!((range.from_normalized(0.0) - 20.0).abs() < 1e-3);
        assert!((range.from_normalized(1.0) - 20000.0).abs() < 1e-1);
        assert!((range.to_normalized(20.0)).abs() < 1e-6);
        assert!((range.to_normalized(20000.0) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cutoff_taper_inverse() {
        let range = ParamId::Cutoff.range();
        for x in [0.1_f32, 0.25, 0.5, 0.75, 0.9] {
            let value = range.from_normalized(x);
            assert!(
                (range.to_normalized(value) - x).abs() < 1e-4,
                "taper should invert at {}",
                x
            );
        }
        // Half travel sits far below the arithmetic midpoint
        assert!(range.from_normalized(0.5) < 1000.0);
    }

    #[test]
    fn test_normalized_store_access() {
        let params = SharedParams::new();

        params.set_normalized(ParamId::Cutoff, 0.0);
        assert_eq!(params.get(ParamId::Cutoff), 20.0);
        params.set_normalized(ParamId::Cutoff, 1.0);
        assert_eq!(params.get(ParamId::Cutoff), 20000.0);

        // Half travel lands low on the log taper, then snaps to whole Hz
        params.set_normalized(ParamId::Cutoff, 0.5);
        assert_eq!(params.get(ParamId::Cutoff), 625.0);
        assert!((params.get_normalized(ParamId::Cutoff) - 0.5).abs() < 1e-3);

        params.set_normalized(ParamId::Scatter, 0.5);
        assert_eq!(params.get(ParamId::Scatter), 32.0);
        assert_eq!(params.get_normalized(ParamId::Scatter), 0.5);

        params.set_normalized(ParamId::Smash, 1.0);
        assert_eq!(params.get(ParamId::Smash), 10.0);
        assert_eq!(params.get_normalized(ParamId::Smash), 1.0);

        params.set_normalized(ParamId::Scatter, -3.0);
        assert_eq!(params.get(ParamId::Scatter), 0.0);
    }

    #[test]
    fn test_lookup_by_id() {
        let params = SharedParams::new();
        assert!(params.set_by_id("cutoff", 1000.0));
        assert_eq!(params.get_by_id("cutoff"), Some(1000.0));
        assert!(!params.set_by_id("volume", 1.0));
        assert_eq!(params.get_by_id("volume"), None);
    }

    #[test]
    fn test_reset_restores_defaults() {
        let params = SharedParams::new();
        params.set(ParamId::Scatter, 32.0);
        params.set(ParamId::Smash, 4.0);
        params.reset();
        assert_eq!(params.snapshot(), ParamSnapshot::default());
    }
}
