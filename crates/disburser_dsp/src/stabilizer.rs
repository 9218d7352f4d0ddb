//! Scatter Stabilizer
//!
//! Changing the number of active all-pass stages mid-stream clicks. Instead of
//! crossfading between topologies, the cascade is bypassed while the scatter
//! control is moving and re-engaged once it has held one value for a whole
//! observation window.

/// Number of block readings the gate looks back over
pub const STABILIZER_WINDOW: usize = 60;

/// Debounces the scatter control across processing blocks
///
/// Storage is a fixed ring, so `evaluate` never allocates.
#[derive(Debug, Clone)]
pub struct ScatterStabilizer {
    readings: [i32; STABILIZER_WINDOW],
    /// Index of the oldest reading
    head: usize,
    len: usize,
    sum: i64,
    /// How many of the most recent readings equal the newest one
    run: usize,
}

impl ScatterStabilizer {
    pub fn new() -> Self {
        Self {
            readings: [0; STABILIZER_WINDOW],
            head: 0,
            len: 0,
            sum: 0,
            run: 0,
        }
    }

    /// Record this block's scatter reading and report whether it is safe to
    /// apply the cascade with it.
    ///
    /// Returns `true` only when every reading in the window equals `current`.
    ///
    /// # Real-time Safety
    /// O(1), no allocation.
    #[inline]
    pub fn evaluate(&mut self, current: i32) -> bool {
        let previous = self.latest();

        if self.len == STABILIZER_WINDOW {
            self.sum -= i64::from(self.readings[self.head]);
            self.readings[self.head] = current;
            self.head = (self.head + 1) % STABILIZER_WINDOW;
        } else {
            let tail = (self.head + self.len) % STABILIZER_WINDOW;
            self.readings[tail] = current;
            self.len += 1;
        }
        self.sum += i64::from(current);

        self.run = match previous {
            Some(value) if value == current => (self.run + 1).min(STABILIZER_WINDOW),
            _ => 1,
        };

        self.run >= self.len && self.mean() == Some(current)
    }

    /// Arithmetic mean of the window, truncated to the integer domain
    pub fn mean(&self) -> Option<i32> {
        if self.len == 0 {
            None
        } else {
            Some((self.sum / self.len as i64) as i32)
        }
    }

    /// Most recent reading
    pub fn latest(&self) -> Option<i32> {
        if self.len == 0 {
            None
        } else {
            Some(self.readings[(self.head + self.len - 1) % STABILIZER_WINDOW])
        }
    }

    /// Number of readings currently in the window
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Forget all readings
    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

impl Default for ScatterStabilizer {
    fn default() -> Self {
        Self::new()
    }
}
