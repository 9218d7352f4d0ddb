//! Message Types for Thread Communication
//!
//! Events flow from the audio stream -> host/UI thread. Control values do not
//! travel as messages; they are written straight into `SharedParams`.

use serde::{Deserialize, Serialize};

/// Events sent from the audio stream to the host
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum Event {
    /// Stream started successfully
    Started,

    /// Stream stopped
    Stopped,

    /// Error occurred
    Error { message: String },

    /// Output callback ran dry (audio glitch)
    BufferUnderrun,

    /// Audio level update (for meters)
    /// Contains peak levels: (left, right) in range 0.0 - 1.0
    LevelUpdate { left: f32, right: f32 },

    /// Display bands for visualization
    /// 32 logarithmically spaced magnitudes from ~20Hz to 20kHz, 0.0 to 1.0
    SpectrumUpdate { bins: Vec<f32> },

    /// The cascade switched between engaged and bypassed
    Engaged(bool),
}

impl Event {
    /// Create an error event from any error type
    pub fn error<E: std::fmt::Display>(err: E) -> Self {
        Event::Error {
            message: err.to_string(),
        }
    }
}
