//! Engine Error Types

use thiserror::Error;

/// Errors that can occur in the audio engine and its host transport
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("No audio devices found")]
    NoDevicesFound,

    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    #[error("Failed to build audio stream: {0}")]
    StreamBuildError(String),

    #[error("Failed to play audio stream: {0}")]
    StreamPlayError(String),

    #[error("Stream configuration error: {0}")]
    ConfigError(String),

    #[error("Unsupported channel count {0}: the scatter cascade is stereo only")]
    UnsupportedChannelCount(u16),

    #[error("DSP error: {0}")]
    DspError(#[from] disburser_dsp::DspError),

    #[error("Config parse error: {0}")]
    ParseError(#[from] serde_json::Error),

    #[error("Channel send error - receiver dropped")]
    ChannelSendError,
}

/// Result type alias for engine operations
pub type EngineResult<T> = Result<T, EngineError>;
