//! Audio Stream Management
//!
//! Handles the CPAL stream setup and real-time audio callbacks that host an
//! `AudioEngine` outside a plugin host.
//!
//! # Audio Flow
//!
//! ```text
//!   capture device ──cpal──▶ rtrb ring ──▶ output callback ──cpal──▶ output device
//!                                              │
//!                                              ├─▶ AudioEngine::process_interleaved
//!                                              ├─▶ SharedState (peaks, engaged)
//!                                              └─▶ SpectralFeed (inside the engine)
//! ```
//!
//! Only interleaved stereo is accepted; the cascade has no meaning for other
//! channel layouts.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{Device, Stream, StreamConfig as CpalStreamConfig};
use crossbeam_channel::Sender;
use rtrb::{Consumer, Producer, RingBuffer};
use tracing::{debug, info};

use disburser_dsp::SharedParams;

use crate::config::{EngineConfig, StreamConfig};
use crate::engine::AudioEngine;
use crate::error::{EngineError, EngineResult};
use crate::message::Event;

/// Channel count the stream negotiates
pub const STREAM_CHANNELS: u16 = 2;

/// Shared state between audio callback and control thread
pub struct SharedState {
    /// Whether the cascade ran on the last processed block
    engaged: AtomicBool,

    /// Peak level left channel (stored as u32, interpreted as f32 bits)
    /// Rust pattern: AtomicF32 doesn't exist, so we use bit-casting
    peak_left_bits: AtomicU32,

    /// Peak level right channel
    peak_right_bits: AtomicU32,
}

impl SharedState {
    pub fn new() -> Self {
        Self {
            engaged: AtomicBool::new(false),
            peak_left_bits: AtomicU32::new(0.0_f32.to_bits()),
            peak_right_bits: AtomicU32::new(0.0_f32.to_bits()),
        }
    }

    pub fn set_peaks(&self, left: f32, right: f32) {
        // Rust pattern: Relaxed ordering is fine for single-value updates
        // that don't need to synchronize with other memory operations
        self.peak_left_bits.store(left.to_bits(), Ordering::Relaxed);
        self.peak_right_bits.store(right.to_bits(), Ordering::Relaxed);
    }

    pub fn peaks(&self) -> (f32, f32) {
        (
            f32::from_bits(self.peak_left_bits.load(Ordering::Relaxed)),
            f32::from_bits(self.peak_right_bits.load(Ordering::Relaxed)),
        )
    }

    /// Record the engaged flag; returns true when it changed
    pub fn set_engaged(&self, engaged: bool) -> bool {
        self.engaged.swap(engaged, Ordering::Relaxed) != engaged
    }

    pub fn is_engaged(&self) -> bool {
        self.engaged.load(Ordering::Relaxed)
    }
}

impl Default for SharedState {
    fn default() -> Self {
        Self::new()
    }
}

/// Peak absolute level per channel of an interleaved stereo buffer
pub fn stereo_peaks(data: &[f32]) -> (f32, f32) {
    data.chunks_exact(2).fold((0.0_f32, 0.0_f32), |(l, r), frame| {
        (l.max(frame[0].abs()), r.max(frame[1].abs()))
    })
}

/// Reject configurations the stream cannot run
pub fn check_config(config: &StreamConfig) -> EngineResult<()> {
    config.validate().map_err(EngineError::ConfigError)?;
    if config.channels != STREAM_CHANNELS {
        return Err(EngineError::UnsupportedChannelCount(config.channels));
    }
    Ok(())
}

/// Manages an active capture -> engine -> output stream pair
pub struct AudioStream {
    /// The underlying CPAL streams (kept alive to maintain audio flow)
    /// Rust pattern: `#[allow(dead_code)]` because we need to hold the stream
    /// even though we don't call methods on it directly
    #[allow(dead_code)]
    capture_stream: Option<Stream>,

    output_stream: Option<Stream>,

    /// Shared state for meters and the engaged indicator
    pub shared: Arc<SharedState>,

    /// Control values read by the engine every block
    params: Arc<SharedParams>,

    /// Current stream configuration
    pub config: StreamConfig,

    event_sender: Sender<Event>,
}

impl AudioStream {
    /// Start streaming audio from `capture_device` through `engine` to `output_device`
    ///
    /// The engine is re-prepared for the negotiated sample rate and buffer
    /// size, then moved into the output callback.
    pub fn new(
        config: &EngineConfig,
        capture_device: &Device,
        output_device: &Device,
        mut engine: AudioEngine,
        event_sender: Sender<Event>,
    ) -> EngineResult<Self> {
        let stream_config = config.stream.clone();
        check_config(&stream_config)?;

        engine.prepare(
            stream_config.sample_rate as f32,
            stream_config.buffer_size as usize,
        )?;

        let shared = Arc::new(SharedState::new());
        let params = Arc::clone(engine.params());

        // Ring buffer between capture and output callbacks, in samples
        let ring_size = config
            .ring_buffer_frames
            .max(stream_config.buffer_size as usize)
            * stream_config.channels as usize;
        let (producer, consumer) = RingBuffer::<f32>::new(ring_size);

        let cpal_config = CpalStreamConfig {
            channels: stream_config.channels,
            sample_rate: cpal::SampleRate(stream_config.sample_rate),
            buffer_size: cpal::BufferSize::Fixed(stream_config.buffer_size),
        };

        let capture_stream =
            Self::build_capture_stream(capture_device, &cpal_config, producer, event_sender.clone())?;
        let output_stream = Self::build_output_stream(
            output_device,
            &cpal_config,
            consumer,
            engine,
            Arc::clone(&shared),
            event_sender.clone(),
        )?;

        capture_stream
            .play()
            .map_err(|e| EngineError::StreamPlayError(e.to_string()))?;
        output_stream
            .play()
            .map_err(|e| EngineError::StreamPlayError(e.to_string()))?;

        info!(
            sample_rate = stream_config.sample_rate,
            buffer_size = stream_config.buffer_size,
            latency_ms = stream_config.latency_ms(),
            "Audio stream started"
        );
        let _ = event_sender.try_send(Event::Started);

        Ok(Self {
            capture_stream: Some(capture_stream),
            output_stream: Some(output_stream),
            shared,
            params,
            config: stream_config,
            event_sender,
        })
    }

    fn build_capture_stream(
        device: &Device,
        config: &CpalStreamConfig,
        mut producer: Producer<f32>,
        event_sender: Sender<Event>,
    ) -> EngineResult<Stream> {
        let err_sender = event_sender.clone();

        let stream = device
            .build_input_stream(
                config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    // Real-time audio callback - NO allocations allowed here
                    let room = producer.slots().min(data.len());
                    let written = producer
                        .write_chunk_uninit(room)
                        .map_or(0, |chunk| chunk.fill_from_iter(data.iter().copied()));

                    if written < data.len() {
                        // Overflow - the output side is not keeping up
                        let _ = event_sender.try_send(Event::BufferUnderrun);
                    }
                },
                move |err| {
                    let _ = err_sender.try_send(Event::error(err));
                },
                None, // No timeout
            )
            .map_err(|e| EngineError::StreamBuildError(e.to_string()))?;

        Ok(stream)
    }

    fn build_output_stream(
        device: &Device,
        config: &CpalStreamConfig,
        mut consumer: Consumer<f32>,
        mut engine: AudioEngine,
        shared: Arc<SharedState>,
        event_sender: Sender<Event>,
    ) -> EngineResult<Stream> {
        let err_sender = event_sender.clone();

        // Rust pattern: `move` closure takes ownership of the engine, so the
        // audio thread is its only user from here on
        let stream = device
            .build_output_stream(
                config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    // Real-time audio callback - NO allocations allowed here
                    let to_read = data.len().min(consumer.slots());

                    if to_read < data.len() {
                        // Underrun - fill with silence
                        data.fill(0.0);
                        let _ = event_sender.try_send(Event::BufferUnderrun);
                    }

                    if let Ok(chunk) = consumer.read_chunk(to_read) {
                        let (first, second) = chunk.as_slices();
                        data[..first.len()].copy_from_slice(first);
                        data[first.len()..first.len() + second.len()].copy_from_slice(second);
                        chunk.commit_all();
                    }

                    engine.process_interleaved(data);

                    let (peak_l, peak_r) = stereo_peaks(data);
                    shared.set_peaks(peak_l, peak_r);

                    let engaged = engine.is_engaged();
                    if shared.set_engaged(engaged) {
                        let _ = event_sender.try_send(Event::Engaged(engaged));
                    }
                },
                move |err| {
                    let _ = err_sender.try_send(Event::error(err));
                },
                None,
            )
            .map_err(|e| EngineError::StreamBuildError(e.to_string()))?;

        Ok(stream)
    }

    /// Control values the running engine reads
    pub fn params(&self) -> &Arc<SharedParams> {
        &self.params
    }

    /// Get current peak levels (for meters)
    pub fn get_peaks(&self) -> (f32, f32) {
        self.shared.peaks()
    }

    /// Whether the cascade ran on the most recent block
    pub fn is_engaged(&self) -> bool {
        self.shared.is_engaged()
    }

    pub fn is_running(&self) -> bool {
        self.output_stream.is_some()
    }

    /// Stop both streams; the engine is dropped with the output stream
    pub fn stop(&mut self) {
        if self.output_stream.take().is_some() {
            self.capture_stream = None;
            debug!("Audio stream stopped");
            let _ = self.event_sender.try_send(Event::Stopped);
        }
    }
}

impl Drop for AudioStream {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shared_state_defaults() {
        let state = SharedState::new();
        assert!(!state.is_engaged());
        assert_eq!(state.peaks(), (0.0, 0.0));
    }

    #[test]
    fn test_shared_state_peaks() {
        let state = SharedState::new();

        state.set_peaks(0.8, 0.6);
        let (l, r) = state.peaks();
        assert_eq!(l, 0.8);
        assert_eq!(r, 0.6);
    }

    #[test]
    fn test_engaged_reports_changes_only() {
        let state = SharedState::new();

        assert!(state.set_engaged(true));
        assert!(!state.set_engaged(true));
        assert!(state.is_engaged());
        assert!(state.set_engaged(false));
        assert!(!state.set_engaged(false));
    }

    #[test]
    fn test_stereo_peaks() {
        let data = [0.1, -0.9, -0.5, 0.2, 0.3, 0.0];
        assert_eq!(stereo_peaks(&data), (0.5, 0.9));
        assert_eq!(stereo_peaks(&[]), (0.0, 0.0));
    }

    // Hardware-dependent tests
    #[test]
    #[ignore = "requires audio hardware"]
    fn test_stream_creation() {
        use crate::device::{AudioDevice, DeviceType};

        let (sender, receiver) = crossbeam_channel::unbounded();
        let config = EngineConfig::default();
        let params = Arc::new(SharedParams::new());
        let (engine, _analyzer) = AudioEngine::new(params, 48000.0, 512).unwrap();

        let (Ok(input), Ok(output)) = (
            AudioDevice::open(DeviceType::Input, None),
            AudioDevice::open(DeviceType::Output, None),
        ) else {
            return;
        };

        // May fail if the hardware rejects the config, which is fine for CI
        if let Ok(stream) = AudioStream::new(&config, &input, &output, engine, sender) {
            assert_eq!(stream.config.sample_rate, 48000);
            assert!(stream.is_running());
            assert!(matches!(receiver.try_recv(), Ok(Event::Started)));
        }
    }

    #[test]
    fn test_check_config() {
        assert!(check_config(&StreamConfig::default()).is_ok());

        let mono = StreamConfig {
            channels: 1,
            ..Default::default()
        };
        assert!(matches!(
            check_config(&mono),
            Err(EngineError::UnsupportedChannelCount(1))
        ));

        let tiny_buffer = StreamConfig {
            buffer_size: 4,
            ..Default::default()
        };
        assert!(matches!(
            check_config(&tiny_buffer),
            Err(EngineError::ConfigError(_))
        ));
    }
}
