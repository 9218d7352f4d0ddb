//! Audio Device Discovery
//!
//! Lists capture and playback devices and resolves a device by name for
//! `AudioStream`. Devices are identified by their CPAL name.

use cpal::traits::{DeviceTrait, HostTrait};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{EngineError, EngineResult};

/// Sample rates probed when describing a device
const PROBE_RATES: [u32; 6] = [44100, 48000, 88200, 96000, 176400, 192000];

/// Type of audio device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceType {
    Input,
    Output,
}

/// Description of an audio device (input or output)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioDevice {
    /// Human-readable device name, also used to select it
    pub name: String,

    /// Whether this is an input or output device
    pub device_type: DeviceType,

    /// Whether this is the system default device
    pub is_default: bool,

    /// Probed sample rates the device accepts (may be empty if querying failed)
    pub sample_rates: Vec<u32>,

    /// Maximum supported channels
    pub max_channels: u16,
}

impl AudioDevice {
    /// Whether the device can carry the stereo pair the cascade needs
    pub fn supports_stereo(&self) -> bool {
        self.max_channels >= 2
    }

    /// Whether the device accepts a sample rate
    pub fn supports_rate(&self, sample_rate: u32) -> bool {
        self.sample_rates.contains(&sample_rate)
    }

    /// Describe every device of both directions
    pub fn enumerate_all() -> EngineResult<Vec<AudioDevice>> {
        let mut devices = Self::enumerate(DeviceType::Input)?;
        devices.extend(Self::enumerate(DeviceType::Output)?);

        if devices.is_empty() {
            return Err(EngineError::NoDevicesFound);
        }
        Ok(devices)
    }

    /// Describe every device of one direction
    pub fn enumerate(device_type: DeviceType) -> EngineResult<Vec<AudioDevice>> {
        let host = cpal::default_host();
        let default_name = default_device(&host, device_type).and_then(|d| d.name().ok());

        let devices = list_devices(&host, device_type)?;

        // Devices that fail to describe themselves are skipped, not fatal
        Ok(devices
            .iter()
            .filter_map(|device| {
                Self::describe(device, device_type, default_name.as_deref())
                    .map_err(|e| warn!("Skipping device: {}", e))
                    .ok()
            })
            .collect())
    }

    /// Resolve a device by exact name, or the system default when no name is given
    pub fn open(device_type: DeviceType, name: Option<&str>) -> EngineResult<cpal::Device> {
        let host = cpal::default_host();

        let Some(wanted) = name else {
            return default_device(&host, device_type).ok_or(EngineError::NoDevicesFound);
        };

        let device = list_devices(&host, device_type)?
            .into_iter()
            .find(|d| d.name().map(|n| n == wanted).unwrap_or(false))
            .ok_or_else(|| EngineError::DeviceNotFound(wanted.to_string()))?;

        debug!(?device_type, name = wanted, "Resolved audio device");
        Ok(device)
    }

    fn describe(
        device: &cpal::Device,
        device_type: DeviceType,
        default_name: Option<&str>,
    ) -> EngineResult<Self> {
        let name = device
            .name()
            .map_err(|e| EngineError::DeviceNotFound(e.to_string()))?;
        let is_default = default_name == Some(name.as_str());

        let (sample_rates, max_channels) = match device_type {
            DeviceType::Input => device
                .supported_input_configs()
                .map(summarize_configs)
                .unwrap_or_default(),
            DeviceType::Output => device
                .supported_output_configs()
                .map(summarize_configs)
                .unwrap_or_default(),
        };

        Ok(AudioDevice {
            name,
            device_type,
            is_default,
            sample_rates,
            max_channels,
        })
    }
}

fn default_device(host: &cpal::Host, device_type: DeviceType) -> Option<cpal::Device> {
    match device_type {
        DeviceType::Input => host.default_input_device(),
        DeviceType::Output => host.default_output_device(),
    }
}

fn list_devices(host: &cpal::Host, device_type: DeviceType) -> EngineResult<Vec<cpal::Device>> {
    match device_type {
        DeviceType::Input => host.input_devices().map(|d| d.collect()),
        DeviceType::Output => host.output_devices().map(|d| d.collect()),
    }
    .map_err(|e| EngineError::DeviceNotFound(e.to_string()))
}

/// Probe rates and widest channel count across a device's config ranges
fn summarize_configs(
    configs: impl Iterator<Item = cpal::SupportedStreamConfigRange>,
) -> (Vec<u32>, u16) {
    let mut sample_rates = Vec::new();
    let mut max_channels = 0u16;

    for config in configs {
        max_channels = max_channels.max(config.channels());

        let range = config.min_sample_rate().0..=config.max_sample_rate().0;
        for rate in PROBE_RATES {
            if range.contains(&rate) && !sample_rates.contains(&rate) {
                sample_rates.push(rate);
            }
        }
    }

    sample_rates.sort_unstable();
    (sample_rates, max_channels)
}
