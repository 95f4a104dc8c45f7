//! Public value types produced by the descriptor parser

use serde::{Deserialize, Serialize};

/// Direction of a logical audio stream, named from the host's point of view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StreamDirection {
    /// Device to host (microphone)
    Rx,
    /// Host to device (speaker)
    Tx,
}

/// Sample rates supported by one alternate setting
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SampleRates {
    /// Explicit list of supported rates in Hz
    Discrete(Vec<u32>),
    /// Continuous range, inclusive on both ends
    Continuous { min: u32, max: u32 },
}

impl SampleRates {
    /// Whether `rate` is usable with this alternate setting
    pub fn supports(&self, rate: u32) -> bool {
        match self {
            SampleRates::Discrete(rates) => rates.contains(&rate),
            SampleRates::Continuous { min, max } => (*min..=*max).contains(&rate),
        }
    }
}

/// One audio-streaming alternate setting, fully described
///
/// Alternate setting 0 carries no endpoint and is never represented here;
/// index `i` in the parser output corresponds to wire alternate `i + 1`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AltSetting {
    /// Terminal the stream attaches to in the audio-control topology
    pub terminal_link: u8,
    /// Number of logical audio channels
    pub channels: u8,
    /// Bytes per sample per channel on the wire
    pub subframe_size: u8,
    /// Significant bits per sample
    pub bit_resolution: u8,
    /// Supported sampling frequencies
    pub sample_rates: SampleRates,
    /// Isochronous data endpoint address, bit 7 set for IN
    pub endpoint_address: u8,
    /// Endpoint max packet size in bytes
    pub endpoint_mps: u16,
    /// Endpoint bmAttributes (transfer type and sync bits)
    pub endpoint_attributes: u8,
    /// Endpoint service interval exponent
    pub endpoint_interval: u8,
    /// Endpoint honors the SAMPLING_FREQ control
    pub freq_ctrl_supported: bool,
}

impl AltSetting {
    /// Bytes that one isochronous service interval carries at `rate` Hz,
    /// rounded up when a millisecond of audio is not a whole number of bytes
    ///
    /// Sized from the significant bits per sample, not the wire subframe
    /// width, so a 16-in-24 format still moves only the 16 significant bits
    /// worth of data per interval.
    pub fn packet_size(&self, rate: u32) -> u32 {
        let bytes_per_second =
            rate * u32::from(self.channels) * u32::from(self.bit_resolution) / 8;
        let mut size = bytes_per_second / 1000;
        if bytes_per_second % 1000 != 0 {
            size += 1;
        }
        size
    }
}

/// Volume and mute capability of a resolved feature unit
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureUnitInfo {
    /// Unit id used as the high byte of wIndex in class requests
    pub unit_id: u8,
    /// Bitmap of channels with a volume control, bit 0 is the master channel
    pub volume_channels: u8,
    /// Bitmap of channels with a mute control, bit 0 is the master channel
    pub mute_channels: u8,
}

impl FeatureUnitInfo {
    pub fn has_volume(&self) -> bool {
        self.volume_channels != 0
    }

    pub fn has_mute(&self) -> bool {
        self.mute_channels != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_rate_support() {
        let discrete = SampleRates::Discrete(vec![44_100, 48_000]);
        assert!(discrete.supports(48_000));
        assert!(!discrete.supports(96_000));

        let range = SampleRates::Continuous {
            min: 8_000,
            max: 48_000,
        };
        assert!(range.supports(8_000));
        assert!(range.supports(48_000));
        assert!(!range.supports(96_000));
    }

    #[test]
    fn test_packet_size_rounds_up() {
        let alt = AltSetting {
            terminal_link: 1,
            channels: 2,
            subframe_size: 2,
            bit_resolution: 16,
            sample_rates: SampleRates::Discrete(vec![44_100, 48_000]),
            endpoint_address: 0x01,
            endpoint_mps: 192,
            endpoint_attributes: 0x09,
            endpoint_interval: 1,
            freq_ctrl_supported: true,
        };
        // 48000 * 2 * 16 / 8 / 1000 divides evenly
        assert_eq!(alt.packet_size(48_000), 192);
        // 44100 * 2 * 16 / 8 / 1000 = 176.4, rounds up
        assert_eq!(alt.packet_size(44_100), 177);
    }

    #[test]
    fn test_packet_size_uses_bit_resolution() {
        // 16 significant bits carried in 3-byte subframes: the packet moves
        // only the significant bits, not the padded subframe width
        let alt = AltSetting {
            terminal_link: 1,
            channels: 2,
            subframe_size: 3,
            bit_resolution: 16,
            sample_rates: SampleRates::Discrete(vec![48_000]),
            endpoint_address: 0x01,
            endpoint_mps: 288,
            endpoint_attributes: 0x09,
            endpoint_interval: 1,
            freq_ctrl_supported: true,
        };
        assert_eq!(alt.packet_size(48_000), 192);
    }
}
