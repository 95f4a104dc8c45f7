//! Raw descriptor walking and field decoding
//!
//! All multi-byte fields are little-endian on the wire and are decoded
//! explicitly from byte slices. Nothing here assumes alignment or layout
//! beyond what the class specification states.

use crate::consts::desc_type;
use crate::error::{ParseError, Result};
use crate::types::SampleRates;

/// One length-prefixed descriptor inside a configuration buffer
#[derive(Debug, Clone, Copy)]
pub struct RawDescriptor<'a> {
    /// Offset of this descriptor within the configuration buffer
    pub offset: usize,
    /// The descriptor bytes, bLength long, starting at bLength itself
    pub bytes: &'a [u8],
}

impl<'a> RawDescriptor<'a> {
    pub fn descriptor_type(&self) -> u8 {
        self.bytes[1]
    }

    /// Subtype byte of a class-specific descriptor
    pub fn subtype(&self) -> u8 {
        if self.bytes.len() > 2 { self.bytes[2] } else { 0 }
    }

    fn require(&self, len: usize) -> Result<()> {
        if self.bytes.len() < len {
            return Err(ParseError::ShortDescriptor {
                descriptor_type: self.descriptor_type(),
                length: self.bytes.len() as u8,
            });
        }
        Ok(())
    }
}

/// Cursor over the descriptors of a configuration buffer
///
/// The caller bounds the buffer (typically to `wTotalLength`); the cursor
/// refuses to walk past it and treats a zero bLength as malformed input.
pub struct DescriptorCursor<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> DescriptorCursor<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, offset: 0 }
    }

    /// Advance to the next descriptor, `None` at end of buffer
    pub fn next(&mut self) -> Result<Option<RawDescriptor<'a>>> {
        if self.offset >= self.bytes.len() {
            return Ok(None);
        }
        let remaining = &self.bytes[self.offset..];
        if remaining.len() < 2 {
            return Err(ParseError::Truncated {
                offset: self.offset,
            });
        }
        let length = remaining[0] as usize;
        if length == 0 {
            return Err(ParseError::ZeroLength {
                offset: self.offset,
            });
        }
        // bLength must cover at least bLength and bDescriptorType themselves
        if length < 2 || length > remaining.len() {
            return Err(ParseError::Truncated {
                offset: self.offset,
            });
        }
        let desc = RawDescriptor {
            offset: self.offset,
            bytes: &remaining[..length],
        };
        self.offset += length;
        Ok(Some(desc))
    }
}

pub fn read_u16_le(bytes: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([bytes[offset], bytes[offset + 1]])
}

/// Decode a 3-byte little-endian sampling frequency
pub fn read_rate24(bytes: &[u8], offset: usize) -> u32 {
    u32::from(bytes[offset])
        | (u32::from(bytes[offset + 1]) << 8)
        | (u32::from(bytes[offset + 2]) << 16)
}

/// Bound a raw configuration buffer to its wTotalLength
pub fn config_bounds(config: &[u8]) -> Result<&[u8]> {
    if config.len() < 4 || config[1] != desc_type::CONFIGURATION {
        return Err(ParseError::Truncated { offset: 0 });
    }
    let total = read_u16_le(config, 2) as usize;
    if total > config.len() {
        return Err(ParseError::Truncated { offset: 0 });
    }
    Ok(&config[..total])
}

/// Standard interface descriptor fields this driver cares about
#[derive(Debug, Clone, Copy)]
pub struct InterfaceDesc {
    pub number: u8,
    pub alt_setting: u8,
    pub num_endpoints: u8,
    pub class: u8,
    pub subclass: u8,
}

impl InterfaceDesc {
    pub fn parse(raw: &RawDescriptor<'_>) -> Result<Self> {
        raw.require(7)?;
        Ok(Self {
            number: raw.bytes[2],
            alt_setting: raw.bytes[3],
            num_endpoints: raw.bytes[4],
            class: raw.bytes[5],
            subclass: raw.bytes[6],
        })
    }
}

/// Standard endpoint descriptor fields
#[derive(Debug, Clone, Copy)]
pub struct EndpointDesc {
    pub address: u8,
    pub attributes: u8,
    pub max_packet_size: u16,
    pub interval: u8,
}

impl EndpointDesc {
    pub fn parse(raw: &RawDescriptor<'_>) -> Result<Self> {
        raw.require(7)?;
        Ok(Self {
            address: raw.bytes[2],
            attributes: raw.bytes[3],
            max_packet_size: read_u16_le(raw.bytes, 4),
            interval: raw.bytes[6],
        })
    }
}

/// Audio-control header descriptor (audio10.pdf table 4-2)
#[derive(Debug, Clone, Copy)]
pub struct AcHeaderDesc {
    pub bcd_adc: u16,
    pub total_length: u16,
}

impl AcHeaderDesc {
    pub fn parse(raw: &RawDescriptor<'_>) -> Result<Self> {
        raw.require(7)?;
        Ok(Self {
            bcd_adc: read_u16_le(raw.bytes, 3),
            total_length: read_u16_le(raw.bytes, 5),
        })
    }
}

/// Input terminal descriptor (audio10.pdf table 4-3)
#[derive(Debug, Clone, Copy)]
pub struct InputTerminalDesc {
    pub terminal_id: u8,
    pub terminal_type: u16,
    pub nr_channels: u8,
    pub channel_config: u16,
}

impl InputTerminalDesc {
    pub fn parse(raw: &RawDescriptor<'_>) -> Result<Self> {
        raw.require(10)?;
        Ok(Self {
            terminal_id: raw.bytes[3],
            terminal_type: read_u16_le(raw.bytes, 4),
            nr_channels: raw.bytes[7],
            channel_config: read_u16_le(raw.bytes, 8),
        })
    }
}

/// Output terminal descriptor (audio10.pdf table 4-4)
#[derive(Debug, Clone, Copy)]
pub struct OutputTerminalDesc {
    pub terminal_id: u8,
    pub terminal_type: u16,
    pub source_id: u8,
}

impl OutputTerminalDesc {
    pub fn parse(raw: &RawDescriptor<'_>) -> Result<Self> {
        raw.require(8)?;
        Ok(Self {
            terminal_id: raw.bytes[3],
            terminal_type: read_u16_le(raw.bytes, 4),
            source_id: raw.bytes[7],
        })
    }
}

/// Feature unit descriptor with per-channel controls decoded into bitmaps
/// (audio10.pdf table 4-7)
#[derive(Debug, Clone, Copy)]
pub struct FeatureUnitDesc {
    pub unit_id: u8,
    pub source_id: u8,
    /// Bit per channel with a volume control, bit 0 is the master channel
    pub volume_channels: u8,
    /// Bit per channel with a mute control, bit 0 is the master channel
    pub mute_channels: u8,
}

impl FeatureUnitDesc {
    pub fn parse(raw: &RawDescriptor<'_>) -> Result<Self> {
        raw.require(7)?;
        let unit_id = raw.bytes[3];
        let source_id = raw.bytes[4];
        let control_size = raw.bytes[5] as usize;
        if control_size == 0 {
            return Err(ParseError::ShortDescriptor {
                descriptor_type: raw.descriptor_type(),
                length: raw.bytes.len() as u8,
            });
        }
        // bmaControls sits between the fixed 6-byte prefix and trailing iFeature
        let controls = &raw.bytes[6..raw.bytes.len() - 1];
        let mut volume_channels = 0u8;
        let mut mute_channels = 0u8;
        // The mute and volume bits live in the first byte of each entry
        for (ch, entry) in controls.chunks_exact(control_size).take(8).enumerate() {
            if entry[0] & crate::consts::fu_control::VOLUME != 0 {
                volume_channels |= 1 << ch;
            }
            if entry[0] & crate::consts::fu_control::MUTE != 0 {
                mute_channels |= 1 << ch;
            }
        }
        Ok(Self {
            unit_id,
            source_id,
            volume_channels,
            mute_channels,
        })
    }
}

/// Mixer or selector unit, reduced to its id and input pins
#[derive(Debug, Clone)]
pub struct UnitSourcesDesc {
    pub unit_id: u8,
    pub sources: Vec<u8>,
}

impl UnitSourcesDesc {
    pub fn parse(raw: &RawDescriptor<'_>) -> Result<Self> {
        raw.require(5)?;
        let unit_id = raw.bytes[3];
        let nr_pins = raw.bytes[4] as usize;
        raw.require(5 + nr_pins)?;
        Ok(Self {
            unit_id,
            sources: raw.bytes[5..5 + nr_pins].to_vec(),
        })
    }
}

/// Audio-streaming general descriptor (audio10.pdf table 4-19)
#[derive(Debug, Clone, Copy)]
pub struct AsGeneralDesc {
    pub terminal_link: u8,
    pub format_tag: u16,
}

impl AsGeneralDesc {
    pub fn parse(raw: &RawDescriptor<'_>) -> Result<Self> {
        raw.require(7)?;
        Ok(Self {
            terminal_link: raw.bytes[3],
            format_tag: read_u16_le(raw.bytes, 5),
        })
    }
}

/// Type I format descriptor (frmts10.pdf table 2-1)
#[derive(Debug, Clone)]
pub struct FormatTypeIDesc {
    pub format_type: u8,
    pub nr_channels: u8,
    pub subframe_size: u8,
    pub bit_resolution: u8,
    pub sample_rates: SampleRates,
}

impl FormatTypeIDesc {
    pub fn parse(raw: &RawDescriptor<'_>) -> Result<Self> {
        raw.require(8)?;
        let format_type = raw.bytes[3];
        let freq_type = raw.bytes[7] as usize;
        let sample_rates = if freq_type == 0 {
            // bSamFreqType 0 means a continuous lower..upper range
            raw.require(14)?;
            SampleRates::Continuous {
                min: read_rate24(raw.bytes, 8),
                max: read_rate24(raw.bytes, 11),
            }
        } else {
            raw.require(8 + 3 * freq_type)?;
            let rates = (0..freq_type)
                .map(|i| read_rate24(raw.bytes, 8 + 3 * i))
                .collect();
            SampleRates::Discrete(rates)
        };
        Ok(Self {
            format_type,
            nr_channels: raw.bytes[4],
            subframe_size: raw.bytes[5],
            bit_resolution: raw.bytes[6],
            sample_rates,
        })
    }
}

/// Class-specific isochronous endpoint descriptor (audio10.pdf table 4-21)
#[derive(Debug, Clone, Copy)]
pub struct CsEndpointDesc {
    pub attributes: u8,
}

impl CsEndpointDesc {
    pub fn parse(raw: &RawDescriptor<'_>) -> Result<Self> {
        raw.require(4)?;
        Ok(Self {
            attributes: raw.bytes[3],
        })
    }

    /// Bit 0 of bmAttributes advertises the SAMPLING_FREQ control
    pub fn sampling_freq_control(&self) -> bool {
        self.attributes & 0x01 != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cursor_walks_descriptors() {
        let buf = [3u8, 0x24, 0x01, 2, 0x05];
        let mut cursor = DescriptorCursor::new(&buf);
        let first = cursor.next().unwrap().unwrap();
        assert_eq!(first.bytes, &[3, 0x24, 0x01]);
        let second = cursor.next().unwrap().unwrap();
        assert_eq!(second.offset, 3);
        assert!(cursor.next().unwrap().is_none());
    }

    #[test]
    fn test_cursor_rejects_zero_length() {
        let buf = [0u8, 0x24, 0x01];
        let mut cursor = DescriptorCursor::new(&buf);
        assert_eq!(
            cursor.next().unwrap_err(),
            ParseError::ZeroLength { offset: 0 }
        );
    }

    #[test]
    fn test_cursor_rejects_header_only_length() {
        // bLength 1 cannot even cover bDescriptorType
        let buf = [1u8, 0x24, 0x01];
        let mut cursor = DescriptorCursor::new(&buf);
        assert_eq!(
            cursor.next().unwrap_err(),
            ParseError::Truncated { offset: 0 }
        );
    }

    #[test]
    fn test_cursor_rejects_truncation() {
        let buf = [9u8, 0x04, 0x00];
        let mut cursor = DescriptorCursor::new(&buf);
        assert_eq!(
            cursor.next().unwrap_err(),
            ParseError::Truncated { offset: 0 }
        );
    }

    #[test]
    fn test_rate24_decode() {
        // 44100 = 0x00AC44
        assert_eq!(read_rate24(&[0x44, 0xAC, 0x00], 0), 44_100);
        // 96000 = 0x017700
        assert_eq!(read_rate24(&[0x00, 0x77, 0x01], 0), 96_000);
    }

    #[test]
    fn test_feature_unit_channel_maps() {
        // Unit 6 sourced from 1, control size 2, master + 2 channels:
        // master has mute+volume, channel 1 volume only, channel 2 nothing
        let bytes = [
            13u8, 0x24, 0x06, 6, 1, 2, 0x03, 0x00, 0x02, 0x00, 0x00, 0x00, 0,
        ];
        let raw = RawDescriptor {
            offset: 0,
            bytes: &bytes,
        };
        let fu = FeatureUnitDesc::parse(&raw).unwrap();
        assert_eq!(fu.unit_id, 6);
        assert_eq!(fu.source_id, 1);
        assert_eq!(fu.volume_channels, 0b011);
        assert_eq!(fu.mute_channels, 0b001);
    }

    #[test]
    fn test_format_type_continuous_range() {
        let bytes = [
            14u8, 0x24, 0x02, 0x01, 2, 2, 16, 0, // bSamFreqType 0
            0x40, 0x1F, 0x00, // 8000
            0x80, 0xBB, 0x00, // 48000
        ];
        let raw = RawDescriptor {
            offset: 0,
            bytes: &bytes,
        };
        let fmt = FormatTypeIDesc::parse(&raw).unwrap();
        assert_eq!(
            fmt.sample_rates,
            SampleRates::Continuous {
                min: 8_000,
                max: 48_000
            }
        );
    }
}
