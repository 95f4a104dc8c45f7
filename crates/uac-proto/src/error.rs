//! Descriptor parse error types

use thiserror::Error;

/// Errors produced while walking a configuration descriptor
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    /// Descriptor extends past the end of the buffer
    #[error("Descriptor at offset {offset} is truncated")]
    Truncated { offset: usize },

    /// A descriptor reported bLength == 0, the walk cannot make progress
    #[error("Descriptor at offset {offset} has zero length")]
    ZeroLength { offset: usize },

    /// Descriptor body is shorter than its type requires
    #[error("Descriptor type {descriptor_type:#04x} too short: {length} bytes")]
    ShortDescriptor { descriptor_type: u8, length: u8 },

    /// No audio-control interface in this configuration
    #[error("No audio control interface found")]
    NoAudioControl,

    /// The requested interface number is not an audio-streaming interface
    #[error("Interface {interface} is not an audio streaming interface")]
    NoSuchInterface { interface: u8 },

    /// Audio-streaming interface has no usable alternate settings
    #[error("Interface {interface} has no streaming alternate settings")]
    NoAltSettings { interface: u8 },

    /// Device speaks a class revision other than 1.0
    #[error("Audio class version {bcd_adc:#06x} not supported")]
    UnsupportedVersion { bcd_adc: u16 },

    /// Stream format tag other than PCM
    #[error("Audio format tag {tag:#06x} not supported")]
    UnsupportedFormatTag { tag: u16 },

    /// Format type descriptor other than Type I
    #[error("Audio format type {format_type} not supported")]
    UnsupportedFormatType { format_type: u8 },
}

/// Type alias for parse results
pub type Result<T> = std::result::Result<T, ParseError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ParseError::UnsupportedVersion { bcd_adc: 0x0200 };
        let msg = format!("{}", err);
        assert!(msg.contains("0x0200"));

        let err = ParseError::Truncated { offset: 42 };
        assert!(format!("{}", err).contains("42"));
    }
}
