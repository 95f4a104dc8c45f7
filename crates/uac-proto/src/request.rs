//! Control setup-packet construction
//!
//! Encodes the class-specific and standard requests the driver issues:
//! feature-unit get/set on the control interface, sampling-frequency
//! get/set on an endpoint, and SET_INTERFACE.

use crate::consts::{STD_REQUEST_SET_INTERFACE, request_type};

/// An eight-byte control setup packet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetupPacket {
    pub request_type: u8,
    pub request: u8,
    pub value: u16,
    pub index: u16,
    pub length: u16,
}

impl SetupPacket {
    /// Class request addressed to a unit of the audio-control interface.
    ///
    /// `wValue` carries the control selector in the high byte and the
    /// channel in the low byte; `wIndex` carries the unit id in the high
    /// byte and the interface number in the low byte. Direction follows
    /// bit 7 of the request code (all GET_* codes have it set).
    pub fn class_interface(
        request: u8,
        selector: u8,
        channel: u8,
        unit_id: u8,
        interface: u8,
        length: u16,
    ) -> Self {
        let request_type = if request & 0x80 != 0 {
            request_type::CLASS_INTERFACE_IN
        } else {
            request_type::CLASS_INTERFACE_OUT
        };
        Self {
            request_type,
            request,
            value: (u16::from(selector) << 8) | u16::from(channel),
            index: (u16::from(unit_id) << 8) | u16::from(interface),
            length,
        }
    }

    /// Class request addressed to an isochronous endpoint; `wIndex` is the
    /// endpoint address
    pub fn class_endpoint(request: u8, selector: u8, endpoint: u8, length: u16) -> Self {
        let request_type = if request & 0x80 != 0 {
            request_type::CLASS_ENDPOINT_IN
        } else {
            request_type::CLASS_ENDPOINT_OUT
        };
        Self {
            request_type,
            request,
            value: u16::from(selector) << 8,
            index: u16::from(endpoint),
            length,
        }
    }

    /// Standard SET_INTERFACE selecting an alternate setting
    pub fn set_interface(interface: u8, alt_setting: u8) -> Self {
        Self {
            request_type: request_type::STD_INTERFACE_OUT,
            request: STD_REQUEST_SET_INTERFACE,
            value: u16::from(alt_setting),
            index: u16::from(interface),
            length: 0,
        }
    }

    /// True for device-to-host requests
    pub fn is_in(&self) -> bool {
        self.request_type & 0x80 != 0
    }

    /// Wire image of the setup packet
    pub fn to_bytes(&self) -> [u8; 8] {
        let mut out = [0u8; 8];
        out[0] = self.request_type;
        out[1] = self.request;
        out[2..4].copy_from_slice(&self.value.to_le_bytes());
        out[4..6].copy_from_slice(&self.index.to_le_bytes());
        out[6..8].copy_from_slice(&self.length.to_le_bytes());
        out
    }
}

/// Encode a sampling frequency as the 3-byte little-endian payload of a
/// SAMPLING_FREQ request
pub fn encode_sample_rate(rate: u32) -> [u8; 3] {
    [rate as u8, (rate >> 8) as u8, (rate >> 16) as u8]
}

/// Decode the 3-byte payload of a SAMPLING_FREQ response
pub fn decode_sample_rate(payload: &[u8]) -> u32 {
    if payload.len() < 3 {
        return 0;
    }
    u32::from(payload[0]) | (u32::from(payload[1]) << 8) | (u32::from(payload[2]) << 16)
}
