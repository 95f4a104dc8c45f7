//! USB Audio Class 1.0 wire constants
//!
//! Codes from audio10.pdf (class descriptors, requests, selectors),
//! termt10.pdf (terminal types) and frmts10.pdf (format types).

/// Standard descriptor types (USB 2.0 table 9-5)
pub mod desc_type {
    pub const CONFIGURATION: u8 = 0x02;
    pub const INTERFACE: u8 = 0x04;
    pub const ENDPOINT: u8 = 0x05;
    /// Class-specific interface descriptor
    pub const CS_INTERFACE: u8 = 0x24;
    /// Class-specific endpoint descriptor
    pub const CS_ENDPOINT: u8 = 0x25;
}

/// Interface class / subclass codes (audio10.pdf table A-1/A-2)
pub mod class {
    pub const AUDIO: u8 = 0x01;
    pub const SUBCLASS_AUDIOCONTROL: u8 = 0x01;
    pub const SUBCLASS_AUDIOSTREAMING: u8 = 0x02;
}

/// Audio-control interface descriptor subtypes (audio10.pdf table A-5)
pub mod ac_subtype {
    pub const HEADER: u8 = 0x01;
    pub const INPUT_TERMINAL: u8 = 0x02;
    pub const OUTPUT_TERMINAL: u8 = 0x03;
    pub const MIXER_UNIT: u8 = 0x04;
    pub const SELECTOR_UNIT: u8 = 0x05;
    pub const FEATURE_UNIT: u8 = 0x06;
}

/// Audio-streaming interface descriptor subtypes (audio10.pdf table A-6)
pub mod as_subtype {
    pub const GENERAL: u8 = 0x01;
    pub const FORMAT_TYPE: u8 = 0x02;
}

/// Audio-endpoint descriptor subtypes (audio10.pdf table A-8)
pub mod ep_subtype {
    pub const GENERAL: u8 = 0x01;
}

/// Class-specific request codes (audio10.pdf table A-9)
pub mod request {
    pub const SET_CUR: u8 = 0x01;
    pub const GET_CUR: u8 = 0x81;
    pub const GET_MIN: u8 = 0x82;
    pub const GET_MAX: u8 = 0x83;
    pub const GET_RES: u8 = 0x84;
}

/// Feature-unit control selectors (audio10.pdf table A-11)
pub mod fu_selector {
    pub const MUTE: u8 = 0x01;
    pub const VOLUME: u8 = 0x02;
}

/// Endpoint control selectors (audio10.pdf table A-19)
pub mod ep_selector {
    pub const SAMPLING_FREQ: u8 = 0x01;
}

/// Feature-unit control positions in bmaControls (audio10.pdf table 4-7)
pub mod fu_control {
    pub const MUTE: u8 = 0x01;
    pub const VOLUME: u8 = 0x02;
}

/// Terminal types (termt10.pdf table 2-1)
pub mod terminal_type {
    /// Terminal attached to the USB isochronous pipe
    pub const USB_STREAMING: u16 = 0x0101;
}

/// Format codes (frmts10.pdf tables A-1 and A-4)
pub mod format {
    pub const TAG_PCM: u16 = 0x0001;
    pub const TYPE_I: u8 = 0x01;
}

/// Supported audio class release in BCD
pub const BCD_ADC_V1_0: u16 = 0x0100;

/// Standard SET_INTERFACE request code (USB 2.0 table 9-4)
pub const STD_REQUEST_SET_INTERFACE: u8 = 0x0B;

/// bmRequestType values used by this driver
pub mod request_type {
    /// Host to device, class request, interface recipient
    pub const CLASS_INTERFACE_OUT: u8 = 0x21;
    /// Device to host, class request, interface recipient
    pub const CLASS_INTERFACE_IN: u8 = 0xA1;
    /// Host to device, class request, endpoint recipient
    pub const CLASS_ENDPOINT_OUT: u8 = 0x22;
    /// Device to host, class request, endpoint recipient
    pub const CLASS_ENDPOINT_IN: u8 = 0xA2;
    /// Host to device, standard request, interface recipient
    pub const STD_INTERFACE_OUT: u8 = 0x01;
}

/// Endpoint address direction bit (set means IN)
pub const ENDPOINT_DIR_IN: u8 = 0x80;
