//! Wire formats for the USB Audio Class 1.0 host driver
//!
//! This crate holds everything that can be computed from descriptor bytes
//! alone: the class constants, a bounds-checked descriptor walker, the
//! configuration parser that turns a raw configuration descriptor into
//! typed alternate settings and a control topology, and setup-packet
//! construction for the class requests the driver issues.
//!
//! # Example
//!
//! ```
//! use uac_proto::{parse_streaming_interface, StreamDirection, testdata};
//!
//! let config = testdata::headset_config();
//! let info = parse_streaming_interface(&config, 1).unwrap();
//! assert_eq!(info.direction, StreamDirection::Tx);
//! assert!(info.alt_settings[0].sample_rates.supports(48_000));
//! ```

pub mod consts;
pub mod descriptor;
pub mod error;
pub mod parse;
pub mod request;
pub mod testdata;
pub mod types;

pub use error::{ParseError, Result};
pub use parse::{
    AcEntity, AcInterfaceInfo, StreamInterfaceInfo, has_audio_interface, parse_ac_interface,
    parse_streaming_interface, streaming_interfaces,
};
pub use request::{SetupPacket, decode_sample_rate, encode_sample_rate};
pub use types::{AltSetting, FeatureUnitInfo, SampleRates, StreamDirection};
