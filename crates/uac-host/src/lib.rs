//! Host-side USB Audio Class 1.0 driver
//!
//! Sits between an application and a USB host stack and turns UAC 1.0
//! devices (headsets, speakers, microphones) into streams with a blocking
//! read/write surface plus volume, mute and sample-rate control.
//!
//! The host stack itself is a trait seam ([`backend::UsbHostBackend`]);
//! the driver owns descriptor parsing, the per-stream state machine, the
//! isochronous pipelines and the control-request engine.
//!
//! # Lifecycle
//!
//! Install once per host stack, open one handle per streaming interface:
//!
//! ```ignore
//! let host = UacHost::install(backend, DriverConfig::default())?;
//! let handle = host.open(StreamOpenConfig {
//!     address: 1,
//!     interface: 2,
//!     ring_capacity: 16 * 1024,
//!     ring_threshold: 4 * 1024,
//!     callback: None,
//! })?;
//! host.start(&handle, &config)?;
//! let n = host.read(&handle, &mut buf, Duration::from_millis(100))?;
//! ```

pub mod backend;
pub mod device;
pub mod error;
pub mod events;
pub mod host;
pub mod logging;
pub mod registry;
pub mod ring;
pub mod stream;
pub mod sync;
pub mod test_utils;

pub use error::{Error, Result};
pub use events::{DriverCallback, DriverEvent, StreamCallback, StreamEvent};
pub use host::{DeviceInfo, DriverConfig, StreamHandle, StreamOpenConfig, UacHost};
pub use logging::setup_logging;
pub use stream::{StreamConfig, StreamFlags, StreamState};
