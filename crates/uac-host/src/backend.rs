//! Host-controller seam
//!
//! The driver sits on top of a USB host stack that owns enumeration, the
//! control pipe and isochronous scheduling. That stack is expressed as a
//! pair of traits so the driver stays independent of any one implementation
//! and the test suite can script one.
//!
//! Transfers are owned values: the driver builds a transfer, hands it to
//! the backend with `submit_*`, and receives it back exactly once, through
//! the completion callback on success or inside the rejection when the
//! submission fails. A transfer is therefore either in flight or in the
//! driver's free list, never both.

use std::sync::Arc;

use crate::error::{Error, Result};

/// Final status of a submitted transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferStatus {
    /// Transferred without error; per-packet results may still vary
    Completed,
    /// Flushed or aborted by the driver before completion
    Canceled,
    /// Endpoint answered with STALL
    Stall,
    /// Device left the bus
    NoDevice,
    /// Deadline elapsed inside the host stack
    TimedOut,
    /// Any other bus or protocol error
    Error,
}

/// Per-packet outcome of an isochronous transfer
#[derive(Debug, Clone, Copy)]
pub struct IsoPacket {
    /// Bytes requested for this service interval
    pub length: u32,
    /// Bytes actually moved
    pub actual: u32,
    pub status: TransferStatus,
}

/// Completion callback; receives the transfer back together with its status
pub type IsoCompletion = Box<dyn FnOnce(IsoTransfer, TransferStatus) + Send>;

/// An isochronous transfer covering several service intervals
pub struct IsoTransfer {
    pub endpoint: u8,
    /// Backing store, `packets.len()` slots of `packet_capacity` bytes each
    pub buffer: Vec<u8>,
    pub packet_capacity: usize,
    pub packets: Vec<IsoPacket>,
    pub timeout_ms: u32,
    completion: Option<IsoCompletion>,
}

impl IsoTransfer {
    pub fn new(endpoint: u8, packet_count: usize, packet_capacity: usize, timeout_ms: u32) -> Self {
        Self {
            endpoint,
            buffer: vec![0u8; packet_count * packet_capacity],
            packet_capacity,
            packets: vec![
                IsoPacket {
                    length: packet_capacity as u32,
                    actual: 0,
                    status: TransferStatus::Completed,
                };
                packet_count
            ],
            timeout_ms,
            completion: None,
        }
    }

    /// Set the bytes requested per packet (at most `packet_capacity`)
    pub fn set_packet_length(&mut self, length: u32) {
        for packet in &mut self.packets {
            packet.length = length;
        }
    }

    pub fn set_completion(
        &mut self,
        completion: impl FnOnce(IsoTransfer, TransferStatus) + Send + 'static,
    ) {
        self.completion = Some(Box::new(completion));
    }

    /// Drop a pending completion, for transfers that never made it onto
    /// the wire
    pub fn clear_completion(&mut self) {
        self.completion = None;
    }

    /// Backend side: hand the transfer back to its completion callback
    pub fn complete(mut self, status: TransferStatus) {
        if let Some(completion) = self.completion.take() {
            completion(self, status);
        }
    }

    /// Payload slice of packet `index`, bounded by its actual byte count
    pub fn packet_data(&self, index: usize) -> &[u8] {
        let start = index * self.packet_capacity;
        let actual = self.packets[index].actual as usize;
        &self.buffer[start..start + actual.min(self.packet_capacity)]
    }

    /// Mutable slot for packet `index`, `packet_capacity` bytes
    pub fn packet_slot(&mut self, index: usize) -> &mut [u8] {
        let start = index * self.packet_capacity;
        &mut self.buffer[start..start + self.packet_capacity]
    }
}

impl std::fmt::Debug for IsoTransfer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IsoTransfer")
            .field("endpoint", &self.endpoint)
            .field("packets", &self.packets.len())
            .field("packet_capacity", &self.packet_capacity)
            .finish()
    }
}

/// An isochronous transfer refused at submission, handed back so the
/// caller can return it to its pool. The completion callback never fires
/// for a rejected transfer.
#[derive(Debug)]
pub struct IsoRejected {
    pub transfer: IsoTransfer,
    pub error: Error,
}

/// Completion callback for a control transfer
pub type ControlCompletion = Box<dyn FnOnce(ControlTransfer, TransferStatus) + Send>;

/// One request on the default control pipe
pub struct ControlTransfer {
    /// Wire image of the setup packet
    pub setup: [u8; 8],
    /// OUT: payload to send. IN: buffer of wLength bytes to fill.
    pub data: Vec<u8>,
    /// Bytes moved in the data stage
    pub actual: usize,
    completion: Option<ControlCompletion>,
}

impl ControlTransfer {
    pub fn new(setup: [u8; 8], data: Vec<u8>) -> Self {
        Self {
            setup,
            data,
            actual: 0,
            completion: None,
        }
    }

    pub fn set_completion(
        &mut self,
        completion: impl FnOnce(ControlTransfer, TransferStatus) + Send + 'static,
    ) {
        self.completion = Some(Box::new(completion));
    }

    /// Backend side: hand the transfer back to its completion callback
    pub fn complete(mut self, status: TransferStatus) {
        if let Some(completion) = self.completion.take() {
            completion(self, status);
        }
    }
}

/// Bus-level notification delivered to the registered client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientEvent {
    /// A device finished enumeration; also delivered for devices already
    /// present when the client registers
    DeviceConnected { address: u8 },
    /// A device left the bus
    DeviceGone { address: u8 },
}

/// Callback invoked by the host stack for bus-level events. Runs in the
/// stack's own context and must not block.
pub type ClientCallback = Box<dyn Fn(ClientEvent) + Send + Sync>;

/// Optional string descriptors of a device
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceStrings {
    pub manufacturer: Option<String>,
    pub product: Option<String>,
    pub serial: Option<String>,
}

/// The host stack itself
pub trait UsbHostBackend: Send + Sync {
    /// Register the single client callback for bus events
    fn register_client(&self, callback: ClientCallback) -> Result<()>;

    /// Drop the client registration; no callbacks after this returns
    fn unregister_client(&self) -> Result<()>;

    /// Open a device by bus address
    fn open_device(&self, address: u8) -> Result<Arc<dyn UsbHostDevice>>;
}

/// An opened device
pub trait UsbHostDevice: Send + Sync {
    fn address(&self) -> u8;

    /// (vendor id, product id) from the device descriptor
    fn vid_pid(&self) -> (u16, u16);

    fn device_strings(&self) -> DeviceStrings;

    /// Raw bytes of the active configuration descriptor
    fn config_descriptor(&self) -> Result<Vec<u8>>;

    fn claim_interface(&self, interface: u8, alt_setting: u8) -> Result<()>;

    fn release_interface(&self, interface: u8) -> Result<()>;

    /// Submit on the default control pipe; completion fires exactly once
    fn submit_control(&self, transfer: ControlTransfer) -> Result<()>;

    /// Submit an isochronous transfer. On success the completion fires
    /// exactly once; on failure the transfer comes back in the rejection
    /// and the completion never fires.
    fn submit_iso(&self, transfer: IsoTransfer) -> std::result::Result<(), IsoRejected>;

    fn halt_endpoint(&self, endpoint: u8) -> Result<()>;

    /// Abort in-flight transfers on the endpoint. Every pending completion
    /// observes `Canceled` before this call returns.
    fn flush_endpoint(&self, endpoint: u8) -> Result<()>;

    fn clear_endpoint(&self, endpoint: u8) -> Result<()>;
}
