//! Test utilities for the class driver
//!
//! A scripted in-memory host stack. Control requests complete synchronously
//! and can be given canned IN responses; isochronous transfers park in a
//! per-endpoint pending list until the test completes them, mirroring how a
//! real stack hands transfers back from interrupt context.
//!
//! # Example
//!
//! ```
//! use uac_host::test_utils::MockBackend;
//! use uac_proto::testdata;
//!
//! let backend = MockBackend::new();
//! backend.add_device(1, 0x1234, 0x5678, testdata::headset_config());
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::backend::{
    ClientCallback, ClientEvent, ControlTransfer, DeviceStrings, IsoRejected, IsoTransfer,
    TransferStatus, UsbHostBackend, UsbHostDevice,
};
use crate::error::{Error, Result};

/// One control request as seen on the wire
#[derive(Debug, Clone)]
pub struct ControlRecord {
    pub setup: [u8; 8],
    /// Data stage payload for OUT requests, empty for IN
    pub data: Vec<u8>,
}

#[derive(Default)]
struct MockDeviceState {
    /// (interface, alternate) pairs currently claimed
    claimed: Vec<(u8, u8)>,
    control_log: Vec<ControlRecord>,
    /// Canned IN responses keyed by (bRequest, wValue, wIndex)
    responses: HashMap<(u8, u16, u16), Vec<u8>>,
    /// In-flight isochronous transfers per endpoint
    pending: HashMap<u8, Vec<IsoTransfer>>,
    halted: Vec<u8>,
    /// Every byte the host transmitted, in submission order
    transmitted: Vec<u8>,
    /// Swallow control requests instead of completing them
    drop_control: bool,
}

/// A scripted device on the mock bus
pub struct MockDevice {
    address: u8,
    vid: u16,
    pid: u16,
    config: Vec<u8>,
    state: Mutex<MockDeviceState>,
}

impl MockDevice {
    fn lock(&self) -> MutexGuard<'_, MockDeviceState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Provide the data stage for a future IN request
    pub fn set_response(&self, request: u8, value: u16, index: u16, data: Vec<u8>) {
        self.lock().responses.insert((request, value, index), data);
    }

    /// Stop answering control requests, for timeout paths
    pub fn drop_control_requests(&self, drop: bool) {
        self.lock().drop_control = drop;
    }

    pub fn control_log(&self) -> Vec<ControlRecord> {
        self.lock().control_log.clone()
    }

    pub fn clear_control_log(&self) {
        self.lock().control_log.clear();
    }

    pub fn claimed(&self) -> Vec<(u8, u8)> {
        self.lock().claimed.clone()
    }

    pub fn halted_endpoints(&self) -> Vec<u8> {
        self.lock().halted.clone()
    }

    pub fn pending_iso(&self, endpoint: u8) -> usize {
        self.lock().pending.get(&endpoint).map_or(0, Vec::len)
    }

    /// Bytes the host has transmitted so far
    pub fn transmitted(&self) -> Vec<u8> {
        self.lock().transmitted.clone()
    }

    /// Complete the oldest pending receive transfer, one payload per packet.
    /// Packets beyond `payloads.len()` report zero bytes.
    pub fn complete_rx(&self, endpoint: u8, payloads: &[&[u8]]) -> bool {
        let Some(mut xfer) = self.pop_pending(endpoint) else {
            return false;
        };
        for index in 0..xfer.packets.len() {
            let payload = payloads.get(index).copied().unwrap_or(&[]);
            let n = payload.len().min(xfer.packet_capacity);
            xfer.packet_slot(index)[..n].copy_from_slice(&payload[..n]);
            xfer.packets[index].actual = n as u32;
            xfer.packets[index].status = TransferStatus::Completed;
        }
        // Completion runs without the state lock, as a real stack would
        xfer.complete(TransferStatus::Completed);
        true
    }

    /// Complete the oldest pending transmit transfer, recording its bytes
    pub fn complete_tx(&self, endpoint: u8) -> bool {
        let Some(mut xfer) = self.pop_pending(endpoint) else {
            return false;
        };
        let mut sent = Vec::new();
        for index in 0..xfer.packets.len() {
            let length = xfer.packets[index].length as usize;
            let start = index * xfer.packet_capacity;
            sent.extend_from_slice(&xfer.buffer[start..start + length]);
            xfer.packets[index].actual = xfer.packets[index].length;
            xfer.packets[index].status = TransferStatus::Completed;
        }
        self.lock().transmitted.extend_from_slice(&sent);
        xfer.complete(TransferStatus::Completed);
        true
    }

    /// Fail the oldest pending transfer with the given status
    pub fn fail_iso(&self, endpoint: u8, status: TransferStatus) -> bool {
        let Some(xfer) = self.pop_pending(endpoint) else {
            return false;
        };
        xfer.complete(status);
        true
    }

    fn pop_pending(&self, endpoint: u8) -> Option<IsoTransfer> {
        let mut state = self.lock();
        let pending = state.pending.get_mut(&endpoint)?;
        if pending.is_empty() {
            None
        } else {
            Some(pending.remove(0))
        }
    }
}

impl UsbHostDevice for MockDevice {
    fn address(&self) -> u8 {
        self.address
    }

    fn vid_pid(&self) -> (u16, u16) {
        (self.vid, self.pid)
    }

    fn device_strings(&self) -> DeviceStrings {
        DeviceStrings {
            manufacturer: Some("Mock Audio".to_string()),
            product: Some("Mock Headset".to_string()),
            serial: None,
        }
    }

    fn config_descriptor(&self) -> Result<Vec<u8>> {
        Ok(self.config.clone())
    }

    fn claim_interface(&self, interface: u8, alt_setting: u8) -> Result<()> {
        self.lock().claimed.push((interface, alt_setting));
        Ok(())
    }

    fn release_interface(&self, interface: u8) -> Result<()> {
        self.lock().claimed.retain(|(i, _)| *i != interface);
        Ok(())
    }

    fn submit_control(&self, transfer: ControlTransfer) -> Result<()> {
        let (is_in, response) = {
            let mut state = self.lock();
            if state.drop_control {
                // Dropping the transfer drops its completion sender; the
                // driver's bounded wait surfaces the timeout
                return Ok(());
            }
            let setup = transfer.setup;
            let request = setup[1];
            let value = u16::from_le_bytes([setup[2], setup[3]]);
            let index = u16::from_le_bytes([setup[4], setup[5]]);
            let is_in = setup[0] & 0x80 != 0;
            state.control_log.push(ControlRecord {
                setup,
                data: if is_in {
                    Vec::new()
                } else {
                    transfer.data.clone()
                },
            });
            let response = state.responses.get(&(request, value, index)).cloned();
            (is_in, response)
        };
        let mut transfer = transfer;
        if is_in {
            if let Some(response) = response {
                let n = response.len().min(transfer.data.len());
                transfer.data[..n].copy_from_slice(&response[..n]);
                transfer.actual = n;
            } else {
                transfer.actual = transfer.data.len();
            }
        } else {
            transfer.actual = transfer.data.len();
        }
        transfer.complete(TransferStatus::Completed);
        Ok(())
    }

    fn submit_iso(&self, transfer: IsoTransfer) -> std::result::Result<(), IsoRejected> {
        let mut state = self.lock();
        if state.halted.contains(&transfer.endpoint) {
            return Err(IsoRejected {
                transfer,
                error: Error::Host("endpoint halted".into()),
            });
        }
        state
            .pending
            .entry(transfer.endpoint)
            .or_default()
            .push(transfer);
        Ok(())
    }

    fn halt_endpoint(&self, endpoint: u8) -> Result<()> {
        let mut state = self.lock();
        if !state.halted.contains(&endpoint) {
            state.halted.push(endpoint);
        }
        Ok(())
    }

    fn flush_endpoint(&self, endpoint: u8) -> Result<()> {
        let pending = {
            let mut state = self.lock();
            state.pending.remove(&endpoint).unwrap_or_default()
        };
        for xfer in pending {
            xfer.complete(TransferStatus::Canceled);
        }
        Ok(())
    }

    fn clear_endpoint(&self, endpoint: u8) -> Result<()> {
        self.lock().halted.retain(|ep| *ep != endpoint);
        Ok(())
    }
}

#[derive(Default)]
struct MockBusState {
    devices: HashMap<u8, Arc<MockDevice>>,
    callback: Option<Arc<ClientCallback>>,
}

/// The scripted host stack
#[derive(Default)]
pub struct MockBackend {
    state: Mutex<MockBusState>,
}

impl MockBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Put a device on the bus without announcing it
    pub fn add_device(
        &self,
        address: u8,
        vid: u16,
        pid: u16,
        config: Vec<u8>,
    ) -> Arc<MockDevice> {
        let device = Arc::new(MockDevice {
            address,
            vid,
            pid,
            config,
            state: Mutex::new(MockDeviceState::default()),
        });
        self.lock().devices.insert(address, Arc::clone(&device));
        device
    }

    /// Announce a device to the registered client
    pub fn connect(&self, address: u8) {
        let callback = self.lock().callback.clone();
        if let Some(callback) = callback {
            callback(ClientEvent::DeviceConnected { address });
        }
    }

    /// Remove a device and announce its departure
    pub fn disconnect(&self, address: u8) {
        let callback = {
            let mut state = self.lock();
            state.devices.remove(&address);
            state.callback.clone()
        };
        if let Some(callback) = callback {
            callback(ClientEvent::DeviceGone { address });
        }
    }

    pub fn has_client(&self) -> bool {
        self.lock().callback.is_some()
    }

    fn lock(&self) -> MutexGuard<'_, MockBusState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl UsbHostBackend for MockBackend {
    fn register_client(&self, callback: ClientCallback) -> Result<()> {
        let (callback, existing) = {
            let mut state = self.lock();
            if state.callback.is_some() {
                return Err(Error::InvalidState("client already registered"));
            }
            let callback = Arc::new(callback);
            state.callback = Some(Arc::clone(&callback));
            let existing: Vec<u8> = state.devices.keys().copied().collect();
            (callback, existing)
        };
        // Devices already on the bus are announced at registration
        for address in existing {
            callback(ClientEvent::DeviceConnected { address });
        }
        Ok(())
    }

    fn unregister_client(&self) -> Result<()> {
        self.lock().callback = None;
        Ok(())
    }

    fn open_device(&self, address: u8) -> Result<Arc<dyn UsbHostDevice>> {
        self.lock()
            .devices
            .get(&address)
            .cloned()
            .map(|device| device as Arc<dyn UsbHostDevice>)
            .ok_or(Error::NotFound("no device at address"))
    }
}
