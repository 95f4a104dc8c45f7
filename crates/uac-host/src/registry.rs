//! Device and stream registry
//!
//! One table for opened physical devices (keyed by bus address, with an
//! explicit open count) and one for connected-but-unopened devices so that
//! open-by-(vendor, product) can resolve an address. All access goes
//! through the driver-wide mutex in `host.rs`; nothing here blocks.
//!
//! Stream handles arriving from the application are validated by pointer
//! identity before the driver trusts them.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::device::UacDevice;
use crate::stream::Stream;

pub(crate) struct DeviceEntry {
    pub device: Arc<UacDevice>,
    /// Streams open on this device; the device closes when it reaches zero
    pub opened: usize,
    pub streams: Vec<Arc<Stream>>,
}

#[derive(Default)]
pub(crate) struct Registry {
    devices: HashMap<u8, DeviceEntry>,
    /// Connected devices not yet opened: address -> (vid, pid)
    known: HashMap<u8, (u16, u16)>,
}

impl Registry {
    pub(crate) fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub(crate) fn note_connected(&mut self, address: u8, vid: u16, pid: u16) {
        self.known.insert(address, (vid, pid));
    }

    pub(crate) fn note_gone(&mut self, address: u8) {
        self.known.remove(&address);
    }

    /// Resolve an address from vendor/product among connected devices,
    /// preferring ones already opened
    pub(crate) fn address_for_vid_pid(&self, vid: u16, pid: u16) -> Option<u8> {
        self.devices
            .iter()
            .find(|(_, entry)| entry.device.vid_pid() == (vid, pid))
            .map(|(address, _)| *address)
            .or_else(|| {
                self.known
                    .iter()
                    .find(|(_, known)| **known == (vid, pid))
                    .map(|(address, _)| *address)
            })
    }

    pub(crate) fn device(&self, address: u8) -> Option<&Arc<UacDevice>> {
        self.devices.get(&address).map(|entry| &entry.device)
    }

    pub(crate) fn insert_device(&mut self, device: Arc<UacDevice>) {
        let address = device.address();
        debug!(address, "device added to registry");
        self.devices.insert(
            address,
            DeviceEntry {
                device,
                opened: 0,
                streams: Vec::new(),
            },
        );
    }

    /// Existing stream for (address, interface), for idempotent open
    pub(crate) fn stream_at(&self, address: u8, interface: u8) -> Option<Arc<Stream>> {
        self.devices.get(&address).and_then(|entry| {
            entry
                .streams
                .iter()
                .find(|s| s.interface() == interface)
                .cloned()
        })
    }

    /// Record a newly opened stream and bump the device open count
    pub(crate) fn insert_stream(&mut self, stream: Arc<Stream>) {
        if let Some(entry) = self.devices.get_mut(&stream.address()) {
            entry.opened += 1;
            entry.streams.push(stream);
        }
    }

    /// A handle is only trusted if this exact allocation is registered
    pub(crate) fn contains(&self, stream: &Arc<Stream>) -> bool {
        self.devices.get(&stream.address()).is_some_and(|entry| {
            entry.streams.iter().any(|s| Arc::ptr_eq(s, stream))
        })
    }

    /// Remove a stream; returns the device entry's remaining open count,
    /// and the device itself once nothing is open on it
    pub(crate) fn remove_stream(&mut self, stream: &Arc<Stream>) -> Option<Arc<UacDevice>> {
        let address = stream.address();
        let entry = self.devices.get_mut(&address)?;
        let before = entry.streams.len();
        entry.streams.retain(|s| !Arc::ptr_eq(s, stream));
        if entry.streams.len() == before {
            return None;
        }
        entry.opened -= 1;
        if entry.opened == 0 {
            debug!(address, "last stream closed, dropping device");
            return self.devices.remove(&address).map(|entry| entry.device);
        }
        None
    }

    /// All streams of one device, for disconnect teardown
    pub(crate) fn streams_of(&self, address: u8) -> Vec<Arc<Stream>> {
        self.devices
            .get(&address)
            .map(|entry| entry.streams.clone())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_device_lookup() {
        let mut registry = Registry::default();
        registry.note_connected(3, 0x1234, 0x5678);
        assert_eq!(registry.address_for_vid_pid(0x1234, 0x5678), Some(3));
        assert_eq!(registry.address_for_vid_pid(0x1234, 0x0000), None);
        registry.note_gone(3);
        assert_eq!(registry.address_for_vid_pid(0x1234, 0x5678), None);
    }
}
