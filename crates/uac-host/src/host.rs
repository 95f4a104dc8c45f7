//! The driver context and its public surface
//!
//! `UacHost::install` registers with the host stack and optionally spawns
//! the background event pump; everything else is a method on the returned
//! context. Handles given back to the application are opaque and validated
//! by identity on every call.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::JoinHandle;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uac_proto::{
    AltSetting, StreamDirection, has_audio_interface, parse_ac_interface,
    parse_streaming_interface, streaming_interfaces,
};

use crate::backend::{ClientEvent, UsbHostBackend};
use crate::device::UacDevice;
use crate::error::{Error, Result};
use crate::events::{DriverCallback, DriverEvent, EventSender, PumpEvent, StreamCallback, event_queue};
use crate::registry::Registry;
use crate::stream::{Stream, StreamConfig, StreamState};

/// Driver installation parameters
pub struct DriverConfig {
    /// Spawn a thread that pumps events until uninstall; without it the
    /// application must call `handle_events` itself
    pub create_background_task: bool,
    /// Capacity of the bounded event queue
    pub event_queue_size: usize,
    /// Invoked when connected devices expose audio streams
    pub callback: Option<DriverCallback>,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            create_background_task: false,
            event_queue_size: 16,
            callback: None,
        }
    }
}

/// Parameters for opening one stream
pub struct StreamOpenConfig {
    /// Bus address of the device
    pub address: u8,
    /// Audio-streaming interface number
    pub interface: u8,
    /// Ring buffer capacity in bytes
    pub ring_capacity: usize,
    /// Received bytes at which `RxDone` fires; must be below capacity
    pub ring_threshold: usize,
    /// Stream event callback; when present, disconnect leaves the final
    /// close to the application
    pub callback: Option<StreamCallback>,
}

/// Opaque, clonable reference to an open stream
#[derive(Clone, Debug)]
pub struct StreamHandle(Arc<Stream>);

/// Snapshot of an open stream's device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub address: u8,
    pub vid: u16,
    pub pid: u16,
    pub interface: u8,
    pub direction: StreamDirection,
    pub alt_setting_count: usize,
    pub manufacturer: Option<String>,
    pub product: Option<String>,
    pub serial: Option<String>,
}

struct Shared {
    backend: Arc<dyn UsbHostBackend>,
    registry: Mutex<Registry>,
    events_tx: EventSender,
    events_rx: Mutex<Receiver<PumpEvent>>,
    callback: Option<DriverCallback>,
}

/// The installed class driver
pub struct UacHost {
    shared: Arc<Shared>,
    pump: Mutex<Option<JoinHandle<()>>>,
    installed: AtomicBool,
}

impl UacHost {
    /// Register with the host stack and bring the driver up.
    ///
    /// The stack starts delivering connect events immediately, including
    /// one per device already on the bus.
    pub fn install(backend: Arc<dyn UsbHostBackend>, config: DriverConfig) -> Result<Self> {
        if config.event_queue_size == 0 {
            return Err(Error::InvalidArg("event queue size must be nonzero"));
        }
        let (events_tx, events_rx) = event_queue(config.event_queue_size);
        let shared = Arc::new(Shared {
            backend: Arc::clone(&backend),
            registry: Mutex::new(Registry::default()),
            events_tx: events_tx.clone(),
            events_rx: Mutex::new(events_rx),
            callback: config.callback,
        });

        let queue = events_tx;
        backend.register_client(Box::new(move |event| {
            queue.send(PumpEvent::Bus(event));
        }))?;

        let pump = if config.create_background_task {
            let shared = Arc::clone(&shared);
            let handle = std::thread::Builder::new()
                .name("uac-events".to_string())
                .spawn(move || {
                    while pump_one(&shared, Duration::from_millis(100)).unwrap_or(false) {}
                    debug!("event pump stopped");
                })
                .map_err(|e| Error::Host(format!("failed to spawn event pump: {e}")))?;
            Some(handle)
        } else {
            None
        };

        info!(
            background_task = pump.is_some(),
            "audio class driver installed"
        );
        Ok(Self {
            shared,
            pump: Mutex::new(pump),
            installed: AtomicBool::new(true),
        })
    }

    /// Tear the driver down. Repeated calls are Ok; open streams are not:
    /// every stream must be closed first.
    pub fn uninstall(&self) -> Result<()> {
        if !self.installed.load(Ordering::SeqCst) {
            return Ok(());
        }
        if !self.lock_registry()?.is_empty() {
            return Err(Error::InvalidState("streams still open"));
        }
        self.shared.events_tx.send(PumpEvent::Shutdown);
        if let Ok(mut pump) = self.pump.lock()
            && let Some(handle) = pump.take()
            && handle.join().is_err()
        {
            warn!("event pump panicked");
        }
        self.shared.backend.unregister_client()?;
        self.installed.store(false, Ordering::SeqCst);
        info!("audio class driver uninstalled");
        Ok(())
    }

    /// Pump at most one event, waiting up to `timeout`. Returns false once
    /// the shutdown message has been consumed.
    pub fn handle_events(&self, timeout: Duration) -> Result<bool> {
        pump_one(&self.shared, timeout)
    }

    /// Open a stream on (address, interface). Opening the same pair twice
    /// returns the existing handle.
    pub fn open(&self, config: StreamOpenConfig) -> Result<StreamHandle> {
        self.ensure_installed()?;
        if let Some(existing) = self
            .lock_registry()?
            .stream_at(config.address, config.interface)
        {
            debug!(
                address = config.address,
                interface = config.interface,
                "stream already open"
            );
            return Ok(StreamHandle(existing));
        }

        // The registry lock is never held across backend calls, so the
        // device is prepared outside it and races resolve on re-lock
        let device = match self.lock_registry()?.device(config.address).cloned() {
            Some(device) => device,
            None => {
                let handle = self.shared.backend.open_device(config.address)?;
                let raw = handle.config_descriptor()?;
                let ac = parse_ac_interface(&raw)?;
                Arc::new(UacDevice::new(handle, ac, raw))
            }
        };
        let info = parse_streaming_interface(device.config(), config.interface)?;
        let stream = Stream::open(
            device.clone(),
            info,
            config.ring_capacity,
            config.ring_threshold,
            config.callback,
        )?;

        let mut registry = self.lock_registry()?;
        if let Some(existing) = registry.stream_at(config.address, config.interface) {
            return Ok(StreamHandle(existing));
        }
        if registry.device(config.address).is_none() {
            registry.insert_device(device);
        }
        registry.insert_stream(Arc::clone(&stream));
        Ok(StreamHandle(stream))
    }

    /// Open by vendor/product among connected devices
    pub fn open_by_vid_pid(
        &self,
        vid: u16,
        pid: u16,
        mut config: StreamOpenConfig,
    ) -> Result<StreamHandle> {
        let address = self
            .lock_registry()?
            .address_for_vid_pid(vid, pid)
            .ok_or(Error::NotFound("no matching device connected"))?;
        config.address = address;
        self.open(config)
    }

    /// Close a stream, stopping it first if needed. The last close on a
    /// device releases the device itself.
    pub fn close(&self, handle: &StreamHandle) -> Result<()> {
        let stream = self.validate(handle)?;
        if stream.awaiting_user_close() {
            debug!(
                address = stream.address(),
                interface = stream.interface(),
                "closing stream of disconnected device"
            );
        }
        stream.close_internal()?;
        let device = self.lock_registry()?.remove_stream(&stream);
        if let Some(device) = device {
            debug!(address = device.address(), "device closed");
        }
        Ok(())
    }

    pub fn device_info(&self, handle: &StreamHandle) -> Result<DeviceInfo> {
        let stream = self.validate(handle)?;
        let device = stream.device();
        let (vid, pid) = device.vid_pid();
        let strings = device.strings();
        Ok(DeviceInfo {
            address: stream.address(),
            vid,
            pid,
            interface: stream.interface(),
            direction: stream.direction(),
            alt_setting_count: stream.alt_settings().len(),
            manufacturer: strings.manufacturer,
            product: strings.product,
            serial: strings.serial,
        })
    }

    /// Parameters of one alternate setting, index 0 based
    pub fn alt_setting_params(&self, handle: &StreamHandle, index: usize) -> Result<AltSetting> {
        let stream = self.validate(handle)?;
        stream
            .alt_settings()
            .get(index)
            .cloned()
            .ok_or(Error::InvalidArg("alternate setting index out of range"))
    }

    pub fn state(&self, handle: &StreamHandle) -> Result<StreamState> {
        Ok(self.validate(handle)?.state())
    }

    pub fn start(&self, handle: &StreamHandle, config: &StreamConfig) -> Result<()> {
        self.validate(handle)?.start(config)
    }

    pub fn suspend(&self, handle: &StreamHandle) -> Result<()> {
        self.validate(handle)?.suspend()
    }

    pub fn resume(&self, handle: &StreamHandle) -> Result<()> {
        self.validate(handle)?.resume()
    }

    pub fn stop(&self, handle: &StreamHandle) -> Result<()> {
        self.validate(handle)?.stop()
    }

    /// Read received audio; 0 bytes means timeout or a concurrent close
    pub fn read(&self, handle: &StreamHandle, buf: &mut [u8], timeout: Duration) -> Result<usize> {
        self.validate(handle)?.read(buf, timeout)
    }

    /// Write audio to transmit. May fail with `InvalidState` after pushing
    /// part of the data when a suspend races the call; the pushed bytes are
    /// discarded by the suspend.
    pub fn write(&self, handle: &StreamHandle, data: &[u8], timeout: Duration) -> Result<()> {
        self.validate(handle)?.write(data, timeout)
    }

    pub fn set_mute(&self, handle: &StreamHandle, mute: bool) -> Result<()> {
        self.validate(handle)?.set_mute(mute)
    }

    pub fn is_muted(&self, handle: &StreamHandle) -> Result<bool> {
        self.validate(handle)?.is_muted()
    }

    /// Set volume as a percentage of the device range
    pub fn set_volume(&self, handle: &StreamHandle, percent: u8) -> Result<()> {
        self.validate(handle)?.set_volume_percent(percent)
    }

    /// Last percentage set through `set_volume`, or the device's current
    /// setting mapped onto the range if none was
    pub fn volume(&self, handle: &StreamHandle) -> Result<u8> {
        self.validate(handle)?.volume_percent()
    }

    /// Set volume in raw 1/256 dB units
    pub fn set_volume_db(&self, handle: &StreamHandle, db: i16) -> Result<()> {
        self.validate(handle)?.set_volume_db(db)
    }

    pub fn volume_db(&self, handle: &StreamHandle) -> Result<i16> {
        self.validate(handle)?.volume_db()
    }

    fn ensure_installed(&self) -> Result<()> {
        if self.installed.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(Error::InvalidState("driver not installed"))
        }
    }

    fn validate(&self, handle: &StreamHandle) -> Result<Arc<Stream>> {
        let registry = self.lock_registry()?;
        if registry.contains(&handle.0) {
            Ok(Arc::clone(&handle.0))
        } else {
            Err(Error::NotFound("unknown stream handle"))
        }
    }

    fn lock_registry(&self) -> Result<MutexGuard<'_, Registry>> {
        self.shared
            .registry
            .lock()
            .map_err(|_| Error::Host("registry lock poisoned".into()))
    }
}

/// Drain one event from the pump queue and act on it
fn pump_one(shared: &Arc<Shared>, timeout: Duration) -> Result<bool> {
    let event = {
        let rx = shared
            .events_rx
            .lock()
            .map_err(|_| Error::Host("event queue lock poisoned".into()))?;
        rx.recv_timeout(timeout)
    };
    match event {
        Ok(PumpEvent::Bus(ClientEvent::DeviceConnected { address })) => {
            on_connected(shared, address);
            Ok(true)
        }
        Ok(PumpEvent::Bus(ClientEvent::DeviceGone { address })) => {
            on_gone(shared, address);
            Ok(true)
        }
        Ok(PumpEvent::Shutdown) => Ok(false),
        Err(RecvTimeoutError::Timeout) => Ok(true),
        Err(RecvTimeoutError::Disconnected) => Ok(false),
    }
}

/// Probe a newly connected device and announce its streams
fn on_connected(shared: &Arc<Shared>, address: u8) {
    let device = match shared.backend.open_device(address) {
        Ok(device) => device,
        Err(e) => {
            warn!(address, error = %e, "cannot probe connected device");
            return;
        }
    };
    let (vid, pid) = device.vid_pid();
    let config = match device.config_descriptor() {
        Ok(config) => config,
        Err(e) => {
            warn!(address, error = %e, "cannot read configuration descriptor");
            return;
        }
    };
    if !has_audio_interface(&config) {
        debug!(address, vid, pid, "device has no audio function");
        return;
    }
    if let Ok(mut registry) = shared.registry.lock() {
        registry.note_connected(address, vid, pid);
    }
    info!(address, vid, pid, "audio device connected");
    let Some(callback) = &shared.callback else {
        return;
    };
    match streaming_interfaces(&config) {
        Ok(streams) => {
            for (interface, direction) in streams {
                let event = match direction {
                    StreamDirection::Rx => DriverEvent::RxConnected {
                        address,
                        interface,
                        vid,
                        pid,
                    },
                    StreamDirection::Tx => DriverEvent::TxConnected {
                        address,
                        interface,
                        vid,
                        pid,
                    },
                };
                callback(event);
            }
        }
        Err(e) => warn!(address, error = %e, "cannot enumerate streaming interfaces"),
    }
}

/// Tear down every stream of a departed device
fn on_gone(shared: &Arc<Shared>, address: u8) {
    let streams = match shared.registry.lock() {
        Ok(mut registry) => {
            registry.note_gone(address);
            registry.streams_of(address)
        }
        Err(_) => return,
    };
    if !streams.is_empty() {
        info!(address, streams = streams.len(), "audio device disconnected");
    }
    for stream in streams {
        stream.force_disconnect();
        // With a callback the application saw Disconnected and owns the
        // close; without one the driver reaps the stream here
        if !stream.has_callback()
            && let Ok(mut registry) = shared.registry.lock()
        {
            registry.remove_stream(&stream);
        }
    }
}
