//! Logical audio stream: state machine and isochronous pipeline
//!
//! A stream is one audio-streaming interface of one device. Slow
//! transitions (start, suspend, resume, stop) serialize on a bounded-wait
//! operation lock; the transfer-completion fast path only ever takes the
//! short pipe mutex, so callbacks never wait behind a control request.
//!
//! Transfers live in exactly one of two places: the backend (in flight) or
//! the stream's free list. Completion callbacks decide whether a returned
//! transfer goes back on the wire or into the free list.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uac_proto::{AltSetting, FeatureUnitInfo, StreamDirection, StreamInterfaceInfo};

use crate::backend::{IsoTransfer, TransferStatus};
use crate::device::{UacDevice, VolumeRange};
use crate::error::{Error, Result};
use crate::events::{StreamCallback, StreamEvent};
use crate::ring::ByteRing;
use crate::sync::TimedMutex;

/// Bound on acquiring a stream's operation lock
pub(crate) const LOCK_TIMEOUT: Duration = Duration::from_millis(1000);

/// Deadline handed to the backend for each isochronous transfer
const ISO_TIMEOUT_MS: u32 = 1000;

/// Lifecycle of an open stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StreamState {
    /// Opened, no alternate setting claimed
    Idle,
    /// Alternate setting claimed, pipeline quiescent
    Ready,
    /// Transfers flowing
    Active,
    /// Transitioning out of `Active`; completions park instead of resubmit
    Suspending,
}

/// Behavior switches for `start`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamFlags {
    /// Leave the stream in `Ready` instead of going straight to `Active`
    pub suspend_after_start: bool,
}

/// Format and pipeline geometry for `start`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamConfig {
    pub sample_rate: u32,
    pub channels: u8,
    pub bit_resolution: u8,
    /// Number of isochronous transfers kept in rotation
    pub transfer_count: usize,
    /// Service intervals covered by each transfer
    pub packets_per_transfer: usize,
    pub flags: StreamFlags,
}

struct Pipe {
    state: StreamState,
    /// Index into `alt_settings`; wire alternate is `cur_alt + 1`
    cur_alt: usize,
    cur_rate: u32,
    packet_size: usize,
    free: Vec<IsoTransfer>,
    in_flight: usize,
}

#[derive(Default)]
struct VolumeCache {
    range: Option<VolumeRange>,
    percent: Option<u8>,
}

pub(crate) struct Stream {
    address: u8,
    interface: u8,
    direction: StreamDirection,
    alt_settings: Vec<AltSetting>,
    feature_unit: Option<FeatureUnitInfo>,
    device: Arc<UacDevice>,
    callback: Option<StreamCallback>,
    op_lock: TimedMutex<()>,
    pipe: Mutex<Pipe>,
    ring: ByteRing,
    ring_threshold: usize,
    volume: Mutex<VolumeCache>,
    /// Set on disconnect when a callback exists: the application owns the
    /// final close
    wait_user_delete: AtomicBool,
}

impl Stream {
    pub(crate) fn open(
        device: Arc<UacDevice>,
        info: StreamInterfaceInfo,
        ring_capacity: usize,
        ring_threshold: usize,
        callback: Option<StreamCallback>,
    ) -> Result<Arc<Self>> {
        if ring_capacity == 0 || ring_threshold >= ring_capacity {
            return Err(Error::InvalidArg("ring threshold must be below capacity"));
        }
        let feature_unit = info
            .alt_settings
            .first()
            .and_then(|alt| device.ac().feature_unit_for(alt.terminal_link, info.direction));
        debug!(
            address = device.address(),
            interface = info.interface,
            direction = ?info.direction,
            feature_unit = ?feature_unit.map(|fu| fu.unit_id),
            "stream opened"
        );
        Ok(Arc::new(Self {
            address: device.address(),
            interface: info.interface,
            direction: info.direction,
            alt_settings: info.alt_settings,
            feature_unit,
            device,
            callback,
            op_lock: TimedMutex::new(()),
            pipe: Mutex::new(Pipe {
                state: StreamState::Idle,
                cur_alt: 0,
                cur_rate: 0,
                packet_size: 0,
                free: Vec::new(),
                in_flight: 0,
            }),
            ring: ByteRing::new(ring_capacity),
            ring_threshold,
            volume: Mutex::new(VolumeCache::default()),
            wait_user_delete: AtomicBool::new(false),
        }))
    }

    pub(crate) fn address(&self) -> u8 {
        self.address
    }

    pub(crate) fn interface(&self) -> u8 {
        self.interface
    }

    pub(crate) fn direction(&self) -> StreamDirection {
        self.direction
    }

    pub(crate) fn device(&self) -> &Arc<UacDevice> {
        &self.device
    }

    pub(crate) fn alt_settings(&self) -> &[AltSetting] {
        &self.alt_settings
    }

    pub(crate) fn state(&self) -> StreamState {
        self.lock_pipe().state
    }

    pub(crate) fn has_callback(&self) -> bool {
        self.callback.is_some()
    }

    pub(crate) fn awaiting_user_close(&self) -> bool {
        self.wait_user_delete.load(Ordering::SeqCst)
    }

    fn lock_pipe(&self) -> MutexGuard<'_, Pipe> {
        // The pipe mutex is only held for pointer-sized bookkeeping; a
        // poisoned lock means a panic already tore the process state apart
        match self.pipe.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn notify(&self, event: StreamEvent) {
        if let Some(callback) = &self.callback {
            callback(event);
        }
    }

    fn find_alt(&self, config: &StreamConfig) -> Result<usize> {
        self.alt_settings
            .iter()
            .position(|alt| {
                alt.channels == config.channels
                    && alt.bit_resolution == config.bit_resolution
                    && alt.sample_rates.supports(config.sample_rate)
            })
            .ok_or(Error::NotFound("no matching alternate setting"))
    }

    /// Claim the matching alternate setting and build the pipeline.
    /// Idempotent: a stream already in `Ready` or `Active` returns Ok.
    pub(crate) fn start(self: &Arc<Self>, config: &StreamConfig) -> Result<()> {
        let _op = self.op_lock.lock_timeout(LOCK_TIMEOUT)?;
        match self.lock_pipe().state {
            StreamState::Idle => {}
            StreamState::Ready | StreamState::Active => {
                debug!(interface = self.interface, "start on started stream");
                return Ok(());
            }
            StreamState::Suspending => {
                return Err(Error::InvalidState("stream is suspending"));
            }
        }
        if config.transfer_count == 0 || config.packets_per_transfer == 0 {
            return Err(Error::InvalidArg("transfer geometry must be nonzero"));
        }
        let alt_idx = self.find_alt(config)?;
        let alt = &self.alt_settings[alt_idx];
        let packet_size = alt.packet_size(config.sample_rate) as usize;
        if packet_size > usize::from(alt.endpoint_mps) {
            return Err(Error::NotSupported("packet size exceeds endpoint size"));
        }

        // Alternate setting 0 is zero bandwidth, data settings start at 1
        self.device
            .usb_handle()
            .claim_interface(self.interface, (alt_idx + 1) as u8)?;

        // Receive transfers request a full endpoint packet per interval;
        // transmit transfers only ever carry packet_size bytes
        let slot_capacity = match self.direction {
            StreamDirection::Rx => usize::from(alt.endpoint_mps),
            StreamDirection::Tx => packet_size,
        };
        let free = (0..config.transfer_count)
            .map(|_| {
                IsoTransfer::new(
                    alt.endpoint_address,
                    config.packets_per_transfer,
                    slot_capacity,
                    ISO_TIMEOUT_MS,
                )
            })
            .collect();

        {
            let mut pipe = self.lock_pipe();
            pipe.cur_alt = alt_idx;
            pipe.cur_rate = config.sample_rate;
            pipe.packet_size = packet_size;
            pipe.free = free;
            pipe.in_flight = 0;
            pipe.state = StreamState::Ready;
        }
        info!(
            address = self.address,
            interface = self.interface,
            alt = alt_idx + 1,
            rate = config.sample_rate,
            packet_size,
            "stream started"
        );

        if config.flags.suspend_after_start {
            return Ok(());
        }
        if let Err(e) = self.resume_locked() {
            self.unwind_failed_start(alt_idx);
            return Err(e);
        }
        Ok(())
    }

    /// A start whose implicit resume failed must leave the stream as if it
    /// had never started: interface released, pipeline dropped, `Idle`
    fn unwind_failed_start(&self, alt_idx: usize) {
        let endpoint = self.alt_settings[alt_idx].endpoint_address;
        let handle = self.device.usb_handle();
        if self.lock_pipe().in_flight > 0 {
            let _ = handle.halt_endpoint(endpoint);
            let _ = handle.flush_endpoint(endpoint);
            let _ = handle.clear_endpoint(endpoint);
        }
        let _ = handle.release_interface(self.interface);
        let mut pipe = self.lock_pipe();
        pipe.free.clear();
        pipe.in_flight = 0;
        pipe.state = StreamState::Idle;
        warn!(
            address = self.address,
            interface = self.interface,
            "start failed, stream rolled back to idle"
        );
    }

    /// Resume a `Ready` stream; no-op on `Active`
    pub(crate) fn resume(self: &Arc<Self>) -> Result<()> {
        let _op = self.op_lock.lock_timeout(LOCK_TIMEOUT)?;
        self.resume_locked()
    }

    fn resume_locked(self: &Arc<Self>) -> Result<()> {
        let (cur_alt, cur_rate) = {
            let pipe = self.lock_pipe();
            match pipe.state {
                StreamState::Ready => {}
                StreamState::Active => return Ok(()),
                _ => return Err(Error::InvalidState("stream not started")),
            }
            (pipe.cur_alt, pipe.cur_rate)
        };
        let alt = self.alt_settings[cur_alt].clone();

        self.device
            .set_interface(self.interface, (cur_alt + 1) as u8)?;
        if alt.freq_ctrl_supported {
            self.device
                .set_sample_rate(alt.endpoint_address, cur_rate)?;
        }

        match self.direction {
            StreamDirection::Rx => {
                // Completions resubmit only while Active, so flip state
                // before the first submission
                self.lock_pipe().state = StreamState::Active;
                self.submit_all_rx(usize::from(alt.endpoint_mps))?;
            }
            StreamDirection::Tx => {
                // Arm silence; the first write puts data on the wire
                let mut pipe = self.lock_pipe();
                let packet_size = pipe.packet_size;
                for xfer in &mut pipe.free {
                    xfer.buffer.fill(0);
                    xfer.set_packet_length(packet_size as u32);
                }
                pipe.state = StreamState::Active;
            }
        }
        info!(
            address = self.address,
            interface = self.interface,
            "stream resumed"
        );
        Ok(())
    }

    fn submit_all_rx(self: &Arc<Self>, mps: usize) -> Result<()> {
        loop {
            let mut xfer = {
                let mut pipe = self.lock_pipe();
                if pipe.state != StreamState::Active {
                    return Ok(());
                }
                match pipe.free.pop() {
                    Some(xfer) => {
                        pipe.in_flight += 1;
                        xfer
                    }
                    None => return Ok(()),
                }
            };
            xfer.set_packet_length(mps as u32);
            let stream = Arc::clone(self);
            xfer.set_completion(move |returned, status| stream.on_rx_complete(returned, status));
            if let Err(rejected) = self.device.usb_handle().submit_iso(xfer) {
                let mut xfer = rejected.transfer;
                xfer.clear_completion();
                let mut pipe = self.lock_pipe();
                pipe.in_flight -= 1;
                pipe.free.push(xfer);
                pipe.state = StreamState::Ready;
                return Err(rejected.error);
            }
        }
    }

    /// Quiesce an `Active` stream; no-op on `Ready`.
    ///
    /// `Suspending` is published first so that completions arriving while
    /// the endpoint is being torn down park their transfers.
    pub(crate) fn suspend(self: &Arc<Self>) -> Result<()> {
        let _op = self.op_lock.lock_timeout(LOCK_TIMEOUT)?;
        self.suspend_locked()
    }

    fn suspend_locked(self: &Arc<Self>) -> Result<()> {
        let cur_alt = {
            let mut pipe = self.lock_pipe();
            match pipe.state {
                StreamState::Active => {
                    pipe.state = StreamState::Suspending;
                }
                StreamState::Ready => return Ok(()),
                _ => return Err(Error::InvalidState("stream not active")),
            }
            pipe.cur_alt
        };
        let endpoint = self.alt_settings[cur_alt].endpoint_address;

        // Devices may reject SET_INTERFACE(0) while the pipe is mid-frame;
        // teardown continues regardless
        if let Err(e) = self.device.set_interface(self.interface, 0) {
            warn!(
                interface = self.interface,
                error = %e,
                "failed to select zero-bandwidth alternate"
            );
        }
        let handle = self.device.usb_handle();
        handle.halt_endpoint(endpoint)?;
        // Flush completes every in-flight transfer as Canceled, which
        // parks them in the free list before this call returns
        handle.flush_endpoint(endpoint)?;
        handle.clear_endpoint(endpoint)?;
        self.ring.flush();

        let mut pipe = self.lock_pipe();
        if pipe.in_flight != 0 {
            warn!(
                in_flight = pipe.in_flight,
                "transfers unaccounted for after endpoint flush"
            );
        }
        pipe.state = StreamState::Ready;
        info!(
            address = self.address,
            interface = self.interface,
            "stream suspended"
        );
        Ok(())
    }

    /// Release the claimed alternate setting and drop the pipeline.
    /// Suspends first when the stream is still `Active`.
    pub(crate) fn stop(self: &Arc<Self>) -> Result<()> {
        let _op = self.op_lock.lock_timeout(LOCK_TIMEOUT)?;
        self.stop_locked()
    }

    fn stop_locked(self: &Arc<Self>) -> Result<()> {
        // Bind the state first: a match on `lock_pipe().state` would hold
        // the guard across the arms and deadlock against suspend_locked
        let state = self.lock_pipe().state;
        match state {
            StreamState::Active => self.suspend_locked()?,
            StreamState::Ready => {}
            StreamState::Idle => return Ok(()),
            StreamState::Suspending => {
                return Err(Error::InvalidState("stream is suspending"));
            }
        }
        self.device.usb_handle().release_interface(self.interface)?;
        let mut pipe = self.lock_pipe();
        pipe.free.clear();
        pipe.state = StreamState::Idle;
        info!(
            address = self.address,
            interface = self.interface,
            "stream stopped"
        );
        Ok(())
    }

    /// Driver-side close: stop if needed and wake any blocked reader or
    /// writer for good
    pub(crate) fn close_internal(self: &Arc<Self>) -> Result<()> {
        {
            let _op = self.op_lock.lock_timeout(LOCK_TIMEOUT)?;
            self.stop_locked()?;
        }
        self.ring.shutdown();
        Ok(())
    }

    /// Forced teardown on device disconnect. Control requests are skipped
    /// (the device is gone); transfers are reclaimed, waiters woken, and
    /// the stream callback told to close the handle.
    pub(crate) fn force_disconnect(self: &Arc<Self>) {
        // Best effort on the lock; a wedged holder must not stall teardown
        let _op = self.op_lock.lock_timeout(LOCK_TIMEOUT).ok();
        let cur_alt = {
            let mut pipe = self.lock_pipe();
            let was_started = pipe.state != StreamState::Idle;
            pipe.state = StreamState::Suspending;
            was_started.then_some(pipe.cur_alt)
        };
        if let Some(cur_alt) = cur_alt {
            let endpoint = self.alt_settings[cur_alt].endpoint_address;
            let handle = self.device.usb_handle();
            let _ = handle.halt_endpoint(endpoint);
            let _ = handle.flush_endpoint(endpoint);
            let _ = handle.clear_endpoint(endpoint);
            let _ = handle.release_interface(self.interface);
        }
        {
            let mut pipe = self.lock_pipe();
            pipe.free.clear();
            pipe.state = StreamState::Idle;
        }
        self.ring.shutdown();
        if self.has_callback() {
            self.wait_user_delete.store(true, Ordering::SeqCst);
        }
        warn!(
            address = self.address,
            interface = self.interface,
            "stream force-disconnected"
        );
        self.notify(StreamEvent::Disconnected);
    }

    /// Blocking read of received audio. Returns 0 on timeout and after a
    /// close from another thread shut the ring down.
    pub(crate) fn read(&self, buf: &mut [u8], timeout: Duration) -> Result<usize> {
        if self.direction != StreamDirection::Rx {
            return Err(Error::NotSupported("read on a transmit stream"));
        }
        if self.lock_pipe().state != StreamState::Active {
            return Err(Error::InvalidState("stream not active"));
        }
        self.ring.pop_timeout(buf, timeout)
    }

    /// Blocking write of audio to transmit. Bytes are pushed into the ring
    /// first, then every idle transfer is refilled and submitted.
    ///
    /// A suspend racing this call degrades it to `Error::InvalidState`;
    /// bytes already pushed are not recalled (the suspend-side ring flush
    /// discards them).
    pub(crate) fn write(self: &Arc<Self>, data: &[u8], timeout: Duration) -> Result<()> {
        if self.direction != StreamDirection::Tx {
            return Err(Error::NotSupported("write on a receive stream"));
        }
        if self.lock_pipe().state != StreamState::Active {
            return Err(Error::InvalidState("stream not active"));
        }
        self.ring.push_timeout(data, timeout)?;

        loop {
            let mut xfer = {
                let mut pipe = self.lock_pipe();
                if pipe.state != StreamState::Active {
                    return Err(Error::InvalidState("stream suspended during write"));
                }
                if self.ring.is_empty() {
                    return Ok(());
                }
                match pipe.free.pop() {
                    Some(xfer) => {
                        pipe.in_flight += 1;
                        xfer
                    }
                    None => return Ok(()),
                }
            };
            let filled = self.fill_tx(&mut xfer);
            if filled == 0 {
                self.park(xfer);
                return Ok(());
            }
            let stream = Arc::clone(self);
            xfer.set_completion(move |returned, status| stream.on_tx_complete(returned, status));
            if let Err(rejected) = self.device.usb_handle().submit_iso(xfer) {
                let mut xfer = rejected.transfer;
                xfer.clear_completion();
                self.park(xfer);
                return Err(rejected.error);
            }
        }
    }

    /// Return a completed transfer to the free list
    fn park(&self, xfer: IsoTransfer) {
        let mut pipe = self.lock_pipe();
        pipe.in_flight = pipe.in_flight.saturating_sub(1);
        pipe.free.push(xfer);
    }

    /// Pull up to a transfer's worth of bytes from the ring; short packets
    /// are padded with silence. Returns the byte count taken from the ring.
    fn fill_tx(&self, xfer: &mut IsoTransfer) -> usize {
        let packet_size = self.lock_pipe().packet_size;
        let mut total = 0;
        for index in 0..xfer.packets.len() {
            let slot = xfer.packet_slot(index);
            let n = self.ring.try_pop(&mut slot[..packet_size]);
            slot[n..packet_size].fill(0);
            total += n;
        }
        xfer.set_packet_length(packet_size as u32);
        total
    }

    fn on_rx_complete(self: Arc<Self>, mut xfer: IsoTransfer, status: TransferStatus) {
        match status {
            TransferStatus::Canceled | TransferStatus::NoDevice => {
                self.park(xfer);
            }
            TransferStatus::Completed => {
                for index in 0..xfer.packets.len() {
                    let packet = xfer.packets[index];
                    if packet.status == TransferStatus::Completed && packet.actual > 0 {
                        // try_push accounts for the drop when the ring is full
                        let _ = self.ring.try_push(xfer.packet_data(index));
                    }
                }
                if self.ring.len() >= self.ring_threshold {
                    self.notify(StreamEvent::RxDone);
                }
                let resubmit = self.lock_pipe().state == StreamState::Active;
                if resubmit {
                    let stream = Arc::clone(&self);
                    xfer.set_completion(move |returned, status| {
                        stream.on_rx_complete(returned, status)
                    });
                    if let Err(rejected) = self.device.usb_handle().submit_iso(xfer) {
                        warn!(error = %rejected.error, "receive resubmission failed");
                        let mut xfer = rejected.transfer;
                        xfer.clear_completion();
                        self.park(xfer);
                        self.notify(StreamEvent::TransferError);
                    }
                } else {
                    self.park(xfer);
                }
            }
            _ => {
                warn!(?status, "receive transfer failed");
                self.park(xfer);
                self.notify(StreamEvent::TransferError);
            }
        }
    }

    fn on_tx_complete(self: Arc<Self>, mut xfer: IsoTransfer, status: TransferStatus) {
        match status {
            TransferStatus::Canceled | TransferStatus::NoDevice => {
                self.park(xfer);
            }
            TransferStatus::Completed => {
                let active = self.lock_pipe().state == StreamState::Active;
                let refilled = if active { self.fill_tx(&mut xfer) } else { 0 };
                if active && refilled > 0 {
                    let stream = Arc::clone(&self);
                    xfer.set_completion(move |returned, status| {
                        stream.on_tx_complete(returned, status)
                    });
                    if let Err(rejected) = self.device.usb_handle().submit_iso(xfer) {
                        warn!(error = %rejected.error, "transmit resubmission failed");
                        let mut xfer = rejected.transfer;
                        xfer.clear_completion();
                        self.park(xfer);
                        self.notify(StreamEvent::TransferError);
                    }
                } else {
                    self.park(xfer);
                    self.notify(StreamEvent::TxDone);
                }
            }
            _ => {
                warn!(?status, "transmit transfer failed");
                self.park(xfer);
                self.notify(StreamEvent::TransferError);
            }
        }
    }

    fn require_started(&self) -> Result<()> {
        match self.lock_pipe().state {
            StreamState::Ready | StreamState::Active => Ok(()),
            _ => Err(Error::InvalidState("stream not started")),
        }
    }

    fn require_feature_unit(&self) -> Result<FeatureUnitInfo> {
        self.feature_unit
            .ok_or(Error::NotSupported("no feature unit on this stream"))
    }

    pub(crate) fn set_mute(&self, mute: bool) -> Result<()> {
        self.require_started()?;
        let fu = self.require_feature_unit()?;
        self.device.set_mute(&fu, mute)
    }

    pub(crate) fn is_muted(&self) -> Result<bool> {
        self.require_started()?;
        let fu = self.require_feature_unit()?;
        self.device.is_muted(&fu)
    }

    fn volume_range(&self, fu: &FeatureUnitInfo) -> Result<VolumeRange> {
        let mut cache = match self.volume.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(range) = cache.range {
            return Ok(range);
        }
        let range = self.device.volume_range(fu)?;
        debug!(?range, "volume range fetched");
        cache.range = Some(range);
        Ok(range)
    }

    /// Set volume as a percentage of the device range, quantized to the
    /// device resolution. The percentage is remembered so `volume_percent`
    /// echoes it back exactly.
    pub(crate) fn set_volume_percent(&self, percent: u8) -> Result<()> {
        if percent > 100 {
            return Err(Error::InvalidArg("volume percent above 100"));
        }
        self.require_started()?;
        let fu = self.require_feature_unit()?;
        let range = self.volume_range(&fu)?;
        self.device.set_volume_raw(&fu, range.raw_for_percent(percent))?;
        if let Ok(mut cache) = self.volume.lock() {
            cache.percent = Some(percent);
        }
        Ok(())
    }

    pub(crate) fn volume_percent(&self) -> Result<u8> {
        self.require_started()?;
        let fu = self.require_feature_unit()?;
        if let Ok(cache) = self.volume.lock()
            && let Some(percent) = cache.percent
        {
            return Ok(percent);
        }
        let range = self.volume_range(&fu)?;
        let raw = self.device.volume_raw(&fu)?;
        Ok(range.percent_for_raw(raw))
    }

    /// Set volume in raw 1/256 dB units; invalidates the percent cache
    pub(crate) fn set_volume_db(&self, raw: i16) -> Result<()> {
        self.require_started()?;
        let fu = self.require_feature_unit()?;
        self.device.set_volume_raw(&fu, raw)?;
        if let Ok(mut cache) = self.volume.lock() {
            cache.percent = None;
        }
        Ok(())
    }

    pub(crate) fn volume_db(&self) -> Result<i16> {
        self.require_started()?;
        let fu = self.require_feature_unit()?;
        self.device.volume_raw(&fu)
    }
}

impl std::fmt::Debug for Stream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stream")
            .field("address", &self.address)
            .field("interface", &self.interface)
            .field("direction", &self.direction)
            .field("state", &self.state())
            .finish()
    }
}
