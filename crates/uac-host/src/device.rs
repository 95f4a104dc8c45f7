//! Physical UAC device: control-request engine and audio-control topology
//!
//! One `UacDevice` exists per USB address no matter how many streams are
//! open on it. All class and standard requests funnel through the single
//! control channel, which serializes callers with a bounded wait and
//! recovers endpoint 0 when a request never completes.

use std::sync::Arc;
use std::sync::mpsc::sync_channel;
use std::time::Duration;

use tracing::{debug, warn};
use uac_proto::consts::{ep_selector, fu_selector, request};
use uac_proto::{
    AcInterfaceInfo, FeatureUnitInfo, SetupPacket, decode_sample_rate, encode_sample_rate,
};

use crate::backend::{ControlTransfer, DeviceStrings, TransferStatus, UsbHostDevice};
use crate::error::{Error, Result};
use crate::sync::TimedMutex;

/// Bound on acquiring the control channel and on request completion
pub(crate) const CTRL_TIMEOUT: Duration = Duration::from_millis(5000);

/// The one-requester-at-a-time control channel; holds the reusable data
/// stage buffer between requests
struct ControlChannel {
    scratch: Vec<u8>,
}

pub(crate) struct UacDevice {
    handle: Arc<dyn UsbHostDevice>,
    ac: AcInterfaceInfo,
    /// Raw configuration descriptor, kept so later opens on the same
    /// device parse without another round trip
    config: Vec<u8>,
    control: TimedMutex<ControlChannel>,
}

impl UacDevice {
    pub(crate) fn new(handle: Arc<dyn UsbHostDevice>, ac: AcInterfaceInfo, config: Vec<u8>) -> Self {
        Self {
            handle,
            ac,
            config,
            control: TimedMutex::new(ControlChannel {
                scratch: Vec::with_capacity(64),
            }),
        }
    }

    pub(crate) fn address(&self) -> u8 {
        self.handle.address()
    }

    pub(crate) fn vid_pid(&self) -> (u16, u16) {
        self.handle.vid_pid()
    }

    pub(crate) fn strings(&self) -> DeviceStrings {
        self.handle.device_strings()
    }

    pub(crate) fn ac(&self) -> &AcInterfaceInfo {
        &self.ac
    }

    pub(crate) fn config(&self) -> &[u8] {
        &self.config
    }

    pub(crate) fn usb_handle(&self) -> &Arc<dyn UsbHostDevice> {
        &self.handle
    }

    /// Issue one request on the default control pipe and wait for it.
    ///
    /// For IN requests the returned vector holds the data stage (up to
    /// wLength bytes); for OUT requests it is empty. If the device never
    /// answers, endpoint 0 is halted, flushed and cleared so the next
    /// request starts from a clean pipe.
    pub(crate) fn control_request(
        &self,
        setup: SetupPacket,
        payload: Option<&[u8]>,
    ) -> Result<Vec<u8>> {
        let mut channel = self.control.lock_timeout(CTRL_TIMEOUT)?;
        let mut data = std::mem::take(&mut channel.get_mut().scratch);
        data.clear();
        if setup.is_in() {
            data.resize(setup.length as usize, 0);
        } else if let Some(payload) = payload {
            if payload.len() != setup.length as usize {
                return Err(Error::InvalidArg("payload length mismatch"));
            }
            data.extend_from_slice(payload);
        }

        let (done_tx, done_rx) = sync_channel(1);
        let mut transfer = ControlTransfer::new(setup.to_bytes(), data);
        transfer.set_completion(move |returned, status| {
            let _ = done_tx.send((returned, status));
        });
        self.handle.submit_control(transfer)?;

        match done_rx.recv_timeout(CTRL_TIMEOUT) {
            Ok((returned, status)) => {
                let result = match status {
                    TransferStatus::Completed => {
                        if setup.is_in() {
                            Ok(returned.data[..returned.actual].to_vec())
                        } else {
                            Ok(Vec::new())
                        }
                    }
                    TransferStatus::Stall => Err(Error::TransferError("control stalled")),
                    TransferStatus::NoDevice => Err(Error::TransferError("device gone")),
                    _ => Err(Error::TransferError("control transfer failed")),
                };
                channel.get_mut().scratch = returned.data;
                result
            }
            Err(_) => {
                warn!(
                    request = setup.request,
                    "control request timed out, recovering endpoint 0"
                );
                let _ = self.handle.halt_endpoint(0);
                let _ = self.handle.flush_endpoint(0);
                let _ = self.handle.clear_endpoint(0);
                Err(Error::Timeout("control request"))
            }
        }
    }

    /// Standard SET_INTERFACE selecting an alternate setting
    pub(crate) fn set_interface(&self, interface: u8, alt_setting: u8) -> Result<()> {
        debug!(interface, alt_setting, "set interface");
        self.control_request(SetupPacket::set_interface(interface, alt_setting), None)?;
        Ok(())
    }

    /// SET_CUR(SAMPLING_FREQ) on an isochronous endpoint
    pub(crate) fn set_sample_rate(&self, endpoint: u8, rate: u32) -> Result<()> {
        debug!(endpoint, rate, "set endpoint sample rate");
        let setup =
            SetupPacket::class_endpoint(request::SET_CUR, ep_selector::SAMPLING_FREQ, endpoint, 3);
        self.control_request(setup, Some(&encode_sample_rate(rate)))?;
        Ok(())
    }

    /// GET_CUR(SAMPLING_FREQ) on an isochronous endpoint
    pub(crate) fn sample_rate(&self, endpoint: u8) -> Result<u32> {
        let setup =
            SetupPacket::class_endpoint(request::GET_CUR, ep_selector::SAMPLING_FREQ, endpoint, 3);
        let data = self.control_request(setup, None)?;
        if data.len() < 3 {
            return Err(Error::TransferError("short sample rate response"));
        }
        Ok(decode_sample_rate(&data))
    }

    /// SET_CUR(MUTE) on every mute-capable channel; the first failure aborts
    pub(crate) fn set_mute(&self, fu: &FeatureUnitInfo, mute: bool) -> Result<()> {
        if !fu.has_mute() {
            return Err(Error::NotSupported("no mute control"));
        }
        for channel in capable_channels(fu.mute_channels) {
            let setup = SetupPacket::class_interface(
                request::SET_CUR,
                fu_selector::MUTE,
                channel,
                fu.unit_id,
                self.ac.interface,
                1,
            );
            self.control_request(setup, Some(&[u8::from(mute)]))?;
        }
        Ok(())
    }

    /// GET_CUR(MUTE) on the first mute-capable channel
    pub(crate) fn is_muted(&self, fu: &FeatureUnitInfo) -> Result<bool> {
        let channel = capable_channels(fu.mute_channels)
            .next()
            .ok_or(Error::NotSupported("no mute control"))?;
        let setup = SetupPacket::class_interface(
            request::GET_CUR,
            fu_selector::MUTE,
            channel,
            fu.unit_id,
            self.ac.interface,
            1,
        );
        let data = self.control_request(setup, None)?;
        Ok(data.first().copied().unwrap_or(0) != 0)
    }

    /// SET_CUR(VOLUME) in raw 1/256 dB units on every volume-capable channel
    pub(crate) fn set_volume_raw(&self, fu: &FeatureUnitInfo, raw: i16) -> Result<()> {
        if !fu.has_volume() {
            return Err(Error::NotSupported("no volume control"));
        }
        for channel in capable_channels(fu.volume_channels) {
            let setup = SetupPacket::class_interface(
                request::SET_CUR,
                fu_selector::VOLUME,
                channel,
                fu.unit_id,
                self.ac.interface,
                2,
            );
            self.control_request(setup, Some(&raw.to_le_bytes()))?;
        }
        Ok(())
    }

    /// GET_CUR(VOLUME) on the first volume-capable channel
    pub(crate) fn volume_raw(&self, fu: &FeatureUnitInfo) -> Result<i16> {
        let channel = capable_channels(fu.volume_channels)
            .next()
            .ok_or(Error::NotSupported("no volume control"))?;
        self.volume_request(fu, request::GET_CUR, channel)
    }

    /// GET_MIN/GET_MAX/GET_RES for the volume control
    pub(crate) fn volume_range(&self, fu: &FeatureUnitInfo) -> Result<VolumeRange> {
        let channel = capable_channels(fu.volume_channels)
            .next()
            .ok_or(Error::NotSupported("no volume control"))?;
        Ok(VolumeRange {
            min: self.volume_request(fu, request::GET_MIN, channel)?,
            max: self.volume_request(fu, request::GET_MAX, channel)?,
            res: self.volume_request(fu, request::GET_RES, channel)?,
        })
    }

    fn volume_request(&self, fu: &FeatureUnitInfo, req: u8, channel: u8) -> Result<i16> {
        let setup = SetupPacket::class_interface(
            req,
            fu_selector::VOLUME,
            channel,
            fu.unit_id,
            self.ac.interface,
            2,
        );
        let data = self.control_request(setup, None)?;
        if data.len() < 2 {
            return Err(Error::TransferError("short volume response"));
        }
        Ok(i16::from_le_bytes([data[0], data[1]]))
    }
}

/// Volume bounds in raw 1/256 dB units, as reported by the device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct VolumeRange {
    pub min: i16,
    pub max: i16,
    pub res: i16,
}

impl VolumeRange {
    /// Map a 0..=100 percentage onto the device range, quantized to the
    /// device resolution
    pub(crate) fn raw_for_percent(&self, percent: u8) -> i16 {
        let percent = i32::from(percent.min(100));
        let min = i32::from(self.min);
        let max = i32::from(self.max);
        let res = i32::from(self.res).max(1);
        let target = min + (max - min) * percent / 100;
        let quantized = min + (target - min) / res * res;
        quantized.clamp(min, max) as i16
    }

    /// Inverse of `raw_for_percent`, for devices queried before any set
    pub(crate) fn percent_for_raw(&self, raw: i16) -> u8 {
        let span = i32::from(self.max) - i32::from(self.min);
        if span <= 0 {
            return 0;
        }
        let offset = (i32::from(raw) - i32::from(self.min)).clamp(0, span);
        (offset * 100 / span) as u8
    }
}

/// Channel indices (master first) set in a capability bitmap
fn capable_channels(map: u8) -> impl Iterator<Item = u8> {
    (0..8).filter(move |ch| map & (1 << ch) != 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capable_channels_master_first() {
        let channels: Vec<u8> = capable_channels(0b0000_0101).collect();
        assert_eq!(channels, vec![0, 2]);
        assert_eq!(capable_channels(0).count(), 0);
    }

    #[test]
    fn test_volume_percent_quantized_to_resolution() {
        // -48 dB .. 0 dB in 1 dB steps
        let range = VolumeRange {
            min: -12288,
            max: 0,
            res: 256,
        };
        assert_eq!(range.raw_for_percent(0), -12288);
        assert_eq!(range.raw_for_percent(100), 0);
        let half = range.raw_for_percent(50);
        // Exactly on a resolution step
        assert_eq!((half - range.min) % range.res, 0);
        assert_eq!(half, -6144);
    }

    #[test]
    fn test_volume_percent_round_trip() {
        let range = VolumeRange {
            min: -12288,
            max: 0,
            res: 256,
        };
        for percent in [0u8, 25, 50, 75, 100] {
            let raw = range.raw_for_percent(percent);
            let back = range.percent_for_raw(raw);
            assert!(back.abs_diff(percent) <= 1, "{percent} -> {raw} -> {back}");
        }
    }

    #[test]
    fn test_degenerate_volume_range() {
        let range = VolumeRange {
            min: 0,
            max: 0,
            res: 0,
        };
        assert_eq!(range.raw_for_percent(70), 0);
        assert_eq!(range.percent_for_raw(0), 0);
    }
}
