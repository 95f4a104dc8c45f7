//! Stream lifecycle integration tests
//!
//! Drives a full install/open/start/suspend/resume/stop/close cycle against
//! a scripted host stack and checks the state machine at every step.
//!
//! # Test Scenarios
//! - Open validation and idempotent re-open
//! - Start claims the matching data alternate setting
//! - Format and bandwidth rejection
//! - A start that fails mid-way rolls back to idle
//! - Suspend and resume idempotence
//! - Stop releases the interface, close releases the device
//! - Uninstall refuses while streams are open
//!
//! Run with: cargo test -p uac-host --test stream_lifecycle_tests

use std::sync::Arc;
use std::time::Duration;

use uac_host::backend::UsbHostBackend;
use uac_host::test_utils::{MockBackend, MockDevice};
use uac_host::{
    DriverConfig, Error, StreamConfig, StreamFlags, StreamOpenConfig, StreamState, UacHost,
};
use uac_proto::testdata;

const ADDR: u8 = 1;
const TX_IFACE: u8 = 1;
const RX_IFACE: u8 = 2;
const TX_EP: u8 = 0x01;
const RX_EP: u8 = 0x82;

fn install() -> (UacHost, Arc<MockBackend>, Arc<MockDevice>) {
    let backend = MockBackend::new();
    let device = backend.add_device(ADDR, 0x1234, 0x5678, testdata::headset_config());
    let host = UacHost::install(
        Arc::clone(&backend) as Arc<dyn UsbHostBackend>,
        DriverConfig::default(),
    )
    .unwrap();
    (host, backend, device)
}

fn open_config(interface: u8) -> StreamOpenConfig {
    StreamOpenConfig {
        address: ADDR,
        interface,
        ring_capacity: 4096,
        ring_threshold: 1024,
        callback: None,
    }
}

fn tx_config() -> StreamConfig {
    StreamConfig {
        sample_rate: 48_000,
        channels: 2,
        bit_resolution: 16,
        transfer_count: 2,
        packets_per_transfer: 2,
        flags: StreamFlags::default(),
    }
}

fn rx_config() -> StreamConfig {
    StreamConfig {
        sample_rate: 48_000,
        channels: 1,
        bit_resolution: 16,
        transfer_count: 2,
        packets_per_transfer: 2,
        flags: StreamFlags::default(),
    }
}

// ============================================================
// Open
// ============================================================

#[test]
fn test_open_rejects_bad_ring_geometry() {
    let (host, _backend, _device) = install();
    let mut config = open_config(TX_IFACE);
    config.ring_threshold = config.ring_capacity;
    assert!(matches!(host.open(config), Err(Error::InvalidArg(_))));
}

#[test]
fn test_open_unknown_interface_fails_to_parse() {
    let (host, _backend, _device) = install();
    assert!(matches!(
        host.open(open_config(7)),
        Err(Error::Parse(_))
    ));
}

#[test]
fn test_open_is_idempotent() {
    let (host, _backend, _device) = install();
    let first = host.open(open_config(TX_IFACE)).unwrap();
    let second = host.open(open_config(TX_IFACE)).unwrap();
    // Both handles refer to the same stream
    host.start(&first, &tx_config()).unwrap();
    assert_eq!(host.state(&second).unwrap(), StreamState::Active);
    host.stop(&first).unwrap();
    host.close(&second).unwrap();
}

#[test]
fn test_open_reports_device_info() {
    let (host, _backend, _device) = install();
    let handle = host.open(open_config(RX_IFACE)).unwrap();
    let info = host.device_info(&handle).unwrap();
    assert_eq!(info.address, ADDR);
    assert_eq!((info.vid, info.pid), (0x1234, 0x5678));
    assert_eq!(info.interface, RX_IFACE);
    assert_eq!(info.alt_setting_count, 1);
    assert_eq!(info.product.as_deref(), Some("Mock Headset"));

    let alt = host.alt_setting_params(&handle, 0).unwrap();
    assert_eq!(alt.channels, 1);
    assert_eq!(alt.endpoint_mps, 96);
    assert!(matches!(
        host.alt_setting_params(&handle, 1),
        Err(Error::InvalidArg(_))
    ));
}

// ============================================================
// Start
// ============================================================

#[test]
fn test_start_claims_data_alternate() {
    let (host, _backend, device) = install();
    let handle = host.open(open_config(TX_IFACE)).unwrap();
    assert_eq!(host.state(&handle).unwrap(), StreamState::Idle);

    host.start(&handle, &tx_config()).unwrap();
    assert_eq!(host.state(&handle).unwrap(), StreamState::Active);
    assert_eq!(device.claimed(), vec![(TX_IFACE, 1)]);
    // Transmit pipelines are armed but idle until the first write
    assert_eq!(device.pending_iso(TX_EP), 0);
}

#[test]
fn test_start_submits_receive_pipeline() {
    let (host, _backend, device) = install();
    let handle = host.open(open_config(RX_IFACE)).unwrap();
    host.start(&handle, &rx_config()).unwrap();
    assert_eq!(host.state(&handle).unwrap(), StreamState::Active);
    assert_eq!(device.pending_iso(RX_EP), 2);
}

#[test]
fn test_start_without_matching_alternate_is_not_found() {
    let (host, _backend, _device) = install();
    let handle = host.open(open_config(TX_IFACE)).unwrap();

    let mut config = tx_config();
    config.sample_rate = 11_025;
    assert!(matches!(
        host.start(&handle, &config),
        Err(Error::NotFound(_))
    ));

    // Mono against the stereo-only speaker interface
    let mut config = tx_config();
    config.channels = 1;
    assert!(matches!(
        host.start(&handle, &config),
        Err(Error::NotFound(_))
    ));
    assert_eq!(host.state(&handle).unwrap(), StreamState::Idle);
}

#[test]
fn test_start_rejects_oversized_packets() {
    // 48 kHz stereo 16-bit needs 192 bytes per interval, endpoint takes 100
    let backend = MockBackend::new();
    backend.add_device(ADDR, 0x1234, 0x5678, testdata::headset_config_with_tx_mps(100));
    let host = UacHost::install(
        Arc::clone(&backend) as Arc<dyn UsbHostBackend>,
        DriverConfig::default(),
    )
    .unwrap();
    let handle = host.open(open_config(TX_IFACE)).unwrap();
    assert!(matches!(
        host.start(&handle, &tx_config()),
        Err(Error::NotSupported(_))
    ));
}

#[test]
fn test_start_rejects_zero_geometry() {
    let (host, _backend, _device) = install();
    let handle = host.open(open_config(TX_IFACE)).unwrap();
    let mut config = tx_config();
    config.transfer_count = 0;
    assert!(matches!(
        host.start(&handle, &config),
        Err(Error::InvalidArg(_))
    ));
}

#[test]
fn test_failed_start_rolls_back_to_idle() {
    let (host, _backend, device) = install();
    let handle = host.open(open_config(RX_IFACE)).unwrap();

    // SET_INTERFACE goes unanswered, so the implicit resume fails
    device.drop_control_requests(true);
    assert!(host.start(&handle, &rx_config()).is_err());
    assert_eq!(host.state(&handle).unwrap(), StreamState::Idle);
    assert!(device.claimed().is_empty());
    assert_eq!(device.pending_iso(RX_EP), 0);

    // Once the device answers again the stream starts cleanly
    device.drop_control_requests(false);
    host.start(&handle, &rx_config()).unwrap();
    assert_eq!(host.state(&handle).unwrap(), StreamState::Active);
    assert_eq!(device.pending_iso(RX_EP), 2);
}

#[test]
fn test_start_is_idempotent() {
    let (host, _backend, device) = install();
    let handle = host.open(open_config(TX_IFACE)).unwrap();
    host.start(&handle, &tx_config()).unwrap();
    host.start(&handle, &tx_config()).unwrap();
    assert_eq!(host.state(&handle).unwrap(), StreamState::Active);
    // No second claim
    assert_eq!(device.claimed(), vec![(TX_IFACE, 1)]);
}

#[test]
fn test_suspend_after_start_flag_leaves_ready() {
    let (host, _backend, device) = install();
    let handle = host.open(open_config(RX_IFACE)).unwrap();
    let mut config = rx_config();
    config.flags.suspend_after_start = true;

    host.start(&handle, &config).unwrap();
    assert_eq!(host.state(&handle).unwrap(), StreamState::Ready);
    assert_eq!(device.pending_iso(RX_EP), 0);
    // No interface or rate programming until resume
    assert!(device.control_log().is_empty());

    host.resume(&handle).unwrap();
    assert_eq!(host.state(&handle).unwrap(), StreamState::Active);
    assert_eq!(device.pending_iso(RX_EP), 2);
}

// ============================================================
// Suspend / resume
// ============================================================

#[test]
fn test_suspend_and_resume_are_idempotent() {
    let (host, _backend, device) = install();
    let handle = host.open(open_config(RX_IFACE)).unwrap();
    host.start(&handle, &rx_config()).unwrap();

    host.suspend(&handle).unwrap();
    assert_eq!(host.state(&handle).unwrap(), StreamState::Ready);
    // Flush reclaimed every in-flight transfer
    assert_eq!(device.pending_iso(RX_EP), 0);
    host.suspend(&handle).unwrap();
    assert_eq!(host.state(&handle).unwrap(), StreamState::Ready);

    host.resume(&handle).unwrap();
    assert_eq!(host.state(&handle).unwrap(), StreamState::Active);
    assert_eq!(device.pending_iso(RX_EP), 2);
    host.resume(&handle).unwrap();
    assert_eq!(device.pending_iso(RX_EP), 2);
}

#[test]
fn test_resume_requires_started_stream() {
    let (host, _backend, _device) = install();
    let handle = host.open(open_config(RX_IFACE)).unwrap();
    assert!(matches!(
        host.resume(&handle),
        Err(Error::InvalidState(_))
    ));
}

// ============================================================
// Stop / close / uninstall
// ============================================================

#[test]
fn test_stop_releases_interface() {
    let (host, _backend, device) = install();
    let handle = host.open(open_config(RX_IFACE)).unwrap();
    host.start(&handle, &rx_config()).unwrap();

    host.stop(&handle).unwrap();
    assert_eq!(host.state(&handle).unwrap(), StreamState::Idle);
    assert!(device.claimed().is_empty());
    assert_eq!(device.pending_iso(RX_EP), 0);
    // Stopping an idle stream is a no-op
    host.stop(&handle).unwrap();
}

#[test]
fn test_close_invalidates_handle() {
    let (host, _backend, _device) = install();
    let handle = host.open(open_config(TX_IFACE)).unwrap();
    host.close(&handle).unwrap();
    assert!(matches!(host.state(&handle), Err(Error::NotFound(_))));
    assert!(matches!(host.close(&handle), Err(Error::NotFound(_))));
}

#[test]
fn test_close_stops_active_stream() {
    let (host, _backend, device) = install();
    let handle = host.open(open_config(RX_IFACE)).unwrap();
    host.start(&handle, &rx_config()).unwrap();
    host.close(&handle).unwrap();
    assert!(device.claimed().is_empty());
}

#[test]
fn test_uninstall_requires_all_streams_closed() {
    let (host, _backend, _device) = install();
    let tx = host.open(open_config(TX_IFACE)).unwrap();
    let rx = host.open(open_config(RX_IFACE)).unwrap();

    assert!(matches!(host.uninstall(), Err(Error::InvalidState(_))));
    host.close(&tx).unwrap();
    assert!(matches!(host.uninstall(), Err(Error::InvalidState(_))));
    host.close(&rx).unwrap();

    host.uninstall().unwrap();
    // Repeated uninstall is Ok, further opens are not
    host.uninstall().unwrap();
    assert!(matches!(
        host.open(open_config(TX_IFACE)),
        Err(Error::InvalidState(_))
    ));
}

// ============================================================
// Data-path state guards
// ============================================================

#[test]
fn test_read_and_write_respect_direction_and_state() {
    let (host, _backend, _device) = install();
    let tx = host.open(open_config(TX_IFACE)).unwrap();
    let rx = host.open(open_config(RX_IFACE)).unwrap();
    let mut buf = [0u8; 64];

    // Wrong direction
    assert!(matches!(
        host.read(&tx, &mut buf, Duration::from_millis(1)),
        Err(Error::NotSupported(_))
    ));
    assert!(matches!(
        host.write(&rx, &buf, Duration::from_millis(1)),
        Err(Error::NotSupported(_))
    ));

    // Not yet active
    assert!(matches!(
        host.read(&rx, &mut buf, Duration::from_millis(1)),
        Err(Error::InvalidState(_))
    ));
    let mut config = tx_config();
    config.flags.suspend_after_start = true;
    host.start(&tx, &config).unwrap();
    assert!(matches!(
        host.write(&tx, &buf, Duration::from_millis(1)),
        Err(Error::InvalidState(_))
    ));
}
