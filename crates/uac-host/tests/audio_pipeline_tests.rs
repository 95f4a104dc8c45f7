//! Isochronous pipeline integration tests
//!
//! Exercises the receive and transmit data paths end to end: scripted
//! transfer completions on one side, blocking reads and writes on the
//! other.
//!
//! # Test Scenarios
//! - Received packets reach the reader in order
//! - The ring threshold fires the RxDone callback
//! - A suspended stream delivers no receive notifications
//! - Overflow drops whole packets, never partial frames
//! - Transfer errors are reported without killing the stream
//! - Rejected submissions hand the transfer back to the pool
//! - Writes land on the wire, short packets padded with silence
//! - Completed transmit transfers refill from the ring
//!
//! Run with: cargo test -p uac-host --test audio_pipeline_tests

use std::sync::{Arc, Mutex};
use std::time::Duration;

use uac_host::backend::{TransferStatus, UsbHostBackend, UsbHostDevice};
use uac_host::test_utils::{MockBackend, MockDevice};
use uac_host::{
    DriverConfig, StreamCallback, StreamConfig, StreamEvent, StreamFlags, StreamOpenConfig,
    StreamState, UacHost,
};
use uac_proto::testdata;

const ADDR: u8 = 1;
const TX_IFACE: u8 = 1;
const RX_IFACE: u8 = 2;
const TX_EP: u8 = 0x01;
const RX_EP: u8 = 0x82;

/// 48 kHz mono 16-bit on the microphone path
const RX_PACKET: usize = 96;
/// 48 kHz stereo 16-bit on the speaker path
const TX_PACKET: usize = 192;

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

fn event_sink() -> (Arc<Mutex<Vec<StreamEvent>>>, StreamCallback) {
    let events: Arc<Mutex<Vec<StreamEvent>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    let callback: StreamCallback = Arc::new(move |event| sink.lock().unwrap().push(event));
    (events, callback)
}

fn stream_config(channels: u8) -> StreamConfig {
    StreamConfig {
        sample_rate: 48_000,
        channels,
        bit_resolution: 16,
        transfer_count: 2,
        packets_per_transfer: 2,
        flags: StreamFlags::default(),
    }
}

// ============================================================
// Receive path
// ============================================================

#[test]
fn test_received_packets_reach_reader_in_order() {
    let (host, _backend, device) = install();
    let handle = host
        .open(StreamOpenConfig {
            address: ADDR,
            interface: RX_IFACE,
            ring_capacity: 4096,
            ring_threshold: 1024,
            callback: None,
        })
        .unwrap();
    host.start(&handle, &stream_config(1)).unwrap();

    let first = vec![0xAAu8; RX_PACKET];
    let second = vec![0x55u8; RX_PACKET];
    assert!(device.complete_rx(RX_EP, &[&first, &second]));

    let mut buf = [0u8; 256];
    let n = host
        .read(&handle, &mut buf, Duration::from_millis(100))
        .unwrap();
    assert_eq!(n, 2 * RX_PACKET);
    assert_eq!(&buf[..RX_PACKET], first.as_slice());
    assert_eq!(&buf[RX_PACKET..n], second.as_slice());

    // The completed transfer went straight back on the wire
    assert_eq!(device.pending_iso(RX_EP), 2);
}

#[test]
fn test_read_times_out_on_silence() {
    let (host, _backend, _device) = install();
    let handle = host
        .open(StreamOpenConfig {
            address: ADDR,
            interface: RX_IFACE,
            ring_capacity: 4096,
            ring_threshold: 1024,
            callback: None,
        })
        .unwrap();
    host.start(&handle, &stream_config(1)).unwrap();

    let mut buf = [0u8; 64];
    let n = host
        .read(&handle, &mut buf, Duration::from_millis(10))
        .unwrap();
    assert_eq!(n, 0);
}

#[test]
fn test_ring_threshold_fires_rx_done() {
    let (host, _backend, device) = install();
    let (events, callback) = event_sink();
    let handle = host
        .open(StreamOpenConfig {
            address: ADDR,
            interface: RX_IFACE,
            ring_capacity: 4096,
            ring_threshold: 100,
            callback: Some(callback),
        })
        .unwrap();
    host.start(&handle, &stream_config(1)).unwrap();

    let payload = vec![1u8; RX_PACKET];
    // One packet stays below the threshold
    device.complete_rx(RX_EP, &[&payload]);
    assert!(!events.lock().unwrap().contains(&StreamEvent::RxDone));
    // The second crosses it
    device.complete_rx(RX_EP, &[&payload]);
    assert!(events.lock().unwrap().contains(&StreamEvent::RxDone));
}

#[test]
fn test_overflow_drops_whole_packets() {
    let (host, _backend, device) = install();
    let handle = host
        .open(StreamOpenConfig {
            address: ADDR,
            interface: RX_IFACE,
            ring_capacity: 100,
            ring_threshold: 50,
            callback: None,
        })
        .unwrap();
    host.start(&handle, &stream_config(1)).unwrap();

    let first = vec![0x11u8; RX_PACKET];
    let second = vec![0x22u8; RX_PACKET];
    // Only the first packet fits; the second is dropped in full
    device.complete_rx(RX_EP, &[&first, &second]);

    let mut buf = [0u8; 256];
    let n = host
        .read(&handle, &mut buf, Duration::from_millis(100))
        .unwrap();
    assert_eq!(n, RX_PACKET);
    assert_eq!(&buf[..n], first.as_slice());
    let n = host
        .read(&handle, &mut buf, Duration::from_millis(10))
        .unwrap();
    assert_eq!(n, 0);
}

#[test]
fn test_transfer_error_reported_and_stream_survives() {
    let (host, _backend, device) = install();
    let (events, callback) = event_sink();
    let handle = host
        .open(StreamOpenConfig {
            address: ADDR,
            interface: RX_IFACE,
            ring_capacity: 4096,
            ring_threshold: 1024,
            callback: Some(callback),
        })
        .unwrap();
    host.start(&handle, &stream_config(1)).unwrap();

    assert!(device.fail_iso(RX_EP, TransferStatus::Error));
    assert!(events.lock().unwrap().contains(&StreamEvent::TransferError));
    // The failed transfer is parked, not resubmitted
    assert_eq!(device.pending_iso(RX_EP), 1);
    assert_eq!(host.state(&handle).unwrap(), StreamState::Active);

    // A suspend/resume cycle puts the full pipeline back on the wire
    host.suspend(&handle).unwrap();
    host.resume(&handle).unwrap();
    assert_eq!(device.pending_iso(RX_EP), 2);
}

#[test]
fn test_suspended_stream_delivers_no_rx_notifications() {
    let (host, _backend, device) = install();
    let (events, callback) = event_sink();
    let handle = host
        .open(StreamOpenConfig {
            address: ADDR,
            interface: RX_IFACE,
            ring_capacity: 4096,
            ring_threshold: 100,
            callback: Some(callback),
        })
        .unwrap();
    host.start(&handle, &stream_config(1)).unwrap();

    let payload = vec![9u8; RX_PACKET];
    device.complete_rx(RX_EP, &[&payload, &payload]);
    assert!(events.lock().unwrap().contains(&StreamEvent::RxDone));

    // Suspend parks every canceled transfer instead of resubmitting it
    host.suspend(&handle).unwrap();
    assert_eq!(device.pending_iso(RX_EP), 0);
    events.lock().unwrap().clear();

    // With nothing on the wire and the ring flushed, no notification can
    // fire until the stream is resumed
    assert!(!device.complete_rx(RX_EP, &[&payload]));
    assert!(events.lock().unwrap().is_empty());

    host.resume(&handle).unwrap();
    device.complete_rx(RX_EP, &[&payload, &payload]);
    assert!(events.lock().unwrap().contains(&StreamEvent::RxDone));
}

#[test]
fn test_rejected_receive_submission_keeps_pipeline_intact() {
    let (host, _backend, device) = install();
    let handle = host
        .open(StreamOpenConfig {
            address: ADDR,
            interface: RX_IFACE,
            ring_capacity: 4096,
            ring_threshold: 1024,
            callback: None,
        })
        .unwrap();
    host.start(&handle, &stream_config(1)).unwrap();
    host.suspend(&handle).unwrap();

    // The stack refuses submissions on a halted endpoint
    device.halt_endpoint(RX_EP).unwrap();
    assert!(host.resume(&handle).is_err());
    assert_eq!(host.state(&handle).unwrap(), StreamState::Ready);
    assert_eq!(device.pending_iso(RX_EP), 0);

    // Both transfers came back to the pool, so the next resume fields
    // the full pipeline
    device.clear_endpoint(RX_EP).unwrap();
    host.resume(&handle).unwrap();
    assert_eq!(device.pending_iso(RX_EP), 2);
}

// ============================================================
// Transmit path
// ============================================================

#[test]
fn test_write_puts_audio_on_wire() {
    let (host, _backend, device) = install();
    let (events, callback) = event_sink();
    let handle = host
        .open(StreamOpenConfig {
            address: ADDR,
            interface: TX_IFACE,
            ring_capacity: 4096,
            ring_threshold: 1024,
            callback: Some(callback),
        })
        .unwrap();
    host.start(&handle, &stream_config(2)).unwrap();

    let data: Vec<u8> = (0..2 * TX_PACKET).map(|i| i as u8).collect();
    host.write(&handle, &data, Duration::from_millis(100))
        .unwrap();
    assert_eq!(device.pending_iso(TX_EP), 1);

    assert!(device.complete_tx(TX_EP));
    assert_eq!(device.transmitted(), data);
    // Ring drained, transfer parked, writer notified
    assert_eq!(device.pending_iso(TX_EP), 0);
    assert!(events.lock().unwrap().contains(&StreamEvent::TxDone));
}

#[test]
fn test_short_writes_are_padded_with_silence() {
    let (host, _backend, device) = install();
    let handle = host
        .open(StreamOpenConfig {
            address: ADDR,
            interface: TX_IFACE,
            ring_capacity: 4096,
            ring_threshold: 1024,
            callback: None,
        })
        .unwrap();
    host.start(&handle, &stream_config(2)).unwrap();

    let data = vec![0xEEu8; 100];
    host.write(&handle, &data, Duration::from_millis(100))
        .unwrap();
    assert!(device.complete_tx(TX_EP));

    // Every service interval carries a full packet; the tail is silence
    let sent = device.transmitted();
    assert_eq!(sent.len(), 2 * TX_PACKET);
    assert_eq!(&sent[..100], data.as_slice());
    assert!(sent[100..].iter().all(|b| *b == 0));
}

#[test]
fn test_write_spans_multiple_transfers() {
    let (host, _backend, device) = install();
    let handle = host
        .open(StreamOpenConfig {
            address: ADDR,
            interface: TX_IFACE,
            ring_capacity: 4096,
            ring_threshold: 1024,
            callback: None,
        })
        .unwrap();
    host.start(&handle, &stream_config(2)).unwrap();

    // Four packets of data fill both transfers in rotation
    let data: Vec<u8> = (0..4 * TX_PACKET).map(|i| (i / 3) as u8).collect();
    host.write(&handle, &data, Duration::from_millis(100))
        .unwrap();
    assert_eq!(device.pending_iso(TX_EP), 2);

    assert!(device.complete_tx(TX_EP));
    assert!(device.complete_tx(TX_EP));
    assert_eq!(device.transmitted(), data);
}

#[test]
fn test_rejected_transmit_submission_keeps_pipeline_intact() {
    let (host, _backend, device) = install();
    let handle = host
        .open(StreamOpenConfig {
            address: ADDR,
            interface: TX_IFACE,
            ring_capacity: 4096,
            ring_threshold: 1024,
            callback: None,
        })
        .unwrap();
    host.start(&handle, &stream_config(2)).unwrap();

    // The stack refuses submissions on a halted endpoint
    device.halt_endpoint(TX_EP).unwrap();
    let data = vec![3u8; 2 * TX_PACKET];
    assert!(host
        .write(&handle, &data, Duration::from_millis(100))
        .is_err());
    assert_eq!(device.pending_iso(TX_EP), 0);
    assert_eq!(host.state(&handle).unwrap(), StreamState::Active);

    // The rejected transfer is back in the pool: both transfers can
    // still go on the wire
    device.clear_endpoint(TX_EP).unwrap();
    host.write(&handle, &data, Duration::from_millis(100))
        .unwrap();
    host.write(&handle, &data, Duration::from_millis(100))
        .unwrap();
    assert_eq!(device.pending_iso(TX_EP), 2);
}

#[test]
fn test_suspend_reclaims_transmit_transfers() {
    let (host, _backend, device) = install();
    let handle = host
        .open(StreamOpenConfig {
            address: ADDR,
            interface: TX_IFACE,
            ring_capacity: 4096,
            ring_threshold: 1024,
            callback: None,
        })
        .unwrap();
    host.start(&handle, &stream_config(2)).unwrap();

    let data = vec![7u8; 2 * TX_PACKET];
    host.write(&handle, &data, Duration::from_millis(100))
        .unwrap();
    assert_eq!(device.pending_iso(TX_EP), 1);

    // Flush cancels the in-flight transfer; it parks instead of resubmitting
    host.suspend(&handle).unwrap();
    assert_eq!(device.pending_iso(TX_EP), 0);
    assert_eq!(host.state(&handle).unwrap(), StreamState::Ready);

    // The full pipeline is available again after resume
    host.resume(&handle).unwrap();
    host.write(&handle, &data, Duration::from_millis(100))
        .unwrap();
    host.write(&handle, &data, Duration::from_millis(100))
        .unwrap();
    assert_eq!(device.pending_iso(TX_EP), 2);
}
