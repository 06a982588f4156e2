//! Write scheduler behaviour across several devices

use crate::common::{open_handle, wait_until};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use wiimote_hid::hid::{SimTransport, StopOutcome, WriteScheduler, WriterConfig};

#[test]
fn test_fifo_across_devices() {
    let bus = SimTransport::new();
    bus.add_wiimote("sim/0");
    bus.add_wiimote("sim/1");
    let first = open_handle(&bus, "sim/0");
    let second = open_handle(&bus, "sim/1");

    let scheduler = WriteScheduler::new(WriterConfig {
        write_interval_ms: 5,
        join_timeout_ms: 200,
        max_queue_depth: 0,
    });
    scheduler.enqueue(Arc::clone(&first), vec![0x10, 0x01]).unwrap();
    scheduler.enqueue(Arc::clone(&second), vec![0x11, 0x10]).unwrap();
    scheduler.enqueue(first, vec![0x10, 0x00]).unwrap();

    assert!(wait_until(|| bus.write_log().len() == 3));
    assert_eq!(scheduler.stop(), StopOutcome::Joined);

    let log = bus.write_log();
    let order: Vec<(&str, &[u8])> = log.iter().map(|w| (w.path.as_str(), w.data.as_slice())).collect();
    assert_eq!(
        order,
        vec![
            ("sim/0", &[0x10u8, 0x01][..]),
            ("sim/1", &[0x11, 0x10][..]),
            ("sim/0", &[0x10, 0x00][..]),
        ]
    );
    for pair in log.windows(2) {
        assert!(pair[1].at.duration_since(pair[0].at) >= Duration::from_millis(5));
    }
}

#[test]
fn test_stop_is_bounded_by_join_timeout() {
    let bus = SimTransport::new();
    let device = bus.add_wiimote("sim/0");
    let handle = open_handle(&bus, "sim/0");
    device.set_write_blocked(true);

    let scheduler = WriteScheduler::new(WriterConfig {
        write_interval_ms: 1,
        join_timeout_ms: 50,
        max_queue_depth: 0,
    });
    scheduler.enqueue(Arc::clone(&handle), vec![0x10, 0x01]).unwrap();
    scheduler.enqueue(handle, vec![0x10, 0x00]).unwrap();
    assert!(wait_until(|| scheduler.pending() == 1));

    let started = Instant::now();
    assert_eq!(scheduler.stop(), StopOutcome::Detached);
    assert!(started.elapsed() < Duration::from_millis(50 + 500));
    assert_eq!(scheduler.pending(), 0);

    // The detached worker finishes its in-flight write and nothing after it
    device.set_write_blocked(false);
    assert!(wait_until(|| device.writes().len() == 1));
    thread::sleep(Duration::from_millis(20));
    assert_eq!(device.writes(), vec![vec![0x10, 0x01]]);
}

#[test]
fn test_stop_discards_queued_writes() {
    let bus = SimTransport::new();
    let device = bus.add_wiimote("sim/0");
    let handle = open_handle(&bus, "sim/0");

    let scheduler = WriteScheduler::new(WriterConfig {
        write_interval_ms: 500,
        join_timeout_ms: 200,
        max_queue_depth: 0,
    });
    for byte in 0..4u8 {
        scheduler.enqueue(Arc::clone(&handle), vec![0x11, byte << 4]).unwrap();
    }
    assert!(wait_until(|| device.writes().len() == 1));

    // Worker is sleeping out the interval; stop cuts it short
    let started = Instant::now();
    assert_eq!(scheduler.stop(), StopOutcome::Joined);
    assert!(started.elapsed() < Duration::from_millis(500));
    assert_eq!(scheduler.pending(), 0);
    assert_eq!(device.writes().len(), 1);
    assert_eq!(scheduler.stop(), StopOutcome::AlreadyStopped);
}
