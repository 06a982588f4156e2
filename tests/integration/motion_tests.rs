//! Shake, twist, MotionPlus and the LED chase through the client loop

use crate::common::{fast_writer, wait_until};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use wiimote_hid::core::config::{HidConfig, InputConfig};
use wiimote_hid::hid::{HidTransport, SimDevice, SimTransport, WiimoteManager};
use wiimote_hid::{EventSender, InputManager};

const FLAT: [u8; 6] = [0x31, 0x00, 0x00, 0x80, 0x80, 0x9A];
const UPSIDE_DOWN: [u8; 6] = [0x31, 0x00, 0x00, 0x80, 0x80, 0x66];
const ON_SIDE: [u8; 6] = [0x31, 0x00, 0x00, 0x9A, 0x80, 0x80];

fn input_with(config: InputConfig) -> (InputManager, SimDevice, Arc<SimTransport>) {
    let bus = Arc::new(SimTransport::new());
    let device = bus.add_wiimote("sim/0");
    let (tx, _rx) = EventSender::channel();
    let transport: Arc<dyn HidTransport> = Arc::clone(&bus) as Arc<dyn HidTransport>;
    let manager = WiimoteManager::new(transport, HidConfig::default(), fast_writer(), tx);
    (InputManager::new(manager, config), device, bus)
}

fn id_reply(id: [u8; 6]) -> Vec<u8> {
    let mut buf = vec![0u8; 22];
    buf[0] = 0x21;
    buf[3] = 0x50;
    buf[5] = 0xFA;
    buf[6..12].copy_from_slice(&id);
    buf
}

fn has_write(device: &SimDevice, prefix: &[u8]) -> bool {
    device.writes().iter().any(|w| w.starts_with(prefix))
}

fn led_writes(device: &SimDevice) -> Vec<u8> {
    device
        .writes()
        .iter()
        .filter(|w| w[0] == 0x11)
        .map(|w| w[1])
        .collect()
}

#[test]
fn test_shake_and_settle() {
    let (mut input, device, _bus) = input_with(InputConfig::default());
    device.push_report(&FLAT);
    for _ in 0..4 {
        input.tick().unwrap();
    }
    assert!(!input.shaking());

    let mut seen = false;
    for i in 0..20 {
        if i % 2 == 0 {
            device.push_report(if (i / 2) % 2 == 0 { &UPSIDE_DOWN } else { &FLAT });
        }
        input.tick().unwrap();
        seen |= input.shaking();
    }
    assert!(seen);

    device.push_report(&FLAT);
    for _ in 0..12 {
        input.tick().unwrap();
    }
    assert!(!input.shaking());
}

#[test]
fn test_twist() {
    let (mut input, device, _bus) = input_with(InputConfig::default());
    device.push_report(&FLAT);
    for _ in 0..4 {
        input.tick().unwrap();
    }
    assert!(!input.twisting());

    device.push_report(&ON_SIDE);
    input.tick().unwrap();
    input.tick().unwrap();
    assert!(input.twisting());
    assert!((input.twist_amount() - 1.0).abs() < 1e-3);

    input.tick().unwrap();
    input.tick().unwrap();
    assert!(!input.twisting());
}

#[test]
fn test_led_chase_steps_then_restores() {
    let (mut input, device, _bus) = input_with(InputConfig::default());
    input.tick().unwrap();
    assert!(wait_until(|| led_writes(&device) == vec![0x10]));
    device.clear_writes();

    input.play_led_chase(Duration::from_millis(40)).unwrap();
    // Already playing
    input.play_led_chase(Duration::from_millis(40)).unwrap();
    assert!(input.led_chase_playing());

    let deadline = Instant::now() + Duration::from_secs(2);
    while input.led_chase_playing() && Instant::now() < deadline {
        input.tick().unwrap();
        thread::sleep(Duration::from_millis(2));
    }
    assert!(!input.led_chase_playing());
    assert!(wait_until(|| led_writes(&device).len() >= 5));
    assert_eq!(led_writes(&device), vec![0x10, 0x20, 0x40, 0x80, 0x10]);
}

#[test]
fn test_led_chase_cancelled_when_remote_leaves() {
    let (mut input, device, _bus) = input_with(InputConfig::default());
    input.tick().unwrap();
    input.play_led_chase(Duration::from_secs(10)).unwrap();
    assert!(input.led_chase_playing());

    device.unplug();
    input.tick().unwrap();
    assert!(!input.has_device());
    assert!(!input.led_chase_playing());
}

#[test]
fn test_led_chase_needs_a_remote() {
    let (mut input, device, _bus) = input_with(InputConfig::default());
    device.unplug();
    input.tick().unwrap();
    input.play_led_chase(Duration::from_millis(40)).unwrap();
    assert!(!input.led_chase_playing());
}

#[test]
fn test_find_motion_plus_and_yaw_vector() {
    let (mut input, device, _bus) = input_with(InputConfig::default());
    input.tick().unwrap();
    assert_eq!(input.motion_plus_vector(), [0.0; 3]);

    // Not seen yet: the check goes out and nothing is activated
    assert!(!input.find_motion_plus().unwrap());
    assert!(wait_until(|| has_write(&device, &[0x17, 0x04, 0xA6, 0x00, 0xFA])));

    device.push_report(&id_reply([0x00, 0x00, 0xA6, 0x20, 0x00, 0x05]));
    input.tick().unwrap();
    assert!(input.find_motion_plus().unwrap());
    assert!(wait_until(|| has_write(&device, &[0x17, 0x04, 0xA4, 0x00, 0xFA])));
    assert!(has_write(&device, &[0x16, 0x04, 0xA6, 0x00, 0xFE, 0x01, 0x04]));

    device.push_report(&id_reply([0x00, 0x00, 0xA4, 0x20, 0x04, 0x05]));
    input.tick().unwrap();

    // 100 deg/s of yaw in slow mode
    let yaw: u16 = 8192 + 1377;
    device.push_report(&[
        0x32,
        0x00,
        0x00,
        (yaw & 0xFF) as u8,
        0x00,
        0x00,
        ((yaw >> 6) as u8 & 0xFC) | 0x03,
        0x82,
        0x82,
        0x00,
        0x00,
    ]);
    input.tick().unwrap();
    let vector = input.motion_plus_vector();
    assert_eq!(vector[0], 0.0);
    assert!((vector[1] - 10.0).abs() < 0.01);
    assert_eq!(vector[2], 0.0);
    assert!(input.motion_plus_offset()[1] > 0.0);

    // Below the dead zone after taking the current rate as still
    input.recalibrate_motion_plus();
    assert_eq!(input.motion_plus_vector(), [0.0; 3]);
    assert_eq!(input.motion_plus_offset(), [0.0; 3]);
}

#[test]
fn test_motion_plus_activated_on_connect() {
    let config = InputConfig {
        motion_plus: true,
        ..Default::default()
    };
    let (mut input, device, _bus) = input_with(config);
    input.tick().unwrap();
    assert!(wait_until(|| has_write(&device, &[0x17, 0x04, 0xA6, 0x00, 0xFA])));

    device.push_report(&id_reply([0x00, 0x00, 0xA6, 0x20, 0x00, 0x05]));
    input.tick().unwrap();
    assert!(wait_until(|| has_write(&device, &[0x16, 0x04, 0xA6, 0x00, 0xFE])));
    assert!(input.primary().unwrap().motion_plus().activated());
}
