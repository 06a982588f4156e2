//! Button edges through the full client loop

use crate::common::fast_writer;
use std::sync::Arc;
use wiimote_hid::core::config::{HidConfig, InputConfig};
use wiimote_hid::hid::{HidTransport, SimDevice, SimTransport, WiimoteManager};
use wiimote_hid::input::EdgeState;
use wiimote_hid::{Button, EventSender, InputManager};

const A_PRESSED: [u8; 3] = [0x30, 0x00, 0x08];
const RELEASED: [u8; 3] = [0x30, 0x00, 0x00];

fn input_with_remote() -> (InputManager, SimDevice, Arc<SimTransport>) {
    let bus = Arc::new(SimTransport::new());
    let device = bus.add_wiimote("sim/0");
    let (tx, _rx) = EventSender::channel();
    let transport: Arc<dyn HidTransport> = Arc::clone(&bus) as Arc<dyn HidTransport>;
    let manager = WiimoteManager::new(transport, HidConfig::default(), fast_writer(), tx);
    (InputManager::new(manager, InputConfig::default()), device, bus)
}

#[test]
fn test_no_device_is_neutral() {
    let bus: Arc<dyn HidTransport> = Arc::new(SimTransport::new());
    let (tx, _rx) = EventSender::channel();
    let manager = WiimoteManager::new(bus, HidConfig::default(), fast_writer(), tx);
    let mut input = InputManager::new(manager, InputConfig::default());

    for _ in 0..3 {
        input.tick().unwrap();
    }
    assert!(!input.has_device());
    for button in Button::ALL {
        assert!(!input.get_button(button));
        assert!(!input.get_button_down(button));
        assert!(!input.get_button_up(button));
    }
    assert_eq!(input.accel(), [0.0; 3]);
    assert!(input.pointer().is_none());
}

#[test]
fn test_press_reported_exactly_once() {
    let (mut input, device, _bus) = input_with_remote();
    input.tick().unwrap();
    assert!(input.has_device());

    device.push_report(&A_PRESSED);
    input.tick().unwrap();
    assert!(input.get_button(Button::A));
    assert!(input.get_button_down(Button::A));

    let mut downs = 0;
    for _ in 0..1000 {
        input.tick().unwrap();
        assert!(input.get_button(Button::A));
        assert!(!input.get_button_up(Button::A));
        if input.get_button_down(Button::A) {
            downs += 1;
        }
    }
    assert_eq!(downs, 0);
    assert_eq!(input.tracker().state(Button::A), EdgeState::PressedReported);

    device.push_report(&RELEASED);
    input.tick().unwrap();
    assert!(input.get_button_up(Button::A));
    input.tick().unwrap();
    assert!(!input.get_button_up(Button::A));
    assert_eq!(input.tracker().state(Button::A), EdgeState::ReleasedReported);

    input.into_manager().cleanup_all();
}

#[test]
fn test_other_buttons_unaffected() {
    let (mut input, device, _bus) = input_with_remote();
    input.tick().unwrap();

    device.push_report(&A_PRESSED);
    input.tick().unwrap();
    for button in Button::ALL.into_iter().filter(|b| *b != Button::A) {
        assert!(!input.get_button(button));
        assert!(!input.get_button_down(button));
    }
    input.into_manager().cleanup_all();
}

#[test]
fn test_disconnect_resets_without_release_edge() {
    let (mut input, device, _bus) = input_with_remote();
    input.tick().unwrap();
    device.push_report(&A_PRESSED);
    input.tick().unwrap();
    input.tick().unwrap();
    assert!(input.get_button(Button::A));

    device.unplug();
    input.tick().unwrap();
    assert!(!input.has_device());
    assert!(!input.get_button(Button::A));
    assert!(!input.get_button_up(Button::A));
    assert_eq!(input.tracker().state(Button::A), EdgeState::ReleasedReported);

    // Plugged back in with A still held: a fresh press
    device.replug();
    device.push_report(&A_PRESSED);
    input.tick().unwrap();
    assert!(input.has_device());
    assert!(input.get_button_down(Button::A));
    input.into_manager().cleanup_all();
}

#[test]
fn test_primary_gets_configured() {
    let (mut input, device, _bus) = input_with_remote();
    input.tick().unwrap();

    // Player LED 1, then the configured report mode
    assert!(crate::common::wait_until(|| device
        .writes()
        .iter()
        .any(|w| w.as_slice() == [0x12, 0x00, 0x37])));
    assert!(device.writes().iter().any(|w| w.as_slice() == [0x11, 0x10]));
    input.into_manager().cleanup_all();
}
