//! Registry discovery, extension detection and cleanup

use crate::common::{drain, manager, wait_until};
use std::sync::Arc;
use wiimote_hid::hid::{DeviceKind, SimTransport};
use wiimote_hid::wiimote::ExtensionKind;
use wiimote_hid::DeviceEvent;

#[test]
fn test_discover_both_product_ids() {
    let bus = Arc::new(SimTransport::new());
    bus.add_wiimote("sim/0");
    bus.add_device("sim/1", 0x0330, "Nintendo RVL-CNT-01-UC");
    let (mut manager, mut rx) = manager(&bus);

    assert!(manager.discover().unwrap());
    assert!(!manager.discover().unwrap());
    assert_eq!(manager.len(), 2);
    assert_eq!(manager.get("sim/0").unwrap().kind(), DeviceKind::Wiimote);
    assert_eq!(manager.get("sim/1").unwrap().kind(), DeviceKind::ProController);

    let events = drain(&mut rx);
    assert_eq!(events.len(), 2);
    assert!(events.iter().all(|e| matches!(e, DeviceEvent::Connected { .. })));
    manager.cleanup_all();
}

#[test]
fn test_plus_without_suffix_is_not_pro() {
    let bus = Arc::new(SimTransport::new());
    bus.add_device("sim/0", 0x0330, "Nintendo RVL-CNT-01-TR");
    let (mut manager, _rx) = manager(&bus);

    assert!(manager.discover().unwrap());
    assert_eq!(manager.primary().unwrap().kind(), DeviceKind::WiimotePlus);
    manager.cleanup_all();
}

#[test]
fn test_rediscover_after_unplug() {
    let bus = Arc::new(SimTransport::new());
    let device = bus.add_wiimote("sim/0");
    let (mut manager, _rx) = manager(&bus);

    manager.discover().unwrap();
    device.unplug();
    manager.poll();
    assert!(manager.is_empty());

    // Nothing on the bus: discovery finds nothing and the registry stays empty
    assert!(!manager.discover().unwrap());

    device.replug();
    assert!(manager.discover().unwrap());
    assert_eq!(device.open_count(), 2);
    manager.cleanup_all();
}

#[test]
fn test_new_device_gets_setup_writes() {
    let bus = Arc::new(SimTransport::new());
    let device = bus.add_wiimote("sim/0");
    let (mut manager, _rx) = manager(&bus);

    manager.discover().unwrap();
    assert!(wait_until(|| device.writes().len() >= 2));
    // Buttons-only report mode, then a status request
    assert_eq!(device.writes()[0], vec![0x12, 0x00, 0x30]);
    assert_eq!(device.writes()[1][0], 0x15);
    manager.cleanup_all();
}

#[test]
fn test_extension_attach_emits_event() {
    let bus = Arc::new(SimTransport::new());
    let device = bus.add_wiimote("sim/0");
    device.set_auto_status(true, 0x02);
    let (mut manager, mut rx) = manager(&bus);

    manager.discover().unwrap();
    drain(&mut rx);

    // Status reply arrives after the writer sends the request
    assert!(wait_until(|| device.pending_reports() > 0));
    manager.poll();

    let mut reply = vec![0u8; 22];
    reply[0] = 0x21;
    reply[3] = 0x50;
    reply[5] = 0xFA;
    reply[6..12].copy_from_slice(&[0x00, 0x00, 0xA4, 0x20, 0x00, 0x00]);
    device.push_report(&reply);
    manager.poll();

    assert_eq!(
        manager.primary().unwrap().extension_kind(),
        Some(ExtensionKind::Nunchuck)
    );
    assert_eq!(
        drain(&mut rx),
        vec![DeviceEvent::ExtensionChanged {
            path: "sim/0".to_string(),
            extension: Some(ExtensionKind::Nunchuck),
        }]
    );
    manager.cleanup_all();
}

#[test]
fn test_cleanup_all_closes_everything_once() {
    let bus = Arc::new(SimTransport::new());
    let first = bus.add_wiimote("sim/0");
    let second = bus.add_wiimote("sim/1");
    let (mut manager, mut rx) = manager(&bus);
    manager.discover().unwrap();
    drain(&mut rx);

    manager.cleanup_all();
    manager.cleanup_all();

    assert!(manager.is_empty());
    assert_eq!(first.close_count(), 1);
    assert_eq!(second.close_count(), 1);
    assert_eq!(drain(&mut rx).len(), 2);
}
