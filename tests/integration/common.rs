//! Shared fixtures for the integration tests

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::UnboundedReceiver;
use wiimote_hid::core::config::HidConfig;
use wiimote_hid::hid::{HidHandle, HidTransport, SimTransport, WiimoteManager, WriterConfig};
use wiimote_hid::{DeviceEvent, EventSender};

/// Writer settings fast enough that tests do not wait on the rate limit
pub fn fast_writer() -> WriterConfig {
    WriterConfig {
        write_interval_ms: 1,
        join_timeout_ms: 200,
        max_queue_depth: 0,
    }
}

pub fn manager_with(
    bus: &Arc<SimTransport>,
    writer: WriterConfig,
) -> (WiimoteManager, UnboundedReceiver<DeviceEvent>) {
    let (tx, rx) = EventSender::channel();
    let transport: Arc<dyn HidTransport> = Arc::clone(bus) as Arc<dyn HidTransport>;
    (WiimoteManager::new(transport, HidConfig::default(), writer, tx), rx)
}

pub fn manager(bus: &Arc<SimTransport>) -> (WiimoteManager, UnboundedReceiver<DeviceEvent>) {
    manager_with(bus, fast_writer())
}

/// Open a simulated original remote directly, bypassing the registry
pub fn open_handle(bus: &SimTransport, path: &str) -> Arc<dyn HidHandle> {
    let info = bus
        .enumerate(0x057E, 0x0306)
        .unwrap()
        .into_iter()
        .find(|d| d.path == path)
        .unwrap();
    bus.open(&info).unwrap()
}

pub fn wait_until(mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        thread::sleep(Duration::from_millis(2));
    }
    cond()
}

pub fn drain(rx: &mut UnboundedReceiver<DeviceEvent>) -> Vec<DeviceEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
