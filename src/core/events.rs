//! Device event definitions

use crate::hid::protocol::DeviceKind;
use crate::wiimote::ExtensionKind;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::trace;

/// Connection changes published by the device registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DeviceEvent {
    /// A new remote was opened and added
    Connected { path: String, kind: DeviceKind },

    /// A remote was removed (cleanup or read failure)
    Disconnected { path: String },

    /// An extension was identified or unplugged
    ExtensionChanged {
        path: String,
        extension: Option<ExtensionKind>,
    },
}

/// Sending half of the device event channel
///
/// Sending never fails from the caller's point of view: with the receiver gone
/// the event is dropped.
#[derive(Clone)]
pub struct EventSender {
    tx: mpsc::UnboundedSender<DeviceEvent>,
}

impl EventSender {
    pub fn new(tx: mpsc::UnboundedSender<DeviceEvent>) -> Self {
        Self { tx }
    }

    /// Create a connected sender/receiver pair
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<DeviceEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }

    pub fn send(&self, event: DeviceEvent) {
        if let Err(e) = self.tx.send(event) {
            trace!("Device event dropped, no receiver: {:?}", e.0);
        }
    }
}
