//! Device registry: discovery, polling and cleanup of connected remotes

use super::protocol::{DataReportMode, DeviceKind};
use super::transport::{HidDeviceInfo, HidTransport};
use super::writer::{SchedulerError, StopOutcome, WriteScheduler, WriterConfig};
use crate::core::config::HidConfig;
use crate::core::events::{DeviceEvent, EventSender};
use crate::wiimote::Wiimote;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Owner of every connected remote and of the shared write scheduler
///
/// Constructed once and passed by reference; registry mutation needs
/// `&mut self`, so there is a single writer by construction.
pub struct WiimoteManager {
    transport: Arc<dyn HidTransport>,
    config: HidConfig,
    scheduler: Arc<WriteScheduler>,
    devices: Vec<Wiimote>,
    event_tx: EventSender,
}

impl WiimoteManager {
    pub fn new(
        transport: Arc<dyn HidTransport>,
        config: HidConfig,
        writer: WriterConfig,
        event_tx: EventSender,
    ) -> Self {
        Self {
            transport,
            config,
            scheduler: Arc::new(WriteScheduler::new(writer)),
            devices: Vec::new(),
            event_tx,
        }
    }

    /// Scan for remotes not yet tracked and set each new one up
    ///
    /// Both product ids are always scanned. Returns whether at least one
    /// device was added. Only a failure to start the writer thread is an error;
    /// enumeration and open failures are logged and skipped.
    pub fn discover(&mut self) -> Result<bool, SchedulerError> {
        let scans = [
            (self.config.wiimote_product_id, DeviceKind::Wiimote),
            (self.config.wiimote_plus_product_id, DeviceKind::WiimotePlus),
        ];

        let mut added = 0;
        for (product_id, kind) in scans {
            added += self.scan(product_id, kind)?;
        }

        if added > 0 {
            info!("Discovery added {} device(s), {} tracked", added, self.devices.len());
        }
        Ok(added > 0)
    }

    fn scan(&mut self, product_id: u16, kind: DeviceKind) -> Result<usize, SchedulerError> {
        let found = match self.transport.enumerate(self.config.vendor_id, product_id) {
            Ok(found) => found,
            Err(e) => {
                warn!("Enumeration of {:04X}:{:04X} failed: {}", self.config.vendor_id, product_id, e);
                return Ok(0);
            }
        };

        let mut added = 0;
        for info in found {
            if self.contains(&info.path) {
                continue;
            }
            if self.add(&info, kind)? {
                added += 1;
            }
        }
        Ok(added)
    }

    fn add(&mut self, info: &HidDeviceInfo, scanned_as: DeviceKind) -> Result<bool, SchedulerError> {
        let kind = scanned_as.refine(info.product_string.as_deref(), &self.config.pro_controller_suffix);

        let handle = match self.transport.open(info) {
            Ok(handle) => handle,
            Err(e) => {
                warn!("Skipping {}: {}", info.path, e);
                return Ok(false);
            }
        };

        let mut wiimote = Wiimote::new(handle, kind, Arc::clone(&self.scheduler));
        info!("Connected {} at {}", kind, info.path);

        // Minimal reporting until the client selects a mode, then ask for the
        // status report that reveals an attached extension
        let setup = wiimote
            .set_report_mode(DataReportMode::Buttons)
            .and_then(|()| wiimote.request_status());
        if let Err(e) = setup {
            if e.is_fatal() {
                return Err(e);
            }
            warn!("{}: setup writes not queued: {}", info.path, e);
        }

        self.devices.push(wiimote);
        self.event_tx.send(DeviceEvent::Connected {
            path: info.path.clone(),
            kind,
        });
        Ok(true)
    }

    /// Whether a path is already tracked
    pub fn contains(&self, path: &str) -> bool {
        self.devices.iter().any(|d| d.path() == path)
    }

    /// A primary remote is tracked and its handle is open
    pub fn has_device(&self) -> bool {
        self.devices.first().is_some_and(|d| d.is_open())
    }

    /// Drain every device's pending reports
    ///
    /// A device whose read fails is treated as unplugged and removed. Returns
    /// the number of reports decoded.
    pub fn poll(&mut self) -> usize {
        let mut total = 0;
        let mut failed = Vec::new();

        for device in &mut self.devices {
            let extension_before = device.extension_kind();
            match device.read_available() {
                Ok(count) => total += count,
                Err(e) => {
                    warn!("{}: read failed, removing device: {}", device.path(), e);
                    failed.push(device.path().to_string());
                    continue;
                }
            }

            let extension = device.extension_kind();
            if extension != extension_before {
                self.event_tx.send(DeviceEvent::ExtensionChanged {
                    path: device.path().to_string(),
                    extension,
                });
            }
        }

        for path in failed {
            self.cleanup(&path);
        }
        total
    }

    /// Close and remove one device. Unknown paths are ignored.
    pub fn cleanup(&mut self, path: &str) -> bool {
        let Some(index) = self.devices.iter().position(|d| d.path() == path) else {
            debug!("Cleanup of untracked device {}", path);
            return false;
        };

        let device = self.devices.remove(index);
        if let Err(e) = device.handle().close() {
            warn!("Closing {} failed: {}", path, e);
        }
        info!("Disconnected {}", path);
        self.event_tx.send(DeviceEvent::Disconnected {
            path: path.to_string(),
        });
        true
    }

    /// Stop the writer, close every handle and clear the registry
    ///
    /// The writer is never restarted, so this is for process shutdown only.
    /// Calling it again is a no-op.
    pub fn cleanup_all(&mut self) -> StopOutcome {
        let outcome = self.scheduler.stop();
        for device in self.devices.drain(..) {
            if let Err(e) = device.handle().close() {
                warn!("Closing {} failed: {}", device.path(), e);
            }
            self.event_tx.send(DeviceEvent::Disconnected {
                path: device.path().to_string(),
            });
        }
        outcome
    }

    /// Drop every record without closing the handles; the last `Arc` releases
    /// each native handle
    pub fn forget_all(&mut self) {
        if !self.devices.is_empty() {
            debug!("Forgetting {} device(s)", self.devices.len());
        }
        self.devices.clear();
    }

    pub fn devices(&self) -> &[Wiimote] {
        &self.devices
    }

    pub fn devices_mut(&mut self) -> &mut [Wiimote] {
        &mut self.devices
    }

    /// First device found; the one the client loop drives
    pub fn primary(&self) -> Option<&Wiimote> {
        self.devices.first()
    }

    pub fn primary_mut(&mut self) -> Option<&mut Wiimote> {
        self.devices.first_mut()
    }

    pub fn get(&self, path: &str) -> Option<&Wiimote> {
        self.devices.iter().find(|d| d.path() == path)
    }

    pub fn get_mut(&mut self, path: &str) -> Option<&mut Wiimote> {
        self.devices.iter_mut().find(|d| d.path() == path)
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn scheduler(&self) -> &Arc<WriteScheduler> {
        &self.scheduler
    }

    pub fn config(&self) -> &HidConfig {
        &self.config
    }

    /// Enumerate every supported device without opening anything
    pub fn list_available(&self) -> Vec<(HidDeviceInfo, DeviceKind)> {
        let scans = [
            (self.config.wiimote_product_id, DeviceKind::Wiimote),
            (self.config.wiimote_plus_product_id, DeviceKind::WiimotePlus),
        ];

        let mut available = Vec::new();
        for (product_id, scanned_as) in scans {
            match self.transport.enumerate(self.config.vendor_id, product_id) {
                Ok(found) => {
                    for info in found {
                        let kind = scanned_as
                            .refine(info.product_string.as_deref(), &self.config.pro_controller_suffix);
                        available.push((info, kind));
                    }
                }
                Err(e) => warn!(
                    "Enumeration of {:04X}:{:04X} failed: {}",
                    self.config.vendor_id, product_id, e
                ),
            }
        }
        available
    }
}
