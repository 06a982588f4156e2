//! In-memory transport
//!
//! Stands in for real hardware in tests and in `wiimote-hid --simulate`.
//! Each simulated device has an inbox of input reports the host will read,
//! records every write it receives, and can be told to block or fail writes,
//! fail on close, or disappear from the bus. Like the hidapi handle, a write
//! holds the handle for its whole duration and reads report nothing pending
//! meanwhile.

use super::protocol::{self, VENDOR_ID_NINTENDO};
use super::transport::{HidDeviceInfo, HidHandle, HidTransport, TransportError};
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::trace;

/// One write observed by the simulated bus
#[derive(Debug, Clone)]
pub struct WriteRecord {
    pub path: String,
    pub data: Vec<u8>,
    pub at: Instant,
}

type WriteLog = Arc<Mutex<Vec<WriteRecord>>>;

struct SimDeviceState {
    info: HidDeviceInfo,
    inbox: Mutex<VecDeque<Vec<u8>>>,
    connected: AtomicBool,
    /// While true, writes wait on `gate_cv`
    write_gate: Mutex<bool>,
    gate_cv: Condvar,
    fail_writes: AtomicBool,
    /// Writes still to fail before `fail_writes` applies again
    fail_next_writes: AtomicUsize,
    fail_reads: AtomicBool,
    fail_close: AtomicBool,
    fail_open: AtomicBool,
    /// Answer status requests with a status report carrying these flags
    auto_status: AtomicBool,
    status_flags: AtomicU8,
    opens: AtomicUsize,
    closes: AtomicUsize,
    writes: Mutex<Vec<Vec<u8>>>,
    log: WriteLog,
}

/// Scripting handle for a simulated device
#[derive(Clone)]
pub struct SimDevice(Arc<SimDeviceState>);

impl SimDevice {
    pub fn path(&self) -> &str {
        &self.0.info.path
    }

    /// Queue an input report for the host to read
    pub fn push_report(&self, report: &[u8]) {
        self.0.inbox.lock().push_back(report.to_vec());
    }

    /// Input reports not yet read by the host
    pub fn pending_reports(&self) -> usize {
        self.0.inbox.lock().len()
    }

    /// Every report written to this device, in order
    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.0.writes.lock().clone()
    }

    pub fn clear_writes(&self) {
        self.0.writes.lock().clear();
    }

    /// Block (or release) every write until toggled back
    pub fn set_write_blocked(&self, blocked: bool) {
        *self.0.write_gate.lock() = blocked;
        self.0.gate_cv.notify_all();
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.0.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Fail only the next `count` writes
    pub fn set_fail_next_writes(&self, count: usize) {
        self.0.fail_next_writes.store(count, Ordering::SeqCst);
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.0.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_close(&self, fail: bool) {
        self.0.fail_close.store(fail, Ordering::SeqCst);
    }

    /// Keep the device enumerable but refuse to open it
    pub fn set_fail_open(&self, fail: bool) {
        self.0.fail_open.store(fail, Ordering::SeqCst);
    }

    /// Reply to every status request with a status report
    pub fn set_auto_status(&self, enabled: bool, flags: u8) {
        self.0.status_flags.store(flags, Ordering::SeqCst);
        self.0.auto_status.store(enabled, Ordering::SeqCst);
    }

    /// Remove the device from the bus: enumeration skips it and reads fail
    pub fn unplug(&self) {
        self.0.connected.store(false, Ordering::SeqCst);
    }

    pub fn replug(&self) {
        self.0.connected.store(true, Ordering::SeqCst);
    }

    /// Number of times the host opened this device
    pub fn open_count(&self) -> usize {
        self.0.opens.load(Ordering::SeqCst)
    }

    /// Number of successful closes
    pub fn close_count(&self) -> usize {
        self.0.closes.load(Ordering::SeqCst)
    }
}

/// Simulated HID bus
#[derive(Default)]
pub struct SimTransport {
    devices: Mutex<Vec<SimDevice>>,
    log: WriteLog,
}

impl SimTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Plug in a device with the given path, product id and product string
    pub fn add_device(&self, path: &str, product_id: u16, product_string: &str) -> SimDevice {
        let device = SimDevice(Arc::new(SimDeviceState {
            info: HidDeviceInfo {
                path: path.to_string(),
                vendor_id: VENDOR_ID_NINTENDO,
                product_id,
                product_string: Some(product_string.to_string()),
                serial_number: None,
            },
            inbox: Mutex::new(VecDeque::new()),
            connected: AtomicBool::new(true),
            write_gate: Mutex::new(false),
            gate_cv: Condvar::new(),
            fail_writes: AtomicBool::new(false),
            fail_next_writes: AtomicUsize::new(0),
            fail_reads: AtomicBool::new(false),
            fail_close: AtomicBool::new(false),
            fail_open: AtomicBool::new(false),
            auto_status: AtomicBool::new(false),
            status_flags: AtomicU8::new(0),
            opens: AtomicUsize::new(0),
            closes: AtomicUsize::new(0),
            writes: Mutex::new(Vec::new()),
            log: Arc::clone(&self.log),
        }));
        self.devices.lock().push(device.clone());
        device
    }

    /// Plug in an original Wii Remote
    pub fn add_wiimote(&self, path: &str) -> SimDevice {
        self.add_device(path, protocol::PRODUCT_ID_WIIMOTE, "Nintendo RVL-CNT-01")
    }

    /// Every write across all devices, in the order the bus saw them
    pub fn write_log(&self) -> Vec<WriteRecord> {
        self.log.lock().clone()
    }
}

impl HidTransport for SimTransport {
    fn enumerate(&self, vendor_id: u16, product_id: u16) -> Result<Vec<HidDeviceInfo>, TransportError> {
        Ok(self
            .devices
            .lock()
            .iter()
            .filter(|d| d.0.connected.load(Ordering::SeqCst))
            .filter(|d| d.0.info.vendor_id == vendor_id && d.0.info.product_id == product_id)
            .map(|d| d.0.info.clone())
            .collect())
    }

    fn open(&self, info: &HidDeviceInfo) -> Result<Arc<dyn HidHandle>, TransportError> {
        let device = self
            .devices
            .lock()
            .iter()
            .find(|d| d.0.info.path == info.path && d.0.connected.load(Ordering::SeqCst))
            .cloned()
            .ok_or_else(|| TransportError::Open {
                path: info.path.clone(),
                message: "no such device".to_string(),
            })?;
        if device.0.fail_open.load(Ordering::SeqCst) {
            return Err(TransportError::Open {
                path: info.path.clone(),
                message: "simulated open failure".to_string(),
            });
        }

        device.0.opens.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(SimHandle {
            state: device.0,
            open: AtomicBool::new(true),
            io: Mutex::new(()),
        }))
    }
}

struct SimHandle {
    state: Arc<SimDeviceState>,
    open: AtomicBool,
    /// Held for the whole of a write, blocked or not, like the native handle lock
    io: Mutex<()>,
}

impl SimHandle {
    fn write_err(&self, message: &str) -> TransportError {
        TransportError::Write {
            path: self.state.info.path.clone(),
            message: message.to_string(),
        }
    }

    fn finish_write(&self, data: &[u8]) -> Result<usize, TransportError> {
        if !self.is_open() {
            return Err(TransportError::Closed(self.state.info.path.clone()));
        }
        if !self.state.connected.load(Ordering::SeqCst) {
            return Err(self.write_err("device disconnected"));
        }
        let fail_next = self
            .state
            .fail_next_writes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if fail_next || self.state.fail_writes.load(Ordering::SeqCst) {
            return Err(self.write_err("simulated write failure"));
        }

        trace!("sim write {} {:02x?}", self.state.info.path, data);
        self.state.writes.lock().push(data.to_vec());
        self.state.log.lock().push(WriteRecord {
            path: self.state.info.path.clone(),
            data: data.to_vec(),
            at: Instant::now(),
        });

        if data.first() == Some(&protocol::output::STATUS_REQUEST)
            && self.state.auto_status.load(Ordering::SeqCst)
        {
            let flags = self.state.status_flags.load(Ordering::SeqCst);
            self.state
                .inbox
                .lock()
                .push_back(vec![0x20, 0x00, 0x00, flags, 0x00, 0x00, 0xC0]);
        }

        Ok(data.len())
    }
}

impl HidHandle for SimHandle {
    fn path(&self) -> &str {
        &self.state.info.path
    }

    fn read(&self, buf: &mut [u8]) -> Result<usize, TransportError> {
        if !self.is_open() {
            return Err(TransportError::Closed(self.state.info.path.clone()));
        }
        if !self.state.connected.load(Ordering::SeqCst) || self.state.fail_reads.load(Ordering::SeqCst) {
            return Err(TransportError::Read {
                path: self.state.info.path.clone(),
                message: "device disconnected".to_string(),
            });
        }
        let Some(_io) = self.io.try_lock() else {
            return Ok(0);
        };

        match self.state.inbox.lock().pop_front() {
            Some(report) => {
                let len = report.len().min(buf.len());
                buf[..len].copy_from_slice(&report[..len]);
                Ok(len)
            }
            None => Ok(0),
        }
    }

    fn write(&self, data: &[u8]) -> Result<usize, TransportError> {
        let _io = self.io.lock();
        {
            let mut blocked = self.state.write_gate.lock();
            while *blocked {
                self.state.gate_cv.wait(&mut blocked);
            }
        }
        self.finish_write(data)
    }

    fn write_timeout(&self, data: &[u8], timeout: Duration) -> Result<usize, TransportError> {
        let deadline = Instant::now() + timeout;
        let _io = self
            .io
            .try_lock_until(deadline)
            .ok_or_else(|| TransportError::Busy(self.state.info.path.clone()))?;
        {
            let mut blocked = self.state.write_gate.lock();
            while *blocked {
                if self.state.gate_cv.wait_until(&mut blocked, deadline).timed_out() {
                    return Err(TransportError::Busy(self.state.info.path.clone()));
                }
            }
        }
        self.finish_write(data)
    }

    fn close(&self) -> Result<(), TransportError> {
        if self.state.fail_close.load(Ordering::SeqCst) {
            return Err(TransportError::Close {
                path: self.state.info.path.clone(),
                message: "simulated close failure".to_string(),
            });
        }
        if self.open.swap(false, Ordering::SeqCst) {
            self.state.closes.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }
}
