//! HID transport binding
//!
//! [`HidTransport`] enumerates and opens devices, [`HidHandle`] is one open
//! connection. Handles are shared between the client thread (reads) and the
//! writer thread (writes), so they are `Send + Sync` and used through `Arc`.

use hidapi::{HidApi, HidDevice};
use parking_lot::Mutex;
use serde::Serialize;
use std::ffi::CString;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, trace};

/// How long `close` waits for a concurrent write to finish
const CLOSE_LOCK_TIMEOUT: Duration = Duration::from_millis(250);

/// Errors reported by the transport
#[derive(Debug, Error)]
pub enum TransportError {
    /// The HID library could not be initialised
    #[error("failed to initialize HID API: {0}")]
    Init(String),
    /// Enumeration failed
    #[error("HID enumeration failed: {0}")]
    Enumerate(String),
    /// Opening a device path failed
    #[error("failed to open {path}: {message}")]
    Open { path: String, message: String },
    /// Read failed (usually the device went away)
    #[error("read from {path} failed: {message}")]
    Read { path: String, message: String },
    /// Write failed
    #[error("write to {path} failed: {message}")]
    Write { path: String, message: String },
    /// Close failed
    #[error("close of {path} failed: {message}")]
    Close { path: String, message: String },
    /// The handle has already been closed
    #[error("handle {0} is closed")]
    Closed(String),
    /// The handle is held by another thread for longer than allowed
    #[error("handle {0} is busy")]
    Busy(String),
}

/// One entry of an enumeration result
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HidDeviceInfo {
    /// Platform enumeration path, unique per physical connection
    pub path: String,
    pub vendor_id: u16,
    pub product_id: u16,
    pub product_string: Option<String>,
    pub serial_number: Option<String>,
}

/// Device enumeration and opening
pub trait HidTransport: Send + Sync {
    /// List devices matching the given ids. No match is an empty list, not an error.
    fn enumerate(&self, vendor_id: u16, product_id: u16) -> Result<Vec<HidDeviceInfo>, TransportError>;

    /// Open the device at `info.path`. The returned handle reads non-blocking.
    fn open(&self, info: &HidDeviceInfo) -> Result<Arc<dyn HidHandle>, TransportError>;
}

/// An open device connection
pub trait HidHandle: Send + Sync {
    /// Enumeration path this handle was opened from
    fn path(&self) -> &str;

    /// Non-blocking read of one report. `Ok(0)` means nothing is pending, or
    /// that a write on another thread currently holds the handle.
    fn read(&self, buf: &mut [u8]) -> Result<usize, TransportError>;

    /// Blocking write of one report, returns the number of bytes written
    fn write(&self, data: &[u8]) -> Result<usize, TransportError>;

    /// Write that gives up with [`TransportError::Busy`] if another thread holds
    /// the handle for longer than `timeout`
    fn write_timeout(&self, data: &[u8], timeout: Duration) -> Result<usize, TransportError>;

    /// Release the native handle. Closing twice is a no-op.
    fn close(&self) -> Result<(), TransportError>;

    /// Whether the native handle is still open
    fn is_open(&self) -> bool;
}

/// Transport backed by the `hidapi` crate
pub struct HidApiTransport {
    api: Mutex<HidApi>,
}

impl HidApiTransport {
    /// Initialise the native HID library
    pub fn new() -> Result<Self, TransportError> {
        let api = HidApi::new().map_err(|e| TransportError::Init(e.to_string()))?;
        Ok(Self {
            api: Mutex::new(api),
        })
    }
}

impl HidTransport for HidApiTransport {
    fn enumerate(&self, vendor_id: u16, product_id: u16) -> Result<Vec<HidDeviceInfo>, TransportError> {
        let mut api = self.api.lock();

        // Refresh device list to see newly connected devices
        api.refresh_devices()
            .map_err(|e| TransportError::Enumerate(e.to_string()))?;

        let found: Vec<HidDeviceInfo> = api
            .device_list()
            .filter(|d| d.vendor_id() == vendor_id && d.product_id() == product_id)
            .map(|d| HidDeviceInfo {
                path: d.path().to_string_lossy().into_owned(),
                vendor_id: d.vendor_id(),
                product_id: d.product_id(),
                product_string: d.product_string().map(str::to_string),
                serial_number: d.serial_number().map(str::to_string),
            })
            .collect();

        debug!(
            "Enumerated {} device(s) for {:04X}:{:04X}",
            found.len(),
            vendor_id,
            product_id
        );
        Ok(found)
    }

    fn open(&self, info: &HidDeviceInfo) -> Result<Arc<dyn HidHandle>, TransportError> {
        let open_err = |message: String| TransportError::Open {
            path: info.path.clone(),
            message,
        };

        let c_path = CString::new(info.path.as_str()).map_err(|e| open_err(e.to_string()))?;
        let device = {
            let api = self.api.lock();
            api.open_path(&c_path).map_err(|e| open_err(e.to_string()))?
        };

        // Reads are polled once per tick and must never stall the caller
        device
            .set_blocking_mode(false)
            .map_err(|e| open_err(format!("failed to set non-blocking mode: {}", e)))?;

        Ok(Arc::new(HidApiHandle {
            path: info.path.clone(),
            device: Mutex::new(Some(device)),
            open: AtomicBool::new(true),
        }))
    }
}

/// Handle backed by an open `hidapi::HidDevice`
pub struct HidApiHandle {
    path: String,
    device: Mutex<Option<HidDevice>>,
    /// Mirrors `device.is_some()` without taking the lock a blocked write may hold
    open: AtomicBool,
}

impl HidApiHandle {
    fn write_locked(&self, device: &Option<HidDevice>, data: &[u8]) -> Result<usize, TransportError> {
        let device = device
            .as_ref()
            .ok_or_else(|| TransportError::Closed(self.path.clone()))?;
        device.write(data).map_err(|e| TransportError::Write {
            path: self.path.clone(),
            message: e.to_string(),
        })
    }
}

impl HidHandle for HidApiHandle {
    fn path(&self) -> &str {
        &self.path
    }

    fn read(&self, buf: &mut [u8]) -> Result<usize, TransportError> {
        // The writer thread holds the lock for the length of a write, which can
        // block indefinitely; report nothing pending and retry next tick
        let Some(guard) = self.device.try_lock() else {
            if !self.is_open() {
                return Err(TransportError::Closed(self.path.clone()));
            }
            trace!("{}: read skipped, write in progress", self.path);
            return Ok(0);
        };
        let device = guard
            .as_ref()
            .ok_or_else(|| TransportError::Closed(self.path.clone()))?;
        device.read(buf).map_err(|e| TransportError::Read {
            path: self.path.clone(),
            message: e.to_string(),
        })
    }

    fn write(&self, data: &[u8]) -> Result<usize, TransportError> {
        let guard = self.device.lock();
        self.write_locked(&guard, data)
    }

    fn write_timeout(&self, data: &[u8], timeout: Duration) -> Result<usize, TransportError> {
        let guard = self
            .device
            .try_lock_for(timeout)
            .ok_or_else(|| TransportError::Busy(self.path.clone()))?;
        self.write_locked(&guard, data)
    }

    fn close(&self) -> Result<(), TransportError> {
        if !self.open.swap(false, Ordering::SeqCst) {
            return Ok(());
        }
        // Dropping the HidDevice releases the native handle. A writer stuck in a
        // blocked write keeps the lock; the device is then released with the last Arc.
        match self.device.try_lock_for(CLOSE_LOCK_TIMEOUT) {
            Some(mut guard) => {
                guard.take();
                debug!("Closed HID handle {}", self.path);
                Ok(())
            }
            None => Err(TransportError::Close {
                path: self.path.clone(),
                message: "handle busy in a pending write".to_string(),
            }),
        }
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }
}
