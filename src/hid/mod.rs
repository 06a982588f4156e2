//! HID module - Wii Remote transport, output commands and the write scheduler

pub mod commands;
pub mod manager;
pub mod protocol;
pub mod sim;
pub mod transport;
pub mod writer;

pub use manager::WiimoteManager;
pub use protocol::{DataReportMode, DeviceKind, IrMode, LedPattern};
pub use sim::{SimDevice, SimTransport};
pub use transport::{HidApiTransport, HidDeviceInfo, HidHandle, HidTransport, TransportError};
pub use writer::{SchedulerError, StopOutcome, WriteScheduler, WriterConfig};
