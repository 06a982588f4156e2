//! Wii Remote HID layer
//!
//! Talks to Wii Remotes, Wii Remote Plus and Wii U Pro Controllers over HID.
//!
//! # Features
//! - Discovers remotes by vendor/product id and tracks each connection by path
//! - Sends every output report through one rate-limited writer thread
//! - Decodes buttons, accelerometer, IR camera, status and extension reports
//! - Derives per-tick button down/up edges for game logic
//! - Shuts down in a fixed order so rumble and LEDs never outlive the process

pub mod core;
pub mod hid;
pub mod input;
pub mod wiimote;

pub use core::config::Config;
pub use core::events::{DeviceEvent, EventSender};
pub use core::lifecycle::{ShutdownCoordinator, ShutdownReport};
pub use hid::WiimoteManager;
pub use input::{Button, InputManager};
pub use wiimote::Wiimote;
