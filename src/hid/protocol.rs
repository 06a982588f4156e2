//! Wii Remote HID protocol definitions
//!
//! Protocol as documented for the Wii Remote Bluetooth HID interface:
//! - Input reports: up to 22 bytes, report id at position 0
//! - Output reports: report id at position 0, byte 1 bit 0 is always the rumble flag
//! - Every data report carries the two core button bytes at positions 1-2

use serde::{Deserialize, Serialize};
use std::fmt;

/// Nintendo vendor id shared by every supported controller
pub const VENDOR_ID_NINTENDO: u16 = 0x057E;

/// Original Wii Remote (RVL-CNT-01)
pub const PRODUCT_ID_WIIMOTE: u16 = 0x0306;

/// Wii Remote Plus (RVL-CNT-01-TR); the Wii U Pro Controller shares this id
pub const PRODUCT_ID_WIIMOTE_PLUS: u16 = 0x0330;

/// Product string suffix that distinguishes a Wii U Pro Controller from a Wii Remote Plus
pub const PRO_CONTROLLER_SUFFIX: &str = "UC";

/// Largest input report the remote produces
pub const INPUT_REPORT_SIZE: usize = 22;

/// Register write payloads are always padded to this size
pub const WRITE_REGISTER_SIZE: usize = 22;

/// Maximum data bytes in a single register write
pub const MAX_REGISTER_DATA: usize = 16;

/// Output report ids (host → remote)
pub mod output {
    pub const RUMBLE: u8 = 0x10;
    pub const PLAYER_LEDS: u8 = 0x11;
    pub const DATA_REPORT_MODE: u8 = 0x12;
    pub const IR_PIXEL_CLOCK: u8 = 0x13;
    pub const SPEAKER_ENABLE: u8 = 0x14;
    pub const STATUS_REQUEST: u8 = 0x15;
    pub const WRITE_MEMORY: u8 = 0x16;
    pub const READ_MEMORY: u8 = 0x17;
    pub const SPEAKER_DATA: u8 = 0x18;
    pub const SPEAKER_MUTE: u8 = 0x19;
    pub const IR_CAMERA_ENABLE: u8 = 0x1A;
}

/// Register addresses used by the layer
pub mod register {
    /// Accelerometer calibration block in EEPROM (10 bytes)
    pub const ACCEL_CALIBRATION: u32 = 0x0016;
    pub const ACCEL_CALIBRATION_LEN: u16 = 10;

    pub const EXTENSION_INIT_1: u32 = 0xA4_00F0;
    pub const EXTENSION_INIT_2: u32 = 0xA4_00FB;
    /// Extension identifier (6 bytes)
    pub const EXTENSION_ID: u32 = 0xA4_00FA;
    pub const EXTENSION_ID_LEN: u16 = 6;

    /// MotionPlus registers, present only while it is inactive
    pub const MOTION_PLUS_INIT: u32 = 0xA6_00F0;
    pub const MOTION_PLUS_ID: u32 = 0xA6_00FA;
    pub const MOTION_PLUS_ACTIVATE: u32 = 0xA6_00FE;

    pub const IR_ENABLE: u32 = 0xB0_0030;
    pub const IR_SENSITIVITY_1: u32 = 0xB0_0000;
    pub const IR_SENSITIVITY_2: u32 = 0xB0_001A;
    pub const IR_MODE: u32 = 0xB0_0033;
}

/// Address space flag for register writes/reads (control registers rather than EEPROM)
pub const ADDRESS_SPACE_REGISTER: u8 = 0x04;

/// "Enable" flag for single-byte feature toggles and continuous reporting
pub const FLAG_ENABLE: u8 = 0x04;

/// IR camera sensitivity blocks (Wii "level 3", the console default)
pub const IR_SENSITIVITY_BLOCK_1: [u8; 9] = [0x02, 0x00, 0x00, 0x71, 0x01, 0x00, 0xAA, 0x00, 0x64];
pub const IR_SENSITIVITY_BLOCK_2: [u8; 2] = [0x63, 0x03];

/// Input report ids (remote → host)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum InputReport {
    /// Status information (battery, extension, LEDs)
    Status = 0x20,
    /// Memory/register read data
    ReadMemory = 0x21,
    /// Acknowledgement of an output report
    Acknowledge = 0x22,
    Buttons = 0x30,
    ButtonsAccel = 0x31,
    ButtonsExt8 = 0x32,
    ButtonsAccelIr12 = 0x33,
    ButtonsExt19 = 0x34,
    ButtonsAccelExt16 = 0x35,
    ButtonsIr10Ext9 = 0x36,
    ButtonsAccelIr10Ext6 = 0x37,
    Ext21 = 0x3D,
}

impl InputReport {
    /// Parse report id from byte
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x20 => Some(InputReport::Status),
            0x21 => Some(InputReport::ReadMemory),
            0x22 => Some(InputReport::Acknowledge),
            0x30 => Some(InputReport::Buttons),
            0x31 => Some(InputReport::ButtonsAccel),
            0x32 => Some(InputReport::ButtonsExt8),
            0x33 => Some(InputReport::ButtonsAccelIr12),
            0x34 => Some(InputReport::ButtonsExt19),
            0x35 => Some(InputReport::ButtonsAccelExt16),
            0x36 => Some(InputReport::ButtonsIr10Ext9),
            0x37 => Some(InputReport::ButtonsAccelIr10Ext6),
            0x3D => Some(InputReport::Ext21),
            _ => None,
        }
    }

    /// Minimum number of bytes (including the id) a valid report of this type carries
    pub fn min_len(self) -> usize {
        match self {
            InputReport::Status => 7,
            InputReport::ReadMemory => 22,
            InputReport::Acknowledge => 5,
            InputReport::Buttons => 3,
            InputReport::ButtonsAccel => 6,
            InputReport::ButtonsExt8 => 11,
            InputReport::ButtonsAccelIr12 => 18,
            InputReport::ButtonsExt19 => 22,
            InputReport::ButtonsAccelExt16 => 22,
            InputReport::ButtonsIr10Ext9 => 22,
            InputReport::ButtonsAccelIr10Ext6 => 22,
            InputReport::Ext21 => 22,
        }
    }
}

/// Data reporting modes selectable with output report `0x12`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum DataReportMode {
    /// Core buttons only
    #[default]
    Buttons = 0x30,
    /// Buttons + accelerometer
    ButtonsAccel = 0x31,
    /// Buttons + 8 extension bytes
    ButtonsExt8 = 0x32,
    /// Buttons + accelerometer + 12 IR bytes (extended IR)
    ButtonsAccelIr12 = 0x33,
    /// Buttons + 19 extension bytes
    ButtonsExt19 = 0x34,
    /// Buttons + accelerometer + 16 extension bytes
    ButtonsAccelExt16 = 0x35,
    /// Buttons + 10 IR bytes + 9 extension bytes
    ButtonsIr10Ext9 = 0x36,
    /// Buttons + accelerometer + 10 IR bytes (basic IR) + 6 extension bytes
    ButtonsAccelIr10Ext6 = 0x37,
    /// 21 extension bytes, no core buttons
    Ext21 = 0x3D,
}

impl DataReportMode {
    pub fn as_byte(&self) -> u8 {
        *self as u8
    }

    /// IR mode the camera must be configured with to fill this report's IR bytes
    pub fn ir_mode(&self) -> Option<IrMode> {
        match self {
            DataReportMode::ButtonsAccelIr12 => Some(IrMode::Extended),
            DataReportMode::ButtonsIr10Ext9 | DataReportMode::ButtonsAccelIr10Ext6 => {
                Some(IrMode::Basic)
            }
            _ => None,
        }
    }
}

impl fmt::Display for DataReportMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} (0x{:02X})", self, self.as_byte())
    }
}

/// IR camera data formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum IrMode {
    /// 10 bytes, 4 dots, position only
    #[default]
    Basic = 0x01,
    /// 12 bytes, 4 dots, position + size
    Extended = 0x03,
}

/// Hardware variant, decided at discovery time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceKind {
    /// Original Wii Remote
    Wiimote,
    /// Wii Remote Plus (built-in MotionPlus)
    WiimotePlus,
    /// Wii U Pro Controller (shares the Plus product id)
    ProController,
}

impl DeviceKind {
    /// Kind of a device found by a scan for `self`. The Pro Controller shares
    /// the Plus ids and is told apart by its product string suffix.
    pub fn refine(self, product_string: Option<&str>, pro_suffix: &str) -> Self {
        let is_pro = !pro_suffix.is_empty()
            && product_string.is_some_and(|s| s.trim_end().ends_with(pro_suffix));
        match self {
            DeviceKind::WiimotePlus if is_pro => DeviceKind::ProController,
            other => other,
        }
    }
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DeviceKind::Wiimote => "Wii Remote",
            DeviceKind::WiimotePlus => "Wii Remote Plus",
            DeviceKind::ProController => "Wii U Pro Controller",
        };
        f.write_str(name)
    }
}

/// Four player LEDs, LED 1 is the leftmost
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LedPattern(pub [bool; 4]);

impl LedPattern {
    pub const OFF: LedPattern = LedPattern([false; 4]);

    pub fn new(led1: bool, led2: bool, led3: bool, led4: bool) -> Self {
        Self([led1, led2, led3, led4])
    }

    /// Single LED lit (0-based index, out-of-range indexes light nothing)
    pub fn single(index: usize) -> Self {
        let mut leds = [false; 4];
        if let Some(led) = leds.get_mut(index) {
            *led = true;
        }
        Self(leds)
    }

    /// LED bits as they appear in the high nibble of the LED/status byte
    pub fn to_nibble(&self) -> u8 {
        self.0
            .iter()
            .enumerate()
            .fold(0u8, |acc, (i, &on)| if on { acc | (1 << i) } else { acc })
    }

    pub fn from_nibble(nibble: u8) -> Self {
        Self(std::array::from_fn(|i| nibble & (1 << i) != 0))
    }
}
