//! Extension controller identification and payload decoding
//!
//! Extensions plug into the remote's expansion port (or, for the Pro Controller,
//! are emulated by it). Once initialised unencrypted, the 6-byte identifier at
//! `0xA400FA` tells them apart; their payload then arrives in the extension
//! bytes of data reports `0x32`, `0x34`-`0x37` and `0x3D`.

use super::motion_plus::MotionPlusData;
use serde::Serialize;
use std::fmt;

/// Identified extension type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtensionKind {
    Nunchuck,
    ClassicController,
    ProController,
    MotionPlus,
    /// Identifier not recognised; raw id kept for logging
    Unknown([u8; 6]),
}

impl ExtensionKind {
    /// Classify the identifier read from `0xA400FA`
    pub fn from_id(id: [u8; 6]) -> Self {
        match id {
            [_, 0x00, 0xA4, 0x20, 0x00, 0x00] => ExtensionKind::Nunchuck,
            [_, 0x00, 0xA4, 0x20, 0x01, 0x01] => ExtensionKind::ClassicController,
            [0x00, 0x00, 0xA4, 0x20, 0x01, 0x20] => ExtensionKind::ProController,
            [_, 0x00, 0xA4, 0x20, 0x04, 0x05] => ExtensionKind::MotionPlus,
            other => ExtensionKind::Unknown(other),
        }
    }

    /// Payload bytes needed to decode this extension
    pub fn payload_len(&self) -> usize {
        match self {
            ExtensionKind::ProController => 11,
            _ => 6,
        }
    }
}

impl fmt::Display for ExtensionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtensionKind::Nunchuck => f.write_str("Nunchuck"),
            ExtensionKind::ClassicController => f.write_str("Classic Controller"),
            ExtensionKind::ProController => f.write_str("Pro Controller"),
            ExtensionKind::MotionPlus => f.write_str("MotionPlus"),
            ExtensionKind::Unknown(id) => write!(f, "unknown extension {:02X?}", id),
        }
    }
}

/// Nunchuck payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct NunchuckData {
    /// Raw stick position, roughly 35-228 with centre near 128
    pub stick: [u8; 2],
    /// 10-bit accelerometer
    pub accel: [u16; 3],
    pub c: bool,
    pub z: bool,
}

impl NunchuckData {
    pub fn decode(bytes: &[u8]) -> Option<Self> {
        let b: &[u8; 6] = bytes.get(..6)?.try_into().ok()?;
        Some(Self {
            stick: [b[0], b[1]],
            accel: [
                (u16::from(b[2]) << 2) | u16::from((b[5] >> 2) & 0x03),
                (u16::from(b[3]) << 2) | u16::from((b[5] >> 4) & 0x03),
                (u16::from(b[4]) << 2) | u16::from((b[5] >> 6) & 0x03),
            ],
            // Active low
            z: b[5] & 0x01 == 0,
            c: b[5] & 0x02 == 0,
        })
    }
}

/// Button block shared by the Classic and Pro controllers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ClassicButtons {
    pub a: bool,
    pub b: bool,
    pub x: bool,
    pub y: bool,
    pub l: bool,
    pub r: bool,
    pub zl: bool,
    pub zr: bool,
    pub plus: bool,
    pub minus: bool,
    pub home: bool,
    pub d_up: bool,
    pub d_down: bool,
    pub d_left: bool,
    pub d_right: bool,
}

impl ClassicButtons {
    /// Decode the two active-low button bytes
    #[rustfmt::skip]
    fn from_bytes(first: u8, second: u8) -> Self {
        let first = !first;
        let second = !second;
        Self {
            d_right: first  & 0x80 != 0,
            d_down:  first  & 0x40 != 0,
            l:       first  & 0x20 != 0,
            minus:   first  & 0x10 != 0,
            home:    first  & 0x08 != 0,
            plus:    first  & 0x04 != 0,
            r:       first  & 0x02 != 0,
            zl:      second & 0x80 != 0,
            b:       second & 0x40 != 0,
            y:       second & 0x20 != 0,
            a:       second & 0x10 != 0,
            x:       second & 0x08 != 0,
            zr:      second & 0x04 != 0,
            d_left:  second & 0x02 != 0,
            d_up:    second & 0x01 != 0,
        }
    }
}

/// Classic Controller payload (default data format)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ClassicControllerData {
    /// 6-bit left stick
    pub left_stick: [u8; 2],
    /// 5-bit right stick
    pub right_stick: [u8; 2],
    /// 5-bit analog triggers
    pub left_trigger: u8,
    pub right_trigger: u8,
    pub buttons: ClassicButtons,
}

impl ClassicControllerData {
    pub fn decode(bytes: &[u8]) -> Option<Self> {
        let b: &[u8; 6] = bytes.get(..6)?.try_into().ok()?;
        let right_x = ((b[0] & 0xC0) >> 3) | ((b[1] & 0xC0) >> 5) | ((b[2] & 0x80) >> 7);
        Some(Self {
            left_stick: [b[0] & 0x3F, b[1] & 0x3F],
            right_stick: [right_x, b[2] & 0x1F],
            left_trigger: ((b[2] & 0x60) >> 2) | ((b[3] & 0xE0) >> 5),
            right_trigger: b[3] & 0x1F,
            buttons: ClassicButtons::from_bytes(b[4], b[5]),
        })
    }
}

/// Wii U Pro Controller payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ProControllerData {
    /// 12-bit sticks, centre near 2048
    pub left_stick: [u16; 2],
    pub right_stick: [u16; 2],
    pub buttons: ClassicButtons,
    pub left_stick_click: bool,
    pub right_stick_click: bool,
    pub charging: bool,
    pub usb_connected: bool,
}

impl ProControllerData {
    pub fn decode(bytes: &[u8]) -> Option<Self> {
        let b: &[u8; 11] = bytes.get(..11)?.try_into().ok()?;
        let axis = |lo: usize| u16::from(b[lo]) | (u16::from(b[lo + 1] & 0x0F) << 8);
        Some(Self {
            left_stick: [axis(0), axis(4)],
            right_stick: [axis(2), axis(6)],
            buttons: ClassicButtons::from_bytes(b[8], b[9]),
            right_stick_click: b[10] & 0x01 == 0,
            left_stick_click: b[10] & 0x02 == 0,
            charging: b[10] & 0x04 == 0,
            usb_connected: b[10] & 0x08 == 0,
        })
    }
}

/// Most recent decoded extension payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ExtensionData {
    Nunchuck(NunchuckData),
    ClassicController(ClassicControllerData),
    ProController(ProControllerData),
    MotionPlus(MotionPlusData),
}

impl ExtensionData {
    /// Decode `bytes` as the payload of `kind`. `None` when the kind has no
    /// decoder or the report did not carry enough extension bytes.
    pub fn decode(kind: ExtensionKind, bytes: &[u8]) -> Option<Self> {
        match kind {
            ExtensionKind::Nunchuck => NunchuckData::decode(bytes).map(ExtensionData::Nunchuck),
            ExtensionKind::ClassicController => {
                ClassicControllerData::decode(bytes).map(ExtensionData::ClassicController)
            }
            ExtensionKind::ProController => {
                ProControllerData::decode(bytes).map(ExtensionData::ProController)
            }
            ExtensionKind::MotionPlus => MotionPlusData::decode(bytes).map(ExtensionData::MotionPlus),
            ExtensionKind::Unknown(_) => None,
        }
    }
}
