//! Decoded controller state

use crate::hid::protocol::LedPattern;
use serde::Serialize;
use tracing::warn;

/// Core button bits as carried in bytes 1-2 of every data report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ButtonState {
    pub d_left: bool,
    pub d_right: bool,
    pub d_down: bool,
    pub d_up: bool,
    pub plus: bool,
    pub two: bool,
    pub one: bool,
    pub b: bool,
    pub a: bool,
    pub minus: bool,
    pub home: bool,
}

impl ButtonState {
    #[rustfmt::skip]
    pub fn from_bytes([first, second]: [u8; 2]) -> Self {
        Self {
            d_left:  first  & 0x01 != 0,
            d_right: first  & 0x02 != 0,
            d_down:  first  & 0x04 != 0,
            d_up:    first  & 0x08 != 0,
            plus:    first  & 0x10 != 0,
            two:     second & 0x01 != 0,
            one:     second & 0x02 != 0,
            b:       second & 0x04 != 0,
            a:       second & 0x08 != 0,
            minus:   second & 0x10 != 0,
            home:    second & 0x80 != 0,
        }
    }

    pub fn any_pressed(&self) -> bool {
        *self != ButtonState::default()
    }
}

/// Zero-point and 1g readings per axis, 10-bit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AccelCalibration {
    pub zero: [u16; 3],
    pub one_g: [u16; 3],
}

impl Default for AccelCalibration {
    /// Typical factory values when the EEPROM block has not been read
    fn default() -> Self {
        Self {
            zero: [512; 3],
            one_g: [616; 3],
        }
    }
}

impl AccelCalibration {
    /// Decode the 10-byte EEPROM block at `0x0016`
    ///
    /// Bytes 0-2 and 4-6 hold bits 9..2 of the zero and 1g values, bytes 3 and 7
    /// pack the two low bits of each axis (X in bits 5-4, Y in 3-2, Z in 1-0),
    /// byte 9 is `(sum of bytes 0..9 + 0x55) & 0xFF`.
    pub fn from_eeprom(block: &[u8]) -> Option<Self> {
        if block.len() < 10 {
            return None;
        }

        let checksum = block[..9]
            .iter()
            .fold(0x55u8, |acc, &b| acc.wrapping_add(b));
        if checksum != block[9] {
            warn!(
                "Accelerometer calibration checksum mismatch (0x{:02X} != 0x{:02X})",
                checksum, block[9]
            );
            return None;
        }

        let decode = |base: &[u8], lsb: u8| -> [u16; 3] {
            [
                (u16::from(base[0]) << 2) | u16::from((lsb >> 4) & 0x03),
                (u16::from(base[1]) << 2) | u16::from((lsb >> 2) & 0x03),
                (u16::from(base[2]) << 2) | u16::from(lsb & 0x03),
            ]
        };

        Some(Self {
            zero: decode(&block[0..3], block[3]),
            one_g: decode(&block[4..7], block[7]),
        })
    }

    /// Raw reading to g, per axis
    pub fn apply(&self, raw: [u16; 3]) -> [f32; 3] {
        std::array::from_fn(|i| {
            let span = f32::from(self.one_g[i]) - f32::from(self.zero[i]);
            if span == 0.0 {
                0.0
            } else {
                (f32::from(raw[i]) - f32::from(self.zero[i])) / span
            }
        })
    }
}

/// One tracked IR dot, camera coordinates (x 0-1023, y 0-767)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IrDot {
    pub x: u16,
    pub y: u16,
    /// Only reported in extended mode
    pub size: Option<u8>,
}

/// Up to four dots seen by the IR camera
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct IrState {
    pub dots: [Option<IrDot>; 4],
}

const IR_MAX_X: f32 = 1023.0;
const IR_MAX_Y: f32 = 767.0;

impl IrState {
    /// Decode 10 basic-mode bytes: two 5-byte groups, each carrying two dots
    pub fn from_basic(bytes: &[u8]) -> Self {
        let mut dots = [None; 4];
        for (group, chunk) in bytes.chunks_exact(5).take(2).enumerate() {
            let hi = chunk[2];
            let first = (
                u16::from(chunk[0]) | (u16::from(hi & 0x30) << 4),
                u16::from(chunk[1]) | (u16::from(hi & 0xC0) << 2),
            );
            let second = (
                u16::from(chunk[3]) | (u16::from(hi & 0x03) << 8),
                u16::from(chunk[4]) | (u16::from(hi & 0x0C) << 6),
            );
            dots[group * 2] = basic_dot(first);
            dots[group * 2 + 1] = basic_dot(second);
        }
        Self { dots }
    }

    /// Decode 12 extended-mode bytes: four 3-byte dots with size
    pub fn from_extended(bytes: &[u8]) -> Self {
        let mut dots = [None; 4];
        for (i, chunk) in bytes.chunks_exact(3).take(4).enumerate() {
            if chunk == [0xFF, 0xFF, 0xFF] {
                continue;
            }
            let b = chunk[2];
            dots[i] = Some(IrDot {
                x: u16::from(chunk[0]) | (u16::from(b & 0x30) << 4),
                y: u16::from(chunk[1]) | (u16::from(b & 0xC0) << 2),
                size: Some(b & 0x0F),
            });
        }
        Self { dots }
    }

    pub fn visible(&self) -> impl Iterator<Item = &IrDot> {
        self.dots.iter().flatten()
    }

    /// Normalised (0..1) pointer position: midpoint of the first two visible
    /// dots, X mirrored because the camera faces the sensor bar
    pub fn pointing_position(&self) -> Option<[f32; 2]> {
        let mut visible = self.visible();
        let a = visible.next()?;
        let b = visible.next()?;
        let mid_x = (f32::from(a.x) + f32::from(b.x)) / 2.0;
        let mid_y = (f32::from(a.y) + f32::from(b.y)) / 2.0;
        Some([1.0 - mid_x / IR_MAX_X, mid_y / IR_MAX_Y])
    }
}

fn basic_dot((x, y): (u16, u16)) -> Option<IrDot> {
    if x == 0x3FF && y == 0x3FF {
        None
    } else {
        Some(IrDot { x, y, size: None })
    }
}

/// Contents of a status report (`0x20`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct StatusInfo {
    /// Raw battery level, 0-255
    pub battery_level: u8,
    pub battery_low: bool,
    pub extension_connected: bool,
    pub speaker_enabled: bool,
    pub ir_enabled: bool,
    pub leds: LedPattern,
}

impl StatusInfo {
    pub fn from_report(flags: u8, battery_level: u8) -> Self {
        Self {
            battery_level,
            battery_low: flags & 0x01 != 0,
            extension_connected: flags & 0x02 != 0,
            speaker_enabled: flags & 0x04 != 0,
            ir_enabled: flags & 0x08 != 0,
            leds: LedPattern::from_nibble(flags >> 4),
        }
    }

    /// Battery level as a 0..1 fraction
    pub fn battery_fraction(&self) -> f32 {
        f32::from(self.battery_level) / 255.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_button_bits() {
        let state = ButtonState::from_bytes([0x08, 0x08]);
        assert!(state.d_up);
        assert!(state.a);
        assert!(!state.b);

        let all = ButtonState::from_bytes([0x1F, 0x9F]);
        assert!(all.d_left && all.d_right && all.d_down && all.d_up && all.plus);
        assert!(all.two && all.one && all.b && all.a && all.minus && all.home);

        assert!(!ButtonState::from_bytes([0x60, 0x60]).any_pressed());
    }

    #[test]
    fn test_calibration_from_eeprom() {
        // zero = 0x80<<2 | lsb, one_g = 0x9A<<2 | lsb
        let mut block = vec![0x80, 0x80, 0x80, 0b0001_1011, 0x9A, 0x9A, 0x9A, 0x00, 0x40];
        let checksum = block.iter().fold(0x55u8, |acc, &b| acc.wrapping_add(b));
        block.push(checksum);

        let calibration = AccelCalibration::from_eeprom(&block).unwrap();
        assert_eq!(calibration.zero, [513, 514, 515]);
        assert_eq!(calibration.one_g, [616, 616, 616]);
    }

    #[test]
    fn test_calibration_bad_checksum() {
        let block = [0x80, 0x80, 0x80, 0x00, 0x9A, 0x9A, 0x9A, 0x00, 0x40, 0x00];
        assert!(AccelCalibration::from_eeprom(&block).is_none());
        assert!(AccelCalibration::from_eeprom(&block[..4]).is_none());
    }

    #[test]
    fn test_calibration_apply() {
        let calibration = AccelCalibration::default();
        assert_eq!(calibration.apply([512, 616, 408]), [0.0, 1.0, -1.0]);
    }

    #[test]
    fn test_ir_basic() {
        // Dot 0 at (0x164, 0x2A0), dot 1 missing; second group empty
        let bytes = [0x64, 0xA0, 0b1001_1111, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF];
        let ir = IrState::from_basic(&bytes);
        assert_eq!(ir.dots[0], Some(IrDot { x: 0x164, y: 0x2A0, size: None }));
        assert_eq!(ir.dots[1], None);
        assert_eq!(ir.visible().count(), 1);
        assert!(ir.pointing_position().is_none());
    }

    #[test]
    fn test_ir_extended_and_pointing() {
        let bytes = [
            0x00, 0x00, 0x13, // (256, 0) size 3
            0xFF, 0x00, 0x22, // (767, 0) size 2
            0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF,
        ];
        let ir = IrState::from_extended(&bytes);
        assert_eq!(ir.dots[0], Some(IrDot { x: 256, y: 0, size: Some(3) }));
        assert_eq!(ir.dots[1], Some(IrDot { x: 767, y: 0, size: Some(2) }));
        assert!(ir.dots[2].is_none() && ir.dots[3].is_none());

        let [x, y] = ir.pointing_position().unwrap();
        assert!((x - (1.0 - 511.5 / 1023.0)).abs() < 1e-6);
        assert_eq!(y, 0.0);
    }

    #[test]
    fn test_status_flags() {
        let status = StatusInfo::from_report(0x12, 0xC8);
        assert!(status.extension_connected);
        assert!(!status.battery_low);
        assert_eq!(status.leds, LedPattern::new(true, false, false, false));
        assert_eq!(status.battery_level, 0xC8);
    }
}
