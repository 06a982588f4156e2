//! Input report decoding
//!
//! [`parse_report`] is pure: it splits a raw report into its typed pieces and
//! leaves interpretation (calibration, extension identity, follow-up commands)
//! to [`super::Wiimote`].

use super::state::{ButtonState, IrState, StatusInfo};
use crate::hid::protocol::InputReport;
use tracing::trace;

/// A decoded input report
#[derive(Debug, Clone, PartialEq)]
pub enum Report<'a> {
    /// `0x20`
    Status {
        buttons: ButtonState,
        status: StatusInfo,
    },
    /// `0x21`: up to 16 bytes from memory/registers
    ReadMemory {
        buttons: ButtonState,
        /// Low 16 bits of the address the data starts at
        address: u16,
        /// Error nibble, 0 on success
        error: u8,
        data: &'a [u8],
    },
    /// `0x22`
    Acknowledge {
        buttons: ButtonState,
        report: u8,
        error: u8,
    },
    /// `0x30`-`0x37`, `0x3D`
    Data(DataReport<'a>),
}

/// Contents of a data report; absent fields were not part of the layout
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DataReport<'a> {
    pub buttons: Option<ButtonState>,
    /// 10-bit raw accelerometer
    pub accel: Option<[u16; 3]>,
    pub ir: Option<IrState>,
    pub extension: Option<&'a [u8]>,
}

/// Decode one input report. Unknown ids and truncated reports yield `None`.
pub fn parse_report(buf: &[u8]) -> Option<Report<'_>> {
    let (&id, _) = buf.split_first()?;
    let Some(kind) = InputReport::from_byte(id) else {
        trace!("Skipping unknown report 0x{:02X}", id);
        return None;
    };
    if buf.len() < kind.min_len() {
        trace!(
            "Skipping truncated report 0x{:02X} ({} < {} bytes)",
            id,
            buf.len(),
            kind.min_len()
        );
        return None;
    }

    let buttons = ButtonState::from_bytes([buf[1], buf[2]]);
    let accel = || decode_accel(buf);

    let report = match kind {
        InputReport::Status => Report::Status {
            buttons,
            status: StatusInfo::from_report(buf[3], buf[6]),
        },
        InputReport::ReadMemory => {
            let size = usize::from(buf[3] >> 4) + 1;
            Report::ReadMemory {
                buttons,
                address: u16::from_be_bytes([buf[4], buf[5]]),
                error: buf[3] & 0x0F,
                data: &buf[6..6 + size],
            }
        }
        InputReport::Acknowledge => Report::Acknowledge {
            buttons,
            report: buf[3],
            error: buf[4],
        },
        InputReport::Buttons => Report::Data(DataReport {
            buttons: Some(buttons),
            ..Default::default()
        }),
        InputReport::ButtonsAccel => Report::Data(DataReport {
            buttons: Some(buttons),
            accel: Some(accel()),
            ..Default::default()
        }),
        InputReport::ButtonsExt8 => Report::Data(DataReport {
            buttons: Some(buttons),
            extension: Some(&buf[3..11]),
            ..Default::default()
        }),
        InputReport::ButtonsAccelIr12 => Report::Data(DataReport {
            buttons: Some(buttons),
            accel: Some(accel()),
            ir: Some(IrState::from_extended(&buf[6..18])),
            extension: None,
        }),
        InputReport::ButtonsExt19 => Report::Data(DataReport {
            buttons: Some(buttons),
            extension: Some(&buf[3..22]),
            ..Default::default()
        }),
        InputReport::ButtonsAccelExt16 => Report::Data(DataReport {
            buttons: Some(buttons),
            accel: Some(accel()),
            extension: Some(&buf[6..22]),
            ..Default::default()
        }),
        InputReport::ButtonsIr10Ext9 => Report::Data(DataReport {
            buttons: Some(buttons),
            ir: Some(IrState::from_basic(&buf[3..13])),
            extension: Some(&buf[13..22]),
            ..Default::default()
        }),
        InputReport::ButtonsAccelIr10Ext6 => Report::Data(DataReport {
            buttons: Some(buttons),
            accel: Some(accel()),
            ir: Some(IrState::from_basic(&buf[6..16])),
            extension: Some(&buf[16..22]),
        }),
        InputReport::Ext21 => Report::Data(DataReport {
            extension: Some(&buf[1..22]),
            ..Default::default()
        }),
    };
    Some(report)
}

/// Rebuild the 10-bit axes: bytes 3-5 hold bits 9..2, the button bytes carry
/// X bits 1..0 and the Y/Z bit 1 (Y/Z bit 0 is not transmitted)
fn decode_accel(buf: &[u8]) -> [u16; 3] {
    let (b1, b2) = (buf[1], buf[2]);
    [
        (u16::from(buf[3]) << 2) | u16::from((b1 >> 5) & 0x03),
        (u16::from(buf[4]) << 2) | u16::from((b2 >> 4) & 0x02),
        (u16::from(buf[5]) << 2) | u16::from((b2 >> 5) & 0x02),
    ]
}
