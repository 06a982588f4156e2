//! MotionPlus gyroscope
//!
//! An inactive MotionPlus answers at `0xA600FA` with `.. 00 A6 20 00 05`.
//! After activation it identifies as an extension (`.. 00 A4 20 04 05`) and
//! its 6-byte payload carries three 14-bit angular rates.

use serde::Serialize;

/// Raw units per deg/s in slow (precise) mode
pub const SLOW_SCALE: f32 = 8192.0 / 595.0;
/// Raw units per deg/s in fast mode, which covers 2000 deg/s instead of 440
pub const FAST_SCALE: f32 = SLOW_SCALE / (2000.0 / 440.0);
/// Raw value of a still axis until zero values are captured
pub const DEFAULT_ZERO: u16 = 8192;
/// Payload rate the offset integration assumes, in reports per second
pub const REPORT_RATE_HZ: f32 = 95.0;

/// Whether `id`, read from `0xA600FA`, is an attached but inactive MotionPlus
pub fn is_inactive_id(id: [u8; 6]) -> bool {
    matches!(id, [_, 0x00, 0xA6, 0x20, 0x00, 0x05])
}

/// One MotionPlus payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct MotionPlusData {
    pub yaw: u16,
    pub roll: u16,
    pub pitch: u16,
    pub yaw_slow: bool,
    pub roll_slow: bool,
    pub pitch_slow: bool,
    /// Another extension is plugged into the MotionPlus
    pub extension_connected: bool,
}

impl MotionPlusData {
    /// `None` for short buffers and for frames without the MotionPlus flag
    #[rustfmt::skip]
    pub fn decode(bytes: &[u8]) -> Option<Self> {
        let b: &[u8; 6] = bytes.get(..6)?.try_into().ok()?;
        if b[5] & 0x02 == 0 {
            return None;
        }
        let axis = |lo: u8, hi: u8| u16::from(lo) | (u16::from(hi & 0xFC) << 6);
        Some(Self {
            yaw:   axis(b[0], b[3]),
            roll:  axis(b[1], b[4]),
            pitch: axis(b[2], b[5]),
            yaw_slow:   b[3] & 0x02 != 0,
            pitch_slow: b[3] & 0x01 != 0,
            roll_slow:  b[4] & 0x02 != 0,
            extension_connected: b[4] & 0x01 != 0,
        })
    }

    pub fn raw(&self) -> [u16; 3] {
        [self.yaw, self.roll, self.pitch]
    }
}

/// Angular rates in deg/s
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct AngularSpeed {
    pub yaw: f32,
    pub roll: f32,
    pub pitch: f32,
}

fn axis_speed(raw: u16, zero: u16, slow: bool) -> f32 {
    let scale = if slow { SLOW_SCALE } else { FAST_SCALE };
    (f32::from(raw) - f32::from(zero)) / scale
}

/// Attachment, activation and integrated rotation of one remote's MotionPlus
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MotionPlus {
    attached: bool,
    activated: bool,
    data: Option<MotionPlusData>,
    /// Still readings as `[yaw, roll, pitch]`
    zero: [u16; 3],
    /// Integrated `[-pitch, yaw, roll]` in degrees
    offset: [f32; 3],
}

impl Default for MotionPlus {
    fn default() -> Self {
        Self {
            attached: false,
            activated: false,
            data: None,
            zero: [DEFAULT_ZERO; 3],
            offset: [0.0; 3],
        }
    }
}

impl MotionPlus {
    pub fn attached(&self) -> bool {
        self.attached
    }

    pub fn activated(&self) -> bool {
        self.activated
    }

    pub fn data(&self) -> Option<&MotionPlusData> {
        self.data.as_ref()
    }

    pub fn zero(&self) -> [u16; 3] {
        self.zero
    }

    pub fn offset(&self) -> [f32; 3] {
        self.offset
    }

    pub(crate) fn set_attached(&mut self, attached: bool) {
        self.attached = attached;
    }

    pub(crate) fn set_activated(&mut self) {
        self.activated = true;
    }

    /// Current rates, zero before the first payload
    pub fn speed(&self) -> AngularSpeed {
        let Some(data) = self.data else {
            return AngularSpeed::default();
        };
        let [yaw_zero, roll_zero, pitch_zero] = self.zero;
        AngularSpeed {
            yaw: axis_speed(data.yaw, yaw_zero, data.yaw_slow),
            roll: axis_speed(data.roll, roll_zero, data.roll_slow),
            pitch: axis_speed(data.pitch, pitch_zero, data.pitch_slow),
        }
    }

    /// Take a payload and integrate it into the offset
    pub fn update(&mut self, data: MotionPlusData) {
        self.data = Some(data);
        let speed = self.speed();
        self.offset[0] -= speed.pitch / REPORT_RATE_HZ;
        self.offset[1] += speed.yaw / REPORT_RATE_HZ;
        self.offset[2] += speed.roll / REPORT_RATE_HZ;
    }

    /// Treat the current readings as still and clear the offset
    pub fn recalibrate(&mut self) {
        if let Some(data) = self.data {
            self.zero = data.raw();
        }
        self.offset = [0.0; 3];
    }

    /// Forget the payload and activation; attachment must be checked again
    pub(crate) fn detach(&mut self) {
        *self = Self {
            zero: self.zero,
            ..Self::default()
        };
    }
}
