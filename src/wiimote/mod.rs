//! Per-device record: decoded state plus the output commands for one remote

pub mod extension;
pub mod motion_plus;
pub mod parser;
pub mod state;

pub use extension::{
    ClassicButtons, ClassicControllerData, ExtensionData, ExtensionKind, NunchuckData,
    ProControllerData,
};
pub use motion_plus::{AngularSpeed, MotionPlus, MotionPlusData};
pub use parser::{parse_report, DataReport, Report};
pub use state::{AccelCalibration, ButtonState, IrDot, IrState, StatusInfo};

use crate::hid::commands;
use crate::hid::protocol::{
    register, DataReportMode, DeviceKind, IrMode, LedPattern, INPUT_REPORT_SIZE,
};
use crate::hid::transport::{HidHandle, TransportError};
use crate::hid::writer::{SchedulerError, WriteScheduler};
use crate::input::{Button, ButtonSource};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, trace, warn};

/// Id reads in flight. The extension and MotionPlus ids both reply at low
/// address `0x00FA`, so replies are matched to requests in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IdRead {
    Extension,
    MotionPlus,
}

/// One connected remote
pub struct Wiimote {
    handle: Arc<dyn HidHandle>,
    kind: DeviceKind,
    scheduler: Arc<WriteScheduler>,

    buttons: ButtonState,
    accel_raw: [u16; 3],
    calibration: AccelCalibration,
    ir: IrState,
    status: Option<StatusInfo>,
    extension_kind: Option<ExtensionKind>,
    extension: Option<ExtensionData>,
    /// Identify sequence sent, waiting for the `0x21` reply
    extension_pending: bool,
    id_reads: VecDeque<IdRead>,
    motion_plus: MotionPlus,

    rumble: bool,
    leds: LedPattern,
    report_mode: DataReportMode,
    ir_mode: Option<IrMode>,
}

impl Wiimote {
    pub fn new(handle: Arc<dyn HidHandle>, kind: DeviceKind, scheduler: Arc<WriteScheduler>) -> Self {
        Self {
            handle,
            kind,
            scheduler,
            buttons: ButtonState::default(),
            accel_raw: AccelCalibration::default().zero,
            calibration: AccelCalibration::default(),
            ir: IrState::default(),
            status: None,
            extension_kind: None,
            extension: None,
            extension_pending: false,
            id_reads: VecDeque::new(),
            motion_plus: MotionPlus::default(),
            rumble: false,
            leds: LedPattern::OFF,
            report_mode: DataReportMode::default(),
            ir_mode: None,
        }
    }

    pub fn path(&self) -> &str {
        self.handle.path()
    }

    pub fn kind(&self) -> DeviceKind {
        self.kind
    }

    pub fn handle(&self) -> &Arc<dyn HidHandle> {
        &self.handle
    }

    pub fn is_open(&self) -> bool {
        self.handle.is_open()
    }

    pub fn buttons(&self) -> ButtonState {
        self.buttons
    }

    pub fn accel_raw(&self) -> [u16; 3] {
        self.accel_raw
    }

    /// Calibrated acceleration in g
    pub fn accel(&self) -> [f32; 3] {
        self.calibration.apply(self.accel_raw)
    }

    pub fn calibration(&self) -> AccelCalibration {
        self.calibration
    }

    pub fn ir(&self) -> &IrState {
        &self.ir
    }

    pub fn status(&self) -> Option<&StatusInfo> {
        self.status.as_ref()
    }

    pub fn extension_kind(&self) -> Option<ExtensionKind> {
        self.extension_kind
    }

    pub fn extension(&self) -> Option<&ExtensionData> {
        self.extension.as_ref()
    }

    pub fn nunchuck(&self) -> Option<&NunchuckData> {
        match &self.extension {
            Some(ExtensionData::Nunchuck(data)) => Some(data),
            _ => None,
        }
    }

    pub fn motion_plus(&self) -> &MotionPlus {
        &self.motion_plus
    }

    /// Take the current gyro readings as still and clear the integrated offset
    pub fn recalibrate_motion_plus(&mut self) {
        self.motion_plus.recalibrate();
    }

    pub fn rumble(&self) -> bool {
        self.rumble
    }

    pub fn leds(&self) -> LedPattern {
        self.leds
    }

    pub fn report_mode(&self) -> DataReportMode {
        self.report_mode
    }

    pub fn ir_mode(&self) -> Option<IrMode> {
        self.ir_mode
    }

    // ------------------------------------------------------------------
    // Output commands (queued on the write scheduler)
    // ------------------------------------------------------------------

    fn send(&self, payload: Vec<u8>) -> Result<(), SchedulerError> {
        self.scheduler.enqueue(Arc::clone(&self.handle), payload)
    }

    fn send_all(&self, payloads: Vec<Vec<u8>>) -> Result<(), SchedulerError> {
        payloads.into_iter().try_for_each(|payload| self.send(payload))
    }

    pub fn set_rumble(&mut self, on: bool) -> Result<(), SchedulerError> {
        self.rumble = on;
        self.send(commands::build_rumble(on))
    }

    pub fn set_leds(&mut self, leds: LedPattern) -> Result<(), SchedulerError> {
        self.leds = leds;
        self.send(commands::build_player_leds(leds, self.rumble))
    }

    pub fn set_report_mode(&mut self, mode: DataReportMode) -> Result<(), SchedulerError> {
        self.report_mode = mode;
        self.send(commands::build_report_mode(mode, self.rumble))
    }

    pub fn request_status(&self) -> Result<(), SchedulerError> {
        self.send(commands::build_status_request(self.rumble))
    }

    /// Read the accelerometer calibration block; the reply updates [`Self::calibration`]
    pub fn request_accel_calibration(&self) -> Result<(), SchedulerError> {
        self.send(commands::build_accel_calibration_request(self.rumble))
    }

    /// Enable the IR camera in `mode`
    ///
    /// The data report mode must carry IR bytes of the matching size for dots to
    /// arrive; see [`DataReportMode::ir_mode`].
    pub fn setup_ir_camera(&mut self, mode: IrMode) -> Result<(), SchedulerError> {
        self.ir_mode = Some(mode);
        self.send_all(commands::build_ir_setup(mode, self.rumble))
    }

    pub fn disable_ir_camera(&mut self) -> Result<(), SchedulerError> {
        self.ir_mode = None;
        self.ir = IrState::default();
        self.send_all(commands::build_ir_disable(self.rumble))
    }

    fn request_extension_identify(&mut self) -> Result<(), SchedulerError> {
        // Re-running the unlock writes would switch an active MotionPlus off
        let reports = if self.motion_plus.activated() {
            vec![commands::build_extension_id_read(self.rumble)]
        } else {
            commands::build_extension_identify(self.rumble)
        };
        self.send_all(reports)?;
        self.extension_pending = true;
        self.id_reads.push_back(IdRead::Extension);
        Ok(())
    }

    /// Ask whether an inactive MotionPlus is plugged in; the reply updates
    /// [`MotionPlus::attached`]
    pub fn request_motion_plus_check(&mut self) -> Result<(), SchedulerError> {
        self.send(commands::build_motion_plus_id_read(self.rumble))?;
        self.id_reads.push_back(IdRead::MotionPlus);
        Ok(())
    }

    /// Activate an attached MotionPlus and identify it as the extension
    ///
    /// Returns `Ok(false)` when no MotionPlus has been seen.
    pub fn activate_motion_plus(&mut self) -> Result<bool, SchedulerError> {
        if !self.motion_plus.attached() {
            return Ok(false);
        }
        if self.motion_plus.activated() {
            return Ok(true);
        }

        self.send_all(commands::build_motion_plus_activate(self.rumble))?;
        self.motion_plus.set_activated();
        info!("{}: MotionPlus activated", self.path());

        self.extension_kind = None;
        self.extension = None;
        self.request_extension_identify()?;
        Ok(true)
    }

    /// Write rumble-off and LEDs-off straight to the handle, bypassing the
    /// scheduler. Only for use once the writer thread is stopped.
    ///
    /// Both reports are attempted; the first failure is returned.
    pub fn silence_direct(&mut self, lock_timeout: Duration) -> Result<(), TransportError> {
        self.rumble = false;
        self.leds = LedPattern::OFF;
        let rumble = self
            .handle
            .write_timeout(&commands::build_rumble(false), lock_timeout);
        let leds = self
            .handle
            .write_timeout(&commands::build_player_leds(LedPattern::OFF, false), lock_timeout);
        rumble.and(leds).map(|_| ())
    }

    // ------------------------------------------------------------------
    // Input
    // ------------------------------------------------------------------

    /// Drain and decode every pending report, oldest first, so the newest
    /// report decides the state. Returns the number consumed, 0 when nothing
    /// was pending.
    pub fn read_available(&mut self) -> Result<usize, TransportError> {
        let mut buf = [0u8; INPUT_REPORT_SIZE];
        let mut count = 0;

        loop {
            let len = self.handle.read(&mut buf)?;
            if len == 0 {
                break;
            }
            count += 1;
            trace!("{} <- {:02X?}", self.path(), &buf[..len]);
            if let Some(report) = parse_report(&buf[..len]) {
                self.apply(report);
            }
        }

        Ok(count)
    }

    /// Fold one decoded report into the state
    pub fn apply(&mut self, report: Report<'_>) {
        match report {
            Report::Status { buttons, status } => {
                self.buttons = buttons;
                self.on_status(status);
            }
            Report::ReadMemory {
                buttons,
                address,
                error,
                data,
            } => {
                self.buttons = buttons;
                self.on_read_memory(address, error, data);
            }
            Report::Acknowledge {
                buttons,
                report,
                error,
            } => {
                self.buttons = buttons;
                if error != 0 {
                    debug!(
                        "{}: output report 0x{:02X} acknowledged with error {}",
                        self.path(),
                        report,
                        error
                    );
                }
            }
            Report::Data(data) => self.on_data(data),
        }
    }

    fn on_status(&mut self, status: StatusInfo) {
        debug!(
            "{}: status battery={} ext={} ir={} leds={:?}",
            self.path(),
            status.battery_level,
            status.extension_connected,
            status.ir_enabled,
            status.leds
        );

        if status.battery_low && !self.status.is_some_and(|s| s.battery_low) {
            warn!("{}: battery low", self.path());
        }

        if status.extension_connected {
            if self.extension_kind.is_none() && !self.extension_pending {
                if let Err(e) = self.request_extension_identify() {
                    warn!("{}: failed to queue extension identify: {}", self.path(), e);
                }
            }
        } else if self.extension_kind.is_some() || self.extension_pending {
            info!("{}: extension disconnected", self.path());
            if self.extension_kind == Some(ExtensionKind::MotionPlus) {
                self.motion_plus.detach();
            }
            self.extension_kind = None;
            self.extension = None;
            self.extension_pending = false;
        }

        self.status = Some(status);

        // The remote stops streaming data reports after a status report
        if let Err(e) = self.set_report_mode(self.report_mode) {
            warn!("{}: failed to re-send report mode: {}", self.path(), e);
        }
    }

    fn on_read_memory(&mut self, address: u16, error: u8, data: &[u8]) {
        let calibration_addr = register::ACCEL_CALIBRATION as u16;
        let extension_addr = register::EXTENSION_ID as u16;

        if address == calibration_addr {
            if error != 0 {
                warn!("{}: calibration read failed (error {})", self.path(), error);
                return;
            }
            if let Some(calibration) = AccelCalibration::from_eeprom(data) {
                debug!("{}: accelerometer calibration {:?}", self.path(), calibration);
                self.calibration = calibration;
            }
        } else if address == extension_addr {
            match self.id_reads.pop_front() {
                Some(IdRead::MotionPlus) => self.on_motion_plus_id(error, data),
                Some(IdRead::Extension) | None => self.on_extension_id(error, data),
            }
        } else {
            trace!("{}: unsolicited memory data at 0x{:04X}", self.path(), address);
        }
    }

    fn on_motion_plus_id(&mut self, error: u8, data: &[u8]) {
        // Error 7: nothing at 0xA600FA, or the MotionPlus is already active
        let attached = error == 0
            && <[u8; 6]>::try_from(data).is_ok_and(motion_plus::is_inactive_id);
        if attached && !self.motion_plus.attached() {
            info!("{}: MotionPlus attached", self.path());
        }
        debug!("{}: MotionPlus check error={} attached={}", self.path(), error, attached);
        // An active MotionPlus no longer answers here but is still attached
        if !self.motion_plus.activated() {
            self.motion_plus.set_attached(attached);
        }
    }

    fn on_extension_id(&mut self, error: u8, data: &[u8]) {
        self.extension_pending = false;
        if error != 0 {
            warn!("{}: extension id read failed (error {})", self.path(), error);
            return;
        }
        let Ok(id) = <[u8; 6]>::try_from(data) else {
            warn!("{}: short extension id ({} bytes)", self.path(), data.len());
            return;
        };
        let kind = ExtensionKind::from_id(id);
        info!("{}: extension identified as {}", self.path(), kind);
        self.extension_kind = Some(kind);
        self.extension = None;
    }

    fn on_data(&mut self, data: DataReport<'_>) {
        if let Some(buttons) = data.buttons {
            self.buttons = buttons;
        }
        if let Some(accel) = data.accel {
            self.accel_raw = accel;
        }
        if let Some(ir) = data.ir {
            self.ir = ir;
        }
        if let (Some(bytes), Some(kind)) = (data.extension, self.extension_kind) {
            if let Some(decoded) = ExtensionData::decode(kind, bytes) {
                if let ExtensionData::MotionPlus(gyro) = decoded {
                    self.motion_plus.update(gyro);
                }
                self.extension = Some(decoded);
            }
        }
    }

    /// Buttons of a Pro Controller, from the extension payload
    fn pro_buttons(&self) -> Option<&ClassicButtons> {
        match &self.extension {
            Some(ExtensionData::ProController(data)) => Some(&data.buttons),
            _ => None,
        }
    }
}

impl ButtonSource for Wiimote {
    fn button(&self, button: Button) -> bool {
        // A Pro Controller reports everything through its extension payload
        if self.kind == DeviceKind::ProController {
            let Some(pro) = self.pro_buttons() else {
                return false;
            };
            return match button {
                Button::A => pro.a,
                Button::B => pro.b,
                Button::Up => pro.d_up,
                Button::Down => pro.d_down,
                Button::Left => pro.d_left,
                Button::Right => pro.d_right,
                Button::Plus => pro.plus,
                Button::Minus => pro.minus,
                Button::Home => pro.home,
                Button::One => pro.x,
                Button::Two => pro.y,
                Button::Z | Button::C => false,
            };
        }

        let b = &self.buttons;
        match button {
            Button::A => b.a,
            Button::B => b.b,
            Button::Up => b.d_up,
            Button::Down => b.d_down,
            Button::Left => b.d_left,
            Button::Right => b.d_right,
            Button::Plus => b.plus,
            Button::Minus => b.minus,
            Button::Home => b.home,
            Button::One => b.one,
            Button::Two => b.two,
            Button::Z => self.nunchuck().is_some_and(|n| n.z),
            Button::C => self.nunchuck().is_some_and(|n| n.c),
        }
    }
}

impl std::fmt::Debug for Wiimote {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Wiimote")
            .field("path", &self.path())
            .field("kind", &self.kind)
            .field("extension", &self.extension_kind)
            .field("rumble", &self.rumble)
            .field("leds", &self.leds)
            .field("report_mode", &self.report_mode)
            .finish()
    }
}
