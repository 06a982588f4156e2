//! Client loop front-end
//!
//! [`InputManager`] is what game code polls once per tick: it finds a remote
//! when none is connected, configures it, drains its reports and updates the
//! button edges. With no remote every query returns a neutral value.

mod edges;
mod motion;

pub use edges::{Button, ButtonEdgeTracker, ButtonSource, EdgeState};
pub use motion::MotionTracker;

use crate::core::config::InputConfig;
use crate::hid::protocol::{DataReportMode, DeviceKind, LedPattern};
use crate::hid::writer::SchedulerError;
use crate::hid::WiimoteManager;
use crate::wiimote::Wiimote;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Nunchuck stick axis
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StickAxis {
    Horizontal,
    Vertical,
}

/// Raw stick values inside this range read as centred
const STICK_DEAD_ZONE: std::ops::RangeInclusive<u8> = 113..=143;
/// Horizontal readings run higher than vertical ones on most nunchucks
const STICK_HORIZONTAL_OFFSET: i32 = 8;
const STICK_FULL_POSITIVE: i32 = 200;
const STICK_FULL_NEGATIVE: i32 = 47;

/// Map a raw nunchuck stick reading to -1..1
///
/// 0 means the extension bytes are not being reported and reads as centred.
pub fn normalize_stick(raw: u8, axis: StickAxis) -> f32 {
    if raw == 0 || STICK_DEAD_ZONE.contains(&raw) {
        return 0.0;
    }

    let mut value = i32::from(raw);
    if axis == StickAxis::Horizontal {
        value -= STICK_HORIZONTAL_OFFSET;
    }

    if value > STICK_FULL_POSITIVE {
        1.0
    } else if value < STICK_FULL_NEGATIVE {
        -1.0
    } else {
        ((value as f32 - 128.0) / 128.0).clamp(-1.0, 1.0)
    }
}

/// Yaw rate below which [`InputManager::motion_plus_vector`] reads zero, in deg/s
const MOTION_PLUS_YAW_DEAD_ZONE: f32 = 60.0;
const MOTION_PLUS_YAW_DIVISOR: f32 = 10.0;
const LED_CHASE_STEPS: usize = 4;

/// Player LEDs lit one after another, then back to the configured pattern
#[derive(Debug, Clone, Copy)]
struct LedChase {
    /// LED currently lit, 0-based
    step: usize,
    step_len: Duration,
    next_at: Instant,
}

/// Per-tick driver for the primary remote
pub struct InputManager {
    manager: WiimoteManager,
    config: InputConfig,
    tracker: ButtonEdgeTracker,
    motion: MotionTracker,
    /// Path of the remote the tracker and setup belong to
    primary: Option<String>,
    rumble_until: Option<Instant>,
    led_chase: Option<LedChase>,
}

impl InputManager {
    pub fn new(manager: WiimoteManager, config: InputConfig) -> Self {
        Self {
            manager,
            config,
            tracker: ButtonEdgeTracker::new(),
            motion: MotionTracker::new(),
            primary: None,
            rumble_until: None,
            led_chase: None,
        }
    }

    /// One client tick
    ///
    /// Discovery, setup and read failures are absorbed; only a failure to
    /// start the writer thread is returned.
    pub fn tick(&mut self) -> Result<(), SchedulerError> {
        if !self.manager.has_device() {
            self.manager.discover()?;
        }

        self.manager.poll();
        self.sync_primary()?;
        self.expire_rumble()?;
        self.advance_led_chase()?;
        if self.config.motion_plus {
            self.activate_motion_plus_once_seen()?;
        }

        let source = self.manager.primary().map(|w| w as &dyn ButtonSource);
        self.tracker.tick(source);
        match self.manager.primary() {
            Some(wiimote) => self.motion.update(wiimote.accel()),
            None => self.motion.reset(),
        }
        Ok(())
    }

    fn sync_primary(&mut self) -> Result<(), SchedulerError> {
        let current = self.manager.primary().map(|w| w.path().to_string());
        if current == self.primary {
            return Ok(());
        }

        // A different (or no) remote: nothing held on the old one carries over
        self.tracker.reset();
        self.motion.reset();
        self.rumble_until = None;
        self.led_chase = None;
        self.primary = current;

        match self.manager.primary_mut() {
            Some(wiimote) => {
                configure_primary(wiimote, &self.config)?;
                info!("Primary remote is {} ({})", wiimote.path(), wiimote.kind());
            }
            None => info!("No remote connected"),
        }
        Ok(())
    }

    fn expire_rumble(&mut self) -> Result<(), SchedulerError> {
        let Some(until) = self.rumble_until else {
            return Ok(());
        };
        if Instant::now() < until {
            return Ok(());
        }
        self.rumble_until = None;
        self.set_rumble(false)
    }

    fn advance_led_chase(&mut self) -> Result<(), SchedulerError> {
        let Some(mut chase) = self.led_chase else {
            return Ok(());
        };
        let now = Instant::now();
        if now < chase.next_at {
            return Ok(());
        }

        chase.step += 1;
        let leds = if chase.step < LED_CHASE_STEPS {
            chase.next_at = now + chase.step_len;
            self.led_chase = Some(chase);
            LedPattern::single(chase.step)
        } else {
            self.led_chase = None;
            self.config.player_leds
        };
        self.set_leds(leds)
    }

    fn activate_motion_plus_once_seen(&mut self) -> Result<(), SchedulerError> {
        let Some(wiimote) = self.manager.primary_mut() else {
            return Ok(());
        };
        let wmp = wiimote.motion_plus();
        if !wmp.attached() || wmp.activated() {
            return Ok(());
        }
        absorb(wiimote.activate_motion_plus().map(|_| ()), wiimote.path(), "MotionPlus activation")
    }

    fn set_leds(&mut self, leds: LedPattern) -> Result<(), SchedulerError> {
        let Some(wiimote) = self.manager.primary_mut() else {
            return Ok(());
        };
        absorb(wiimote.set_leds(leds), wiimote.path(), "player LEDs")
    }

    /// Light LED 1 to 4 in turn for a quarter of `total` each, then restore
    /// the player LEDs. Ignored while a chase is already playing.
    pub fn play_led_chase(&mut self, total: Duration) -> Result<(), SchedulerError> {
        if self.led_chase.is_some() || !self.manager.has_device() {
            return Ok(());
        }
        let step_len = total / LED_CHASE_STEPS as u32;
        self.led_chase = Some(LedChase {
            step: 0,
            step_len,
            next_at: Instant::now() + step_len,
        });
        self.set_leds(LedPattern::single(0))
    }

    pub fn led_chase_playing(&self) -> bool {
        self.led_chase.is_some()
    }

    /// Switch the primary remote's rumble motor
    pub fn set_rumble(&mut self, on: bool) -> Result<(), SchedulerError> {
        let Some(wiimote) = self.manager.primary_mut() else {
            return Ok(());
        };
        absorb(wiimote.set_rumble(on), wiimote.path(), "rumble")
    }

    /// Rumble for `duration`; switched off by the first tick after it elapses
    pub fn pulse_rumble(&mut self, duration: Duration) -> Result<(), SchedulerError> {
        if !self.manager.has_device() {
            return Ok(());
        }
        self.set_rumble(true)?;
        self.rumble_until = Some(Instant::now() + duration);
        Ok(())
    }

    pub fn has_device(&self) -> bool {
        self.manager.has_device()
    }

    /// Raw level as of the last tick
    pub fn get_button(&self, button: Button) -> bool {
        self.tracker.is_pressed(button)
    }

    /// Pressed this tick
    pub fn get_button_down(&self, button: Button) -> bool {
        self.tracker.is_down(button)
    }

    /// Released this tick
    pub fn get_button_up(&self, button: Button) -> bool {
        self.tracker.is_up(button)
    }

    pub fn tracker(&self) -> &ButtonEdgeTracker {
        &self.tracker
    }

    /// Calibrated acceleration in g, zero without a remote
    pub fn accel(&self) -> [f32; 3] {
        self.manager.primary().map_or([0.0; 3], Wiimote::accel)
    }

    /// Nunchuck stick position in -1..1, zero without a nunchuck
    pub fn nunchuck_axis(&self, axis: StickAxis) -> f32 {
        let Some(nunchuck) = self.manager.primary().and_then(Wiimote::nunchuck) else {
            return 0.0;
        };
        let raw = match axis {
            StickAxis::Horizontal => nunchuck.stick[0],
            StickAxis::Vertical => nunchuck.stick[1],
        };
        normalize_stick(raw, axis)
    }

    /// Swung 60 degrees or more within the last few samples
    pub fn shaking(&self) -> bool {
        self.motion.shaking()
    }

    pub fn twisting(&self) -> bool {
        self.motion.twisting()
    }

    /// Change in the normalised X acceleration since the last sample
    pub fn twist_amount(&self) -> f32 {
        self.motion.twist_amount()
    }

    /// Activate the primary remote's MotionPlus if one has been seen
    ///
    /// Also asks the remote again, so a MotionPlus plugged in later is found
    /// by a subsequent call.
    pub fn find_motion_plus(&mut self) -> Result<bool, SchedulerError> {
        let Some(wiimote) = self.manager.primary_mut() else {
            return Ok(false);
        };
        let path = wiimote.path().to_string();
        if !wiimote.motion_plus().attached() {
            absorb(wiimote.request_motion_plus_check(), &path, "MotionPlus check")?;
        }
        match wiimote.activate_motion_plus() {
            Ok(found) => Ok(found),
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                warn!("{}: MotionPlus activation not queued: {}", path, e);
                Ok(false)
            }
        }
    }

    /// Yaw rate as a turn input: `[0, yaw / 10, 0]` past 60 deg/s, zero otherwise
    pub fn motion_plus_vector(&self) -> [f32; 3] {
        let Some(wmp) = self.manager.primary().map(Wiimote::motion_plus) else {
            return [0.0; 3];
        };
        if !wmp.attached() {
            return [0.0; 3];
        }
        let yaw = wmp.speed().yaw;
        if yaw.abs() > MOTION_PLUS_YAW_DEAD_ZONE {
            [0.0, yaw / MOTION_PLUS_YAW_DIVISOR, 0.0]
        } else {
            [0.0; 3]
        }
    }

    /// Integrated MotionPlus rotation `[-pitch, yaw, roll]` in degrees
    pub fn motion_plus_offset(&self) -> [f32; 3] {
        self.manager
            .primary()
            .map_or([0.0; 3], |w| w.motion_plus().offset())
    }

    pub fn recalibrate_motion_plus(&mut self) {
        if let Some(wiimote) = self.manager.primary_mut() {
            wiimote.recalibrate_motion_plus();
        }
    }

    /// Normalised IR pointer position, `None` without two visible dots
    pub fn pointer(&self) -> Option<[f32; 2]> {
        self.manager.primary()?.ir().pointing_position()
    }

    pub fn primary(&self) -> Option<&Wiimote> {
        self.manager.primary()
    }

    pub fn manager(&self) -> &WiimoteManager {
        &self.manager
    }

    pub fn manager_mut(&mut self) -> &mut WiimoteManager {
        &mut self.manager
    }

    pub fn into_manager(self) -> WiimoteManager {
        self.manager
    }
}

/// LEDs, report mode, IR camera and calibration for a newly selected remote
fn configure_primary(wiimote: &mut Wiimote, config: &InputConfig) -> Result<(), SchedulerError> {
    let path = wiimote.path().to_string();
    absorb(wiimote.set_leds(config.player_leds), &path, "player LEDs")?;

    // The Pro Controller has no accelerometer or camera; all of its state
    // arrives as extension bytes
    if wiimote.kind() == DeviceKind::ProController {
        return absorb(wiimote.set_report_mode(DataReportMode::Ext21), &path, "report mode");
    }

    absorb(wiimote.set_report_mode(config.report_mode), &path, "report mode")?;
    if let Some(mode) = config.ir_mode() {
        absorb(wiimote.setup_ir_camera(mode), &path, "IR camera setup")?;
    }
    if config.read_calibration {
        absorb(wiimote.request_accel_calibration(), &path, "calibration read")?;
    }
    if config.motion_plus {
        absorb(wiimote.request_motion_plus_check(), &path, "MotionPlus check")?;
    }
    debug!("{}: configured for {}", path, config.report_mode);
    Ok(())
}

fn absorb(result: Result<(), SchedulerError>, path: &str, what: &str) -> Result<(), SchedulerError> {
    match result {
        Err(e) if e.is_fatal() => Err(e),
        Err(e) => {
            warn!("{}: {} not queued: {}", path, what, e);
            Ok(())
        }
        Ok(()) => Ok(()),
    }
}
