//! Ordered shutdown
//!
//! Rumble and LEDs must not outlive the process. A single "off" request queued
//! right before the writer stops may never be drained, so the sequence queues
//! it, gives the writer time, stops it, then writes the same reports directly:
//!
//! 1. queue rumble off + LEDs off for every device
//! 2. wait `drain_delay`
//! 3. stop the writer (join, or detach after the join timeout)
//! 4. wait `settle_delay`
//! 5. write rumble off + LEDs off directly on this thread
//! 6. wait `final_delay`
//! 7. drop every record without closing handles

use super::config::ShutdownConfig;
use crate::hid::protocol::LedPattern;
use crate::hid::writer::StopOutcome;
use crate::hid::WiimoteManager;
use serde::Serialize;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// What happened during a shutdown run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShutdownReport {
    /// Devices tracked when shutdown started
    pub devices: usize,
    /// Devices whose queued off-commands could not be enqueued
    pub queue_failures: usize,
    pub writer: StopOutcome,
    /// Devices whose direct off-writes failed
    pub direct_failures: usize,
    pub elapsed: Duration,
}

/// Runs the shutdown sequence against a [`WiimoteManager`]
#[derive(Debug, Clone, Default)]
pub struct ShutdownCoordinator {
    config: ShutdownConfig,
}

impl ShutdownCoordinator {
    pub fn new(config: ShutdownConfig) -> Self {
        Self { config }
    }

    pub fn run(&self, manager: &mut WiimoteManager) -> ShutdownReport {
        let started = Instant::now();
        let devices = manager.len();
        info!("Shutting down {} device(s)", devices);

        let mut queue_failures = 0;
        for device in manager.devices_mut() {
            let rumble = device.set_rumble(false);
            let leds = device.set_leds(LedPattern::OFF);
            if let Err(e) = rumble.and(leds) {
                warn!("{}: could not queue rumble/LED off: {}", device.path(), e);
                queue_failures += 1;
            }
        }

        pause(self.config.drain_delay());

        let writer = manager.scheduler().stop();
        debug!("Writer stop: {:?}", writer);

        pause(self.config.settle_delay());

        let mut direct_failures = 0;
        let timeout = self.config.direct_write_timeout();
        for device in manager.devices_mut() {
            if let Err(e) = device.silence_direct(timeout) {
                warn!("{}: direct rumble/LED off failed: {}", device.path(), e);
                direct_failures += 1;
            }
        }

        pause(self.config.final_delay());

        manager.forget_all();

        let report = ShutdownReport {
            devices,
            queue_failures,
            writer,
            direct_failures,
            elapsed: started.elapsed(),
        };
        info!("Shutdown complete in {:?}", report.elapsed);
        report
    }
}

fn pause(delay: Duration) {
    if !delay.is_zero() {
        thread::sleep(delay);
    }
}
