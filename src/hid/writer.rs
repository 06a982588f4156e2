//! Rate-limited background writer
//!
//! All output reports go through one worker thread that drains a FIFO queue,
//! writing one report and then waiting `write_interval` before the next.
//! Bluetooth HID stacks drop or reject back-to-back writes to the remote, so
//! the interval is the only backpressure: callers that enqueue faster than the
//! drain rate grow the queue (up to `max_queue_depth`, oldest dropped first).
//!
//! The worker is started lazily by the first [`WriteScheduler::enqueue`] and,
//! once [`WriteScheduler::stop`] has run, never restarted.

use super::transport::HidHandle;
use parking_lot::{Condvar, Mutex};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, error, info, trace, warn};

/// Writer thread configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WriterConfig {
    /// Minimum time between two writes, in milliseconds
    #[serde(default = "default_write_interval")]
    pub write_interval_ms: u64,
    /// How long `stop` waits for the worker before detaching it, in milliseconds
    #[serde(default = "default_join_timeout")]
    pub join_timeout_ms: u64,
    /// Queue bound; the oldest request is dropped on overflow. 0 = unbounded.
    #[serde(default = "default_max_queue_depth")]
    pub max_queue_depth: usize,
}

fn default_write_interval() -> u64 {
    40
}
fn default_join_timeout() -> u64 {
    1000
}
fn default_max_queue_depth() -> usize {
    64
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            write_interval_ms: default_write_interval(),
            join_timeout_ms: default_join_timeout(),
            max_queue_depth: default_max_queue_depth(),
        }
    }
}

/// Scheduler errors surfaced to callers
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// `stop` has run; the worker is never restarted
    #[error("write scheduler is stopped")]
    Stopped,
    /// The OS refused to create the worker thread
    #[error("failed to spawn writer thread: {0}")]
    Spawn(#[from] std::io::Error),
}

impl SchedulerError {
    /// Only thread creation failure is worth propagating; everything else is
    /// logged where it happens
    pub fn is_fatal(&self) -> bool {
        matches!(self, SchedulerError::Spawn(_))
    }
}

/// How a call to [`WriteScheduler::stop`] ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopOutcome {
    /// The worker was never started
    NotStarted,
    /// The worker exited within the join timeout
    Joined,
    /// The worker did not exit in time (blocked in a write) and was detached
    Detached,
    /// An earlier `stop` already ran
    AlreadyStopped,
}

/// One queued output report
pub struct WriteRequest {
    handle: Arc<dyn HidHandle>,
    payload: Vec<u8>,
}

impl WriteRequest {
    pub fn path(&self) -> &str {
        self.handle.path()
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }
}

struct Shared {
    queue: Mutex<VecDeque<WriteRequest>>,
    /// Signalled on enqueue and on stop
    wake: Condvar,
    running: AtomicBool,
    /// Set by the worker right before it returns
    exited: Mutex<bool>,
    exited_cv: Condvar,
}

enum Lifecycle {
    Idle,
    Running(JoinHandle<()>),
    Stopped,
}

/// Owner of the writer thread and its queue
pub struct WriteScheduler {
    shared: Arc<Shared>,
    lifecycle: Mutex<Lifecycle>,
    config: WriterConfig,
}

impl WriteScheduler {
    pub fn new(config: WriterConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                queue: Mutex::new(VecDeque::new()),
                wake: Condvar::new(),
                running: AtomicBool::new(false),
                exited: Mutex::new(false),
                exited_cv: Condvar::new(),
            }),
            lifecycle: Mutex::new(Lifecycle::Idle),
            config,
        }
    }

    pub fn config(&self) -> &WriterConfig {
        &self.config
    }

    /// Queue a report for `handle`, starting the worker on first use
    pub fn enqueue(&self, handle: Arc<dyn HidHandle>, payload: Vec<u8>) -> Result<(), SchedulerError> {
        // Held until the request is queued so a concurrent `stop` cannot clear
        // the queue in between and strand it
        let mut lifecycle = self.lifecycle.lock();
        match *lifecycle {
            Lifecycle::Stopped => {
                debug!(
                    "Dropping write to {} after scheduler stop: {:02X?}",
                    handle.path(),
                    payload
                );
                return Err(SchedulerError::Stopped);
            }
            Lifecycle::Idle => {
                *lifecycle = Lifecycle::Running(self.spawn_worker()?);
            }
            Lifecycle::Running(_) => {}
        }

        let mut queue = self.shared.queue.lock();
        let max_depth = self.config.max_queue_depth;
        if max_depth > 0 && queue.len() >= max_depth {
            if let Some(dropped) = queue.pop_front() {
                warn!(
                    "Write queue full ({} requests), dropping oldest for {}",
                    max_depth,
                    dropped.path()
                );
            }
        }
        queue.push_back(WriteRequest { handle, payload });
        drop(queue);
        drop(lifecycle);

        self.shared.wake.notify_one();
        Ok(())
    }

    fn spawn_worker(&self) -> Result<JoinHandle<()>, SchedulerError> {
        self.shared.running.store(true, Ordering::SeqCst);
        let shared = Arc::clone(&self.shared);
        let interval = Duration::from_millis(self.config.write_interval_ms);

        let handle = thread::Builder::new()
            .name("wiimote-writer".to_string())
            .spawn(move || writer_loop(shared, interval))
            .map_err(|e| {
                self.shared.running.store(false, Ordering::SeqCst);
                SchedulerError::Spawn(e)
            })?;

        info!("Writer thread started (interval {:?})", interval);
        Ok(handle)
    }

    /// Stop the worker: cooperative first, then detach after the join timeout.
    /// The queue is cleared either way.
    pub fn stop(&self) -> StopOutcome {
        let previous = std::mem::replace(&mut *self.lifecycle.lock(), Lifecycle::Stopped);

        let outcome = match previous {
            Lifecycle::Stopped => return StopOutcome::AlreadyStopped,
            Lifecycle::Idle => StopOutcome::NotStarted,
            Lifecycle::Running(handle) => {
                self.shared.running.store(false, Ordering::SeqCst);
                {
                    // Take the queue lock so the wake cannot slip in between the
                    // worker's running check and its wait
                    let _queue = self.shared.queue.lock();
                    self.shared.wake.notify_all();
                }

                let timeout = Duration::from_millis(self.config.join_timeout_ms);
                if self.wait_for_exit(timeout) {
                    if handle.join().is_err() {
                        error!("Writer thread panicked");
                    }
                    info!("Writer thread stopped");
                    StopOutcome::Joined
                } else {
                    warn!(
                        "Writer thread did not stop within {:?}, detaching it",
                        timeout
                    );
                    // Dropping the JoinHandle detaches; the worker exits as soon
                    // as its pending write returns and never writes again
                    drop(handle);
                    StopOutcome::Detached
                }
            }
        };

        let discarded = {
            let mut queue = self.shared.queue.lock();
            let n = queue.len();
            queue.clear();
            n
        };
        if discarded > 0 {
            debug!("Discarded {} queued write(s) on stop", discarded);
        }

        outcome
    }

    fn wait_for_exit(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut exited = self.shared.exited.lock();
        while !*exited {
            if self.shared.exited_cv.wait_until(&mut exited, deadline).timed_out() {
                return *exited;
            }
        }
        true
    }

    /// Number of queued, not yet written requests
    pub fn pending(&self) -> usize {
        self.shared.queue.lock().len()
    }

    /// Whether the worker thread is alive and accepting work
    pub fn is_running(&self) -> bool {
        matches!(*self.lifecycle.lock(), Lifecycle::Running(_))
    }

    pub fn is_stopped(&self) -> bool {
        matches!(*self.lifecycle.lock(), Lifecycle::Stopped)
    }
}

impl Drop for WriteScheduler {
    fn drop(&mut self) {
        if !matches!(*self.lifecycle.get_mut(), Lifecycle::Stopped) {
            self.stop();
        }
    }
}

fn writer_loop(shared: Arc<Shared>, interval: Duration) {
    debug!("Writer loop running");

    while shared.running.load(Ordering::SeqCst) {
        let request = {
            let mut queue = shared.queue.lock();
            while queue.is_empty() && shared.running.load(Ordering::SeqCst) {
                shared.wake.wait(&mut queue);
            }
            if !shared.running.load(Ordering::SeqCst) {
                break;
            }
            queue.pop_front()
        };

        if let Some(request) = request {
            write_one(&request);
        }

        // Rate limit: at most one write per interval, cut short by stop
        let deadline = Instant::now() + interval;
        let mut queue = shared.queue.lock();
        while shared.running.load(Ordering::SeqCst) {
            if shared.wake.wait_until(&mut queue, deadline).timed_out() {
                break;
            }
        }
    }

    *shared.exited.lock() = true;
    shared.exited_cv.notify_all();
    debug!("Writer loop exited");
}

fn write_one(request: &WriteRequest) {
    match request.handle.write(&request.payload) {
        Ok(written) => {
            trace!(
                "Sent {}b to {}: {:02X?}",
                written,
                request.path(),
                request.payload
            );
        }
        Err(e) => {
            // Stale commands are not worth replaying
            error!("Write failed, request discarded: {}", e);
        }
    }
}
