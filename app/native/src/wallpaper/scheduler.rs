//! Periodic update worker.
//!
//! One named thread sleeps until the next wall-clock interval boundary,
//! ticks, and repeats until cancelled. Sleeps are interruptible so `stop`
//! returns promptly; a tick already in progress is given a bounded grace
//! period before the worker is detached.

use std::sync::Arc;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread::JoinHandle;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use parking_lot::{Condvar, Mutex};

use super::error::EngineError;
use crate::platform::thread::spawn_named_thread;

/// How long `stop` waits for the worker to acknowledge cancellation.
pub const STOP_TIMEOUT: Duration = Duration::from_secs(2);

/// Multiple of the interval the worker waits after a failed tick.
pub const ERROR_BACKOFF_FACTOR: u32 = 5;

/// Work driven by the scheduler.
pub trait Tick: Send + Sync + 'static {
    /// Produces one update.
    ///
    /// # Errors
    ///
    /// Any error is logged by the worker, which then backs off.
    fn tick(&self) -> Result<(), EngineError>;

    /// Current update interval. Read again before every sleep.
    fn interval(&self) -> Duration;
}

/// Shared cancellation flag with an interruptible wait.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl CancellationToken {
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Sets the flag and wakes every waiter.
    pub fn cancel(&self) {
        let (flag, condvar) = &*self.inner;
        *flag.lock() = true;
        condvar.notify_all();
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool { *self.inner.0.lock() }

    /// Waits up to `timeout`. Returns `true` if the token was cancelled.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let (flag, condvar) = &*self.inner;
        let mut cancelled = flag.lock();
        if !*cancelled {
            let _ = condvar.wait_while_for(&mut cancelled, |cancelled| !*cancelled, timeout);
        }
        *cancelled
    }
}

/// Scheduler lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Running,
}

/// Time from `since_epoch` to the next multiple of `interval`.
///
/// Sub-millisecond intervals are treated as one millisecond.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn delay_until_boundary(since_epoch: Duration, interval: Duration) -> Duration {
    let interval_ms = interval.as_millis().max(1);
    let remainder = since_epoch.as_millis() % interval_ms;
    Duration::from_millis((interval_ms - remainder) as u64)
}

/// Wait after a failed tick.
#[must_use]
pub fn error_backoff(interval: Duration) -> Duration { interval.saturating_mul(ERROR_BACKOFF_FACTOR) }

struct Worker {
    token: CancellationToken,
    handle: JoinHandle<()>,
    exited: mpsc::Receiver<()>,
}

/// Starts and stops the update worker.
#[derive(Default)]
pub struct UpdateScheduler {
    worker: Mutex<Option<Worker>>,
}

impl std::fmt::Debug for UpdateScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpdateScheduler").field("state", &self.state()).finish()
    }
}

impl UpdateScheduler {
    #[must_use]
    pub fn new() -> Self { Self::default() }

    #[must_use]
    pub fn state(&self) -> SchedulerState {
        if self.worker.lock().is_some() {
            SchedulerState::Running
        } else {
            SchedulerState::Idle
        }
    }

    /// Renders one frame synchronously, then spawns the worker.
    ///
    /// Returns `Ok(false)` without doing anything if already running.
    ///
    /// # Errors
    ///
    /// Returns the first frame's error (the scheduler stays idle) or an IO
    /// error if the worker thread cannot be spawned.
    pub fn start<T: Tick>(&self, task: Arc<T>) -> Result<bool, EngineError> {
        let mut slot = self.worker.lock();
        if slot.is_some() {
            tracing::debug!("update scheduler already running");
            return Ok(false);
        }

        task.tick()?;

        let token = CancellationToken::new();
        let (exit_tx, exited) = mpsc::channel();
        let worker_token = token.clone();
        let handle = spawn_named_thread("updates", move || {
            run_worker(task.as_ref(), &worker_token);
            let _ = exit_tx.send(());
        })?;

        *slot = Some(Worker { token, handle, exited });
        tracing::info!("update scheduler started");
        Ok(true)
    }

    /// Cancels the worker and waits up to [`STOP_TIMEOUT`] for it to exit.
    ///
    /// Returns `false` if the scheduler was idle.
    pub fn stop(&self) -> bool {
        let Some(worker) = self.worker.lock().take() else {
            return false;
        };

        worker.token.cancel();
        match worker.exited.recv_timeout(STOP_TIMEOUT) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                if worker.handle.join().is_err() {
                    tracing::warn!("update worker panicked");
                }
                tracing::info!("update scheduler stopped");
            }
            Err(RecvTimeoutError::Timeout) => {
                tracing::warn!(
                    timeout_secs = STOP_TIMEOUT.as_secs(),
                    "update worker did not exit in time; detaching"
                );
            }
        }
        true
    }
}

impl Drop for UpdateScheduler {
    fn drop(&mut self) { self.stop(); }
}

fn run_worker<T: Tick + ?Sized>(task: &T, token: &CancellationToken) {
    loop {
        if token.is_cancelled() {
            break;
        }

        let interval = task.interval();
        let since_epoch = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
        if token.wait_timeout(delay_until_boundary(since_epoch, interval)) {
            break;
        }

        if let Err(err) = task.tick() {
            let backoff = error_backoff(interval);
            tracing::warn!(error = %err, backoff_ms = backoff.as_millis(), "wallpaper update failed");
            if token.wait_timeout(backoff) {
                break;
            }
        }
    }
}
