//! Device-readiness monitor.
//!
//! A background thread periodically probes the backing device with an
//! open + fsync + positional read, flipping a shared flag the rest of the
//! engine consults before attempting a synchronous write. Grounded on
//! `journal.c::journal_device_monitor_thread`, which performs the same
//! probe/sleep loop in C against the raw device node.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, warn};

/// Interval between device readiness probes while the device is ready.
const PROBE_INTERVAL_READY: Duration = Duration::from_millis(1000);

/// Interval between device readiness probes while the device is not ready;
/// shorter so the engine notices recovery quickly.
const PROBE_INTERVAL_NOT_READY: Duration = Duration::from_millis(100);

/// Granularity the sleep between probes is chopped into so `shutdown` can
/// interrupt promptly instead of waiting out a full, uninterruptible sleep.
const SHUTDOWN_POLL_TICK: Duration = Duration::from_millis(20);

/// Sleeps `total`, breaking out early as soon as `shutdown` is observed set.
fn interruptible_sleep(total: Duration, shutdown: &AtomicBool) {
    let mut remaining = total;
    while !remaining.is_zero() {
        if shutdown.load(Ordering::Relaxed) {
            return;
        }
        let tick = remaining.min(SHUTDOWN_POLL_TICK);
        thread::sleep(tick);
        remaining -= tick;
    }
}

/// Shared flag toggled by the monitor thread and read by the logging path.
#[derive(Debug, Default)]
pub struct DeviceReady(AtomicBool);

impl DeviceReady {
    /// Creates a flag initialized to `false`.
    #[must_use]
    pub fn new() -> Self {
        Self(AtomicBool::new(false))
    }

    /// Creates a flag initialized to `true`, for callers that write to the
    /// ring directly without running a [`DeviceMonitor`] (tests, one-shot
    /// tools operating on an already-verified device).
    #[must_use]
    pub fn always_ready() -> Self {
        Self(AtomicBool::new(true))
    }

    /// Current readiness state.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    pub(crate) fn set(&self, ready: bool) {
        self.0.store(ready, Ordering::Release);
    }
}

fn probe_once(path: &Path) -> bool {
    use std::fs::OpenOptions;
    use std::os::unix::fs::FileExt;

    let file = match OpenOptions::new().read(true).write(true).open(path) {
        Ok(f) => f,
        Err(e) => {
            warn!(error = %e, path = %path.display(), "device probe: open failed");
            return false;
        }
    };
    if let Err(e) = file.sync_all() {
        warn!(error = %e, "device probe: fsync failed");
        return false;
    }
    let mut buf = [0u8; 4];
    match file.read_at(&mut buf, 0) {
        Ok(_) => true,
        Err(e) => {
            warn!(error = %e, "device probe: read failed");
            false
        }
    }
}

/// Handle to the background readiness-monitor thread.
pub struct DeviceMonitor {
    ready: Arc<DeviceReady>,
    handle: Option<JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
}

impl DeviceMonitor {
    /// Spawns the monitor thread, probing `path` every
    /// [`PROBE_INTERVAL_READY`] while ready or [`PROBE_INTERVAL_NOT_READY`]
    /// while not, matching the reference's asymmetric polling cadence.
    #[must_use]
    pub fn spawn(path: PathBuf, ready: Arc<DeviceReady>) -> Self {
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_clone = Arc::clone(&shutdown);
        let ready_clone = Arc::clone(&ready);

        // Probe once immediately so a fresh device doesn't sit "not ready"
        // for a full interval before the first sync write can proceed.
        let initial = probe_once(&path);
        ready_clone.set(initial);
        debug!(ready = initial, "initial device probe");

        let handle = thread::spawn(move || {
            while !shutdown_clone.load(Ordering::Relaxed) {
                let interval = if ready_clone.is_ready() {
                    PROBE_INTERVAL_READY
                } else {
                    PROBE_INTERVAL_NOT_READY
                };
                interruptible_sleep(interval, &shutdown_clone);
                if shutdown_clone.load(Ordering::Relaxed) {
                    break;
                }
                let ok = probe_once(&path);
                if ok != ready_clone.is_ready() {
                    debug!(ready = ok, "device readiness changed");
                }
                ready_clone.set(ok);
            }
        });

        Self {
            ready,
            handle: Some(handle),
            shutdown,
        }
    }

    /// Shared readiness flag this monitor maintains.
    #[must_use]
    pub fn ready_flag(&self) -> Arc<DeviceReady> {
        Arc::clone(&self.ready)
    }

    /// Signals the monitor thread to stop and waits for it to exit.
    pub fn shutdown(mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for DeviceMonitor {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod monitor_tests;
