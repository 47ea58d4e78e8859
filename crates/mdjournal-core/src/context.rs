//! Ties the queue, writer, and device monitor into the single owned state
//! the filesystem server holds and calls into.
//!
//! `journal_queue.c` keeps this as a set of process globals (`journal_queue`,
//! `journal_fd`, `device_ready`, ...); see `DESIGN.md` for why this crate
//! collects them into one [`JournalContext`] value the caller owns and
//! threads explicitly instead.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{error, info, warn};

use crate::config::JournalConfig;
use crate::error::Result;
use crate::format::Payload;
use crate::monitor::{DeviceMonitor, DeviceReady};
use crate::node::{Durability, LogMetadataInfo, NodeSnapshot};
use crate::queue::BoundedQueue;
use crate::replay::Replayer;
use crate::writer::RawWriter;

/// Owns every piece of mutable state the journaling engine needs: the
/// bounded queue, the single raw-device writer, the device-readiness flag,
/// and the background flusher and monitor threads.
///
/// Created once via [`JournalContext::init`] and held by the caller for the
/// lifetime of the filesystem server; [`JournalContext::shutdown`] tears
/// down both background threads and must be called before the value is
/// dropped if a clean final flush is required.
pub struct JournalContext {
    config: JournalConfig,
    queue: Arc<BoundedQueue>,
    writer: Arc<RawWriter>,
    device_ready: Arc<DeviceReady>,
    monitor: Mutex<Option<DeviceMonitor>>,
    flusher: Mutex<Option<JoinHandle<()>>>,
    shutdown: Arc<AtomicBool>,
    next_tx_id: AtomicU64,
}

impl JournalContext {
    /// Opens the backing device, replays any entries already on it,
    /// and starts the background flusher and device monitor threads.
    ///
    /// Replay happens once here, synchronously, before the flusher starts,
    /// so a crash-recovered entry is never interleaved with a freshly
    /// logged one. A replay failure is logged and otherwise ignored: a
    /// corrupt pre-existing journal should not prevent the server from
    /// starting to log new events.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing device cannot be opened or sized.
    pub fn init(config: JournalConfig) -> Result<Arc<Self>> {
        let device_path = PathBuf::from(&config.raw_device_path);
        let writer = Arc::new(RawWriter::open(&device_path, config.raw_device_size)?);

        match Replayer::replay_from_file(&device_path) {
            Ok(report) => info!(
                entries = report.entries.len(),
                warnings = report.warnings.len(),
                "startup replay complete"
            ),
            Err(e) => warn!(error = %e, "startup replay failed, continuing with a fresh append point"),
        }

        let queue = Arc::new(BoundedQueue::new(config.queue_capacity));
        let device_ready = Arc::new(DeviceReady::new());
        let monitor = DeviceMonitor::spawn(device_path, Arc::clone(&device_ready));
        let shutdown = Arc::new(AtomicBool::new(false));

        let coalescing_window = Duration::from_millis(config.coalescing_window_ms);
        let flusher = spawn_flusher(
            Arc::clone(&queue),
            Arc::clone(&writer),
            Arc::clone(&device_ready),
            Arc::clone(&shutdown),
            coalescing_window,
        );

        Ok(Arc::new(Self {
            config,
            queue,
            writer,
            device_ready,
            monitor: Mutex::new(Some(monitor)),
            flusher: Mutex::new(Some(flusher)),
            shutdown,
            next_tx_id: AtomicU64::new(0),
        }))
    }

    /// Path to the backing device this context was opened against.
    #[must_use]
    pub fn device_path(&self) -> &Path {
        self.writer.path()
    }

    /// Allocates the next process-monotonic transaction id.
    fn next_tx_id(&self) -> u64 {
        self.next_tx_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Logs one metadata event. Infallible to the caller: every failure
    /// mode (ignored inode, full queue, device not ready, I/O error) is
    /// logged and otherwise silently absorbed, since a filesystem
    /// operation must never fail because its journal entry could not be
    /// written.
    pub fn log_metadata(&self, node: &NodeSnapshot, info: LogMetadataInfo, durability: Durability) {
        if self.config.ignore_inodes.contains(&node.ino) {
            return;
        }

        let payload = self.build_payload(node, info);

        match durability {
            Durability::Sync if self.device_ready.is_ready() => {
                if let Err(e) = self.writer.write_sync(&payload, &self.device_ready) {
                    error!(ino = node.ino, error = %e, "sync journal write failed");
                }
            }
            Durability::Sync => {
                // Device not ready: fall back to the async path rather than
                // dropping the entry outright, matching the Async arm below.
                warn!(ino = node.ino, "device not ready for sync write, enqueuing instead");
                if let Err(e) = self.queue.try_enqueue(payload) {
                    warn!(ino = node.ino, error = %e, "journal queue full, event dropped");
                }
            }
            Durability::Async => {
                if let Err(e) = self.queue.try_enqueue(payload) {
                    warn!(ino = node.ino, error = %e, "journal queue full, event dropped");
                }
            }
        }
    }

    fn build_payload(&self, node: &NodeSnapshot, info: LogMetadataInfo) -> Payload {
        let timestamp_ms = now_ms();
        let mtime = clamp_time(node.mtime, &self.config);
        let ctime = clamp_time(node.ctime, &self.config);

        Payload {
            tx_id: self.next_tx_id(),
            timestamp_ms,
            parent_ino: info.parent_ino,
            src_parent_ino: info.src_parent_ino,
            dst_parent_ino: info.dst_parent_ino,
            ino: node.ino,
            st_mode: node.st_mode.unwrap_or(0),
            st_size: node.st_size.unwrap_or(0),
            st_nlink: node.st_nlink,
            st_blocks: node.st_blocks,
            mtime,
            ctime,
            uid: node.uid.unwrap_or(0),
            gid: node.gid.unwrap_or(0),
            has_mode: node.st_mode.is_some(),
            has_size: node.st_size.is_some(),
            has_uid: node.uid.is_some(),
            has_gid: node.gid.is_some(),
            action: info.action,
            name: info.name,
            old_name: info.old_name,
            new_name: info.new_name,
            target: info.target,
            extra: info.extra,
        }
    }

    /// Forces whatever is currently queued to be written and fsynced
    /// immediately, without waiting for the flusher's coalescing window.
    pub fn flush(&self) {
        let pending = self.queue.drain_now();
        if pending.is_empty() {
            return;
        }
        if let Err(e) = self.writer.write_batch(&pending) {
            report_batch_failure(&self.queue, &e);
        }
    }

    /// Total number of events dropped because the queue was full.
    #[must_use]
    pub fn dropped_events(&self) -> u64 {
        self.queue.dropped_events()
    }

    /// Whether the backing device is currently probed as ready for
    /// synchronous writes.
    #[must_use]
    pub fn device_ready(&self) -> bool {
        self.device_ready.is_ready()
    }

    /// Stops the background flusher and device monitor threads, flushing
    /// whatever remains queued first. Safe to call more than once.
    pub fn shutdown(&self) {
        if self.shutdown.swap(true, Ordering::SeqCst) {
            return;
        }
        self.queue.shutdown();
        if let Some(handle) = self.flusher.lock().take() {
            let _ = handle.join();
        }
        if let Some(monitor) = self.monitor.lock().take() {
            monitor.shutdown();
        }
    }
}

fn now_ms() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

fn clamp_time(seconds: i64, config: &JournalConfig) -> i64 {
    if seconds < config.min_reasonable_time || seconds > config.max_reasonable_time {
        -1
    } else {
        seconds
    }
}

fn spawn_flusher(
    queue: Arc<BoundedQueue>,
    writer: Arc<RawWriter>,
    device_ready: Arc<DeviceReady>,
    shutdown: Arc<AtomicBool>,
    coalescing_window: Duration,
) -> JoinHandle<()> {
    thread::Builder::new()
        .name("mdjournal-flusher".to_string())
        .spawn(move || loop {
            let batch = queue.wait_and_drain_when_ready(coalescing_window, || device_ready.is_ready());
            if batch.is_empty() {
                if queue.is_shutdown() {
                    break;
                }
                continue;
            }
            if let Err(e) = writer.write_batch(&batch) {
                report_batch_failure(&queue, &e);
            }
            if queue.is_shutdown() && queue.is_empty() {
                break;
            }
        })
        .expect("failed to spawn journal flusher thread")
}

/// Logs a batch-write failure and counts the entries that never got a
/// chance to write (the remainder after the first failure) as dropped
/// rather than silently losing track of them.
fn report_batch_failure(queue: &BoundedQueue, e: &crate::error::Error) {
    if let crate::error::Error::BatchWriteFailed { written, total, .. } = e {
        let remaining = (*total - *written) as u64;
        error!(written, total, error = %e, "batched journal write failed partway through");
        queue.record_dropped(remaining);
    } else {
        error!(error = %e, "batched journal write failed");
    }
}

#[cfg(test)]
mod context_tests;
