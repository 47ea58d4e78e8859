//! Runtime configuration for the journaling engine.
//!
//! Layered the way the reference server configures itself: built-in
//! defaults, optionally overridden by a TOML file, optionally overridden
//! again by `JOURNAL_*` environment variables.

use std::collections::HashSet;
use std::path::Path;

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Reference default path for the backing raw device.
pub const DEFAULT_RAW_DEVICE_PATH: &str = "/tmp/journal-pipe";

/// Reference default device size: 8 MiB, yielding 2047 entries at `E = R = 4096`.
pub const DEFAULT_RAW_DEVICE_SIZE: u64 = 8 * 1024 * 1024;

/// Default coalescing window for the async flusher.
pub const DEFAULT_COALESCING_WINDOW_MS: u64 = 500;

/// Default bounded-queue capacity.
pub const DEFAULT_QUEUE_CAPACITY: usize = 4096;

/// Lower bound of the plausible timestamp range: 1980-01-01 UTC, in seconds.
pub const MIN_REASONABLE_TIME: i64 = 315_536_400;

/// Upper bound of the plausible timestamp range: 2500-01-01 UTC, in seconds.
pub const MAX_REASONABLE_TIME: i64 = 16_725_229_200;

/// Tolerance, in milliseconds, for a decreasing timestamp during replay
/// before it is treated as a hard ordering violation rather than a warning.
pub const DEFAULT_TIMESTAMP_SKEW_TOLERANCE_MS: i64 = 10_000;

/// Inode numbers the reference filesystem never journals events for.
///
/// Carried over from `IGNORE_INODE` in `journal_writer.c`; these are
/// bookkeeping inodes internal to the host filesystem, not user data.
fn default_ignore_inodes() -> HashSet<u32> {
    [82814, 48803, 49144, 49142, 48795, 48794]
        .into_iter()
        .collect()
}

/// Configuration controlling the journaling engine's behavior.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JournalConfig {
    /// Path to the backing raw device (or a regular file standing in for
    /// one in tests).
    pub raw_device_path: String,
    /// Size in bytes of the backing device; determines the ring capacity
    /// `N = (raw_device_size - R) / E`.
    pub raw_device_size: u64,
    /// Inode numbers that never produce journal entries.
    pub ignore_inodes: HashSet<u32>,
    /// Coalescing window, in milliseconds, the flusher waits to batch
    /// concurrent enqueues into a single I/O call.
    pub coalescing_window_ms: u64,
    /// Capacity of the in-memory bounded queue.
    pub queue_capacity: usize,
    /// Lower bound of the plausible `mtime`/`ctime` range, in seconds.
    pub min_reasonable_time: i64,
    /// Upper bound of the plausible `mtime`/`ctime` range, in seconds.
    pub max_reasonable_time: i64,
    /// Timestamp skew tolerated during replay before a decrease is fatal,
    /// in milliseconds.
    pub timestamp_skew_tolerance_ms: i64,
}

impl Default for JournalConfig {
    fn default() -> Self {
        Self {
            raw_device_path: DEFAULT_RAW_DEVICE_PATH.to_string(),
            raw_device_size: DEFAULT_RAW_DEVICE_SIZE,
            ignore_inodes: default_ignore_inodes(),
            coalescing_window_ms: DEFAULT_COALESCING_WINDOW_MS,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            min_reasonable_time: MIN_REASONABLE_TIME,
            max_reasonable_time: MAX_REASONABLE_TIME,
            timestamp_skew_tolerance_ms: DEFAULT_TIMESTAMP_SKEW_TOLERANCE_MS,
        }
    }
}

impl JournalConfig {
    /// Loads configuration from defaults, an optional TOML file, and
    /// `JOURNAL_*` environment variables, in that order of increasing
    /// precedence.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the TOML file or environment overrides
    /// fail to parse into a `JournalConfig`.
    pub fn load(toml_path: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(JournalConfig::default()));
        if let Some(path) = toml_path {
            figment = figment.merge(Toml::file(path));
        }
        figment = figment.merge(Env::prefixed("JOURNAL_"));
        figment
            .extract()
            .map_err(|e| Error::Config(e.to_string()))
    }

    /// Number of fixed-size entry slots the ring holds for this device size.
    #[must_use]
    pub fn num_entries(&self) -> u64 {
        crate::format::num_entries(self.raw_device_size)
    }
}

#[cfg(test)]
mod config_tests;
