//! Error types for the journaling engine.

use thiserror::Error;

/// Errors produced by the journaling engine's internal operations.
///
/// None of these ever reach the filesystem caller of
/// [`crate::context::JournalContext::log_metadata`] — that surface is
/// deliberately infallible. `Error` exists so internal
/// code can propagate failures with `?` and log them at the point where the
/// public, non-fallible API swallows them.
#[derive(Debug, Error)]
pub enum Error {
    /// Underlying I/O failure against the raw device.
    #[error("journal I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The on-disk header failed magic/version/CRC/bounds validation.
    #[error("invalid journal header: {0}")]
    InvalidHeader(String),

    /// An entry's stored CRC32 did not match the recomputed checksum.
    #[error("CRC mismatch at journal index {index}")]
    CrcMismatch {
        /// Ring index of the offending entry.
        index: u64,
    },

    /// The bounded in-memory queue was full when an enqueue was attempted.
    #[error("journal queue is full, event dropped")]
    QueueFull,

    /// A synchronous write was attempted while the backing device was not
    /// yet probed as ready.
    #[error("journal device is not ready")]
    DeviceNotReady,

    /// Replay stopped at the first entry that violated an ordering or
    /// format invariant.
    #[error("replay failed at index {index}: {reason}")]
    ReplayFailed {
        /// Ring index at which replay stopped.
        index: u64,
        /// Human-readable cause.
        reason: String,
    },

    /// Configuration could not be loaded or failed validation.
    #[error("journal configuration error: {0}")]
    Config(String),

    /// A batched write aborted partway through. `written` of `total`
    /// payloads made it to disk before `source` occurred; the caller is
    /// expected to count the remainder as dropped.
    #[error("batch write failed after {written} of {total} entries: {source}")]
    BatchWriteFailed {
        /// Number of payloads in the batch durably written before the
        /// failure (the failing one itself is not counted as written).
        written: usize,
        /// Total number of payloads the batch was asked to write.
        total: usize,
        /// The underlying failure.
        #[source]
        source: Box<Error>,
    },
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
