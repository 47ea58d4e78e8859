//! # mdjournal-core
//!
//! Crash-consistent metadata journaling engine for filesystem servers.
//!
//! A filesystem server calls [`JournalContext::log_metadata`] on every
//! metadata-affecting operation (create, unlink, rename, chmod, ...). Each
//! call is translated into a fixed-size, CRC32-checksummed entry appended
//! to a ring buffer on a raw backing device, either synchronously (for
//! operations that need an fsync guarantee before they return) or
//! asynchronously through a bounded queue drained by a background flusher
//! thread that coalesces concurrent writers into batched I/O.
//!
//! A separate [`Replayer`] validates and replays an on-disk journal,
//! checking header and entry CRCs and enforcing that timestamps never
//! regress beyond a small tolerance.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use mdjournal_core::{Durability, JournalConfig, JournalContext, LogMetadataInfo, NodeSnapshot};
//!
//! let config = JournalConfig::load(None)?;
//! let ctx = JournalContext::init(config)?;
//!
//! let node = NodeSnapshot::new(1234);
//! ctx.log_metadata(&node, LogMetadataInfo::new("create"), Durability::Async);
//!
//! ctx.shutdown();
//! # Ok::<(), mdjournal_core::Error>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod context;
pub mod crc32;
pub mod error;
pub mod format;
pub mod monitor;
pub mod node;
pub mod queue;
pub mod replay;
pub mod writer;

pub use config::JournalConfig;
pub use context::JournalContext;
pub use crc32::crc32 as crc32_checksum;
pub use error::{Error, Result};
pub use format::{DecodedEntry, Header, Payload, JOURNAL_MAGIC, JOURNAL_VERSION};
pub use monitor::{DeviceMonitor, DeviceReady};
pub use node::{Durability, LogMetadataInfo, NodeSnapshot};
pub use queue::BoundedQueue;
pub use replay::{ReplayReport, ReplayedEntry, Replayer};
pub use writer::RawWriter;
