//! Single-writer raw device access: header persistence and indexed entry
//! writes.
//!
//! Grounded on `journal_writer.c`: the on-disk file is addressed purely by
//! positional I/O (`pread`/`pwrite` there, [`FileExt::read_at`]/
//! [`FileExt::write_at`] here) rather than a shared cursor, and every header
//! update is retried a few times before being treated as fatal, since a
//! torn header write would make the whole ring unreadable.

use std::fs::{File, OpenOptions};
use std::os::unix::fs::FileExt;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::format::{self, DecodedEntry, Header, Payload, ENTRY_SIZE, HEADER_SIZE};
use crate::monitor::DeviceReady;

/// Number of attempts made to persist the header before giving up.
const HEADER_PERSIST_RETRIES: u32 = 3;

/// Delay between header persist retries.
const HEADER_PERSIST_RETRY_DELAY: Duration = Duration::from_millis(1);

struct WriterState {
    file: File,
    start_index: u64,
    end_index: u64,
    /// Disambiguates `start_index == end_index` meaning empty from the same
    /// equality meaning the ring is completely full, since both indices are
    /// kept in `[0, num_entries)` rather than left to grow unbounded.
    full: bool,
}

/// Owns the backing file handle and enforces single-writer access to the
/// on-disk ring.
pub struct RawWriter {
    path: PathBuf,
    num_entries: u64,
    state: Mutex<WriterState>,
}

impl RawWriter {
    /// Opens (creating if necessary) the backing device at `path`, sized to
    /// `device_size` bytes, and loads or initializes its header.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file cannot be opened, sized, or read,
    /// and [`Error::InvalidHeader`] if an existing header is malformed
    /// beyond what a fresh initialization can recover from.
    pub fn open(path: &Path, device_size: u64) -> Result<Self> {
        let num_entries = format::num_entries(device_size);
        if num_entries == 0 {
            return Err(Error::InvalidHeader(
                "device too small to hold a single entry".to_string(),
            ));
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;
        let current_len = file.metadata()?.len();
        if current_len < device_size {
            file.set_len(device_size)?;
        }

        let (start_index, end_index, full) = match Self::read_header_from(&file) {
            Ok(header) if header.checksum_valid() && header.indices_in_bounds(num_entries) => {
                (header.start_index, header.end_index, header.full)
            }
            Ok(header) => {
                warn!(
                    magic = header.magic,
                    version = header.version,
                    "existing journal header failed checksum or bounds check, reinitializing"
                );
                (0, 0, false)
            }
            Err(_) => (0, 0, false),
        };

        let writer = Self {
            path: path.to_path_buf(),
            num_entries,
            state: Mutex::new(WriterState {
                file,
                start_index,
                end_index,
                full,
            }),
        };
        writer.persist_header_with_retry(start_index, end_index, full)?;
        Ok(writer)
    }

    /// Path this writer was opened against.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of fixed-size entry slots the ring holds.
    #[must_use]
    pub fn num_entries(&self) -> u64 {
        self.num_entries
    }

    /// Re-opens the backing file fresh. Called whenever an operation against
    /// the cached handle fails, instead of probing the handle's validity
    /// beforehand (Design Notes item 3: a cached-fd-with-liveness-check is
    /// fragile; a resource re-opened on demand on actual failure is not).
    fn reopen(&self, state: &mut WriterState) -> Result<()> {
        let file = OpenOptions::new().read(true).write(true).open(&self.path)?;
        state.file = file;
        Ok(())
    }

    fn read_header_from(file: &File) -> Result<Header> {
        let mut buf = [0u8; HEADER_SIZE];
        file.read_at(&mut buf, 0)?;
        Header::decode(&buf)
    }

    /// Reads and validates the current on-disk header.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] on read failure or [`Error::InvalidHeader`] if
    /// the header is malformed.
    pub fn read_header(&self) -> Result<Header> {
        let state = self.state.lock();
        Self::read_header_from(&state.file)
    }

    /// Current `(start_index, end_index)` pair.
    #[must_use]
    pub fn indices(&self) -> (u64, u64) {
        let state = self.state.lock();
        (state.start_index, state.end_index)
    }

    /// Whether the ring currently holds `num_entries` live entries.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.state.lock().full
    }

    fn persist_header_with_retry(&self, start_index: u64, end_index: u64, full: bool) -> Result<()> {
        let header = Header::new(start_index, end_index, full);
        let encoded = header.encode();
        let mut last_err = None;
        for attempt in 1..=HEADER_PERSIST_RETRIES {
            let mut state = self.state.lock();
            match state
                .file
                .write_at(&encoded, 0)
                .and_then(|_| state.file.sync_all())
            {
                Ok(()) => return Ok(()),
                Err(e) => {
                    warn!(attempt, error = %e, "header persist attempt failed, reopening device");
                    if let Err(reopen_err) = self.reopen(&mut state) {
                        warn!(attempt, error = %reopen_err, "reopen after header persist failure also failed");
                    }
                    last_err = Some(e);
                }
            }
            drop(state);
            thread::sleep(HEADER_PERSIST_RETRY_DELAY);
        }
        Err(last_err.map(Error::Io).unwrap_or(Error::InvalidHeader(
            "header persist exhausted retries".to_string(),
        )))
    }

    /// Writes a single payload at the next ring slot, evicting the oldest
    /// entry on overflow, and fsyncs both the entry and the updated header
    /// before returning. Used by the synchronous logging path.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DeviceNotReady`] if `device_ready` does not report the
    /// backing device usable, without touching the ring. Returns
    /// [`Error::Io`] on write/sync failure.
    pub fn write_sync(&self, payload: &Payload, device_ready: &DeviceReady) -> Result<u64> {
        if !device_ready.is_ready() {
            return Err(Error::DeviceNotReady);
        }
        self.write_one(payload, true)
    }

    /// Writes a batch of payloads, persisting the header once after the
    /// whole batch lands. Used by the async flusher to amortize fsync cost
    /// across coalesced events.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BatchWriteFailed`] on the first write/sync failure,
    /// reporting how many of the batch were durably written before it. Those
    /// entries remain on disk; the header is only advanced past them once
    /// the whole batch succeeds, so an aborted batch is invisible to replay
    /// until overwritten.
    pub fn write_batch(&self, payloads: &[Payload]) -> Result<()> {
        if payloads.is_empty() {
            return Ok(());
        }
        let last = payloads.len() - 1;
        for (i, payload) in payloads.iter().enumerate() {
            if let Err(source) = self.write_one(payload, i == last) {
                return Err(Error::BatchWriteFailed {
                    written: i,
                    total: payloads.len(),
                    source: Box::new(source),
                });
            }
        }
        Ok(())
    }

    fn write_one(&self, payload: &Payload, fsync: bool) -> Result<u64> {
        let encoded = format::encode_entry(payload);
        let (index, start_index, end_index, full) = {
            let mut state = self.state.lock();
            let index = state.end_index;
            let offset = format::index_to_offset(index, self.num_entries);
            if let Err(e) = state.file.write_at(&encoded, offset) {
                warn!(index, error = %e, "entry write failed, reopening device and retrying once");
                self.reopen(&mut state)?;
                state.file.write_at(&encoded, offset)?;
            }
            if fsync {
                state.file.sync_data()?;
            }
            let next_end = (index + 1) % self.num_entries;
            if state.full {
                // Already full: the slot just written overwrote the oldest
                // live entry, so the ring's start advances with it.
                state.start_index = (state.start_index + 1) % self.num_entries;
            } else if next_end == state.start_index {
                state.full = true;
            }
            state.end_index = next_end;
            (index, state.start_index, state.end_index, state.full)
        };
        debug!(index, start_index, end_index, full, "wrote journal entry");
        if fsync {
            self.persist_header_with_retry(start_index, end_index, full)?;
        } else {
            // Header is persisted once by the caller after the batch completes;
            // keep the in-memory indices authoritative until then.
        }
        Ok(index)
    }

    /// Reads and decodes the entry at ring index `index`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] on read failure or [`Error::InvalidHeader`] if
    /// the slot cannot be decoded at all.
    pub fn read_entry(&self, index: u64) -> Result<DecodedEntry> {
        let offset = format::index_to_offset(index, self.num_entries);
        let mut buf = vec![0u8; ENTRY_SIZE as usize];
        {
            let state = self.state.lock();
            state.file.read_at(&mut buf, offset)?;
        }
        format::decode_entry(&buf)
    }
}

#[cfg(test)]
mod writer_tests;
