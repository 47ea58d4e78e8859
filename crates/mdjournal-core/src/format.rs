//! Binary on-disk format: header, fixed-size entry, and payload.
//!
//! Every on-disk structure is hand-serialized to fixed-width little-endian
//! fields rather than cast from host struct layout (see `DESIGN.md`), the
//! same discipline the storage engine's WAL and mmap records apply to
//! themselves.

use crate::error::{Error, Result};

/// On-disk magic identifying a valid header or entry: ASCII `"JNL0"`.
pub const JOURNAL_MAGIC: u32 = 0x4A4E_4C30;

/// Current on-disk format version.
pub const JOURNAL_VERSION: u32 = 1;

/// Maximum length, including the NUL terminator, of each string field.
pub const MAX_FIELD_LEN: usize = 256;

/// Fixed size in bytes of every on-disk entry slot.
pub const ENTRY_SIZE: u64 = 4096;

/// Size in bytes of the reserved header region at the start of the device.
pub const HEADER_REGION: u64 = 4096;

/// Byte size of the serialized [`Payload`].
pub const PAYLOAD_SIZE: usize = 8 * 5 + 8 * 2 + 4 * 7 + 4 + MAX_FIELD_LEN * 6;

/// Byte size of the serialized [`Header`].
pub const HEADER_SIZE: usize = 4 + 4 + 8 + 8 + 1 + 4;

const _: () = assert!(PAYLOAD_SIZE + 12 <= ENTRY_SIZE as usize, "payload must fit in one entry");

/// Number of fixed-size entry slots a device of `device_size` bytes holds.
#[must_use]
pub fn num_entries(device_size: u64) -> u64 {
    device_size.saturating_sub(HEADER_REGION) / ENTRY_SIZE
}

/// Maps a logical ring index to its byte offset on the device.
#[must_use]
pub fn index_to_offset(index: u64, num_entries: u64) -> u64 {
    HEADER_REGION + (index % num_entries) * ENTRY_SIZE
}

/// The journal's on-disk header, persisted at offset 0.
///
/// `start_index` and `end_index` are always physical ring positions in
/// `[0, N)`, matching the literal invariant in `spec.md` §3/§8. Read alone,
/// `start_index == end_index` cannot distinguish an empty ring from a full
/// one once occupancy reaches `N` (the worked eviction example in `spec.md`
/// §8.4 collapses to exactly that case). `full` is the one bit of
/// additional state that disambiguates the two without widening either
/// index field outside its documented bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Header {
    /// Format magic, must equal [`JOURNAL_MAGIC`].
    pub magic: u32,
    /// Format version, must equal [`JOURNAL_VERSION`].
    pub version: u32,
    /// Ring index of the oldest valid entry. Always `< N`.
    pub start_index: u64,
    /// Ring index the next entry will be written to. Always `< N`.
    pub end_index: u64,
    /// Whether the ring holds exactly `N` live entries. Disambiguates
    /// `start_index == end_index` (empty when `false`, full when `true`).
    pub full: bool,
    /// CRC32 over the header with this field zeroed.
    pub crc32: u32,
}

impl Header {
    /// Builds a header for ring positions `start_index`/`end_index` with a
    /// freshly computed CRC.
    #[must_use]
    pub fn new(start_index: u64, end_index: u64, full: bool) -> Self {
        let mut h = Self {
            magic: JOURNAL_MAGIC,
            version: JOURNAL_VERSION,
            start_index,
            end_index,
            full,
            crc32: 0,
        };
        h.crc32 = h.compute_crc();
        h
    }

    /// Recomputes the CRC32 this header *should* carry, with the `crc32`
    /// field zeroed during the computation.
    #[must_use]
    pub fn compute_crc(&self) -> u32 {
        let mut zeroed = *self;
        zeroed.crc32 = 0;
        crate::crc32::crc32(&zeroed.encode())
    }

    /// Whether `magic`, `version`, and `crc32` are all self-consistent.
    #[must_use]
    pub fn checksum_valid(&self) -> bool {
        self.magic == JOURNAL_MAGIC && self.version == JOURNAL_VERSION && self.crc32 == self.compute_crc()
    }

    /// Whether the indices fall within the bounds a ring of `num_entries`
    /// slots allows.
    #[must_use]
    pub fn indices_in_bounds(&self, num_entries: u64) -> bool {
        self.start_index < num_entries && self.end_index < num_entries
    }

    /// Whether the ring this header describes holds no live entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        !self.full && self.start_index == self.end_index
    }

    /// Number of live entries a ring of `num_entries` slots holds, given
    /// this header's indices and `full` flag.
    #[must_use]
    pub fn occupancy(&self, num_entries: u64) -> u64 {
        if self.full {
            num_entries
        } else {
            (self.end_index + num_entries - self.start_index) % num_entries
        }
    }

    /// Serializes the header to its fixed-size on-disk representation.
    #[must_use]
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        let mut off = 0;
        buf[off..off + 4].copy_from_slice(&self.magic.to_le_bytes());
        off += 4;
        buf[off..off + 4].copy_from_slice(&self.version.to_le_bytes());
        off += 4;
        buf[off..off + 8].copy_from_slice(&self.start_index.to_le_bytes());
        off += 8;
        buf[off..off + 8].copy_from_slice(&self.end_index.to_le_bytes());
        off += 8;
        buf[off] = u8::from(self.full);
        off += 1;
        buf[off..off + 4].copy_from_slice(&self.crc32.to_le_bytes());
        buf
    }

    /// Deserializes a header from exactly [`HEADER_SIZE`] bytes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidHeader`] if `buf` is shorter than
    /// [`HEADER_SIZE`].
    pub fn decode(buf: &[u8]) -> Result<Self> {
        if buf.len() < HEADER_SIZE {
            return Err(Error::InvalidHeader("short read".to_string()));
        }
        let mut off = 0;
        let magic = u32::from_le_bytes(buf[off..off + 4].try_into().unwrap());
        off += 4;
        let version = u32::from_le_bytes(buf[off..off + 4].try_into().unwrap());
        off += 4;
        let start_index = u64::from_le_bytes(buf[off..off + 8].try_into().unwrap());
        off += 8;
        let end_index = u64::from_le_bytes(buf[off..off + 8].try_into().unwrap());
        off += 8;
        let full = buf[off] != 0;
        off += 1;
        let crc32 = u32::from_le_bytes(buf[off..off + 4].try_into().unwrap());
        Ok(Self {
            magic,
            version,
            start_index,
            end_index,
            full,
            crc32,
        })
    }
}

/// The logical event describing a metadata change and its inode context.
///
/// Created once by the logger API and never mutated afterward; either
/// enqueued for the async flusher or written directly by the sync path.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Payload {
    /// Process-monotonic transaction id.
    pub tx_id: u64,
    /// Wall-clock stamp in milliseconds at creation time.
    pub timestamp_ms: u64,
    /// Parent directory inode, for actions involving a directory entry.
    pub parent_ino: u32,
    /// Source parent inode, for rename.
    pub src_parent_ino: u32,
    /// Destination parent inode, for rename.
    pub dst_parent_ino: u32,
    /// Inode the event is about.
    pub ino: u32,
    /// Mode bits at the time of the event.
    pub st_mode: u32,
    /// Size at the time of the event.
    pub st_size: u64,
    /// Link count at the time of the event.
    pub st_nlink: u64,
    /// Block count at the time of the event.
    pub st_blocks: u64,
    /// Modification time, or `-1` if outside the plausible range.
    pub mtime: i64,
    /// Change time, or `-1` if outside the plausible range.
    pub ctime: i64,
    /// Owner uid, meaningful only when `has_uid`.
    pub uid: u32,
    /// Owner gid, meaningful only when `has_gid`.
    pub gid: u32,
    /// Whether `st_mode` was explicitly supplied (vs. snapshot default).
    pub has_mode: bool,
    /// Whether `st_size` was explicitly supplied (vs. snapshot default).
    pub has_size: bool,
    /// Whether `uid` is meaningful.
    pub has_uid: bool,
    /// Whether `gid` is meaningful.
    pub has_gid: bool,
    /// Action name, e.g. `"create"`, `"unlink"`, `"rename"`.
    pub action: String,
    /// Affected file name.
    pub name: String,
    /// Previous name, for rename.
    pub old_name: String,
    /// New name, for rename.
    pub new_name: String,
    /// Symlink/hardlink target, when applicable.
    pub target: String,
    /// Free-form extra context (e.g. `"chmod mode=0755"`).
    pub extra: String,
}

fn encode_field(buf: &mut [u8], s: &str) {
    debug_assert!(buf.len() == MAX_FIELD_LEN);
    let bytes = s.as_bytes();
    let n = bytes.len().min(MAX_FIELD_LEN - 1);
    buf[..n].copy_from_slice(&bytes[..n]);
    // Remainder (including byte `n`) stays zeroed: NUL termination.
}

fn decode_field(buf: &[u8]) -> String {
    let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    String::from_utf8_lossy(&buf[..end]).into_owned()
}

impl Payload {
    /// Serializes the payload to its fixed-size on-disk representation.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = vec![0u8; PAYLOAD_SIZE];
        let mut off = 0;
        macro_rules! put_u64 {
            ($v:expr) => {{
                buf[off..off + 8].copy_from_slice(&$v.to_le_bytes());
                off += 8;
            }};
        }
        macro_rules! put_u32 {
            ($v:expr) => {{
                buf[off..off + 4].copy_from_slice(&$v.to_le_bytes());
                off += 4;
            }};
        }
        macro_rules! put_i64 {
            ($v:expr) => {{
                buf[off..off + 8].copy_from_slice(&$v.to_le_bytes());
                off += 8;
            }};
        }

        put_u64!(self.tx_id);
        put_u64!(self.timestamp_ms);
        put_u32!(self.parent_ino);
        put_u32!(self.src_parent_ino);
        put_u32!(self.dst_parent_ino);
        put_u32!(self.ino);
        put_u32!(self.st_mode);
        put_u64!(self.st_size);
        put_u64!(self.st_nlink);
        put_u64!(self.st_blocks);
        put_i64!(self.mtime);
        put_i64!(self.ctime);
        put_u32!(self.uid);
        put_u32!(self.gid);
        buf[off] = u8::from(self.has_mode);
        off += 1;
        buf[off] = u8::from(self.has_size);
        off += 1;
        buf[off] = u8::from(self.has_uid);
        off += 1;
        buf[off] = u8::from(self.has_gid);
        off += 1;

        for field in [
            &self.action,
            &self.name,
            &self.old_name,
            &self.new_name,
            &self.target,
            &self.extra,
        ] {
            encode_field(&mut buf[off..off + MAX_FIELD_LEN], field);
            off += MAX_FIELD_LEN;
        }

        debug_assert_eq!(off, PAYLOAD_SIZE);
        buf
    }

    /// Deserializes a payload from exactly [`PAYLOAD_SIZE`] bytes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidHeader`] if `buf` is shorter than
    /// [`PAYLOAD_SIZE`] (reused as a generic "malformed on-disk data" case).
    pub fn decode(buf: &[u8]) -> Result<Self> {
        if buf.len() < PAYLOAD_SIZE {
            return Err(Error::InvalidHeader("short payload".to_string()));
        }
        let mut off = 0;
        macro_rules! get_u64 {
            () => {{
                let v = u64::from_le_bytes(buf[off..off + 8].try_into().unwrap());
                off += 8;
                v
            }};
        }
        macro_rules! get_u32 {
            () => {{
                let v = u32::from_le_bytes(buf[off..off + 4].try_into().unwrap());
                off += 4;
                v
            }};
        }
        macro_rules! get_i64 {
            () => {{
                let v = i64::from_le_bytes(buf[off..off + 8].try_into().unwrap());
                off += 8;
                v
            }};
        }

        let tx_id = get_u64!();
        let timestamp_ms = get_u64!();
        let parent_ino = get_u32!();
        let src_parent_ino = get_u32!();
        let dst_parent_ino = get_u32!();
        let ino = get_u32!();
        let st_mode = get_u32!();
        let st_size = get_u64!();
        let st_nlink = get_u64!();
        let st_blocks = get_u64!();
        let mtime = get_i64!();
        let ctime = get_i64!();
        let uid = get_u32!();
        let gid = get_u32!();
        let has_mode = buf[off] != 0;
        off += 1;
        let has_size = buf[off] != 0;
        off += 1;
        let has_uid = buf[off] != 0;
        off += 1;
        let has_gid = buf[off] != 0;
        off += 1;

        let mut fields: Vec<String> = Vec::with_capacity(6);
        for _ in 0..6 {
            fields.push(decode_field(&buf[off..off + MAX_FIELD_LEN]));
            off += MAX_FIELD_LEN;
        }
        let mut fields = fields.into_iter();
        let action = fields.next().unwrap();
        let name = fields.next().unwrap();
        let old_name = fields.next().unwrap();
        let new_name = fields.next().unwrap();
        let target = fields.next().unwrap();
        let extra = fields.next().unwrap();

        Ok(Self {
            tx_id,
            timestamp_ms,
            parent_ino,
            src_parent_ino,
            dst_parent_ino,
            ino,
            st_mode,
            st_size,
            st_nlink,
            st_blocks,
            mtime,
            ctime,
            uid,
            gid,
            has_mode,
            has_size,
            has_uid,
            has_gid,
            action,
            name,
            old_name,
            new_name,
            target,
            extra,
        })
    }
}

/// A decoded on-disk entry: the envelope around a [`Payload`].
#[derive(Debug, Clone)]
pub struct DecodedEntry {
    /// Magic read from the entry header.
    pub magic: u32,
    /// Version read from the entry header.
    pub version: u32,
    /// The decoded payload.
    pub payload: Payload,
    /// CRC32 stored in the entry trailer.
    pub stored_crc: u32,
    /// CRC32 recomputed over the payload region.
    pub computed_crc: u32,
}

impl DecodedEntry {
    /// Whether magic, version, and CRC all check out.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.magic == JOURNAL_MAGIC && self.version == JOURNAL_VERSION && self.stored_crc == self.computed_crc
    }
}

/// Encodes `payload` into a fixed [`ENTRY_SIZE`]-byte on-disk entry buffer.
///
/// The CRC is computed over the payload region only, per the resolution of
/// the reference's two inconsistent CRC schemes (`DESIGN.md`).
#[must_use]
pub fn encode_entry(payload: &Payload) -> Vec<u8> {
    let mut buf = vec![0u8; ENTRY_SIZE as usize];
    buf[0..4].copy_from_slice(&JOURNAL_MAGIC.to_le_bytes());
    buf[4..8].copy_from_slice(&JOURNAL_VERSION.to_le_bytes());

    let payload_bytes = payload.encode();
    buf[8..8 + PAYLOAD_SIZE].copy_from_slice(&payload_bytes);

    let crc = crate::crc32::crc32(&payload_bytes);
    let len = buf.len();
    buf[len - 4..].copy_from_slice(&crc.to_le_bytes());
    buf
}

/// Decodes one fixed-size entry buffer, recomputing its CRC for the caller
/// to compare against the stored value via [`DecodedEntry::is_valid`].
///
/// # Errors
///
/// Returns [`Error::InvalidHeader`] if `buf` is shorter than [`ENTRY_SIZE`]
/// or the embedded payload fails to decode.
pub fn decode_entry(buf: &[u8]) -> Result<DecodedEntry> {
    if (buf.len() as u64) < ENTRY_SIZE {
        return Err(Error::InvalidHeader("short entry read".to_string()));
    }
    let magic = u32::from_le_bytes(buf[0..4].try_into().unwrap());
    let version = u32::from_le_bytes(buf[4..8].try_into().unwrap());
    let payload_bytes = &buf[8..8 + PAYLOAD_SIZE];
    let stored_crc = u32::from_le_bytes(buf[buf.len() - 4..].try_into().unwrap());
    let computed_crc = crate::crc32::crc32(payload_bytes);
    let payload = Payload::decode(payload_bytes)?;

    Ok(DecodedEntry {
        magic,
        version,
        payload,
        stored_crc,
        computed_crc,
    })
}

#[cfg(test)]
mod format_tests;
