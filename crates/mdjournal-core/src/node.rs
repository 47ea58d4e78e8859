//! Caller-facing input types for [`crate::context::JournalContext::log_metadata`].
//!
//! These stand in for the filesystem server's own inode structure and
//! syscall argument bundle; the server builds one of each per metadata
//! change and hands them to the logger, which is the only place the two
//! are translated into an on-disk [`crate::format::Payload`].

/// A read-only snapshot of the inode fields a journal entry records.
///
/// Fields the caller cannot or does not want to supply are `None`, which
/// the logger reflects as absent (`has_*` flags cleared) in the stored
/// payload rather than guessing a value.
#[derive(Debug, Clone, Copy, Default)]
pub struct NodeSnapshot {
    /// Inode number the event concerns.
    pub ino: u32,
    /// Mode bits, if known at log time.
    pub st_mode: Option<u32>,
    /// Size in bytes, if known at log time.
    pub st_size: Option<u64>,
    /// Current link count.
    pub st_nlink: u64,
    /// Current block count.
    pub st_blocks: u64,
    /// Modification time, in seconds since the epoch.
    pub mtime: i64,
    /// Change time, in seconds since the epoch.
    pub ctime: i64,
    /// Owning uid, if known at log time.
    pub uid: Option<u32>,
    /// Owning gid, if known at log time.
    pub gid: Option<u32>,
}

impl NodeSnapshot {
    /// Starts a snapshot for `ino` with every other field at its default.
    #[must_use]
    pub fn new(ino: u32) -> Self {
        Self {
            ino,
            ..Self::default()
        }
    }
}

/// How urgently a logged event needs to reach the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Durability {
    /// Enqueue for the background flusher; returns immediately.
    #[default]
    Async,
    /// Write and fsync before returning, once the device is ready.
    Sync,
}

/// Action-specific context describing what happened, beyond the inode
/// snapshot itself.
#[derive(Debug, Clone, Default)]
pub struct LogMetadataInfo {
    /// Action name, e.g. `"create"`, `"unlink"`, `"rename"`, `"chmod"`.
    pub action: String,
    /// Parent directory inode, for directory-entry actions.
    pub parent_ino: u32,
    /// Source parent inode, for rename.
    pub src_parent_ino: u32,
    /// Destination parent inode, for rename.
    pub dst_parent_ino: u32,
    /// Affected file name.
    pub name: String,
    /// Previous name, for rename.
    pub old_name: String,
    /// New name, for rename.
    pub new_name: String,
    /// Symlink/hardlink target, when applicable.
    pub target: String,
    /// Free-form extra context (e.g. `"mode=0755"`).
    pub extra: String,
}

impl LogMetadataInfo {
    /// Starts an info record for `action` with every other field empty.
    #[must_use]
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            ..Self::default()
        }
    }
}
