use std::os::unix::fs::FileExt;

use tempfile::NamedTempFile;

use super::Replayer;
use crate::format::{self, Payload};
use crate::monitor::DeviceReady;
use crate::writer::RawWriter;

const DEVICE_SIZE: u64 = 8 * 1024 * 1024;

fn sample(tx_id: u64, ino: u32, timestamp_ms: u64) -> Payload {
    Payload {
        tx_id,
        ino,
        timestamp_ms,
        action: "create".to_string(),
        name: format!("file-{tx_id}"),
        ..Payload::default()
    }
}

fn ready_flag() -> DeviceReady {
    DeviceReady::always_ready()
}

#[test]
fn replay_empty_journal_yields_no_entries() {
    let tmp = NamedTempFile::new().unwrap();
    let _writer = RawWriter::open(tmp.path(), DEVICE_SIZE).unwrap();
    let report = Replayer::replay_from_file(tmp.path()).unwrap();
    assert!(report.entries.is_empty());
    assert!(report.warnings.is_empty());
}

#[test]
fn replay_recovers_entries_in_order() {
    let tmp = NamedTempFile::new().unwrap();
    let writer = RawWriter::open(tmp.path(), DEVICE_SIZE).unwrap();
    let ready = ready_flag();
    for i in 0..5 {
        writer.write_sync(&sample(i, 100 + i as u32, 1_000 + i), &ready).unwrap();
    }
    drop(writer);

    let report = Replayer::replay_from_file(tmp.path()).unwrap();
    assert_eq!(report.entries.len(), 5);
    for (i, entry) in report.entries.iter().enumerate() {
        assert_eq!(entry.payload.tx_id, i as u64);
    }
}

#[test]
fn replay_fails_on_corrupted_entry_crc() {
    let tmp = NamedTempFile::new().unwrap();
    let writer = RawWriter::open(tmp.path(), DEVICE_SIZE).unwrap();
    let ready = ready_flag();
    writer.write_sync(&sample(0, 1, 1_000), &ready).unwrap();
    writer.write_sync(&sample(1, 2, 1_001), &ready).unwrap();
    drop(writer);

    let file = std::fs::OpenOptions::new()
        .write(true)
        .open(tmp.path())
        .unwrap();
    let offset = format::index_to_offset(0, format::num_entries(DEVICE_SIZE)) + 20;
    file.write_at(&[0xFFu8], offset).unwrap();

    let err = Replayer::replay_from_file(tmp.path()).unwrap_err();
    assert!(matches!(err, crate::error::Error::CrcMismatch { index: 0 }));
}

#[test]
fn replay_rejects_decreasing_timestamp_beyond_tolerance() {
    let tmp = NamedTempFile::new().unwrap();
    let writer = RawWriter::open(tmp.path(), DEVICE_SIZE).unwrap();
    let ready = ready_flag();
    writer.write_sync(&sample(0, 1, 10_000), &ready).unwrap();
    writer.write_sync(&sample(1, 2, 1_000), &ready).unwrap();
    drop(writer);

    let err = Replayer::replay_from_file(tmp.path()).unwrap_err();
    assert!(matches!(err, crate::error::Error::ReplayFailed { index: 1, .. }));
}

#[test]
fn replay_warns_on_small_decreasing_timestamp_within_tolerance() {
    let tmp = NamedTempFile::new().unwrap();
    let writer = RawWriter::open(tmp.path(), DEVICE_SIZE).unwrap();
    let ready = ready_flag();
    writer.write_sync(&sample(0, 1, 10_000), &ready).unwrap();
    writer.write_sync(&sample(1, 2, 9_995), &ready).unwrap();
    drop(writer);

    let report = Replayer::replay_from_file(tmp.path()).unwrap();
    assert_eq!(report.entries.len(), 2);
    assert_eq!(report.warnings.len(), 1);
}

#[test]
fn replay_rejects_zero_inode_as_a_sanity_violation() {
    let tmp = NamedTempFile::new().unwrap();
    let writer = RawWriter::open(tmp.path(), DEVICE_SIZE).unwrap();
    writer.write_sync(&sample(0, 0, 1_000), &ready_flag()).unwrap();
    drop(writer);

    let err = Replayer::replay_from_file(tmp.path()).unwrap_err();
    assert!(matches!(err, crate::error::Error::ReplayFailed { index: 0, .. }));
}

#[test]
fn replay_rejects_empty_action_as_a_sanity_violation() {
    let tmp = NamedTempFile::new().unwrap();
    let writer = RawWriter::open(tmp.path(), DEVICE_SIZE).unwrap();
    let mut payload = sample(0, 1, 1_000);
    payload.action.clear();
    writer.write_sync(&payload, &ready_flag()).unwrap();
    drop(writer);

    let err = Replayer::replay_from_file(tmp.path()).unwrap_err();
    assert!(matches!(err, crate::error::Error::ReplayFailed { index: 0, .. }));
}

#[test]
fn replay_grouped_by_inode_sorts_each_bucket() {
    let tmp = NamedTempFile::new().unwrap();
    let writer = RawWriter::open(tmp.path(), DEVICE_SIZE).unwrap();
    let ready = ready_flag();
    writer.write_sync(&sample(0, 7, 1_000), &ready).unwrap();
    writer.write_sync(&sample(1, 8, 1_001), &ready).unwrap();
    writer.write_sync(&sample(2, 7, 1_002), &ready).unwrap();
    drop(writer);

    let groups = Replayer::replay_grouped_by_inode(tmp.path()).unwrap();
    assert_eq!(groups.len(), 2);
    let inode_7 = &groups[&7];
    assert_eq!(inode_7.len(), 2);
    assert!(inode_7[0].timestamp_ms <= inode_7[1].timestamp_ms);
}
