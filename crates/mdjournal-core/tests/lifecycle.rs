//! Full-lifecycle integration tests: queue, flusher, and device monitor
//! threads running together against a temp file standing in for the raw
//! device, exercising the round-trip and ring-eviction laws end to end.

use std::time::Duration;

use mdjournal_core::{Durability, JournalConfig, JournalContext, LogMetadataInfo, NodeSnapshot, Replayer};
use tempfile::NamedTempFile;

fn config_for(path: &std::path::Path, device_size: u64) -> JournalConfig {
    JournalConfig {
        raw_device_path: path.to_string_lossy().into_owned(),
        raw_device_size: device_size,
        coalescing_window_ms: 20,
        queue_capacity: 64,
        ..JournalConfig::default()
    }
}

fn log_one(ctx: &JournalContext, tx_marker: u32, durability: Durability) {
    let node = NodeSnapshot::new(tx_marker);
    ctx.log_metadata(
        &node,
        LogMetadataInfo::new("create"),
        durability,
    );
}

#[test]
fn round_trip_preserves_order_within_capacity() {
    let tmp = NamedTempFile::new().unwrap();
    let ctx = JournalContext::init(config_for(tmp.path(), 8 * 1024 * 1024)).unwrap();

    for ino in 1..=20u32 {
        log_one(&ctx, ino, Durability::Async);
    }
    ctx.shutdown();

    let report = Replayer::replay_from_file(tmp.path()).unwrap();
    assert_eq!(report.entries.len(), 20);
    for (i, entry) in report.entries.iter().enumerate() {
        assert_eq!(entry.payload.ino, (i as u32) + 1);
    }
    assert_eq!(ctx.dropped_events(), 0);
}

#[test]
fn ring_eviction_keeps_only_the_most_recent_n_entries() {
    let tmp = NamedTempFile::new().unwrap();
    // header region (4096) + 4 entry slots (4096 each).
    let device_size = 4096 + 4096 * 4;
    let ctx = JournalContext::init(config_for(tmp.path(), device_size)).unwrap();

    for ino in 1..=10u32 {
        log_one(&ctx, ino, Durability::Sync);
    }
    ctx.shutdown();

    let report = Replayer::replay_from_file(tmp.path()).unwrap();
    assert_eq!(report.entries.len(), 4);
    let inos: Vec<u32> = report.entries.iter().map(|e| e.payload.ino).collect();
    assert_eq!(inos, vec![7, 8, 9, 10]);
}

#[test]
fn shutdown_drains_every_enqueued_payload_or_counts_it_dropped() {
    let tmp = NamedTempFile::new().unwrap();
    let ctx = JournalContext::init(config_for(tmp.path(), 8 * 1024 * 1024)).unwrap();

    for ino in 1..=50u32 {
        log_one(&ctx, ino, Durability::Async);
    }
    ctx.shutdown();

    let report = Replayer::replay_from_file(tmp.path()).unwrap();
    assert_eq!(report.entries.len() as u64 + ctx.dropped_events(), 50);
}

#[test]
fn idempotent_init_on_a_fresh_device_yields_empty_indices() {
    let tmp = NamedTempFile::new().unwrap();
    let ctx = JournalContext::init(config_for(tmp.path(), 8 * 1024 * 1024)).unwrap();
    ctx.shutdown();

    let report = Replayer::replay_from_file(tmp.path()).unwrap();
    assert!(report.entries.is_empty());
}

#[test]
fn device_monitor_reports_ready_before_any_sync_write() {
    let tmp = NamedTempFile::new().unwrap();
    let ctx = JournalContext::init(config_for(tmp.path(), 8 * 1024 * 1024)).unwrap();
    std::thread::sleep(Duration::from_millis(10));
    assert!(ctx.device_ready());
    ctx.shutdown();
}
