use std::sync::Arc;
use std::time::Duration;

use tempfile::NamedTempFile;

use super::{DeviceMonitor, DeviceReady};

#[test]
fn monitor_reports_ready_for_a_writable_file() {
    let tmp = NamedTempFile::new().unwrap();
    std::fs::write(tmp.path(), [0u8; 4096]).unwrap();
    let ready = Arc::new(DeviceReady::new());
    let monitor = DeviceMonitor::spawn(tmp.path().to_path_buf(), Arc::clone(&ready));
    assert!(ready.is_ready());
    monitor.shutdown();
}

#[test]
fn monitor_reports_not_ready_for_a_missing_path() {
    let ready = Arc::new(DeviceReady::new());
    let monitor = DeviceMonitor::spawn(
        std::path::PathBuf::from("/nonexistent/path/for/mdjournal/test"),
        Arc::clone(&ready),
    );
    assert!(!ready.is_ready());
    monitor.shutdown();
}

#[test]
fn shutdown_stops_the_background_thread_promptly() {
    let tmp = NamedTempFile::new().unwrap();
    std::fs::write(tmp.path(), [0u8; 4096]).unwrap();
    let ready = Arc::new(DeviceReady::new());
    let monitor = DeviceMonitor::spawn(tmp.path().to_path_buf(), ready);
    let start = std::time::Instant::now();
    monitor.shutdown();
    assert!(start.elapsed() < Duration::from_secs(1));
}
