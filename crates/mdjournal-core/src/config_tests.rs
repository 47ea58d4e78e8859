use std::io::Write;

use serial_test::serial;
use tempfile::NamedTempFile;

use super::JournalConfig;

#[test]
fn defaults_match_reference_constants() {
    let config = JournalConfig::default();
    assert_eq!(config.raw_device_path, "/tmp/journal-pipe");
    assert_eq!(config.raw_device_size, 8 * 1024 * 1024);
    assert_eq!(config.coalescing_window_ms, 500);
    assert_eq!(config.queue_capacity, 4096);
    assert!(config.ignore_inodes.contains(&48803));
    assert_eq!(config.ignore_inodes.len(), 6);
}

#[test]
fn num_entries_matches_reference_device_sizing() {
    let config = JournalConfig::default();
    assert_eq!(config.num_entries(), 2047);
}

#[test]
fn load_with_no_file_returns_defaults() {
    let config = JournalConfig::load(None).unwrap();
    assert_eq!(config, JournalConfig::default());
}

#[test]
fn load_overrides_from_toml_file() {
    let mut toml_file = NamedTempFile::new().unwrap();
    writeln!(toml_file, "queue_capacity = 128").unwrap();
    writeln!(toml_file, "coalescing_window_ms = 250").unwrap();

    let config = JournalConfig::load(Some(toml_file.path())).unwrap();
    assert_eq!(config.queue_capacity, 128);
    assert_eq!(config.coalescing_window_ms, 250);
    // Fields not present in the file keep their defaults.
    assert_eq!(config.raw_device_size, JournalConfig::default().raw_device_size);
}

#[test]
#[serial]
fn env_vars_take_precedence_over_toml_file() {
    let mut toml_file = NamedTempFile::new().unwrap();
    writeln!(toml_file, "queue_capacity = 128").unwrap();

    std::env::set_var("JOURNAL_QUEUE_CAPACITY", "99");
    let config = JournalConfig::load(Some(toml_file.path())).unwrap();
    std::env::remove_var("JOURNAL_QUEUE_CAPACITY");

    assert_eq!(config.queue_capacity, 99);
}
