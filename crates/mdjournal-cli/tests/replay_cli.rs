use assert_cmd::Command;
use mdjournal_core::{JournalConfig, JournalContext};
use predicates::prelude::*;
use tempfile::NamedTempFile;

fn logged_device() -> NamedTempFile {
    let tmp = NamedTempFile::new().unwrap();
    let mut config = JournalConfig::default();
    config.raw_device_path = tmp.path().to_string_lossy().into_owned();
    config.raw_device_size = 8 * 1024 * 1024;

    let ctx = JournalContext::init(config).unwrap();
    let node = mdjournal_core::NodeSnapshot::new(1);
    ctx.log_metadata(
        &node,
        mdjournal_core::LogMetadataInfo::new("create"),
        mdjournal_core::Durability::Sync,
    );
    ctx.shutdown();
    tmp
}

#[test]
fn replay_subcommand_reports_one_entry() {
    let tmp = logged_device();
    Command::cargo_bin("mdjournal")
        .unwrap()
        .arg("replay")
        .arg(tmp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("replayed 1 entries"));
}

#[test]
fn inspect_subcommand_reports_one_inode() {
    let tmp = logged_device();
    Command::cargo_bin("mdjournal")
        .unwrap()
        .arg("inspect")
        .arg(tmp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("1 distinct inodes"));
}

#[test]
fn replay_subcommand_fails_on_missing_file() {
    Command::cargo_bin("mdjournal")
        .unwrap()
        .arg("replay")
        .arg("/nonexistent/path/for/mdjournal-cli-test")
        .assert()
        .failure();
}
