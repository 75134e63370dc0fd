mod common;

use assert_cmd::cargo_bin;
use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::process::Command;

#[cfg(not(feature = "storage-rocksdb"))]
#[test]
fn test_rocksdb_fallback_warning() {
    let items = tempfile::NamedTempFile::new().unwrap();
    common::write_items_csv(items.path(), &[("P1", 1, "1.00")]).unwrap();

    let mut cmd = Command::new(cargo_bin!("orderflow"));
    cmd.arg("--db-path")
        .arg("some_db")
        .arg("create")
        .arg("--customer")
        .arg("c-1")
        .arg("--items")
        .arg(items.path());

    cmd.assert()
        .success()
        .stderr(predicate::str::contains(
            "Persistent storage requested via --db-path, but 'storage-rocksdb' feature is not enabled. Falling back to in-memory storage.",
        ));
}

#[cfg(feature = "storage-rocksdb")]
#[test]
fn test_rocksdb_no_fallback_warning() {
    let items = tempfile::NamedTempFile::new().unwrap();
    common::write_items_csv(items.path(), &[("P1", 1, "1.00")]).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("test_db");

    let mut cmd = Command::new(cargo_bin!("orderflow"));
    cmd.arg("--db-path")
        .arg(&db_path)
        .arg("create")
        .arg("--customer")
        .arg("c-1")
        .arg("--items")
        .arg(items.path());

    cmd.assert()
        .success()
        .stderr(predicate::str::contains("WARN").not());
}
