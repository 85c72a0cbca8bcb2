#![forbid(unsafe_code)]

use std::fs;

use pairmem_storage::{DirExportSink, ExportSink, InMemoryExportStore, StorageError};

#[test]
fn at_export_db_01_in_memory_store_is_append_only() {
    let mut s = InMemoryExportStore::new_in_memory();
    let first = s
        .write_payload("learning_YT042_stamp.csv", "participant_id\nYT042")
        .unwrap();
    assert_eq!(first.bytes, 20);
    assert_eq!(first.sha256_hex.len(), 64);

    let err = s
        .write_payload("learning_YT042_stamp.csv", "other body")
        .unwrap_err();
    assert_eq!(
        err,
        StorageError::DuplicateKey {
            table: "export_payloads",
            key: "learning_YT042_stamp.csv".to_string(),
        }
    );
    assert_eq!(s.payloads().len(), 1);
    assert_eq!(
        s.payload("learning_YT042_stamp.csv").unwrap().body,
        "participant_id\nYT042"
    );
}

#[test]
fn at_export_db_02_same_body_same_digest_across_sinks() {
    let dir = tempfile::tempdir().unwrap();
    let mut disk = DirExportSink::open(dir.path().join("out")).unwrap();
    let mut mem = InMemoryExportStore::new_in_memory();

    let a = disk.write_payload("test_AB001_s.csv", "a,b\n1,2").unwrap();
    let b = mem.write_payload("test_AB001_s.csv", "a,b\n1,2").unwrap();
    assert_eq!(a, b);
    assert_eq!(
        fs::read_to_string(disk.root().join("test_AB001_s.csv")).unwrap(),
        "a,b\n1,2"
    );
}

#[test]
fn at_export_db_03_dir_sink_never_overwrites() {
    let dir = tempfile::tempdir().unwrap();
    let mut disk = DirExportSink::open(dir.path()).unwrap();
    disk.write_payload("test_AB001_s.csv", "first").unwrap();
    let err = disk.write_payload("test_AB001_s.csv", "second").unwrap_err();
    assert!(matches!(err, StorageError::DuplicateKey { .. }));
    assert_eq!(
        fs::read_to_string(dir.path().join("test_AB001_s.csv")).unwrap(),
        "first"
    );
}

#[test]
fn at_export_db_04_unsafe_names_rejected_before_io() {
    let dir = tempfile::tempdir().unwrap();
    let mut disk = DirExportSink::open(dir.path()).unwrap();
    let err = disk.write_payload("../x.csv", "body").unwrap_err();
    assert!(matches!(err, StorageError::ContractViolation(_)));
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
}
