//! SSTable build / open / lookup

use std::fs;
use std::path::PathBuf;

use rosterdb::storage::{SSTableBuilder, SSTableReader};
use rosterdb::RosterError;
use tempfile::TempDir;

fn setup() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("sstable_000001.sst");
    (temp_dir, path)
}

fn build(path: &PathBuf, entries: &[(&str, Option<&str>)]) {
    let mut builder = SSTableBuilder::new(path).unwrap();
    for (key, value) in entries {
        match value {
            Some(v) => builder.add(key.as_bytes(), v.as_bytes()).unwrap(),
            None => builder.add_tombstone(key.as_bytes()).unwrap(),
        }
    }
    builder.finish().unwrap();
}

// =============================================================================
// Builder
// =============================================================================

#[test]
fn test_finish_renames_tmp_into_place() {
    let (temp, path) = setup();
    let mut builder = SSTableBuilder::new(&path).unwrap();
    builder.add(b"a", b"1").unwrap();
    assert!(path.with_extension(SSTableBuilder::TMP_SUFFIX).exists());
    assert!(!path.exists());

    let table = builder.finish().unwrap();

    assert!(path.exists());
    assert_eq!(fs::read_dir(temp.path()).unwrap().count(), 1);
    assert_eq!(table.entry_count, 1);
    assert_eq!(table.file_size, fs::metadata(&path).unwrap().len());
}

#[test]
fn test_metadata_tracks_key_range() {
    let (_temp, path) = setup();
    let mut builder = SSTableBuilder::new(&path).unwrap();
    builder.add(b"apple", b"1").unwrap();
    builder.add_tombstone(b"banana").unwrap();
    builder.add(b"cherry", b"3").unwrap();

    let table = builder.finish().unwrap();

    assert_eq!(table.entry_count, 3);
    assert_eq!(table.min_key, b"apple");
    assert_eq!(table.max_key, b"cherry");
}

#[test]
fn test_out_of_order_keys_rejected() {
    let (_temp, path) = setup();
    let mut builder = SSTableBuilder::new(&path).unwrap();
    builder.add(b"b", b"1").unwrap();

    assert!(matches!(builder.add(b"a", b"2"), Err(RosterError::Storage(_))));
    assert!(builder.add_tombstone(b"b").is_err());
}

// =============================================================================
// Reader
// =============================================================================

#[test]
fn test_empty_table_round_trips() {
    let (_temp, path) = setup();
    build(&path, &[]);

    let reader = SSTableReader::open(&path).unwrap();

    assert_eq!(reader.entry_count(), 0);
    assert!(!reader.might_contain(b"anything"));
}

#[test]
fn test_get_values_tombstones_and_misses() {
    let (_temp, path) = setup();
    build(
        &path,
        &[("k1", Some("v1")), ("k2", None), ("k3", Some(""))],
    );

    let reader = SSTableReader::open(&path).unwrap();

    assert_eq!(reader.get(b"k1").unwrap(), Some(b"v1".to_vec()));
    assert_eq!(reader.get(b"k2").unwrap(), None);
    assert_eq!(reader.get(b"k3").unwrap(), Some(Vec::new()));
    assert!(matches!(reader.get(b"k4"), Err(RosterError::KeyNotFound)));
}

#[test]
fn test_scan_prefix_in_key_order() {
    let (_temp, path) = setup();
    build(
        &path,
        &[
            ("a", Some("x")),
            ("friends\x00\x01", Some("anna")),
            ("friends\x00\x02", None),
            ("friends\x00\x03", Some("ivan")),
            ("g", Some("y")),
        ],
    );

    let reader = SSTableReader::open(&path).unwrap();
    let scanned = reader.scan_prefix(b"friends\x00").unwrap();

    assert_eq!(scanned.len(), 3);
    assert_eq!(scanned[0].1, Some(b"anna".to_vec()));
    assert_eq!(scanned[1].1, None);
    assert_eq!(scanned[2].1, Some(b"ivan".to_vec()));
}

#[test]
fn test_many_entries_random_access() {
    let (_temp, path) = setup();
    let mut builder = SSTableBuilder::new(&path).unwrap();
    for i in 0..1000u32 {
        builder
            .add(&i.to_be_bytes(), format!("value{}", i).as_bytes())
            .unwrap();
    }
    builder.finish().unwrap();

    let reader = SSTableReader::open(&path).unwrap();

    for i in [999u32, 0, 500, 17] {
        assert_eq!(
            reader.get(&i.to_be_bytes()).unwrap(),
            Some(format!("value{}", i).into_bytes())
        );
    }
}

#[test]
fn test_might_contain_range() {
    let (_temp, path) = setup();
    build(&path, &[("b", Some("1")), ("d", Some("2"))]);

    let reader = SSTableReader::open(&path).unwrap();

    assert!(reader.might_contain(b"c"));
    assert!(!reader.might_contain(b"a"));
    assert!(!reader.might_contain(b"e"));
}

// =============================================================================
// Damaged Files
// =============================================================================

#[test]
fn test_open_missing_file() {
    let (_temp, path) = setup();
    assert!(matches!(SSTableReader::open(&path), Err(RosterError::Io(_))));
}

#[test]
fn test_open_bad_magic() {
    let (_temp, path) = setup();
    build(&path, &[("k", Some("v"))]);
    let mut bytes = fs::read(&path).unwrap();
    bytes[0] = b'X';
    fs::write(&path, bytes).unwrap();

    assert!(matches!(SSTableReader::open(&path), Err(RosterError::Storage(_))));
}

#[test]
fn test_open_detects_flipped_data_byte() {
    let (_temp, path) = setup();
    build(&path, &[("key", Some("value"))]);
    let mut bytes = fs::read(&path).unwrap();
    // First data byte sits right after the 14-byte header
    bytes[14 + 8] ^= 0xFF;
    fs::write(&path, bytes).unwrap();

    assert!(matches!(SSTableReader::open(&path), Err(RosterError::Storage(_))));
}

#[test]
fn test_open_truncated_file() {
    let (_temp, path) = setup();
    fs::write(&path, b"RSTB").unwrap();

    assert!(SSTableReader::open(&path).is_err());
}
