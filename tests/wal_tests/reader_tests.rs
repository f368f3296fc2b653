//! Sequential reads and torn tails

use std::fs::{File, OpenOptions};
use std::io::Write;

use rosterdb::wal::{WalEntry, WalReader};

use super::{delete, put, setup_temp_wal, write_raw};

#[test]
fn test_read_empty_file() {
    let (_temp, wal_path) = setup_temp_wal();
    File::create(&wal_path).unwrap();

    let mut reader = WalReader::open(&wal_path).unwrap();

    assert!(reader.next_entry().unwrap().is_none());
    assert_eq!(reader.position(), 0);
}

#[test]
fn test_read_in_order() {
    let (_temp, wal_path) = setup_temp_wal();
    let entries = vec![
        WalEntry::new(1, put("k1", "v1")),
        WalEntry::new(2, put("k2", "v2")),
        WalEntry::new(3, delete("k1")),
    ];
    write_raw(&wal_path, &entries);

    let mut reader = WalReader::open(&wal_path).unwrap();
    for expected in &entries {
        assert_eq!(&reader.next_entry().unwrap().unwrap(), expected);
    }
    assert!(reader.next_entry().unwrap().is_none());
}

#[test]
fn test_iterator_yields_every_entry() {
    let (_temp, wal_path) = setup_temp_wal();
    let entries: Vec<_> = (1..=5).map(|lsn| WalEntry::new(lsn, put("k", "v"))).collect();
    write_raw(&wal_path, &entries);

    let lsns: Vec<u64> = WalReader::open(&wal_path)
        .unwrap()
        .entries()
        .map(|entry| entry.unwrap().lsn)
        .collect();

    assert_eq!(lsns, vec![1, 2, 3, 4, 5]);
}

#[test]
fn test_partial_header_ends_log() {
    let (_temp, wal_path) = setup_temp_wal();
    write_raw(&wal_path, &[WalEntry::new(1, put("k", "v"))]);
    OpenOptions::new()
        .append(true)
        .open(&wal_path)
        .unwrap()
        .write_all(&[0u8; 8])
        .unwrap();

    let mut reader = WalReader::open(&wal_path).unwrap();

    assert!(reader.next_entry().unwrap().is_some());
    let valid = reader.position();
    assert!(reader.next_entry().unwrap().is_none());
    assert_eq!(reader.position(), valid);
}

#[test]
fn test_partial_payload_ends_log() {
    let (_temp, wal_path) = setup_temp_wal();
    let torn = WalEntry::new(2, put("k", "v")).serialize().unwrap();
    write_raw(&wal_path, &[WalEntry::new(1, put("k", "v"))]);
    OpenOptions::new()
        .append(true)
        .open(&wal_path)
        .unwrap()
        .write_all(&torn[..20])
        .unwrap();

    let mut reader = WalReader::open(&wal_path).unwrap();

    assert!(reader.next_entry().unwrap().is_some());
    assert!(reader.next_entry().unwrap().is_none());
}

#[test]
fn test_corrupt_frame_is_an_error() {
    let (_temp, wal_path) = setup_temp_wal();
    let mut bytes = WalEntry::new(1, put("k", "v")).serialize().unwrap();
    if let Some(byte) = bytes.last_mut() {
        *byte ^= 0xFF;
    }
    File::create(&wal_path).unwrap().write_all(&bytes).unwrap();

    let mut iter = WalReader::open(&wal_path).unwrap().entries();

    assert!(iter.next().unwrap().is_err());
    assert!(iter.next().is_none());
}
