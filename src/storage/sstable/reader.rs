//! SSTable Reader
//!
//! Opens SSTable files, verifies them, and serves lookups via an in-memory
//! index. The file handle sits behind a mutex so reads only need `&self`.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::ops::Bound;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use crate::error::{Result, RosterError};

use super::{read_u32, read_u64, FOOTER_SIZE, HEADER_SIZE, MAGIC, TOMBSTONE_MARKER, VERSION};

/// Reader for SSTable files with in-memory index for O(log n) lookups
pub struct SSTableReader {
    path: PathBuf,
    file: Mutex<BufReader<File>>,
    /// key → file offset of the entry
    index: BTreeMap<Vec<u8>, u64>,
    entry_count: u64,
}

impl SSTableReader {
    /// Open an SSTable for reading
    ///
    /// Validates header, footer and data checksum, then loads the index.
    pub fn open(path: &Path) -> Result<Self> {
        let mut file = File::open(path)?;
        let file_size = file.metadata()?.len();
        if file_size < HEADER_SIZE + FOOTER_SIZE {
            return Err(Self::corrupt(path, "file shorter than header + footer"));
        }

        let mut bytes = Vec::with_capacity(file_size as usize);
        file.read_to_end(&mut bytes)?;

        if &bytes[0..4] != MAGIC {
            return Err(Self::corrupt(path, "bad magic"));
        }
        let version = u16::from_le_bytes([bytes[4], bytes[5]]);
        if version != VERSION {
            return Err(RosterError::Storage(format!(
                "Unsupported SSTable version {} in {}",
                version,
                path.display()
            )));
        }
        let entry_count = read_u64(&bytes, 6).unwrap_or_default();

        let footer = (file_size - FOOTER_SIZE) as usize;
        let index_offset = read_u64(&bytes, footer).unwrap_or_default() as usize;
        let data_crc = read_u32(&bytes, footer + 8).unwrap_or_default();
        if index_offset < HEADER_SIZE as usize || index_offset > footer {
            return Err(Self::corrupt(path, "index offset out of range"));
        }

        if crc32fast::hash(&bytes[HEADER_SIZE as usize..index_offset]) != data_crc {
            return Err(Self::corrupt(path, "data checksum mismatch"));
        }

        // Index entries: [key_len(4)][offset(8)][key]
        let mut index = BTreeMap::new();
        let mut pos = index_offset;
        while pos < footer {
            let entry = read_u32(&bytes, pos).zip(read_u64(&bytes, pos + 4));
            let Some((key_len, offset)) = entry else {
                return Err(Self::corrupt(path, "truncated index entry"));
            };
            let start = pos + 12;
            let end = start + key_len as usize;
            if end > footer {
                return Err(Self::corrupt(path, "index key overruns footer"));
            }
            index.insert(bytes[start..end].to_vec(), offset);
            pos = end;
        }

        if index.len() as u64 != entry_count {
            return Err(Self::corrupt(path, "index size disagrees with header"));
        }

        file.seek(SeekFrom::Start(0))?;
        Ok(Self {
            path: path.to_path_buf(),
            file: Mutex::new(BufReader::new(file)),
            index,
            entry_count,
        })
    }

    /// Get a value by key
    ///
    /// Returns:
    /// - `Ok(Some(value))`: key found with value
    /// - `Ok(None)`: key found but is a tombstone (deleted)
    /// - `Err(KeyNotFound)`: key not in this SSTable
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        match self.index.get(key) {
            Some(&offset) => self.read_value_at(offset),
            None => Err(RosterError::KeyNotFound),
        }
    }

    /// All entries whose key starts with `prefix`, in key order
    ///
    /// A `None` value is a tombstone.
    pub fn scan_prefix(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Option<Vec<u8>>)>> {
        let mut entries = Vec::new();
        let range = self
            .index
            .range::<[u8], _>((Bound::Included(prefix), Bound::Unbounded))
            .take_while(|(k, _)| k.starts_with(prefix));
        for (key, &offset) in range {
            entries.push((key.clone(), self.read_value_at(offset)?));
        }
        Ok(entries)
    }

    /// Get entry count
    pub fn entry_count(&self) -> u64 {
        self.entry_count
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Quick check if a key might be in this SSTable (range check)
    pub fn might_contain(&self, key: &[u8]) -> bool {
        match (self.index.keys().next(), self.index.keys().next_back()) {
            (Some(min), Some(max)) => key >= min.as_slice() && key <= max.as_slice(),
            _ => false,
        }
    }

    fn read_value_at(&self, offset: u64) -> Result<Option<Vec<u8>>> {
        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(offset))?;

        let mut header = [0u8; 8];
        file.read_exact(&mut header)?;
        let key_len = read_u32(&header, 0).unwrap_or_default();
        let val_len = read_u32(&header, 4).unwrap_or_default();

        if val_len == TOMBSTONE_MARKER {
            return Ok(None);
        }

        file.seek(SeekFrom::Current(key_len as i64))?;
        let mut value = vec![0u8; val_len as usize];
        file.read_exact(&mut value)?;
        Ok(Some(value))
    }

    fn corrupt(path: &Path, reason: &str) -> RosterError {
        RosterError::Storage(format!("Corrupt SSTable {}: {}", path.display(), reason))
    }
}
