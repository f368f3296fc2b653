//! SSTable Builder
//!
//! Streams sorted entries into a temporary file, then renames it into place.

use std::fs::{self, File};
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::error::{Result, RosterError};

use super::{SSTable, HEADER_SIZE, MAGIC, TOMBSTONE_MARKER, VERSION};

/// Builder for creating new SSTables from sorted entries
pub struct SSTableBuilder {
    /// Final file path
    path: PathBuf,
    /// Path written to until `finish()`
    tmp_path: PathBuf,
    writer: BufWriter<File>,
    entry_count: u64,
    /// Offset the next entry starts at
    offset: u64,
    /// key → entry offset, in insertion (= sorted) order
    index: Vec<(Vec<u8>, u64)>,
    data_hasher: crc32fast::Hasher,
}

impl SSTableBuilder {
    /// Suffix of in-progress tables; the storage manager deletes leftovers
    pub const TMP_SUFFIX: &'static str = "tmp";

    /// Create a new SSTable builder
    ///
    /// Call `add()`/`add_tombstone()` in strictly increasing key order, then
    /// `finish()`.
    pub fn new(path: &Path) -> Result<Self> {
        let tmp_path = path.with_extension(Self::TMP_SUFFIX);
        let mut writer = BufWriter::new(File::create(&tmp_path)?);

        // Entry count is patched in by finish()
        writer.write_all(MAGIC)?;
        writer.write_all(&VERSION.to_le_bytes())?;
        writer.write_all(&0u64.to_le_bytes())?;

        Ok(Self {
            path: path.to_path_buf(),
            tmp_path,
            writer,
            entry_count: 0,
            offset: HEADER_SIZE,
            index: Vec::new(),
            data_hasher: crc32fast::Hasher::new(),
        })
    }

    /// Add a key-value pair
    pub fn add(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        self.write_entry(key, Some(value))
    }

    /// Add a tombstone
    pub fn add_tombstone(&mut self, key: &[u8]) -> Result<()> {
        self.write_entry(key, None)
    }

    fn write_entry(&mut self, key: &[u8], value: Option<&[u8]>) -> Result<()> {
        if let Some((last, _)) = self.index.last() {
            if key <= last.as_slice() {
                return Err(RosterError::Storage(format!(
                    "SSTable keys out of order: {:?} after {:?}",
                    key, last
                )));
            }
        }

        let val_len = value.map_or(TOMBSTONE_MARKER, |v| v.len() as u32);

        let mut frame = Vec::with_capacity(8 + key.len() + value.map_or(0, <[u8]>::len));
        frame.extend_from_slice(&(key.len() as u32).to_le_bytes());
        frame.extend_from_slice(&val_len.to_le_bytes());
        frame.extend_from_slice(key);
        if let Some(v) = value {
            frame.extend_from_slice(v);
        }

        self.writer.write_all(&frame)?;
        self.data_hasher.update(&frame);

        self.index.push((key.to_vec(), self.offset));
        self.offset += frame.len() as u64;
        self.entry_count += 1;
        Ok(())
    }

    /// Finish building: write index block, footer, sync and rename into place
    pub fn finish(mut self) -> Result<SSTable> {
        let index_offset = self.offset;

        for (key, offset) in &self.index {
            self.writer.write_all(&(key.len() as u32).to_le_bytes())?;
            self.writer.write_all(&offset.to_le_bytes())?;
            self.writer.write_all(key)?;
        }

        let data_crc = self.data_hasher.finalize();
        self.writer.write_all(&index_offset.to_le_bytes())?;
        self.writer.write_all(&data_crc.to_le_bytes())?;
        self.writer.write_all(&[0u8; 4])?;
        self.writer.flush()?;

        let mut file = self
            .writer
            .into_inner()
            .map_err(|e| RosterError::Storage(format!("Failed to flush SSTable: {}", e)))?;
        file.seek(SeekFrom::Start(MAGIC.len() as u64 + 2))?;
        file.write_all(&self.entry_count.to_le_bytes())?;
        file.sync_all()?;
        let file_size = file.metadata()?.len();
        drop(file);

        fs::rename(&self.tmp_path, &self.path)?;

        let min_key = self.index.first().map(|(k, _)| k.clone()).unwrap_or_default();
        let max_key = self.index.last().map(|(k, _)| k.clone()).unwrap_or_default();

        Ok(SSTable {
            path: self.path,
            entry_count: self.entry_count,
            min_key,
            max_key,
            file_size,
        })
    }
}
