//! WAL Reader
//!
//! Handles reading entries from the WAL file.

use std::fs::File;
use std::io::{BufReader, ErrorKind, Read};
use std::path::Path;

use crate::error::{Result, RosterError};
use super::entry::{WalEntry, HEADER_SIZE};

/// Upper bound on a single frame's payload; larger lengths mean a garbled header
const MAX_ENTRY_SIZE: usize = 256 * 1024 * 1024;

/// Outcome of reading one frame
pub(crate) enum Frame {
    /// A valid entry
    Entry(WalEntry),
    /// Clean end of file
    End,
    /// The file ends inside a frame (torn write)
    Partial,
}

/// Reads entries from the WAL file
pub struct WalReader {
    reader: BufReader<File>,
    /// Byte offset of the next unread frame
    position: u64,
}

impl WalReader {
    /// Open a WAL file for reading
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        Ok(Self {
            reader: BufReader::new(file),
            position: 0,
        })
    }

    /// Read the next entry from the WAL
    ///
    /// Returns `Ok(None)` at end of file, including a torn frame at the tail.
    /// A checksum mismatch is reported as `WalCorruption`.
    pub fn next_entry(&mut self) -> Result<Option<WalEntry>> {
        match self.next_frame()? {
            Frame::Entry(entry) => Ok(Some(entry)),
            Frame::End | Frame::Partial => Ok(None),
        }
    }

    /// Iterate over all valid entries
    pub fn entries(self) -> WalIterator {
        WalIterator {
            reader: self,
            done: false,
        }
    }

    /// Byte offset just past the last frame returned
    pub fn position(&self) -> u64 {
        self.position
    }

    pub(crate) fn next_frame(&mut self) -> Result<Frame> {
        let mut header = [0u8; HEADER_SIZE];
        match fill(&mut self.reader, &mut header)? {
            0 => return Ok(Frame::End),
            n if n < HEADER_SIZE => return Ok(Frame::Partial),
            _ => {}
        }

        let (lsn, crc, len) = WalEntry::parse_header(&header);
        if len > MAX_ENTRY_SIZE {
            return Err(RosterError::WalCorruption(format!(
                "Frame length {} at lsn {} exceeds limit",
                len, lsn
            )));
        }
        let mut data = vec![0u8; len];
        if fill(&mut self.reader, &mut data)? < len {
            return Ok(Frame::Partial);
        }

        let entry = WalEntry::decode_payload(lsn, crc, &data)?;
        self.position += (HEADER_SIZE + len) as u64;
        Ok(Frame::Entry(entry))
    }
}

/// Read until `buf` is full or EOF; returns bytes read
fn fill(reader: &mut impl Read, buf: &mut [u8]) -> Result<usize> {
    let mut read = 0;
    while read < buf.len() {
        match reader.read(&mut buf[read..]) {
            Ok(0) => break,
            Ok(n) => read += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(read)
}

/// Iterator over WAL entries
pub struct WalIterator {
    reader: WalReader,
    done: bool,
}

impl Iterator for WalIterator {
    type Item = Result<WalEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.reader.next_entry() {
            Ok(Some(entry)) => Some(Ok(entry)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                // Nothing after a corrupt frame can be trusted
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
