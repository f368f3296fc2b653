//! WAL Entry definitions
//!
//! Defines the structure of individual WAL log entries and their
//! on-disk framing: `[LSN (8)][CRC (4)][Len (4)][Data]`.

use serde::{Deserialize, Serialize};

use crate::error::{Result, RosterError};

/// Frame header size: LSN (8) + CRC (4) + Len (4)
pub const HEADER_SIZE: usize = 16;

/// A single entry in the WAL
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalEntry {
    /// Log Sequence Number - monotonically increasing
    pub lsn: u64,

    /// The operation to perform
    pub operation: Operation,

    /// Timestamp (unix millis) when entry was created
    pub timestamp: u64,
}

/// Operations that can be logged
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Operation {
    /// Put a key-value pair
    Put { key: Vec<u8>, value: Vec<u8> },

    /// Delete a key
    Delete { key: Vec<u8> },

    /// A committed transaction: applied all-or-nothing on replay
    Batch { operations: Vec<Operation> },
}

impl Operation {
    /// Number of primitive puts/deletes carried by this operation
    pub fn len(&self) -> usize {
        match self {
            Operation::Put { .. } | Operation::Delete { .. } => 1,
            Operation::Batch { operations } => operations.iter().map(Operation::len).sum(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl WalEntry {
    /// Create an entry stamped with the current time
    pub fn new(lsn: u64, operation: Operation) -> Self {
        Self {
            lsn,
            operation,
            timestamp: chrono::Utc::now().timestamp_millis().max(0) as u64,
        }
    }

    /// Serialize into a framed record ready to append to the log
    pub fn serialize(&self) -> Result<Vec<u8>> {
        let data = self.payload()?;
        let crc = Self::checksum(self.lsn, &data);

        let mut bytes = Vec::with_capacity(HEADER_SIZE + data.len());
        bytes.extend_from_slice(&self.lsn.to_le_bytes());
        bytes.extend_from_slice(&crc.to_le_bytes());
        bytes.extend_from_slice(&(data.len() as u32).to_le_bytes());
        bytes.extend_from_slice(&data);
        Ok(bytes)
    }

    /// Parse one framed record from the start of `bytes`
    ///
    /// Fails with `WalCorruption` on short input or checksum mismatch.
    pub fn deserialize(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_SIZE {
            return Err(RosterError::WalCorruption(format!(
                "Incomplete header: expected {} bytes, got {}",
                HEADER_SIZE,
                bytes.len()
            )));
        }

        let (lsn, crc, len) = Self::parse_header(&bytes[..HEADER_SIZE]);
        let data = bytes.get(HEADER_SIZE..HEADER_SIZE + len).ok_or_else(|| {
            RosterError::WalCorruption(format!(
                "Incomplete payload: expected {} bytes, got {}",
                len,
                bytes.len() - HEADER_SIZE
            ))
        })?;

        Self::decode_payload(lsn, crc, data)
    }

    /// Size in bytes of the framed record
    pub fn serialized_size(&self) -> Result<usize> {
        Ok(HEADER_SIZE + bincode::serialized_size(self)? as usize)
    }

    /// CRC32 over the LSN and payload
    pub fn compute_crc(&self) -> Result<u32> {
        Ok(Self::checksum(self.lsn, &self.payload()?))
    }

    // =========================================================================
    // Framing helpers (shared with the reader)
    // =========================================================================

    /// Split a header into (lsn, crc, payload_len)
    pub(crate) fn parse_header(header: &[u8]) -> (u64, u32, usize) {
        let mut lsn = [0u8; 8];
        let mut crc = [0u8; 4];
        let mut len = [0u8; 4];
        lsn.copy_from_slice(&header[0..8]);
        crc.copy_from_slice(&header[8..12]);
        len.copy_from_slice(&header[12..16]);
        (
            u64::from_le_bytes(lsn),
            u32::from_le_bytes(crc),
            u32::from_le_bytes(len) as usize,
        )
    }

    /// Verify the checksum and decode the payload
    pub(crate) fn decode_payload(lsn: u64, crc: u32, data: &[u8]) -> Result<Self> {
        let actual = Self::checksum(lsn, data);
        if actual != crc {
            return Err(RosterError::WalCorruption(format!(
                "CRC mismatch at lsn {}: stored {:#010x}, computed {:#010x}",
                lsn, crc, actual
            )));
        }

        let entry: WalEntry = bincode::deserialize(data)
            .map_err(|e| RosterError::WalCorruption(format!("Undecodable entry: {}", e)))?;

        if entry.lsn != lsn {
            return Err(RosterError::WalCorruption(format!(
                "LSN mismatch: header {}, payload {}",
                lsn, entry.lsn
            )));
        }

        Ok(entry)
    }

    fn payload(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    fn checksum(lsn: u64, data: &[u8]) -> u32 {
        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&lsn.to_le_bytes());
        hasher.update(data);
        hasher.finalize()
    }
}
