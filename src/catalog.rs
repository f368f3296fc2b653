//! Catalog Module
//!
//! Persisted schema state and the engine key layout.
//!
//! ## Key Layout
//! ```text
//! 0x00 "version"             → u32 LE   schema version
//! 0x00 "store/" <name>       → bincode  CollectionSchema
//! 0x00 "gen/"   <name>       → u64 LE   next auto-increment key
//! 0x01 <name> 0x00 <id BE>   → bincode  record
//! ```
//! Record ids are big-endian so byte order equals numeric order.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::engine::Engine;
use crate::error::{Result, RosterError};
use crate::wal::Operation;

const META: u8 = 0x00;
const DATA: u8 = 0x01;

/// Options for a new collection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionOptions {
    /// Name of the record field holding the primary key
    pub key_path: String,
    /// Whether the store assigns keys from a monotonic counter
    pub auto_increment: bool,
}

impl CollectionOptions {
    /// Key path `id`, keys assigned by the store
    pub fn auto_increment(key_path: impl Into<String>) -> Self {
        Self {
            key_path: key_path.into(),
            auto_increment: true,
        }
    }
}

/// Persisted definition of one collection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionSchema {
    pub name: String,
    pub key_path: String,
    pub auto_increment: bool,
}

/// Schema state loaded at open time
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    /// 0 for a database that was never upgraded
    pub version: u32,
    pub collections: BTreeMap<String, CollectionSchema>,
}

impl Catalog {
    /// Read version and collection schemas from the engine
    pub fn load(engine: &Engine) -> Result<Self> {
        let version = match engine.get(&version_key())? {
            Some(bytes) => decode_u32(&bytes)?,
            None => 0,
        };

        let mut collections = BTreeMap::new();
        for (_, value) in engine.scan_prefix(&meta_key("store/", ""))? {
            let schema: CollectionSchema = bincode::deserialize(&value)?;
            collections.insert(schema.name.clone(), schema);
        }

        Ok(Self {
            version,
            collections,
        })
    }

    pub fn get(&self, name: &str) -> Result<&CollectionSchema> {
        self.collections
            .get(name)
            .ok_or_else(|| RosterError::CollectionNotFound(name.to_string()))
    }
}

// =============================================================================
// Key Encoding
// =============================================================================

fn meta_key(kind: &str, name: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(1 + kind.len() + name.len());
    key.push(META);
    key.extend_from_slice(kind.as_bytes());
    key.extend_from_slice(name.as_bytes());
    key
}

pub fn version_key() -> Vec<u8> {
    meta_key("version", "")
}

pub fn schema_key(collection: &str) -> Vec<u8> {
    meta_key("store/", collection)
}

pub fn generator_key(collection: &str) -> Vec<u8> {
    meta_key("gen/", collection)
}

/// Prefix shared by every record of `collection`
pub fn record_prefix(collection: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(collection.len() + 2);
    key.push(DATA);
    key.extend_from_slice(collection.as_bytes());
    key.push(0x00);
    key
}

pub fn record_key(collection: &str, id: u64) -> Vec<u8> {
    let mut key = record_prefix(collection);
    key.extend_from_slice(&id.to_be_bytes());
    key
}

/// Recover the id from a record key produced by `record_key`
pub fn record_id(key: &[u8]) -> Result<u64> {
    let tail = key
        .len()
        .checked_sub(8)
        .map(|start| &key[start..])
        .ok_or_else(|| RosterError::Storage(format!("Malformed record key {:?}", key)))?;
    let mut id = [0u8; 8];
    id.copy_from_slice(tail);
    Ok(u64::from_be_bytes(id))
}

// =============================================================================
// Value Encoding
// =============================================================================

pub fn decode_u32(bytes: &[u8]) -> Result<u32> {
    let arr: [u8; 4] = bytes
        .try_into()
        .map_err(|_| RosterError::Serialization(format!("Expected 4 bytes, got {}", bytes.len())))?;
    Ok(u32::from_le_bytes(arr))
}

pub fn decode_u64(bytes: &[u8]) -> Result<u64> {
    let arr: [u8; 8] = bytes
        .try_into()
        .map_err(|_| RosterError::Serialization(format!("Expected 8 bytes, got {}", bytes.len())))?;
    Ok(u64::from_le_bytes(arr))
}

/// Operations persisting a schema upgrade
pub fn upgrade_operations(version: u32, created: &[CollectionSchema]) -> Result<Vec<Operation>> {
    let mut ops = Vec::with_capacity(1 + created.len() * 2);
    for schema in created {
        ops.push(Operation::Put {
            key: schema_key(&schema.name),
            value: bincode::serialize(schema)?,
        });
        if schema.auto_increment {
            ops.push(Operation::Put {
                key: generator_key(&schema.name),
                value: 1u64.to_le_bytes().to_vec(),
            });
        }
    }
    ops.push(Operation::Put {
        key: version_key(),
        value: version.to_le_bytes().to_vec(),
    });
    Ok(ops)
}
