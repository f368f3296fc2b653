//! Records stored in collections
//!
//! A record carries its own primary key in the field named by the
//! collection's key path. The store reads it on insert (when the caller
//! supplied one) and writes it back once a key has been assigned.

use serde::de::DeserializeOwned;
use serde::Serialize;

/// A value that can live in a collection
pub trait Record: Serialize + DeserializeOwned + Send + 'static {
    /// The key currently stored in the record, if any
    fn key(&self) -> Option<u64>;

    /// Store the assigned key into the record
    fn set_key(&mut self, key: u64);
}
