//! Collection handle scoped to one transaction

use crate::catalog::{self, CollectionSchema};
use crate::error::{Result, RosterError};
use crate::record::Record;

use super::request::Request;
use super::worker::TxnState;
use super::Transaction;

/// A collection as seen through one transaction
///
/// Every request issued here is queued on the owning transaction and runs
/// in issuance order. Dropping the last open handle seals the transaction.
pub struct ObjectStore<'tx> {
    txn: &'tx Transaction,
    schema: CollectionSchema,
}

impl<'tx> ObjectStore<'tx> {
    pub(crate) fn new(txn: &'tx Transaction, schema: CollectionSchema) -> Self {
        Self { txn, schema }
    }

    pub fn name(&self) -> &str {
        &self.schema.name
    }

    pub fn key_path(&self) -> &str {
        &self.schema.key_path
    }

    pub fn auto_increment(&self) -> bool {
        self.schema.auto_increment
    }

    /// Insert a record; fails with `ConstraintError` if its key is taken
    ///
    /// Resolves to the record's key, assigned by the store unless the
    /// record already carried one.
    pub fn add<R: Record>(&self, record: R) -> Request<u64> {
        self.write(record, false)
    }

    /// Insert or replace a record
    pub fn put<R: Record>(&self, record: R) -> Request<u64> {
        self.write(record, true)
    }

    /// The record stored under `key`; `None` when absent
    pub fn get<R: Record>(&self, key: u64) -> Request<Option<R>> {
        let name = self.schema.name.clone();
        self.txn.submit(move |state| {
            state
                .get(&catalog::record_key(&name, key))?
                .map(|bytes| bincode::deserialize::<R>(&bytes))
                .transpose()
                .map_err(RosterError::from)
        })
    }

    /// Every record, in ascending key order
    pub fn get_all<R: Record>(&self) -> Request<Vec<R>> {
        let name = self.schema.name.clone();
        self.txn.submit(move |state| {
            state
                .scan_prefix(&catalog::record_prefix(&name))?
                .into_iter()
                .map(|(_, bytes)| bincode::deserialize::<R>(&bytes).map_err(RosterError::from))
                .collect()
        })
    }

    pub fn count(&self) -> Request<u64> {
        let name = self.schema.name.clone();
        self.txn.submit(move |state| {
            Ok(state.scan_prefix(&catalog::record_prefix(&name))?.len() as u64)
        })
    }

    /// Remove the record under `key`; removing an absent key succeeds
    pub fn delete(&self, key: u64) -> Request<()> {
        let name = self.schema.name.clone();
        self.txn.submit(move |state| {
            state.require_write(&name)?;
            state.delete(catalog::record_key(&name, key));
            Ok(())
        })
    }

    fn write<R: Record>(&self, mut record: R, overwrite: bool) -> Request<u64> {
        let schema = self.schema.clone();
        self.txn.submit(move |state| {
            state.require_write(&schema.name)?;

            let id = assign_key(state, &schema, record.key())?;
            let key = catalog::record_key(&schema.name, id);
            if !overwrite && state.get(&key)?.is_some() {
                return Err(RosterError::ConstraintError(format!(
                    "Key {} already exists in '{}'",
                    id, schema.name
                )));
            }

            record.set_key(id);
            state.put(key, bincode::serialize(&record)?);
            Ok(id)
        })
    }
}

impl Drop for ObjectStore<'_> {
    fn drop(&mut self) {
        self.txn.release_store();
    }
}

/// Pick the key for a new record, advancing the generator past it
fn assign_key(state: &mut TxnState<'_>, schema: &CollectionSchema, explicit: Option<u64>) -> Result<u64> {
    if !schema.auto_increment {
        return explicit.ok_or_else(|| {
            RosterError::ConstraintError(format!(
                "Collection '{}' has no key generator; record needs a '{}'",
                schema.name, schema.key_path
            ))
        });
    }

    let generator = catalog::generator_key(&schema.name);
    let next = match state.get(&generator)? {
        Some(bytes) => catalog::decode_u64(&bytes)?,
        None => 1,
    };

    let id = explicit.unwrap_or(next);
    if id >= next {
        let advanced = id.checked_add(1).ok_or_else(|| {
            RosterError::ConstraintError(format!("Key generator of '{}' exhausted", schema.name))
        })?;
        state.put(generator, advanced.to_le_bytes().to_vec());
    }

    Ok(id)
}
