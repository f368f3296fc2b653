//! Version change (upgrade) scope
//!
//! Handed to the upgrade closure while a database is opened at a higher
//! version than it has on disk.

use std::collections::BTreeSet;

use crate::catalog::{CollectionOptions, CollectionSchema};
use crate::error::{Result, RosterError};

/// Schema changes staged during an upgrade
///
/// Nothing is persisted unless the upgrade closure returns `Ok`; the staged
/// collections and the new version are then committed as one batch.
#[derive(Debug)]
pub struct VersionChange {
    old_version: u32,
    new_version: u32,
    existing: BTreeSet<String>,
    created: Vec<CollectionSchema>,
}

impl VersionChange {
    pub(crate) fn new(
        old_version: u32,
        new_version: u32,
        existing: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            old_version,
            new_version,
            existing: existing.into_iter().collect(),
            created: Vec::new(),
        }
    }

    /// Version on disk before this upgrade (0 for a new database)
    pub fn old_version(&self) -> u32 {
        self.old_version
    }

    pub fn new_version(&self) -> u32 {
        self.new_version
    }

    /// Names of all collections, including ones created in this upgrade
    pub fn collection_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .existing
            .iter()
            .cloned()
            .chain(self.created.iter().map(|s| s.name.clone()))
            .collect();
        names.sort();
        names
    }

    pub fn contains_collection(&self, name: &str) -> bool {
        self.existing.contains(name) || self.created.iter().any(|s| s.name == name)
    }

    /// Create a collection
    ///
    /// Fails with `ConstraintError` if it already exists.
    pub fn create_collection(&mut self, name: &str, options: CollectionOptions) -> Result<()> {
        if name.is_empty() || name.contains('\0') {
            return Err(RosterError::Config(format!(
                "Invalid collection name {:?}",
                name
            )));
        }
        if options.key_path.is_empty() {
            return Err(RosterError::Config(format!(
                "Collection '{}' needs a key path",
                name
            )));
        }
        if self.contains_collection(name) {
            return Err(RosterError::ConstraintError(format!(
                "Collection '{}' already exists",
                name
            )));
        }

        tracing::debug!(collection = name, key_path = %options.key_path, "collection staged");
        self.created.push(CollectionSchema {
            name: name.to_string(),
            key_path: options.key_path,
            auto_increment: options.auto_increment,
        });
        Ok(())
    }

    pub(crate) fn into_created(self) -> Vec<CollectionSchema> {
        self.created
    }
}
