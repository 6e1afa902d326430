//! In-memory blob store for embedding and tests.

use std::collections::HashMap;

use uuid::Uuid;

use crate::errors::{Result, VaultError};
use crate::store::record::SecretRecord;
use crate::store::BlobStore;

/// HashMap-backed store.  Records live only as long as the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: HashMap<Uuid, SecretRecord>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records currently held.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl BlobStore for MemoryStore {
    fn put(&mut self, record: SecretRecord) -> Result<Uuid> {
        let id = record.id;
        self.records.insert(id, record);
        Ok(id)
    }

    fn get(&self, id: &Uuid) -> Result<SecretRecord> {
        self.records
            .get(id)
            .cloned()
            .ok_or(VaultError::SecretNotFound(*id))
    }

    fn delete(&mut self, id: &Uuid) -> Result<()> {
        self.records
            .remove(id)
            .map(|_| ())
            .ok_or(VaultError::SecretNotFound(*id))
    }

    fn list(&self) -> Result<Vec<SecretRecord>> {
        Ok(self.records.values().cloned().collect())
    }
}
