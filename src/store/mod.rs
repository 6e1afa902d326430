//! Persistence boundary for encrypted records.
//!
//! The vault core only ever hands a store opaque bytes: ciphertext,
//! nonce, salt, and metadata.  A `BlobStore` implementation must never
//! be asked to hold plaintext or a derived key, and none of the
//! implementations here could use them if it were.

pub mod file;
pub mod memory;
pub mod record;

pub use file::FileStore;
pub use memory::MemoryStore;
pub use record::{SecretMetadata, SecretRecord};

use uuid::Uuid;

use crate::errors::Result;

/// Pure persistence contract for Secret Records.
///
/// Mutating methods take `&mut self`, so concurrent operations on the
/// same record are serialized by construction — a re-encrypt cannot race
/// a delete through one store handle.
///
/// Failure kinds are distinct: `SecretNotFound` means the id does not
/// exist, `StorageUnavailable` means the backend could not complete the
/// operation (and the caller may retry).
pub trait BlobStore {
    /// Insert or replace a record, returning its id.
    ///
    /// The write is atomic: either a fully-formed record is committed or
    /// nothing is.
    fn put(&mut self, record: SecretRecord) -> Result<Uuid>;

    /// Fetch a record by id.
    fn get(&self, id: &Uuid) -> Result<SecretRecord>;

    /// Remove a record by id.
    fn delete(&mut self, id: &Uuid) -> Result<()>;

    /// All records, in no particular order.  Ciphertext only.
    fn list(&self) -> Result<Vec<SecretRecord>>;
}
