//! File-backed blob store.
//!
//! All records live in a single file with this layout:
//!
//! ```text
//! [ZKVB: 4 bytes][version: 1 byte][records JSON]
//! ```
//!
//! - **Magic** (`ZKVB`): identifies the file as a zkvault blob file.
//! - **Version**: format version (currently `1`).
//! - **Records JSON**: serialized `Vec<SecretRecord>`.
//!
//! Every mutation rewrites the file atomically (temp file + rename in
//! the same directory), so an abandoned operation never leaves a
//! half-written record behind.  There is no keyed integrity trailer:
//! the store holds no key material, and each record's AES-GCM tag
//! already authenticates its ciphertext.

use std::fs;
use std::path::{Path, PathBuf};

use uuid::Uuid;

use crate::errors::{Result, VaultError};
use crate::store::record::SecretRecord;
use crate::store::BlobStore;

/// Magic bytes at the start of every blob file.
const MAGIC: &[u8; 4] = b"ZKVB";

/// Current file format version.
const CURRENT_VERSION: u8 = 1;

/// Fixed-size prefix: 4 (magic) + 1 (version).
const PREFIX_LEN: usize = 5;

/// Single-file persistent store.  Keeps records in memory and writes
/// the whole file back on every mutation; a failed write rolls the
/// in-memory view back so it never diverges from disk.
pub struct FileStore {
    path: PathBuf,
    records: Vec<SecretRecord>,
}

impl FileStore {
    /// Open the blob file at `path`, creating an empty store if the file
    /// does not exist yet.
    pub fn open(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self {
                path: path.to_path_buf(),
                records: Vec::new(),
            });
        }

        let data = fs::read(path)
            .map_err(|e| VaultError::StorageUnavailable(format!("read {}: {e}", path.display())))?;

        if data.len() < PREFIX_LEN || &data[0..4] != MAGIC {
            return Err(VaultError::StorageUnavailable(format!(
                "{} is not a zkvault blob file",
                path.display()
            )));
        }

        let version = data[4];
        if version != CURRENT_VERSION {
            return Err(VaultError::StorageUnavailable(format!(
                "unsupported blob file version {version}, expected {CURRENT_VERSION}"
            )));
        }

        let records: Vec<SecretRecord> = serde_json::from_slice(&data[PREFIX_LEN..])
            .map_err(|e| VaultError::StorageUnavailable(format!("records JSON: {e}")))?;

        Ok(Self {
            path: path.to_path_buf(),
            records,
        })
    }

    /// Returns the path to the blob file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Serialize all records and write the file atomically.
    ///
    /// Writes to a temp file in the same directory, then renames over
    /// the target so readers never see a half-written file.
    fn save(&self) -> Result<()> {
        let records_bytes = serde_json::to_vec(&self.records)
            .map_err(|e| VaultError::StorageUnavailable(format!("records JSON: {e}")))?;

        let mut buf = Vec::with_capacity(PREFIX_LEN + records_bytes.len());
        buf.extend_from_slice(MAGIC);
        buf.push(CURRENT_VERSION);
        buf.extend_from_slice(&records_bytes);

        let parent = self.path.parent().unwrap_or(Path::new("."));
        let tmp_path = parent.join(format!(
            ".{}.tmp",
            self.path.file_name().unwrap_or_default().to_string_lossy()
        ));

        fs::write(&tmp_path, &buf)
            .map_err(|e| VaultError::StorageUnavailable(format!("write temp file: {e}")))?;
        fs::rename(&tmp_path, &self.path)
            .map_err(|e| VaultError::StorageUnavailable(format!("rename into place: {e}")))?;

        Ok(())
    }

    fn position(&self, id: &Uuid) -> Option<usize> {
        self.records.iter().position(|r| r.id == *id)
    }
}

impl BlobStore for FileStore {
    fn put(&mut self, record: SecretRecord) -> Result<Uuid> {
        let id = record.id;
        let previous = match self.position(&id) {
            Some(idx) => Some(std::mem::replace(&mut self.records[idx], record)),
            None => {
                self.records.push(record);
                None
            }
        };

        if let Err(err) = self.save() {
            // Roll back so the in-memory view still matches the file.
            match previous {
                Some(prev) => {
                    if let Some(idx) = self.position(&id) {
                        self.records[idx] = prev;
                    }
                }
                None => self.records.retain(|r| r.id != id),
            }
            return Err(err);
        }

        Ok(id)
    }

    fn get(&self, id: &Uuid) -> Result<SecretRecord> {
        self.position(id)
            .map(|idx| self.records[idx].clone())
            .ok_or(VaultError::SecretNotFound(*id))
    }

    fn delete(&mut self, id: &Uuid) -> Result<()> {
        let idx = self.position(id).ok_or(VaultError::SecretNotFound(*id))?;
        let removed = self.records.remove(idx);

        if let Err(err) = self.save() {
            self.records.insert(idx, removed);
            return Err(err);
        }

        Ok(())
    }

    fn list(&self) -> Result<Vec<SecretRecord>> {
        Ok(self.records.clone())
    }
}
