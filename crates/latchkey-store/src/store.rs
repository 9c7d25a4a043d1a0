//! Persistent slot → label/PIN store.
//!
//! File format: JSON `{ "codes": [ { "slot", "label", "secret" } ] }`,
//! records sorted by slot for deterministic serialization, written
//! atomically (temp file + rename). The store assumes a single writer per
//! file; concurrent external writers are out of scope.

use crate::crypto::StoreKey;
use crate::error::{Result, StoreError};
use latchkey_core::{CodeSlot, PinCode};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CodeRecord {
    slot: CodeSlot,
    label: String,
    secret: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreFile {
    codes: Vec<CodeRecord>,
}

/// A single decrypted record, returned only by targeted lookup.
#[derive(Debug)]
pub struct StoredCode {
    pub label: String,
    pub pin: PinCode,
}

/// One row of the listing: never carries the PIN.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeListing {
    pub slot: CodeSlot,
    pub label: String,
}

/// Encrypted-at-rest code store.
///
/// # Examples
///
/// ```
/// use latchkey_store::{CodeStore, StoreKey};
/// use latchkey_core::{CodeSlot, PinCode};
///
/// # fn main() -> latchkey_store::Result<()> {
/// let dir = tempfile::tempdir().unwrap();
/// let mut store = CodeStore::open(dir.path().join("codes.json"), StoreKey::generate())?;
///
/// let slot = CodeSlot::new(3).unwrap();
/// store.save(slot, "front door", &PinCode::new("4321").unwrap())?;
///
/// let code = store.get(slot)?.expect("saved above");
/// assert_eq!(code.pin.as_str(), "4321");
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct CodeStore {
    path: PathBuf,
    key: StoreKey,
    records: Vec<CodeRecord>,
}

impl CodeStore {
    /// Open the store at `path`. A missing file yields an empty store.
    ///
    /// # Errors
    ///
    /// Returns `Corrupt` when the file holds invalid JSON or duplicate
    /// slots.
    pub fn open(path: impl Into<PathBuf>, key: StoreKey) -> Result<Self> {
        let path = path.into();
        let records = match fs::read_to_string(&path) {
            Ok(contents) => {
                let file: StoreFile = serde_json::from_str(&contents)
                    .map_err(|e| StoreError::corrupt(format!("bad JSON: {e}")))?;
                validate_unique_slots(&file.codes)?;
                file.codes
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(err) => return Err(err.into()),
        };

        debug!(path = %path.display(), records = records.len(), "opened code store");
        Ok(Self { path, key, records })
    }

    /// Save a code, replacing any existing record for the slot.
    ///
    /// Records are re-sorted by slot and the full store is written
    /// atomically.
    pub fn save(&mut self, slot: CodeSlot, label: &str, pin: &PinCode) -> Result<()> {
        let secret = self.key.encrypt(pin)?;
        self.records.retain(|r| r.slot != slot);
        self.records.push(CodeRecord {
            slot,
            label: label.to_string(),
            secret,
        });
        self.records.sort_by_key(|r| r.slot);
        self.persist()?;
        debug!(%slot, label, "saved code record");
        Ok(())
    }

    /// Targeted lookup: the only operation that decrypts.
    pub fn get(&self, slot: CodeSlot) -> Result<Option<StoredCode>> {
        match self.records.iter().find(|r| r.slot == slot) {
            Some(record) => Ok(Some(StoredCode {
                label: record.label.clone(),
                pin: self.key.decrypt(&record.secret)?,
            })),
            None => Ok(None),
        }
    }

    /// Remove a slot's record. Idempotent: absent slots are a no-op success.
    pub fn delete(&mut self, slot: CodeSlot) -> Result<()> {
        let before = self.records.len();
        self.records.retain(|r| r.slot != slot);
        if self.records.len() != before {
            self.persist()?;
            debug!(%slot, "deleted code record");
        }
        Ok(())
    }

    /// All records without decryption.
    #[must_use]
    pub fn list(&self) -> Vec<CodeListing> {
        self.records
            .iter()
            .map(|r| CodeListing {
                slot: r.slot,
                label: r.label.clone(),
            })
            .collect()
    }

    /// Label cached for a slot, if any.
    #[must_use]
    pub fn label_of(&self, slot: CodeSlot) -> Option<&str> {
        self.records
            .iter()
            .find(|r| r.slot == slot)
            .map(|r| r.label.as_str())
    }

    /// Find another slot already holding `pin`.
    ///
    /// Duplicate hint for the set-code diagnosis. Soft by design: the store
    /// caches intent, so a code present on the lock but absent here goes
    /// undetected. Comparison is constant-time via [`PinCode`]'s `PartialEq`.
    #[must_use]
    pub fn find_slot_with_pin(&self, pin: &PinCode, exclude: CodeSlot) -> Option<CodeSlot> {
        for record in &self.records {
            if record.slot == exclude {
                continue;
            }
            match self.key.decrypt(&record.secret) {
                Ok(stored) if stored == *pin => return Some(record.slot),
                Ok(_) => {}
                Err(err) => {
                    warn!(slot = %record.slot, %err, "skipping undecryptable record");
                }
            }
        }
        None
    }

    fn persist(&self) -> Result<()> {
        let parent = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(parent)?;

        let file = StoreFile {
            codes: self.records.clone(),
        };
        let json = serde_json::to_vec_pretty(&file)?;

        let mut temp = NamedTempFile::new_in(parent)?;
        temp.as_file_mut().write_all(&json)?;
        temp.as_file_mut().flush()?;
        temp.persist(&self.path)
            .map_err(|err| StoreError::Io(err.error))?;
        Ok(())
    }
}

fn validate_unique_slots(records: &[CodeRecord]) -> Result<()> {
    let mut seen = std::collections::HashSet::new();
    for record in records {
        if !seen.insert(record.slot) {
            return Err(StoreError::corrupt(format!(
                "duplicate slot {} in store file",
                record.slot
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn slot(n: u8) -> CodeSlot {
        CodeSlot::new(n).unwrap()
    }

    fn pin(s: &str) -> PinCode {
        PinCode::new(s).unwrap()
    }

    fn open_store(dir: &tempfile::TempDir) -> CodeStore {
        CodeStore::open(dir.path().join("codes.json"), StoreKey::generate()).unwrap()
    }

    #[test]
    fn test_missing_file_is_empty_store() {
        let dir = tempdir().unwrap();
        let store = open_store(&dir);
        assert!(store.list().is_empty());
    }

    #[test]
    fn test_save_and_get_round_trip() {
        let dir = tempdir().unwrap();
        let mut store = open_store(&dir);

        store.save(slot(3), "front door", &pin("4321")).unwrap();

        let code = store.get(slot(3)).unwrap().expect("saved above");
        assert_eq!(code.label, "front door");
        assert_eq!(code.pin.as_str(), "4321");

        assert!(store.get(slot(4)).unwrap().is_none());
    }

    #[test]
    fn test_listing_never_exposes_pins() {
        let dir = tempdir().unwrap();
        let mut store = open_store(&dir);
        store.save(slot(1), "alice", &pin("1234")).unwrap();
        store.save(slot(2), "bob", &pin("5678")).unwrap();

        let listing = store.list();
        assert_eq!(listing.len(), 2);
        let json = serde_json::to_string(&listing).unwrap();
        assert!(!json.contains("1234"));
        assert!(!json.contains("5678"));

        // And neither does the file on disk.
        let on_disk = std::fs::read_to_string(dir.path().join("codes.json")).unwrap();
        assert!(!on_disk.contains("1234"));
        assert!(!on_disk.contains("5678"));
    }

    #[test]
    fn test_save_replaces_existing_slot() {
        let dir = tempdir().unwrap();
        let mut store = open_store(&dir);
        store.save(slot(5), "old", &pin("1111")).unwrap();
        store.save(slot(5), "new", &pin("2222")).unwrap();

        assert_eq!(store.list().len(), 1);
        let code = store.get(slot(5)).unwrap().unwrap();
        assert_eq!(code.label, "new");
        assert_eq!(code.pin.as_str(), "2222");
    }

    #[test]
    fn test_records_sorted_by_slot() {
        let dir = tempdir().unwrap();
        let mut store = open_store(&dir);
        store.save(slot(9), "c", &pin("3333")).unwrap();
        store.save(slot(1), "a", &pin("1111")).unwrap();
        store.save(slot(4), "b", &pin("2222")).unwrap();

        let slots: Vec<u8> = store.list().iter().map(|c| c.slot.as_u8()).collect();
        assert_eq!(slots, vec![1, 4, 9]);
    }

    #[test]
    fn test_delete_is_idempotent() {
        let dir = tempdir().unwrap();
        let mut store = open_store(&dir);

        // Deleting a slot that was never set does not fail.
        store.delete(slot(7)).unwrap();

        store.save(slot(7), "temp", &pin("7777")).unwrap();
        store.delete(slot(7)).unwrap();
        store.delete(slot(7)).unwrap();
        assert!(store.get(slot(7)).unwrap().is_none());
    }

    #[test]
    fn test_find_slot_with_pin() {
        let dir = tempdir().unwrap();
        let mut store = open_store(&dir);
        store.save(slot(5), "existing", &pin("1111")).unwrap();
        store.save(slot(6), "other", &pin("2222")).unwrap();

        assert_eq!(store.find_slot_with_pin(&pin("1111"), slot(2)), Some(slot(5)));
        assert_eq!(store.find_slot_with_pin(&pin("9999"), slot(2)), None);

        // The slot being written is excluded from the duplicate scan.
        assert_eq!(store.find_slot_with_pin(&pin("1111"), slot(5)), None);
    }

    #[test]
    fn test_reopen_with_same_key() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("codes.json");
        let key = StoreKey::generate();
        let key_copy = StoreKey::from_hex(&key.to_hex()).unwrap();

        {
            let mut store = CodeStore::open(&path, key).unwrap();
            store.save(slot(3), "front door", &pin("4321")).unwrap();
        }

        let store = CodeStore::open(&path, key_copy).unwrap();
        let code = store.get(slot(3)).unwrap().unwrap();
        assert_eq!(code.pin.as_str(), "4321");
    }

    #[test]
    fn test_duplicate_slots_in_file_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("codes.json");
        std::fs::write(
            &path,
            r#"{"codes":[{"slot":3,"label":"a","secret":"x"},{"slot":3,"label":"b","secret":"y"}]}"#,
        )
        .unwrap();

        let result = CodeStore::open(&path, StoreKey::generate());
        assert!(matches!(result, Err(StoreError::Corrupt { .. })));
    }
}
