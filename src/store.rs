//! Page-record storage behind the save/clear endpoints.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tempfile::NamedTempFile;

use crate::contract::{validate_page_id, ValidatedSave};
use crate::error::StoreError;
use crate::record::{PageRecord, PageStatus};

pub trait PageStore: Send + Sync {
    fn get(&self, page_id: &str) -> Result<PageRecord, StoreError>;

    /// Write title block + fingerprint and mark the page tagged.
    fn save_tagging(&self, save: &ValidatedSave) -> Result<PageRecord, StoreError>;

    /// Null the title block and fingerprint. Status is left as it was.
    fn clear_tagging(&self, page_id: &str) -> Result<PageRecord, StoreError>;
}

/// One pretty-printed `<id>.json` per page under `root`.
///
/// Writes are serialized through `writes`, so a read-modify-write never
/// interleaves with another one and the last writer wins.
pub struct JsonFileStore {
    root: PathBuf,
    writes: Mutex<()>,
}

impl JsonFileStore {
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            writes: Mutex::new(()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, page_id: &str) -> Result<PathBuf, StoreError> {
        validate_page_id(page_id).map_err(|_| StoreError::InvalidId(page_id.to_string()))?;
        Ok(self.root.join(format!("{page_id}.json")))
    }

    /// Create or replace a record. Used to register pages as they are rendered.
    pub fn put(&self, record: &PageRecord) -> Result<(), StoreError> {
        let _guard = self.lock();
        self.write_record(record)
    }

    fn lock(&self) -> MutexGuard<'_, ()> {
        // `()` guards no data, so poisoning is ignored
        self.writes.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Write to a fresh temp file in `root`, then rename it over the record.
    fn write_record(&self, record: &PageRecord) -> Result<(), StoreError> {
        let path = self.path_for(&record.id)?;
        let data = serde_json::to_string_pretty(record)?;
        let mut tmp = NamedTempFile::new_in(&self.root)?;
        tmp.write_all(data.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(&path).map_err(|e| e.error)?;
        Ok(())
    }

    fn update<F>(&self, page_id: &str, apply: F) -> Result<PageRecord, StoreError>
    where
        F: FnOnce(&mut PageRecord),
    {
        let _guard = self.lock();
        let mut record = self.get(page_id)?;
        apply(&mut record);
        self.write_record(&record)?;
        Ok(record)
    }
}

impl PageStore for JsonFileStore {
    fn get(&self, page_id: &str) -> Result<PageRecord, StoreError> {
        let path = self.path_for(page_id)?;
        let data = match fs::read_to_string(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound(page_id.to_string()))
            }
            Err(e) => return Err(e.into()),
        };
        let mut record: PageRecord = serde_json::from_str(&data)?;
        // the file name is authoritative
        record.id = page_id.to_string();
        Ok(record)
    }

    fn save_tagging(&self, save: &ValidatedSave) -> Result<PageRecord, StoreError> {
        let fingerprint = save.fingerprint().to_value();
        let record = self.update(&save.page_id, |record| {
            record.set_titleblock(Some(&save.titleblock));
            record.fingerprint = Some(fingerprint);
            record.status = PageStatus::Tagged;
        })?;
        tracing::info!(page_id = %save.page_id, areas = save.areas.len(), "title block saved");
        Ok(record)
    }

    fn clear_tagging(&self, page_id: &str) -> Result<PageRecord, StoreError> {
        let record = self.update(page_id, |record| {
            record.set_titleblock(None);
            record.fingerprint = None;
        })?;
        tracing::info!(page_id, "title block cleared");
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::{FieldAreas, FieldKey};
    use crate::geometry::NormRect;
    use assert_matches::assert_matches;

    fn store_with_page(dir: &Path) -> JsonFileStore {
        let store = JsonFileStore::open(dir).unwrap();
        let mut record = PageRecord::new("p1", Some("renders/p1.png".into()));
        record.status = PageStatus::Rendered;
        store.put(&record).unwrap();
        store
    }

    fn save() -> ValidatedSave {
        let mut areas = FieldAreas::new();
        areas.set(FieldKey::Revision, NormRect::new(0.8, 0.1, 0.15, 0.3).unwrap());
        ValidatedSave {
            page_id: "p1".into(),
            titleblock: NormRect::new(0.6, 0.8, 0.4, 0.2).unwrap(),
            areas,
        }
    }

    #[test]
    fn save_marks_tagged_and_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_with_page(dir.path());

        let first = store.save_tagging(&save()).unwrap();
        let on_disk_once = fs::read_to_string(dir.path().join("p1.json")).unwrap();
        let second = store.save_tagging(&save()).unwrap();
        let on_disk_twice = fs::read_to_string(dir.path().join("p1.json")).unwrap();

        assert_eq!(first, second);
        assert_eq!(on_disk_once, on_disk_twice);
        assert_eq!(first.status, PageStatus::Tagged);
        assert_eq!(first.titleblock(), Some(save().titleblock));
        assert_eq!(first.fingerprint().unwrap().field_areas(), save().areas);
    }

    #[test]
    fn clear_nulls_tagging_but_keeps_status() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_with_page(dir.path());
        store.save_tagging(&save()).unwrap();

        let cleared = store.clear_tagging("p1").unwrap();
        assert_eq!(cleared.titleblock_x, None);
        assert_eq!(cleared.titleblock_height, None);
        assert_eq!(cleared.fingerprint, None);
        assert_eq!(cleared.status, PageStatus::Tagged);
        assert_eq!(cleared.image_ref.as_deref(), Some("renders/p1.png"));

        // clearing twice is a harmless rewrite
        assert_eq!(store.clear_tagging("p1").unwrap(), cleared);
    }

    #[test]
    fn concurrent_writes_to_one_page_all_land() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_with_page(dir.path());

        let failures: usize = std::thread::scope(|scope| {
            let workers: Vec<_> = (0..16)
                .map(|worker| {
                    let store = &store;
                    scope.spawn(move || {
                        (0..50)
                            .filter(|round| {
                                let outcome = if (worker + round) % 5 == 0 {
                                    store.clear_tagging("p1")
                                } else {
                                    store.save_tagging(&save())
                                };
                                outcome.is_err()
                            })
                            .count()
                    })
                })
                .collect();
            workers.into_iter().map(|w| w.join().unwrap()).sum()
        });
        assert_eq!(failures, 0);

        let record = store.get("p1").unwrap();
        assert_eq!(record.status, PageStatus::Tagged);
        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .filter(|name| name != "p1.json")
            .collect();
        assert!(leftovers.is_empty(), "{leftovers:?}");
    }

    #[test]
    fn unknown_and_unsafe_ids() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::open(dir.path()).unwrap();
        assert_matches!(store.get("nope"), Err(StoreError::NotFound(_)));
        assert_matches!(store.clear_tagging("nope"), Err(StoreError::NotFound(_)));
        assert_matches!(store.get("../secrets"), Err(StoreError::InvalidId(_)));
    }

    #[test]
    fn corrupt_record_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::open(dir.path()).unwrap();
        fs::write(dir.path().join("bad.json"), "{ not json").unwrap();
        assert_matches!(store.get("bad"), Err(StoreError::Corrupt(_)));
    }
}
