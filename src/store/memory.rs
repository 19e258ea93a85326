//! In-process store.
//!
//! Backs tests and the `--file` mode of the CLI. Assignment is atomic per
//! record (a single mutex guards the whole set), so it gives the same
//! conditional semantics a real store would. Lookups go through a key index.

use crate::error::{Error, Result};
use crate::identifier::VectorId;
use crate::model::{Assign, Record};
use async_trait::async_trait;
use std::collections::HashMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::sync::atomic::{AtomicUsize, Ordering};

use super::Store;

/// Attribute that holds the key in JSON record files.
pub const DEFAULT_KEY_ATTR: &str = "Key";

pub struct MemoryStore {
    inner: Mutex<Inner>,
    assign_calls: AtomicUsize,
    fail_every: Option<usize>,
}

struct Inner {
    records: Vec<Record>,
    /// Key to position in `records`. With duplicate keys the first one wins;
    /// keyless records are not indexed.
    index: HashMap<String, usize>,
}

impl Inner {
    fn find_mut(&mut self, key: &str) -> Option<&mut Record> {
        let pos = *self.index.get(key)?;
        self.records.get_mut(pos)
    }
}

impl MemoryStore {
    pub fn new(records: Vec<Record>) -> Self {
        let mut index = HashMap::with_capacity(records.len());
        for (pos, record) in records.iter().enumerate() {
            if let Some(key) = &record.key {
                index.entry(key.clone()).or_insert(pos);
            }
        }
        Self {
            inner: Mutex::new(Inner { records, index }),
            assign_calls: AtomicUsize::new(0),
            fail_every: None,
        }
    }

    /// Make every `n`-th call to `conditional_assign` fail (1-based).
    ///
    /// A failing call writes nothing.
    pub fn fail_every(mut self, n: usize) -> Self {
        self.fail_every = Some(n.max(1));
        self
    }

    /// Number of `conditional_assign` calls seen so far, failed ones included.
    pub fn assign_calls(&self) -> usize {
        self.assign_calls.load(Ordering::SeqCst)
    }

    /// Copy of the current contents.
    pub fn snapshot(&self) -> Vec<Record> {
        self.lock().records.clone()
    }

    /// Current value of `field` on the record with `key`.
    pub fn get(&self, key: &str, field: &str) -> Option<serde_json::Value> {
        let inner = self.lock();
        let pos = *inner.index.get(key)?;
        inner.records[pos].fields.get(field).cloned()
    }

    /// Load a JSON array of objects. Each object's `key_attr` attribute,
    /// when it is a string, becomes the record key.
    pub fn load_json(path: &Path, key_attr: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let items: Vec<serde_json::Map<String, serde_json::Value>> =
            serde_json::from_str(&content).map_err(|e| {
                Error::Store(format!("bad record file {}: {e}", path.display()))
            })?;

        let records = items
            .into_iter()
            .map(|fields| Record {
                key: fields
                    .get(key_attr)
                    .and_then(|v| v.as_str())
                    .map(str::to_string),
                fields,
            })
            .collect();

        Ok(Self::new(records))
    }

    /// Write the current contents back as a JSON array of objects.
    ///
    /// The array goes to a sibling `.tmp` file first and is renamed over
    /// `path`, so an interrupted save leaves the old file intact.
    pub fn save_json(&self, path: &Path) -> Result<()> {
        let items: Vec<_> = self
            .lock()
            .records
            .iter()
            .map(|r| &r.fields)
            .cloned()
            .collect();
        let json = serde_json::to_string_pretty(&items)?;

        let tmp = temp_path(path);
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // Writes are single inserts, so a poisoned lock still guards whole records.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".tmp");
    PathBuf::from(name)
}

#[async_trait]
impl Store for MemoryStore {
    async fn enumerate(&self) -> Result<Vec<Record>> {
        Ok(self.snapshot())
    }

    async fn conditional_assign(&self, key: &str, field: &str, value: VectorId) -> Result<Assign> {
        let call = self.assign_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(n) = self.fail_every
            && call % n == 0
        {
            return Err(Error::Store(format!("injected failure on call {call}")));
        }

        let mut inner = self.lock();
        let record = inner
            .find_mut(key)
            .ok_or_else(|| Error::Store(format!("no record with key {key:?}")))?;

        if record.has_identifier(field) {
            return Ok(Assign::AlreadyPresent);
        }
        record.fields.insert(field.to_string(), value.into());
        Ok(Assign::Applied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn temp_path_is_a_sibling() {
        let tmp = temp_path(Path::new("/data/records.json"));
        assert_eq!(tmp, PathBuf::from("/data/records.json.tmp"));
    }

    #[test]
    fn duplicate_keys_resolve_to_the_first_record() {
        let store = MemoryStore::new(vec![
            Record::new("dup").field("n", 1),
            Record::new("dup").field("n", 2),
            Record::keyless(),
        ]);
        assert_eq!(store.get("dup", "n"), Some(serde_json::json!(1)));
    }
}
