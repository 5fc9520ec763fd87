use std::collections::HashMap;
use std::sync::Mutex;

use crate::store::{now_secs, Entry, KeyValueStore, Mutation, StoreError};

/// Process-local backend guarded by a single mutex. Used in tests and for
/// throwaway deployments (`STORE_BACKEND=memory`).
#[derive(Debug, Default)]
pub struct MemoryStore {
    prefix: String,
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryStore {
    pub fn new(prefix: &str) -> Self {
        Self {
            prefix: prefix.to_string(),
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn full_key(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }
}

impl KeyValueStore for MemoryStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    fn read(&self, key: &str) -> Result<Option<Entry>, StoreError> {
        let entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        let now = now_secs();
        Ok(entries
            .get(&self.full_key(key))
            .filter(|entry| !entry.is_expired(now))
            .cloned())
    }

    fn mutate(&self, key: &str, f: &mut Mutation<'_>) -> Result<Option<Entry>, StoreError> {
        let full = self.full_key(key);
        let mut entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        let now = now_secs();
        let live = entries
            .get(&full)
            .filter(|entry| !entry.is_expired(now))
            .cloned();

        match f(live)? {
            Some(entry) => {
                entries.insert(full, entry.clone());
                Ok(Some(entry))
            }
            None => {
                entries.remove(&full);
                Ok(None)
            }
        }
    }

    fn purge_expired(&self, now_secs: i64) -> Result<u64, StoreError> {
        let mut entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now_secs));
        Ok((before - entries.len()) as u64)
    }

    fn len(&self) -> Result<usize, StoreError> {
        let entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(entries.len())
    }
}
