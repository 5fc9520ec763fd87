use sled::Db;

use crate::constants::MAX_CAS_RETRIES;
use crate::store::{decode, encode, now_secs, trees, Entry, KeyValueStore, Mutation, StoreError};

/// Embedded persistent backend. Every command is a compare-and-swap on one
/// key of the `kv` tree.
#[derive(Debug)]
pub struct SledStore {
    db: Db,
    kv: sled::Tree,
    prefix: String,
}

impl SledStore {
    pub fn open(sled_path: &str, prefix: &str) -> Result<Self, StoreError> {
        let db = sled::open(sled_path)?;
        Self::from_db(db, prefix)
    }

    /// A database that is removed when dropped.
    pub fn temporary(prefix: &str) -> Result<Self, StoreError> {
        let db = sled::Config::new().temporary(true).open()?;
        Self::from_db(db, prefix)
    }

    fn from_db(db: Db, prefix: &str) -> Result<Self, StoreError> {
        let kv = db.open_tree(trees::KV)?;
        Ok(Self {
            db,
            kv,
            prefix: prefix.to_string(),
        })
    }

    fn full_key(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }
}

impl KeyValueStore for SledStore {
    fn backend_name(&self) -> &'static str {
        "sled"
    }

    fn read(&self, key: &str) -> Result<Option<Entry>, StoreError> {
        let full = self.full_key(key);
        match self.kv.get(full.as_bytes())? {
            Some(raw) => {
                let entry = decode(&raw)?;
                Ok((!entry.is_expired(now_secs())).then_some(entry))
            }
            None => Ok(None),
        }
    }

    fn mutate(&self, key: &str, f: &mut Mutation<'_>) -> Result<Option<Entry>, StoreError> {
        let full = self.full_key(key);

        for attempt in 1..=MAX_CAS_RETRIES {
            let current_raw = self.kv.get(full.as_bytes())?;
            let current = match &current_raw {
                Some(raw) => Some(decode(raw)?),
                None => None,
            };
            let now = now_secs();
            let live = current.filter(|entry| !entry.is_expired(now));

            let next = f(live)?;
            let next_raw = match &next {
                Some(entry) => Some(encode(entry)?),
                None => None,
            };

            match self
                .kv
                .compare_and_swap(full.as_bytes(), current_raw.as_ref(), next_raw)?
            {
                Ok(()) => return Ok(next),
                Err(_) => {
                    tracing::debug!(key, attempt, "Concurrent write detected, retrying");
                }
            }
        }

        tracing::warn!(key, attempts = MAX_CAS_RETRIES, "CAS retries exhausted");
        Err(StoreError::CasRetryExhausted {
            key: key.to_string(),
            attempts: MAX_CAS_RETRIES,
        })
    }

    fn purge_expired(&self, now_secs: i64) -> Result<u64, StoreError> {
        let mut expired = Vec::new();
        for item in self.kv.scan_prefix(self.prefix.as_bytes()) {
            let (key, raw) = item?;
            match decode(&raw) {
                Ok(entry) if entry.is_expired(now_secs) => expired.push((key, raw)),
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(error = %e, key = %String::from_utf8_lossy(&key), "Undecodable entry");
                }
            }
        }

        let mut removed = 0;
        for (key, raw) in expired {
            // A concurrent write may have revived the key since the scan.
            if self
                .kv
                .compare_and_swap(&key, Some(&raw), None::<Vec<u8>>)?
                .is_ok()
            {
                removed += 1;
            }
        }
        Ok(removed)
    }

    fn len(&self) -> Result<usize, StoreError> {
        let mut count = 0;
        for item in self.kv.scan_prefix(self.prefix.as_bytes()).keys() {
            item?;
            count += 1;
        }
        Ok(count)
    }

    fn flush(&self) -> Result<(), StoreError> {
        self.db.flush()?;
        Ok(())
    }
}
