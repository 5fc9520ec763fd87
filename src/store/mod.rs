pub mod keys;
pub mod memory;
pub mod sled_store;
pub mod trees;

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{StoreBackend, StoreConfig};

pub use memory::MemoryStore;
pub use sled_store::SledStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("wrong kind of value: key={key}, expected={expected}")]
    WrongType { key: String, expected: &'static str },
    #[error("value is not a valid float: key={key}")]
    NotANumber { key: String },
    #[error("CAS retry exhausted after {attempts} attempts: key={key}")]
    CasRetryExhausted { key: String, attempts: u32 },
    #[error("store lock poisoned")]
    Poisoned,
}

/// A stored value plus its optional absolute expiry (unix seconds).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entry {
    pub value: EntryValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "camelCase")]
pub enum EntryValue {
    Scalar(String),
    Hash(BTreeMap<String, String>),
}

impl Entry {
    pub fn scalar(value: impl Into<String>) -> Self {
        Self {
            value: EntryValue::Scalar(value.into()),
            expires_at: None,
        }
    }

    pub fn hash(fields: BTreeMap<String, String>) -> Self {
        Self {
            value: EntryValue::Hash(fields),
            expires_at: None,
        }
    }

    pub fn is_expired(&self, now_secs: i64) -> bool {
        matches!(self.expires_at, Some(at) if at <= now_secs)
    }
}

/// Read-modify-write callback. Receives the live entry (absent or expired
/// keys show up as `None`); returning `Ok(None)` deletes the key.
pub type Mutation<'a> = dyn FnMut(Option<Entry>) -> Result<Option<Entry>, StoreError> + 'a;

/// Key-value store with Redis-like commands.
///
/// Backends only provide [`read`](Self::read) and [`mutate`](Self::mutate);
/// every command below is one `mutate` call, so each command is atomic for
/// its key. Nothing is atomic across keys.
pub trait KeyValueStore: Send + Sync {
    fn backend_name(&self) -> &'static str;

    fn read(&self, key: &str) -> Result<Option<Entry>, StoreError>;

    fn mutate(&self, key: &str, f: &mut Mutation<'_>) -> Result<Option<Entry>, StoreError>;

    /// Physically removes entries whose expiry is at or before `now_secs`.
    fn purge_expired(&self, now_secs: i64) -> Result<u64, StoreError>;

    /// Number of stored entries, expired-but-unpurged ones included.
    fn len(&self) -> Result<usize, StoreError>;

    fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len()? == 0)
    }

    fn flush(&self) -> Result<(), StoreError> {
        Ok(())
    }

    fn exists(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.read(key)?.is_some())
    }

    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        match self.read(key)? {
            None => Ok(None),
            Some(entry) => Ok(Some(expect_scalar(key, entry.value)?)),
        }
    }

    fn get_f64(&self, key: &str) -> Result<Option<f64>, StoreError> {
        match self.get(key)? {
            None => Ok(None),
            Some(raw) => parse_float(key, &raw).map(Some),
        }
    }

    /// Overwrites the key with a scalar and drops any expiry.
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.mutate(key, &mut |_| Ok(Some(Entry::scalar(value))))?;
        Ok(())
    }

    /// Adds `delta` to a scalar float, creating it at zero when absent.
    /// An existing expiry is kept.
    fn incr_by_float(&self, key: &str, delta: f64) -> Result<f64, StoreError> {
        let mut result = 0.0;
        self.mutate(key, &mut |current| {
            let (base, expires_at) = match current {
                None => (0.0, None),
                Some(entry) => {
                    let expires_at = entry.expires_at;
                    let raw = expect_scalar(key, entry.value)?;
                    (parse_float(key, &raw)?, expires_at)
                }
            };
            result = checked_sum(key, base, delta)?;
            Ok(Some(Entry {
                value: EntryValue::Scalar(format_float(result)),
                expires_at,
            }))
        })?;
        Ok(result)
    }

    /// Sets an absolute expiry on an existing key. Returns `false` when the
    /// key does not exist. A timestamp already in the past deletes the key.
    fn expire_at(&self, key: &str, at_secs: i64) -> Result<bool, StoreError> {
        let now = now_secs();
        let mut applied = false;
        self.mutate(key, &mut |current| {
            applied = current.is_some();
            Ok(current.and_then(|mut entry| {
                if at_secs <= now {
                    return None;
                }
                entry.expires_at = Some(at_secs);
                Some(entry)
            }))
        })?;
        Ok(applied)
    }

    /// Absolute expiry of a live key, `None` when absent or persistent.
    fn expire_time(&self, key: &str) -> Result<Option<i64>, StoreError> {
        Ok(self.read(key)?.and_then(|entry| entry.expires_at))
    }

    fn hgetall(&self, key: &str) -> Result<BTreeMap<String, String>, StoreError> {
        match self.read(key)? {
            None => Ok(BTreeMap::new()),
            Some(entry) => expect_hash(key, entry.value),
        }
    }

    fn hget(&self, key: &str, field: &str) -> Result<Option<String>, StoreError> {
        Ok(self.hgetall(key)?.remove(field))
    }

    fn hget_f64(&self, key: &str, field: &str) -> Result<Option<f64>, StoreError> {
        match self.hget(key, field)? {
            None => Ok(None),
            Some(raw) => parse_float(key, &raw).map(Some),
        }
    }

    fn hset(&self, key: &str, fields: &[(&str, String)]) -> Result<(), StoreError> {
        self.update_hash(key, &mut |hash| {
            for (field, value) in fields {
                hash.insert((*field).to_string(), value.clone());
            }
            Ok(())
        })?;
        Ok(())
    }

    /// Creates the hash only when the key is absent. Returns whether it was
    /// created.
    fn hset_if_absent(&self, key: &str, fields: &[(&str, String)]) -> Result<bool, StoreError> {
        let mut created = false;
        self.mutate(key, &mut |current| {
            if current.is_some() {
                created = false;
                return Ok(current);
            }
            created = true;
            let hash = fields
                .iter()
                .map(|(field, value)| ((*field).to_string(), value.clone()))
                .collect();
            Ok(Some(Entry::hash(hash)))
        })?;
        Ok(created)
    }

    fn hincr_by_float(&self, key: &str, field: &str, delta: f64) -> Result<f64, StoreError> {
        let mut result = 0.0;
        self.update_hash(key, &mut |hash| {
            let base = match hash.get(field) {
                Some(raw) => parse_float(key, raw)?,
                None => 0.0,
            };
            result = checked_sum(key, base, delta)?;
            hash.insert(field.to_string(), format_float(result));
            Ok(())
        })?;
        Ok(result)
    }

    /// Applies `f` to the hash at `key` (empty when absent) as a single atomic
    /// step and returns the hash as written.
    fn update_hash(
        &self,
        key: &str,
        f: &mut dyn FnMut(&mut BTreeMap<String, String>) -> Result<(), StoreError>,
    ) -> Result<BTreeMap<String, String>, StoreError> {
        let mut written = BTreeMap::new();
        self.mutate(key, &mut |current| {
            let (mut hash, expires_at) = match current {
                None => (BTreeMap::new(), None),
                Some(entry) => {
                    let expires_at = entry.expires_at;
                    (expect_hash(key, entry.value)?, expires_at)
                }
            };
            f(&mut hash)?;
            written = hash.clone();
            Ok(Some(Entry {
                value: EntryValue::Hash(hash),
                expires_at,
            }))
        })?;
        Ok(written)
    }
}

pub fn open_store(config: &StoreConfig) -> Result<Arc<dyn KeyValueStore>, StoreError> {
    match config.backend {
        StoreBackend::Sled => {
            tracing::info!(path = %config.sled_path, prefix = %config.key_prefix, "Opening sled store");
            Ok(Arc::new(SledStore::open(&config.sled_path, &config.key_prefix)?))
        }
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory store; data is lost on restart");
            Ok(Arc::new(MemoryStore::new(&config.key_prefix)))
        }
    }
}

pub(crate) fn now_secs() -> i64 {
    chrono::Utc::now().timestamp()
}

pub(crate) fn encode(entry: &Entry) -> Result<Vec<u8>, StoreError> {
    Ok(serde_json::to_vec(entry)?)
}

pub(crate) fn decode(bytes: &[u8]) -> Result<Entry, StoreError> {
    Ok(serde_json::from_slice(bytes)?)
}

fn expect_scalar(key: &str, value: EntryValue) -> Result<String, StoreError> {
    match value {
        EntryValue::Scalar(raw) => Ok(raw),
        EntryValue::Hash(_) => Err(StoreError::WrongType {
            key: key.to_string(),
            expected: "scalar",
        }),
    }
}

fn expect_hash(key: &str, value: EntryValue) -> Result<BTreeMap<String, String>, StoreError> {
    match value {
        EntryValue::Hash(hash) => Ok(hash),
        EntryValue::Scalar(_) => Err(StoreError::WrongType {
            key: key.to_string(),
            expected: "hash",
        }),
    }
}

fn parse_float(key: &str, raw: &str) -> Result<f64, StoreError> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| StoreError::NotANumber {
            key: key.to_string(),
        })
}

fn checked_sum(key: &str, base: f64, delta: f64) -> Result<f64, StoreError> {
    let sum = base + delta;
    if sum.is_finite() {
        Ok(sum)
    } else {
        Err(StoreError::NotANumber {
            key: key.to_string(),
        })
    }
}

fn format_float(value: f64) -> String {
    value.to_string()
}
