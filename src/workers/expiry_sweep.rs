//! Reclaims space held by expired periodic counters. Reads already treat
//! them as absent; this only deletes them.

use crate::store::{KeyValueStore, StoreError};

pub async fn run(store: &dyn KeyValueStore) {
    tracing::debug!("expiry_sweep: start");
    match sweep(store, chrono::Utc::now().timestamp()) {
        Ok(count) => {
            if count > 0 {
                tracing::info!(removed = count, "expiry_sweep: done");
            }
        }
        Err(e) => tracing::error!(error = %e, "expiry_sweep failed"),
    }
}

fn sweep(store: &dyn KeyValueStore, now_secs: i64) -> Result<u64, StoreError> {
    let removed = store.purge_expired(now_secs)?;
    if removed > 0 {
        store.flush()?;
    }
    Ok(removed)
}
