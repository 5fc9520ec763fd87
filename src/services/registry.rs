use chrono::Utc;
use rand::Rng;
use serde::Serialize;

use crate::services::ServiceError;
use crate::store::{keys, KeyValueStore};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Registration {
    pub chip_id: u32,
    pub user_id: u32,
    pub joined_timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserRecord {
    pub user_id: u32,
    pub chip_id: u32,
    pub joined_timestamp: i64,
}

pub fn register(store: &dyn KeyValueStore, chip_id: u32) -> Result<Registration, ServiceError> {
    register_with(
        store,
        chip_id,
        Utc::now().timestamp_millis(),
        &mut rand::thread_rng(),
    )
}

/// Pairs `chip_id` with a fresh random user id.
///
/// Candidates are drawn uniformly from the 32-bit space until one is non-zero
/// and unclaimed; claiming is create-if-absent on the user record, so two
/// concurrent signups can never share an id. The loop has no retry cap.
/// The pairing counters are written afterwards and are not rolled back if
/// that write fails.
pub fn register_with<R: Rng>(
    store: &dyn KeyValueStore,
    chip_id: u32,
    joined_timestamp: i64,
    rng: &mut R,
) -> Result<Registration, ServiceError> {
    if chip_id == 0 {
        return Err(ServiceError::InvalidArgument(
            "Invalid request: chip_id is out of bounds".to_string(),
        ));
    }

    let user_fields = [
        (keys::CHIP_ID, chip_id.to_string()),
        (keys::JOINED_TIMESTAMP, joined_timestamp.to_string()),
    ];

    let mut attempts: u64 = 0;
    let user_id = loop {
        attempts += 1;
        let candidate: u32 = rng.gen();
        if candidate == 0 {
            continue;
        }
        if store.hset_if_absent(&keys::user_key(candidate), &user_fields)? {
            break candidate;
        }
        tracing::warn!(candidate, attempts, "user_id already taken, drawing again");
    };

    store.hset(
        &keys::pairing_key(chip_id, user_id),
        &[
            (keys::TOTAL_FLOW_VOLUME, "0".to_string()),
            (keys::LAST_FLOW_VOLUME, "0".to_string()),
        ],
    )?;

    tracing::info!(chip_id, user_id, attempts, "Device paired with new user");

    Ok(Registration {
        chip_id,
        user_id,
        joined_timestamp,
    })
}

pub fn lookup(store: &dyn KeyValueStore, user_id: u32) -> Result<UserRecord, ServiceError> {
    let record = store.hgetall(&keys::user_key(user_id))?;
    let chip_id = record
        .get(keys::CHIP_ID)
        .and_then(|raw| raw.parse::<u32>().ok())
        .ok_or_else(|| ServiceError::NotFound(format!("User {} not found", user_id)))?;
    let joined_timestamp = record
        .get(keys::JOINED_TIMESTAMP)
        .and_then(|raw| raw.parse::<i64>().ok())
        .unwrap_or(0);

    Ok(UserRecord {
        user_id,
        chip_id,
        joined_timestamp,
    })
}
