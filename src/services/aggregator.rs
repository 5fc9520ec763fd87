use std::collections::BTreeMap;

use chrono::{DateTime, Local, TimeZone};
use serde::Serialize;

use crate::constants::SESSION_GAP_SECS;
use crate::services::periods::{period_boundary, Period};
use crate::services::ServiceError;
use crate::store::{keys, KeyValueStore};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlowSnapshot {
    pub chip_id: u32,
    pub user_id: u32,
    pub total_flow_volume: f64,
    pub daily_flow_volume: f64,
    pub weekly_flow_volume: f64,
    pub monthly_flow_volume: f64,
    pub yearly_flow_volume: f64,
    pub last_flow_volume: f64,
    pub last_timestamp: i64,
}

/// One reading as posted by a device. Identifiers are not range checked on
/// the write path.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlowReading {
    pub chip_id: i64,
    pub user_id: i64,
    pub flow_volume: f64,
}

/// Whether a reading extended the running session or started a new one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    Continued,
    Started,
}

pub fn get_counters(
    store: &dyn KeyValueStore,
    chip_id: u32,
    user_id: u32,
) -> Result<FlowSnapshot, ServiceError> {
    let pairing = store.hgetall(&keys::pairing_key(chip_id, user_id))?;
    let counter = |period: Period| -> Result<f64, ServiceError> {
        let key = keys::period_counter_key(chip_id, user_id, period.as_str());
        Ok(store.get_f64(&key)?.unwrap_or(0.0))
    };

    Ok(FlowSnapshot {
        chip_id,
        user_id,
        total_flow_volume: float_field(&pairing, keys::TOTAL_FLOW_VOLUME),
        daily_flow_volume: counter(Period::Daily)?,
        weekly_flow_volume: counter(Period::Weekly)?,
        monthly_flow_volume: counter(Period::Monthly)?,
        yearly_flow_volume: counter(Period::Yearly)?,
        last_flow_volume: float_field(&pairing, keys::LAST_FLOW_VOLUME),
        last_timestamp: int_field(&pairing, keys::LAST_TIMESTAMP).unwrap_or(0),
    })
}

pub fn record_flow(
    store: &dyn KeyValueStore,
    reading: &FlowReading,
) -> Result<SessionOutcome, ServiceError> {
    record_flow_at(store, reading, &Local::now())
}

/// Applies a reading as of `now`.
///
/// The total and the four periodic counters are each bumped with one atomic
/// increment, and every periodic key gets its expiry re-pinned to the next
/// boundary. The session fields are updated in a single atomic hash update,
/// so concurrent readings for one pairing cannot lose each other's volume.
/// Nothing is atomic across keys.
pub fn record_flow_at<Tz: TimeZone>(
    store: &dyn KeyValueStore,
    reading: &FlowReading,
    now: &DateTime<Tz>,
) -> Result<SessionOutcome, ServiceError> {
    let volume = reading.flow_volume;
    // Stricter than "numeric": negative readings would make the total shrink.
    if !volume.is_finite() || volume < 0.0 {
        return Err(ServiceError::InvalidArgument(
            "Invalid request: flow_volume must be a non-negative number".to_string(),
        ));
    }

    let pairing = keys::pairing_key(reading.chip_id, reading.user_id);
    let total = store.hincr_by_float(&pairing, keys::TOTAL_FLOW_VOLUME, volume)?;

    for period in Period::ALL {
        let key = keys::period_counter_key(reading.chip_id, reading.user_id, period.as_str());
        store.incr_by_float(&key, volume)?;
        store.expire_at(&key, period_boundary(now, period).timestamp())?;
    }

    let now_secs = now.timestamp();
    let mut outcome = SessionOutcome::Started;
    store.update_hash(&pairing, &mut |hash| {
        let last_timestamp = int_field(hash, keys::LAST_TIMESTAMP);
        let session_volume = match last_timestamp {
            Some(last) if now_secs - last < SESSION_GAP_SECS => {
                outcome = SessionOutcome::Continued;
                float_field(hash, keys::LAST_FLOW_VOLUME) + volume
            }
            _ => {
                outcome = SessionOutcome::Started;
                volume
            }
        };
        hash.insert(keys::LAST_FLOW_VOLUME.to_string(), session_volume.to_string());
        hash.insert(keys::LAST_TIMESTAMP.to_string(), now_secs.to_string());
        Ok(())
    })?;

    tracing::debug!(
        chip_id = reading.chip_id,
        user_id = reading.user_id,
        flow_volume = volume,
        total,
        session = ?outcome,
        "Flow reading recorded"
    );

    Ok(outcome)
}

fn float_field(hash: &BTreeMap<String, String>, field: &str) -> f64 {
    hash.get(field)
        .and_then(|raw| raw.parse::<f64>().ok())
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}

fn int_field(hash: &BTreeMap<String, String>, field: &str) -> Option<i64> {
    hash.get(field).and_then(|raw| raw.parse::<i64>().ok())
}
