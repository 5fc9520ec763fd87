use std::fmt::Display;

/// Hash fields of the pairing record.
pub const TOTAL_FLOW_VOLUME: &str = "total_flow_volume";
pub const LAST_FLOW_VOLUME: &str = "last_flow_volume";
pub const LAST_TIMESTAMP: &str = "last_timestamp";

/// Hash fields of the user record.
pub const CHIP_ID: &str = "chip_id";
pub const JOINED_TIMESTAMP: &str = "joined_timestamp";

pub fn pairing_key(chip_id: impl Display, user_id: impl Display) -> String {
    format!("{}:{}", chip_id, user_id)
}

pub fn period_counter_key(chip_id: impl Display, user_id: impl Display, period: &str) -> String {
    format!("{}:{}:{}_flow_volume", chip_id, user_id, period)
}

pub fn user_key(user_id: u32) -> String {
    format!("users:{}", user_id)
}
