/// Upper bound on compare-and-swap attempts for one key mutation.
pub const MAX_CAS_RETRIES: u32 = 20;

/// Readings closer together than this continue the current session.
pub const SESSION_GAP_SECS: i64 = 300;

/// Exclusive upper bound of chip and user identifiers.
pub const ID_SPACE: u64 = 1 << 32;

/// Namespace prepended to every store key.
pub const DEFAULT_KEY_PREFIX: &str = "hydro-rpg:";

/// Maximum request body size: 64 KiB.
pub const MAX_BODY_SIZE: usize = 64 * 1024;

/// Expiry sweep schedule (sec min hour day month weekday).
pub const DEFAULT_EXPIRY_SWEEP_CRON: &str = "0 */10 * * * *";
