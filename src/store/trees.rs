/// Single tree holding every namespaced key; values are JSON-encoded entries.
pub const KV: &str = "kv";
