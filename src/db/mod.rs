pub mod models;

/// Nanosecond UTC epoch timestamp, the storage convention for all
/// created_at/updated_at/recorded_at columns.
pub fn now_ns() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as i64
}
