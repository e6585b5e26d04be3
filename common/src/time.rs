// ─────────────────────────────────────────────────────────────────────────────
// Time buckets shared by every snapshot id
// ─────────────────────────────────────────────────────────────────────────────

/// Width of a daily bucket in seconds
pub const SECONDS_PER_DAY: u64 = 86_400;

/// Width of an hourly bucket in seconds
pub const SECONDS_PER_HOUR: u64 = 3_600;

/// Day index since the UNIX epoch (floor division)
#[inline]
pub fn day_bucket(timestamp_seconds: u64) -> u64 {
    timestamp_seconds / SECONDS_PER_DAY
}

/// Hour index since the UNIX epoch (floor division)
#[inline]
pub fn hour_bucket(timestamp_seconds: u64) -> u64 {
    timestamp_seconds / SECONDS_PER_HOUR
}
