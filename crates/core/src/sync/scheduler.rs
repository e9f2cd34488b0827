//! Cadence constants for the background sync loop.

/// Periodic cycle cadence while online, in seconds.
pub const SYNC_FOREGROUND_INTERVAL_SECS: u64 = 45;

/// Maximum jitter (seconds) added to periodic cycle intervals.
pub const SYNC_INTERVAL_JITTER_SECS: u64 = 5;

/// Shortened cadence while queue entries are still pending, in seconds.
pub const SYNC_PENDING_INTERVAL_SECS: u64 = 2;

/// Grace delay before a pushed mutation's echo token is released, in
/// milliseconds. Long enough for the realtime notification of our own write
/// to arrive and be suppressed.
pub const ECHO_GRACE_MS: u64 = 2_000;

/// Ceiling on the initial post-login hydration wait, in seconds. On expiry
/// the app proceeds with local data.
pub const HYDRATION_TIMEOUT_SECS: u64 = 10;
