//! Timestamp comparison for conflict detection.

/// Returns true when the remote `updated_at` is strictly newer than the
/// local `last_synced_at` baseline.
///
/// Both values are expected to be RFC3339; a lexical comparison is the
/// fallback when either side fails to parse.
pub fn remote_is_newer(remote_updated_at: &str, last_synced_at: &str) -> bool {
    let remote_parsed =
        chrono::DateTime::parse_from_rfc3339(remote_updated_at).map(|dt| dt.timestamp_millis());
    let local_parsed =
        chrono::DateTime::parse_from_rfc3339(last_synced_at).map(|dt| dt.timestamp_millis());

    if let (Ok(remote_ts), Ok(local_ts)) = (remote_parsed, local_parsed) {
        return remote_ts > local_ts;
    }

    remote_updated_at > last_synced_at
}
