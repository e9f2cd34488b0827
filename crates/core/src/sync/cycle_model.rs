//! Sync cycle triggers and result summaries.

use serde::{Deserialize, Serialize};

/// Trigger source for sync cycles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncCycleTrigger {
    Hydration,
    Reconnect,
    Periodic,
    Manual,
}

/// Terminal status of one sync cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncCycleStatus {
    Ok,
    Offline,
    TimedOut,
}

/// Aggregated outcome of one sync cycle. Per-entry failures land in
/// `errors` instead of aborting the rest of the queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncSummary {
    pub status: SyncCycleStatus,
    /// Remote changes applied to the local store.
    pub pulled: usize,
    /// Queue entries confirmed by the remote store (including no-ops).
    pub pushed: usize,
    /// Queue entries routed to the conflict surface.
    pub conflicts: usize,
    /// Queue entries dropped without reaching the remote store.
    pub failed: usize,
    pub errors: Vec<String>,
}

impl SyncSummary {
    pub fn new() -> Self {
        Self {
            status: SyncCycleStatus::Ok,
            pulled: 0,
            pushed: 0,
            conflicts: 0,
            failed: 0,
            errors: Vec::new(),
        }
    }

    pub fn offline() -> Self {
        Self {
            status: SyncCycleStatus::Offline,
            ..Self::new()
        }
    }

    pub fn timed_out() -> Self {
        Self {
            status: SyncCycleStatus::TimedOut,
            ..Self::new()
        }
    }
}

impl Default for SyncSummary {
    fn default() -> Self {
        Self::new()
    }
}
