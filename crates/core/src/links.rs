//! Note-tag link domain model.

use serde::{Deserialize, Serialize};

use crate::sync::SyncStatus;

/// Association between a note and a tag, keyed by the pair of ids.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteTagLink {
    pub note_id: String,
    pub tag_id: String,
    pub sync_status: SyncStatus,
    pub created_at: String,
}
