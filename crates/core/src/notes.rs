//! Note domain models.

use serde::{Deserialize, Serialize};

use crate::sync::SyncStatus;

/// A note as held in the local store. `content` is an opaque blob to the
/// sync layer and is never diffed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: String,
    pub title: String,
    pub content: String,
    pub pinned: bool,
    /// Soft-delete marker; `None` means active.
    pub deleted_at: Option<String>,
    pub created_at: String,
    pub sync_status: SyncStatus,
    /// Last confirmed round-trip time with the remote store.
    pub last_synced_at: Option<String>,
    /// The server's `updated_at` as of the last sync.
    pub server_updated_at: Option<String>,
    pub local_updated_at: String,
}

impl Note {
    pub fn is_active(&self) -> bool {
        self.deleted_at.is_none()
    }
}

/// Input for creating a note.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewNote {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub pinned: bool,
}

/// Partial edit of a note's title and/or content.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteUpdate {
    pub title: Option<String>,
    pub content: Option<String>,
}
