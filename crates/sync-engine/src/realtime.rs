//! Realtime feed filtering: echo suppression, then local apply.

use log::debug;
use serde::{Deserialize, Serialize};

use quillpad_core::sync::{RemoteNote, RemoteTag};
use quillpad_core::Result;

use crate::engine::SyncEngine;

/// One change notification from the realtime feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RealtimeEvent {
    /// Idempotency token of the originating mutation, when the feed
    /// carries one.
    pub token: Option<String>,
    #[serde(flatten)]
    pub change: RealtimeChange,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "change", rename_all = "snake_case")]
pub enum RealtimeChange {
    NoteUpserted { note: RemoteNote },
    NoteDeleted { note_id: String },
    TagUpserted { tag: RemoteTag },
    TagDeleted { tag_id: String },
    LinkAdded { note_id: String, tag_id: String },
    LinkRemoved { note_id: String, tag_id: String },
}

impl SyncEngine {
    /// Entry point for the realtime feed consumer. An event whose token is
    /// still pending is this device's own write reflected back and is
    /// dropped; everything else folds into the local store under the same
    /// skip-if-pending rule as pull. Returns whether the local store changed.
    pub async fn handle_realtime(&self, event: RealtimeEvent) -> Result<bool> {
        if let Some(token) = &event.token {
            if self.inner.echo.is_pending(token) {
                debug!("[Sync] Suppressed realtime echo for token {token}");
                return Ok(false);
            }
        }

        match event.change {
            RealtimeChange::NoteUpserted { note } => self.inner.notes.apply_remote_note(note).await,
            RealtimeChange::NoteDeleted { note_id } => {
                self.inner.notes.apply_remote_note_delete(note_id).await
            }
            RealtimeChange::TagUpserted { tag } => self.inner.tags.apply_remote_tag(tag).await,
            RealtimeChange::TagDeleted { tag_id } => {
                self.inner.tags.apply_remote_tag_delete(tag_id).await
            }
            RealtimeChange::LinkAdded { note_id, tag_id } => {
                self.inner.links.apply_remote_link(note_id, tag_id).await
            }
            RealtimeChange::LinkRemoved { note_id, tag_id } => {
                self.inner.links.apply_remote_link_delete(note_id, tag_id).await
            }
        }
    }
}
