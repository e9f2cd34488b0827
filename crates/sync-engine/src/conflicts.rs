//! Conflict registry and the resolution surface.

use log::debug;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use quillpad_core::notes::{NewNote, Note};
use quillpad_core::sync::{NoteChanges, RemoteNote};
use quillpad_core::{Error, Result};
use quillpad_remote::RetryClass;

use crate::engine::SyncEngine;

/// Title suffix for the copy created by a keep-both resolution.
pub const CONFLICT_COPY_SUFFIX: &str = " (conflicted copy)";

pub(crate) type ConflictHandler = Arc<dyn Fn(&NoteConflict) + Send + Sync>;

/// A concurrent-edit conflict between the local and remote versions of a
/// note. Tags never appear here; they reconcile last-write-wins.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteConflict {
    pub note_id: String,
    pub local: Note,
    pub remote: RemoteNote,
}

/// The three resolution choices. Nothing resolves automatically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictResolution {
    KeepLocal,
    KeepRemote,
    KeepBoth,
}

impl SyncEngine {
    /// Register a callback invoked whenever the push loop detects a
    /// conflict. At most one callback per engine; a later call replaces it.
    pub fn on_conflict(&self, handler: impl Fn(&NoteConflict) + Send + Sync + 'static) {
        if let Ok(mut slot) = self.inner.conflict_handler.lock() {
            *slot = Some(Arc::new(handler));
        }
    }

    /// Conflicts awaiting a resolution choice.
    pub fn pending_conflicts(&self) -> Vec<NoteConflict> {
        self.inner.conflicts
            .lock()
            .map(|conflicts| conflicts.values().cloned().collect())
            .unwrap_or_default()
    }

    pub(crate) fn register_conflict(&self, conflict: NoteConflict) {
        debug!("[Sync] Conflict detected for note {}", conflict.note_id);
        if let Ok(mut conflicts) = self.inner.conflicts.lock() {
            conflicts.insert(conflict.note_id.clone(), conflict.clone());
        }
        let handler = self.inner.conflict_handler
            .lock()
            .ok()
            .and_then(|slot| slot.clone());
        if let Some(handler) = handler {
            handler(&conflict);
        }
    }

    fn reinstate_conflict(&self, conflict: NoteConflict) {
        if let Ok(mut conflicts) = self.inner.conflicts.lock() {
            conflicts.insert(conflict.note_id.clone(), conflict);
        }
    }

    fn take_conflict(&self, note_id: &str) -> Option<NoteConflict> {
        self.inner.conflicts
            .lock()
            .ok()
            .and_then(|mut conflicts| conflicts.remove(note_id))
    }

    /// Apply the caller's resolution choice for a registered conflict.
    ///
    /// Keep local pushes the local content now, or re-queues it when the
    /// remote store is unreachable. Keep remote overwrites the local row.
    /// Keep both does keep-remote on the original and creates a fresh note
    /// carrying the local content, queued as a new create.
    pub async fn resolve_conflict(
        &self,
        note_id: &str,
        resolution: ConflictResolution,
    ) -> Result<()> {
        let conflict = self
            .take_conflict(note_id)
            .ok_or_else(|| Error::not_found("conflict", note_id))?;

        let outcome = self.apply_resolution(&conflict, resolution).await;
        if outcome.is_err() {
            self.reinstate_conflict(conflict);
        }
        outcome
    }

    async fn apply_resolution(
        &self,
        conflict: &NoteConflict,
        resolution: ConflictResolution,
    ) -> Result<()> {
        match resolution {
            ConflictResolution::KeepRemote => {
                self.inner.notes
                    .resolve_note_with_remote(conflict.remote.clone())
                    .await?;
            }
            ConflictResolution::KeepLocal => {
                self.push_local_resolution(conflict).await?;
            }
            ConflictResolution::KeepBoth => {
                let copy = NewNote {
                    title: format!("{}{}", conflict.local.title, CONFLICT_COPY_SUFFIX),
                    content: conflict.local.content.clone(),
                    pinned: conflict.local.pinned,
                };
                self.inner.notes.create_note(copy).await?;
                self.inner.notes
                    .resolve_note_with_remote(conflict.remote.clone())
                    .await?;
            }
        }
        Ok(())
    }

    async fn push_local_resolution(&self, conflict: &NoteConflict) -> Result<()> {
        let changes = NoteChanges {
            title: Some(conflict.local.title.clone()),
            content: Some(conflict.local.content.clone()),
            pinned: Some(conflict.local.pinned),
            deleted_at: Some(conflict.local.deleted_at.clone()),
        };

        if self.is_online() {
            match self.inner.remote.update_note(&conflict.note_id, &changes).await {
                Ok(stored) => {
                    self.inner.notes
                        .mark_note_resolved_synced(conflict.note_id.clone(), stored.updated_at)
                        .await?;
                    return Ok(());
                }
                Err(err) if err.retry_class() == RetryClass::Permanent => {
                    return Err(Error::Remote(format!("keep-local push rejected: {err}")));
                }
                Err(err) => {
                    debug!("[Sync] Keep-local push failed transiently, re-queueing: {err}");
                }
            }
        }

        self.inner.notes
            .requeue_local_note(
                conflict.note_id.clone(),
                conflict.remote.updated_at.clone(),
            )
            .await?;
        Ok(())
    }
}
