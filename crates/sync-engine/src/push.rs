//! The push half of a sync cycle: queue drain, dispatch, conflict
//! detection, and retry accounting.

use log::{debug, warn};
use std::sync::Arc;

use quillpad_core::sync::{
    partition_queue, remote_is_newer, NoteChanges, NotePayload, QueuePayload, RemoteNote,
    SyncEntity, SyncQueueEntry, SyncStatus, SyncSummary,
};
use quillpad_remote::{RemoteStoreError, RetryClass};

use crate::conflicts::NoteConflict;
use crate::engine::SyncEngine;

/// Result of the remote half of one queue entry.
enum SendOutcome {
    /// The remote store confirmed the operation.
    Applied { server_updated_at: Option<String> },
    /// A concurrent remote edit was detected; the entry routes to the
    /// conflict surface instead of overwriting.
    Conflict { remote: RemoteNote },
    /// The entry's precondition is gone (e.g. the note was deleted locally
    /// or remotely); treat as a no-op and drop it.
    Skip,
}

enum SendFailure {
    Remote(RemoteStoreError),
    Local(quillpad_core::Error),
}

impl From<RemoteStoreError> for SendFailure {
    fn from(err: RemoteStoreError) -> Self {
        SendFailure::Remote(err)
    }
}

/// Accounting bucket for one drained entry.
enum EntryOutcome {
    Pushed,
    Skipped,
    Conflicted,
    Retried,
    Dropped(String),
}

fn note_changes_from_payload(payload: &NotePayload) -> NoteChanges {
    NoteChanges {
        title: Some(payload.title.clone()),
        content: Some(payload.content.clone()),
        pinned: Some(payload.pinned),
        deleted_at: Some(payload.deleted_at.clone()),
    }
}

impl SyncEngine {
    /// Drain the queue snapshot taken at cycle start. Entries are processed
    /// one at a time in dependency order; one bad entry never aborts the
    /// rest.
    pub(crate) async fn push(&self, summary: &mut SyncSummary) {
        let snapshot = match self.inner.queue.list_pending() {
            Ok(snapshot) => snapshot,
            Err(err) => {
                summary.errors.push(format!("queue snapshot: {err}"));
                return;
            }
        };

        for corrupt in snapshot.corrupt {
            warn!(
                "[Sync] Dropping malformed queue entry seq={}: {}",
                corrupt.seq, corrupt.error
            );
            if let Err(err) = self.inner.queue.remove_entry(corrupt.seq).await {
                warn!("[Sync] Failed to drop malformed entry: {err}");
            }
            summary.failed += 1;
            summary
                .errors
                .push(format!("queue entry {} malformed: {}", corrupt.seq, corrupt.error));
        }

        for entry in partition_queue(snapshot.entries) {
            // A conflicted note is frozen until resolved: none of its
            // remaining entries may reach the remote store. They stay
            // queued and drain after resolution.
            if self.held_by_conflict(&entry) {
                debug!(
                    "[Sync] Holding queue entry seq={} for conflicted note {}",
                    entry.seq, entry.entity_id
                );
                continue;
            }

            // Mark before the network call so the echo of this very write
            // is suppressed even if the realtime feed beats the response.
            self.inner.echo.mark_pending(&entry.op_id);
            let outcome = self.dispatch_entry(&entry).await;
            self.release_echo_after_grace(entry.op_id.clone());

            match outcome {
                EntryOutcome::Pushed | EntryOutcome::Skipped => summary.pushed += 1,
                EntryOutcome::Conflicted => summary.conflicts += 1,
                EntryOutcome::Retried => {}
                EntryOutcome::Dropped(reason) => {
                    summary.failed += 1;
                    summary.errors.push(reason);
                }
            }
        }
    }

    /// True when the entry targets a note currently in `conflict`. A newly
    /// registered conflict only removes the entry that raised it; anything
    /// else still queued for that note (a pin or soft-delete enqueued
    /// alongside the update) must wait for the resolution.
    fn held_by_conflict(&self, entry: &SyncQueueEntry) -> bool {
        if entry.entity != SyncEntity::Note {
            return false;
        }
        match self.inner.notes.get_note(&entry.entity_id) {
            Ok(Some(note)) => note.sync_status == SyncStatus::Conflict,
            _ => false,
        }
    }

    async fn dispatch_entry(&self, entry: &SyncQueueEntry) -> EntryOutcome {
        match self.send_remote(entry).await {
            Ok(SendOutcome::Applied { server_updated_at }) => {
                match self.complete_entry(entry, server_updated_at).await {
                    Ok(()) => EntryOutcome::Pushed,
                    Err(err) => {
                        // The entry survives and re-runs next cycle; remote
                        // dispatch is idempotent, so that is safe.
                        warn!(
                            "[Sync] Failed to record completion for seq={}: {err}",
                            entry.seq
                        );
                        EntryOutcome::Retried
                    }
                }
            }
            Ok(SendOutcome::Conflict { remote }) => {
                match self.inner.notes
                    .mark_note_conflict(entry.seq, entry.entity_id.clone())
                    .await
                {
                    Ok(Some(local)) => {
                        self.register_conflict(NoteConflict {
                            note_id: entry.entity_id.clone(),
                            local,
                            remote,
                        });
                        EntryOutcome::Conflicted
                    }
                    Ok(None) => EntryOutcome::Skipped,
                    Err(err) => {
                        warn!(
                            "[Sync] Failed to record conflict for seq={}: {err}",
                            entry.seq
                        );
                        EntryOutcome::Retried
                    }
                }
            }
            Ok(SendOutcome::Skip) => {
                if let Err(err) = self.inner.queue.remove_entry(entry.seq).await {
                    warn!("[Sync] Failed to drop no-op entry seq={}: {err}", entry.seq);
                }
                EntryOutcome::Skipped
            }
            Err(SendFailure::Local(err)) => {
                warn!(
                    "[Sync] Local read failed for queue entry seq={}: {err}",
                    entry.seq
                );
                EntryOutcome::Retried
            }
            Err(SendFailure::Remote(err)) => self.handle_remote_failure(entry, err).await,
        }
    }

    /// Perform the remote half of one entry. Creates are idempotent via an
    /// existence check; note updates re-read the remote row and raise a
    /// conflict when it moved past our last confirmed sync.
    async fn send_remote(
        &self,
        entry: &SyncQueueEntry,
    ) -> std::result::Result<SendOutcome, SendFailure> {
        match &entry.payload {
            QueuePayload::NoteCreate(payload) => {
                if let Some(existing) = self.inner.remote.get_note(&payload.id).await? {
                    return Ok(SendOutcome::Applied {
                        server_updated_at: Some(existing.updated_at),
                    });
                }
                let stored = self.inner.remote.insert_note(payload).await?;
                Ok(SendOutcome::Applied {
                    server_updated_at: Some(stored.updated_at),
                })
            }
            QueuePayload::NoteUpdate(payload) => {
                let local = self.inner.notes
                    .get_note(&payload.id)
                    .map_err(SendFailure::Local)?;
                let Some(local) = local else {
                    // Deleted locally since enqueue; nothing left to say.
                    return Ok(SendOutcome::Skip);
                };
                let remote_row = self.inner.remote.get_note(&payload.id).await?;
                if let (Some(remote_row), Some(last_synced_at)) =
                    (&remote_row, &local.last_synced_at)
                {
                    if remote_is_newer(&remote_row.updated_at, last_synced_at) {
                        return Ok(SendOutcome::Conflict {
                            remote: remote_row.clone(),
                        });
                    }
                }
                let stored = match remote_row {
                    Some(_) => {
                        self.inner.remote
                            .update_note(&payload.id, &note_changes_from_payload(payload))
                            .await?
                    }
                    // The row vanished remotely; the update carries the full
                    // content, so recreate it.
                    None => self.inner.remote.insert_note(payload).await?,
                };
                Ok(SendOutcome::Applied {
                    server_updated_at: Some(stored.updated_at),
                })
            }
            QueuePayload::NoteDelete { id } => {
                self.inner.remote.delete_note(id).await?;
                Ok(SendOutcome::Applied {
                    server_updated_at: None,
                })
            }
            QueuePayload::NoteSoftDelete { id, deleted_at } => {
                let changes = NoteChanges {
                    deleted_at: Some(Some(deleted_at.clone())),
                    ..NoteChanges::default()
                };
                self.patch_note_or_skip(id, &changes).await
            }
            QueuePayload::NoteRestore { id } => {
                let changes = NoteChanges {
                    deleted_at: Some(None),
                    ..NoteChanges::default()
                };
                self.patch_note_or_skip(id, &changes).await
            }
            QueuePayload::NotePin { id, pinned } => {
                let changes = NoteChanges {
                    pinned: Some(*pinned),
                    ..NoteChanges::default()
                };
                self.patch_note_or_skip(id, &changes).await
            }
            QueuePayload::TagCreate(payload) => {
                if let Some(existing) = self.inner.remote.get_tag(&payload.id).await? {
                    return Ok(SendOutcome::Applied {
                        server_updated_at: Some(existing.updated_at),
                    });
                }
                let stored = self.inner.remote.insert_tag(payload).await?;
                Ok(SendOutcome::Applied {
                    server_updated_at: Some(stored.updated_at),
                })
            }
            QueuePayload::TagUpdate(payload) => {
                // Tags are last-write-wins: no conflict re-read, upsert.
                let stored = match self.inner.remote.get_tag(&payload.id).await? {
                    Some(_) => {
                        let changes = quillpad_core::sync::TagChanges {
                            name: Some(payload.name.clone()),
                            color: Some(payload.color),
                        };
                        self.inner.remote.update_tag(&payload.id, &changes).await?
                    }
                    None => self.inner.remote.insert_tag(payload).await?,
                };
                Ok(SendOutcome::Applied {
                    server_updated_at: Some(stored.updated_at),
                })
            }
            QueuePayload::TagDelete { id } => {
                self.inner.remote.delete_tag(id).await?;
                Ok(SendOutcome::Applied {
                    server_updated_at: None,
                })
            }
            QueuePayload::LinkAdd { note_id, tag_id } => {
                self.inner.remote.insert_link(note_id, tag_id).await?;
                Ok(SendOutcome::Applied {
                    server_updated_at: None,
                })
            }
            QueuePayload::LinkRemove { note_id, tag_id } => {
                self.inner.remote.delete_link(note_id, tag_id).await?;
                Ok(SendOutcome::Applied {
                    server_updated_at: None,
                })
            }
        }
    }

    async fn patch_note_or_skip(
        &self,
        note_id: &str,
        changes: &NoteChanges,
    ) -> std::result::Result<SendOutcome, SendFailure> {
        match self.inner.remote.update_note(note_id, changes).await {
            Ok(stored) => Ok(SendOutcome::Applied {
                server_updated_at: Some(stored.updated_at),
            }),
            Err(err) if err.status_code() == Some(404) => Ok(SendOutcome::Skip),
            Err(err) => Err(err.into()),
        }
    }

    /// Persist the success of one entry with the matching repository so the
    /// queue removal and the entity stamp share a transaction.
    async fn complete_entry(
        &self,
        entry: &SyncQueueEntry,
        server_updated_at: Option<String>,
    ) -> quillpad_core::Result<()> {
        match &entry.payload {
            QueuePayload::NoteCreate(payload) | QueuePayload::NoteUpdate(payload) => {
                self.inner.notes
                    .complete_note_push(entry.seq, payload.id.clone(), server_updated_at)
                    .await
            }
            QueuePayload::NoteSoftDelete { id, .. }
            | QueuePayload::NoteRestore { id }
            | QueuePayload::NotePin { id, .. } => {
                self.inner.notes
                    .complete_note_push(entry.seq, id.clone(), server_updated_at)
                    .await
            }
            QueuePayload::TagCreate(payload) | QueuePayload::TagUpdate(payload) => {
                self.inner.tags
                    .complete_tag_push(entry.seq, payload.id.clone(), server_updated_at)
                    .await
            }
            QueuePayload::LinkAdd { note_id, tag_id } => {
                self.inner.links
                    .complete_link_push(entry.seq, note_id.clone(), tag_id.clone())
                    .await
            }
            QueuePayload::NoteDelete { .. }
            | QueuePayload::TagDelete { .. }
            | QueuePayload::LinkRemove { .. } => self.inner.queue.remove_entry(entry.seq).await,
        }
    }

    async fn handle_remote_failure(
        &self,
        entry: &SyncQueueEntry,
        err: RemoteStoreError,
    ) -> EntryOutcome {
        match err.retry_class() {
            RetryClass::Permanent => {
                warn!(
                    "[Sync] Dropping queue entry seq={} after non-retryable failure: {err}",
                    entry.seq
                );
                if let Err(remove_err) = self.inner.queue.remove_entry(entry.seq).await {
                    warn!("[Sync] Failed to drop rejected entry: {remove_err}");
                }
                EntryOutcome::Dropped(format!(
                    "{:?} {:?} for {} rejected: {err}",
                    entry.op, entry.entity, entry.entity_id
                ))
            }
            class => {
                if class == RetryClass::ReauthRequired {
                    warn!("[Sync] Remote rejected credentials; entry waits for re-auth: {err}");
                }
                match self.inner.queue.record_retry(entry.seq).await {
                    Ok(attempts) if attempts >= self.inner.options.retry_ceiling => {
                        warn!(
                            "[Sync] Dropping queue entry seq={} after {attempts} attempts: {err}",
                            entry.seq
                        );
                        if let Err(remove_err) = self.inner.queue.remove_entry(entry.seq).await {
                            warn!("[Sync] Failed to drop exhausted entry: {remove_err}");
                        }
                        EntryOutcome::Dropped(format!(
                            "{:?} {:?} for {} gave up after {attempts} attempts: {err}",
                            entry.op, entry.entity, entry.entity_id
                        ))
                    }
                    Ok(_) => EntryOutcome::Retried,
                    Err(record_err) => {
                        warn!(
                            "[Sync] Failed to record retry for seq={}: {record_err}",
                            entry.seq
                        );
                        EntryOutcome::Retried
                    }
                }
            }
        }
    }

    /// Release the entry's echo token only after a short grace window, so a
    /// realtime notification generated by this very write still finds the
    /// token and is suppressed.
    fn release_echo_after_grace(&self, token: String) {
        let echo = Arc::clone(&self.inner.echo);
        let grace = self.inner.options.echo_grace;
        tokio::spawn(async move {
            tokio::time::sleep(grace).await;
            echo.clear_pending(&token);
        });
    }
}
