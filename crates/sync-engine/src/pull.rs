//! The pull half of a sync cycle.

use log::{debug, warn};

use quillpad_core::sync::SyncSummary;

use crate::engine::SyncEngine;

impl SyncEngine {
    /// Fetch remote changes since the local watermark and fold them into the
    /// local store. Rows holding unsynced local intent are never overwritten.
    pub(crate) async fn pull(&self, summary: &mut SyncSummary) {
        let watermark = match self.inner.notes.max_last_synced_at() {
            Ok(Some(watermark)) => watermark,
            Ok(None) => {
                // Never synced: initial hydration happens through push.
                debug!("[Sync] No sync watermark yet, skipping pull");
                return;
            }
            Err(err) => {
                summary.errors.push(format!("pull watermark: {err}"));
                return;
            }
        };

        match self.inner.remote.notes_updated_after(&watermark).await {
            Ok(remote_notes) => {
                for remote_note in remote_notes {
                    let note_id = remote_note.id.clone();
                    match self.inner.notes.apply_remote_note(remote_note).await {
                        Ok(true) => summary.pulled += 1,
                        // Local pending/conflict intent wins until pushed.
                        Ok(false) => debug!("[Sync] Pull skipped note {note_id} with local intent"),
                        Err(err) => summary.errors.push(format!("pull note {note_id}: {err}")),
                    }
                }
            }
            Err(err) => {
                warn!("[Sync] Pull of remote notes failed: {err}");
                summary.errors.push(format!("pull notes: {err}"));
            }
        }

        // Tags reconcile against the full remote list so remote deletions
        // are detected; the list stays cheap because tags are few.
        match self.inner.remote.list_tags().await {
            Ok(remote_tags) => {
                let remote_ids: Vec<String> =
                    remote_tags.iter().map(|tag| tag.id.clone()).collect();
                for remote_tag in remote_tags {
                    let tag_id = remote_tag.id.clone();
                    match self.inner.tags.apply_remote_tag(remote_tag).await {
                        Ok(true) => summary.pulled += 1,
                        Ok(false) => debug!("[Sync] Pull skipped tag {tag_id} with local intent"),
                        Err(err) => summary.errors.push(format!("pull tag {tag_id}: {err}")),
                    }
                }
                match self.inner.tags.delete_tags_absent_from_remote(remote_ids).await {
                    Ok(0) => {}
                    Ok(deleted) => {
                        debug!("[Sync] Removed {deleted} tags deleted remotely");
                        summary.pulled += deleted;
                    }
                    Err(err) => summary.errors.push(format!("pull tag deletions: {err}")),
                }
            }
            Err(err) => {
                warn!("[Sync] Pull of remote tags failed: {err}");
                summary.errors.push(format!("pull tags: {err}"));
            }
        }
    }
}
