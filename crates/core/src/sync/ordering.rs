//! Queue drain ordering.

use super::{QueueOp, SyncEntity, SyncQueueEntry};

/// Order pending entries for the drain loop: `create` operations first, then
/// note/tag entity operations, then link operations — a link cannot be
/// created before both endpoints exist remotely. Enqueue (FIFO) order is
/// preserved within each bucket.
pub fn partition_queue(mut entries: Vec<SyncQueueEntry>) -> Vec<SyncQueueEntry> {
    entries.sort_by_key(|entry| (drain_bucket(entry), entry.seq));
    entries
}

fn drain_bucket(entry: &SyncQueueEntry) -> u8 {
    match (entry.entity, entry.op) {
        (_, QueueOp::Create) => 0,
        (SyncEntity::NoteTag, _) => 2,
        _ => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::{NotePayload, QueuePayload};

    fn entry(seq: i64, payload: QueuePayload) -> SyncQueueEntry {
        SyncQueueEntry {
            seq,
            op_id: format!("op-{seq}"),
            entity: payload.entity(),
            entity_id: payload.entity_id(),
            op: payload.op(),
            payload,
            enqueued_at: "2026-03-01T00:00:00+00:00".to_string(),
            retry_count: 0,
        }
    }

    fn note_payload(id: &str) -> NotePayload {
        NotePayload {
            id: id.to_string(),
            title: "t".to_string(),
            content: "c".to_string(),
            pinned: false,
            deleted_at: None,
            created_at: "2026-03-01T00:00:00+00:00".to_string(),
        }
    }

    #[test]
    fn creates_drain_before_links_regardless_of_enqueue_order() {
        let entries = vec![
            entry(
                1,
                QueuePayload::LinkAdd {
                    note_id: "a".to_string(),
                    tag_id: "b".to_string(),
                },
            ),
            entry(2, QueuePayload::NoteCreate(note_payload("a"))),
            entry(
                3,
                QueuePayload::NotePin {
                    id: "a".to_string(),
                    pinned: true,
                },
            ),
        ];

        let ordered = partition_queue(entries);
        let seqs: Vec<i64> = ordered.iter().map(|e| e.seq).collect();
        assert_eq!(seqs, vec![2, 3, 1]);
    }

    #[test]
    fn fifo_order_is_kept_within_a_bucket() {
        let entries = vec![
            entry(5, QueuePayload::NoteUpdate(note_payload("a"))),
            entry(3, QueuePayload::NoteDelete { id: "b".to_string() }),
            entry(
                9,
                QueuePayload::NoteRestore {
                    id: "c".to_string(),
                },
            ),
        ];

        let ordered = partition_queue(entries);
        let seqs: Vec<i64> = ordered.iter().map(|e| e.seq).collect();
        assert_eq!(seqs, vec![3, 5, 9]);
    }
}
