//! Sync queue domain models: entry lifecycle, operation kinds, and the
//! tagged operation payload union.

use serde::{Deserialize, Serialize};

use crate::tags::TagColor;

/// Per-entity sync lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    Synced,
    Pending,
    Conflict,
}

/// Entity kinds that participate in sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncEntity {
    Note,
    Tag,
    NoteTag,
}

/// Supported queue operation kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueOp {
    Create,
    Update,
    Delete,
    SoftDelete,
    Restore,
    Pin,
    AddTag,
    RemoveTag,
}

/// Full note row content as shipped to the remote store on create/update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotePayload {
    pub id: String,
    pub title: String,
    pub content: String,
    pub pinned: bool,
    pub deleted_at: Option<String>,
    pub created_at: String,
}

/// Full tag row content as shipped to the remote store on create/update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagPayload {
    pub id: String,
    pub name: String,
    pub color: TagColor,
    pub created_at: String,
}

/// One queued remote operation, keyed by kind with its own typed payload.
///
/// The dispatch loop matches this exhaustively, so adding an operation kind
/// is a compile error until every consumer handles it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "body", rename_all = "snake_case")]
pub enum QueuePayload {
    NoteCreate(NotePayload),
    NoteUpdate(NotePayload),
    NoteDelete { id: String },
    NoteSoftDelete { id: String, deleted_at: String },
    NoteRestore { id: String },
    NotePin { id: String, pinned: bool },
    TagCreate(TagPayload),
    TagUpdate(TagPayload),
    TagDelete { id: String },
    LinkAdd { note_id: String, tag_id: String },
    LinkRemove { note_id: String, tag_id: String },
}

impl QueuePayload {
    pub fn entity(&self) -> SyncEntity {
        match self {
            Self::NoteCreate(_)
            | Self::NoteUpdate(_)
            | Self::NoteDelete { .. }
            | Self::NoteSoftDelete { .. }
            | Self::NoteRestore { .. }
            | Self::NotePin { .. } => SyncEntity::Note,
            Self::TagCreate(_) | Self::TagUpdate(_) | Self::TagDelete { .. } => SyncEntity::Tag,
            Self::LinkAdd { .. } | Self::LinkRemove { .. } => SyncEntity::NoteTag,
        }
    }

    pub fn op(&self) -> QueueOp {
        match self {
            Self::NoteCreate(_) | Self::TagCreate(_) => QueueOp::Create,
            Self::NoteUpdate(_) | Self::TagUpdate(_) => QueueOp::Update,
            Self::NoteDelete { .. } | Self::TagDelete { .. } => QueueOp::Delete,
            Self::NoteSoftDelete { .. } => QueueOp::SoftDelete,
            Self::NoteRestore { .. } => QueueOp::Restore,
            Self::NotePin { .. } => QueueOp::Pin,
            Self::LinkAdd { .. } => QueueOp::AddTag,
            Self::LinkRemove { .. } => QueueOp::RemoveTag,
        }
    }

    /// Target entity id; links use the composite `noteId:tagId` form.
    pub fn entity_id(&self) -> String {
        match self {
            Self::NoteCreate(payload) | Self::NoteUpdate(payload) => payload.id.clone(),
            Self::NoteDelete { id }
            | Self::NoteSoftDelete { id, .. }
            | Self::NoteRestore { id }
            | Self::NotePin { id, .. } => id.clone(),
            Self::TagCreate(payload) | Self::TagUpdate(payload) => payload.id.clone(),
            Self::TagDelete { id } => id.clone(),
            Self::LinkAdd { note_id, tag_id } | Self::LinkRemove { note_id, tag_id } => {
                format!("{note_id}:{tag_id}")
            }
        }
    }
}

/// A durable record of one not-yet-confirmed remote operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncQueueEntry {
    /// Queue position; assigned by the store, strictly increasing.
    pub seq: i64,
    /// Client-generated idempotency token, also used for echo suppression.
    pub op_id: String,
    pub entity: SyncEntity,
    pub entity_id: String,
    pub op: QueueOp,
    pub payload: QueuePayload,
    pub enqueued_at: String,
    pub retry_count: i32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_op_serialization_matches_storage_identifiers() {
        let actual = [
            QueueOp::Create,
            QueueOp::Update,
            QueueOp::Delete,
            QueueOp::SoftDelete,
            QueueOp::Restore,
            QueueOp::Pin,
            QueueOp::AddTag,
            QueueOp::RemoveTag,
        ]
        .iter()
        .map(|op| serde_json::to_string(op).expect("serialize queue op"))
        .collect::<Vec<_>>();

        let expected = vec![
            "\"create\"",
            "\"update\"",
            "\"delete\"",
            "\"soft_delete\"",
            "\"restore\"",
            "\"pin\"",
            "\"add_tag\"",
            "\"remove_tag\"",
        ];

        assert_eq!(actual, expected);
    }

    #[test]
    fn payload_round_trips_through_json() {
        let payload = QueuePayload::NoteSoftDelete {
            id: "n1".to_string(),
            deleted_at: "2026-03-01T00:00:00+00:00".to_string(),
        };
        let json = serde_json::to_string(&payload).expect("serialize payload");
        let back: QueuePayload = serde_json::from_str(&json).expect("parse payload");
        assert_eq!(back, payload);
    }

    #[test]
    fn link_payload_uses_composite_entity_id() {
        let payload = QueuePayload::LinkAdd {
            note_id: "n1".to_string(),
            tag_id: "t1".to_string(),
        };
        assert_eq!(payload.entity(), SyncEntity::NoteTag);
        assert_eq!(payload.op(), QueueOp::AddTag);
        assert_eq!(payload.entity_id(), "n1:t1");
    }
}
