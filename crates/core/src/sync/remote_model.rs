//! Row shapes exchanged with the remote relational store.

use serde::{Deserialize, Serialize};

use crate::tags::TagColor;

/// A note row as stored remotely. `updated_at` is server-assigned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteNote {
    pub id: String,
    pub title: String,
    pub content: String,
    pub pinned: bool,
    pub deleted_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// A tag row as stored remotely.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteTag {
    pub id: String,
    pub name: String,
    pub color: TagColor,
    pub created_at: String,
    pub updated_at: String,
}

/// Partial update for a remote note row. `None` fields stay untouched;
/// `deleted_at` distinguishes "leave alone" from "clear" via nesting.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NoteChanges {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pinned: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<Option<String>>,
}

/// Partial update for a remote tag row.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TagChanges {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<TagColor>,
}
