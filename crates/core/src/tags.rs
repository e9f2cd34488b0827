//! Tag domain models.
//!
//! Tags are low-cardinality metadata and reconcile last-write-wins; they
//! never enter the conflict surface.

use serde::{Deserialize, Serialize};

use crate::sync::SyncStatus;

/// Display colors available for tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TagColor {
    Slate,
    Red,
    Amber,
    Green,
    Blue,
    Violet,
}

impl Default for TagColor {
    fn default() -> Self {
        Self::Slate
    }
}

/// A tag as held in the local store. `name` is unique per owner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tag {
    pub id: String,
    pub name: String,
    pub color: TagColor,
    pub created_at: String,
    pub sync_status: SyncStatus,
    pub last_synced_at: Option<String>,
    pub server_updated_at: Option<String>,
    pub local_updated_at: String,
}

/// Input for creating a tag.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTag {
    pub name: String,
    #[serde(default)]
    pub color: TagColor,
}

/// Partial edit of a tag.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagUpdate {
    pub name: Option<String>,
    pub color: Option<TagColor>,
}

#[cfg(test)]
mod tests {
    use super::TagColor;

    #[test]
    fn tag_color_serializes_to_snake_case_identifiers() {
        let actual = [
            TagColor::Slate,
            TagColor::Red,
            TagColor::Amber,
            TagColor::Green,
            TagColor::Blue,
            TagColor::Violet,
        ]
        .iter()
        .map(|color| serde_json::to_string(color).expect("serialize tag color"))
        .collect::<Vec<_>>();

        let expected = vec![
            "\"slate\"", "\"red\"", "\"amber\"", "\"green\"", "\"blue\"", "\"violet\"",
        ];

        assert_eq!(actual, expected);
    }
}
