//! Diesel table definitions for the per-user local store.

diesel::table! {
    notes (id) {
        id -> Text,
        title -> Text,
        content -> Text,
        pinned -> Integer,
        deleted_at -> Nullable<Text>,
        created_at -> Text,
        sync_status -> Text,
        last_synced_at -> Nullable<Text>,
        server_updated_at -> Nullable<Text>,
        local_updated_at -> Text,
    }
}

diesel::table! {
    tags (id) {
        id -> Text,
        name -> Text,
        color -> Text,
        created_at -> Text,
        sync_status -> Text,
        last_synced_at -> Nullable<Text>,
        server_updated_at -> Nullable<Text>,
        local_updated_at -> Text,
    }
}

diesel::table! {
    note_tags (note_id, tag_id) {
        note_id -> Text,
        tag_id -> Text,
        sync_status -> Text,
        created_at -> Text,
    }
}

diesel::table! {
    sync_queue (seq) {
        seq -> BigInt,
        op_id -> Text,
        entity -> Text,
        entity_id -> Text,
        op -> Text,
        payload -> Text,
        enqueued_at -> Text,
        retry_count -> Integer,
    }
}

diesel::joinable!(note_tags -> notes (note_id));
diesel::joinable!(note_tags -> tags (tag_id));

diesel::allow_tables_to_appear_in_same_query!(notes, tags, note_tags, sync_queue);
