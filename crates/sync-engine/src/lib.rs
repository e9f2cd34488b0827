//! The Quillpad sync engine: single-flight pull/push cycles over the local
//! store and queue, conflict detection and resolution, realtime echo
//! filtering, and the session lifecycle.

mod conflicts;
mod engine;
mod pull;
mod push;
mod realtime;
mod session;

pub use conflicts::{ConflictResolution, NoteConflict, CONFLICT_COPY_SUFFIX};
pub use engine::{SyncEngine, SyncEngineOptions};
pub use realtime::{RealtimeChange, RealtimeEvent};
pub use session::Session;
