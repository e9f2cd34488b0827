//! Note storage and offline write layer.

mod model;
mod repository;

pub use model::NoteDB;
pub use repository::NoteRepository;
