//! Note-tag link storage and offline write layer.

mod model;
mod repository;

pub use model::NoteTagLinkDB;
pub use repository::LinkRepository;
