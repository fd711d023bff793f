//! Annotation module
//!
//! Bookmarks and highlights, scoped by book, with SQLite persistence.

mod store;
mod types;

pub use store::{AnnotationCounts, AnnotationStore, SqliteAnnotationStore};
pub use types::{
    clip_text, Bookmark, Highlight, HighlightColor, HighlightUpdate, NewHighlight,
    HIGHLIGHT_TEXT_LIMIT,
};
