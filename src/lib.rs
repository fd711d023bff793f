//! Los Libros Reader
//!
//! Reading-position, chapter attribution and annotation engine for
//! reflowable ebooks.
//!
//! The engine sits between a rendering layer, which owns the document and
//! draws overlays, and a persistence layer, which stores bookmarks and
//! highlights. It provides:
//! - Position ordering over opaque tokens (EPUB CFIs by default)
//! - Chapter attribution for positions inside multi-chapter files
//! - Book-wide search that keeps one section resident at a time
//! - The highlight create/edit session as a state machine
//! - SQLite-backed bookmark and highlight storage

pub mod annotations;
pub mod bookmarks;
pub mod cfi;
pub mod chapters;
pub mod config;
pub mod db;
pub mod document;
pub mod error;
pub mod memory;
pub mod ordering;
pub mod overlay;
pub mod position;
pub mod search;
pub mod session;
pub mod telemetry;

pub use annotations::{
    AnnotationStore, Bookmark, Highlight, HighlightColor, HighlightUpdate, NewHighlight,
    SqliteAnnotationStore,
};
pub use bookmarks::{is_location_bookmarked, toggle_bookmark, BookmarkToggle};
pub use chapters::{ChapterEntry, ChapterResolver};
pub use config::Config;
pub use document::{AnchorLocator, Document, SectionContent, SectionInfo, TextMatch};
pub use error::{ReaderError, Result};
pub use ordering::{
    same_anchor, sort_bookmarks_by_position, sort_descending_by_position,
    sort_highlights_by_position,
};
pub use overlay::{Overlay, OverlayEvent, OverlayKind, OverlayStyle};
pub use position::{CfiComparator, Position, PositionComparator, PositionRange};
pub use search::{SearchIndexer, SearchOptions, SearchResult};
pub use session::{HighlightSession, SessionState};
