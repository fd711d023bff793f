//! Document collaborator interfaces
//!
//! The rendering layer owns the book: it enumerates content sections in
//! reading order, exposes the chapter tree, and loads one section at a time
//! for text matching and anchor lookup.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::chapters::ChapterEntry;
use crate::error::Result;
use crate::position::Position;

/// One reading-order unit (a spine item)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionInfo {
    /// Ordinal in the linear reading order
    pub index: usize,
    /// Content file path
    pub href: String,
    /// Raw identifier of the spine item
    pub idref: String,
}

impl SectionInfo {
    pub fn new(index: usize, href: impl Into<String>, idref: impl Into<String>) -> Self {
        Self {
            index,
            href: href.into(),
            idref: idref.into(),
        }
    }

    /// Label used when no chapter points into this section
    pub fn fallback_label(&self) -> &str {
        if self.idref.is_empty() {
            &self.href
        } else {
            &self.idref
        }
    }
}

/// A raw text match inside a loaded section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextMatch {
    pub position: Position,
    pub excerpt: String,
}

/// Converts an intra-section anchor (element id) to a position
pub trait AnchorLocator {
    /// Fails with `AnchorResolution` when the anchor is not in the rendered content
    fn anchor_position(&self, anchor: &str) -> Result<Position>;
}

/// A section whose content is loaded in memory
pub trait SectionContent: AnchorLocator + Send + Sync {
    /// Case-insensitive text matches in document order
    fn find_text(&self, query: &str) -> Vec<TextMatch>;

    /// Release the parsed content
    fn unload(self: Box<Self>);
}

/// The document being read
#[async_trait]
pub trait Document: Send + Sync {
    /// Content sections in reading order
    fn sections(&self) -> Vec<SectionInfo>;

    /// Table of contents
    fn chapters(&self) -> Vec<ChapterEntry>;

    async fn load_section(&self, section: &SectionInfo) -> Result<Box<dyn SectionContent>>;
}
