//! Bookmark and highlight records

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::position::{Position, PositionRange};

/// Highlight text snapshots are clipped to this many characters
pub const HIGHLIGHT_TEXT_LIMIT: usize = 500;

/// A saved reading position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bookmark {
    pub id: String,
    pub book_id: String,
    pub position: Position,
    pub excerpt: String,
    pub created_at: DateTime<Utc>,
}

/// A highlighted passage. `range` and `text` never change after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Highlight {
    pub id: String,
    pub book_id: String,
    pub range: PositionRange,
    pub text: String,
    pub color: HighlightColor,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Highlight {
    pub fn has_note(&self) -> bool {
        self.note.is_some()
    }
}

/// The five highlight colours offered by the picker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HighlightColor {
    #[default]
    Yellow,
    Green,
    Blue,
    Pink,
    Purple,
}

impl HighlightColor {
    pub const ALL: [HighlightColor; 5] = [
        HighlightColor::Yellow,
        HighlightColor::Green,
        HighlightColor::Blue,
        HighlightColor::Pink,
        HighlightColor::Purple,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            HighlightColor::Yellow => "yellow",
            HighlightColor::Green => "green",
            HighlightColor::Blue => "blue",
            HighlightColor::Pink => "pink",
            HighlightColor::Purple => "purple",
        }
    }

    /// Fill colour used by the overlay
    pub fn css(&self) -> &'static str {
        match self {
            HighlightColor::Yellow => "#ffeb3b",
            HighlightColor::Green => "#81c784",
            HighlightColor::Blue => "#64b5f6",
            HighlightColor::Pink => "#f06292",
            HighlightColor::Purple => "#ba68c8",
        }
    }
}

impl fmt::Display for HighlightColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HighlightColor {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        HighlightColor::ALL
            .into_iter()
            .find(|color| color.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown highlight color '{}'", s))
    }
}

/// Input for creating a highlight
#[derive(Debug, Clone)]
pub struct NewHighlight {
    pub range: PositionRange,
    pub text: String,
    pub color: HighlightColor,
    pub note: Option<String>,
}

impl NewHighlight {
    pub fn new(range: PositionRange, text: &str, color: HighlightColor) -> Self {
        Self {
            range,
            text: clip_text(text, HIGHLIGHT_TEXT_LIMIT),
            color,
            note: None,
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

/// Partial update; `None` fields are left alone.
///
/// `note: Some(None)` clears the note.
#[derive(Debug, Clone, Default)]
pub struct HighlightUpdate {
    pub color: Option<HighlightColor>,
    pub note: Option<Option<String>>,
}

impl HighlightUpdate {
    pub fn color(color: HighlightColor) -> Self {
        Self {
            color: Some(color),
            note: None,
        }
    }

    pub fn note(note: Option<String>) -> Self {
        Self {
            color: None,
            note: Some(note),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.color.is_none() && self.note.is_none()
    }
}

/// Clip to at most `limit` characters on a char boundary
pub fn clip_text(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((byte_index, _)) => text[..byte_index].to_string(),
        None => text.to_string(),
    }
}
