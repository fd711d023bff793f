//! Position tokens
//!
//! A position is an opaque string minted by the rendering layer. The engine
//! never looks inside it; ordering and section lookup go through a
//! [`PositionComparator`].

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::cfi;
use crate::error::{ReaderError, Result};

/// An opaque, serializable location inside the document
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Position(String);

impl Position {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Position {
    fn from(token: &str) -> Self {
        Self::new(token)
    }
}

impl From<String> for Position {
    fn from(token: String) -> Self {
        Self(token)
    }
}

impl From<cfi::Cfi> for Position {
    fn from(cfi: cfi::Cfi) -> Self {
        Self(cfi.to_string())
    }
}

/// Start and end of a selection. Immutable once a highlight is created.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionRange {
    pub start: Position,
    pub end: Position,
}

impl PositionRange {
    pub fn new(start: impl Into<Position>, end: impl Into<Position>) -> Self {
        Self {
            start: start.into(),
            end: end.into(),
        }
    }
}

/// The external ordering primitive
pub trait PositionComparator: Send + Sync {
    /// Reading-order comparison. Fails when the two tokens cannot be ordered.
    fn compare(&self, a: &Position, b: &Position) -> Result<Ordering>;

    /// Ordinal of the content section containing `position`
    fn section_index(&self, position: &Position) -> Option<usize>;
}

/// Comparator over EPUB CFI tokens
#[derive(Debug, Clone, Copy, Default)]
pub struct CfiComparator;

impl PositionComparator for CfiComparator {
    fn compare(&self, a: &Position, b: &Position) -> Result<Ordering> {
        cfi::compare_cfi_strings(a.as_str(), b.as_str()).map_err(|e| {
            ReaderError::Incomparable(format!("{} vs {}: {}", a, b, e))
        })
    }

    fn section_index(&self, position: &Position) -> Option<usize> {
        cfi::parse(position.as_str()).ok()?.spine_index()
    }
}
