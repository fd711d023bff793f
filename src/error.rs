//! Error types for the reader engine

use thiserror::Error;

use crate::cfi::CfiParseError;

/// Engine-wide result type
pub type Result<T> = std::result::Result<T, ReaderError>;

/// Reader engine error type
///
/// None of these are fatal to an open book. Search, chapter labeling and
/// overlay sync degrade on their own failures; only persistence errors and
/// invalid session transitions reach the caller of a user action.
#[derive(Error, Debug)]
pub enum ReaderError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Positions cannot be ordered: {0}")]
    Incomparable(String),

    #[error("Anchor '{anchor}' not found in section {section}")]
    AnchorResolution { section: String, anchor: String },

    #[error("Failed to load section {href}: {reason}")]
    SectionLoad { href: String, reason: String },

    #[error("Overlay registration failed: {0}")]
    OverlayRegistration(String),

    #[error("Cannot {action} while {state}")]
    InvalidTransition {
        state: &'static str,
        action: &'static str,
    },

    #[error("Invalid CFI: {0}")]
    CfiParse(#[from] CfiParseError),

    #[error("Database error: {0}")]
    Persistence(#[from] sqlx::Error),

    #[error("Invalid timestamp: {0}")]
    Timestamp(#[from] chrono::ParseError),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl ReaderError {
    /// Whether this error came from the persistence layer
    pub fn is_persistence(&self) -> bool {
        matches!(self, ReaderError::Persistence(_) | ReaderError::Timestamp(_))
    }
}
