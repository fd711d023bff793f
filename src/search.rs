//! Full-text search across a book
//!
//! Sections are visited strictly in reading order, one at a time: load,
//! match, label, unload. At most one section's content is resident.

use serde::{Deserialize, Serialize};

use crate::chapters::ChapterResolver;
use crate::document::Document;
use crate::position::{Position, PositionComparator};

/// A search hit, labeled with its chapter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    pub position: Position,
    /// Match with surrounding context
    pub excerpt: String,
    pub chapter_title: String,
    /// Spine index of the containing section
    pub section_index: usize,
}

/// Queries shorter than this never reach the text matcher
pub const MIN_QUERY_CHARS: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchOptions {
    /// Shorter queries return nothing. Values below [`MIN_QUERY_CHARS`] are raised to it.
    pub min_query_chars: usize,
    /// Stop after this many results
    pub limit: Option<usize>,
}

impl Default for SearchOptions {
    fn default() -> Self {
        SearchOptions {
            min_query_chars: MIN_QUERY_CHARS,
            limit: None,
        }
    }
}

/// Searches one open document
pub struct SearchIndexer<'a, D: ?Sized, C: ?Sized> {
    document: &'a D,
    comparator: &'a C,
    chapters: ChapterResolver,
    options: SearchOptions,
}

impl<'a, D, C> SearchIndexer<'a, D, C>
where
    D: Document + ?Sized,
    C: PositionComparator + ?Sized,
{
    pub fn new(document: &'a D, comparator: &'a C) -> Self {
        Self::with_options(document, comparator, SearchOptions::default())
    }

    pub fn with_options(document: &'a D, comparator: &'a C, options: SearchOptions) -> Self {
        Self {
            document,
            comparator,
            chapters: ChapterResolver::new(&document.chapters()),
            options,
        }
    }

    /// Every match of `query`, in document order.
    ///
    /// Sections that fail to load are skipped with a warning. Runs to
    /// completion; a caller that issued a newer query ignores the result.
    pub async fn search_book(&self, query: &str) -> Vec<SearchResult> {
        let query = query.trim();
        if query.chars().count() < self.options.min_query_chars.max(MIN_QUERY_CHARS) {
            return Vec::new();
        }

        let limit = self.options.limit.unwrap_or(usize::MAX);
        let mut results = Vec::new();

        for section in self.document.sections() {
            if results.len() >= limit {
                break;
            }

            let content = match self.document.load_section(&section).await {
                Ok(content) => content,
                Err(e) => {
                    tracing::warn!("Skipping section {} in search: {}", section.href, e);
                    continue;
                }
            };

            let matches = content.find_text(query);
            if !matches.is_empty() {
                let chapters = self
                    .chapters
                    .prepare(&section, &*content, self.comparator);

                for hit in matches.into_iter().take(limit - results.len()) {
                    let chapter_title = chapters.label_for(&hit.position, self.comparator).to_string();
                    results.push(SearchResult {
                        position: hit.position,
                        excerpt: hit.excerpt,
                        chapter_title,
                        section_index: section.index,
                    });
                }
            }

            content.unload();
        }

        tracing::debug!("Search for '{}' found {} results", query, results.len());
        results
    }
}
