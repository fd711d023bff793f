//! Chapter attribution
//!
//! Publishers often pack several chapters into one content file. The table
//! of contents then points into that file through anchors
//! (`part3.xhtml#ch26`), and the section alone no longer names the chapter a
//! location belongs to. [`ChapterResolver`] recovers it:
//!
//! 1. collect every TOC entry (at any depth) whose href targets the section,
//! 2. resolve each entry's anchor to a position in the loaded section,
//! 3. no entries: use the section's own identifier,
//! 4. one entry, or no anchor resolved: use the first entry,
//! 5. otherwise the answer is the last resolved anchor at or before the
//!    target position.
//!
//! Step 4 can mislabel a location when every anchor of a multi-chapter
//! section fails to resolve. `SectionChapters::is_ambiguous` reports that
//! case.

use std::borrow::Cow;

use serde::{Deserialize, Serialize};

use crate::document::{AnchorLocator, SectionInfo};
use crate::ordering::sort_ascending_by_position;
use crate::position::{Position, PositionComparator};

/// A table-of-contents entry. Leaves have an empty `children` vec.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterEntry {
    pub label: String,
    /// Content file, optionally followed by `#anchor`
    pub href: String,
    #[serde(default)]
    pub children: Vec<ChapterEntry>,
}

impl ChapterEntry {
    pub fn new(label: impl Into<String>, href: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            href: href.into(),
            children: Vec::new(),
        }
    }

    pub fn with_children(mut self, children: Vec<ChapterEntry>) -> Self {
        self.children = children;
        self
    }

    /// Pre-order traversal: an entry, then its children
    fn flatten_into<'a>(&'a self, out: &mut Vec<&'a ChapterEntry>) {
        out.push(self);
        for child in &self.children {
            child.flatten_into(out);
        }
    }
}

/// Split `file#anchor`. An empty anchor counts as none.
pub fn split_href(href: &str) -> (&str, Option<&str>) {
    match href.split_once('#') {
        Some((file, anchor)) if !anchor.is_empty() => (file, Some(anchor)),
        Some((file, _)) => (file, None),
        None => (href, None),
    }
}

// Percent-decoded, without leading `./` or `../` segments
fn normalize_file(file: &str) -> String {
    let file = file.trim();
    let decoded = urlencoding::decode(file).unwrap_or(Cow::Borrowed(file));

    let mut rest = decoded.as_ref();
    loop {
        if let Some(stripped) = rest.strip_prefix("./") {
            rest = stripped;
        } else if let Some(stripped) = rest.strip_prefix("../") {
            rest = stripped;
        } else {
            break;
        }
    }
    rest.to_string()
}

/// Whether two hrefs name the same content file.
///
/// TOC hrefs are relative to the navigation document and spine hrefs to the
/// package document, so one may carry extra leading directories or climb out
/// with `../`. Either side may be percent-encoded.
pub fn same_file(a: &str, b: &str) -> bool {
    let a = normalize_file(split_href(a).0);
    let b = normalize_file(split_href(b).0);
    if a.is_empty() || b.is_empty() {
        return false;
    }

    a == b || is_path_suffix(&a, &b) || is_path_suffix(&b, &a)
}

fn is_path_suffix(long: &str, short: &str) -> bool {
    long.len() > short.len()
        && long.ends_with(short)
        && long.as_bytes()[long.len() - short.len() - 1] == b'/'
}

#[derive(Debug, Clone)]
struct FlatChapter {
    label: String,
    file: String,
    anchor: Option<String>,
}

/// Flattened chapter tree, built once per opened document
#[derive(Debug, Clone, Default)]
pub struct ChapterResolver {
    chapters: Vec<FlatChapter>,
}

impl ChapterResolver {
    pub fn new(toc: &[ChapterEntry]) -> Self {
        let mut entries = Vec::new();
        for entry in toc {
            entry.flatten_into(&mut entries);
        }

        let chapters = entries
            .into_iter()
            .map(|entry| {
                let (file, anchor) = split_href(&entry.href);
                FlatChapter {
                    label: entry.label.clone(),
                    file: file.to_string(),
                    anchor: anchor.map(str::to_string),
                }
            })
            .collect();

        Self { chapters }
    }

    /// Number of entries across the whole tree
    pub fn len(&self) -> usize {
        self.chapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chapters.is_empty()
    }

    /// Labels of the entries pointing into `section_href`, in TOC order
    pub fn labels_in(&self, section_href: &str) -> Vec<&str> {
        self.chapters
            .iter()
            .filter(|chapter| same_file(&chapter.file, section_href))
            .map(|chapter| chapter.label.as_str())
            .collect()
    }

    /// Match and resolve the chapters of one loaded section
    pub fn prepare<L, C>(
        &self,
        section: &SectionInfo,
        locator: &L,
        comparator: &C,
    ) -> SectionChapters
    where
        L: AnchorLocator + ?Sized,
        C: PositionComparator + ?Sized,
    {
        let matched: Vec<ResolvedChapter> = self
            .chapters
            .iter()
            .filter(|chapter| same_file(&chapter.file, &section.href))
            .map(|chapter| {
                let position = chapter.anchor.as_deref().and_then(|anchor| {
                    locator
                        .anchor_position(anchor)
                        .map_err(|e| tracing::debug!("Chapter '{}' unranked: {}", chapter.label, e))
                        .ok()
                });
                ResolvedChapter {
                    label: chapter.label.clone(),
                    position,
                }
            })
            .collect();

        let ranked = sort_ascending_by_position(
            matched
                .iter()
                .filter_map(|chapter| {
                    chapter
                        .position
                        .clone()
                        .map(|position| (chapter.label.clone(), position))
                })
                .collect::<Vec<_>>(),
            comparator,
            |(_, position)| position,
        );

        let chapters = SectionChapters {
            fallback: section.fallback_label().to_string(),
            matched,
            ranked,
        };

        if chapters.is_ambiguous() {
            tracing::debug!(
                "Section {} holds {} chapters but no anchor resolved; labeling by first entry",
                section.href,
                chapters.matched.len()
            );
        }

        chapters
    }
}

#[derive(Debug, Clone)]
struct ResolvedChapter {
    label: String,
    position: Option<Position>,
}

/// The chapters of one section, ready to label positions inside it
#[derive(Debug, Clone)]
pub struct SectionChapters {
    fallback: String,
    matched: Vec<ResolvedChapter>,
    /// Resolved anchors in ascending document order
    ranked: Vec<(String, Position)>,
}

impl SectionChapters {
    /// Chapter label for a position inside this section
    pub fn label_for<C>(&self, target: &Position, comparator: &C) -> &str
    where
        C: PositionComparator + ?Sized,
    {
        let Some(first) = self.matched.first() else {
            return &self.fallback;
        };

        if self.matched.len() == 1 || self.ranked.is_empty() {
            return &first.label;
        }

        let mut best = first.label.as_str();
        for (label, position) in &self.ranked {
            match comparator.compare(position, target) {
                Ok(ordering) if ordering.is_le() => best = label,
                Ok(_) => break,
                Err(_) => continue,
            }
        }
        best
    }

    /// Several chapters share the section but none could be ranked
    pub fn is_ambiguous(&self) -> bool {
        self.matched.len() > 1 && self.ranked.is_empty()
    }

    /// Number of TOC entries pointing into the section
    pub fn matched_count(&self) -> usize {
        self.matched.len()
    }
}
