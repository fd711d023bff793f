//! In-memory document and overlay
//!
//! A complete, self-contained implementation of the rendering collaborator:
//! sections are lists of text blocks, positions are CFIs minted by
//! [`crate::cfi`], and matching is case- and accent-insensitive. Used by the
//! engine's tests and benches, and by hosts that want to exercise the engine
//! without a renderer.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use crate::cfi::{block_cfi, text_cfi};
use crate::chapters::ChapterEntry;
use crate::document::{AnchorLocator, Document, SectionContent, SectionInfo, TextMatch};
use crate::error::{ReaderError, Result};
use crate::overlay::{Overlay, OverlayClick, OverlayKind, OverlayStyle};
use crate::position::{CfiComparator, Position, PositionComparator, PositionRange};

/// Characters of context on each side of a match
const EXCERPT_CONTEXT: usize = 40;

/// A block-level element: paragraph, heading
#[derive(Debug, Clone)]
pub struct MemoryBlock {
    pub id: Option<String>,
    pub text: String,
}

/// One content section before it is added to a document
#[derive(Debug, Clone)]
pub struct MemorySection {
    href: String,
    idref: String,
    blocks: Vec<MemoryBlock>,
    fails_to_load: bool,
}

impl MemorySection {
    pub fn new(href: impl Into<String>, idref: impl Into<String>) -> Self {
        Self {
            href: href.into(),
            idref: idref.into(),
            blocks: Vec::new(),
            fails_to_load: false,
        }
    }

    pub fn block(mut self, text: impl Into<String>) -> Self {
        self.blocks.push(MemoryBlock {
            id: None,
            text: text.into(),
        });
        self
    }

    /// A block carrying an element id that TOC anchors can target
    pub fn anchored(mut self, id: impl Into<String>, text: impl Into<String>) -> Self {
        self.blocks.push(MemoryBlock {
            id: Some(id.into()),
            text: text.into(),
        });
        self
    }

    /// Make every load of this section fail
    pub fn failing(mut self) -> Self {
        self.fails_to_load = true;
        self
    }
}

/// Load/unload accounting
#[derive(Debug, Default)]
pub struct LoadStats {
    loads: AtomicUsize,
    unloads: AtomicUsize,
    resident: AtomicUsize,
    peak_resident: AtomicUsize,
    find_calls: AtomicUsize,
}

impl LoadStats {
    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    pub fn unloads(&self) -> usize {
        self.unloads.load(Ordering::SeqCst)
    }

    /// Highest number of sections loaded at the same time
    pub fn peak_resident(&self) -> usize {
        self.peak_resident.load(Ordering::SeqCst)
    }

    pub fn find_calls(&self) -> usize {
        self.find_calls.load(Ordering::SeqCst)
    }
}

/// A document held entirely in memory
#[derive(Debug, Clone, Default)]
pub struct MemoryDocument {
    sections: Vec<MemorySection>,
    toc: Vec<ChapterEntry>,
    stats: Arc<LoadStats>,
}

impl MemoryDocument {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a section; its spine index is its insertion order
    pub fn section(mut self, section: MemorySection) -> Self {
        self.sections.push(section);
        self
    }

    pub fn toc(mut self, toc: Vec<ChapterEntry>) -> Self {
        self.toc = toc;
        self
    }

    pub fn stats(&self) -> Arc<LoadStats> {
        Arc::clone(&self.stats)
    }
}

#[async_trait]
impl Document for MemoryDocument {
    fn sections(&self) -> Vec<SectionInfo> {
        self.sections
            .iter()
            .enumerate()
            .map(|(index, section)| SectionInfo::new(index, &section.href, &section.idref))
            .collect()
    }

    fn chapters(&self) -> Vec<ChapterEntry> {
        self.toc.clone()
    }

    async fn load_section(&self, section: &SectionInfo) -> Result<Box<dyn SectionContent>> {
        let source = self
            .sections
            .get(section.index)
            .ok_or_else(|| ReaderError::NotFound(format!("section {}", section.index)))?;

        if source.fails_to_load {
            return Err(ReaderError::SectionLoad {
                href: source.href.clone(),
                reason: "content unavailable".to_string(),
            });
        }

        self.stats.loads.fetch_add(1, Ordering::SeqCst);
        let resident = self.stats.resident.fetch_add(1, Ordering::SeqCst) + 1;
        self.stats.peak_resident.fetch_max(resident, Ordering::SeqCst);

        Ok(Box::new(LoadedSection {
            index: section.index,
            href: source.href.clone(),
            blocks: source.blocks.clone(),
            stats: Arc::clone(&self.stats),
        }))
    }
}

struct LoadedSection {
    index: usize,
    href: String,
    blocks: Vec<MemoryBlock>,
    stats: Arc<LoadStats>,
}

impl AnchorLocator for LoadedSection {
    fn anchor_position(&self, anchor: &str) -> Result<Position> {
        self.blocks
            .iter()
            .position(|block| block.id.as_deref() == Some(anchor))
            .map(|block_index| block_cfi(self.index, block_index, Some(anchor)).into())
            .ok_or_else(|| ReaderError::AnchorResolution {
                section: self.href.clone(),
                anchor: anchor.to_string(),
            })
    }
}

impl SectionContent for LoadedSection {
    fn find_text(&self, query: &str) -> Vec<TextMatch> {
        self.stats.find_calls.fetch_add(1, Ordering::SeqCst);

        let (needle, _) = fold(query);
        if needle.is_empty() {
            return Vec::new();
        }

        let mut matches = Vec::new();
        for (block_index, block) in self.blocks.iter().enumerate() {
            let original: Vec<char> = block.text.chars().collect();
            let (folded, origin) = fold(&block.text);

            let mut at = 0;
            while at + needle.len() <= folded.len() {
                if folded[at..at + needle.len()] != needle[..] {
                    at += 1;
                    continue;
                }

                let start = origin[at];
                let end = origin[at + needle.len() - 1] + 1;
                matches.push(TextMatch {
                    position: text_cfi(self.index, block_index, start as u32).into(),
                    excerpt: excerpt(&original, start, end),
                });
                at += needle.len();
            }
        }

        matches
    }

    fn unload(self: Box<Self>) {
        self.stats.unloads.fetch_add(1, Ordering::SeqCst);
        self.stats.resident.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Lowercase, decompose, strip combining marks. Returns the folded chars and,
/// for each, the index of the original char it came from.
fn fold(text: &str) -> (Vec<char>, Vec<usize>) {
    let mut folded = Vec::with_capacity(text.len());
    let mut origin = Vec::with_capacity(text.len());

    for (index, ch) in text.chars().enumerate() {
        // Lowercasing can itself emit combining marks ('İ' -> "i\u{307}")
        for folded_char in ch.to_lowercase().nfkd().filter(|c| !is_combining_mark(*c)) {
            folded.push(folded_char);
            origin.push(index);
        }
    }

    (folded, origin)
}

/// Match with surrounding context, cut at word boundaries
fn excerpt(text: &[char], start: usize, end: usize) -> String {
    let mut from = start.saturating_sub(EXCERPT_CONTEXT);
    let mut to = (end + EXCERPT_CONTEXT).min(text.len());

    if from > 0 {
        if let Some(space) = text[from..start].iter().position(|c| c.is_whitespace()) {
            from += space + 1;
        }
    }
    if to < text.len() {
        if let Some(space) = text[end..to].iter().rposition(|c| c.is_whitespace()) {
            to = end + space;
        }
    }

    let body: String = text[from..to].iter().collect();
    let prefix = if from > 0 { "..." } else { "" };
    let suffix = if to < text.len() { "..." } else { "" };

    format!("{}{}{}", prefix, body.trim(), suffix)
}

/// A mark recorded by [`MemoryOverlay`]
#[derive(Debug, Clone)]
pub struct RegisteredMark {
    pub style: OverlayStyle,
    pub css_class: Option<String>,
    pub on_click: Option<OverlayClick>,
}

/// Overlay that records marks for the currently displayed section
#[derive(Debug, Default)]
pub struct MemoryOverlay {
    displayed_section: Option<usize>,
    marks: HashMap<(PositionRange, OverlayKind), RegisteredMark>,
    selection_active: bool,
}

impl MemoryOverlay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Render a section: existing marks are dropped, as a re-render does
    pub fn display_section(&mut self, index: usize) {
        self.displayed_section = Some(index);
        self.marks.clear();
    }

    /// Simulate the user selecting text
    pub fn select_text(&mut self) {
        self.selection_active = true;
    }

    pub fn selection_active(&self) -> bool {
        self.selection_active
    }

    pub fn mark(&self, range: &PositionRange, kind: OverlayKind) -> Option<&RegisteredMark> {
        self.marks.get(&(range.clone(), kind))
    }

    pub fn len(&self) -> usize {
        self.marks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.marks.is_empty()
    }

    /// Simulate a click on a mark. Returns `false` if nothing is clickable there.
    pub fn click(&self, range: &PositionRange) -> bool {
        self.marks
            .iter()
            .filter(|((mark_range, _), _)| mark_range == range)
            .filter_map(|(_, mark)| mark.on_click.as_ref())
            .any(|click| click.fire())
    }
}

impl Overlay for MemoryOverlay {
    fn add_annotation(
        &mut self,
        kind: OverlayKind,
        range: &PositionRange,
        style: OverlayStyle,
        on_click: Option<OverlayClick>,
        css_class: Option<&str>,
    ) -> Result<()> {
        if let Some(displayed) = self.displayed_section {
            if CfiComparator.section_index(&range.start) != Some(displayed) {
                return Err(ReaderError::OverlayRegistration(format!(
                    "{} is not in displayed section {}",
                    range.start, displayed
                )));
            }
        }

        self.marks.insert(
            (range.clone(), kind),
            RegisteredMark {
                style,
                css_class: css_class.map(str::to_string),
                on_click,
            },
        );
        Ok(())
    }

    fn remove_annotation(&mut self, range: &PositionRange, kind: OverlayKind) {
        self.marks.remove(&(range.clone(), kind));
    }

    fn clear_selection(&mut self) {
        self.selection_active = false;
    }
}

/// Shared handle so a test or host can inspect an overlay owned by a session
#[derive(Debug, Clone, Default)]
pub struct SharedOverlay(Arc<Mutex<MemoryOverlay>>);

impl SharedOverlay {
    pub fn new(overlay: MemoryOverlay) -> Self {
        Self(Arc::new(Mutex::new(overlay)))
    }

    pub fn with<R>(&self, f: impl FnOnce(&mut MemoryOverlay) -> R) -> R {
        f(&mut self.0.lock())
    }
}

impl Overlay for SharedOverlay {
    fn add_annotation(
        &mut self,
        kind: OverlayKind,
        range: &PositionRange,
        style: OverlayStyle,
        on_click: Option<OverlayClick>,
        css_class: Option<&str>,
    ) -> Result<()> {
        self.0
            .lock()
            .add_annotation(kind, range, style, on_click, css_class)
    }

    fn remove_annotation(&mut self, range: &PositionRange, kind: OverlayKind) {
        self.0.lock().remove_annotation(range, kind);
    }

    fn clear_selection(&mut self) {
        self.0.lock().clear_selection();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotations::HighlightColor;

    fn book() -> MemoryDocument {
        MemoryDocument::new()
            .section(
                MemorySection::new("ch1.xhtml", "c1")
                    .anchored("start", "Café society met at the Café Royal.")
                    .block("Nothing else here."),
            )
            .section(MemorySection::new("ch2.xhtml", "c2").failing())
    }

    #[tokio::test]
    async fn test_find_text_folds_case_and_accents() {
        let doc = book();
        let sections = doc.sections();
        let loaded = doc.load_section(&sections[0]).await.unwrap();

        let matches = loaded.find_text("cafe");
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].position, text_cfi(0, 0, 0).into());
        assert_eq!(matches[1].position, text_cfi(0, 0, 24).into());
        assert!(matches[0].excerpt.contains("Café society"));

        loaded.unload();
        assert_eq!(doc.stats().unloads(), 1);
    }

    #[test]
    fn test_fold_drops_marks_produced_by_lowercasing() {
        let (folded, origin) = fold("İstanbul");
        assert_eq!(folded.iter().collect::<String>(), "istanbul");
        assert_eq!(origin[0], 0);
        assert_eq!(origin[1], 1);
    }

    #[tokio::test]
    async fn test_find_text_matches_dotted_capital_i() {
        let doc = MemoryDocument::new()
            .section(MemorySection::new("ch1.xhtml", "c1").block("Arrival in İstanbul at dawn."));
        let loaded = doc.load_section(&doc.sections()[0]).await.unwrap();

        let matches = loaded.find_text("istanbul");
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].position, text_cfi(0, 0, 11).into());
    }

    #[tokio::test]
    async fn test_anchor_lookup() {
        let doc = book();
        let loaded = doc.load_section(&doc.sections()[0]).await.unwrap();

        assert_eq!(
            loaded.anchor_position("start").unwrap(),
            block_cfi(0, 0, Some("start")).into()
        );
        assert!(matches!(
            loaded.anchor_position("missing"),
            Err(ReaderError::AnchorResolution { .. })
        ));
    }

    #[tokio::test]
    async fn test_failing_section() {
        let doc = book();
        let result = doc.load_section(&doc.sections()[1]).await;

        assert!(matches!(result, Err(ReaderError::SectionLoad { .. })));
        assert_eq!(doc.stats().loads(), 0);
    }

    #[test]
    fn test_excerpt_cuts_at_word_boundaries() {
        let line = format!("alpha {}omega", "word ".repeat(40));
        let text: Vec<char> = line.chars().collect();
        let excerpt = excerpt(&text, 100, 104);

        assert!(excerpt.starts_with("...word"));
        assert!(excerpt.ends_with("word..."));
        assert!(!excerpt.contains("alpha"));
        assert!(!excerpt.contains("omega"));
    }

    #[test]
    fn test_overlay_rejects_other_sections() {
        let mut overlay = MemoryOverlay::new();
        overlay.display_section(1);

        let here = PositionRange::new(text_cfi(1, 0, 0), text_cfi(1, 0, 4));
        let elsewhere = PositionRange::new(text_cfi(2, 0, 0), text_cfi(2, 0, 4));
        let style = OverlayStyle::highlight(HighlightColor::Yellow, false);

        assert!(overlay
            .add_annotation(OverlayKind::Highlight, &here, style.clone(), None, None)
            .is_ok());
        assert!(matches!(
            overlay.add_annotation(OverlayKind::Highlight, &elsewhere, style, None, None),
            Err(ReaderError::OverlayRegistration(_))
        ));
        assert_eq!(overlay.len(), 1);
    }
}
