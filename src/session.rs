//! Highlight session
//!
//! The two-stage highlight flow (pick a colour, then edit) as an explicit
//! state machine. A highlight is persisted the moment a colour is chosen;
//! everything after that is an update against the stored record.
//!
//! ```text
//! Idle --select--> ColorPicking --choose_color--> Editing
//!  ^                    |                          |  change_color (loops)
//!  +------ cancel ------+                          |
//!  +------------- save_note / cancel / delete -----+
//! Idle --highlight clicked--> Editing
//! ```

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::annotations::{
    clip_text, AnnotationStore, Highlight, HighlightColor, HighlightUpdate, NewHighlight,
};
use crate::config::HighlightSettings;
use crate::error::{ReaderError, Result};
use crate::overlay::{
    highlight_class, Overlay, OverlayClick, OverlayEvent, OverlayKind, OverlayStyle,
};
use crate::position::PositionRange;

/// Selection captured on entry to colour picking. Nothing is persisted yet.
#[derive(Debug, Clone, PartialEq)]
pub struct HighlightDraft {
    pub range: PositionRange,
    pub text: String,
    pub color: HighlightColor,
}

/// The persisted highlight being edited
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveHighlight {
    pub id: String,
    pub range: PositionRange,
    pub color: HighlightColor,
    pub note: Option<String>,
}

impl From<&Highlight> for ActiveHighlight {
    fn from(highlight: &Highlight) -> Self {
        Self {
            id: highlight.id.clone(),
            range: highlight.range.clone(),
            color: highlight.color,
            note: highlight.note.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum SessionState {
    #[default]
    Idle,
    ColorPicking(HighlightDraft),
    Editing(ActiveHighlight),
}

impl SessionState {
    pub fn name(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::ColorPicking(_) => "color picking",
            SessionState::Editing(_) => "editing",
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, SessionState::Idle)
    }
}

/// Drives highlight creation and editing for one open book
pub struct HighlightSession<S, O> {
    book_id: String,
    store: S,
    overlay: O,
    settings: HighlightSettings,
    state: SessionState,
    events_tx: UnboundedSender<OverlayEvent>,
    events_rx: UnboundedReceiver<OverlayEvent>,
}

impl<S, O> HighlightSession<S, O>
where
    S: AnnotationStore,
    O: Overlay,
{
    pub fn new(book_id: impl Into<String>, store: S, overlay: O) -> Self {
        Self::with_settings(book_id, store, overlay, HighlightSettings::default())
    }

    pub fn with_settings(
        book_id: impl Into<String>,
        store: S,
        overlay: O,
        settings: HighlightSettings,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            book_id: book_id.into(),
            store,
            overlay,
            settings,
            state: SessionState::Idle,
            events_tx,
            events_rx,
        }
    }

    pub fn book_id(&self) -> &str {
        &self.book_id
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn overlay(&self) -> &O {
        &self.overlay
    }

    /// Text was selected. The native selection stays intact so it can still be copied.
    pub fn select(&mut self, range: PositionRange, text: &str) -> Result<()> {
        self.expect_idle("select text")?;

        self.state = SessionState::ColorPicking(HighlightDraft {
            range,
            text: clip_text(text, self.settings.text_limit),
            color: self.settings.default_color,
        });
        tracing::debug!("Highlight session: idle -> color picking");
        Ok(())
    }

    /// Persist the draft with `color`. The only path that creates a highlight.
    pub async fn choose_color(&mut self, color: HighlightColor) -> Result<Highlight> {
        let SessionState::ColorPicking(draft) = &self.state else {
            return Err(self.invalid("choose a color"));
        };

        let highlight = self
            .store
            .create_highlight(&self.book_id, NewHighlight::new(draft.range.clone(), &draft.text, color))
            .await?;

        self.overlay.clear_selection();
        self.register(&highlight.range, highlight.color, highlight.has_note());
        self.state = SessionState::Editing(ActiveHighlight::from(&highlight));

        tracing::debug!(
            "Highlight session: created {} ({}), color picking -> editing",
            highlight.id,
            highlight.color
        );
        Ok(highlight)
    }

    /// Recolour the highlight being edited. Committed immediately.
    pub async fn change_color(&mut self, color: HighlightColor) -> Result<Highlight> {
        let id = self.editing_id("change color")?;

        let highlight = self
            .store
            .update_highlight(&id, &HighlightUpdate::color(color))
            .await?;

        self.register(&highlight.range, highlight.color, highlight.has_note());
        self.state = SessionState::Editing(ActiveHighlight::from(&highlight));

        tracing::debug!("Highlight session: {} recolored to {}", highlight.id, color);
        Ok(highlight)
    }

    /// Save the note and close. A blank note clears it.
    pub async fn save_note(&mut self, note: &str) -> Result<Highlight> {
        let id = self.editing_id("save a note")?;

        let note = Some(note.trim())
            .filter(|note| !note.is_empty())
            .map(str::to_string);
        let highlight = self
            .store
            .update_highlight(&id, &HighlightUpdate::note(note))
            .await?;

        self.register(&highlight.range, highlight.color, highlight.has_note());
        self.state = SessionState::Idle;

        tracing::debug!("Highlight session: note saved on {}, editing -> idle", highlight.id);
        Ok(highlight)
    }

    /// Close without persisting. A highlight created by `choose_color` stays.
    pub fn cancel(&mut self) -> Result<()> {
        if self.state.is_idle() {
            return Err(self.invalid("cancel"));
        }

        tracing::debug!("Highlight session: {} -> idle (cancelled)", self.state.name());
        self.state = SessionState::Idle;
        Ok(())
    }

    /// Delete the highlight being edited and remove its mark.
    ///
    /// Returns `false` if the store no longer had it; the session still closes.
    pub async fn delete(&mut self) -> Result<bool> {
        let SessionState::Editing(active) = &self.state else {
            return Err(self.invalid("delete"));
        };
        let active = active.clone();

        let existed = self.store.delete_highlight(&active.id).await?;
        self.overlay.remove_annotation(&active.range, OverlayKind::Highlight);
        self.state = SessionState::Idle;

        tracing::debug!("Highlight session: deleted {}, editing -> idle", active.id);
        Ok(existed)
    }

    /// Enter editing for an existing highlight, skipping colour picking
    pub fn open_highlight(&mut self, highlight: &Highlight) -> Result<()> {
        self.expect_idle("open a highlight")?;

        self.state = SessionState::Editing(ActiveHighlight::from(highlight));
        tracing::debug!("Highlight session: opened {}, idle -> editing", highlight.id);
        Ok(())
    }

    /// Resolve an overlay event against the store.
    ///
    /// Returns `true` when a highlight was opened. Clicks on ranges with no
    /// stored highlight, or arriving while a session is open, are ignored.
    pub async fn handle_event(&mut self, event: OverlayEvent) -> Result<bool> {
        match event {
            OverlayEvent::HighlightClicked { range } => {
                if !self.state.is_idle() {
                    tracing::debug!(
                        "Ignoring highlight click while {}",
                        self.state.name()
                    );
                    return Ok(false);
                }

                match self.store.find_highlight_by_range(&self.book_id, &range).await? {
                    Some(highlight) => {
                        self.open_highlight(&highlight)?;
                        Ok(true)
                    }
                    None => {
                        tracing::debug!("No highlight stored at {}", range.start);
                        Ok(false)
                    }
                }
            }
        }
    }

    /// Handle every queued overlay event. Returns how many opened a highlight.
    pub async fn drain_events(&mut self) -> Result<usize> {
        let mut opened = 0;
        while let Ok(event) = self.events_rx.try_recv() {
            if self.handle_event(event).await? {
                opened += 1;
            }
        }
        Ok(opened)
    }

    /// Re-apply marks after the renderer displays a section.
    ///
    /// Highlights outside the rendered section fail to register; that is
    /// expected and skipped. Returns how many were registered.
    pub fn sync_overlays(&mut self, highlights: &[Highlight]) -> usize {
        highlights
            .iter()
            .filter(|highlight| self.register(&highlight.range, highlight.color, highlight.has_note()))
            .count()
    }

    // Remove-then-add keeps exactly one mark per range
    fn register(&mut self, range: &PositionRange, color: HighlightColor, has_note: bool) -> bool {
        self.overlay.remove_annotation(range, OverlayKind::Highlight);

        let click = OverlayClick::new(range.clone(), self.events_tx.clone());
        let class = highlight_class(color, has_note);
        match self.overlay.add_annotation(
            OverlayKind::Highlight,
            range,
            OverlayStyle::highlight(color, has_note),
            Some(click),
            Some(&class),
        ) {
            Ok(()) => true,
            Err(e) => {
                tracing::trace!("Overlay skipped for {}: {}", range.start, e);
                false
            }
        }
    }

    fn expect_idle(&self, action: &'static str) -> Result<()> {
        if self.state.is_idle() {
            Ok(())
        } else {
            Err(self.invalid(action))
        }
    }

    fn editing_id(&self, action: &'static str) -> Result<String> {
        match &self.state {
            SessionState::Editing(active) => Ok(active.id.clone()),
            _ => Err(self.invalid(action)),
        }
    }

    fn invalid(&self, action: &'static str) -> ReaderError {
        ReaderError::InvalidTransition {
            state: self.state.name(),
            action,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotations::SqliteAnnotationStore;
    use crate::cfi::text_cfi;
    use crate::memory::{MemoryOverlay, SharedOverlay};

    const BOOK: &str = "book-1";

    fn range(block: usize) -> PositionRange {
        PositionRange::new(text_cfi(0, block, 0), text_cfi(0, block, 12))
    }

    async fn setup() -> (
        HighlightSession<SqliteAnnotationStore, SharedOverlay>,
        SqliteAnnotationStore,
        SharedOverlay,
    ) {
        let store = SqliteAnnotationStore::in_memory().await.unwrap();
        let mut overlay = MemoryOverlay::new();
        overlay.display_section(0);
        let overlay = SharedOverlay::new(overlay);

        let session = HighlightSession::new(BOOK, store.clone(), overlay.clone());
        (session, store, overlay)
    }

    #[tokio::test]
    async fn test_select_leaves_selection_and_store_alone() {
        let (mut session, store, overlay) = setup().await;
        overlay.with(|o| o.select_text());

        session.select(range(1), "It was a dark").unwrap();

        assert!(matches!(session.state(), SessionState::ColorPicking(d) if d.color == HighlightColor::Yellow));
        assert!(overlay.with(|o| o.selection_active()));
        assert!(store.list_highlights(BOOK).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_highlight_exists_after_color_choice_even_if_cancelled() {
        let (mut session, store, overlay) = setup().await;
        overlay.with(|o| o.select_text());

        session.select(range(1), "It was a dark").unwrap();
        let created = session.choose_color(HighlightColor::Green).await.unwrap();

        assert!(!overlay.with(|o| o.selection_active()));
        assert!(matches!(session.state(), SessionState::Editing(a) if a.id == created.id));
        assert!(store.get_highlight(&created.id).await.unwrap().is_some());

        session.cancel().unwrap();
        assert!(session.state().is_idle());

        let stored = store.get_highlight(&created.id).await.unwrap().unwrap();
        assert_eq!(stored.color, HighlightColor::Green);
        assert_eq!(stored.note, None);
    }

    #[tokio::test]
    async fn test_cancel_color_picking_creates_nothing() {
        let (mut session, store, overlay) = setup().await;

        session.select(range(1), "It was a dark").unwrap();
        session.cancel().unwrap();

        assert!(store.list_highlights(BOOK).await.unwrap().is_empty());
        assert!(overlay.with(|o| o.is_empty()));
    }

    #[tokio::test]
    async fn test_three_color_changes_leave_one_mark() {
        let (mut session, store, overlay) = setup().await;

        session.select(range(2), "stormy night").unwrap();
        let created = session.choose_color(HighlightColor::Yellow).await.unwrap();
        session.change_color(HighlightColor::Blue).await.unwrap();
        session.change_color(HighlightColor::Pink).await.unwrap();
        session.change_color(HighlightColor::Purple).await.unwrap();

        let stored = store.get_highlight(&created.id).await.unwrap().unwrap();
        assert_eq!(stored.color, HighlightColor::Purple);
        assert_eq!(stored.text, "stormy night");
        assert_eq!(stored.range, range(2));

        overlay.with(|o| {
            assert_eq!(o.len(), 1);
            let mark = o.mark(&range(2), OverlayKind::Highlight).unwrap();
            assert_eq!(mark.style, OverlayStyle::highlight(HighlightColor::Purple, false));
            assert_eq!(mark.css_class.as_deref(), Some("hl-purple"));
        });
    }

    #[tokio::test]
    async fn test_save_note_flags_mark_and_blank_clears() {
        let (mut session, store, overlay) = setup().await;

        session.select(range(1), "It was a dark").unwrap();
        let created = session.choose_color(HighlightColor::Blue).await.unwrap();

        let saved = session.save_note("  Opening line  ").await.unwrap();
        assert_eq!(saved.note.as_deref(), Some("Opening line"));
        assert!(session.state().is_idle());
        assert_eq!(
            overlay.with(|o| o.mark(&range(1), OverlayKind::Highlight).unwrap().css_class.clone()),
            Some("hl-blue hl-note".to_string())
        );

        session.open_highlight(&saved).unwrap();
        session.save_note("   ").await.unwrap();
        let stored = store.get_highlight(&created.id).await.unwrap().unwrap();
        assert_eq!(stored.note, None);
    }

    #[tokio::test]
    async fn test_delete_removes_record_and_mark() {
        let (mut session, store, overlay) = setup().await;

        session.select(range(1), "It was a dark").unwrap();
        let created = session.choose_color(HighlightColor::Pink).await.unwrap();
        assert_eq!(overlay.with(|o| o.len()), 1);

        assert!(session.delete().await.unwrap());
        assert!(session.state().is_idle());
        assert!(store.get_highlight(&created.id).await.unwrap().is_none());
        assert!(overlay.with(|o| o.is_empty()));

        // Second delete of the same id through a stale record
        session.open_highlight(&created).unwrap();
        assert!(!session.delete().await.unwrap());
        assert!(session.state().is_idle());
    }

    #[tokio::test]
    async fn test_invalid_transitions_keep_state() {
        let (mut session, _store, _overlay) = setup().await;

        assert!(matches!(
            session.choose_color(HighlightColor::Blue).await,
            Err(ReaderError::InvalidTransition { state: "idle", .. })
        ));
        assert!(session.cancel().is_err());
        assert!(session.delete().await.is_err());

        session.select(range(1), "text").unwrap();
        assert!(session.select(range(2), "other").is_err());
        assert!(session.change_color(HighlightColor::Green).await.is_err());
        assert!(matches!(session.state(), SessionState::ColorPicking(d) if d.range == range(1)));
    }

    #[tokio::test]
    async fn test_failed_store_call_keeps_state() {
        let (mut session, store, _overlay) = setup().await;

        session.select(range(1), "text").unwrap();
        store.pool().close().await;

        let result = session.choose_color(HighlightColor::Blue).await;
        assert!(result.unwrap_err().is_persistence());
        assert!(matches!(session.state(), SessionState::ColorPicking(_)));
    }

    #[tokio::test]
    async fn test_click_opens_editing_from_store() {
        let (mut session, _store, overlay) = setup().await;

        session.select(range(3), "was falling").unwrap();
        let created = session.choose_color(HighlightColor::Green).await.unwrap();
        session.save_note("rain").await.unwrap();

        assert!(overlay.with(|o| o.click(&range(3))));
        assert_eq!(session.drain_events().await.unwrap(), 1);

        match session.state() {
            SessionState::Editing(active) => {
                assert_eq!(active.id, created.id);
                assert_eq!(active.color, HighlightColor::Green);
                assert_eq!(active.note.as_deref(), Some("rain"));
            }
            other => panic!("expected editing, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_click_on_unknown_range_is_ignored() {
        let (mut session, _store, _overlay) = setup().await;

        let opened = session
            .handle_event(OverlayEvent::HighlightClicked { range: range(9) })
            .await
            .unwrap();

        assert!(!opened);
        assert!(session.state().is_idle());
    }

    #[tokio::test]
    async fn test_sync_overlays_skips_other_sections() {
        let (mut session, store, overlay) = setup().await;

        let here = store
            .create_highlight(BOOK, NewHighlight::new(range(1), "here", HighlightColor::Yellow))
            .await
            .unwrap();
        let elsewhere = store
            .create_highlight(
                BOOK,
                NewHighlight::new(
                    PositionRange::new(text_cfi(4, 0, 0), text_cfi(4, 0, 5)),
                    "there",
                    HighlightColor::Blue,
                ),
            )
            .await
            .unwrap();

        let registered = session.sync_overlays(&[here.clone(), elsewhere]);
        assert_eq!(registered, 1);

        // A second pass after re-render does not duplicate marks
        session.sync_overlays(&[here]);
        assert_eq!(overlay.with(|o| o.len()), 1);
    }

    #[tokio::test]
    async fn test_select_clips_text() {
        let (mut session, _store, _overlay) = setup().await;

        session.select(range(1), &"a".repeat(800)).unwrap();
        match session.state() {
            SessionState::ColorPicking(draft) => assert_eq!(draft.text.len(), 500),
            other => panic!("expected color picking, got {:?}", other),
        }
    }
}
