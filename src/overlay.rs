//! Visual overlay interface
//!
//! The rendering layer draws highlight marks on top of the page. Marks are
//! keyed by `(range, kind)`. Click callbacks do not capture annotation
//! state: a click sends an [`OverlayEvent`] naming the range, and the
//! highlight session resolves it against the store.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::UnboundedSender;

use crate::annotations::HighlightColor;
use crate::error::Result;
use crate::position::PositionRange;

const HIGHLIGHT_OPACITY: f32 = 0.3;

/// Mark kinds the engine registers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverlayKind {
    Highlight,
}

/// Visual style of one overlay mark
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverlayStyle {
    pub fill: String,
    pub fill_opacity: f32,
    pub has_note: bool,
}

impl OverlayStyle {
    pub fn highlight(color: HighlightColor, has_note: bool) -> Self {
        Self {
            fill: color.css().to_string(),
            fill_opacity: HIGHLIGHT_OPACITY,
            has_note,
        }
    }
}

/// CSS class for a highlight mark, e.g. `hl-yellow hl-note`
pub fn highlight_class(color: HighlightColor, has_note: bool) -> String {
    if has_note {
        format!("hl-{} hl-note", color)
    } else {
        format!("hl-{}", color)
    }
}

/// Messages emitted by overlay callbacks
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OverlayEvent {
    HighlightClicked { range: PositionRange },
}

/// Click handler handed to the overlay with each mark
#[derive(Debug, Clone)]
pub struct OverlayClick {
    range: PositionRange,
    sender: UnboundedSender<OverlayEvent>,
}

impl OverlayClick {
    pub fn new(range: PositionRange, sender: UnboundedSender<OverlayEvent>) -> Self {
        Self { range, sender }
    }

    pub fn range(&self) -> &PositionRange {
        &self.range
    }

    /// Emit the click. Returns `false` once the session is gone.
    pub fn fire(&self) -> bool {
        self.sender
            .send(OverlayEvent::HighlightClicked {
                range: self.range.clone(),
            })
            .is_ok()
    }
}

/// Overlay annotation API of the rendering layer
pub trait Overlay: Send {
    /// Register a mark. Fails with `OverlayRegistration` when the range is
    /// not part of the rendered content.
    fn add_annotation(
        &mut self,
        kind: OverlayKind,
        range: &PositionRange,
        style: OverlayStyle,
        on_click: Option<OverlayClick>,
        css_class: Option<&str>,
    ) -> Result<()>;

    fn remove_annotation(&mut self, range: &PositionRange, kind: OverlayKind);

    /// Drop the native text selection
    fn clear_selection(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[test]
    fn test_highlight_class() {
        assert_eq!(highlight_class(HighlightColor::Blue, false), "hl-blue");
        assert_eq!(highlight_class(HighlightColor::Pink, true), "hl-pink hl-note");
    }

    #[test]
    fn test_click_sends_range() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let range = PositionRange::new("epubcfi(/6/2!/4/2/1:0)", "epubcfi(/6/2!/4/2/1:5)");
        let click = OverlayClick::new(range.clone(), tx);

        assert!(click.fire());
        assert_eq!(
            rx.try_recv().unwrap(),
            OverlayEvent::HighlightClicked { range }
        );

        drop(rx);
        assert!(!click.fire());
    }
}
