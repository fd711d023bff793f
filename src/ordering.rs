//! Position ordering
//!
//! Equality and sorting semantics layered on top of a [`PositionComparator`].
//! A comparator may refuse to order two tokens; such pairs are left in their
//! original relative order rather than failing the whole sort.

use std::cmp::Ordering;

use crate::annotations::{Bookmark, Highlight};
use crate::position::{Position, PositionComparator};

/// Exact-anchor equality: same section and the comparator reports `Equal`.
///
/// This is the bookmark dedup predicate. Positions that are merely close
/// (e.g. differing by reflow rounding) are distinct.
pub fn same_anchor<C>(comparator: &C, a: &Position, b: &Position) -> bool
where
    C: PositionComparator + ?Sized,
{
    if a == b {
        return true;
    }

    match (comparator.section_index(a), comparator.section_index(b)) {
        (Some(x), Some(y)) if x == y => {
            matches!(comparator.compare(a, b), Ok(Ordering::Equal))
        }
        _ => false,
    }
}

/// Stable sort, most advanced position first
pub fn sort_descending_by_position<T, C, F>(
    items: impl IntoIterator<Item = T>,
    comparator: &C,
    position: F,
) -> Vec<T>
where
    C: PositionComparator + ?Sized,
    F: Fn(&T) -> &Position,
{
    insertion_sort(items, comparator, position, Ordering::Greater)
}

/// Stable sort in reading order
pub fn sort_ascending_by_position<T, C, F>(
    items: impl IntoIterator<Item = T>,
    comparator: &C,
    position: F,
) -> Vec<T>
where
    C: PositionComparator + ?Sized,
    F: Fn(&T) -> &Position,
{
    insertion_sort(items, comparator, position, Ordering::Less)
}

// Each item goes in front of the first placed item it strictly precedes in
// the requested direction. Ties and incomparable pairs keep arrival order.
fn insertion_sort<T, C, F>(
    items: impl IntoIterator<Item = T>,
    comparator: &C,
    position: F,
    leading: Ordering,
) -> Vec<T>
where
    C: PositionComparator + ?Sized,
    F: Fn(&T) -> &Position,
{
    let mut sorted: Vec<T> = Vec::new();
    for item in items {
        let at = sorted
            .iter()
            .position(|placed| {
                matches!(comparator.compare(position(&item), position(placed)), Ok(o) if o == leading)
            })
            .unwrap_or(sorted.len());
        sorted.insert(at, item);
    }
    sorted
}

/// Bookmarks, furthest into the book first
pub fn sort_bookmarks_by_position<C>(bookmarks: Vec<Bookmark>, comparator: &C) -> Vec<Bookmark>
where
    C: PositionComparator + ?Sized,
{
    sort_descending_by_position(bookmarks, comparator, |b| &b.position)
}

/// Highlights by range start, furthest into the book first
pub fn sort_highlights_by_position<C>(highlights: Vec<Highlight>, comparator: &C) -> Vec<Highlight>
where
    C: PositionComparator + ?Sized,
{
    sort_descending_by_position(highlights, comparator, |h| &h.range.start)
}
