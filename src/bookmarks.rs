//! Bookmark lookup and toggle

use crate::annotations::{AnnotationStore, Bookmark};
use crate::error::Result;
use crate::ordering::same_anchor;
use crate::position::{Position, PositionComparator};

/// Outcome of pressing the bookmark button
#[derive(Debug, Clone, PartialEq)]
pub enum BookmarkToggle {
    Added(Bookmark),
    Removed(Bookmark),
}

/// The bookmark sitting exactly at `position`, if any
pub fn is_location_bookmarked<'a, C>(
    position: &Position,
    bookmarks: &'a [Bookmark],
    comparator: &C,
) -> Option<&'a Bookmark>
where
    C: PositionComparator + ?Sized,
{
    bookmarks
        .iter()
        .find(|bookmark| same_anchor(comparator, &bookmark.position, position))
}

/// Remove the bookmark at `position`, or create one if there is none.
///
/// The lookup and the write are separate store calls.
pub async fn toggle_bookmark<S, C>(
    store: &S,
    comparator: &C,
    book_id: &str,
    position: &Position,
    excerpt: &str,
) -> Result<BookmarkToggle>
where
    S: AnnotationStore + ?Sized,
    C: PositionComparator + ?Sized,
{
    let bookmarks = store.list_bookmarks(book_id).await?;

    if let Some(existing) = is_location_bookmarked(position, &bookmarks, comparator) {
        store.delete_bookmark(&existing.id).await?;
        tracing::debug!("Removed bookmark {} at {}", existing.id, position);
        return Ok(BookmarkToggle::Removed(existing.clone()));
    }

    let bookmark = store.create_bookmark(book_id, position, excerpt).await?;
    tracing::debug!("Added bookmark {} at {}", bookmark.id, position);
    Ok(BookmarkToggle::Added(bookmark))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotations::SqliteAnnotationStore;
    use crate::cfi::text_cfi;
    use crate::position::CfiComparator;

    #[tokio::test]
    async fn test_toggle_twice_leaves_no_bookmark() {
        let store = SqliteAnnotationStore::in_memory().await.unwrap();
        let p: Position = text_cfi(2, 3, 17).into();

        let first = toggle_bookmark(&store, &CfiComparator, "book", &p, "Call me Ishmael")
            .await
            .unwrap();
        assert!(matches!(first, BookmarkToggle::Added(_)));
        assert_eq!(store.list_bookmarks("book").await.unwrap().len(), 1);

        let second = toggle_bookmark(&store, &CfiComparator, "book", &p, "Call me Ishmael")
            .await
            .unwrap();
        assert!(matches!(second, BookmarkToggle::Removed(_)));
        assert!(store.list_bookmarks("book").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_nearby_position_is_a_distinct_bookmark() {
        let store = SqliteAnnotationStore::in_memory().await.unwrap();
        let p: Position = text_cfi(2, 3, 17).into();
        let near: Position = text_cfi(2, 3, 18).into();

        toggle_bookmark(&store, &CfiComparator, "book", &p, "").await.unwrap();
        let toggle = toggle_bookmark(&store, &CfiComparator, "book", &near, "")
            .await
            .unwrap();

        assert!(matches!(toggle, BookmarkToggle::Added(_)));
        assert_eq!(store.list_bookmarks("book").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_is_location_bookmarked() {
        let store = SqliteAnnotationStore::in_memory().await.unwrap();
        let p: Position = text_cfi(1, 0, 4).into();
        let created = store.create_bookmark("book", &p, "").await.unwrap();
        let bookmarks = store.list_bookmarks("book").await.unwrap();

        let found = is_location_bookmarked(&p, &bookmarks, &CfiComparator);
        assert_eq!(found.map(|b| b.id.as_str()), Some(created.id.as_str()));

        let elsewhere: Position = text_cfi(3, 0, 4).into();
        assert!(is_location_bookmarked(&elsewhere, &bookmarks, &CfiComparator).is_none());
    }

    #[test]
    fn test_equivalent_spelling_matches() {
        let bookmark = Bookmark {
            id: "b1".to_string(),
            book_id: "book".to_string(),
            position: Position::new("epubcfi(/6/4[chap01ref]!/4/2/1:3)"),
            excerpt: String::new(),
            created_at: chrono::Utc::now(),
        };

        // Same path, id assertion omitted
        let target = Position::new("epubcfi(/6/4!/4/2/1:3)");
        assert!(is_location_bookmarked(&target, &[bookmark], &CfiComparator).is_some());
    }
}
