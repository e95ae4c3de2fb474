use crate::models::Bookmark;

/// Case-insensitive title match; an empty query matches everything.
pub(crate) fn matches_query(bookmark: &Bookmark, query: &str) -> bool {
    query.is_empty() || bookmark.title.to_lowercase().contains(&query.to_lowercase())
}

/// The subsequence of `items` whose titles contain `query`, order preserved.
pub(crate) fn filter_bookmarks(items: &[Bookmark], query: &str) -> Vec<Bookmark> {
    items
        .iter()
        .filter(|b| matches_query(b, query))
        .cloned()
        .collect()
}
