use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use super::bookmark::{Bookmark, BookmarkDraft};

/// First id handed out by an empty collection.
pub const FIRST_ID: u64 = 1;

/// The whole set of bookmarks plus the id counter.
///
/// Keyed by id; `next_id` only ever grows, so deleted ids are never reused.
#[derive(Debug, Clone, PartialEq)]
pub struct BookmarkCollection {
    pub next_id: u64,
    pub bookmarks: BTreeMap<u64, Bookmark>,
}

impl Default for BookmarkCollection {
    fn default() -> Self {
        Self::new()
    }
}

impl BookmarkCollection {
    pub fn new() -> Self {
        Self {
            next_id: FIRST_ID,
            bookmarks: BTreeMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.bookmarks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bookmarks.is_empty()
    }

    pub fn get(&self, id: u64) -> Option<&Bookmark> {
        self.bookmarks.get(&id)
    }

    pub fn contains(&self, id: u64) -> bool {
        self.bookmarks.contains_key(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Bookmark> {
        self.bookmarks.values()
    }

    /// Stores a draft under the next id and returns the new record.
    pub fn insert_draft(&mut self, draft: BookmarkDraft, now: DateTime<Utc>) -> &Bookmark {
        let id = self.next_id;
        self.next_id += 1;
        self.bookmarks
            .entry(id)
            .or_insert_with(|| draft.into_bookmark(id, now))
    }

    /// Replaces an existing record; returns the previous one.
    pub fn replace(&mut self, bookmark: Bookmark) -> Option<Bookmark> {
        if !self.contains(bookmark.id) {
            return None;
        }
        self.bookmarks.insert(bookmark.id, bookmark)
    }

    pub fn remove(&mut self, id: u64) -> Option<Bookmark> {
        self.bookmarks.remove(&id)
    }

    /// Highest stored id, if any.
    pub fn max_id(&self) -> Option<u64> {
        self.bookmarks.keys().next_back().copied()
    }
}
