//! Secondary lookup maps over a [`BookmarkCollection`].
//!
//! The index only stores ids; the collection stays the single owner of the
//! records. Every mutation of the collection must be mirrored here in the same
//! critical section so that `index == BookmarkIndex::build(&collection)` holds.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::types::bookmark::{fold_tag, Bookmark};
use crate::types::collection::BookmarkCollection;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BookmarkIndex {
    by_url: HashMap<String, BTreeSet<u64>>,
    by_tag: BTreeMap<String, BTreeSet<u64>>,
    by_short_code: HashMap<String, u64>,
}

impl BookmarkIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the index from scratch.
    pub fn build(collection: &BookmarkCollection) -> Self {
        let mut index = Self::new();
        for bookmark in collection.iter() {
            index.insert(bookmark);
        }
        index
    }

    pub fn insert(&mut self, bookmark: &Bookmark) {
        if !bookmark.url.is_empty() {
            self.by_url
                .entry(bookmark.url.clone())
                .or_default()
                .insert(bookmark.id);
        }
        for tag in &bookmark.tags {
            self.by_tag.entry(fold_tag(tag)).or_default().insert(bookmark.id);
        }
        self.by_short_code
            .insert(bookmark.short_code.clone(), bookmark.id);
    }

    pub fn remove(&mut self, bookmark: &Bookmark) {
        if let Some(ids) = self.by_url.get_mut(&bookmark.url) {
            ids.remove(&bookmark.id);
            if ids.is_empty() {
                self.by_url.remove(&bookmark.url);
            }
        }
        for tag in &bookmark.tags {
            let key = fold_tag(tag);
            if let Some(ids) = self.by_tag.get_mut(&key) {
                ids.remove(&bookmark.id);
                if ids.is_empty() {
                    self.by_tag.remove(&key);
                }
            }
        }
        if self.by_short_code.get(&bookmark.short_code) == Some(&bookmark.id) {
            self.by_short_code.remove(&bookmark.short_code);
        }
    }

    /// Re-indexes a record whose fields changed.
    pub fn update(&mut self, old: &Bookmark, new: &Bookmark) {
        self.remove(old);
        self.insert(new);
    }

    /// Ids of bookmarks stored under exactly this URL.
    pub fn ids_for_url(&self, url: &str) -> Option<&BTreeSet<u64>> {
        self.by_url.get(url)
    }

    /// Ids of bookmarks carrying `tag`, compared case-insensitively.
    pub fn ids_for_tag(&self, tag: &str) -> Option<&BTreeSet<u64>> {
        self.by_tag.get(&fold_tag(tag))
    }

    pub fn id_for_short_code(&self, short_code: &str) -> Option<u64> {
        self.by_short_code.get(short_code).copied()
    }

    /// Folded tags with the ids carrying them.
    pub fn tags(&self) -> impl Iterator<Item = (&String, &BTreeSet<u64>)> {
        self.by_tag.iter()
    }
}
