//! Bookmark lifecycle manager.
//!
//! Implements `BookmarkServiceTrait`: owns the in-memory collection and its
//! index, serves reads from the last committed snapshot and commits every
//! mutation by writing the whole collection back through [`DatastoreFile`].
//!
//! Mutations are serialized by a writer mutex. Each one works on a copy of the
//! current snapshot and only swaps it in after the save succeeded, so readers
//! see either the state before or after a mutation, and a failed save leaves
//! the previous snapshot in place.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use chrono::{DateTime, FixedOffset, NaiveDate, Offset, Utc};
use serde::Serialize;
use tracing::{debug, error, info};

use super::bookmark_index::BookmarkIndex;
use crate::datastore::DatastoreFile;
use crate::services::search_engine::{SearchEngine, SearchEngineTrait};
use crate::types::bookmark::{normalize_tags, Bookmark, BookmarkDraft};
use crate::types::collection::BookmarkCollection;
use crate::types::errors::StoreError;
use crate::types::search::{RequestContext, SearchRequest, SearchResult};
use crate::types::settings::StoreSettings;

/// Lifecycle state of the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreState {
    /// Nothing read from disk yet.
    Unloaded,
    /// Serving the last committed snapshot.
    Loaded,
    /// A mutation is being written.
    Saving,
    /// The last save failed; the previous snapshot is still served.
    Failed,
}

/// Summary returned by [`BookmarkService::info`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoreInfo {
    pub path: String,
    pub state: StoreState,
    pub bookmarks: usize,
    pub next_id: u64,
}

/// Trait defining bookmark store operations.
pub trait BookmarkServiceTrait {
    fn get(&self, ctx: &RequestContext, id: u64) -> Result<Bookmark, StoreError>;
    fn find(&self, ctx: &RequestContext, id: u64) -> Result<Option<Bookmark>, StoreError>;
    fn get_by_url(&self, ctx: &RequestContext, url: &str) -> Result<Option<Bookmark>, StoreError>;
    fn find_by_short_code(&self, ctx: &RequestContext, short_code: &str) -> Result<Bookmark, StoreError>;
    fn search(&self, ctx: &RequestContext, request: &SearchRequest) -> Result<SearchResult, StoreError>;
    fn exists(&self, ctx: &RequestContext, id: u64) -> Result<bool, StoreError>;
    fn count(&self, ctx: &RequestContext) -> Result<usize, StoreError>;
    fn latest(&self, ctx: &RequestContext) -> Result<Option<Bookmark>, StoreError>;
    fn days(&self, ctx: &RequestContext) -> Result<Vec<NaiveDate>, StoreError>;
    fn filter_day(&self, ctx: &RequestContext, day: NaiveDate) -> Result<Vec<Bookmark>, StoreError>;
    /// Tag occurrences among the bookmarks carrying every tag of `filter_tags`.
    fn bookmarks_count_per_tag(&self, ctx: &RequestContext, filter_tags: &[String]) -> Result<Vec<(String, usize)>, StoreError>;

    fn add(&self, ctx: &RequestContext, draft: BookmarkDraft) -> Result<u64, StoreError>;
    fn update(&self, ctx: &RequestContext, bookmark: Bookmark) -> Result<Bookmark, StoreError>;
    fn delete(&self, ctx: &RequestContext, id: u64) -> Result<Bookmark, StoreError>;
    /// Renames a tag on every bookmark. Returns the number of bookmarks changed.
    fn rename_tag(&self, ctx: &RequestContext, from: &str, to: &str) -> Result<usize, StoreError>;
    /// Removes a tag from every bookmark. Returns the number of bookmarks changed.
    fn delete_tag(&self, ctx: &RequestContext, tag: &str) -> Result<usize, StoreError>;
}

#[derive(Debug, Clone, Default, PartialEq)]
struct Snapshot {
    collection: BookmarkCollection,
    index: BookmarkIndex,
}

impl Snapshot {
    fn new(collection: BookmarkCollection) -> Self {
        let index = BookmarkIndex::build(&collection);
        Self { collection, index }
    }
}

/// The bookmark store of one installation.
pub struct BookmarkService {
    file: DatastoreFile,
    engine: SearchEngine,
    hide_public_links: bool,
    day_offset: FixedOffset,
    current: RwLock<Option<Arc<Snapshot>>>,
    state: RwLock<StoreState>,
    writer: Mutex<()>,
}

impl BookmarkService {
    /// Creates a service that loads `file` on first access.
    pub fn new(file: DatastoreFile) -> Self {
        Self {
            file,
            engine: SearchEngine::default(),
            hide_public_links: false,
            day_offset: Utc.fix(),
            current: RwLock::new(None),
            state: RwLock::new(StoreState::Unloaded),
            writer: Mutex::new(()),
        }
    }

    /// Creates a lazily loading service from settings.
    pub fn from_settings(settings: &StoreSettings) -> Self {
        Self::new(DatastoreFile::new(
            &settings.datastore_path,
            settings.disk_space_margin_bytes,
        ))
        .with_tags_separator(&settings.tags_separator)
        .with_hide_public_links(settings.hide_public_links)
        .with_day_offset_minutes(settings.day_offset_minutes)
    }

    /// Creates a service from settings and loads the datastore right away.
    ///
    /// # Errors
    /// `NotWritableDataStore` if the file exists but cannot be read or decoded.
    pub fn open(settings: &StoreSettings) -> Result<Self, StoreError> {
        let service = Self::from_settings(settings);
        service.load()?;
        Ok(service)
    }

    pub fn with_tags_separator(mut self, separator: &str) -> Self {
        self.engine = SearchEngine::new(separator);
        self
    }

    pub fn with_hide_public_links(mut self, hide: bool) -> Self {
        self.hide_public_links = hide;
        self
    }

    /// Sets the local day boundary of `days` and `filter_day`.
    /// Offsets of a day or more are ignored.
    pub fn with_day_offset_minutes(mut self, minutes: i32) -> Self {
        if let Some(offset) = FixedOffset::east_opt(minutes.saturating_mul(60)) {
            self.day_offset = offset;
        }
        self
    }

    /// Local calendar day of an instant.
    fn day_of(&self, instant: DateTime<Utc>) -> NaiveDate {
        instant.with_timezone(&self.day_offset).date_naive()
    }

    /// Loads the datastore if that has not happened yet.
    pub fn load(&self) -> Result<(), StoreError> {
        self.snapshot().map(|_| ())
    }

    pub fn state(&self) -> StoreState {
        *self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn info(&self) -> Result<StoreInfo, StoreError> {
        let snap = self.snapshot()?;
        Ok(StoreInfo {
            path: self.file.path().display().to_string(),
            state: self.state(),
            bookmarks: snap.collection.len(),
            next_id: snap.collection.next_id,
        })
    }

    fn set_state(&self, state: StoreState) {
        *self.state.write().unwrap_or_else(PoisonError::into_inner) = state;
    }

    fn writer(&self) -> MutexGuard<'_, ()> {
        self.writer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn committed(&self) -> Option<Arc<Snapshot>> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Current snapshot, loading it first if needed.
    fn snapshot(&self) -> Result<Arc<Snapshot>, StoreError> {
        if let Some(snap) = self.committed() {
            return Ok(snap);
        }
        let _writer = self.writer();
        self.snapshot_locked()
    }

    /// Like [`snapshot`](Self::snapshot); the writer mutex must be held.
    fn snapshot_locked(&self) -> Result<Arc<Snapshot>, StoreError> {
        if let Some(snap) = self.committed() {
            return Ok(snap);
        }
        let collection = self.file.load().map_err(|e| {
            error!(path = %self.file.path().display(), error = %e, "Failed to load datastore");
            e
        })?;
        let snap = Arc::new(Snapshot::new(collection));
        info!(
            path = %self.file.path().display(),
            bookmarks = snap.collection.len(),
            "Datastore loaded, index built"
        );
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::clone(&snap));
        self.set_state(StoreState::Loaded);
        Ok(snap)
    }

    /// Applies `change` to a copy of the current snapshot and commits it.
    ///
    /// Nothing is written when the change leaves the collection as it was.
    fn commit<T, F>(&self, ctx: &RequestContext, action: &str, change: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut Snapshot, DateTime<Utc>) -> Result<T, StoreError>,
    {
        if !ctx.logged_in {
            return Err(StoreError::Unauthorized(format!(
                "{} requires a logged-in user",
                action
            )));
        }
        let _writer = self.writer();
        let current = self.snapshot_locked()?;
        let mut next = (*current).clone();
        let out = change(&mut next, Utc::now())?;
        if next.collection == current.collection {
            debug!(action, "Mutation changed nothing, skipping save");
            return Ok(out);
        }

        self.set_state(StoreState::Saving);
        match self.file.save(&next.collection) {
            Ok(bytes) => {
                *self.current.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(next));
                self.set_state(StoreState::Loaded);
                debug!(action, bytes, "Mutation committed");
                Ok(out)
            }
            Err(e) => {
                self.set_state(StoreState::Failed);
                error!(action, error = %e, "Save failed, keeping last committed snapshot");
                Err(e)
            }
        }
    }

    /// Whether `ctx` may see `bookmark` at all.
    fn visible(&self, ctx: &RequestContext, bookmark: &Bookmark) -> bool {
        ctx.logged_in || (!self.hide_public_links && !bookmark.private)
    }

    /// Bookmarks a listing for `ctx` may contain.
    fn listed<'a>(&self, ctx: &RequestContext, snap: &'a Snapshot) -> Vec<&'a Bookmark> {
        if !ctx.logged_in && self.hide_public_links {
            return Vec::new();
        }
        let scope = ctx.scope();
        snap.collection
            .iter()
            .filter(|b| scope.admits(b.private))
            .collect()
    }
}

fn not_found(id: u64) -> StoreError {
    StoreError::BookmarkNotFound(id.to_string())
}

impl BookmarkServiceTrait for BookmarkService {
    fn get(&self, ctx: &RequestContext, id: u64) -> Result<Bookmark, StoreError> {
        self.find(ctx, id)?.ok_or_else(|| not_found(id))
    }

    fn find(&self, ctx: &RequestContext, id: u64) -> Result<Option<Bookmark>, StoreError> {
        let snap = self.snapshot()?;
        Ok(snap
            .collection
            .get(id)
            .filter(|b| self.visible(ctx, b))
            .cloned())
    }

    fn get_by_url(&self, ctx: &RequestContext, url: &str) -> Result<Option<Bookmark>, StoreError> {
        let url = url.trim();
        if url.is_empty() {
            return Ok(None);
        }
        let snap = self.snapshot()?;
        Ok(snap
            .index
            .ids_for_url(url)
            .into_iter()
            .flatten()
            .filter_map(|id| snap.collection.get(*id))
            .find(|b| self.visible(ctx, b))
            .cloned())
    }

    fn find_by_short_code(&self, ctx: &RequestContext, short_code: &str) -> Result<Bookmark, StoreError> {
        let snap = self.snapshot()?;
        snap.index
            .id_for_short_code(short_code)
            .and_then(|id| snap.collection.get(id))
            .filter(|b| self.visible(ctx, b))
            .cloned()
            .ok_or_else(|| StoreError::BookmarkNotFound(short_code.to_string()))
    }

    fn search(&self, ctx: &RequestContext, request: &SearchRequest) -> Result<SearchResult, StoreError> {
        let snap = self.snapshot()?;
        if !ctx.logged_in && self.hide_public_links {
            return Ok(SearchResult {
                offset: request.pagination.offset,
                limit: request.pagination.limit,
                ..SearchResult::default()
            });
        }
        Ok(self
            .engine
            .search(&snap.collection, &snap.index, request, ctx.scope()))
    }

    fn exists(&self, ctx: &RequestContext, id: u64) -> Result<bool, StoreError> {
        Ok(self.find(ctx, id)?.is_some())
    }

    fn count(&self, ctx: &RequestContext) -> Result<usize, StoreError> {
        let snap = self.snapshot()?;
        Ok(self.listed(ctx, &snap).len())
    }

    fn latest(&self, ctx: &RequestContext) -> Result<Option<Bookmark>, StoreError> {
        let snap = self.snapshot()?;
        Ok(self
            .listed(ctx, &snap)
            .into_iter()
            .max_by(|a, b| a.created.cmp(&b.created).then_with(|| a.id.cmp(&b.id)))
            .cloned())
    }

    fn days(&self, ctx: &RequestContext) -> Result<Vec<NaiveDate>, StoreError> {
        let snap = self.snapshot()?;
        let mut days: Vec<NaiveDate> = self
            .listed(ctx, &snap)
            .into_iter()
            .filter_map(|b| b.created.map(|c| self.day_of(c)))
            .collect();
        days.sort_unstable();
        days.dedup();
        Ok(days)
    }

    fn filter_day(&self, ctx: &RequestContext, day: NaiveDate) -> Result<Vec<Bookmark>, StoreError> {
        let snap = self.snapshot()?;
        let mut found: Vec<Bookmark> = self
            .listed(ctx, &snap)
            .into_iter()
            .filter(|b| b.created.map(|c| self.day_of(c)) == Some(day))
            .cloned()
            .collect();
        found.sort_by(|a, b| a.created.cmp(&b.created).then_with(|| a.id.cmp(&b.id)));
        Ok(found)
    }

    fn bookmarks_count_per_tag(&self, ctx: &RequestContext, filter_tags: &[String]) -> Result<Vec<(String, usize)>, StoreError> {
        let request = SearchRequest::new().tags(filter_tags.iter().cloned());
        let result = self.search(ctx, &request)?;
        let filters = normalize_tags(filter_tags);
        Ok(self
            .engine
            .count_tags(result.bookmarks.iter(), &filters, ctx.logged_in))
    }

    fn add(&self, ctx: &RequestContext, draft: BookmarkDraft) -> Result<u64, StoreError> {
        let id = self.commit(ctx, "add", |snap, now| {
            let url = draft.url.trim();
            if !url.is_empty() {
                if let Some(existing_id) = snap
                    .index
                    .ids_for_url(url)
                    .and_then(|ids| ids.iter().next().copied())
                {
                    return Err(StoreError::DuplicateUrl {
                        url: url.to_string(),
                        existing_id,
                    });
                }
            }
            let bookmark = snap.collection.insert_draft(draft, now);
            bookmark.validate()?;
            snap.index.insert(bookmark);
            Ok(bookmark.id)
        })?;
        info!(id, "Bookmark added");
        Ok(id)
    }

    fn update(&self, ctx: &RequestContext, bookmark: Bookmark) -> Result<Bookmark, StoreError> {
        let id = bookmark.id;
        let stored = self.commit(ctx, "update", |snap, now| {
            let old = snap.collection.get(id).cloned().ok_or_else(|| not_found(id))?;
            let url = bookmark.url.trim().to_string();
            if !url.is_empty() {
                if let Some(other) = snap
                    .index
                    .ids_for_url(&url)
                    .and_then(|ids| ids.iter().find(|other| **other != id).copied())
                {
                    return Err(StoreError::DuplicateUrl {
                        url,
                        existing_id: other,
                    });
                }
            }
            let new = Bookmark {
                id,
                short_code: old.short_code.clone(),
                url,
                title: bookmark.title.trim().to_string(),
                description: bookmark.description,
                tags: normalize_tags(&bookmark.tags),
                created: old.created,
                updated: Some(now),
                private: bookmark.private,
                sticky: bookmark.sticky,
            };
            new.validate()?;
            snap.index.update(&old, &new);
            snap.collection.replace(new.clone());
            Ok(new)
        })?;
        info!(id, "Bookmark updated");
        Ok(stored)
    }

    fn delete(&self, ctx: &RequestContext, id: u64) -> Result<Bookmark, StoreError> {
        let removed = self.commit(ctx, "delete", |snap, _| {
            let removed = snap.collection.remove(id).ok_or_else(|| not_found(id))?;
            snap.index.remove(&removed);
            Ok(removed)
        })?;
        info!(id, "Bookmark deleted");
        Ok(removed)
    }

    fn rename_tag(&self, ctx: &RequestContext, from: &str, to: &str) -> Result<usize, StoreError> {
        let to = to.trim();
        if normalize_tags([to]).len() != 1 || from.trim().is_empty() {
            return Err(StoreError::InvalidRequest(format!(
                "cannot rename tag {:?} to {:?}",
                from, to
            )));
        }
        let changed = self.commit(ctx, "rename_tag", |snap, now| {
            retag(snap, from, now, |b| b.rename_tag(from, to))
        })?;
        info!(from, to, changed, "Tag renamed");
        Ok(changed)
    }

    fn delete_tag(&self, ctx: &RequestContext, tag: &str) -> Result<usize, StoreError> {
        if tag.trim().is_empty() {
            return Err(StoreError::InvalidRequest("empty tag".to_string()));
        }
        let changed = self.commit(ctx, "delete_tag", |snap, now| {
            retag(snap, tag, now, |b| b.delete_tag(tag))
        })?;
        info!(tag, changed, "Tag deleted");
        Ok(changed)
    }
}

/// Applies `edit` to every bookmark carrying `tag`; returns how many changed.
fn retag<F>(snap: &mut Snapshot, tag: &str, now: DateTime<Utc>, mut edit: F) -> Result<usize, StoreError>
where
    F: FnMut(&mut Bookmark) -> bool,
{
    let ids: Vec<u64> = snap
        .index
        .ids_for_tag(tag)
        .map(|ids| ids.iter().copied().collect())
        .unwrap_or_default();
    let mut changed = 0;
    for id in ids {
        let Some(old) = snap.collection.get(id).cloned() else {
            continue;
        };
        let mut new = old.clone();
        if edit(&mut new) {
            new.updated = Some(now);
            snap.index.update(&old, &new);
            snap.collection.replace(new);
            changed += 1;
        }
    }
    Ok(changed)
}
