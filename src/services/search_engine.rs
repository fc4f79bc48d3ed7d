//! Search/filter engine.
//!
//! Stateless: every call receives the collection and its index and returns a
//! fresh [`SearchResult`]. Steps, in order: tag narrowing through the index,
//! visibility, untagged filter, full-text scan, ordering, pagination.

use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};

use crate::managers::bookmark_index::BookmarkIndex;
use crate::types::bookmark::{fold_tag, Bookmark};
use crate::types::collection::BookmarkCollection;
use crate::types::render::{HIGHLIGHT_CLOSE, HIGHLIGHT_OPEN};
use crate::types::search::{
    Field, FieldHighlights, HighlightSpan, SearchRequest, SearchResult, Visibility,
};

/// Separates fields in the searchable text of a bookmark.
const FIELD_SEPARATOR: char = '\\';

/// Trait defining search operations over a loaded collection.
pub trait SearchEngineTrait {
    fn search(
        &self,
        collection: &BookmarkCollection,
        index: &BookmarkIndex,
        request: &SearchRequest,
        scope: Visibility,
    ) -> SearchResult;

    /// Tag occurrences among `bookmarks`, most used first.
    fn count_tags<'a, I>(&self, bookmarks: I, filter_tags: &[String], include_hidden: bool) -> Vec<(String, usize)>
    where
        I: IntoIterator<Item = &'a Bookmark>;
}

/// Default search engine.
pub struct SearchEngine {
    tags_separator: String,
}

impl Default for SearchEngine {
    fn default() -> Self {
        Self::new(" ")
    }
}

impl SearchEngine {
    /// `tags_separator` joins tags into the searchable text and splits tag queries.
    pub fn new(tags_separator: &str) -> Self {
        Self {
            tags_separator: tags_separator.to_string(),
        }
    }

    /// Candidate ids after tag narrowing, or `None` when nothing can match.
    fn tag_candidates(
        &self,
        collection: &BookmarkCollection,
        index: &BookmarkIndex,
        tags: &[String],
        scope: Visibility,
    ) -> Option<BTreeSet<u64>> {
        let query = TagQuery::parse(tags, &self.tags_separator);
        if query.is_empty() {
            return Some(collection.bookmarks.keys().copied().collect());
        }
        let query = if scope == Visibility::Public {
            let visible = query.without_hidden();
            if visible.is_empty() {
                return None;
            }
            visible
        } else {
            query
        };

        let mut candidates: BTreeSet<u64> = if query.include.is_empty() {
            collection.bookmarks.keys().copied().collect()
        } else {
            let mut sets = Vec::with_capacity(query.include.len());
            for tag in &query.include {
                sets.push(index.ids_for_tag(tag)?);
            }
            sets.sort_by_key(|s| s.len());
            let (first, rest) = sets.split_first()?;
            first
                .iter()
                .filter(|id| rest.iter().all(|s| s.contains(*id)))
                .copied()
                .collect()
        };
        for tag in &query.exclude {
            if let Some(ids) = index.ids_for_tag(tag) {
                candidates.retain(|id| !ids.contains(id));
            }
        }
        Some(candidates)
    }
}

impl SearchEngineTrait for SearchEngine {
    fn search(
        &self,
        collection: &BookmarkCollection,
        index: &BookmarkIndex,
        request: &SearchRequest,
        scope: Visibility,
    ) -> SearchResult {
        let pagination = request.pagination;
        let empty = SearchResult {
            offset: pagination.offset,
            limit: pagination.limit,
            ..SearchResult::default()
        };
        let Some(candidates) = self.tag_candidates(collection, index, &request.tags, scope) else {
            return empty;
        };

        let text = TextQuery::parse(&request.term);
        let mut highlights: HashMap<u64, FieldHighlights> = HashMap::new();
        let mut matches: Vec<&Bookmark> = Vec::new();
        for bookmark in candidates.iter().filter_map(|id| collection.get(*id)) {
            if !scope.admits(bookmark.private) {
                continue;
            }
            if request.untagged_only && !bookmark.tags.is_empty() {
                continue;
            }
            if text.is_empty() {
                matches.push(bookmark);
                continue;
            }
            let doc = SearchableText::new(bookmark, &self.tags_separator);
            if let Some(spans) = text.matches(&doc) {
                if !spans.is_empty() {
                    highlights.insert(bookmark.id, spans);
                }
                matches.push(bookmark);
            }
        }

        let sticky_first = !request.ignore_sticky;
        matches.sort_by(|a, b| compare_for_listing(a, b, sticky_first));

        let total_count = matches.len();
        let page: Vec<Bookmark> = matches
            .into_iter()
            .skip(pagination.offset)
            .take(pagination.limit.unwrap_or(usize::MAX))
            .cloned()
            .collect();
        highlights.retain(|id, _| page.iter().any(|b| b.id == *id));

        SearchResult {
            bookmarks: page,
            total_count,
            offset: pagination.offset,
            limit: pagination.limit,
            highlights,
        }
    }

    fn count_tags<'a, I>(&self, bookmarks: I, filter_tags: &[String], include_hidden: bool) -> Vec<(String, usize)>
    where
        I: IntoIterator<Item = &'a Bookmark>,
    {
        let filters: BTreeSet<String> = filter_tags.iter().map(|t| fold_tag(t)).collect();
        let mut spelling: HashMap<String, String> = HashMap::new();
        let mut counts: HashMap<String, usize> = HashMap::new();
        for bookmark in bookmarks {
            for tag in &bookmark.tags {
                if tag.is_empty() || (!include_hidden && tag.starts_with('.')) {
                    continue;
                }
                let folded = fold_tag(tag);
                if filters.contains(&folded) {
                    continue;
                }
                spelling.entry(folded.clone()).or_insert_with(|| tag.clone());
                *counts.entry(folded).or_insert(0) += 1;
            }
        }
        let mut out: Vec<(String, usize)> = counts
            .into_iter()
            .filter_map(|(folded, n)| spelling.get(&folded).map(|s| (s.clone(), n)))
            .collect();
        out.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        out
    }
}

/// Listing order: sticky first (optional), newest first, then highest id.
pub fn compare_for_listing(a: &Bookmark, b: &Bookmark, sticky_first: bool) -> Ordering {
    let sticky = if sticky_first {
        b.sticky.cmp(&a.sticky)
    } else {
        Ordering::Equal
    };
    sticky
        .then_with(|| b.created.cmp(&a.created))
        .then_with(|| b.id.cmp(&a.id))
}

// === Tag query ===

#[derive(Debug, Default, PartialEq)]
struct TagQuery {
    include: Vec<String>,
    exclude: Vec<String>,
}

impl TagQuery {
    fn parse(tags: &[String], separator: &str) -> Self {
        let mut query = TagQuery::default();
        for raw in tags {
            let raw = if separator.is_empty() {
                raw.clone()
            } else {
                raw.replace(separator, " ")
            };
            for token in raw.split(|c: char| c.is_whitespace() || c == ',') {
                match token.strip_prefix('-') {
                    Some("") => {}
                    Some(excluded) => query.exclude.push(fold_tag(excluded)),
                    None if token.is_empty() => {}
                    None => query.include.push(fold_tag(token)),
                }
            }
        }
        query
    }

    fn is_empty(&self) -> bool {
        self.include.is_empty() && self.exclude.is_empty()
    }

    /// Hidden tags (`.tag`) cannot be searched by public callers.
    fn without_hidden(self) -> Self {
        TagQuery {
            include: self.include.into_iter().filter(|t| !t.starts_with('.')).collect(),
            exclude: self.exclude,
        }
    }
}

// === Full-text query ===

#[derive(Debug, Default, PartialEq)]
struct TextQuery {
    phrases: Vec<Vec<char>>,
    terms: Vec<Vec<char>>,
    excluded: Vec<Vec<char>>,
}

impl TextQuery {
    fn parse(term: &str) -> Self {
        let cleaned = strip_markup(term).to_lowercase();
        let mut query = TextQuery::default();

        let mut rest = String::with_capacity(cleaned.len());
        let mut in_phrase = false;
        let mut phrase = String::new();
        for c in cleaned.chars() {
            match (c, in_phrase) {
                ('"', false) => in_phrase = true,
                ('"', true) => {
                    if !phrase.trim().is_empty() {
                        query.phrases.push(phrase.chars().collect());
                    }
                    phrase.clear();
                    in_phrase = false;
                    rest.push(' ');
                }
                (c, true) => phrase.push(c),
                (c, false) => rest.push(c),
            }
        }
        // An unterminated quote is an ordinary character.
        if in_phrase {
            rest.push('"');
            rest.push_str(&phrase);
        }

        for word in rest.split_whitespace() {
            match word.strip_prefix('-') {
                Some(excluded) if !excluded.is_empty() => query.excluded.push(excluded.chars().collect()),
                _ => query.terms.push(word.chars().collect()),
            }
        }
        query
    }

    fn is_empty(&self) -> bool {
        self.phrases.is_empty() && self.terms.is_empty() && self.excluded.is_empty()
    }

    /// Highlight spans when every phrase and term occurs and no excluded term does.
    fn matches(&self, doc: &SearchableText) -> Option<FieldHighlights> {
        let mut found = Vec::new();
        for needle in self.phrases.iter().chain(&self.terms) {
            let start = find_chars(&doc.text, needle)?;
            found.push((start, start + needle.len()));
        }
        if self.excluded.iter().any(|n| find_chars(&doc.text, n).is_some()) {
            return None;
        }
        Some(doc.highlights(found))
    }
}

/// Removes highlight markers, HTML tags and common entities from a query.
///
/// Only well-formed tags are dropped: a `<` directly followed by a letter,
/// `/` or `!`, closed by a `>`. Anything else stays literal.
fn strip_markup(input: &str) -> String {
    let unmarked = input.replace(HIGHLIGHT_OPEN, "").replace(HIGHLIGHT_CLOSE, "");
    let mut out = String::with_capacity(unmarked.len());
    let mut rest = unmarked.as_str();
    while let Some(open) = rest.find('<') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let starts_tag = after
            .chars()
            .next()
            .map_or(false, |c| c.is_ascii_alphabetic() || c == '/' || c == '!');
        match after.find('>') {
            Some(close) if starts_tag && !after[..close].contains('<') => {
                rest = &after[close + 1..];
            }
            _ => {
                out.push('<');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out.replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
}

fn find_chars(haystack: &[char], needle: &[char]) -> Option<usize> {
    if needle.is_empty() || needle.len() > haystack.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Lowercased searchable text of one bookmark, with a map back to field positions.
struct SearchableText {
    text: Vec<char>,
    /// For each char of `text`: the field and char offset it came from.
    origin: Vec<Option<(Field, usize)>>,
}

impl SearchableText {
    fn new(bookmark: &Bookmark, separator: &str) -> Self {
        let tags = bookmark.tags_string(separator);
        let fields = [
            (Field::Title, bookmark.title.as_str()),
            (Field::Description, bookmark.description.as_str()),
            (Field::Url, bookmark.url.as_str()),
            (Field::Tags, tags.as_str()),
        ];
        let mut text = Vec::new();
        let mut origin = Vec::new();
        for (field, value) in fields {
            for (pos, c) in value.chars().enumerate() {
                for lower in c.to_lowercase() {
                    text.push(lower);
                    origin.push(Some((field, pos)));
                }
            }
            text.push(FIELD_SEPARATOR);
            origin.push(None);
        }
        Self { text, origin }
    }

    /// Maps raw match ranges to non-overlapping per-field spans.
    fn highlights(&self, mut found: Vec<(usize, usize)>) -> FieldHighlights {
        found.sort_by_key(|(start, _)| *start);
        let mut out = FieldHighlights::new();
        let mut reached = 0;
        for (start, end) in found {
            if start < reached {
                continue;
            }
            reached = end;
            let first = self.origin.get(start).copied().flatten();
            let last = self.origin.get(end - 1).copied().flatten();
            if let (Some((field, from)), Some((last_field, to))) = (first, last) {
                if field == last_field {
                    out.entry(field).or_default().push(HighlightSpan {
                        start: from,
                        end: to + 1,
                    });
                }
            }
        }
        out
    }
}
