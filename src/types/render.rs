//! Typed payloads handed to the render/plugin pipeline.
//!
//! These are display copies: building or altering them never touches the
//! authoritative records held by the store.

use serde::{Deserialize, Serialize};

use super::bookmark::Bookmark;
use super::search::{Field, FieldHighlights, HighlightSpan, SearchRequest, SearchResult, Visibility};

/// Opening marker wrapped around a full-text match.
pub const HIGHLIGHT_OPEN: &str = "|@@HIGHLIGHT";
/// Closing marker wrapped around a full-text match.
pub const HIGHLIGHT_CLOSE: &str = "HIGHLIGHT@@|";

/// Display copy of a bookmark, optionally carrying search highlights.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookmarkView {
    pub id: u64,
    pub short_code: String,
    pub url: String,
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
    pub created: Option<String>,
    pub updated: Option<String>,
    pub private: bool,
    pub sticky: bool,
    pub permalink: String,
    #[serde(default)]
    pub highlights: Vec<(Field, Vec<HighlightSpan>)>,
}

impl BookmarkView {
    pub fn new(bookmark: &Bookmark, highlights: Option<&FieldHighlights>) -> Self {
        let mut spans: Vec<(Field, Vec<HighlightSpan>)> = highlights
            .map(|h| h.iter().map(|(f, s)| (*f, s.clone())).collect())
            .unwrap_or_default();
        spans.sort_by_key(|(f, _)| *f as u8);
        Self {
            id: bookmark.id,
            short_code: bookmark.short_code.clone(),
            url: bookmark.display_url(),
            title: bookmark.display_title(),
            description: bookmark.description.clone(),
            tags: bookmark.tags.clone(),
            created: bookmark.created.map(|c| c.to_rfc3339()),
            updated: bookmark.updated.map(|c| c.to_rfc3339()),
            private: bookmark.private,
            sticky: bookmark.sticky,
            permalink: bookmark.permalink(),
            highlights: spans,
        }
    }

    fn spans(&self, field: Field) -> &[HighlightSpan] {
        self.highlights
            .iter()
            .find(|(f, _)| *f == field)
            .map(|(_, s)| s.as_slice())
            .unwrap_or(&[])
    }

    pub fn highlighted_title(&self) -> String {
        wrap_highlights(&self.title, self.spans(Field::Title))
    }

    pub fn highlighted_description(&self) -> String {
        wrap_highlights(&self.description, self.spans(Field::Description))
    }

    pub fn highlighted_url(&self) -> String {
        wrap_highlights(&self.url, self.spans(Field::Url))
    }
}

/// Wraps each char span of `text` with the highlight markers.
///
/// Spans must be sorted and non-overlapping; out of range spans are ignored.
pub fn wrap_highlights(text: &str, spans: &[HighlightSpan]) -> String {
    if spans.is_empty() {
        return text.to_string();
    }
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len() + spans.len() * 24);
    let mut cursor = 0;
    for span in spans {
        if span.start < cursor || span.end > chars.len() || span.start >= span.end {
            continue;
        }
        out.extend(&chars[cursor..span.start]);
        out.push_str(HIGHLIGHT_OPEN);
        out.extend(&chars[span.start..span.end]);
        out.push_str(HIGHLIGHT_CLOSE);
        cursor = span.end;
    }
    out.extend(&chars[cursor..]);
    out
}

/// Payload of the link list page hook.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinklistRenderContext {
    pub links: Vec<BookmarkView>,
    pub result_count: usize,
    pub page_current: usize,
    pub page_max: usize,
    pub search_term: String,
    pub search_tags: Vec<String>,
    pub visibility: Visibility,
    pub logged_in: bool,
}

impl LinklistRenderContext {
    pub fn from_search(
        request: &SearchRequest,
        result: &SearchResult,
        visibility: Visibility,
        logged_in: bool,
    ) -> Self {
        Self {
            links: result
                .bookmarks
                .iter()
                .map(|b| BookmarkView::new(b, result.highlights.get(&b.id)))
                .collect(),
            result_count: result.total_count,
            page_current: result.page(),
            page_max: result.last_page(),
            search_term: request.term.clone(),
            search_tags: request.tags.clone(),
            visibility,
            logged_in,
        }
    }
}

/// Payload of the single-bookmark (permalink) page hook.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PermalinkRenderContext {
    pub link: BookmarkView,
    pub logged_in: bool,
}

/// Hook point and its typed payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "hook", content = "data", rename_all = "snake_case")]
pub enum RenderHook {
    RenderLinklist(LinklistRenderContext),
    RenderPermalink(PermalinkRenderContext),
}

impl RenderHook {
    pub fn name(&self) -> &'static str {
        match self {
            RenderHook::RenderLinklist(_) => "render_linklist",
            RenderHook::RenderPermalink(_) => "render_permalink",
        }
    }
}
