use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::bookmark::Bookmark;

/// Which bookmarks a caller may see.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    All,
    Public,
    Private,
}

impl Visibility {
    pub fn admits(self, private: bool) -> bool {
        match self {
            Visibility::All => true,
            Visibility::Public => !private,
            Visibility::Private => private,
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "all" => Some(Visibility::All),
            "public" => Some(Visibility::Public),
            "private" => Some(Visibility::Private),
            _ => None,
        }
    }
}

/// Per-request caller state passed explicitly into every store operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RequestContext {
    pub logged_in: bool,
    /// Visibility filter selected by a logged-in user; ignored for visitors.
    pub visibility: Option<Visibility>,
}

impl RequestContext {
    pub fn visitor() -> Self {
        Self {
            logged_in: false,
            visibility: None,
        }
    }

    pub fn admin() -> Self {
        Self {
            logged_in: true,
            visibility: None,
        }
    }

    pub fn with_visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = Some(visibility);
        self
    }

    /// Effective scope: visitors only ever see public bookmarks.
    pub fn scope(&self) -> Visibility {
        if self.logged_in {
            self.visibility.unwrap_or(Visibility::All)
        } else {
            Visibility::Public
        }
    }
}

/// Offset/limit window applied after filtering and ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Pagination {
    #[serde(default)]
    pub offset: usize,
    /// `None` returns every match from `offset` on.
    #[serde(default)]
    pub limit: Option<usize>,
}

impl Pagination {
    pub fn new(offset: usize, limit: usize) -> Self {
        Self {
            offset,
            limit: Some(limit),
        }
    }

    /// Window of the 1-based `page` with `per_page` entries.
    pub fn page(page: usize, per_page: usize) -> Self {
        Self::new(page.saturating_sub(1) * per_page, per_page)
    }
}

/// A search over the collection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchRequest {
    /// Required tags (AND); entries prefixed with `-` are excluded.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Free-text query: AND terms, `"exact phrases"`, `-excluded` terms.
    #[serde(default)]
    pub term: String,
    #[serde(default)]
    pub untagged_only: bool,
    #[serde(default)]
    pub ignore_sticky: bool,
    #[serde(default)]
    pub pagination: Pagination,
}

impl SearchRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn term(mut self, term: &str) -> Self {
        self.term = term.to_string();
        self
    }

    pub fn untagged_only(mut self, untagged_only: bool) -> Self {
        self.untagged_only = untagged_only;
        self
    }

    pub fn ignore_sticky(mut self, ignore_sticky: bool) -> Self {
        self.ignore_sticky = ignore_sticky;
        self
    }

    pub fn paginate(mut self, pagination: Pagination) -> Self {
        self.pagination = pagination;
        self
    }
}

/// Bookmark field a highlight span belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Field {
    Title,
    Description,
    Url,
    Tags,
}

/// Char range `[start, end)` of a full-text match inside one field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HighlightSpan {
    pub start: usize,
    pub end: usize,
}

/// Non-overlapping match spans of one bookmark, by field.
pub type FieldHighlights = HashMap<Field, Vec<HighlightSpan>>;

/// One page of search results plus the total match count.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SearchResult {
    pub bookmarks: Vec<Bookmark>,
    pub total_count: usize,
    pub offset: usize,
    pub limit: Option<usize>,
    /// Full-text match spans, keyed by bookmark id. Never stored with the record.
    pub highlights: HashMap<u64, FieldHighlights>,
}

impl SearchResult {
    /// Number of bookmarks on this page.
    pub fn result_count(&self) -> usize {
        self.bookmarks.len()
    }

    /// 1-based number of the current page.
    pub fn page(&self) -> usize {
        match self.limit {
            Some(limit) if limit > 0 => self.offset.div_ceil(limit) + 1,
            _ => {
                if self.offset == 0 {
                    1
                } else {
                    2
                }
            }
        }
    }

    /// Number of the last page; at least 1.
    pub fn last_page(&self) -> usize {
        match self.limit {
            Some(limit) if limit > 0 => self.total_count.div_ceil(limit).max(1),
            _ => 1,
        }
    }

    pub fn is_first_page(&self) -> bool {
        self.offset == 0
    }

    pub fn is_last_page(&self) -> bool {
        self.page() >= self.last_page()
    }

    pub fn ids(&self) -> Vec<u64> {
        self.bookmarks.iter().map(|b| b.id).collect()
    }
}
