use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::errors::{InvalidBookmarkReport, StoreError};

/// Path prefix of the permalink exposed for notes (bookmarks without a URL).
pub const PERMALINK_PREFIX: &str = "/shaare/";

/// Represents a saved bookmark ("shaare").
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Bookmark {
    pub id: u64,
    pub short_code: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub created: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated: Option<DateTime<Utc>>,
    #[serde(default)]
    pub private: bool,
    #[serde(default)]
    pub sticky: bool,
}

/// Caller-supplied fields of a bookmark that has not been stored yet.
///
/// Has no id: ids and short codes are assigned by the store.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct BookmarkDraft {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub private: bool,
    #[serde(default)]
    pub sticky: bool,
    /// Only set when importing records that already have a creation date.
    #[serde(default)]
    pub created: Option<DateTime<Utc>>,
}

impl BookmarkDraft {
    pub fn new(url: &str, title: &str) -> Self {
        Self {
            url: url.trim().to_string(),
            title: title.trim().to_string(),
            ..Self::default()
        }
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.tags = normalize_tags(tags);
        self
    }

    pub fn private(mut self, private: bool) -> Self {
        self.private = private;
        self
    }

    pub fn sticky(mut self, sticky: bool) -> Self {
        self.sticky = sticky;
        self
    }

    /// Parses a loose JSON object into a draft. A present `id` is rejected.
    pub fn from_value(value: &Value) -> Result<Self, StoreError> {
        let obj = value
            .as_object()
            .ok_or_else(|| StoreError::InvalidBookmark(raw_dump(value)))?;
        if obj.get("id").map_or(false, |v| !v.is_null()) {
            return Err(StoreError::InvalidRequest(
                "new bookmarks must not carry an id".to_string(),
            ));
        }
        let created = match obj.get("created") {
            None | Some(Value::Null) => None,
            Some(v) => Some(parse_instant(v).ok_or_else(|| {
                StoreError::InvalidBookmark(InvalidBookmarkReport::Record {
                    id: None,
                    title: str_field(value, "title"),
                    url: str_field(value, "url"),
                    short_code: String::new(),
                    created: "Not a DateTime object".to_string(),
                })
            })?),
        };
        Ok(Self {
            url: str_field(value, "url").trim().to_string(),
            title: str_field(value, "title").trim().to_string(),
            description: str_field(value, "description"),
            tags: tags_field(value, " "),
            private: bool_field(value, "private"),
            sticky: bool_field(value, "sticky"),
            created,
        })
    }

    /// Turns the draft into a record under the given id.
    pub(crate) fn into_bookmark(self, id: u64, now: DateTime<Utc>) -> Bookmark {
        Bookmark {
            id,
            short_code: short_code_for(id),
            url: self.url.trim().to_string(),
            title: self.title.trim().to_string(),
            description: self.description,
            tags: normalize_tags(&self.tags),
            created: Some(self.created.unwrap_or(now)),
            updated: None,
            private: self.private,
            sticky: self.sticky,
        }
    }
}

impl Bookmark {
    /// Checks that the record can be persisted.
    ///
    /// A valid bookmark has a creation instant and the short code derived from its id.
    pub fn validate(&self) -> Result<(), StoreError> {
        if self.created.is_none() || self.short_code != short_code_for(self.id) {
            return Err(StoreError::InvalidBookmark(self.report()));
        }
        Ok(())
    }

    /// Diagnostic dump used by `InvalidBookmark`.
    pub fn report(&self) -> InvalidBookmarkReport {
        InvalidBookmarkReport::Record {
            id: Some(self.id),
            title: self.title.clone(),
            url: self.url.clone(),
            short_code: self.short_code.clone(),
            created: self
                .created
                .map(|c| c.to_rfc3339_opts(SecondsFormat::Secs, false))
                .unwrap_or_default(),
        }
    }

    /// Builds a record from a loose JSON object, e.g. an edited record sent over RPC.
    ///
    /// Non-object input yields `InvalidBookmark` with a dump of the raw value.
    /// Missing `created` or an unparsable one yields the field report.
    pub fn from_value(value: &Value) -> Result<Self, StoreError> {
        if !value.is_object() {
            return Err(StoreError::InvalidBookmark(raw_dump(value)));
        }
        let id = value.get("id").and_then(Value::as_u64);
        let short_code = value
            .get("short_code")
            .or_else(|| value.get("shorturl"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .or_else(|| id.map(short_code_for))
            .unwrap_or_default();
        let (created, created_text) = match value.get("created") {
            None | Some(Value::Null) => (None, String::new()),
            Some(v) => match parse_instant(v) {
                Some(dt) => (
                    Some(dt),
                    dt.to_rfc3339_opts(SecondsFormat::Secs, false),
                ),
                None => (None, "Not a DateTime object".to_string()),
            },
        };

        let id = match (id, &created) {
            (Some(id), Some(_)) => id,
            _ => {
                return Err(StoreError::InvalidBookmark(InvalidBookmarkReport::Record {
                    id,
                    title: str_field(value, "title"),
                    url: str_field(value, "url"),
                    short_code,
                    created: created_text,
                }))
            }
        };

        let bookmark = Self {
            id,
            short_code,
            url: str_field(value, "url").trim().to_string(),
            title: str_field(value, "title").trim().to_string(),
            description: str_field(value, "description"),
            tags: tags_field(value, " "),
            created,
            updated: value.get("updated").and_then(parse_instant),
            private: bool_field(value, "private"),
            sticky: bool_field(value, "sticky"),
        };
        bookmark.validate()?;
        Ok(bookmark)
    }

    /// A bookmark without a URL is a note; it links to its own permalink.
    pub fn is_note(&self) -> bool {
        self.url.is_empty() || self.url.starts_with(PERMALINK_PREFIX) || self.url.starts_with('?')
    }

    /// Permalink path of this bookmark.
    pub fn permalink(&self) -> String {
        format!("{}{}", PERMALINK_PREFIX, self.short_code)
    }

    /// URL to display: the stored URL, or the permalink for notes.
    pub fn display_url(&self) -> String {
        if self.url.is_empty() {
            self.permalink()
        } else {
            self.url.clone()
        }
    }

    /// Title to display: falls back to the URL when empty.
    pub fn display_title(&self) -> String {
        if self.title.is_empty() {
            self.display_url()
        } else {
            self.title.clone()
        }
    }

    pub fn tags_string(&self, separator: &str) -> String {
        self.tags.join(separator)
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        let folded = fold_tag(tag);
        self.tags.iter().any(|t| fold_tag(t) == folded)
    }

    pub fn set_tags<I, S>(&mut self, tags: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.tags = normalize_tags(tags);
    }

    pub fn add_tag(&mut self, tag: &str) {
        let mut tags = self.tags.clone();
        tags.push(tag.to_string());
        self.tags = normalize_tags(tags);
    }

    /// Removes every spelling of `tag`. Returns true if something was removed.
    pub fn delete_tag(&mut self, tag: &str) -> bool {
        let folded = fold_tag(tag);
        let before = self.tags.len();
        self.tags.retain(|t| fold_tag(t) != folded);
        before != self.tags.len()
    }

    /// Replaces `from` by `to` in place, keeping tag order. Returns true if renamed.
    pub fn rename_tag(&mut self, from: &str, to: &str) -> bool {
        let folded = fold_tag(from);
        let Some(pos) = self.tags.iter().position(|t| fold_tag(t) == folded) else {
            return false;
        };
        self.tags[pos] = to.trim().to_string();
        self.tags = normalize_tags(&self.tags);
        true
    }
}

/// Short permalink code derived from an id.
///
/// Ids below 2^32 go through a 32-bit bijective mix and render as 6 URL-safe
/// characters, larger ids through a 64-bit one and render as 11. Both mixes are
/// permutations and the two ranges have different lengths, so codes never collide.
pub fn short_code_for(id: u64) -> String {
    match u32::try_from(id) {
        Ok(small) => URL_SAFE_NO_PAD.encode(mix32(small).to_be_bytes()),
        Err(_) => URL_SAFE_NO_PAD.encode(mix64(id).to_be_bytes()),
    }
}

fn mix32(mut x: u32) -> u32 {
    x ^= x >> 16;
    x = x.wrapping_mul(0x7feb_352d);
    x ^= x >> 15;
    x = x.wrapping_mul(0x846c_a68b);
    x ^= x >> 16;
    x
}

fn mix64(mut x: u64) -> u64 {
    x ^= x >> 30;
    x = x.wrapping_mul(0xbf58_476d_1ce4_e5b9);
    x ^= x >> 27;
    x = x.wrapping_mul(0x94d0_49bb_1331_11eb);
    x ^= x >> 31;
    x
}

/// Case-folded form of a tag, used for comparisons and index keys.
pub fn fold_tag(tag: &str) -> String {
    tag.to_lowercase()
}

/// Normalizes a tag list.
///
/// Splits on whitespace and commas, strips one leading `-`, drops empty tags and
/// removes case-insensitive duplicates keeping the first spelling.
pub fn normalize_tags<I, S>(tags: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out: Vec<String> = Vec::new();
    let mut seen = std::collections::HashSet::new();
    for raw in tags {
        for token in raw
            .as_ref()
            .split(|c: char| c.is_whitespace() || c == ',')
        {
            let token = token.strip_prefix('-').unwrap_or(token);
            if token.is_empty() {
                continue;
            }
            if seen.insert(fold_tag(token)) {
                out.push(token.to_string());
            }
        }
    }
    out
}

/// Parses a tag string using the configured separator (commas and spaces are always accepted).
pub fn tags_from_str(tags: &str, separator: &str) -> Vec<String> {
    if separator.is_empty() {
        return normalize_tags([tags]);
    }
    normalize_tags([tags.replace(separator, " ")])
}

fn raw_dump(value: &Value) -> InvalidBookmarkReport {
    let dump = serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string());
    InvalidBookmarkReport::NotABookmark(dump)
}

fn parse_instant(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        Value::Number(n) => n
            .as_i64()
            .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0)),
        _ => None,
    }
}

fn str_field(value: &Value, key: &str) -> String {
    value
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn bool_field(value: &Value, key: &str) -> bool {
    match value.get(key) {
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_i64().map_or(false, |v| v != 0),
        _ => false,
    }
}

fn tags_field(value: &Value, separator: &str) -> Vec<String> {
    match value.get("tags") {
        Some(Value::Array(items)) => normalize_tags(items.iter().filter_map(Value::as_str)),
        Some(Value::String(s)) => tags_from_str(s, separator),
        _ => Vec::new(),
    }
}
