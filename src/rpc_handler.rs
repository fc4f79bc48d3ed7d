//! RPC method handler for the line-delimited JSON-RPC protocol.
//!
//! Extracted from `rpc_server.rs` so it can be unit-tested independently.
//! `handle_method` dispatches a call to the store or the settings engine held
//! by [`App`].
//!
//! Every method accepts two optional context params: `logged_in` (default
//! `true`, the channel is local to the operator) and `visibility`
//! (`all`, `public` or `private`).

use std::sync::Mutex;

use chrono::NaiveDate;
use serde_json::{json, Value};

use crate::app::App;
use crate::managers::bookmark_manager::BookmarkServiceTrait;
use crate::types::bookmark::{tags_from_str, Bookmark, BookmarkDraft};
use crate::types::render::{
    BookmarkView, LinklistRenderContext, PermalinkRenderContext, RenderHook,
};
use crate::types::search::{Pagination, RequestContext, SearchRequest, Visibility};

/// Dispatch a JSON-RPC method call to the appropriate handler.
///
/// Returns `Ok(Value)` on success or `Err(String)` with an error message.
pub fn handle_method(app: &Mutex<App>, method: &str, params: &Value) -> Result<Value, String> {
    match method {
        "ping" => Ok(json!({"pong": true, "version": env!("CARGO_PKG_VERSION")})),

        // ─── Bookmarks ───
        "bookmark.add" => {
            let ctx = context(params)?;
            let a = app.lock().map_err(|e| e.to_string())?;
            let mut draft = BookmarkDraft::from_value(params).map_err(|e| e.to_string())?;
            draft.tags = tags_param(params, "tags", &a.settings().tags_separator);
            let id = a.store.add(&ctx, draft).map_err(|e| e.to_string())?;
            let stored = a.store.get(&ctx, id).map_err(|e| e.to_string())?;
            Ok(json!({"id": id, "short_code": stored.short_code, "permalink": stored.permalink()}))
        }
        "bookmark.get" => {
            let ctx = context(params)?;
            let id = id_param(params)?;
            let a = app.lock().map_err(|e| e.to_string())?;
            let bookmark = a.store.get(&ctx, id).map_err(|e| e.to_string())?;
            serde_json::to_value(bookmark).map_err(|e| e.to_string())
        }
        "bookmark.get_by_url" => {
            let ctx = context(params)?;
            let url = str_param(params, "url")?;
            let a = app.lock().map_err(|e| e.to_string())?;
            let found = a.store.get_by_url(&ctx, url).map_err(|e| e.to_string())?;
            serde_json::to_value(found).map_err(|e| e.to_string())
        }
        "bookmark.permalink" => {
            let ctx = context(params)?;
            let code = str_param(params, "short_code")?;
            let a = app.lock().map_err(|e| e.to_string())?;
            let bookmark = a
                .store
                .find_by_short_code(&ctx, code)
                .map_err(|e| e.to_string())?;
            let hook = RenderHook::RenderPermalink(PermalinkRenderContext {
                link: BookmarkView::new(&bookmark, None),
                logged_in: ctx.logged_in,
            });
            serde_json::to_value(hook).map_err(|e| e.to_string())
        }
        "bookmark.update" => {
            let ctx = context(params)?;
            let mut raw = params.get("bookmark").cloned().ok_or("missing bookmark")?;
            let a = app.lock().map_err(|e| e.to_string())?;
            // Partial edits may omit the immutable fields; take them from the stored record.
            if let Some(id) = raw.get("id").and_then(Value::as_u64) {
                if let (Some(stored), Some(obj)) = (
                    a.store.find(&ctx, id).map_err(|e| e.to_string())?,
                    raw.as_object_mut(),
                ) {
                    if obj.get("created").map_or(true, Value::is_null) {
                        obj.insert("created".to_string(), json!(stored.created));
                    }
                    obj.entry("short_code").or_insert_with(|| json!(stored.short_code));
                }
            }
            let mut bookmark = Bookmark::from_value(&raw).map_err(|e| e.to_string())?;
            if raw.get("tags").map_or(false, Value::is_string) {
                bookmark.tags = tags_param(&raw, "tags", &a.settings().tags_separator);
            }
            let stored = a.store.update(&ctx, bookmark).map_err(|e| e.to_string())?;
            serde_json::to_value(stored).map_err(|e| e.to_string())
        }
        "bookmark.delete" => {
            let ctx = context(params)?;
            let id = id_param(params)?;
            let a = app.lock().map_err(|e| e.to_string())?;
            a.store.delete(&ctx, id).map_err(|e| e.to_string())?;
            Ok(json!({"ok": true, "id": id}))
        }
        "bookmark.search" => {
            let ctx = context(params)?;
            let a = app.lock().map_err(|e| e.to_string())?;
            let request = search_request(params, a.settings().links_per_page, &a.settings().tags_separator)?;
            let result = a.store.search(&ctx, &request).map_err(|e| e.to_string())?;
            let hook = RenderHook::RenderLinklist(LinklistRenderContext::from_search(
                &request,
                &result,
                ctx.scope(),
                ctx.logged_in,
            ));
            serde_json::to_value(hook).map_err(|e| e.to_string())
        }
        "bookmark.days" => {
            let ctx = context(params)?;
            let a = app.lock().map_err(|e| e.to_string())?;
            let days = a.store.days(&ctx).map_err(|e| e.to_string())?;
            let days: Vec<String> = days.iter().map(|d| d.format("%Y%m%d").to_string()).collect();
            Ok(json!(days))
        }
        "bookmark.day" => {
            let ctx = context(params)?;
            let day = parse_day(str_param(params, "day")?)?;
            let a = app.lock().map_err(|e| e.to_string())?;
            let bookmarks = a.store.filter_day(&ctx, day).map_err(|e| e.to_string())?;
            serde_json::to_value(bookmarks).map_err(|e| e.to_string())
        }

        // ─── Tags ───
        "tags.count" => {
            let ctx = context(params)?;
            let a = app.lock().map_err(|e| e.to_string())?;
            let filter = tags_param(params, "tags", &a.settings().tags_separator);
            let counts = a
                .store
                .bookmarks_count_per_tag(&ctx, &filter)
                .map_err(|e| e.to_string())?;
            let arr: Vec<Value> = counts
                .into_iter()
                .map(|(tag, count)| json!({"tag": tag, "count": count}))
                .collect();
            Ok(json!(arr))
        }
        "tags.rename" => {
            let ctx = context(params)?;
            let from = str_param(params, "from")?;
            let to = str_param(params, "to")?;
            let a = app.lock().map_err(|e| e.to_string())?;
            let changed = a.store.rename_tag(&ctx, from, to).map_err(|e| e.to_string())?;
            Ok(json!({"changed": changed}))
        }
        "tags.delete" => {
            let ctx = context(params)?;
            let tag = str_param(params, "tag")?;
            let a = app.lock().map_err(|e| e.to_string())?;
            let changed = a.store.delete_tag(&ctx, tag).map_err(|e| e.to_string())?;
            Ok(json!({"changed": changed}))
        }

        // ─── Store ───
        "store.info" => {
            let a = app.lock().map_err(|e| e.to_string())?;
            let info = a.store.info().map_err(|e| e.to_string())?;
            serde_json::to_value(info).map_err(|e| e.to_string())
        }

        // ─── Settings ───
        "settings.get" => {
            let a = app.lock().map_err(|e| e.to_string())?;
            serde_json::to_value(a.settings()).map_err(|e| e.to_string())
        }
        "settings.set" => {
            let key = str_param(params, "key")?;
            let value = params.get("value").cloned().ok_or("missing value")?;
            let mut a = app.lock().map_err(|e| e.to_string())?;
            a.update_setting(key, value).map_err(|e| e.to_string())?;
            Ok(json!({"ok": true}))
        }

        _ => Err(format!("unknown method: {}", method)),
    }
}

fn context(params: &Value) -> Result<RequestContext, String> {
    let logged_in = params.get("logged_in").and_then(Value::as_bool).unwrap_or(true);
    let visibility = match params.get("visibility").and_then(Value::as_str) {
        None => None,
        Some(v) => Some(Visibility::parse(v).ok_or_else(|| format!("invalid visibility: {}", v))?),
    };
    Ok(RequestContext {
        logged_in,
        visibility,
    })
}

fn id_param(params: &Value) -> Result<u64, String> {
    params
        .get("id")
        .and_then(Value::as_u64)
        .ok_or_else(|| "missing id".to_string())
}

fn str_param<'a>(params: &'a Value, key: &str) -> Result<&'a str, String> {
    params
        .get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| format!("missing {}", key))
}

/// Tags given either as an array or as a separator-delimited string.
fn tags_param(params: &Value, key: &str, separator: &str) -> Vec<String> {
    match params.get(key) {
        Some(Value::String(s)) => tags_from_str(s, separator),
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

/// Search tags keep their `-` prefixes, so they are split here rather than normalized.
fn search_tags(params: &Value, separator: &str) -> Vec<String> {
    match params.get("tags") {
        Some(Value::String(s)) => {
            let s = if separator.is_empty() { s.clone() } else { s.replace(separator, " ") };
            s.split_whitespace().map(str::to_string).collect()
        }
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

fn search_request(params: &Value, per_page: usize, separator: &str) -> Result<SearchRequest, String> {
    let flag = |key: &str| params.get(key).and_then(Value::as_bool).unwrap_or(false);
    let pagination = match (params.get("offset"), params.get("page")) {
        (Some(offset), _) => Pagination {
            offset: offset.as_u64().ok_or("invalid offset")? as usize,
            limit: params.get("limit").and_then(Value::as_u64).map(|l| l as usize),
        },
        (None, page) => {
            let page = page.and_then(Value::as_u64).unwrap_or(1) as usize;
            let per_page = params
                .get("per_page")
                .and_then(Value::as_u64)
                .map_or(per_page, |p| p as usize);
            if per_page == 0 {
                return Err("per_page must be at least 1".to_string());
            }
            Pagination::page(page, per_page)
        }
    };
    Ok(SearchRequest::new()
        .tags(search_tags(params, separator))
        .term(params.get("term").and_then(Value::as_str).unwrap_or_default())
        .untagged_only(flag("untagged_only"))
        .ignore_sticky(flag("ignore_sticky"))
        .paginate(pagination))
}

/// Accepts `YYYYMMDD` and `YYYY-MM-DD`.
fn parse_day(day: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(day, "%Y%m%d")
        .or_else(|_| NaiveDate::parse_from_str(day, "%Y-%m-%d"))
        .map_err(|_| format!("invalid date format: {}", day))
}
